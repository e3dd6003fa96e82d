mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Budget, Config, EmbeddingProviderConfig, IntentMultipliers, Postgres, Prompt, Providers,
	Qdrant, Ranking, Retrieval, Retry, Service, SourceTier, Storage, VectorBackend,
};

use std::{collections::HashSet, fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}

	validate_retry(&cfg.storage.retry)?;

	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "Provider embedding api_key must be non-empty.".to_string(),
		});
	}
	if cfg.retrieval.vector_backend == VectorBackend::Qdrant {
		let Some(qdrant) = cfg.storage.qdrant.as_ref() else {
			return Err(Error::Validation {
				message: "storage.qdrant is required when retrieval.vector_backend is qdrant."
					.to_string(),
			});
		};

		if qdrant.collection.trim().is_empty() {
			return Err(Error::Validation {
				message: "storage.qdrant.collection must be non-empty.".to_string(),
			});
		}
		if qdrant.vector_dim != cfg.providers.embedding.dimensions {
			return Err(Error::Validation {
				message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
					.to_string(),
			});
		}
	}
	if cfg.retrieval.keyword_max_results == 0 {
		return Err(Error::Validation {
			message: "retrieval.keyword_max_results must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.final_top_k == 0 {
		return Err(Error::Validation {
			message: "retrieval.final_top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.vector_overfetch == 0 {
		return Err(Error::Validation {
			message: "retrieval.vector_overfetch must be greater than zero.".to_string(),
		});
	}

	validate_ranking(&cfg.ranking)?;
	validate_budget(&cfg.budget)?;

	if cfg.prompt.system_preamble.trim().is_empty() {
		return Err(Error::Validation {
			message: "prompt.system_preamble must be non-empty.".to_string(),
		});
	}

	Ok(())
}

pub fn validate_budget(budget: &Budget) -> Result<()> {
	for (label, value) in [
		("budget.total_tokens", budget.total_tokens),
		("budget.preamble_tokens", budget.preamble_tokens),
		("budget.evidence_tokens", budget.evidence_tokens),
		("budget.history_tokens", budget.history_tokens),
		("budget.message_tokens", budget.message_tokens),
	] {
		if value == 0 {
			return Err(Error::Budget { message: format!("{label} must be greater than zero.") });
		}
	}

	let sum = budget.pools_sum();

	if sum > budget.total_tokens as u64 {
		return Err(Error::Budget {
			message: format!(
				"Pool maxima sum to {sum} tokens, which exceeds budget.total_tokens ({}).",
				budget.total_tokens
			),
		});
	}

	Ok(())
}

fn validate_retry(retry: &Retry) -> Result<()> {
	if retry.base_backoff_ms == 0 {
		return Err(Error::Validation {
			message: "storage.retry.base_backoff_ms must be greater than zero.".to_string(),
		});
	}
	if retry.max_backoff_ms < retry.base_backoff_ms {
		return Err(Error::Validation {
			message: "storage.retry.max_backoff_ms must be at least storage.retry.base_backoff_ms."
				.to_string(),
		});
	}

	Ok(())
}

fn validate_ranking(ranking: &Ranking) -> Result<()> {
	if ranking.source_tiers.is_empty() {
		return Err(Error::Validation {
			message: "ranking.source_tiers must be non-empty.".to_string(),
		});
	}

	let mut priorities = HashSet::new();

	for tier in &ranking.source_tiers {
		if tier.name.trim().is_empty() {
			return Err(Error::Validation {
				message: "ranking.source_tiers.name must be non-empty.".to_string(),
			});
		}
		if !priorities.insert(tier.priority) {
			return Err(Error::Validation {
				message: format!(
					"ranking.source_tiers.priority {} is declared more than once.",
					tier.priority
				),
			});
		}
		if !tier.multiplier.is_finite() || tier.multiplier <= 0.0 {
			return Err(Error::Validation {
				message: "ranking.source_tiers.multiplier must be a finite number greater than zero."
					.to_string(),
			});
		}
	}

	let mut ordered: Vec<&SourceTier> = ranking.source_tiers.iter().collect();

	ordered.sort_by_key(|tier| tier.priority);

	for pair in ordered.windows(2) {
		if pair[1].multiplier < pair[0].multiplier {
			return Err(Error::Validation {
				message: format!(
					"ranking.source_tiers multipliers must not decrease with priority ({} outranks {} but is weighted lower).",
					pair[1].name, pair[0].name
				),
			});
		}
	}

	for (label, value) in [
		("ranking.intent.lookup_lexical", ranking.intent.lookup_lexical),
		("ranking.intent.educational_pedagogical", ranking.intent.educational_pedagogical),
	] {
		if !value.is_finite() {
			return Err(Error::Validation { message: format!("{label} must be a finite number.") });
		}
		if value < 1.0 {
			return Err(Error::Validation { message: format!("{label} must be 1.0 or greater.") });
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.budget.tokenizer_repo.as_deref().map(|repo| repo.trim().is_empty()).unwrap_or(false) {
		cfg.budget.tokenizer_repo = None;
	}
}
