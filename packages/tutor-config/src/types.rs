use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub retrieval: Retrieval,
	pub ranking: Ranking,
	pub budget: Budget,
	pub prompt: Prompt,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Option<Qdrant>,
	#[serde(default)]
	pub retry: Retry,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

/// Backoff policy for datastore calls that fail with a transient connection error.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Retry {
	/// Retries after the first attempt. Zero disables retrying.
	pub max_retries: u32,
	pub base_backoff_ms: u64,
	pub max_backoff_ms: u64,
}
impl Default for Retry {
	fn default() -> Self {
		Self { max_retries: 3, base_backoff_ms: 100, max_backoff_ms: 2_000 }
	}
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorBackend {
	Postgres,
	Qdrant,
}

#[derive(Debug, Deserialize)]
pub struct Retrieval {
	#[serde(default = "default_vector_backend")]
	pub vector_backend: VectorBackend,
	pub keyword_max_results: u32,
	pub final_top_k: u32,
	/// Vector search fetches `final_top_k * vector_overfetch` candidates.
	pub vector_overfetch: u32,
	pub history_max_turns: u32,
	#[serde(default)]
	pub concurrent: bool,
}

#[derive(Debug, Deserialize)]
pub struct Ranking {
	pub source_tiers: Vec<SourceTier>,
	#[serde(default)]
	pub intent: IntentMultipliers,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceTier {
	pub name: String,
	pub priority: i32,
	pub multiplier: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IntentMultipliers {
	/// Applied to lexical sources when a lookup falls through to vector search.
	pub lookup_lexical: f32,
	/// Applied to pedagogical sources for educational queries.
	pub educational_pedagogical: f32,
}
impl Default for IntentMultipliers {
	fn default() -> Self {
		Self { lookup_lexical: 3.0, educational_pedagogical: 2.0 }
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Budget {
	pub total_tokens: u32,
	pub preamble_tokens: u32,
	pub evidence_tokens: u32,
	pub history_tokens: u32,
	pub message_tokens: u32,
	pub tokenizer_repo: Option<String>,
}
impl Budget {
	pub fn pools_sum(&self) -> u64 {
		self.preamble_tokens as u64
			+ self.evidence_tokens as u64
			+ self.history_tokens as u64
			+ self.message_tokens as u64
	}
}

#[derive(Debug, Deserialize)]
pub struct Prompt {
	pub system_preamble: String,
}

fn default_vector_backend() -> VectorBackend {
	VectorBackend::Postgres
}
