use tutor_storage::retry;
use tutor_tokens::truncate_to_tokens;

use crate::{Cancellation, Error, Result, TutorService, model::Chunk};

impl TutorService {
	/// Embeds `text` and returns the nearest `final_top_k * vector_overfetch` chunks with their
	/// cosine distances, closest first.
	///
	/// Only the prefix of `text` that fits the message pool is embedded, the same text the model
	/// will see.
	pub async fn vector_search(
		&self,
		text: &str,
		cancel: &Cancellation,
	) -> Result<Vec<(Chunk, f32)>> {
		let text = self.embeddable_text(text);
		let embedding = self.embed_query(text, cancel).await?;
		let limit = self.vector_candidate_limit();
		let embedding_ref = embedding.as_slice();
		let results = retry::with_retry(&self.retry, "vector_search", cancel, || {
			self.stores.chunks.vector_search(embedding_ref, limit)
		})
		.await
		.map_err(|err| Error::data_access("vector_search", text, err))?;

		tracing::debug!(limit, candidates = results.len(), "Vector search finished.");

		Ok(results)
	}

	pub fn vector_candidate_limit(&self) -> u32 {
		self.cfg.retrieval.final_top_k.saturating_mul(self.cfg.retrieval.vector_overfetch)
	}

	fn embeddable_text<'a>(&self, text: &'a str) -> &'a str {
		let kept = truncate_to_tokens(self.counter.as_ref(), text, self.budget.message);

		if kept.len() < text.len() {
			tracing::debug!(
				pool = self.budget.message,
				"Query exceeds the message pool. Embedding its leading part only."
			);
		}

		kept
	}

	async fn embed_query(&self, text: &str, cancel: &Cancellation) -> Result<Vec<f32>> {
		let cfg = &self.cfg.providers.embedding;
		let texts = vec![text.to_string()];
		let embedded = tokio::select! {
			biased;
			_ = cancel.cancelled() => return Err(Error::Cancelled { operation: "embed" }),
			embedded = self.providers.embedding.embed(cfg, &texts) => embedded?,
		};
		let Some(vector) = embedded.into_iter().next() else {
			return Err(Error::Provider {
				message: "Embedding provider returned no vectors.".to_string(),
			});
		};

		if vector.len() != cfg.dimensions as usize {
			return Err(Error::Provider {
				message: format!(
					"Embedding provider returned {} dimensions, expected {}.",
					vector.len(),
					cfg.dimensions
				),
			});
		}

		Ok(vector)
	}
}
