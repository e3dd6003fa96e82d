use tutor_storage::retry;

use crate::{Cancellation, Error, Result, TutorService, model::Chunk};

impl TutorService {
	/// Exact lexical lookup for `term`, retried on transient failures.
	///
	/// An empty result means nothing matched. Failures are never folded into an empty result.
	pub async fn keyword_search(&self, term: &str, cancel: &Cancellation) -> Result<Vec<Chunk>> {
		let term = tutor_domain::normalize(term);

		if term.is_empty() {
			return Ok(Vec::new());
		}

		let limit = self.cfg.retrieval.keyword_max_results;
		let term_ref = term.as_str();
		let mut chunks = retry::with_retry(&self.retry, "keyword_search", cancel, || {
			self.stores.chunks.keyword_search(term_ref, limit)
		})
		.await
		.map_err(|err| Error::data_access("keyword_search", &term, err))?;

		order_keyword_matches(&mut chunks);
		chunks.truncate(limit as usize);

		tracing::debug!(term = %term, matches = chunks.len(), "Keyword lookup finished.");

		Ok(chunks)
	}
}

/// Highest source priority first, then shorter text, then id.
pub fn order_keyword_matches(chunks: &mut [Chunk]) {
	chunks.sort_by(|a, b| {
		b.source_priority
			.cmp(&a.source_priority)
			.then_with(|| a.text.chars().count().cmp(&b.text.chars().count()))
			.then_with(|| a.id.cmp(&b.id))
	});
}
