//! The request-level pipeline: classify, retrieve, merge, then assemble under budget.

use serde::{Deserialize, Serialize};

use tutor_storage::retry;

use crate::{
	Cancellation, Error, Result, TutorService,
	assemble::{BoundedPayload, assemble},
	merge::merge,
	model::{Chunk, ConversationId, ConversationTurn, Query},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptRequest {
	pub conversation_id: ConversationId,
	pub message: String,
}

/// Whether the bundle carries evidence, and why not when it does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceStatus {
	Found,
	/// Retrieval succeeded and matched nothing.
	NotFound,
	/// Evidence was retrieved but none of it fit the evidence pool.
	OverBudget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CitedSource {
	pub source_name: String,
	pub source_priority: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptBundle {
	pub query: Query,
	pub payload: BoundedPayload,
	/// Sources of the evidence that made it into the payload, in evidence order.
	pub cited_sources: Vec<CitedSource>,
	pub evidence_status: EvidenceStatus,
}

struct Retrieved {
	keyword: Vec<Chunk>,
	vector: Vec<(Chunk, f32)>,
}

impl TutorService {
	pub async fn build_prompt(
		&self,
		req: PromptRequest,
		cancel: &Cancellation,
	) -> Result<PromptBundle> {
		if req.message.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "message must be non-empty.".to_string() });
		}

		let query = Query::parse(&req.message);

		tracing::debug!(
			conversation_id = %req.conversation_id,
			intent = query.intent.as_str(),
			target_term = query.target_term.as_deref().unwrap_or(""),
			"Classified query."
		);

		let (history, retrieved) = tokio::try_join!(
			self.fetch_history(req.conversation_id, cancel),
			self.retrieve(&query, cancel),
		)?;
		let keyword_hits = retrieved.keyword.len();
		let vector_hits = retrieved.vector.len();
		let merged = merge(
			retrieved.keyword,
			retrieved.vector,
			query.intent,
			&self.weights,
			self.cfg.retrieval.final_top_k as usize,
		);
		let retrieved_any = !merged.is_empty();
		let payload = assemble(
			self.counter.as_ref(),
			&self.cfg.prompt.system_preamble,
			merged,
			history,
			&req.message,
			&self.budget,
		)?;
		let evidence_status = if !retrieved_any {
			EvidenceStatus::NotFound
		} else if payload.evidence.is_empty() {
			EvidenceStatus::OverBudget
		} else {
			EvidenceStatus::Found
		};
		let cited_sources = payload
			.evidence
			.iter()
			.map(|block| CitedSource {
				source_name: block.source_name.clone(),
				source_priority: block.source_priority,
			})
			.collect();

		tracing::info!(
			conversation_id = %req.conversation_id,
			intent = query.intent.as_str(),
			keyword_hits,
			vector_hits,
			evidence = payload.evidence.len(),
			history_turns = payload.history.len(),
			total_tokens = payload.usage.total,
			"Prompt assembled."
		);

		Ok(PromptBundle { query, payload, cited_sources, evidence_status })
	}

	/// History for exactly one conversation, oldest turn first.
	pub async fn fetch_history(
		&self,
		conversation_id: ConversationId,
		cancel: &Cancellation,
	) -> Result<Vec<ConversationTurn>> {
		let max_turns = self.cfg.retrieval.history_max_turns;

		retry::with_retry(&self.retry, "history", cancel, || {
			self.stores.history.get_history(conversation_id, max_turns)
		})
		.await
		.map_err(|err| Error::data_access("history", &conversation_id.to_string(), err))
	}

	async fn retrieve(&self, query: &Query, cancel: &Cancellation) -> Result<Retrieved> {
		let lookup_term = query.lookup_term();

		if self.cfg.retrieval.concurrent {
			let keyword = async {
				match lookup_term {
					Some(term) => self.keyword_search(term, cancel).await,
					None => Ok(Vec::new()),
				}
			};
			let (keyword, vector) =
				tokio::try_join!(keyword, self.vector_search(&query.raw_text, cancel))?;

			return Ok(Retrieved { keyword, vector });
		}

		let keyword = match lookup_term {
			Some(term) => self.keyword_search(term, cancel).await?,
			None => Vec::new(),
		};

		// A lookup answered from the lexicon never needs semantic neighbours.
		if !keyword.is_empty() {
			return Ok(Retrieved { keyword, vector: Vec::new() });
		}

		let vector = self.vector_search(&query.raw_text, cancel).await?;

		Ok(Retrieved { keyword, vector })
	}
}
