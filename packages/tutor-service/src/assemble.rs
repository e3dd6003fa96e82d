//! Packs preamble, evidence, history and the user message into a fixed token budget.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use tutor_tokens::{TokenCounter, truncate_to_tokens};

use crate::{
	Error, Result,
	model::{ConversationTurn, ScoredChunk},
};

const EVIDENCE_HEADER: &str = "Evidence:\n";

/// Pool maxima, fixed at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContextBudget {
	pub total: usize,
	pub preamble: usize,
	pub evidence: usize,
	pub history: usize,
	pub message: usize,
}
impl ContextBudget {
	pub fn from_config(cfg: &tutor_config::Budget) -> Result<Self> {
		tutor_config::validate_budget(cfg)?;

		Ok(Self {
			total: cfg.total_tokens as usize,
			preamble: cfg.preamble_tokens as usize,
			evidence: cfg.evidence_tokens as usize,
			history: cfg.history_tokens as usize,
			message: cfg.message_tokens as usize,
		})
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
	pub preamble: usize,
	pub evidence: usize,
	pub history: usize,
	pub message: usize,
	pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceBlock {
	pub chunk_id: Uuid,
	pub rank: u32,
	pub score: f32,
	pub source_name: String,
	pub source_priority: i32,
	pub text: String,
}
impl EvidenceBlock {
	fn render(&self) -> String {
		format!("[{}] {}\n{}", self.rank, self.source_name, self.text)
	}
}
impl From<ScoredChunk> for EvidenceBlock {
	fn from(scored: ScoredChunk) -> Self {
		Self {
			chunk_id: scored.chunk.id,
			rank: scored.rank,
			score: scored.score,
			source_name: scored.chunk.source_name,
			source_priority: scored.chunk.source_priority,
			text: scored.chunk.text,
		}
	}
}

/// Everything the generation model will see for one turn, within budget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundedPayload {
	pub system_preamble: String,
	pub evidence: Vec<EvidenceBlock>,
	pub history: Vec<ConversationTurn>,
	pub message: String,
	pub message_truncated: bool,
	pub dropped_evidence: usize,
	pub dropped_turns: usize,
	pub usage: TokenUsage,
}
impl BoundedPayload {
	/// The evidence section exactly as it is appended to the system message, header included.
	/// Empty when no evidence was kept.
	pub fn evidence_section(&self) -> String {
		render_evidence(&self.evidence)
	}

	/// Chat-completions style messages: system (preamble plus evidence), history, user message.
	pub fn messages(&self) -> Vec<Value> {
		let mut system = self.system_preamble.clone();

		if !self.evidence.is_empty() {
			system.push_str("\n\n");
			system.push_str(&self.evidence_section());
		}

		let mut messages = Vec::with_capacity(self.history.len() + 2);

		messages.push(serde_json::json!({ "role": "system", "content": system }));

		for turn in &self.history {
			messages
				.push(serde_json::json!({ "role": turn.role.as_str(), "content": turn.content }));
		}

		messages.push(serde_json::json!({ "role": "user", "content": self.message }));

		messages
	}
}

/// Fits every part into its pool.
///
/// Evidence loses its lowest-ranked whole blocks first, history its oldest whole turns. The
/// message is truncated only when it alone exceeds its pool. The preamble is never cut: if it
/// does not fit, the budget is misconfigured.
pub fn assemble(
	counter: &dyn TokenCounter,
	preamble: &str,
	evidence: Vec<ScoredChunk>,
	history: Vec<ConversationTurn>,
	message: &str,
	budget: &ContextBudget,
) -> Result<BoundedPayload> {
	let preamble_tokens = counter.count(preamble);

	if preamble_tokens > budget.preamble {
		return Err(Error::BudgetConfiguration {
			message: format!(
				"System preamble needs {preamble_tokens} tokens but the preamble pool allows {}.",
				budget.preamble
			),
		});
	}

	let (evidence, evidence_tokens, dropped_evidence) =
		fit_evidence(counter, evidence, budget.evidence);
	let (history, history_tokens, dropped_turns) = fit_history(counter, history, budget.history);
	let message_tokens_before = counter.count(message);
	let kept_message = truncate_to_tokens(counter, message, budget.message);
	let message_truncated = kept_message.len() < message.len();
	let message_tokens =
		if message_truncated { counter.count(kept_message) } else { message_tokens_before };

	if message_truncated {
		tracing::warn!(
			original_tokens = message_tokens_before,
			kept_tokens = message_tokens,
			pool = budget.message,
			"User message exceeds its pool. Truncating."
		);
	}
	if dropped_evidence > 0 {
		tracing::debug!(
			dropped = dropped_evidence,
			pool = budget.evidence,
			"Dropped lowest-ranked evidence to fit budget."
		);
	}
	if dropped_turns > 0 {
		tracing::debug!(
			dropped = dropped_turns,
			pool = budget.history,
			"Dropped oldest turns to fit budget."
		);
	}

	let usage = TokenUsage {
		preamble: preamble_tokens,
		evidence: evidence_tokens,
		history: history_tokens,
		message: message_tokens,
		total: preamble_tokens + evidence_tokens + history_tokens + message_tokens,
	};

	Ok(BoundedPayload {
		system_preamble: preamble.to_string(),
		evidence,
		history,
		message: kept_message.to_string(),
		message_truncated,
		dropped_evidence,
		dropped_turns,
		usage,
	})
}

fn render_evidence(blocks: &[EvidenceBlock]) -> String {
	if blocks.is_empty() {
		return String::new();
	}

	let rendered = blocks.iter().map(EvidenceBlock::render).collect::<Vec<_>>().join("\n\n");

	format!("{EVIDENCE_HEADER}{rendered}")
}

fn fit_evidence(
	counter: &dyn TokenCounter,
	evidence: Vec<ScoredChunk>,
	pool: usize,
) -> (Vec<EvidenceBlock>, usize, usize) {
	let total = evidence.len();
	let mut blocks: Vec<EvidenceBlock> = evidence.into_iter().map(EvidenceBlock::from).collect();
	let mut tokens = counter.count(&render_evidence(&blocks));

	// Blocks arrive best first, so the tail is always the weakest remaining block.
	while tokens > pool && blocks.pop().is_some() {
		tokens = counter.count(&render_evidence(&blocks));
	}

	let dropped = total - blocks.len();

	(blocks, tokens, dropped)
}

fn fit_history(
	counter: &dyn TokenCounter,
	history: Vec<ConversationTurn>,
	pool: usize,
) -> (Vec<ConversationTurn>, usize, usize) {
	let counts: Vec<usize> = history.iter().map(|turn| counter.count(&turn.content)).collect();
	let mut tokens: usize = counts.iter().sum();
	let mut start = 0;

	while tokens > pool && start < counts.len() {
		tokens -= counts[start];
		start += 1;
	}

	let kept = history.into_iter().skip(start).collect();

	(kept, tokens, start)
}
