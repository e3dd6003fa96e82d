//! Reconciles keyword and vector candidates into one ranked evidence list.

use std::{cmp::Ordering, collections::HashMap};

use tutor_config::Ranking;
use tutor_domain::{Intent, SourceKind, SourceTierTable};

use crate::model::{Chunk, ScoredChunk};

/// Source and intent weights applied to vector candidates.
#[derive(Debug, Clone)]
pub struct RankWeights {
	pub tiers: SourceTierTable,
	pub lookup_lexical: f32,
	pub educational_pedagogical: f32,
}
impl RankWeights {
	pub fn from_config(cfg: &Ranking) -> Self {
		Self {
			tiers: SourceTierTable::from_config(&cfg.source_tiers),
			lookup_lexical: cfg.intent.lookup_lexical,
			educational_pedagogical: cfg.intent.educational_pedagogical,
		}
	}

	pub fn intent_multiplier(&self, intent: Intent, kind: SourceKind) -> f32 {
		match (intent, kind) {
			(Intent::Lookup, SourceKind::Lexical) => self.lookup_lexical,
			(Intent::Educational, SourceKind::Pedagogical) => self.educational_pedagogical,
			_ => 1.0,
		}
	}

	fn score(&self, intent: Intent, chunk: &Chunk, base_similarity: f32) -> f32 {
		base_similarity
			* self.tiers.multiplier(chunk.source_priority)
			* self.intent_multiplier(intent, chunk.source_kind)
	}
}

/// Merges retrieval results.
///
/// A lookup with keyword hits returns those hits in retrieval order and ignores vector results.
/// Otherwise every candidate is scored `(1 - distance) * tier * intent`, with keyword hits taking
/// a base similarity of 1.0, then deduplicated, sorted and cut to `final_top_k`.
pub fn merge(
	keyword: Vec<Chunk>,
	vector: Vec<(Chunk, f32)>,
	intent: Intent,
	weights: &RankWeights,
	final_top_k: usize,
) -> Vec<ScoredChunk> {
	if intent == Intent::Lookup && !keyword.is_empty() {
		let candidates = keyword
			.into_iter()
			.map(|chunk| {
				let score = weights.tiers.multiplier(chunk.source_priority);

				(chunk, score)
			})
			.collect();

		return assign_ranks(dedupe_keep_best(candidates));
	}

	let candidates = keyword
		.into_iter()
		.map(|chunk| (chunk, 1.0))
		.chain(vector.into_iter().map(|(chunk, distance)| (chunk, base_similarity(distance))))
		.map(|(chunk, base)| {
			let score = weights.score(intent, &chunk, base);

			(chunk, score)
		})
		.collect();
	let mut merged = dedupe_keep_best(candidates);

	// `sort_by` is stable, so ties keep retrieval order.
	merged.sort_by(|a, b| cmp_f32_desc(a.1, b.1));
	merged.truncate(final_top_k);

	assign_ranks(merged)
}

/// `1 - distance`, clamped to `[0, 1]`. Non-finite distances score zero.
pub fn base_similarity(distance: f32) -> f32 {
	if !distance.is_finite() {
		return 0.0;
	}

	(1.0 - distance).clamp(0.0, 1.0)
}

/// Keeps the first position of each id with the best score seen for it.
fn dedupe_keep_best(candidates: Vec<(Chunk, f32)>) -> Vec<(Chunk, f32)> {
	let mut index_by_id = HashMap::with_capacity(candidates.len());
	let mut out: Vec<(Chunk, f32)> = Vec::with_capacity(candidates.len());

	for (chunk, score) in candidates {
		match index_by_id.get(&chunk.id) {
			Some(&idx) => {
				let existing: &mut (Chunk, f32) = &mut out[idx];

				if score > existing.1 {
					existing.1 = score;
				}
			},
			None => {
				index_by_id.insert(chunk.id, out.len());
				out.push((chunk, score));
			},
		}
	}

	out
}

fn assign_ranks(candidates: Vec<(Chunk, f32)>) -> Vec<ScoredChunk> {
	candidates
		.into_iter()
		.enumerate()
		.map(|(idx, (chunk, score))| ScoredChunk { chunk, score, rank: idx as u32 + 1 })
		.collect()
}

fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}
