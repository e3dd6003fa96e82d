use std::sync::Arc;

use proptest::prelude::*;
use uuid::Uuid;

use tutor_domain::SourceKind;
use tutor_service::{
	Cancellation, Chunk, ContextBudget, ConversationId, PromptRequest, Role, ScoredChunk, assemble,
};
use tutor_tokens::{TokenCounter, WordCounter};

use super::{
	InMemoryChunks, InMemoryHistory, SpyEmbedding, sample_chunks, service_with, test_config, turn,
};

fn words(count: usize, word: &str) -> String {
	vec![word; count].join(" ")
}

fn default_budget() -> ContextBudget {
	ContextBudget::from_config(&test_config().budget).expect("Expected a valid budget.")
}

fn scored(rank: usize, word_count: usize) -> ScoredChunk {
	ScoredChunk {
		chunk: Chunk {
			id: Uuid::new_v4(),
			text: words(word_count, "gloss"),
			embedding: None,
			source_name: "Dictionary".to_string(),
			source_priority: 3,
			source_kind: SourceKind::Lexical,
			headword: None,
		},
		score: 1.0 / rank as f32,
		rank: rank as u32,
	}
}

#[tokio::test]
async fn long_history_keeps_the_newest_turns_whole() {
	let conversation_id = ConversationId::new();
	// 25 turns of exactly 1,000 tokens each; the 6,000-token pool holds the newest six.
	let history = (0..25)
		.map(|i| {
			let role = if i % 2 == 0 { Role::User } else { Role::Assistant };

			turn(role, format!("turn{i} {}", words(999, "word")))
		})
		.collect();
	let service = service_with(
		test_config(),
		Arc::new(InMemoryChunks::new(sample_chunks())),
		Arc::new(InMemoryHistory::with(vec![(conversation_id, history)])),
		Arc::new(SpyEmbedding::default()),
	);
	let bundle = service
		.build_prompt(
			PromptRequest { conversation_id, message: "What does 'ekungok' mean?".to_string() },
			&Cancellation::new(),
		)
		.await
		.expect("Expected a prompt bundle.");
	let kept = &bundle.payload.history;

	assert_eq!(kept.len(), 6);
	assert!(kept[0].content.starts_with("turn19 "));
	assert!(kept[5].content.starts_with("turn24 "));
	assert!(kept.iter().all(|turn| WordCounter.count(&turn.content) == 1_000));
	assert_eq!(bundle.payload.dropped_turns, 19);
	assert_eq!(bundle.payload.usage.history, 6_000);
	assert!(bundle.payload.usage.total <= 12_000);
}

#[tokio::test]
async fn huge_message_is_truncated_to_its_pool() {
	let service = service_with(
		test_config(),
		Arc::new(InMemoryChunks::new(sample_chunks())),
		Arc::new(InMemoryHistory::default()),
		Arc::new(SpyEmbedding::default()),
	);
	let message = words(50_000, "story");
	let bundle = service
		.build_prompt(
			PromptRequest { conversation_id: ConversationId::new(), message: message.clone() },
			&Cancellation::new(),
		)
		.await
		.expect("Expected a prompt bundle.");

	assert!(bundle.payload.message_truncated);
	assert_eq!(bundle.payload.usage.message, 2_000);
	assert!(message.starts_with(&bundle.payload.message));
	assert!(bundle.payload.usage.total <= 12_000);
}

#[tokio::test]
async fn huge_message_is_embedded_within_its_pool() {
	let embedding = Arc::new(SpyEmbedding::default());
	let inputs = embedding.inputs.clone();
	let service = service_with(
		test_config(),
		Arc::new(InMemoryChunks::new(sample_chunks())),
		Arc::new(InMemoryHistory::default()),
		embedding,
	);
	let bundle = service
		.build_prompt(
			PromptRequest { conversation_id: ConversationId::new(), message: words(50_000, "story") },
			&Cancellation::new(),
		)
		.await
		.expect("Expected a prompt bundle.");
	let inputs = inputs.lock().unwrap_or_else(|err| err.into_inner()).clone();

	assert_eq!(inputs.len(), 1);
	assert_eq!(WordCounter.count(&inputs[0]), 2_000);
	assert_eq!(inputs[0], bundle.payload.message);
}

#[test]
fn history_turns_are_never_split() {
	let history = vec![
		turn(Role::User, words(10, "old")),
		turn(Role::Assistant, words(4_000, "middle")),
		turn(Role::User, words(3_000, "new")),
	];
	let payload = assemble(&WordCounter, "Tutor.", Vec::new(), history, "hi", &default_budget())
		.expect("Expected assembly to succeed.");

	assert_eq!(payload.history.len(), 1);
	assert_eq!(WordCounter.count(&payload.history[0].content), 3_000);
}

proptest! {
	#![proptest_config(ProptestConfig::with_cases(64))]

	#[test]
	fn payload_never_exceeds_budget(
		evidence_sizes in prop::collection::vec(0_usize..400, 0..=50),
		history_sizes in prop::collection::vec(0_usize..1_500, 0..=30),
		message_words in 0_usize..=50_000,
	) {
		let budget = default_budget();
		let evidence: Vec<ScoredChunk> = evidence_sizes
			.iter()
			.enumerate()
			.map(|(idx, size)| scored(idx + 1, *size))
			.collect();
		let history: Vec<_> = history_sizes
			.iter()
			.enumerate()
			.map(|(idx, size)| turn(Role::User, format!("t{idx} {}", words(*size, "w"))))
			.collect();
		let message = words(message_words, "m");
		let payload = assemble(
			&WordCounter,
			"You are a tutor.",
			evidence.clone(),
			history.clone(),
			&message,
			&budget,
		)
		.expect("Expected assembly to succeed.");
		let usage = payload.usage;

		prop_assert!(usage.preamble <= budget.preamble);
		prop_assert!(usage.evidence <= budget.evidence);
		prop_assert!(usage.history <= budget.history);
		prop_assert!(usage.message <= budget.message);
		prop_assert!(usage.total <= budget.total);
		prop_assert_eq!(usage.evidence, WordCounter.count(&payload.evidence_section()));
		prop_assert_eq!(usage.message, WordCounter.count(&payload.message));

		// What the model is actually sent stays inside the total as well.
		let rendered: usize = payload
			.messages()
			.iter()
			.filter_map(|message| message["content"].as_str())
			.map(|content| WordCounter.count(content))
			.sum();

		prop_assert!(rendered <= budget.total, "rendered {} exceeds {}", rendered, budget.total);
		prop_assert_eq!(rendered, usage.total);

		// Kept evidence is a best-first prefix; kept history is a newest-last suffix.
		prop_assert_eq!(payload.evidence.len() + payload.dropped_evidence, evidence.len());
		for (block, original) in payload.evidence.iter().zip(&evidence) {
			prop_assert_eq!(block.chunk_id, original.chunk.id);
		}
		prop_assert_eq!(payload.history.len() + payload.dropped_turns, history.len());
		prop_assert_eq!(&payload.history[..], &history[payload.dropped_turns..]);
		prop_assert_eq!(payload.message_truncated, message_words > budget.message);
	}
}
