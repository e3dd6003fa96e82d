use std::sync::{Arc, atomic::Ordering};

use tutor_domain::{Intent, LookupDirection, SourceKind};
use tutor_service::{Cancellation, ConversationId, EvidenceStatus, PromptRequest};

use super::{
	InMemoryChunks, InMemoryHistory, SpyEmbedding, chunk, sample_chunks, service_with, test_config,
};

fn request(message: &str) -> PromptRequest {
	PromptRequest { conversation_id: ConversationId::new(), message: message.to_string() }
}

#[tokio::test]
async fn lookup_answers_from_the_dictionary_without_embedding() {
	let chunks = Arc::new(InMemoryChunks::new(sample_chunks()));
	let embedding = Arc::new(SpyEmbedding::default());
	let calls = embedding.calls.clone();
	let service = service_with(
		test_config(),
		chunks.clone(),
		Arc::new(InMemoryHistory::default()),
		embedding,
	);
	let bundle = service
		.build_prompt(request("What does 'ekungok' mean?"), &Cancellation::new())
		.await
		.expect("Expected a prompt bundle.");

	assert_eq!(bundle.query.intent, Intent::Lookup);
	assert_eq!(bundle.query.target_term.as_deref(), Some("ekungok"));
	assert_eq!(bundle.evidence_status, EvidenceStatus::Found);
	assert_eq!(bundle.payload.evidence.len(), 1);
	assert!(bundle.payload.evidence[0].text.starts_with("ekungok:"));
	assert_eq!(bundle.cited_sources.len(), 1);
	assert_eq!(bundle.cited_sources[0].source_name, "Yupik Dictionary");
	assert_eq!(bundle.cited_sources[0].source_priority, 3);
	assert_eq!(calls.load(Ordering::SeqCst), 0);
	assert_eq!(chunks.vector_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn reverse_lookup_finds_the_headword_by_gloss() {
	let service = service_with(
		test_config(),
		Arc::new(InMemoryChunks::new(sample_chunks())),
		Arc::new(InMemoryHistory::default()),
		Arc::new(SpyEmbedding::default()),
	);
	let bundle = service
		.build_prompt(request("How do you say hello in Yupik?"), &Cancellation::new())
		.await
		.expect("Expected a prompt bundle.");

	assert_eq!(bundle.query.intent, Intent::Lookup);
	assert_eq!(bundle.query.direction, Some(LookupDirection::SourceToTarget));
	assert_eq!(bundle.payload.evidence.len(), 1);
	assert!(bundle.payload.evidence[0].text.starts_with("cama-i:"));
}

#[tokio::test]
async fn lookup_without_keyword_hits_falls_through_to_vector_search() {
	let chunks = Arc::new(InMemoryChunks::new(sample_chunks()));
	let embedding = Arc::new(SpyEmbedding::default());
	let calls = embedding.calls.clone();
	let service = service_with(
		test_config(),
		chunks.clone(),
		Arc::new(InMemoryHistory::default()),
		embedding,
	);
	let bundle = service
		.build_prompt(request("What does falang mean?"), &Cancellation::new())
		.await
		.expect("Expected a prompt bundle.");

	assert_eq!(bundle.query.intent, Intent::Lookup);
	assert_eq!(chunks.keyword_calls.load(Ordering::SeqCst), 1);
	assert_eq!(calls.load(Ordering::SeqCst), 1);
	assert_eq!(bundle.evidence_status, EvidenceStatus::Found);
	// The lexical boost lifts the dictionary's greeting above the closer article.
	assert_eq!(bundle.payload.evidence[0].source_name, "Yupik Dictionary");
	assert!(bundle.payload.evidence.len() <= 3);
}

#[tokio::test]
async fn educational_queries_prefer_lessons() {
	let service = service_with(
		test_config(),
		Arc::new(InMemoryChunks::new(sample_chunks())),
		Arc::new(InMemoryHistory::default()),
		Arc::new(SpyEmbedding::default()),
	);
	let bundle = service
		.build_prompt(request("How do I form the plural of nouns?"), &Cancellation::new())
		.await
		.expect("Expected a prompt bundle.");

	assert_eq!(bundle.query.intent, Intent::Educational);
	assert_eq!(bundle.payload.evidence[0].source_name, "Grammar Lessons");
}

#[tokio::test]
async fn vector_search_overfetches_before_merging() {
	let cfg = test_config();
	let expected = cfg.retrieval.final_top_k * cfg.retrieval.vector_overfetch;
	let chunks = Arc::new(InMemoryChunks::new(sample_chunks()));
	let service = service_with(
		cfg,
		chunks.clone(),
		Arc::new(InMemoryHistory::default()),
		Arc::new(SpyEmbedding::default()),
	);

	service
		.build_prompt(request("Tell me about the spring festival."), &Cancellation::new())
		.await
		.expect("Expected a prompt bundle.");

	assert_eq!(expected, 24);
	assert_eq!(chunks.vector_limits(), vec![expected]);
}

#[tokio::test]
async fn empty_knowledge_base_reports_not_found() {
	let service = service_with(
		test_config(),
		Arc::new(InMemoryChunks::new(Vec::new())),
		Arc::new(InMemoryHistory::default()),
		Arc::new(SpyEmbedding::default()),
	);
	let bundle = service
		.build_prompt(request("Tell me a story about the river"), &Cancellation::new())
		.await
		.expect("Expected a prompt bundle.");

	assert_eq!(bundle.evidence_status, EvidenceStatus::NotFound);
	assert!(bundle.payload.evidence.is_empty());
	assert!(bundle.cited_sources.is_empty());
}

#[tokio::test]
async fn concurrent_mode_matches_sequential_results() {
	let mut cfg = test_config();

	cfg.retrieval.concurrent = true;

	let chunks = Arc::new(InMemoryChunks::new(sample_chunks()));
	let service = service_with(
		cfg,
		chunks.clone(),
		Arc::new(InMemoryHistory::default()),
		Arc::new(SpyEmbedding::default()),
	);
	let bundle = service
		.build_prompt(request("What does 'ekungok' mean?"), &Cancellation::new())
		.await
		.expect("Expected a prompt bundle.");

	assert_eq!(chunks.vector_calls.load(Ordering::SeqCst), 1);
	assert_eq!(bundle.payload.evidence.len(), 1);
	assert!(bundle.payload.evidence[0].text.starts_with("ekungok:"));
}

#[tokio::test]
async fn evidence_that_cannot_fit_is_reported_over_budget() {
	let mut cfg = test_config();

	cfg.budget.evidence_tokens = 3;

	let long_entry = chunk(
		Some("ekungok"),
		"ekungok: (n.) riverbank; the sloping edge of a river where boats are pulled up.",
		"Yupik Dictionary",
		3,
		SourceKind::Lexical,
		[0.0, 1.0, 0.0],
	);
	let service = service_with(
		cfg,
		Arc::new(InMemoryChunks::new(vec![long_entry])),
		Arc::new(InMemoryHistory::default()),
		Arc::new(SpyEmbedding::default()),
	);
	let bundle = service
		.build_prompt(request("What does 'ekungok' mean?"), &Cancellation::new())
		.await
		.expect("Expected a prompt bundle.");

	assert_eq!(bundle.evidence_status, EvidenceStatus::OverBudget);
	assert_eq!(bundle.payload.dropped_evidence, 1);
	assert!(bundle.cited_sources.is_empty());
}

#[tokio::test]
async fn blank_messages_are_rejected() {
	let service = service_with(
		test_config(),
		Arc::new(InMemoryChunks::new(sample_chunks())),
		Arc::new(InMemoryHistory::default()),
		Arc::new(SpyEmbedding::default()),
	);
	let err = service
		.build_prompt(request("   "), &Cancellation::new())
		.await
		.expect_err("Expected an invalid request.");

	assert!(matches!(err, tutor_service::Error::InvalidRequest { .. }));
}
