use std::sync::Arc;

use tutor_service::{Cancellation, ConversationId, PromptRequest, Role};

use super::{
	InMemoryChunks, InMemoryHistory, SpyEmbedding, sample_chunks, service_with, test_config, turn,
};

#[tokio::test]
async fn conversations_of_the_same_learner_never_mix() {
	// Both conversations belong to the same learner; only the conversation id separates them.
	let greetings = ConversationId::new();
	let grammar = ConversationId::new();
	let history = InMemoryHistory::with(vec![
		(
			greetings,
			vec![
				turn(Role::User, "How do you say hello?"),
				turn(Role::Assistant, "cama-i is a common greeting."),
			],
		),
		(
			grammar,
			vec![
				turn(Role::User, "How do plurals work?"),
				turn(Role::Assistant, "Most nouns take the suffix -t."),
			],
		),
	]);
	let service = service_with(
		test_config(),
		Arc::new(InMemoryChunks::new(sample_chunks())),
		Arc::new(history),
		Arc::new(SpyEmbedding::default()),
	);
	let bundle = service
		.build_prompt(
			PromptRequest {
				conversation_id: greetings,
				message: "What does 'ekungok' mean?".into(),
			},
			&Cancellation::new(),
		)
		.await
		.expect("Expected a prompt bundle.");
	let contents =
		bundle.payload.history.iter().map(|turn| turn.content.as_str()).collect::<Vec<_>>();

	assert_eq!(contents, vec!["How do you say hello?", "cama-i is a common greeting."]);
	assert!(bundle.payload.messages().iter().all(|message| {
		!message["content"].as_str().unwrap_or_default().contains("suffix -t")
	}));
}

#[tokio::test]
async fn unknown_conversation_has_no_history() {
	let known = ConversationId::new();
	let history = InMemoryHistory::with(vec![(known, vec![turn(Role::User, "Hi there.")])]);
	let service = service_with(
		test_config(),
		Arc::new(InMemoryChunks::new(sample_chunks())),
		Arc::new(history),
		Arc::new(SpyEmbedding::default()),
	);
	let bundle = service
		.build_prompt(
			PromptRequest {
				conversation_id: ConversationId::new(),
				message: "What does 'ekungok' mean?".into(),
			},
			&Cancellation::new(),
		)
		.await
		.expect("Expected a prompt bundle.");

	assert!(bundle.payload.history.is_empty());
}

#[tokio::test]
async fn history_fetch_honors_max_turns() {
	let conversation_id = ConversationId::new();
	let turns = (0..10).map(|i| turn(Role::User, format!("message {i}"))).collect();
	let mut cfg = test_config();

	cfg.retrieval.history_max_turns = 4;

	let service = service_with(
		cfg,
		Arc::new(InMemoryChunks::new(sample_chunks())),
		Arc::new(InMemoryHistory::with(vec![(conversation_id, turns)])),
		Arc::new(SpyEmbedding::default()),
	);
	let history = service
		.fetch_history(conversation_id, &Cancellation::new())
		.await
		.expect("Expected history.");

	assert_eq!(history.len(), 4);
	assert_eq!(history[0].content, "message 6");
	assert_eq!(history[3].content, "message 9");
}
