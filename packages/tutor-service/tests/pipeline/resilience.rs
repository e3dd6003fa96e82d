use std::{
	future,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use tutor_service::{
	BoxFuture, Cancellation, Chunk, ChunkStore, ConversationId, ConversationTurn, Error,
	HistoryStore, PromptRequest, Role,
};

use super::{
	InMemoryChunks, InMemoryHistory, SpyEmbedding, connection_reset, sample_chunks, service_with,
	test_config, turn,
};

/// Fails the first `failures` calls of each kind with `error`, then delegates.
struct FlakyChunks {
	inner: InMemoryChunks,
	failures: usize,
	error: fn() -> tutor_storage::Error,
	keyword_attempts: AtomicUsize,
	vector_attempts: AtomicUsize,
}
impl FlakyChunks {
	fn new(chunks: Vec<Chunk>, failures: usize, error: fn() -> tutor_storage::Error) -> Self {
		Self {
			inner: InMemoryChunks::new(chunks),
			failures,
			error,
			keyword_attempts: AtomicUsize::new(0),
			vector_attempts: AtomicUsize::new(0),
		}
	}
}
impl ChunkStore for FlakyChunks {
	fn keyword_search<'a>(
		&'a self,
		term: &'a str,
		limit: u32,
	) -> BoxFuture<'a, tutor_storage::Result<Vec<Chunk>>> {
		let attempt = self.keyword_attempts.fetch_add(1, Ordering::SeqCst);

		if attempt < self.failures {
			let err = (self.error)();

			return Box::pin(async move { Err(err) });
		}

		self.inner.keyword_search(term, limit)
	}

	fn vector_search<'a>(
		&'a self,
		embedding: &'a [f32],
		limit: u32,
	) -> BoxFuture<'a, tutor_storage::Result<Vec<(Chunk, f32)>>> {
		let attempt = self.vector_attempts.fetch_add(1, Ordering::SeqCst);

		if attempt < self.failures {
			let err = (self.error)();

			return Box::pin(async move { Err(err) });
		}

		self.inner.vector_search(embedding, limit)
	}
}

/// Never answers, like a query stuck on a half-open connection.
struct StalledHistory;
impl HistoryStore for StalledHistory {
	fn get_history<'a>(
		&'a self,
		_conversation_id: ConversationId,
		_max_turns: u32,
	) -> BoxFuture<'a, tutor_storage::Result<Vec<ConversationTurn>>> {
		Box::pin(future::pending())
	}
}

fn permanent() -> tutor_storage::Error {
	tutor_storage::Error::Sqlx(sqlx::Error::ColumnNotFound("headword_normalized".to_string()))
}

fn request(conversation_id: ConversationId, message: &str) -> PromptRequest {
	PromptRequest { conversation_id, message: message.to_string() }
}

#[tokio::test]
async fn transient_failures_are_invisible_to_the_caller() {
	let conversation_id = ConversationId::new();
	let history = vec![(conversation_id, vec![turn(Role::User, "Hello again.")])];
	let chunks = sample_chunks();
	let clean = service_with(
		test_config(),
		Arc::new(InMemoryChunks::new(chunks.clone())),
		Arc::new(InMemoryHistory::with(history.clone())),
		Arc::new(SpyEmbedding::default()),
	);
	let flaky_store = Arc::new(FlakyChunks::new(chunks, 2, connection_reset));
	let flaky = service_with(
		test_config(),
		flaky_store.clone(),
		Arc::new(InMemoryHistory::with(history)),
		Arc::new(SpyEmbedding::default()),
	);

	for message in ["What does 'ekungok' mean?", "Tell me about the river villages"] {
		let expected = clean
			.build_prompt(request(conversation_id, message), &Cancellation::new())
			.await
			.expect("Expected the clean run to succeed.");
		let recovered = flaky
			.build_prompt(request(conversation_id, message), &Cancellation::new())
			.await
			.expect("Expected retries to recover.");

		assert_eq!(recovered.payload, expected.payload);
		assert_eq!(recovered.cited_sources, expected.cited_sources);
		assert_eq!(recovered.evidence_status, expected.evidence_status);
	}

	assert_eq!(flaky_store.keyword_attempts.load(Ordering::SeqCst), 3);
	assert_eq!(flaky_store.vector_attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn permanent_failures_surface_after_one_attempt() {
	let store = Arc::new(FlakyChunks::new(sample_chunks(), usize::MAX, permanent));
	let service = service_with(
		test_config(),
		store.clone(),
		Arc::new(InMemoryHistory::default()),
		Arc::new(SpyEmbedding::default()),
	);
	let err = service
		.build_prompt(
			request(ConversationId::new(), "What does 'ekungok' mean?"),
			&Cancellation::new(),
		)
		.await
		.expect_err("Expected a data access error.");

	match &err {
		Error::DataAccess { operation, query, .. } => {
			assert_eq!(*operation, "keyword_search");
			assert_eq!(query, "ekungok");
		},
		other => panic!("Unexpected error: {other:?}"),
	}

	assert!(err.is_retrieval_failure());
	assert_eq!(store.keyword_attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn exhausted_retries_are_a_retrieval_failure_not_an_empty_result() {
	let store = Arc::new(FlakyChunks::new(sample_chunks(), usize::MAX, connection_reset));
	let service = service_with(
		test_config(),
		store.clone(),
		Arc::new(InMemoryHistory::default()),
		Arc::new(SpyEmbedding::default()),
	);
	let err = service
		.build_prompt(
			request(ConversationId::new(), "Tell me about the river"),
			&Cancellation::new(),
		)
		.await
		.expect_err("Expected retrieval to fail.");

	assert!(matches!(err, Error::RetrievalFailed { operation: "vector_search", attempts: 4, .. }));
	assert!(err.is_retrieval_failure());
	assert_eq!(store.vector_attempts.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn cancellation_stops_a_stalled_request() {
	let service = service_with(
		test_config(),
		Arc::new(InMemoryChunks::new(sample_chunks())),
		Arc::new(StalledHistory),
		Arc::new(SpyEmbedding::default()),
	);
	let cancel = Cancellation::new();
	let trigger = cancel.clone();

	tokio::spawn(async move {
		tokio::time::sleep(Duration::from_millis(20)).await;
		trigger.cancel();
	});

	let pending =
		service.build_prompt(request(ConversationId::new(), "What does 'ekungok' mean?"), &cancel);
	let err = tokio::time::timeout(Duration::from_secs(5), pending)
		.await
		.expect("Expected cancellation to end the request.")
		.expect_err("Expected a cancellation error.");

	assert!(matches!(err, Error::Cancelled { operation: "history" }));
	assert!(!err.is_retrieval_failure());
}
