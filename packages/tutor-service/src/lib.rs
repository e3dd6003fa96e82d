pub mod assemble;
pub mod keyword;
pub mod merge;
pub mod model;
pub mod prompt;
pub mod stores;
pub mod vector;

mod error;

pub use assemble::{BoundedPayload, ContextBudget, EvidenceBlock, TokenUsage, assemble};
pub use error::{Error, Result};
pub use merge::{RankWeights, merge};
pub use model::{Chunk, ConversationId, ConversationTurn, Query, Role, ScoredChunk};
pub use prompt::{CitedSource, EvidenceStatus, PromptBundle, PromptRequest};
pub use tutor_storage::retry::{Cancellation, RetryPolicy};

use std::{future::Future, pin::Pin, sync::Arc};

use tutor_config::{Config, EmbeddingProviderConfig, VectorBackend};
use tutor_providers::embedding;
use tutor_storage::{db::Db, qdrant::QdrantStore};
use tutor_tokens::{TokenCounter, TokenizerCounter, WordCounter};

use crate::stores::{PgChunkStore, PgHistoryStore, QdrantChunkStore};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, tutor_providers::Result<Vec<Vec<f32>>>>;
}

/// Read-only access to knowledge chunks.
pub trait ChunkStore
where
	Self: Send + Sync,
{
	/// Lexical chunks matching an already normalized term, at most `limit`.
	fn keyword_search<'a>(
		&'a self,
		term: &'a str,
		limit: u32,
	) -> BoxFuture<'a, tutor_storage::Result<Vec<Chunk>>>;

	/// Nearest chunks with their cosine distance, closest first.
	fn vector_search<'a>(
		&'a self,
		embedding: &'a [f32],
		limit: u32,
	) -> BoxFuture<'a, tutor_storage::Result<Vec<(Chunk, f32)>>>;
}

pub trait HistoryStore
where
	Self: Send + Sync,
{
	/// The newest `max_turns` turns of one conversation, oldest first.
	fn get_history<'a>(
		&'a self,
		conversation_id: ConversationId,
		max_turns: u32,
	) -> BoxFuture<'a, tutor_storage::Result<Vec<ConversationTurn>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
}
impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>) -> Self {
		Self { embedding }
	}
}
impl Default for Providers {
	fn default() -> Self {
		Self { embedding: Arc::new(DefaultProviders) }
	}
}

#[derive(Clone)]
pub struct Stores {
	pub chunks: Arc<dyn ChunkStore>,
	pub history: Arc<dyn HistoryStore>,
}

pub struct TutorService {
	pub cfg: Config,
	pub stores: Stores,
	pub providers: Providers,
	pub counter: Arc<dyn TokenCounter>,
	weights: RankWeights,
	budget: ContextBudget,
	retry: RetryPolicy,
}
impl TutorService {
	/// Builds the service, rejecting budgets the configured preamble cannot fit.
	pub fn new(
		cfg: Config,
		stores: Stores,
		providers: Providers,
		counter: Arc<dyn TokenCounter>,
	) -> Result<Self> {
		let budget = ContextBudget::from_config(&cfg.budget)?;
		let preamble_tokens = counter.count(&cfg.prompt.system_preamble);

		if preamble_tokens > budget.preamble {
			return Err(Error::BudgetConfiguration {
				message: format!(
					"prompt.system_preamble needs {preamble_tokens} tokens but budget.preamble_tokens is {}.",
					budget.preamble
				),
			});
		}

		let weights = RankWeights::from_config(&cfg.ranking);
		let retry = RetryPolicy::from_config(&cfg.storage.retry);

		Ok(Self { cfg, stores, providers, counter, weights, budget, retry })
	}

	/// Connects to the configured backends and loads the tokenizer.
	pub async fn connect(cfg: Config) -> Result<Self> {
		let db = Db::connect(&cfg.storage.postgres).await?;
		let history = Arc::new(PgHistoryStore::new(db.pool.clone()));
		let chunks: Arc<dyn ChunkStore> = match cfg.retrieval.vector_backend {
			VectorBackend::Postgres => Arc::new(PgChunkStore::new(db.pool.clone())),
			VectorBackend::Qdrant => {
				let Some(qdrant_cfg) = cfg.storage.qdrant.as_ref() else {
					return Err(Error::Configuration {
						message: "storage.qdrant is required when retrieval.vector_backend is qdrant."
							.to_string(),
					});
				};

				Arc::new(QdrantChunkStore::new(db.pool.clone(), QdrantStore::new(qdrant_cfg)?))
			},
		};
		let counter = load_counter(cfg.budget.tokenizer_repo.as_deref())?;

		Self::new(cfg, Stores { chunks, history }, Providers::default(), counter)
	}
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, tutor_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

fn load_counter(tokenizer_repo: Option<&str>) -> Result<Arc<dyn TokenCounter>> {
	let Some(repo) = tokenizer_repo else {
		tracing::info!("No tokenizer configured. Budgeting with word counts.");

		return Ok(Arc::new(WordCounter));
	};
	let counter = TokenizerCounter::from_pretrained(repo).map_err(|err| Error::Configuration {
		message: format!("Failed to load tokenizer {repo:?}: {err}"),
	})?;

	Ok(Arc::new(counter))
}
