//! Postgres and Qdrant implementations of the store traits.

use sqlx::PgPool;

use tutor_domain::SourceKind;
use tutor_storage::{
	Error as StorageError, Result as StorageResult,
	models::{ChunkRow, ScoredChunkRow, TurnRow},
	qdrant::QdrantStore,
	queries,
};

use crate::{
	BoxFuture, ChunkStore, HistoryStore,
	model::{Chunk, ConversationId, ConversationTurn, Role},
};

pub struct PgChunkStore {
	pool: PgPool,
}
impl PgChunkStore {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}
}
impl ChunkStore for PgChunkStore {
	fn keyword_search<'a>(
		&'a self,
		term: &'a str,
		limit: u32,
	) -> BoxFuture<'a, StorageResult<Vec<Chunk>>> {
		Box::pin(async move {
			let rows = queries::keyword_candidates(&self.pool, term, limit).await?;

			rows.into_iter().map(chunk_from_row).collect()
		})
	}

	fn vector_search<'a>(
		&'a self,
		embedding: &'a [f32],
		limit: u32,
	) -> BoxFuture<'a, StorageResult<Vec<(Chunk, f32)>>> {
		Box::pin(async move {
			let rows = queries::vector_search(&self.pool, embedding, limit).await?;

			rows.into_iter().map(scored_from_row).collect()
		})
	}
}

/// Keyword lookup stays in Postgres; nearest-neighbour search goes to Qdrant.
pub struct QdrantChunkStore {
	pool: PgPool,
	qdrant: QdrantStore,
}
impl QdrantChunkStore {
	pub fn new(pool: PgPool, qdrant: QdrantStore) -> Self {
		Self { pool, qdrant }
	}
}
impl ChunkStore for QdrantChunkStore {
	fn keyword_search<'a>(
		&'a self,
		term: &'a str,
		limit: u32,
	) -> BoxFuture<'a, StorageResult<Vec<Chunk>>> {
		Box::pin(async move {
			let rows = queries::keyword_candidates(&self.pool, term, limit).await?;

			rows.into_iter().map(chunk_from_row).collect()
		})
	}

	fn vector_search<'a>(
		&'a self,
		embedding: &'a [f32],
		limit: u32,
	) -> BoxFuture<'a, StorageResult<Vec<(Chunk, f32)>>> {
		Box::pin(async move {
			let rows = self.qdrant.vector_search(embedding, limit).await?;

			rows.into_iter().map(scored_from_row).collect()
		})
	}
}

pub struct PgHistoryStore {
	pool: PgPool,
}
impl PgHistoryStore {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}
}
impl HistoryStore for PgHistoryStore {
	fn get_history<'a>(
		&'a self,
		conversation_id: ConversationId,
		max_turns: u32,
	) -> BoxFuture<'a, StorageResult<Vec<ConversationTurn>>> {
		Box::pin(async move {
			let rows =
				queries::fetch_history(&self.pool, conversation_id.as_uuid(), max_turns).await?;

			rows.into_iter().map(turn_from_row).collect()
		})
	}
}

fn chunk_from_row(row: ChunkRow) -> StorageResult<Chunk> {
	let Some(source_kind) = SourceKind::parse(&row.source_kind) else {
		return Err(StorageError::MalformedRecord(format!(
			"Chunk {} has unknown source_kind {:?}.",
			row.chunk_id, row.source_kind
		)));
	};

	Ok(Chunk {
		id: row.chunk_id,
		text: row.text,
		embedding: None,
		source_name: row.source_name,
		source_priority: row.source_priority,
		source_kind,
		headword: row.headword,
	})
}

fn scored_from_row(row: ScoredChunkRow) -> StorageResult<(Chunk, f32)> {
	Ok((chunk_from_row(row.chunk)?, row.distance))
}

fn turn_from_row(row: TurnRow) -> StorageResult<ConversationTurn> {
	let Some(role) = Role::parse(&row.role) else {
		return Err(StorageError::MalformedRecord(format!(
			"Turn {} has unknown role {:?}.",
			row.turn_index, row.role
		)));
	};

	Ok(ConversationTurn { role, content: row.content })
}
