use sqlx::PgPool;
use uuid::Uuid;

use crate::{
	Error, Result,
	models::{ChunkRow, NewChunk, NewTurn, ScoredChunkRow, TurnRow},
};

/// Lexical chunks whose headword equals or starts with `term`, or whose normalized text contains
/// `term` as a whole word. `term` must already be normalized.
pub async fn keyword_candidates(pool: &PgPool, term: &str, limit: u32) -> Result<Vec<ChunkRow>> {
	if term.trim().is_empty() {
		return Err(Error::InvalidArgument("Keyword term must not be empty.".to_string()));
	}

	let pattern = word_boundary_pattern(term);
	let rows = sqlx::query_as::<_, ChunkRow>(
		"\
SELECT
	chunk_id,
	text,
	source_name,
	source_priority,
	source_kind,
	headword
FROM knowledge_chunks
WHERE source_kind = 'lexical'
	AND (
		headword_normalized = $1
		OR starts_with(headword_normalized, $1)
		OR text_normalized ~ $2
	)
ORDER BY
	source_priority DESC,
	char_length(text) ASC,
	chunk_id ASC
LIMIT $3",
	)
	.bind(term)
	.bind(pattern)
	.bind(i64::from(limit))
	.fetch_all(pool)
	.await?;

	Ok(rows)
}

/// Nearest chunks by cosine distance, closest first.
pub async fn vector_search(
	pool: &PgPool,
	embedding: &[f32],
	limit: u32,
) -> Result<Vec<ScoredChunkRow>> {
	if embedding.is_empty() {
		return Err(Error::InvalidArgument("Query embedding must not be empty.".to_string()));
	}

	let rows = sqlx::query_as::<_, ScoredChunkRow>(
		"\
SELECT
	chunk_id,
	text,
	source_name,
	source_priority,
	source_kind,
	headword,
	(embedding <=> $1::text::vector)::real AS distance
FROM knowledge_chunks
WHERE embedding IS NOT NULL
ORDER BY embedding <=> $1::text::vector ASC, chunk_id ASC
LIMIT $2",
	)
	.bind(vector_to_pg(embedding))
	.bind(i64::from(limit))
	.fetch_all(pool)
	.await?;

	Ok(rows)
}

/// The newest `max_turns` turns of one conversation, returned oldest first.
pub async fn fetch_history(
	pool: &PgPool,
	conversation_id: Uuid,
	max_turns: u32,
) -> Result<Vec<TurnRow>> {
	let mut rows = sqlx::query_as::<_, TurnRow>(
		"\
SELECT turn_index, role, content
FROM conversation_turns
WHERE conversation_id = $1
ORDER BY turn_index DESC
LIMIT $2",
	)
	.bind(conversation_id)
	.bind(i64::from(max_turns))
	.fetch_all(pool)
	.await?;

	rows.reverse();

	Ok(rows)
}

pub async fn insert_chunk(pool: &PgPool, chunk: &NewChunk) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO knowledge_chunks (
	chunk_id,
	text,
	text_normalized,
	source_name,
	source_priority,
	source_kind,
	headword,
	headword_normalized,
	embedding
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9::text::vector)",
	)
	.bind(chunk.chunk_id)
	.bind(chunk.text.as_str())
	.bind(chunk.text_normalized.as_str())
	.bind(chunk.source_name.as_str())
	.bind(chunk.source_priority)
	.bind(chunk.source_kind.as_str())
	.bind(chunk.headword.as_deref())
	.bind(chunk.headword_normalized.as_deref())
	.bind(chunk.embedding.as_deref().map(vector_to_pg))
	.execute(pool)
	.await?;

	Ok(())
}

pub async fn insert_turn(pool: &PgPool, turn: &NewTurn) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO conversation_turns (
	turn_id,
	conversation_id,
	user_id,
	turn_index,
	role,
	content,
	created_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7)",
	)
	.bind(turn.turn_id)
	.bind(turn.conversation_id)
	.bind(turn.user_id.as_str())
	.bind(turn.turn_index)
	.bind(turn.role.as_str())
	.bind(turn.content.as_str())
	.bind(turn.created_at)
	.execute(pool)
	.await?;

	Ok(())
}

pub fn vector_to_pg(vec: &[f32]) -> String {
	let mut out = String::with_capacity(vec.len() * 8);

	out.push('[');

	for (i, value) in vec.iter().enumerate() {
		if i > 0 {
			out.push(',');
		}

		out.push_str(&value.to_string());
	}

	out.push(']');

	out
}

/// A POSIX regex matching `term` only where it is not embedded in a longer word. Apostrophes
/// count as word characters because they carry glottal stops in many orthographies.
fn word_boundary_pattern(term: &str) -> String {
	format!("(^|[^[:alnum:]']){}([^[:alnum:]']|$)", escape_regex(term))
}

fn escape_regex(term: &str) -> String {
	let mut out = String::with_capacity(term.len() * 2);

	for ch in term.chars() {
		if !ch.is_alphanumeric() && !ch.is_whitespace() {
			out.push('\\');
		}

		out.push(ch);
	}

	out
}
