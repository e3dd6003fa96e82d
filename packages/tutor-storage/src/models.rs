use time::OffsetDateTime;
use uuid::Uuid;

use tutor_domain::SourceKind;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChunkRow {
	pub chunk_id: Uuid,
	pub text: String,
	pub source_name: String,
	pub source_priority: i32,
	pub source_kind: String,
	pub headword: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScoredChunkRow {
	#[sqlx(flatten)]
	pub chunk: ChunkRow,
	/// Cosine distance to the query embedding, lower is closer.
	pub distance: f32,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TurnRow {
	pub turn_index: i32,
	pub role: String,
	pub content: String,
}

#[derive(Debug, Clone)]
pub struct NewChunk {
	pub chunk_id: Uuid,
	pub text: String,
	pub text_normalized: String,
	pub source_name: String,
	pub source_priority: i32,
	pub source_kind: String,
	pub headword: Option<String>,
	pub headword_normalized: Option<String>,
	pub embedding: Option<Vec<f32>>,
}
impl NewChunk {
	/// A new chunk whose normalized columns are derived the same way lookup terms are, so keyword
	/// search can find it.
	pub fn new(
		text: impl Into<String>,
		source_name: impl Into<String>,
		source_priority: i32,
		source_kind: SourceKind,
		headword: Option<&str>,
	) -> Self {
		let text = text.into();

		Self {
			chunk_id: Uuid::new_v4(),
			text_normalized: tutor_domain::normalize(&text),
			text,
			source_name: source_name.into(),
			source_priority,
			source_kind: source_kind.as_str().to_string(),
			headword: headword.map(str::to_string),
			headword_normalized: headword.map(tutor_domain::normalize),
			embedding: None,
		}
	}

	pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
		self.embedding = Some(embedding);

		self
	}
}

#[derive(Debug, Clone)]
pub struct NewTurn {
	pub turn_id: Uuid,
	pub conversation_id: Uuid,
	pub user_id: String,
	pub turn_index: i32,
	pub role: String,
	pub content: String,
	pub created_at: OffsetDateTime,
}
