use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tutor_domain::{Intent, LookupDirection, SourceKind};

/// Identifies one conversation. History is only ever fetched by this key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub Uuid);
impl ConversationId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}

	pub fn as_uuid(&self) -> Uuid {
		self.0
	}
}
impl Default for ConversationId {
	fn default() -> Self {
		Self::new()
	}
}
impl fmt::Display for ConversationId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}
impl From<Uuid> for ConversationId {
	fn from(value: Uuid) -> Self {
		Self(value)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
	System,
	User,
	Assistant,
}
impl Role {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::System => "system",
			Self::User => "user",
			Self::Assistant => "assistant",
		}
	}

	pub fn parse(value: &str) -> Option<Self> {
		match value.trim() {
			"system" => Some(Self::System),
			"user" => Some(Self::User),
			"assistant" => Some(Self::Assistant),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
	pub role: Role,
	pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
	pub id: Uuid,
	pub text: String,
	/// Absent on read paths that only need text and provenance.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub embedding: Option<Vec<f32>>,
	pub source_name: String,
	pub source_priority: i32,
	pub source_kind: SourceKind,
	pub headword: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
	pub chunk: Chunk,
	pub score: f32,
	/// 1-based position after merging.
	pub rank: u32,
}

/// A classified user utterance. Lives for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Query {
	pub raw_text: String,
	pub normalized_text: String,
	pub intent: Intent,
	pub target_term: Option<String>,
	pub direction: Option<LookupDirection>,
}
impl Query {
	pub fn parse(raw_text: &str) -> Self {
		let classification = tutor_domain::classify(raw_text);

		Self {
			raw_text: raw_text.to_string(),
			normalized_text: tutor_domain::normalize(raw_text),
			intent: classification.intent,
			target_term: classification.target_term,
			direction: classification.direction,
		}
	}

	/// The term to run keyword lookup with, when this is a lookup that named one.
	pub fn lookup_term(&self) -> Option<&str> {
		if self.intent != Intent::Lookup {
			return None;
		}

		self.target_term.as_deref().filter(|term| !term.trim().is_empty())
	}
}
