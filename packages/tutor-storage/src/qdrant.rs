use std::collections::HashMap;

use qdrant_client::qdrant::{
	PointId, Query, QueryPointsBuilder, Value, point_id::PointIdOptions, value::Kind,
};
use uuid::Uuid;

use crate::{Error, Result, models::{ChunkRow, ScoredChunkRow}};

pub const DENSE_VECTOR_NAME: &str = "dense";

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &tutor_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	/// Nearest chunks from the dense vector index. Points with incomplete payloads are skipped.
	pub async fn vector_search(&self, embedding: &[f32], limit: u32) -> Result<Vec<ScoredChunkRow>> {
		if embedding.len() != self.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"Query embedding has {} dimensions, expected {}.",
				embedding.len(),
				self.vector_dim
			)));
		}

		let search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(embedding.to_vec()))
			.using(DENSE_VECTOR_NAME)
			.with_payload(true)
			.limit(u64::from(limit));
		let response = self.client.query(search).await?;
		let mut rows = Vec::with_capacity(response.result.len());

		for point in response.result {
			let Some(chunk_id) = point.id.as_ref().and_then(point_id_to_uuid) else {
				tracing::warn!("Qdrant point has no UUID id. Skipping.");

				continue;
			};
			let Some(chunk) = chunk_from_payload(chunk_id, &point.payload) else {
				tracing::warn!(chunk_id = %chunk_id, "Qdrant point payload is incomplete. Skipping.");

				continue;
			};

			// Cosine collections report similarity. Convert to distance to match pgvector.
			rows.push(ScoredChunkRow { chunk, distance: 1.0 - point.score });
		}

		Ok(rows)
	}
}

fn chunk_from_payload(chunk_id: Uuid, payload: &HashMap<String, Value>) -> Option<ChunkRow> {
	Some(ChunkRow {
		chunk_id,
		text: payload_string(payload, "text")?,
		source_name: payload_string(payload, "source_name")?,
		source_priority: payload_i32(payload, "source_priority")?,
		source_kind: payload_string(payload, "source_kind")?,
		headword: payload_string(payload, "headword"),
	})
}

pub fn point_id_to_uuid(point_id: &PointId) -> Option<Uuid> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Uuid(id)) => Uuid::parse_str(id).ok(),
		_ => None,
	}
}

pub fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::StringValue(text)) => Some(text.to_string()),
		_ => None,
	}
}

pub fn payload_i32(payload: &HashMap<String, Value>, key: &str) -> Option<i32> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::IntegerValue(value)) => i32::try_from(*value).ok(),
		Some(Kind::DoubleValue(value)) =>
			if value.fract() == 0.0 {
				i32::try_from(*value as i64).ok()
			} else {
				None
			},
		_ => None,
	}
}
