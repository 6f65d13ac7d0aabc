use crate::models::DocumentMetadata;
use crate::traits::VectorIndex;
use crate::{MeetingChunk, SearchCandidate, SearchError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6333";
pub const DEFAULT_COLLECTION: &str = "meetings";

pub struct QdrantStore {
    endpoint: String,
    collection: String,
    client: Client,
}

impl QdrantStore {
    pub fn new(endpoint: &str, collection: impl Into<String>) -> Result<Self, SearchError> {
        let endpoint = endpoint.trim().trim_end_matches('/');
        url::Url::parse(endpoint)?;

        let collection = collection.into();
        if collection.trim().is_empty() {
            return Err(SearchError::Request("collection name is empty".to_string()));
        }

        Ok(Self {
            endpoint: endpoint.to_string(),
            collection,
            client: Client::new(),
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.endpoint, self.collection)
    }
}

#[async_trait]
impl VectorIndex for QdrantStore {
    async fn ensure_collection(&self, dimensions: usize) -> Result<(), SearchError> {
        let response = self.client.get(self.collection_url()).send().await?;

        if response.status().is_success() {
            let parsed: Value = response.json().await?;
            let existing = parsed
                .pointer("/result/config/params/vectors/size")
                .and_then(Value::as_u64);
            if let Some(existing) = existing {
                if existing as usize != dimensions {
                    return Err(SearchError::Request(format!(
                        "collection {} stores {existing}-dimensional vectors, embedder produces {dimensions}",
                        self.collection
                    )));
                }
            }
            return Ok(());
        }

        if response.status() != StatusCode::NOT_FOUND {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let response = self
            .client
            .put(self.collection_url())
            .json(&json!({
                "vectors": { "size": dimensions, "distance": "Cosine" },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        info!(collection = %self.collection, dimensions, "created qdrant collection");
        Ok(())
    }

    async fn index_chunks(
        &self,
        chunks: &[MeetingChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), SearchError> {
        let points = build_points(chunks, embeddings)?;

        if points.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .put(format!("{}/points?wait=true", self.collection_url()))
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        debug!(collection = %self.collection, point_count = points.len(), "upserted points");
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchCandidate>, SearchError> {
        let response = self
            .client
            .post(format!("{}/points/search", self.collection_url()))
            .json(&json!({
                "vector": query_vector,
                "limit": top_k,
                "with_payload": true,
            }))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(SearchError::NotReady(format!(
                "collection {} does not exist; ingest meetings first",
                self.collection
            )));
        }

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        parse_hits(&parsed)
    }

    async fn reset(&self) -> Result<(), SearchError> {
        let response = self.client.delete(self.collection_url()).send().await?;

        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            info!(collection = %self.collection, "deleted qdrant collection");
            return Ok(());
        }

        Err(SearchError::BackendResponse {
            backend: "qdrant".to_string(),
            details: response.status().to_string(),
        })
    }
}

/// Re-ingesting a chunk with the same id overwrites its point.
pub fn point_id(chunk_id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, chunk_id.as_bytes())
}

fn build_points(chunks: &[MeetingChunk], embeddings: &[Vec<f32>]) -> Result<Vec<Value>, SearchError> {
    if chunks.len() != embeddings.len() {
        return Err(SearchError::Request(format!(
            "embedding count {} doesn't match chunk count {}",
            embeddings.len(),
            chunks.len()
        )));
    }

    let dimensions = embeddings.first().map(Vec::len).unwrap_or_default();

    chunks
        .iter()
        .zip(embeddings.iter())
        .map(|(chunk, embedding)| {
            if embedding.len() != dimensions {
                return Err(SearchError::Request(format!(
                    "embedding dimension {} != {}",
                    embedding.len(),
                    dimensions
                )));
            }

            Ok(json!({
                "id": point_id(&chunk.chunk_id).to_string(),
                "vector": embedding,
                "payload": {
                    "chunk_id": chunk.chunk_id,
                    "chunk_index": chunk.chunk_index,
                    "text": chunk.text,
                    "metadata": chunk.metadata,
                },
            }))
        })
        .collect()
}

fn parse_hits(parsed: &Value) -> Result<Vec<SearchCandidate>, SearchError> {
    let hits = parsed
        .pointer("/result")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut result = Vec::with_capacity(hits.len());
    for hit in hits {
        let chunk_id = hit
            .pointer("/payload/chunk_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| hit.pointer("/id").map(|id| id.to_string()))
            .unwrap_or_default();
        let text = hit
            .pointer("/payload/text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let score = hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0);
        let metadata = match hit.pointer("/payload/metadata") {
            Some(value) => serde_json::from_value::<DocumentMetadata>(value.clone())?,
            None => DocumentMetadata::new(),
        };

        result.push(SearchCandidate {
            chunk_id,
            score,
            text,
            metadata,
        });
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DATE_KEY, SOURCE_KEY, TOPIC_KEY, YEAR_KEY};

    fn chunk(id: &str, text: &str) -> MeetingChunk {
        let mut metadata = DocumentMetadata::new();
        metadata.insert(SOURCE_KEY, "meetings/2024-03-15_Project_Kickoff.md");
        metadata.insert(DATE_KEY, "2024-03-15");
        metadata.insert(YEAR_KEY, 2024);
        MeetingChunk {
            chunk_id: id.to_string(),
            chunk_index: 0,
            text: text.to_string(),
            metadata,
        }
    }

    #[test]
    fn points_carry_metadata_payload_and_stable_ids() -> Result<(), SearchError> {
        let chunks = vec![chunk("abc", "We chose Rust.")];
        let points = build_points(&chunks, &[vec![0.1, 0.2]])?;

        assert_eq!(points.len(), 1);
        assert_eq!(
            points[0].pointer("/id").and_then(Value::as_str),
            Some(point_id("abc").to_string().as_str())
        );
        assert_eq!(
            points[0].pointer("/payload/metadata/year").and_then(Value::as_i64),
            Some(2024)
        );
        assert_eq!(point_id("abc"), point_id("abc"));
        assert_ne!(point_id("abc"), point_id("abd"));
        Ok(())
    }

    #[test]
    fn mismatched_embeddings_are_rejected() {
        let chunks = vec![chunk("a", "one"), chunk("b", "two")];
        assert!(build_points(&chunks, &[vec![0.1]]).is_err());
        assert!(build_points(&chunks, &[vec![0.1], vec![0.1, 0.2]]).is_err());
    }

    #[test]
    fn search_hits_are_parsed_with_metadata() -> Result<(), SearchError> {
        let response = json!({
            "result": [{
                "id": "6f1c7c1e-0000-5000-8000-000000000000",
                "score": 0.83,
                "payload": {
                    "chunk_id": "abc",
                    "chunk_index": 0,
                    "text": "We chose Rust.",
                    "metadata": { "topic": "Project Kickoff", "year": 2024 }
                }
            }],
            "status": "ok"
        });

        let hits = parse_hits(&response)?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "abc");
        assert_eq!(hits[0].text, "We chose Rust.");
        assert_eq!(hits[0].metadata.text(TOPIC_KEY), Some("Project Kickoff"));
        assert_eq!(hits[0].metadata.integer(YEAR_KEY), Some(2024));
        Ok(())
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        assert!(QdrantStore::new("localhost without scheme", DEFAULT_COLLECTION).is_err());
        assert!(QdrantStore::new(DEFAULT_QDRANT_URL, " ").is_err());
    }
}
