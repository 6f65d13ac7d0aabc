use crate::{MeetingChunk, SearchCandidate, SearchError};
use async_trait::async_trait;

#[async_trait]
pub trait VectorIndex {
    async fn ensure_collection(&self, dimensions: usize) -> Result<(), SearchError>;

    async fn index_chunks(
        &self,
        chunks: &[MeetingChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), SearchError>;

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchCandidate>, SearchError>;

    /// Drops everything indexed so far.
    async fn reset(&self) -> Result<(), SearchError>;
}
