use crate::embeddings::Embedder;
use crate::llm::{build_context, render_prompt, AnswerModel};
use crate::traits::VectorIndex;
use crate::{Answer, MeetingChunk, SearchCandidate, SearchError, SearchQuery};
use tracing::{debug, info};

/// Ties an embedder, a vector index and an answer model together.
pub struct MeetingAssistant<V, E, L>
where
    V: VectorIndex,
    E: Embedder,
    L: AnswerModel,
{
    store: V,
    embedder: E,
    model: L,
    top_k: usize,
}

impl<V, E, L> MeetingAssistant<V, E, L>
where
    V: VectorIndex + Send + Sync,
    E: Embedder + Send + Sync,
    L: AnswerModel + Send + Sync,
{
    pub fn new(store: V, embedder: E, model: L) -> Self {
        Self {
            store,
            embedder,
            model,
            top_k: SearchQuery::DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn store(&self) -> &V {
        &self.store
    }

    /// Embeds and upserts chunks, returning how many were indexed.
    pub async fn index(&self, chunks: &[MeetingChunk]) -> Result<usize, SearchError> {
        self.embed_and_store(chunks, false).await
    }

    /// Replaces the whole index with `chunks`. The store is only cleared once
    /// every chunk has been embedded, so an embedder failure leaves it intact.
    pub async fn reindex(&self, chunks: &[MeetingChunk]) -> Result<usize, SearchError> {
        self.embed_and_store(chunks, true).await
    }

    async fn embed_and_store(
        &self,
        chunks: &[MeetingChunk],
        reset: bool,
    ) -> Result<usize, SearchError> {
        if chunks.is_empty() {
            if reset {
                self.store.reset().await?;
            }
            return Ok(0);
        }

        let texts = chunks
            .iter()
            .map(|chunk| chunk.text.clone())
            .collect::<Vec<_>>();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let dimensions = embeddings.first().map(Vec::len).unwrap_or_default();
        if dimensions == 0 {
            return Err(SearchError::BackendResponse {
                backend: self.embedder.model().to_string(),
                details: "embedder returned empty vectors".to_string(),
            });
        }

        if reset {
            self.store.reset().await?;
        }
        self.store.ensure_collection(dimensions).await?;
        self.store.index_chunks(chunks, &embeddings).await?;

        info!(
            chunk_count = chunks.len(),
            dimensions,
            reset,
            embedding_model = self.embedder.model(),
            "indexed meeting chunks"
        );
        Ok(chunks.len())
    }

    pub async fn retrieve(&self, query: &SearchQuery) -> Result<Vec<SearchCandidate>, SearchError> {
        if query.text.trim().is_empty() {
            return Err(SearchError::Request("query is empty".to_string()));
        }

        let query_vector = self.embedder.embed(&query.text).await?;
        let hits = self.store.search(&query_vector, query.top_k.max(1)).await?;
        debug!(query = %query.text, hit_count = hits.len(), "retrieved chunks");
        Ok(hits)
    }

    pub async fn answer(&self, question: &str) -> Result<Answer, SearchError> {
        let query = SearchQuery {
            text: question.to_string(),
            top_k: self.top_k,
        };
        let sources = self.retrieve(&query).await?;

        let prompt = render_prompt(&build_context(&sources), question);
        let text = self.model.complete(&prompt).await?;
        debug!(completion_model = self.model.model(), "generated answer");

        Ok(Answer {
            question: question.to_string(),
            text,
            sources,
        })
    }
}
