pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod loader;
pub mod meeting;
pub mod metadata;
pub mod models;
pub mod orchestrator;
pub mod stores;
pub mod traits;

pub use chunking::{Chunker, ChunkingConfig, DEFAULT_SEPARATORS};
pub use embeddings::{
    Embedder, OllamaEmbedder, OpenAiEmbedder, DEFAULT_OLLAMA_EMBEDDING_MODEL,
    DEFAULT_OLLAMA_URL, DEFAULT_OPENAI_EMBEDDING_MODEL,
};
pub use error::{IngestError, LoadFailure, SearchError};
pub use ingest::{discover_meeting_files, CorpusWalker, IngestionReport, SkippedFile};
pub use llm::{
    format_sources, render_prompt, AnswerModel, OllamaChat, OpenAiChat,
    DEFAULT_OLLAMA_COMPLETION_MODEL, DEFAULT_OPENAI_COMPLETION_MODEL,
};
pub use loader::{load_document, LoadOutcome};
pub use meeting::MeetingDraft;
pub use metadata::{metadata_from_content, metadata_from_filename};
pub use models::{
    Answer, DocumentMetadata, IngestionOptions, LogicalDocument, MeetingChunk, MetadataValue,
    SearchCandidate, SearchQuery,
};
pub use orchestrator::MeetingAssistant;
pub use stores::{QdrantStore, DEFAULT_COLLECTION, DEFAULT_QDRANT_URL};
pub use traits::VectorIndex;
