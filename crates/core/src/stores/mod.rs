pub mod qdrant;

pub use qdrant::{QdrantStore, DEFAULT_COLLECTION, DEFAULT_QDRANT_URL};
