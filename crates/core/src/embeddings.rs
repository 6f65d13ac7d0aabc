use crate::error::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_EMBEDDING_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";
pub const DEFAULT_OPENAI_EMBEDDING_MODEL: &str = "text-embedding-3-small";

#[async_trait]
pub trait Embedder {
    fn model(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

#[async_trait]
impl<T> Embedder for Box<T>
where
    T: Embedder + Send + Sync + ?Sized,
{
    fn model(&self) -> &str {
        (**self).model()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        (**self).embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        (**self).embed_batch(texts).await
    }
}

pub struct OllamaEmbedder {
    client: Client,
    endpoint: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: impl Into<String>) -> Result<Self, SearchError> {
        Ok(Self {
            client: Client::new(),
            endpoint: validated_base(base_url)?,
            model: model.into(),
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        let response = self
            .client
            .post(format!("{}/api/embeddings", self.endpoint))
            .json(&json!({ "model": self.model, "prompt": text }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "ollama".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        parse_ollama_embedding(&parsed)
    }
}

pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, SearchError> {
        Self::with_base_url(DEFAULT_OPENAI_URL, api_key, model)
    }

    pub fn with_base_url(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, SearchError> {
        Ok(Self {
            client: Client::new(),
            endpoint: validated_base(base_url)?,
            api_key: validated_api_key(api_key.into())?,
            model: model.into(),
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| SearchError::BackendResponse {
            backend: "openai".to_string(),
            details: "no embedding returned".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "openai".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        parse_openai_embeddings(&parsed, texts.len())
    }
}

pub(crate) fn validated_base(base_url: &str) -> Result<String, SearchError> {
    let trimmed = base_url.trim().trim_end_matches('/');
    Url::parse(trimmed)?;
    Ok(trimmed.to_string())
}

pub(crate) fn validated_api_key(api_key: String) -> Result<String, SearchError> {
    let api_key = api_key.trim().to_string();
    if api_key.is_empty() {
        return Err(SearchError::Request(
            "an OpenAI API key is required when not using local models".to_string(),
        ));
    }
    Ok(api_key)
}

fn parse_vector(value: &Value, backend: &str) -> Result<Vec<f32>, SearchError> {
    let values = value
        .as_array()
        .ok_or_else(|| SearchError::BackendResponse {
            backend: backend.to_string(),
            details: "embedding is not an array".to_string(),
        })?;

    values
        .iter()
        .map(|item| {
            item.as_f64()
                .map(|number| number as f32)
                .ok_or_else(|| SearchError::BackendResponse {
                    backend: backend.to_string(),
                    details: format!("non-numeric embedding component: {item}"),
                })
        })
        .collect()
}

fn parse_ollama_embedding(payload: &Value) -> Result<Vec<f32>, SearchError> {
    let embedding = payload
        .pointer("/embedding")
        .ok_or_else(|| SearchError::BackendResponse {
            backend: "ollama".to_string(),
            details: "response has no embedding".to_string(),
        })?;
    parse_vector(embedding, "ollama")
}

fn parse_openai_embeddings(payload: &Value, expected: usize) -> Result<Vec<Vec<f32>>, SearchError> {
    let data = payload
        .pointer("/data")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::BackendResponse {
            backend: "openai".to_string(),
            details: "response has no data array".to_string(),
        })?;

    if data.len() != expected {
        return Err(SearchError::BackendResponse {
            backend: "openai".to_string(),
            details: format!("expected {expected} embeddings, got {}", data.len()),
        });
    }

    let mut indexed = data
        .iter()
        .enumerate()
        .map(|(position, item)| {
            let index = item
                .pointer("/index")
                .and_then(Value::as_u64)
                .map(|index| index as usize)
                .unwrap_or(position);
            let embedding = item.pointer("/embedding").ok_or_else(|| {
                SearchError::BackendResponse {
                    backend: "openai".to_string(),
                    details: format!("item {position} has no embedding"),
                }
            })?;
            parse_vector(embedding, "openai").map(|vector| (index, vector))
        })
        .collect::<Result<Vec<_>, SearchError>>()?;

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, vector)| vector).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ollama_payload_is_parsed() {
        let payload = json!({ "embedding": [0.5, -1.0, 2] });
        let vector = parse_ollama_embedding(&payload).expect("embedding should parse");
        assert_eq!(vector, vec![0.5, -1.0, 2.0]);
    }

    #[test]
    fn ollama_payload_without_embedding_is_rejected() {
        let payload = json!({ "error": "model not found" });
        assert!(parse_ollama_embedding(&payload).is_err());
    }

    #[test]
    fn openai_payload_is_reordered_by_index() {
        let payload = json!({
            "data": [
                { "index": 1, "embedding": [2.0] },
                { "index": 0, "embedding": [1.0] }
            ]
        });
        let vectors = parse_openai_embeddings(&payload, 2).expect("embeddings should parse");
        assert_eq!(vectors, vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn openai_payload_with_wrong_count_is_rejected() {
        let payload = json!({ "data": [{ "index": 0, "embedding": [1.0] }] });
        assert!(parse_openai_embeddings(&payload, 2).is_err());
    }

    #[test]
    fn constructors_validate_inputs() {
        assert!(OllamaEmbedder::new("not a url", DEFAULT_OLLAMA_EMBEDDING_MODEL).is_err());
        assert!(OpenAiEmbedder::new("  ", DEFAULT_OPENAI_EMBEDDING_MODEL).is_err());

        let embedder = OllamaEmbedder::new("http://localhost:11434/", "nomic-embed-text")
            .expect("valid base url");
        assert_eq!(embedder.endpoint, "http://localhost:11434");
        assert_eq!(embedder.model(), "nomic-embed-text");
    }
}
