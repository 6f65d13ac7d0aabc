use crate::embeddings::{validated_api_key, validated_base, DEFAULT_OPENAI_URL};
use crate::error::SearchError;
use crate::models::{SearchCandidate, DATE_KEY, SOURCE_KEY, TOPIC_KEY};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

pub const DEFAULT_OLLAMA_COMPLETION_MODEL: &str = "llama3";
pub const DEFAULT_OPENAI_COMPLETION_MODEL: &str = "gpt-3.5-turbo";
pub const ANSWER_TEMPERATURE: f32 = 0.1;

pub const MEETING_QA_TEMPLATE: &str = "
You are an assistant that helps retrieve information from meeting summaries.
Use the following pieces of context to answer the question at the end.
If you don't know the answer, just say that you don't know, don't try to make up an answer.

Context:
{context}

Question: {question}

Answer:
";

#[async_trait]
pub trait AnswerModel {
    fn model(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, SearchError>;
}

#[async_trait]
impl<T> AnswerModel for Box<T>
where
    T: AnswerModel + Send + Sync + ?Sized,
{
    fn model(&self) -> &str {
        (**self).model()
    }

    async fn complete(&self, prompt: &str) -> Result<String, SearchError> {
        (**self).complete(prompt).await
    }
}

pub fn render_prompt(context: &str, question: &str) -> String {
    MEETING_QA_TEMPLATE
        .replace("{context}", context)
        .replace("{question}", question)
}

/// Chunk texts in retrieval order, separated by blank lines.
pub fn build_context(candidates: &[SearchCandidate]) -> String {
    candidates
        .iter()
        .map(|candidate| candidate.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn format_sources(candidates: &[SearchCandidate]) -> String {
    if candidates.is_empty() {
        return "No source documents found.".to_string();
    }

    let mut formatted = String::from("Sources:\n");
    for (position, candidate) in candidates.iter().enumerate() {
        let metadata = &candidate.metadata;
        let source = metadata.text(SOURCE_KEY).unwrap_or("Unknown");
        let date = metadata.text(DATE_KEY).unwrap_or("Unknown date");
        let topic = metadata.text(TOPIC_KEY).unwrap_or("Unknown topic");
        formatted.push_str(&format!("{}. {topic} ({date}) - {source}\n", position + 1));
    }
    formatted
}

pub struct OllamaChat {
    client: Client,
    endpoint: String,
    model: String,
}

impl OllamaChat {
    pub fn new(base_url: &str, model: impl Into<String>) -> Result<Self, SearchError> {
        Ok(Self {
            client: Client::new(),
            endpoint: validated_base(base_url)?,
            model: model.into(),
        })
    }
}

#[async_trait]
impl AnswerModel for OllamaChat {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, SearchError> {
        let response = self
            .client
            .post(format!("{}/api/generate", self.endpoint))
            .json(&json!({
                "model": self.model,
                "prompt": prompt,
                "stream": false,
                "options": { "temperature": ANSWER_TEMPERATURE },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "ollama".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        extract_text(&parsed, "/response", "ollama")
    }
}

pub struct OpenAiChat {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiChat {
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
impl AnswerModel for OpenAiChat {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, SearchError> {
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "temperature": ANSWER_TEMPERATURE,
                "messages": [{ "role": "user", "content": prompt }],
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "openai".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        extract_text(&parsed, "/choices/0/message/content", "openai")
    }
}

fn extract_text(payload: &Value, pointer: &str, backend: &str) -> Result<String, SearchError> {
    payload
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(|text| text.trim().to_string())
        .ok_or_else(|| SearchError::BackendResponse {
            backend: backend.to_string(),
            details: format!("response has no text at {pointer}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentMetadata;

    fn candidate(text: &str, topic: Option<&str>, date: Option<&str>) -> SearchCandidate {
        let mut metadata = DocumentMetadata::new();
        metadata.insert(SOURCE_KEY, "meetings/file.md");
        if let Some(topic) = topic {
            metadata.insert(TOPIC_KEY, topic);
        }
        if let Some(date) = date {
            metadata.insert(DATE_KEY, date);
        }
        SearchCandidate {
            chunk_id: "c".to_string(),
            score: 0.9,
            text: text.to_string(),
            metadata,
        }
    }

    #[test]
    fn prompt_embeds_context_and_question() {
        let prompt = render_prompt("We chose Rust.", "Which language?");
        assert!(prompt.contains("Context:\nWe chose Rust.\n"));
        assert!(prompt.contains("Question: Which language?\n"));
        assert!(prompt.trim_end().ends_with("Answer:"));
    }

    #[test]
    fn context_joins_chunks_with_blank_lines() {
        let candidates = vec![candidate("one", None, None), candidate("two", None, None)];
        assert_eq!(build_context(&candidates), "one\n\ntwo");
    }

    #[test]
    fn sources_list_topic_date_and_path() {
        let candidates = vec![
            candidate("a", Some("Project Kickoff"), Some("2024-03-15")),
            candidate("b", None, None),
        ];
        assert_eq!(
            format_sources(&candidates),
            "Sources:\n1. Project Kickoff (2024-03-15) - meetings/file.md\n2. Unknown topic (Unknown date) - meetings/file.md\n"
        );
    }

    #[test]
    fn empty_sources_have_a_placeholder() {
        assert_eq!(format_sources(&[]), "No source documents found.");
    }

    #[test]
    fn completion_payloads_are_parsed() {
        let ollama = json!({ "response": " Rust. ", "done": true });
        assert_eq!(extract_text(&ollama, "/response", "ollama").ok().as_deref(), Some("Rust."));

        let openai = json!({ "choices": [{ "message": { "role": "assistant", "content": "Rust" } }] });
        assert_eq!(
            extract_text(&openai, "/choices/0/message/content", "openai").ok().as_deref(),
            Some("Rust")
        );
        assert!(extract_text(&json!({}), "/response", "ollama").is_err());
    }
}
