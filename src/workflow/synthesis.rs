//! Answer synthesis over ranked documents.
//!
//! Synthesis is optional. The extractive strategy needs no network access and quotes the best
//! match; the Ollama strategy asks a local model to answer from the retrieved context. A
//! failing synthesizer never fails the query: the workflow reports the failure in the result.

use crate::config::{Config, SynthesisBackend};
use crate::workflow::types::RetrievedDocument;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Characters of the top document quoted by the extractive synthesizer.
const EXTRACT_CHARS: usize = 200;
/// Characters of each document included in a generation prompt.
const PROMPT_DOCUMENT_CHARS: usize = 1_000;

/// Errors surfaced while synthesizing an answer.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// Provider was unreachable.
    #[error("Synthesis provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate answer: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by answer synthesizers.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Produce an answer to `query` from ranked documents (never empty).
    async fn synthesize(
        &self,
        query: &str,
        documents: &[RetrievedDocument],
    ) -> Result<String, SynthesisError>;

    /// Short identifier reported in query results.
    fn name(&self) -> &'static str;
}

/// Build the synthesizer selected by configuration; `None` when synthesis is disabled.
pub fn build_synthesizer(config: &Config) -> Result<Option<Arc<dyn Synthesizer>>, SynthesisError> {
    let synthesizer: Option<Arc<dyn Synthesizer>> = match config.synthesis_provider {
        SynthesisBackend::None => None,
        SynthesisBackend::Extractive => Some(Arc::new(ExtractiveSynthesizer)),
        SynthesisBackend::Ollama => Some(Arc::new(OllamaSynthesizer::new(
            config.ollama_url.clone(),
            config.synthesis_model.clone(),
            config.request_timeout(),
        )?)),
    };
    tracing::info!(
        synthesizer = synthesizer.as_ref().map(|s| s.name()).unwrap_or("none"),
        "Answer synthesis configured"
    );
    Ok(synthesizer)
}

/// Quotes the opening of the highest-ranked document.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtractiveSynthesizer;

#[async_trait]
impl Synthesizer for ExtractiveSynthesizer {
    async fn synthesize(
        &self,
        _query: &str,
        documents: &[RetrievedDocument],
    ) -> Result<String, SynthesisError> {
        let top = documents.first().ok_or_else(|| {
            SynthesisError::GenerationFailed("no documents to quote".into())
        })?;
        Ok(format!(
            "Based on the most relevant document: {}...",
            truncate_chars(&top.content, EXTRACT_CHARS)
        ))
    }

    fn name(&self) -> &'static str {
        "extractive"
    }
}

/// Generates answers with an Ollama model via `/api/generate`.
pub struct OllamaSynthesizer {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaSynthesizer {
    /// Create a client for the Ollama runtime at `base_url`.
    pub fn new(base_url: String, model: String, timeout: Duration) -> Result<Self, SynthesisError> {
        let http = Client::builder()
            .user_agent("docqa/synthesis")
            .timeout(timeout)
            .build()
            .map_err(|error| {
                SynthesisError::ProviderUnavailable(format!("failed to build HTTP client: {error}"))
            })?;
        Ok(Self {
            http,
            base_url,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl Synthesizer for OllamaSynthesizer {
    async fn synthesize(
        &self,
        query: &str,
        documents: &[RetrievedDocument],
    ) -> Result<String, SynthesisError> {
        let payload = json!({
            "model": self.model,
            "prompt": build_prompt(query, documents),
            "stream": false,
            "options": {
                "temperature": 0.1,
            }
        });

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                SynthesisError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(SynthesisError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SynthesisError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            SynthesisError::InvalidResponse(format!("failed to decode Ollama response: {error}"))
        })?;

        if !body.done {
            return Err(SynthesisError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        let answer = body.response.trim();
        if answer.is_empty() {
            return Err(SynthesisError::InvalidResponse(
                "Ollama returned an empty answer".into(),
            ));
        }
        Ok(answer.to_string())
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}

fn build_prompt(query: &str, documents: &[RetrievedDocument]) -> String {
    let mut prompt = String::from(
        "Answer the question using only the numbered context passages. \
         If the context does not contain the answer, say so.\n\nContext:\n",
    );
    for (index, document) in documents.iter().enumerate() {
        prompt.push_str(&format!(
            "[{}] {}\n",
            index + 1,
            truncate_chars(&document.content, PROMPT_DOCUMENT_CHARS)
        ));
    }
    prompt.push_str(&format!("\nQuestion: {query}\nAnswer:"));
    prompt
}

/// Longest prefix of `text` holding at most `max` characters.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}
