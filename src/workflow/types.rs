//! Request, result, and per-query state types for the retrieval workflow.

use crate::documents::Metadata;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Question submitted to the workflow.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    /// Natural-language question.
    pub query: String,
    /// Requested number of documents; defaults to the configured maximum.
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// Document returned by a query together with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedDocument {
    /// Identifier of the stored document.
    pub id: Uuid,
    /// Stored text body.
    pub content: String,
    /// Stored metadata.
    pub metadata: Metadata,
    /// Cosine similarity to the query, in `[-1, 1]`.
    pub score: f32,
}

/// What happened during answer synthesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SynthesisOutcome {
    /// An answer was produced.
    Generated {
        /// Synthesizer that produced the answer.
        synthesizer: String,
    },
    /// The synthesizer failed; ranked documents are returned without an answer.
    Unavailable {
        /// Synthesizer that failed.
        synthesizer: String,
        /// Failure description.
        reason: String,
    },
    /// No synthesizer is configured.
    Disabled,
    /// Retrieval found nothing to synthesize from.
    NoDocuments,
}

impl SynthesisOutcome {
    /// Whether synthesis was attempted and failed.
    pub fn fell_back(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Outcome of a workflow execution.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    /// Question as submitted.
    pub query: String,
    /// Effective number of documents requested after clamping.
    pub top_k: usize,
    /// Ranked documents, best first.
    pub documents: Vec<RetrievedDocument>,
    /// Synthesized answer, when one was produced.
    pub answer: Option<String>,
    /// Synthesis status.
    pub synthesis: SynthesisOutcome,
    /// Stages completed, in order.
    pub processing_steps: Vec<String>,
    /// Wall-clock duration of the execution.
    pub processing_time_ms: u64,
}

/// State threaded through the workflow stages of a single query.
///
/// Owned by one execution and dropped when the result is built.
#[derive(Debug)]
pub(crate) struct WorkflowState {
    pub(crate) query: String,
    pub(crate) top_k: usize,
    pub(crate) query_embedding: Vec<f32>,
    pub(crate) candidates: Vec<RetrievedDocument>,
    pub(crate) answer: Option<String>,
    pub(crate) synthesis: SynthesisOutcome,
    pub(crate) processing_steps: Vec<String>,
}

impl WorkflowState {
    pub(crate) fn new(query: String, top_k: usize) -> Self {
        Self {
            query,
            top_k,
            query_embedding: Vec::new(),
            candidates: Vec::new(),
            answer: None,
            synthesis: SynthesisOutcome::Disabled,
            processing_steps: Vec::new(),
        }
    }

    pub(crate) fn step(&mut self, name: &str) {
        self.processing_steps.push(name.to_string());
    }

    pub(crate) fn into_result(self, processing_time_ms: u64) -> QueryResult {
        QueryResult {
            query: self.query,
            top_k: self.top_k,
            documents: self.candidates,
            answer: self.answer,
            synthesis: self.synthesis,
            processing_steps: self.processing_steps,
            processing_time_ms,
        }
    }
}
