//! Retrieval-augmented query workflow.

mod service;
pub mod synthesis;
pub mod types;

pub use service::{QueryWorkflow, WorkflowReadiness};
pub use synthesis::{
    ExtractiveSynthesizer, OllamaSynthesizer, SynthesisError, Synthesizer, build_synthesizer,
};
pub use types::{QueryRequest, QueryResult, RetrievedDocument, SynthesisOutcome};
