#![deny(missing_docs)]

//! Core library for the docqa document ingestion and retrieval service.

/// HTTP routing and REST handlers.
pub mod api;
/// Composition root wiring configuration into services.
pub mod app;
/// Environment-driven configuration management.
pub mod config;
/// Document model, validation, and lifecycle service.
pub mod documents;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Service-level error taxonomy.
pub mod error;
/// Structured logging and tracing setup.
pub mod logging;
/// Service activity counters.
pub mod metrics;
/// Qdrant vector store integration.
pub mod qdrant;
/// Storage abstraction and the in-process backend.
pub mod repository;
/// Retrieval-augmented query workflow.
pub mod workflow;
