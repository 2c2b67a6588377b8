use serde::Serialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable {key}: {value:?}")]
    InvalidValue {
        /// Variable that failed to parse.
        key: String,
        /// Raw value supplied by the environment.
        value: String,
    },
    /// Parsed values violate a configuration invariant.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Runtime configuration for the service.
///
/// Built once at startup and shared read-only (behind an `Arc`) with every component that
/// needs it. Nothing mutates it after construction.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Human-readable application name reported by the debug surface.
    pub app_name: String,
    /// Application version reported by the debug surface.
    pub app_version: String,
    /// Interface the HTTP server binds to.
    pub host: String,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Storage backend holding documents and vectors.
    pub vector_store: VectorStoreBackend,
    /// Base URL of the Qdrant instance that stores embeddings.
    pub qdrant_url: String,
    /// Optional API key required to access Qdrant.
    #[serde(skip)]
    pub qdrant_api_key: Option<String>,
    /// Name of the collection used for document storage.
    pub collection_name: String,
    /// Embedding backend used to generate vector representations.
    pub embedding_provider: EmbeddingBackend,
    /// Embedding model identifier passed to remote providers.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Base URL of the Ollama runtime used for embeddings and synthesis.
    pub ollama_url: String,
    /// Upper bound applied to `top_k` on every query.
    pub max_retrieval_results: usize,
    /// Answer synthesis strategy applied after retrieval.
    pub synthesis_provider: SynthesisBackend,
    /// Generation model used by the Ollama synthesizer.
    pub synthesis_model: String,
    /// Per-request deadline, in seconds, for calls to Qdrant and Ollama.
    pub request_timeout_secs: u64,
}

/// Supported storage backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreBackend {
    /// Remote Qdrant instance.
    Qdrant,
    /// Process-local store; contents are lost on restart.
    Memory,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Deterministic feature-hashing embedder that needs no network access.
    Hash,
    /// Local Ollama runtime.
    Ollama,
}

/// Supported answer synthesis strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisBackend {
    /// Return ranked documents only.
    None,
    /// Quote the best matching document.
    Extractive,
    /// Generate an answer with an Ollama model.
    Ollama,
}

impl Config {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup, applying defaults and validation.
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let text = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let config = Self {
            app_name: text("APP_NAME", "docqa"),
            app_version: text("APP_VERSION", env!("CARGO_PKG_VERSION")),
            host: text("HOST", "0.0.0.0"),
            port: parse_or(get("PORT"), "PORT", 8002)?,
            vector_store: parse_or(get("VECTOR_STORE"), "VECTOR_STORE", VectorStoreBackend::Qdrant)?,
            qdrant_url: text("QDRANT_URL", "http://localhost:6333"),
            qdrant_api_key: get("QDRANT_API_KEY"),
            collection_name: text("COLLECTION_NAME", "documents"),
            embedding_provider: parse_or(
                get("EMBEDDING_PROVIDER"),
                "EMBEDDING_PROVIDER",
                EmbeddingBackend::Hash,
            )?,
            embedding_model: text("EMBEDDING_MODEL", "nomic-embed-text"),
            embedding_dimension: parse_or(get("EMBEDDING_DIMENSION"), "EMBEDDING_DIMENSION", 384)?,
            ollama_url: text("OLLAMA_URL", "http://127.0.0.1:11434"),
            max_retrieval_results: parse_or(
                get("MAX_RETRIEVAL_RESULTS"),
                "MAX_RETRIEVAL_RESULTS",
                5,
            )?,
            synthesis_provider: parse_or(
                get("SYNTHESIS_PROVIDER"),
                "SYNTHESIS_PROVIDER",
                SynthesisBackend::Extractive,
            )?,
            synthesis_model: text("SYNTHESIS_MODEL", "llama3.2"),
            request_timeout_secs: parse_or(
                get("REQUEST_TIMEOUT_SECS"),
                "REQUEST_TIMEOUT_SECS",
                60,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding_dimension == 0 {
            return Err(ConfigError::Invalid(
                "EMBEDDING_DIMENSION must be greater than zero".into(),
            ));
        }
        if self.max_retrieval_results == 0 {
            return Err(ConfigError::Invalid(
                "MAX_RETRIEVAL_RESULTS must be at least 1".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "REQUEST_TIMEOUT_SECS must be at least 1".into(),
            ));
        }
        if self.collection_name.contains('/') {
            return Err(ConfigError::Invalid(
                "COLLECTION_NAME must not contain '/'".into(),
            ));
        }
        Ok(())
    }

    /// Deadline applied to every outbound HTTP request.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
    }
}

impl std::str::FromStr for VectorStoreBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "qdrant" => Ok(Self::Qdrant),
            "memory" | "in-memory" => Ok(Self::Memory),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for EmbeddingBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hash" => Ok(Self::Hash),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for SynthesisBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "off" => Ok(Self::None),
            "extractive" => Ok(Self::Extractive),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

/// Populate the process environment from a `.env` file, when one is present.
///
/// Variables already set in the environment win over file entries. Returns the file that was
/// loaded, or `None` when there was nothing to load. Runs before tracing is installed, so the
/// caller reports the outcome.
pub fn load_dotenv(path: Option<&Path>) -> Result<Option<PathBuf>, dotenvy::Error> {
    let result = match path {
        Some(path) => dotenvy::from_path(path).map(|()| path.to_path_buf()),
        None => dotenvy::dotenv(),
    };
    match result {
        Ok(path) => Ok(Some(path)),
        Err(error) if error.not_found() => Ok(None),
        Err(error) => Err(error),
    }
}
