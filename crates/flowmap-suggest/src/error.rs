use std::path::PathBuf;
use thiserror::Error;

use flowmap_core::ScanError;

/// The retrieval context could not be built. Recovered by falling back to
/// the plain context.
#[derive(Debug, Error)]
pub enum ContextBuildError {
    #[error("embedding request failed: {0}")]
    Request(String),

    #[error("embedding API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("embedder returned {got} vectors for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },

    #[error("invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("build LLM: {0}")]
    Build(String),

    #[error("chat: {0}")]
    Chat(String),

    #[error("LLM returned no text")]
    NoText,

    #[error("LLM returned empty text")]
    EmptyText,
}

/// Conditions that end a run abnormally.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("analysis failed: {0}")]
    Invocation(#[from] InvocationError),

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
