use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write settings {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed settings {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// The source tree could not be read. Always fatal to a run.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to walk source tree: {0}")]
    Walk(#[from] ignore::Error),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("`{0}` not found in PATH")]
    ProgramNotFound(String),

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("clone of {url} failed ({status}): {stderr}")]
    Clone {
        url: String,
        status: String,
        stderr: String,
    },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("`{0}` not found in PATH")]
    ProgramNotFound(String),

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("renderer exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("failed to remove stale output {}: {source}", .path.display())]
    StaleOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("renderer produced no output at {}", .0.display())]
    MissingOutput(PathBuf),
}
