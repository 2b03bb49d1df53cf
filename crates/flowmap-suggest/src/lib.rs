pub mod context;
pub mod embed;
pub mod engine;
mod error;
pub mod index;
pub mod parse;
pub mod pipeline;
pub mod prompt;

pub use error::{ContextBuildError, InvocationError, PipelineError};
pub use pipeline::Pipeline;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Which context-building path produced an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Branch {
    Plain,
    Retrieval,
}

impl Branch {
    fn file_stem(self) -> &'static str {
        match self {
            Branch::Plain => "diagram",
            Branch::Retrieval => "diagram-rag",
        }
    }

    /// Diagram source and image paths for this branch under `dir`.
    pub fn output_paths(self, dir: &Path) -> (PathBuf, PathBuf) {
        let stem = self.file_stem();
        (
            dir.join(format!("{stem}.mmd")),
            dir.join(format!("{stem}.svg")),
        )
    }
}

/// Pipeline states, logged on entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Scanning,
    BuildingContext(Branch),
    Invoking(Branch),
    Extracting(Branch),
    Rendering(Branch),
    Done,
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Branch::Plain => "plain",
            Branch::Retrieval => "retrieval",
        })
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Fetching => f.write_str("fetching"),
            Stage::Scanning => f.write_str("scanning"),
            Stage::BuildingContext(b) => write!(f, "building context ({b})"),
            Stage::Invoking(b) => write!(f, "invoking model ({b})"),
            Stage::Extracting(b) => write!(f, "extracting diagram ({b})"),
            Stage::Rendering(b) => write!(f, "rendering ({b})"),
            Stage::Done => f.write_str("done"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramArtifact {
    pub source: String,
    pub source_path: PathBuf,
    pub image_path: PathBuf,
}

/// Outcome of a run that reached `Done`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub branch: Branch,
    pub files_scanned: usize,
    pub analysis: String,
    pub artifact: Option<DiagramArtifact>,
    pub warnings: Vec<String>,
}
