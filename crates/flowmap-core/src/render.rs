use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::{RenderError, Settings};

/// Turns a diagram source file into an image file.
#[async_trait]
pub trait DiagramRenderer: Send + Sync {
    async fn render(&self, source: &Path, output: &Path) -> Result<(), RenderError>;
}

/// Renders through mermaid-cli (`mmdc -i <source> -o <output> -t <theme>`).
/// The output format follows the output file's extension.
#[derive(Debug, Clone)]
pub struct MermaidCli {
    program: String,
    theme: String,
}

impl MermaidCli {
    pub fn new(program: impl Into<String>, theme: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            theme: theme.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.renderer, &settings.theme)
    }
}

#[async_trait]
impl DiagramRenderer for MermaidCli {
    async fn render(&self, source: &Path, output: &Path) -> Result<(), RenderError> {
        let program = which::which(&self.program)
            .map_err(|_| RenderError::ProgramNotFound(self.program.clone()))?;

        // A stale image from an earlier run must not pass for fresh output.
        match tokio::fs::remove_file(output).await {
            Ok(()) => log::debug!("removed stale {}", output.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(RenderError::StaleOutput {
                    path: output.to_path_buf(),
                    source,
                })
            }
        }

        let result = Command::new(program)
            .arg("-i")
            .arg(source)
            .arg("-o")
            .arg(output)
            .arg("-t")
            .arg(&self.theme)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| RenderError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
        if !result.status.success() {
            return Err(RenderError::Failed {
                status: result.status.to_string(),
                stderr,
            });
        }
        if !stderr.is_empty() {
            log::debug!("{} stderr: {stderr}", self.program);
        }
        if tokio::fs::metadata(output).await.is_err() {
            return Err(RenderError::MissingOutput(output.to_path_buf()));
        }

        log::info!("diagram rendered: {}", output.display());
        Ok(())
    }
}
