use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::{FetchError, Settings};

/// Produces a local working copy of a remote repository.
#[async_trait]
pub trait RepositoryFetcher: Send + Sync {
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    AlreadyPresent,
    Cloned,
}

/// Clone `url` into `dest` unless `dest` already exists.
///
/// Only existence is checked, not whether the checkout is complete or even
/// a repository. A failed clone is returned to the caller, which may carry
/// on and let the scanner report the missing tree.
pub async fn ensure_cloned(
    fetcher: &dyn RepositoryFetcher,
    url: &str,
    dest: &Path,
) -> Result<FetchOutcome, FetchError> {
    if tokio::fs::metadata(dest).await.is_ok() {
        log::info!("repository already cloned at {}", dest.display());
        return Ok(FetchOutcome::AlreadyPresent);
    }

    log::info!("cloning {url} into {}", dest.display());
    fetcher.clone_repo(url, dest).await?;
    log::info!("clone successful");
    Ok(FetchOutcome::Cloned)
}

/// Shallow clone through the `git` command line.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    program: String,
    depth: Option<u32>,
}

impl Default for GitFetcher {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
            depth: Some(1),
        }
    }
}

impl GitFetcher {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::default().with_depth(settings.clone_depth)
    }

    /// `None` clones full history.
    pub fn with_depth(mut self, depth: Option<u32>) -> Self {
        self.depth = depth;
        self
    }

    fn clone_args(&self, url: &str, dest: &Path) -> Vec<OsString> {
        let mut args = vec![OsString::from("clone")];
        if let Some(depth) = self.depth {
            args.push("--depth".into());
            args.push(depth.to_string().into());
        }
        args.push(url.into());
        args.push(dest.as_os_str().to_owned());
        args
    }
}

#[async_trait]
impl RepositoryFetcher for GitFetcher {
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        let git = which::which(&self.program)
            .map_err(|_| FetchError::ProgramNotFound(self.program.clone()))?;

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| FetchError::Spawn {
                    program: self.program.clone(),
                    source,
                })?;
        }

        let mut cmd = Command::new(git);
        cmd.args(self.clone_args(url, dest))
            .stdin(Stdio::null())
            .env("GIT_TERMINAL_PROMPT", "0");

        let output = cmd.output().await.map_err(|source| FetchError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(FetchError::Clone {
                url: url.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}
