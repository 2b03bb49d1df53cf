use std::fmt;
use std::path::{Path, PathBuf};

use flowmap_core::fetch::{ensure_cloned, RepositoryFetcher};
use flowmap_core::render::DiagramRenderer;
use flowmap_core::scan::scan_directory;
use flowmap_core::{RenderError, Settings};

use crate::context::{plain_context, retrieval_context};
use crate::embed::Embedder;
use crate::engine::LanguageModel;
use crate::{
    parse, prompt, Branch, ContextBuildError, DiagramArtifact, InvocationError, PipelineError,
    RunReport, Stage,
};

/// Sequences fetch, scan, context building, model invocation, diagram
/// extraction and rendering. The retrieval branch is tried first when
/// enabled; anything that goes wrong in it falls back to the plain branch.
pub struct Pipeline<'a> {
    settings: &'a Settings,
    fetcher: &'a dyn RepositoryFetcher,
    model: &'a dyn LanguageModel,
    embedder: &'a dyn Embedder,
    renderer: &'a dyn DiagramRenderer,
}

struct BranchOutput {
    analysis: String,
    artifact: DiagramArtifact,
}

enum BranchFailure {
    Invocation(InvocationError),
    NoDiagram {
        analysis: String,
    },
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    Render {
        analysis: String,
        source_path: PathBuf,
        error: RenderError,
    },
}

impl fmt::Display for BranchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchFailure::Invocation(e) => write!(f, "model: {e}"),
            BranchFailure::NoDiagram { .. } => f.write_str("no mermaid block in model output"),
            BranchFailure::Write { path, source } => {
                write!(f, "failed to write {}: {source}", path.display())
            }
            BranchFailure::Render { error, .. } => write!(f, "render: {error}"),
        }
    }
}

enum RetrievalFailure {
    Context(ContextBuildError),
    Analysis(BranchFailure),
}

impl fmt::Display for RetrievalFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalFailure::Context(e) => write!(f, "context: {e}"),
            RetrievalFailure::Analysis(failure) => write!(f, "{failure}"),
        }
    }
}

impl<'a> Pipeline<'a> {
    pub fn new(
        settings: &'a Settings,
        fetcher: &'a dyn RepositoryFetcher,
        model: &'a dyn LanguageModel,
        embedder: &'a dyn Embedder,
        renderer: &'a dyn DiagramRenderer,
    ) -> Self {
        Self {
            settings,
            fetcher,
            model,
            embedder,
            renderer,
        }
    }

    /// Run to completion. Only an unreadable source tree, a failed model call
    /// in the plain branch, or an unwritable output directory abort the run;
    /// everything else is reported as a warning.
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let settings = self.settings;
        let mut warnings = Vec::new();

        self.enter(Stage::Fetching);
        let fetched = ensure_cloned(self.fetcher, &settings.repo_url, &settings.clone_dir).await;
        if let Err(e) = fetched {
            log::error!("clone failed, continuing with what is on disk: {e}");
            warnings.push(format!("clone failed: {e}"));
        }

        self.enter(Stage::Scanning);
        let bundle = scan_directory(&settings.clone_dir, &settings.extension)?;
        let bundle_text = bundle.text();

        if settings.use_retrieval {
            match self.retrieval_branch(&bundle_text).await {
                Ok(output) => {
                    self.enter(Stage::Done);
                    return Ok(RunReport {
                        branch: Branch::Retrieval,
                        files_scanned: bundle.len(),
                        analysis: output.analysis,
                        artifact: Some(output.artifact),
                        warnings,
                    });
                }
                Err(failure) => {
                    log::warn!(
                        "retrieval analysis failed, falling back to plain context: {failure}"
                    );
                    warnings.push(format!("retrieval branch: {failure}"));
                }
            }
        }

        self.enter(Stage::BuildingContext(Branch::Plain));
        let context = plain_context(&bundle_text, settings.context_limit);

        let (analysis, artifact) = match self.analyse(Branch::Plain, &context).await {
            Ok(output) => (output.analysis, Some(output.artifact)),
            Err(BranchFailure::NoDiagram { analysis }) => {
                log::warn!("no mermaid code block found in model output");
                warnings.push("no mermaid code block found in model output".to_string());
                (analysis, None)
            }
            Err(BranchFailure::Render {
                analysis,
                source_path,
                error,
            }) => {
                log::warn!(
                    "diagram not rendered, source kept at {}: {error}",
                    source_path.display()
                );
                warnings.push(format!("render failed: {error}"));
                (analysis, None)
            }
            Err(BranchFailure::Invocation(e)) => return Err(PipelineError::Invocation(e)),
            Err(BranchFailure::Write { path, source }) => {
                return Err(PipelineError::Write { path, source })
            }
        };

        self.enter(Stage::Done);
        Ok(RunReport {
            branch: Branch::Plain,
            files_scanned: bundle.len(),
            analysis,
            artifact,
            warnings,
        })
    }

    async fn retrieval_branch(
        &self,
        bundle_text: &str,
    ) -> Result<BranchOutput, RetrievalFailure> {
        self.enter(Stage::BuildingContext(Branch::Retrieval));
        let context = retrieval_context(bundle_text, self.embedder, self.settings)
            .await
            .map_err(RetrievalFailure::Context)?;
        self.analyse(Branch::Retrieval, &context)
            .await
            .map_err(RetrievalFailure::Analysis)
    }

    async fn analyse(&self, branch: Branch, context: &str) -> Result<BranchOutput, BranchFailure> {
        let prompt = prompt::analysis_prompt(context);

        self.enter(Stage::Invoking(branch));
        let analysis = self
            .model
            .invoke(&prompt)
            .await
            .map_err(BranchFailure::Invocation)?;

        self.enter(Stage::Extracting(branch));
        let Some(source) = parse::extract_diagram(&analysis) else {
            return Err(BranchFailure::NoDiagram { analysis });
        };

        self.enter(Stage::Rendering(branch));
        let (source_path, image_path) = branch.output_paths(&self.settings.output_dir);
        if let Err(e) = write_source(&source_path, &source).await {
            return Err(BranchFailure::Write {
                path: source_path,
                source: e,
            });
        }
        log::info!("diagram source saved as {}", source_path.display());

        if let Err(error) = self.renderer.render(&source_path, &image_path).await {
            return Err(BranchFailure::Render {
                analysis,
                source_path,
                error,
            });
        }

        Ok(BranchOutput {
            analysis,
            artifact: DiagramArtifact {
                source,
                source_path,
                image_path,
            },
        })
    }

    fn enter(&self, stage: Stage) {
        log::info!("[{stage}]");
    }
}

async fn write_source(path: &Path, source: &str) -> std::io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(path, source).await
}
