use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;

use flowmap_core::fetch::GitFetcher;
use flowmap_core::render::MermaidCli;
use flowmap_core::Settings;
use flowmap_suggest::embed::OllamaEmbedder;
use flowmap_suggest::engine::LlmEngine;
use flowmap_suggest::Pipeline;

#[derive(Parser, Debug)]
#[command(name = "flowmap")]
#[command(about = "Summarize a repository and draw its data flow as a Mermaid diagram", long_about = None)]
#[command(version)]
struct Cli {
    /// Repository to clone (overrides REPO_URL)
    #[arg(long)]
    repo: Option<String>,

    /// Model name (overrides OLLAMA_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// LLM provider: ollama, openai, anthropic, google, groq, mistral, deepseek
    #[arg(long)]
    provider: Option<String>,

    /// Where the repository is cloned; an existing directory is reused as-is
    #[arg(long)]
    clone_dir: Option<PathBuf>,

    /// Directory for diagram sources and images
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// File name suffix of the sources to analyze, e.g. ".java"
    #[arg(long)]
    extension: Option<String>,

    /// Similarity query used to pick chunks for the retrieval pass
    #[arg(long)]
    query: Option<String>,

    /// Number of chunks the retrieval pass keeps
    #[arg(long)]
    top_k: Option<usize>,

    /// Skip the retrieval pass and analyze the truncated codebase directly
    #[arg(long)]
    no_retrieval: bool,

    /// Settings file (default: ~/.flowmap/settings.json)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Persist the effective settings to the settings file
    #[arg(long)]
    save_settings: bool,

    /// Print the run report as JSON instead of the analysis text
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log only warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn apply(&self, settings: &mut Settings) {
        if let Some(repo) = &self.repo {
            settings.repo_url = repo.clone();
        }
        if let Some(model) = &self.model {
            settings.model = model.clone();
        }
        if let Some(provider) = &self.provider {
            settings.provider = provider.clone();
        }
        if let Some(dir) = &self.clone_dir {
            settings.clone_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            settings.output_dir = dir.clone();
        }
        if let Some(ext) = &self.extension {
            settings.extension = ext.clone();
        }
        if let Some(query) = &self.query {
            settings.retrieval_query = Some(query.clone());
        }
        if let Some(k) = self.top_k {
            settings.top_k = k;
        }
        if self.no_retrieval {
            settings.use_retrieval = false;
        }
    }

    fn load_settings(&self) -> Result<Settings> {
        let mut settings = match &self.settings {
            Some(path) => flowmap_core::read_settings_from(path),
            None => flowmap_core::read_settings(),
        }
        .context("failed to load settings")?;
        settings.apply_env();
        self.apply(&mut settings);
        settings.validate()?;
        Ok(settings)
    }
}

fn init_logging(cli: &Cli) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(&cli);

    let settings = cli.load_settings()?;

    if cli.save_settings {
        match &cli.settings {
            Some(path) => {
                flowmap_core::write_settings_to(path, &settings)?;
                log::info!("settings saved to {}", path.display());
            }
            None => {
                let path = flowmap_core::write_settings(&settings)?;
                log::info!("settings saved to {}", path.display());
            }
        }
    }

    if !flowmap_core::model_configured(&settings) {
        bail!(
            "provider `{}` needs a model name and an API key (FLOWMAP_API_KEY)",
            settings.provider
        );
    }

    let fetcher = GitFetcher::from_settings(&settings);
    let model = LlmEngine::from_settings(&settings)?;
    let embedder = OllamaEmbedder::from_settings(&settings);
    let renderer = MermaidCli::from_settings(&settings);

    log::info!(
        "analyzing {} with {} ({})",
        settings.repo_url,
        settings.provider,
        model.model()
    );

    let report = Pipeline::new(&settings, &fetcher, &model, &embedder, &renderer)
        .run()
        .await
        .context("analysis aborted")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.analysis);
    }

    match &report.artifact {
        Some(artifact) => log::info!(
            "diagram written to {} ({} branch)",
            artifact.image_path.display(),
            report.branch
        ),
        None => log::warn!("finished without a diagram"),
    }
    Ok(())
}
