pub mod error;
pub mod fetch;
pub mod render;
pub mod scan;

pub use error::{ConfigError, FetchError, RenderError, ScanError};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_REPO_URL: &str =
    "https://github.com/rahulmoundekar/spring-boot-CURDRepository-Data.git";
pub const DEFAULT_PROVIDER: &str = "ollama";
pub const DEFAULT_MODEL: &str = "mistral";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_RETRIEVAL_QUERY: &str =
    "API call flow between controllers, services and the database";

/// Everything a pipeline run needs, read once at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub repo_url: String,
    pub provider: String,
    pub model: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    pub ollama_url: String,
    pub embedding_model: String,
    /// File name suffix the scanner matches, e.g. ".java"
    pub extension: String,
    pub clone_dir: PathBuf,
    /// History depth for `git clone`. `None` clones full history.
    pub clone_depth: Option<u32>,
    pub output_dir: PathBuf,
    /// Upper bound, in characters, on the source context placed in a prompt
    pub context_limit: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    /// Texts sent per embedding request
    pub embed_batch_size: usize,
    /// Text embedded as the similarity query. `None` falls back to the
    /// index's insertion order.
    pub retrieval_query: Option<String>,
    pub use_retrieval: bool,
    pub renderer: String,
    pub theme: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            repo_url: DEFAULT_REPO_URL.to_string(),
            provider: DEFAULT_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: String::new(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            extension: ".java".to_string(),
            clone_dir: PathBuf::from("cloned_repo"),
            clone_depth: Some(1),
            output_dir: PathBuf::from("."),
            context_limit: 12_000,
            chunk_size: 1000,
            chunk_overlap: 100,
            top_k: 4,
            embed_batch_size: 32,
            retrieval_query: Some(DEFAULT_RETRIEVAL_QUERY.to_string()),
            use_retrieval: true,
            renderer: "mmdc".to_string(),
            theme: "default".to_string(),
        }
    }
}

impl Settings {
    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    /// Overlay values from `lookup`. Empty values count as unset.
    pub fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("REPO_URL") {
            self.repo_url = url;
        }
        if let Some(provider) = get("FLOWMAP_PROVIDER") {
            self.provider = provider;
        }
        if let Some(model) = get("OLLAMA_MODEL") {
            self.model = model;
        }
        if let Some(key) = get("FLOWMAP_API_KEY") {
            self.api_key = key;
        }
        if let Some(url) = get("OLLAMA_BASE_URL") {
            self.ollama_url = url;
        }
        if let Some(model) = get("FLOWMAP_EMBEDDING_MODEL") {
            self.embedding_model = model;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.extension.is_empty() {
            return Err(ConfigError::Invalid("extension must not be empty".into()));
        }
        if self.context_limit == 0 {
            return Err(ConfigError::Invalid("contextLimit must be positive".into()));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunkSize must be positive".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::Invalid(format!(
                "chunkOverlap ({}) must be smaller than chunkSize ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(ConfigError::Invalid("topK must be positive".into()));
        }
        if self.embed_batch_size == 0 {
            return Err(ConfigError::Invalid("embedBatchSize must be positive".into()));
        }
        if self.clone_depth == Some(0) {
            return Err(ConfigError::Invalid("cloneDepth must be positive or null".into()));
        }
        Ok(())
    }
}

/// Whether the model settings are complete enough to attempt a call.
/// Local Ollama models need no API key.
pub fn model_configured(settings: &Settings) -> bool {
    !settings.provider.is_empty()
        && !settings.model.is_empty()
        && (settings.provider == "ollama" || !settings.api_key.is_empty())
}

pub fn flowmap_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".flowmap")
}

pub fn settings_path() -> PathBuf {
    flowmap_dir().join("settings.json")
}

pub fn read_settings() -> Result<Settings, ConfigError> {
    read_settings_from(&settings_path())
}

/// Read settings from `path`. A missing file yields the defaults; fields
/// absent from the file keep their default values.
pub fn read_settings_from(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_settings(settings: &Settings) -> Result<PathBuf, ConfigError> {
    let path = settings_path();
    write_settings_to(&path, settings)?;
    Ok(path)
}

pub fn write_settings_to(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(write_err)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn env_overrides_ignore_empty_values() {
        let vars: HashMap<&str, &str> = [
            ("OLLAMA_MODEL", "llama3"),
            ("REPO_URL", "   "),
            ("OLLAMA_BASE_URL", "http://gpu-box:11434"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings.apply_vars(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(settings.model, "llama3");
        assert_eq!(settings.repo_url, DEFAULT_REPO_URL);
        assert_eq!(settings.ollama_url, "http://gpu-box:11434");
    }

    #[test]
    fn partial_settings_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"model":"codellama","topK":8}"#).unwrap();

        let settings = read_settings_from(&path).unwrap();
        assert_eq!(settings.model, "codellama");
        assert_eq!(settings.top_k, 8);
        assert_eq!(settings.context_limit, 12_000);
        assert_eq!(settings.extension, ".java");
    }

    #[test]
    fn null_clone_depth_means_full_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"cloneDepth":null,"embedBatchSize":16}"#).unwrap();

        let settings = read_settings_from(&path).unwrap();
        assert_eq!(settings.clone_depth, None);
        assert_eq!(settings.embed_batch_size, 16);
        assert_eq!(Settings::default().clone_depth, Some(1));
    }

    #[test]
    fn missing_settings_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let settings = read_settings_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn malformed_settings_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            read_settings_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn settings_survive_a_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let mut settings = Settings::default();
        settings.retrieval_query = None;
        settings.use_retrieval = false;

        write_settings_to(&path, &settings).unwrap();
        assert_eq!(read_settings_from(&path).unwrap(), settings);
    }

    #[test]
    fn validate_rejects_overlap_not_below_chunk_size() {
        let mut settings = Settings::default();
        settings.chunk_overlap = settings.chunk_size;
        assert!(settings.validate().is_err());

        settings.chunk_overlap = 0;
        assert!(settings.validate().is_ok());

        settings.top_k = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_batch_and_depth() {
        let mut settings = Settings::default();
        settings.embed_batch_size = 0;
        assert!(settings.validate().is_err());

        settings.embed_batch_size = 32;
        settings.clone_depth = Some(0);
        assert!(settings.validate().is_err());

        settings.clone_depth = None;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn remote_providers_need_a_key() {
        let mut settings = Settings::default();
        assert!(model_configured(&settings));

        settings.provider = "openai".into();
        assert!(!model_configured(&settings));
        settings.api_key = "sk-test".into();
        assert!(model_configured(&settings));
    }
}
