use async_trait::async_trait;
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::ChatMessage;

use flowmap_core::Settings;

use crate::{prompt, InvocationError};

/// Sends a prompt to a language model and returns its free-text reply.
/// No retries and no timeout at this layer.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn invoke(&self, prompt: &str) -> Result<String, InvocationError>;
}

fn map_backend(provider: &str) -> Result<LLMBackend, InvocationError> {
    match provider {
        "openai" => Ok(LLMBackend::OpenAI),
        "anthropic" => Ok(LLMBackend::Anthropic),
        "google" => Ok(LLMBackend::Google),
        "ollama" => Ok(LLMBackend::Ollama),
        "groq" => Ok(LLMBackend::Groq),
        "mistral" => Ok(LLMBackend::Mistral),
        "deepseek" => Ok(LLMBackend::DeepSeek),
        other => Err(InvocationError::UnknownProvider(other.to_string())),
    }
}

/// [`LanguageModel`] backed by the `llm` crate. Ollama by default.
#[derive(Debug, Clone)]
pub struct LlmEngine {
    provider: String,
    model: String,
    api_key: String,
    base_url: Option<String>,
    system: &'static str,
}

impl LlmEngine {
    pub fn from_settings(settings: &Settings) -> Result<Self, InvocationError> {
        // Fail on a bad provider name at startup rather than mid-run.
        map_backend(&settings.provider)?;
        Ok(Self {
            provider: settings.provider.clone(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone(),
            base_url: (settings.provider == "ollama").then(|| settings.ollama_url.clone()),
            system: prompt::SYSTEM,
        })
    }

    fn builder(&self) -> Result<LLMBuilder, InvocationError> {
        let mut builder = LLMBuilder::new()
            .backend(map_backend(&self.provider)?)
            .model(&self.model)
            .system(self.system);
        if !self.api_key.is_empty() {
            builder = builder.api_key(&self.api_key);
        }
        if let Some(url) = &self.base_url {
            builder = builder.base_url(url);
        }
        Ok(builder)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LanguageModel for LlmEngine {
    async fn invoke(&self, prompt: &str) -> Result<String, InvocationError> {
        let llm = self
            .builder()?
            .build()
            .map_err(|e| InvocationError::Build(e.to_string()))?;

        let messages = vec![ChatMessage::user().content(prompt).build()];

        log::debug!("sending {} chars to {} ({})", prompt.len(), self.provider, self.model);
        let response = llm
            .chat(&messages)
            .await
            .map_err(|e| InvocationError::Chat(e.to_string()))?;

        match response.text() {
            Some(text) if !text.trim().is_empty() => Ok(text),
            Some(_) => Err(InvocationError::EmptyText),
            None => Err(InvocationError::NoText),
        }
    }
}
