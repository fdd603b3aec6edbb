// ABOUTME: LLM configuration kinds: OpenAI, OpenAI-compatible, vLLM and Ollama endpoints.
// ABOUTME: API keys live here in memory but are excluded from every serialized document.

use serde_json::{Map, Value};

use crate::component::{FieldValue, Fields};
use crate::deserialize::{DeserializationError, Record};

/// Which provider an LLM configuration targets. Each provider is its own
/// discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LlmProvider {
    OpenAi,
    OpenAiCompatible,
    Vllm,
    Ollama,
}

impl LlmProvider {
    pub const ALL: [LlmProvider; 4] = [
        LlmProvider::OpenAi,
        LlmProvider::OpenAiCompatible,
        LlmProvider::Vllm,
        LlmProvider::Ollama,
    ];

    pub fn component_type(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "OpenAiConfig",
            LlmProvider::OpenAiCompatible => "OpenAiCompatibleConfig",
            LlmProvider::Vllm => "VllmConfig",
            LlmProvider::Ollama => "OllamaConfig",
        }
    }

    pub fn from_component_type(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.component_type() == s)
    }

    /// Hosted OpenAI has a fixed endpoint; every other provider needs a url.
    fn requires_url(&self) -> bool {
        !matches!(self, LlmProvider::OpenAi)
    }
}

/// Connection details for one model endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model_id: String,
    pub url: Option<String>,
    pub api_key: Option<String>,
    /// Wire dialect of an OpenAI-compatible server, e.g. `chat_completions`.
    pub api_type: Option<String>,
    pub default_generation_parameters: Option<Map<String, Value>>,
}

impl LlmConfig {
    fn with_provider(provider: LlmProvider, url: Option<String>, model_id: String) -> Self {
        Self {
            provider,
            model_id,
            url,
            api_key: None,
            api_type: None,
            default_generation_parameters: None,
        }
    }

    pub fn open_ai(model_id: impl Into<String>) -> Self {
        Self::with_provider(LlmProvider::OpenAi, None, model_id.into())
    }

    pub fn open_ai_compatible(url: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self::with_provider(LlmProvider::OpenAiCompatible, Some(url.into()), model_id.into())
    }

    pub fn vllm(url: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self::with_provider(LlmProvider::Vllm, Some(url.into()), model_id.into())
    }

    pub fn ollama(url: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self::with_provider(LlmProvider::Ollama, Some(url.into()), model_id.into())
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_api_type(mut self, api_type: impl Into<String>) -> Self {
        self.api_type = Some(api_type.into());
        self
    }

    pub fn with_generation_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.default_generation_parameters = Some(parameters);
        self
    }

    pub(crate) fn fields(&self) -> Fields {
        let mut fields = Fields::new();
        if let Some(url) = &self.url {
            fields.insert("url".to_string(), url.clone().into());
        }
        fields.insert("modelId".to_string(), self.model_id.clone().into());
        if let Some(api_key) = &self.api_key {
            fields.insert("apiKey".to_string(), api_key.clone().into());
        }
        if let Some(api_type) = &self.api_type {
            fields.insert("apiType".to_string(), api_type.clone().into());
        }
        if let Some(params) = &self.default_generation_parameters {
            fields.insert(
                "defaultGenerationParameters".to_string(),
                FieldValue::from(params.clone()),
            );
        }
        fields
    }

    pub(crate) fn from_record(record: &Record<'_>) -> Result<Self, DeserializationError> {
        let provider = LlmProvider::from_component_type(record.component_type())
            .ok_or_else(|| DeserializationError::UnknownComponentType(record.component_type().to_string()))?;

        let url = if provider.requires_url() {
            Some(record.required_str("url")?)
        } else {
            record.optional_str("url")?
        };

        Ok(Self {
            provider,
            model_id: record.required_str("modelId")?,
            url,
            api_key: record.optional_str("apiKey")?,
            api_type: record.optional_str("apiType")?,
            default_generation_parameters: record.data_map("defaultGenerationParameters")?,
        })
    }
}
