//! Provider-agnostic completion types

use anyhow::Result;
use async_trait::async_trait;

/// A single-turn completion: optional system prompt plus one user prompt
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the model for a JSON object response
    pub json_mode: bool,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            temperature: 0.7,
            max_tokens: 500,
            json_mode: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// Trait that all LLM providers implement
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g. "openai")
    fn provider_name(&self) -> &str;

    /// Model identifier (e.g. "gpt-4o-mini")
    fn model(&self) -> &str;

    /// Run the completion and return the trimmed text of the first choice
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}
