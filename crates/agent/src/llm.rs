//! Thin façade over a [`Provider`] carrying the model settings.

use envoy_config::AppConfig;
use envoy_core::error::ProviderError;
use envoy_core::provider::{Provider, ProviderRequest, ProviderResponse, ToolChoice, ToolDefinition};
use std::sync::Arc;
use tracing::debug;

/// The model the agent talks to, plus the knobs every request shares.
#[derive(Clone)]
pub struct LanguageModel {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl LanguageModel {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
        }
    }

    /// Model name, temperature and token limit taken from `config`.
    pub fn from_config(provider: Arc<dyn Provider>, config: &AppConfig) -> Self {
        Self::new(provider, &config.model)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    fn request(&self, prompt: &str) -> ProviderRequest {
        let mut request = ProviderRequest::new(&self.model, prompt);
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;
        request
    }

    /// One tool-free exchange; returns the text (empty if the model sent none).
    pub async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let response = self.provider.complete(self.request(prompt)).await?;
        if let Some(usage) = &response.usage {
            debug!(model = %response.model, tokens = usage.total_tokens, "Generation complete");
        }
        Ok(response.text().to_string())
    }

    /// One exchange offering `tools` with automatic tool choice.
    ///
    /// An empty tool list sends a plain request.
    pub async fn generate_with_tools(
        &self,
        prompt: &str,
        tools: Vec<ToolDefinition>,
    ) -> Result<ProviderResponse, ProviderError> {
        let request = self.request(prompt).with_tools(tools, ToolChoice::Auto);
        debug!(tools = request.tools.len(), "Generation with tools");
        self.provider.complete(request).await
    }
}
