//! Provider trait: the abstraction over LLM backends.
//!
//! A Provider performs one request/response exchange with a generative model:
//! a prompt (plus optional system text and prior turns) goes in, text and/or
//! tool calls come out. Vendor wire protocols live in `envoy-providers`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;
use crate::tool::ToolCall;

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-4o")
    pub model: String,

    /// Optional system instructions, sent ahead of everything else
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Prior turns, sent between the system prompt and the prompt
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<Message>,

    /// The prompt for this exchange
    pub prompt: String,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// How the model may pick among `tools`
    #[serde(default)]
    pub tool_choice: ToolChoice,
}

fn default_temperature() -> f32 {
    0.7
}

impl ProviderRequest {
    /// A plain prompt with no system text, context or tools.
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: None,
            context: Vec::new(),
            prompt: prompt.into(),
            temperature: default_temperature(),
            max_tokens: None,
            tools: Vec::new(),
            tool_choice: ToolChoice::default(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_context(mut self, context: Vec<Message>) -> Self {
        self.context = context;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>, tool_choice: ToolChoice) -> Self {
        self.tools = tools;
        self.tool_choice = tool_choice;
        self
    }
}

/// Tool-selection policy for a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    /// The model decides whether to call a tool
    #[default]
    Auto,
    /// The model must not call tools
    None,
    /// The model must call the named tool
    Required(String),
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A complete response from a provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Generated text; `None` when the model only produced tool calls
    #[serde(default)]
    pub content: Option<String>,

    /// Tool calls requested by the model, possibly empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

impl ProviderResponse {
    /// The generated text, or an empty string.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core Provider trait.
///
/// The conversation loop and the retrieval pipeline call `complete()` without
/// knowing which backend is in use. Implementations must fold every transport
/// or decoding failure into [`ProviderError::GenerationFailed`] and must not
/// retry on their own.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Whether the provider is reachable.
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_request_defaults() {
        let req = ProviderRequest::new("gpt-4o", "Summarize this");
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
        assert!(req.system_prompt.is_none());
        assert!(req.tools.is_empty());
        assert_eq!(req.tool_choice, ToolChoice::Auto);
    }

    #[test]
    fn tool_choice_serialization() {
        let json = serde_json::to_string(&ToolChoice::Required("process_payment".into())).unwrap();
        assert_eq!(json, r#"{"required":"process_payment"}"#);
        assert_eq!(serde_json::to_string(&ToolChoice::None).unwrap(), r#""none""#);
    }

    #[test]
    fn response_text_defaults_to_empty() {
        let response = ProviderResponse::default();
        assert_eq!(response.text(), "");
    }
}
