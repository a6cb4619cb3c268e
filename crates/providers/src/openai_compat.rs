//! OpenAI-compatible provider implementation.
//!
//! Works with OpenAI and any endpoint exposing `/chat/completions` in the
//! same shape (OpenRouter, Ollama, vLLM and so on).
//!
//! Supports:
//! - Non-streaming chat completions
//! - Tool use / function calling with an explicit `tool_choice`
//! - Health checks via `/models`

use async_trait::async_trait;
use envoy_core::error::ProviderError;
use envoy_core::message::{Message, Role};
use envoy_core::provider::*;
use envoy_core::tool::ToolCall;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new("openai", "https://api.openai.com/v1", api_key, Duration::from_secs(120))
    }

    /// Build the wire message list: system prompt, then prior turns, then
    /// the prompt itself as the final user message.
    fn to_api_messages(request: &ProviderRequest) -> Vec<ApiMessage> {
        let mut messages = Vec::with_capacity(request.context.len() + 2);

        if let Some(system) = request.system_prompt.as_deref().filter(|s| !s.is_empty()) {
            messages.push(ApiMessage::text("system", system));
        }

        messages.extend(request.context.iter().map(Self::to_api_message));
        messages.push(ApiMessage::text("user", &request.prompt));
        messages
    }

    /// Tool output has no call id to pair with here, so it travels as a
    /// user turn attributed to the tool.
    fn to_api_message(message: &Message) -> ApiMessage {
        match message.role {
            Role::User => ApiMessage::text("user", &message.content),
            Role::System => ApiMessage::text("system", &message.content),
            Role::Tool => ApiMessage::text("user", &message.transcript_line()),
        }
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn to_api_tool_choice(choice: &ToolChoice) -> serde_json::Value {
        match choice {
            ToolChoice::Auto => serde_json::json!("auto"),
            ToolChoice::None => serde_json::json!("none"),
            ToolChoice::Required(name) => serde_json::json!({
                "type": "function",
                "function": { "name": name },
            }),
        }
    }

    fn request_body(request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(request),
            "temperature": request.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
            body["tool_choice"] = Self::to_api_tool_choice(&request.tool_choice);
        }

        body
    }

    fn into_response(api_response: ApiResponse) -> Result<ProviderResponse, ProviderError> {
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::GenerationFailed("no choices in response".into()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ProviderResponse {
            content: choice.message.content,
            tool_calls,
            usage,
            model: api_response.model,
        })
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            tools = request.tools.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::GenerationFailed(format!("request failed: {e}")))?;

        let status = response.status().as_u16();

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::GenerationFailed(format!(
                "HTTP {status}: {error_body}"
            )));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::GenerationFailed(format!("failed to parse response: {e}")))?;

        Self::into_response(api_response)
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| ProviderError::GenerationFailed(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
}

impl ApiMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.into(),
            content: Some(content.into()),
            tool_calls: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment_tool() -> ToolDefinition {
        ToolDefinition {
            name: "process_payment".into(),
            description: "Process a payment".into(),
            parameters: serde_json::json!({"type": "object"}),
        }
    }

    #[test]
    fn openai_constructor() {
        let provider = OpenAiCompatProvider::openai("sk-test").unwrap();
        assert_eq!(provider.name(), "openai");
        assert!(provider.base_url.contains("api.openai.com"));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let provider =
            OpenAiCompatProvider::new("local", "http://localhost:11434/v1/", "k", Duration::from_secs(5))
                .unwrap();
        assert_eq!(provider.base_url, "http://localhost:11434/v1");
    }

    #[test]
    fn message_order_is_system_context_prompt() {
        let request = ProviderRequest::new("gpt-4o", "What next?")
            .with_system_prompt("Be brief")
            .with_context(vec![
                Message::user("shop", "alice_ai", "Hello"),
                Message::tool_result("process_payment", "shop", "[PAYMENT_SUCCEEDED] ref 1"),
            ]);

        let api_messages = OpenAiCompatProvider::to_api_messages(&request);
        assert_eq!(api_messages.len(), 4);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].content.as_deref(), Some("Hello"));
        assert_eq!(api_messages[2].role, "user");
        assert_eq!(
            api_messages[2].content.as_deref(),
            Some("[process_payment] tool: [PAYMENT_SUCCEEDED] ref 1")
        );
        assert_eq!(api_messages[3].content.as_deref(), Some("What next?"));
    }

    #[test]
    fn empty_system_prompt_is_skipped() {
        let request = ProviderRequest::new("gpt-4o", "hi").with_system_prompt("");
        let api_messages = OpenAiCompatProvider::to_api_messages(&request);
        assert_eq!(api_messages.len(), 1);
        assert_eq!(api_messages[0].role, "user");
    }

    #[test]
    fn tool_definition_conversion() {
        let api_tools = OpenAiCompatProvider::to_api_tools(&[payment_tool()]);
        assert_eq!(api_tools.len(), 1);
        assert_eq!(api_tools[0].function.name, "process_payment");
        assert_eq!(api_tools[0].r#type, "function");
    }

    #[test]
    fn body_omits_tools_when_none_offered() {
        let body = OpenAiCompatProvider::request_body(&ProviderRequest::new("gpt-4o", "hi"));
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn body_carries_tool_choice() {
        let mut request = ProviderRequest::new("gpt-4o", "pay")
            .with_tools(vec![payment_tool()], ToolChoice::Auto);
        request.max_tokens = Some(1000);

        let body = OpenAiCompatProvider::request_body(&request);
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["tools"][0]["function"]["name"], "process_payment");

        let forced = OpenAiCompatProvider::to_api_tool_choice(&ToolChoice::Required(
            "process_payment".into(),
        ));
        assert_eq!(forced["function"]["name"], "process_payment");
    }

    #[test]
    fn parse_text_response() {
        let data = r#"{
            "model": "gpt-4o-2024-08-06",
            "choices": [{"message": {"role": "assistant", "content": "[YES]"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 2, "total_tokens": 14}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        let response = OpenAiCompatProvider::into_response(parsed).unwrap();
        assert_eq!(response.text(), "[YES]");
        assert!(response.tool_calls.is_empty());
        assert_eq!(response.usage.unwrap().total_tokens, 14);
    }

    #[test]
    fn parse_tool_call_response() {
        let data = r#"{
            "model": "gpt-4o",
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_abc",
                    "type": "function",
                    "function": {"name": "process_payment", "arguments": "{\"payment_link\":\"https://pay.example.com/x\"}"}
                }]
            }}]
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        let response = OpenAiCompatProvider::into_response(parsed).unwrap();
        assert!(response.content.is_none());
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].id, "call_abc");
        assert_eq!(response.tool_calls[0].name, "process_payment");
    }

    #[test]
    fn empty_choices_is_generation_failure() {
        let parsed: ApiResponse =
            serde_json::from_str(r#"{"model": "gpt-4o", "choices": []}"#).unwrap();
        let err = OpenAiCompatProvider::into_response(parsed).unwrap_err();
        assert!(matches!(err, ProviderError::GenerationFailed(_)));
    }
}
