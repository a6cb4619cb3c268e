//! Shared test helpers for agent tests.

use envoy_core::error::ProviderError;
use envoy_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use envoy_core::tool::ToolCall;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

/// A mock provider that replays scripted responses in order and records
/// every request it receives.
///
/// Once the script is exhausted every call fails with
/// `ProviderError::GenerationFailed`.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A provider whose first call fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from([Err(ProviderError::GenerationFailed(
                message.to_string(),
            ))])),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(ProviderError::GenerationFailed(format!(
                    "ScriptedProvider: no response scripted for call #{call}"
                )))
            })
    }
}

fn usage() -> Option<Usage> {
    Some(Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    })
}

/// Create a simple text response (no tool calls).
pub fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        content: Some(text.to_string()),
        tool_calls: Vec::new(),
        usage: usage(),
        model: "mock-model".into(),
    }
}

/// Create a response carrying a single tool call and no text.
pub fn tool_call_response(name: &str, args: serde_json::Value) -> ProviderResponse {
    ProviderResponse {
        content: None,
        tool_calls: vec![ToolCall {
            id: format!("call_{name}"),
            name: name.to_string(),
            arguments: serde_json::to_string(&args).unwrap(),
        }],
        usage: usage(),
        model: "mock-model".into(),
    }
}

/// Lay out `<root>/<owner>/basic_info.json` plus the given documents.
pub fn write_owner_data(root: &Path, owner: &str, documents: &[(&str, &str)]) {
    let dir = root.join(owner);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("basic_info.json"),
        r#"{"name": "Alice", "age": 35, "city": "Saratoga Springs"}"#,
    )
    .unwrap();
    for (name, body) in documents {
        std::fs::write(dir.join(name), body).unwrap();
    }
}
