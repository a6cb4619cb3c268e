//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools let the agent act on the owner's behalf (settle a payment, for
//! instance). Each tool declares a JSON Schema for its arguments; the
//! registry validates a call against that schema before the tool runs.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::error::ToolError;
use crate::message::Message;
use crate::provider::ToolDefinition;

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a serialized JSON string
    pub arguments: String,
}

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool executed successfully
    pub success: bool,

    /// The textual output shown to the model
    pub output: String,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            data: None,
        }
    }

    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// The core Tool trait.
///
/// `execute` receives arguments that already conform to
/// `parameters_schema()`, plus the inbound message that prompted the call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "process_payment").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with validated arguments.
    async fn execute(
        &self,
        arguments: serde_json::Value,
        origin: &Message,
    ) -> std::result::Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Deserialize validated arguments into a tool's typed argument struct.
pub fn decode_arguments<T: DeserializeOwned>(
    tool_name: &str,
    arguments: serde_json::Value,
) -> std::result::Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments {
        tool_name: tool_name.to_string(),
        reason: e.to_string(),
    })
}

/// A registry of available tools.
///
/// The conversation loop uses this to:
/// 1. Get tool definitions to send to the LLM
/// 2. Resolve, validate and execute tool calls the LLM requests
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// All tool definitions, ordered by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Resolve a call by name, validate its arguments and run it.
    ///
    /// Unknown names and schema violations fail before the tool is touched.
    pub async fn dispatch(
        &self,
        call: &ToolCall,
        origin: &Message,
    ) -> std::result::Result<ToolResult, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

        let arguments = parse_arguments(&call.name, &call.arguments)?;
        validate_arguments(tool.as_ref(), &arguments)?;

        debug!(tool = %call.name, call_id = %call.id, "Dispatching tool call");
        tool.execute(arguments, origin).await
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// An empty argument string means "no arguments".
fn parse_arguments(tool_name: &str, raw: &str) -> std::result::Result<serde_json::Value, ToolError> {
    if raw.trim().is_empty() {
        return Ok(serde_json::json!({}));
    }
    serde_json::from_str(raw).map_err(|e| ToolError::InvalidArguments {
        tool_name: tool_name.to_string(),
        reason: format!("arguments are not valid JSON: {e}"),
    })
}

fn validate_arguments(tool: &dyn Tool, arguments: &serde_json::Value) -> std::result::Result<(), ToolError> {
    let schema = tool.parameters_schema();
    let validator = jsonschema::validator_for(&schema).map_err(|e| ToolError::InvalidSchema {
        tool_name: tool.name().to_string(),
        reason: e.to_string(),
    })?;

    let violations: Vec<String> = validator
        .iter_errors(arguments)
        .map(|error| format!("{} at '{}'", error, error.instance_path))
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ToolError::InvalidArguments {
            tool_name: tool.name().to_string(),
            reason: violations.join("; "),
        })
    }
}
