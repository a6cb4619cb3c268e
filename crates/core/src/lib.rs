//! # Envoy Core
//!
//! Domain types, traits, and error definitions for the Envoy personal
//! negotiation agent. Every other crate depends inward on this one.
//!
//! ## Design Philosophy
//!
//! Each collaborator of the conversation loop is a trait or a plain value
//! type here. Implementations live in their respective crates. This enables:
//! - Swapping the LLM backend or payment gateway via configuration
//! - Testing the loop against scripted providers and tools
//! - Clean dependency graph (all crates depend inward on core)

pub mod agent;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod sentinel;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::AgentProfile;
pub use error::{Error, ProviderError, Result, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{Context, ConversationId, Message, Role, Staging};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolChoice, ToolDefinition, Usage};
pub use sentinel::{ChatState, Verdict};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
