//! The personal AI agent for Envoy.
//!
//! The agent follows a **Retrieve → Check → Generate → Validate** cycle:
//!
//! 1. **Retrieve** the owner's profile for this counterparty (once, cached)
//! 2. **Check** whether the conversation is already over
//! 3. **Generate** a candidate reply, running tools if the model asks
//! 4. **Validate** the candidate; on rejection roll back and retry
//!
//! The retry loop is bounded; when every attempt is rejected the last
//! candidate is sent anyway.

pub mod conversation;
pub mod llm;
pub mod personal_ai;
pub mod prompts;
pub mod retrieval;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use conversation::{ConversationLoop, Turn, TurnOutcome, TurnPhase};
pub use llm::LanguageModel;
pub use personal_ai::PersonalAi;
pub use retrieval::{OwnerProfile, Retriever};
