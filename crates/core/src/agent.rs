//! Agent identity types.

use serde::{Deserialize, Serialize};

/// The public face of an agent taking part in a conversation.
///
/// For the personal AI this describes itself; for a counterparty it is what
/// the personal AI knows about the service it is negotiating with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Agent identifier, used as sender/receiver on messages
    pub name: String,

    /// The human (or business) the agent acts for
    pub owner: String,

    /// What the agent does, in plain words
    #[serde(default)]
    pub description: String,
}

impl AgentProfile {
    pub fn new(
        name: impl Into<String>,
        owner: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            description: description.into(),
        }
    }
}
