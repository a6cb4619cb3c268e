//! Domain events: decoupled communication between the agent and
//! whatever is watching it.
//!
//! The retrieval pipeline narrates its progress here and the conversation
//! loop reports tool runs, rejections and turn outcomes. A UI subscribes and
//! renders; nobody has to be listening.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// Human-readable progress from the retrieval pipeline
    RetrievalProgress {
        owner: String,
        detail: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The validator turned down a candidate reply
    CandidateRejected {
        conversation_id: String,
        attempt: u32,
        rationale: String,
        timestamp: DateTime<Utc>,
    },

    /// A reply left the agent
    ReplySent {
        conversation_id: String,
        attempts: u32,
        approved: bool,
        timestamp: DateTime<Utc>,
    },

    /// The conversation reached its end
    ConversationEnded {
        conversation_id: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
/// Components can subscribe to receive all events and filter for what they care about.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Publish a retrieval progress line for `owner`.
    pub fn narrate(&self, owner: &str, detail: impl Into<String>) {
        self.publish(DomainEvent::RetrievalProgress {
            owner: owner.to_string(),
            detail: detail.into(),
            timestamp: Utc::now(),
        });
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
