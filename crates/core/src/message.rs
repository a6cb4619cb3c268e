//! Message and Context domain types.
//!
//! These are the core value objects that flow through the entire system:
//! service agent sends a message → agent appends it to its Context →
//! the conversation loop reads the recent window → the reply is appended.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation (session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A conversational turn from either agent
    User,
    /// Instructions for the model
    System,
    /// Tool execution result
    Tool,
}

/// A single message in a conversation. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    pub role: Role,

    /// The text content
    pub content: String,

    /// Agent identifier of the author
    pub sender: String,

    /// Agent identifier of the addressee
    pub receiver: String,

    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn build(
        role: Role,
        sender: impl Into<String>,
        receiver: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            sender: sender.into(),
            receiver: receiver.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a conversational message between two agents.
    pub fn user(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::build(Role::User, sender, receiver, content)
    }

    /// Create a tool result message. The sender is the synthetic
    /// identity `"[<tool_name>] tool"`.
    pub fn tool_result(
        tool_name: &str,
        receiver: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::build(Role::Tool, format!("[{tool_name}] tool"), receiver, content)
    }

    /// One transcript line: `sender: content`.
    pub fn transcript_line(&self) -> String {
        format!("{}: {}", self.sender, self.content)
    }
}

/// Render the last `window` messages as `sender: content` lines.
pub fn format_transcript<'a>(messages: impl IntoIterator<Item = &'a Message>, window: usize) -> String {
    let lines: Vec<String> = messages.into_iter().map(Message::transcript_line).collect();
    let start = lines.len().saturating_sub(window);
    lines[start..].join("\n")
}

/// The ordered, append-only message log of one conversation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub id: ConversationId,

    messages: Vec<Message>,

    pub created_at: DateTime<Utc>,

    /// When the last message was committed
    pub updated_at: DateTime<Utc>,
}

impl Context {
    /// Create a new empty context.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message to the committed log.
    pub fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The last `window` committed messages as transcript lines.
    pub fn transcript(&self, window: usize) -> String {
        format_transcript(&self.messages, window)
    }

    /// Open a staging buffer for speculative entries.
    ///
    /// Nothing reaches the committed log until [`Staging::commit`].
    pub fn begin(&mut self) -> Staging<'_> {
        Staging {
            context: self,
            staged: Vec::new(),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// Speculative entries for one generation attempt, layered over a Context.
///
/// Dropping a `Staging` without committing discards its entries.
#[derive(Debug)]
pub struct Staging<'a> {
    context: &'a mut Context,
    staged: Vec<Message>,
}

impl Staging<'_> {
    /// Hold a message until commit.
    pub fn stage(&mut self, message: Message) {
        self.staged.push(message);
    }

    /// Committed messages followed by staged ones.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.context.messages.iter().chain(self.staged.iter())
    }

    /// The last `window` messages of the combined view as transcript lines.
    pub fn transcript(&self, window: usize) -> String {
        format_transcript(self.iter(), window)
    }

    /// Move all staged messages into the committed log. Returns how many.
    pub fn commit(self) -> usize {
        let count = self.staged.len();
        for message in self.staged {
            self.context.push(message);
        }
        count
    }

    /// Discard all staged messages. Returns how many.
    pub fn rollback(self) -> usize {
        self.staged.len()
    }
}
