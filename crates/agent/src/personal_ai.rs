//! The personal AI: negotiates with service agents on its owner's behalf.
//!
//! Owns the conversation context and a per-counterparty cache of owner
//! profiles. Retrieval runs once per counterparty; every inbound message
//! then goes through one [`ConversationLoop`] turn.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::PathBuf;
use std::sync::Arc;

use envoy_config::AppConfig;
use envoy_core::agent::AgentProfile;
use envoy_core::error::Result;
use envoy_core::event::EventBus;
use envoy_core::message::{Context, Message};
use envoy_core::provider::Provider;
use envoy_core::sentinel::CONVERSATION_ENDS;
use envoy_core::tool::ToolRegistry;
use tracing::{debug, info};

use crate::conversation::{ConversationLoop, Turn, TurnOutcome};
use crate::llm::LanguageModel;
use crate::retrieval::{OwnerProfile, Retriever};

pub struct PersonalAi {
    profile: AgentProfile,
    intent: String,
    task_complete: bool,
    /// Owner profiles keyed by counterparty name
    profiles: HashMap<String, OwnerProfile>,
    context: Context,
    retriever: Retriever,
    conversation: ConversationLoop,
}

impl PersonalAi {
    pub fn new(
        profile: AgentProfile,
        intent: impl Into<String>,
        retriever: Retriever,
        conversation: ConversationLoop,
    ) -> Self {
        Self {
            profile,
            intent: intent.into(),
            task_complete: false,
            profiles: HashMap::new(),
            context: Context::new(),
            retriever,
            conversation,
        }
    }

    /// Wire up retrieval and the conversation loop from `config`.
    pub fn from_config(
        profile: AgentProfile,
        intent: impl Into<String>,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        events: Arc<EventBus>,
        config: &AppConfig,
    ) -> Self {
        let llm = LanguageModel::from_config(provider, config);
        let retriever =
            Retriever::new(llm.clone(), events.clone(), config.personal_data_dir.clone());
        let conversation = ConversationLoop::from_config(llm, tools, events, config);
        Self::new(profile, intent, retriever, conversation)
    }

    /// Make sure the owner's profile for `counterparty` is available.
    ///
    /// Runs retrieval on first contact only; later calls are free until
    /// [`PersonalAi::invalidate_preferences`]. A failed run caches nothing.
    pub async fn init_chat(&mut self, counterparty: &AgentProfile) -> Result<&OwnerProfile> {
        let profile = match self.profiles.entry(counterparty.name.clone()) {
            Entry::Occupied(entry) => {
                debug!(counterparty = %counterparty.name, "Preferences cached");
                entry.into_mut()
            }
            Entry::Vacant(entry) => {
                let profile = self
                    .retriever
                    .build_profile(&self.profile.owner, counterparty, &self.intent)
                    .await?;
                entry.insert(profile)
            }
        };
        Ok(profile)
    }

    /// Answer one inbound message from `counterparty`.
    ///
    /// The inbound message (if non-empty) and the reply are both appended to
    /// the context. A failed retrieval leaves the context untouched. When
    /// the task is over the reply is the `[CONVERSATION_ENDS]` marker and
    /// [`PersonalAi::task_complete`] turns true.
    pub async fn on_message(
        &mut self,
        message: Message,
        counterparty: &AgentProfile,
    ) -> Result<Message> {
        let owner_info = self.init_chat(counterparty).await?.owner_info();

        if !message.content.is_empty() {
            self.context.push(message.clone());
        }

        let turn = Turn {
            agent: &self.profile,
            counterparty,
            intent: &self.intent,
            owner_info: &owner_info,
            origin: &message,
        };

        let content = match self.conversation.run_turn(&mut self.context, &turn).await? {
            TurnOutcome::Ended => {
                self.task_complete = true;
                info!(agent = %self.profile.name, "Task complete");
                CONVERSATION_ENDS.to_string()
            }
            TurnOutcome::Reply { content, .. } => content,
        };

        let reply = Message::user(&self.profile.name, &counterparty.name, content);
        self.context.push(reply.clone());
        Ok(reply)
    }

    /// Forget the cached preferences for `counterparty`. Returns whether
    /// anything was cached.
    pub fn invalidate_preferences(&mut self, counterparty: &str) -> bool {
        self.profiles.remove(counterparty).is_some()
    }

    pub fn task_complete(&self) -> bool {
        self.task_complete
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn owner_dir(&self) -> PathBuf {
        self.retriever.owner_dir(&self.profile.owner)
    }
}
