//! Subcommand implementations and the pieces they share.

pub mod chat;
pub mod config_cmd;
pub mod doctor;
pub mod profile;

use std::path::Path;
use std::sync::Arc;

use clap::Args;
use envoy_agent::PersonalAi;
use envoy_config::AppConfig;
use envoy_core::agent::AgentProfile;
use envoy_core::event::{DomainEvent, EventBus};
use tokio::sync::broadcast::{self, error::TryRecvError};

/// Who is negotiating with whom, and about what.
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Owner identifier; personal data is read from <personal_data_dir>/<owner>/
    #[arg(long)]
    pub owner: String,

    /// What the owner wants done
    #[arg(long)]
    pub intent: String,

    /// The service agent's name
    #[arg(long)]
    pub service_name: String,

    /// What the service agent does
    #[arg(long)]
    pub service_description: String,
}

impl SessionArgs {
    pub fn counterparty(&self) -> AgentProfile {
        AgentProfile::new(
            &self.service_name,
            &self.service_name,
            &self.service_description,
        )
    }
}

/// Load config from an explicit path or the default location.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    config.map_err(|e| format!("Failed to load config: {e}").into())
}

/// Build the personal AI with the configured provider and tools.
pub fn build_agent(
    config: &AppConfig,
    session: &SessionArgs,
    agent_name: String,
    events: Arc<EventBus>,
) -> Result<PersonalAi, Box<dyn std::error::Error>> {
    let provider = envoy_providers::build_from_config(config, None).map_err(|e| {
        format!(
            "{e}\n  Config file: {}",
            AppConfig::config_path().display()
        )
    })?;
    let tools = Arc::new(envoy_tools::default_registry(config)?);

    let profile = AgentProfile::new(
        agent_name,
        &session.owner,
        format!("Personal AI of {}", session.owner),
    );
    Ok(PersonalAi::from_config(
        profile,
        &session.intent,
        provider,
        tools,
        events,
        config,
    ))
}

/// Print whatever events are waiting, without blocking.
pub fn drain_events(rx: &mut broadcast::Receiver<Arc<DomainEvent>>) {
    loop {
        match rx.try_recv() {
            Ok(event) => print_event(&event),
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Progress output fell behind");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}

fn print_event(event: &DomainEvent) {
    match event {
        DomainEvent::RetrievalProgress { detail, .. } => println!("  🔍 {detail}"),
        DomainEvent::ToolExecuted {
            tool_name,
            success,
            duration_ms,
            ..
        } => {
            let mark = if *success { "✅" } else { "❌" };
            println!("  {mark} {tool_name} ({duration_ms} ms)");
        }
        DomainEvent::CandidateRejected {
            attempt, rationale, ..
        } => println!("  ↺ draft {attempt} rejected: {rationale}"),
        DomainEvent::ReplySent { .. } | DomainEvent::ConversationEnded { .. } => {}
    }
}
