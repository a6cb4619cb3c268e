//! `envoy profile`: Run retrieval only and print what the agent would know.

use std::path::Path;
use std::sync::Arc;

use envoy_core::event::EventBus;

use super::{SessionArgs, build_agent, drain_events, load_config};

pub async fn run(
    config_path: Option<&Path>,
    session: SessionArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let counterparty = session.counterparty();

    let events = Arc::new(EventBus::default());
    let mut rx = events.subscribe();
    let mut agent = build_agent(&config, &session, format!("{}_ai", session.owner), events)?;

    println!("  Reading {}", agent.owner_dir().display());
    let prepared = agent.init_chat(&counterparty).await;
    drain_events(&mut rx);
    let profile = prepared?;

    println!();
    println!("  Basic info");
    println!("  ----------");
    println!("  {}", profile.basic_info);
    println!();
    println!("  Preferences for {}", counterparty.name);
    println!("  ----------------{}", "-".repeat(counterparty.name.len()));
    println!("  {}", profile.preferences);

    Ok(())
}
