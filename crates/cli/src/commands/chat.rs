//! `envoy chat`: Negotiate with a service agent over stdin/stdout.
//!
//! Each stdin line is one message from the service agent. The session ends
//! when the personal AI reports the task complete, on EOF, or on `exit`.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use envoy_core::event::EventBus;
use envoy_core::message::Message;
use tokio::io::{self, AsyncBufReadExt, BufReader};

use super::{SessionArgs, build_agent, drain_events, load_config};

pub async fn run(
    config_path: Option<&Path>,
    session: SessionArgs,
    agent_name: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let agent_name = agent_name.unwrap_or_else(|| format!("{}_ai", session.owner));
    let counterparty = session.counterparty();

    let events = Arc::new(EventBus::default());
    let mut rx = events.subscribe();
    let mut agent = build_agent(&config, &session, agent_name.clone(), events)?;

    println!();
    println!("  Envoy — {agent_name} negotiating with {}", counterparty.name);
    println!("  Model:  {}", config.model);
    println!("  Intent: {}", session.intent);
    println!();

    let prepared = agent.init_chat(&counterparty).await;
    drain_events(&mut rx);
    prepared?;

    println!();
    println!("  Type the service agent's messages and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(io::stdin()).lines();

    loop {
        print!("  {} > ", counterparty.name);
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q") {
            break;
        }

        let inbound = Message::user(&counterparty.name, &agent_name, line);
        let reply = agent.on_message(inbound, &counterparty).await;
        drain_events(&mut rx);
        let reply = reply?;

        println!("  {agent_name} > {}", reply.content);

        if agent.task_complete() {
            println!();
            println!("  ✅ Task complete.");
            break;
        }
    }

    Ok(())
}
