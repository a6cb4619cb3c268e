//! The turn-taking loop: decide whether to keep talking, draft a reply
//! (using tools if the model asks for them), have it reviewed, retry.
//!
//! Each generation attempt works on a [`Staging`] buffer over the
//! conversation context. Tool results land there first and only reach the
//! committed log if the attempt's candidate is the one that gets sent.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use envoy_config::AppConfig;
use envoy_core::agent::AgentProfile;
use envoy_core::error::{Error, Result, ToolError};
use envoy_core::event::{DomainEvent, EventBus};
use envoy_core::message::{Context, Message, Staging};
use envoy_core::sentinel::{self, ChatState, Verdict};
use envoy_core::tool::ToolRegistry;
use tracing::{debug, info, warn};

use crate::llm::LanguageModel;
use crate::prompts;

/// Where a turn currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    CheckingState,
    Generating,
    ToolDispatching,
    Validating,
    Retrying,
    Terminal,
}

/// How a turn finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The task is over; nothing was generated.
    Ended,
    /// A reply to send. `approved` is false when every attempt was rejected
    /// and the last candidate is sent anyway.
    Reply {
        content: String,
        attempts: u32,
        approved: bool,
    },
}

/// Everything a turn needs besides the context itself.
#[derive(Debug, Clone, Copy)]
pub struct Turn<'a> {
    /// The agent doing the talking
    pub agent: &'a AgentProfile,
    /// The service agent on the other side
    pub counterparty: &'a AgentProfile,
    /// What the owner wants done
    pub intent: &'a str,
    /// Basic info and preferences for this counterparty
    pub owner_info: &'a str,
    /// The inbound message being answered
    pub origin: &'a Message,
}

/// Drives one turn at a time against a shared model and tool registry.
#[derive(Clone)]
pub struct ConversationLoop {
    llm: LanguageModel,
    tools: Arc<ToolRegistry>,
    events: Arc<EventBus>,
    history_window: usize,
    max_attempts: u32,
}

impl ConversationLoop {
    pub fn new(llm: LanguageModel, tools: Arc<ToolRegistry>, events: Arc<EventBus>) -> Self {
        Self {
            llm,
            tools,
            events,
            history_window: 10,
            max_attempts: 3,
        }
    }

    pub fn from_config(
        llm: LanguageModel,
        tools: Arc<ToolRegistry>,
        events: Arc<EventBus>,
        config: &AppConfig,
    ) -> Self {
        Self::new(llm, tools, events)
            .with_history_window(config.conversation.history_window)
            .with_max_attempts(config.conversation.max_attempts)
    }

    /// How many recent messages the prompts see.
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window.max(1);
        self
    }

    /// Generation attempts per turn (at least one).
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max.max(1);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decide whether the conversation is over.
    ///
    /// A termination marker in the recent window settles it without asking
    /// the model.
    pub async fn check_state(&self, context: &Context, turn: &Turn<'_>) -> Result<ChatState> {
        let history = context.transcript(self.history_window);

        if let Some(marker) = sentinel::find_termination_marker(&history) {
            debug!(marker, "Termination marker in recent history");
            return Ok(ChatState::ConversationEnds);
        }

        let reply = self
            .llm
            .generate(&prompts::check_chat_state(turn, &history))
            .await?;
        Ok(ChatState::decode(&reply))
    }

    /// Run one full turn, committing the tool results of the attempt whose
    /// candidate is returned.
    ///
    /// The candidate itself is not appended; the caller owns that.
    pub async fn run_turn(&self, context: &mut Context, turn: &Turn<'_>) -> Result<TurnOutcome> {
        let conversation_id = context.id.to_string();
        enter(TurnPhase::CheckingState, 0);

        if self.check_state(context, turn).await? == ChatState::ConversationEnds {
            enter(TurnPhase::Terminal, 0);
            info!(conversation = %conversation_id, "Conversation ended");
            self.events.publish(DomainEvent::ConversationEnded {
                conversation_id,
                timestamp: Utc::now(),
            });
            return Ok(TurnOutcome::Ended);
        }

        let mut feedback = String::new();
        let mut attempt = 1;

        loop {
            let mut staging = context.begin();
            let candidate = self.attempt(&mut staging, turn, &feedback, attempt).await?;

            enter(TurnPhase::Validating, attempt);
            let verdict = self.validate(&staging, turn, &candidate).await?;

            let rationale = match verdict {
                Verdict::Approved => {
                    staging.commit();
                    return Ok(self.reply(conversation_id, candidate, attempt, true));
                }
                Verdict::Rejected { rationale } => rationale,
            };

            if attempt >= self.max_attempts {
                staging.commit();
                warn!(
                    conversation = %conversation_id,
                    attempts = attempt,
                    "Retries exhausted, sending last candidate"
                );
                return Ok(self.reply(conversation_id, candidate, attempt, false));
            }

            let discarded = staging.rollback();
            warn!(
                conversation = %conversation_id,
                attempt,
                discarded,
                rationale = %rationale,
                "Candidate rejected"
            );
            self.events.publish(DomainEvent::CandidateRejected {
                conversation_id: conversation_id.clone(),
                attempt,
                rationale: rationale.clone(),
                timestamp: Utc::now(),
            });

            enter(TurnPhase::Retrying, attempt);
            feedback = prompts::rejection_feedback(&candidate, &rationale);
            attempt += 1;
        }
    }

    /// Draft one candidate, dispatching at most one round of tool calls.
    async fn attempt(
        &self,
        staging: &mut Staging<'_>,
        turn: &Turn<'_>,
        feedback: &str,
        attempt: u32,
    ) -> Result<String> {
        enter(TurnPhase::Generating, attempt);
        let history = staging.transcript(self.history_window);
        let prompt = prompts::generate_response(turn, &history, feedback);
        let response = self
            .llm
            .generate_with_tools(&prompt, self.tools.definitions())
            .await?;

        if response.tool_calls.is_empty() {
            return Ok(response.text().to_string());
        }

        enter(TurnPhase::ToolDispatching, attempt);
        for call in &response.tool_calls {
            let start = Instant::now();
            let result = self.tools.dispatch(call, turn.origin).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            let (success, output) = match result {
                Ok(result) => (result.success, result.output),
                Err(e @ ToolError::ExecutionFailed { .. }) => {
                    warn!(tool = %call.name, error = %e, "Tool execution failed");
                    (false, format!("Error: {e}"))
                }
                Err(e) => {
                    warn!(tool = %call.name, error = %e, "Tool call rejected");
                    return Err(Error::Tool(e));
                }
            };

            info!(tool = %call.name, success, duration_ms, "Tool executed");
            self.events.publish(DomainEvent::ToolExecuted {
                tool_name: call.name.clone(),
                success,
                duration_ms,
                timestamp: Utc::now(),
            });
            staging.stage(Message::tool_result(&call.name, &turn.counterparty.name, output));
        }

        // Regenerate with the tool output in view and no tools on offer.
        enter(TurnPhase::Generating, attempt);
        let history = staging.transcript(self.history_window);
        let prompt = prompts::generate_response(turn, &history, feedback);
        Ok(self.llm.generate(&prompt).await?)
    }

    async fn validate(
        &self,
        staging: &Staging<'_>,
        turn: &Turn<'_>,
        candidate: &str,
    ) -> Result<Verdict> {
        let history = staging.transcript(self.history_window);
        let reply = self
            .llm
            .generate(&prompts::validate_response(turn, &history, candidate))
            .await?;
        Ok(Verdict::decode(&reply))
    }

    fn reply(
        &self,
        conversation_id: String,
        content: String,
        attempts: u32,
        approved: bool,
    ) -> TurnOutcome {
        enter(TurnPhase::Terminal, attempts);
        self.events.publish(DomainEvent::ReplySent {
            conversation_id,
            attempts,
            approved,
            timestamp: Utc::now(),
        });
        TurnOutcome::Reply {
            content,
            attempts,
            approved,
        }
    }
}

fn enter(phase: TurnPhase, attempt: u32) {
    debug!(?phase, attempt, "Turn phase");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedProvider, text_response, tool_call_response};
    use envoy_core::message::Role;
    use envoy_tools::{DryRunGateway, PaymentTool};

    struct Fixture {
        me: AgentProfile,
        shop: AgentProfile,
        origin: Message,
        context: Context,
    }

    impl Fixture {
        fn new(inbound: &str) -> Self {
            let me = AgentProfile::new("alice_ai", "Alice", "Alice's personal AI");
            let shop = AgentProfile::new("shop", "Shop Inc", "Sells espresso machines");
            let origin = Message::user("shop", "alice_ai", inbound);
            let mut context = Context::new();
            context.push(origin.clone());
            Self { me, shop, origin, context }
        }
    }

    fn payment_registry() -> (Arc<ToolRegistry>, Arc<DryRunGateway>) {
        let gateway = Arc::new(DryRunGateway::new());
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(PaymentTool::new(gateway.clone())));
        (Arc::new(registry), gateway)
    }

    fn conversation(provider: Arc<ScriptedProvider>, tools: Arc<ToolRegistry>) -> ConversationLoop {
        ConversationLoop::new(
            LanguageModel::new(provider, "gpt-4o"),
            tools,
            Arc::new(EventBus::default()),
        )
    }

    /// Split borrows: the turn reads the profiles while the loop mutates the context.
    async fn run(looper: &ConversationLoop, fx: &mut Fixture) -> Result<TurnOutcome> {
        let Fixture { me, shop, origin, context } = fx;
        let turn = Turn {
            agent: me,
            counterparty: shop,
            intent: "Buy an espresso machine under $300",
            owner_info: "Alice lives in Saratoga Springs.\n\nPrefers compact machines.",
            origin,
        };
        looper.run_turn(context, &turn).await
    }

    #[tokio::test]
    async fn approved_on_first_try() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            text_response("[CONTINUE]"),
            text_response("I'd like the compact model, please."),
            text_response("[YES]"),
        ]));
        let looper = conversation(provider.clone(), Arc::new(ToolRegistry::new()));
        let mut fx = Fixture::new("Which model would you like?");

        let outcome = run(&looper, &mut fx).await.unwrap();

        assert_eq!(
            outcome,
            TurnOutcome::Reply {
                content: "I'd like the compact model, please.".into(),
                attempts: 1,
                approved: true,
            }
        );
        assert_eq!(provider.call_count(), 3);
        assert_eq!(fx.context.len(), 1);
    }

    #[tokio::test]
    async fn payment_marker_ends_without_model_calls() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let looper = conversation(provider.clone(), Arc::new(ToolRegistry::new()));
        let mut fx = Fixture::new("Thanks!");
        fx.context.push(Message::tool_result(
            "process_payment",
            "shop",
            "[PAYMENT_SUCCEEDED] Paid shop (reference 1).",
        ));

        let outcome = run(&looper, &mut fx).await.unwrap();

        assert_eq!(outcome, TurnOutcome::Ended);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn marker_outside_window_is_ignored() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response("[CONVERSATION_ENDS]")]));
        let looper = conversation(provider.clone(), Arc::new(ToolRegistry::new()));
        let mut fx = Fixture::new("old");
        fx.context.push(Message::user("shop", "alice_ai", "[PAYMENT_SUCCEEDED]"));
        for i in 0..10 {
            fx.context.push(Message::user("shop", "alice_ai", format!("filler {i}")));
        }

        let outcome = run(&looper, &mut fx).await.unwrap();

        assert_eq!(outcome, TurnOutcome::Ended);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn model_can_end_the_conversation() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response("[CONVERSATION_ENDS]")]));
        let events = Arc::new(EventBus::default());
        let mut rx = events.subscribe();
        let looper = ConversationLoop::new(
            LanguageModel::new(provider.clone(), "gpt-4o"),
            Arc::new(ToolRegistry::new()),
            events,
        );
        let mut fx = Fixture::new("Your order is confirmed. Goodbye!");

        assert_eq!(run(&looper, &mut fx).await.unwrap(), TurnOutcome::Ended);
        assert!(matches!(
            rx.try_recv().unwrap().as_ref(),
            DomainEvent::ConversationEnded { .. }
        ));
    }

    #[tokio::test]
    async fn rejected_four_times_sends_third_candidate() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            text_response("[CONTINUE]"),
            text_response("candidate one"),
            text_response("Too vague."),
            text_response("candidate two"),
            text_response("Still vague."),
            text_response("candidate three"),
            text_response("Vague again."),
            text_response("This rejection is never requested."),
        ]));
        let looper = conversation(provider.clone(), Arc::new(ToolRegistry::new()));
        let mut fx = Fixture::new("Which model?");

        let outcome = run(&looper, &mut fx).await.unwrap();

        assert_eq!(
            outcome,
            TurnOutcome::Reply {
                content: "candidate three".into(),
                attempts: 3,
                approved: false,
            }
        );
        assert_eq!(provider.call_count(), 7);

        let requests = provider.requests();
        assert!(requests[3].prompt.contains(
            "# Notes\nPlease do not generate response like this: \ncandidate one\n\nThe reason is: \nToo vague."
        ));
        assert!(requests[5].prompt.contains("candidate two"));
        assert!(!requests[5].prompt.contains("candidate one"));
    }

    #[tokio::test]
    async fn attempts_are_configurable() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            text_response("[CONTINUE]"),
            text_response("only candidate"),
            text_response("No."),
        ]));
        let looper =
            conversation(provider.clone(), Arc::new(ToolRegistry::new())).with_max_attempts(1);
        let mut fx = Fixture::new("Which model?");

        let outcome = run(&looper, &mut fx).await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Reply { attempts: 1, approved: false, .. }));
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn tool_round_commits_result_and_regenerates_without_tools() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            text_response("[CONTINUE]"),
            tool_call_response(
                "process_payment",
                serde_json::json!({"amount": 249.0, "currency": "USD"}),
            ),
            text_response("Payment done, thank you!"),
            text_response("[YES]"),
        ]));
        let (tools, gateway) = payment_registry();
        let looper = conversation(provider.clone(), tools);
        let mut fx = Fixture::new("Please pay at https://pay.example.com/inv/7");
        let before = fx.context.len();

        let outcome = run(&looper, &mut fx).await.unwrap();

        assert!(matches!(
            outcome,
            TurnOutcome::Reply { ref content, approved: true, .. }
                if content == "Payment done, thank you!"
        ));
        assert_eq!(gateway.ledger()[0].payment_link, "https://pay.example.com/inv/7");

        assert_eq!(fx.context.len(), before + 1);
        let tool_msg = fx.context.messages().last().unwrap();
        assert_eq!(tool_msg.role, Role::Tool);
        assert_eq!(tool_msg.sender, "[process_payment] tool");
        assert_eq!(tool_msg.receiver, "shop");
        assert!(tool_msg.content.starts_with("[PAYMENT_SUCCEEDED]"));

        let requests = provider.requests();
        assert_eq!(requests[1].tools.len(), 1);
        assert!(requests[2].tools.is_empty());
        assert!(requests[2].prompt.contains("[process_payment] tool: [PAYMENT_SUCCEEDED]"));
        assert!(requests[3].prompt.contains("[process_payment] tool: [PAYMENT_SUCCEEDED]"));
    }

    #[tokio::test]
    async fn rejected_attempt_rolls_back_tool_results() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            text_response("[CONTINUE]"),
            tool_call_response("process_payment", serde_json::json!({})),
            text_response("Paid!"),
            text_response("You paid before confirming the price."),
            text_response("Could you confirm the total first?"),
            text_response("[YES]"),
        ]));
        let (tools, gateway) = payment_registry();
        let looper = conversation(provider.clone(), tools);
        let mut fx = Fixture::new("Pay here: https://pay.example.com/inv/8");
        let before = fx.context.len();

        let outcome = run(&looper, &mut fx).await.unwrap();

        assert!(matches!(outcome, TurnOutcome::Reply { attempts: 2, approved: true, .. }));
        assert_eq!(fx.context.len(), before);
        assert!(fx.context.messages().iter().all(|m| m.role != Role::Tool));
        // The gateway side effect is not undone by the rollback.
        assert_eq!(gateway.ledger().len(), 1);
        assert!(!provider.requests()[4].prompt.contains("[process_payment] tool"));
    }

    #[tokio::test]
    async fn unknown_tool_fails_the_turn() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            text_response("[CONTINUE]"),
            tool_call_response("wire_transfer", serde_json::json!({})),
        ]));
        let (tools, _) = payment_registry();
        let looper = conversation(provider, tools);
        let mut fx = Fixture::new("Pay me");
        let before = fx.context.len();

        let err = run(&looper, &mut fx).await.unwrap_err();

        assert!(matches!(
            err,
            Error::Tool(ToolError::NotFound(ref name)) if name == "wire_transfer"
        ));
        assert_eq!(fx.context.len(), before);
    }

    #[tokio::test]
    async fn provider_failure_leaves_context_untouched() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            text_response("[CONTINUE]"),
            tool_call_response("process_payment", serde_json::json!({})),
        ]));
        let (tools, _) = payment_registry();
        let looper = conversation(provider.clone(), tools);
        let mut fx = Fixture::new("Pay here: https://pay.example.com/inv/9");
        let before = fx.context.len();

        // The script runs out on the regeneration call.
        let err = run(&looper, &mut fx).await.unwrap_err();

        assert!(matches!(err, Error::Provider(_)));
        assert_eq!(fx.context.len(), before);
    }
}
