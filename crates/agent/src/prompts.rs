//! Prompt templates for the personal AI.
//!
//! Every model call the agent makes is rendered here, so the wording of the
//! protocol (which sentinel tokens the model may answer with) lives in one
//! place.

use envoy_core::agent::AgentProfile;
use envoy_core::sentinel::{APPROVED, CONTINUE, CONVERSATION_ENDS, PAYMENT_SUCCEEDED};

use crate::conversation::Turn;

/// Draft the next reply to the service agent.
pub fn generate_response(turn: &Turn<'_>, history: &str, feedback: &str) -> String {
    let me = &turn.agent.name;
    let owner = &turn.agent.owner;
    let service = &turn.counterparty.name;

    format!(
        r#"
You are {me}. You fulfill task on behalf of {owner}.
You will be chatting with a service agent {service} to complete a task.
You are provided the {owner}'s personal information and the description of the service agent.

# Task the user wants to complete
{intent}

# {owner}'s personal information
{owner_info}

# Service agent's description
{description}

# Conversation history
{history}

{feedback}

# Task for you
You are {me} to generate a response to {service}. Do not include {me} at the beginning of your response. If you find it difficult to complete the task after a few attempts, end the conversation politely.
"#,
        intent = turn.intent,
        owner_info = turn.owner_info,
        description = turn.counterparty.description,
    )
}

/// Ask whether the task is finished.
pub fn check_chat_state(turn: &Turn<'_>, history: &str) -> String {
    let owner = &turn.agent.owner;

    format!(
        r#"
Here is a conversation history between {owner}'s personal AI agent and the service agent.
The conversation is about to complete a task.

# Task that {owner} wants to complete:
{intent}

# Description of the service agent:
{description}

# Conversation history

{history}

# Task for you
You are {me} to continue the conversation. Based on the conversation history above, please determine the state of the conversation.

Here are states you can choose from:
{CONTINUE}: The conversation is still in progress and the task is not completed. Participants are still discussing the task.
{CONVERSATION_ENDS}: The task is completed. Participants in the conversation are satisfied with the outcome. {CONVERSATION_ENDS} exists in the conversation history. {PAYMENT_SUCCEEDED} exists in the conversation history.

Only reply with one of the states above.
"#,
        me = turn.agent.name,
        intent = turn.intent,
        description = turn.counterparty.description,
    )
}

/// Ask an independent reviewer whether `candidate` may be sent.
pub fn validate_response(turn: &Turn<'_>, history: &str, candidate: &str) -> String {
    let owner = &turn.agent.owner;

    format!(
        r#"
Here is a conversation history between {owner}'s personal AI agent and the service agent.
The conversation is about to complete a task.

# Task that {owner} wants to complete:
{intent}

# Description of the service agent:
{description}

# Conversation history
{history}

# Task for you
Now the personal AI is about to reply to the service agent with this response:
{candidate}

If you think the response is appropriate, please only reply with {APPROVED}.

If you think the response is not appropriate, please reply with one paragraph to explain why the response is not appropriate.
"#,
        intent = turn.intent,
        description = turn.counterparty.description,
    )
}

/// Notes fed into the next generation after a rejection.
pub fn rejection_feedback(candidate: &str, rationale: &str) -> String {
    format!(
        "# Notes\nPlease do not generate response like this: \n{candidate}\n\nThe reason is: \n{rationale}"
    )
}

/// Extract what one personal document says that matters for this task.
pub fn retrieve_personal_info(
    owner: &str,
    counterparty: &AgentProfile,
    intent: &str,
    document: &str,
) -> String {
    format!(
        r#"
I am doing a task for my client {owner}. The agent I am working with is {service}.

# The task description from my client
{intent}

# The description of the service agent
{description}

# Your task
Search through {owner}'s personal information and select the information that is relevant to the task and the service agent.
Based on the selected personal info, estimate the personal information for the task and service agent. Generate one single paragraph of 50 words.

# The personal information of my client

{document}
"#,
        service = counterparty.name,
        description = counterparty.description,
    )
}

/// Condense personal information into one paragraph.
pub fn summarize_personal_preferences(data: &str) -> String {
    format!(
        r#"
Please summarize the following personal information into one single paragraph of 100 words.

# Personal information
{data}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use envoy_core::message::Message;

    fn fixture() -> (AgentProfile, AgentProfile, Message) {
        (
            AgentProfile::new("alice_ai", "Alice", "Alice's personal AI"),
            AgentProfile::new("bistro", "Bistro Inc", "Books tables at the Bistro"),
            Message::user("bistro", "alice_ai", "How many guests?"),
        )
    }

    #[test]
    fn generate_prompt_carries_everything() {
        let (me, bistro, origin) = fixture();
        let turn = Turn {
            agent: &me,
            counterparty: &bistro,
            intent: "Book a table for two on Friday",
            owner_info: "Alice is vegetarian.\n\nPrefers window seats.",
            origin: &origin,
        };

        let prompt = generate_response(&turn, "bistro: How many guests?", "# Notes\nbe brief");
        assert!(prompt.contains("You are alice_ai. You fulfill task on behalf of Alice."));
        assert!(prompt.contains("# Alice's personal information\nAlice is vegetarian."));
        assert!(prompt.contains("Books tables at the Bistro"));
        assert!(prompt.contains("bistro: How many guests?"));
        assert!(prompt.contains("# Notes\nbe brief"));
        assert!(prompt.contains("generate a response to bistro"));
    }

    #[test]
    fn protocol_prompts_name_their_tokens() {
        let (me, bistro, origin) = fixture();
        let turn = Turn {
            agent: &me,
            counterparty: &bistro,
            intent: "Book a table",
            owner_info: "",
            origin: &origin,
        };

        let state = check_chat_state(&turn, "");
        assert!(state.contains("[CONTINUE]: The conversation is still in progress"));
        assert!(state.contains("[PAYMENT_SUCCEEDED] exists"));

        let validate = validate_response(&turn, "", "Two guests, please.");
        assert!(validate.contains("Two guests, please."));
        assert!(validate.contains("please only reply with [YES]."));
    }

    #[test]
    fn rejection_feedback_format() {
        assert_eq!(
            rejection_feedback("Pay me", "Too rude."),
            "# Notes\nPlease do not generate response like this: \nPay me\n\nThe reason is: \nToo rude."
        );
    }

    #[test]
    fn retrieval_prompts() {
        let bistro = AgentProfile::new("bistro", "Bistro Inc", "Books tables");
        let prompt = retrieve_personal_info("Alice", &bistro, "Book a table", "{\"diet\": \"vegetarian\"}");
        assert!(prompt.contains("The agent I am working with is bistro."));
        assert!(prompt.contains("one single paragraph of 50 words"));
        assert!(prompt.ends_with("{\"diet\": \"vegetarian\"}\n"));

        assert!(summarize_personal_preferences("x").contains("100 words"));
    }
}
