// Chat fallback - free-form input routed through the AI assistant
//
// Invoked for any line that does not start with the command prefix.
// Conversations accumulate in one "General Assistant" session so the
// assistant keeps context across turns.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use super::outcome::{payload, Outcome};
use super::prompts;
use super::{CommandHandler, Invocation, ProgressSpec};
use crate::agent::SessionAgent;

pub struct ChatCommand;

#[async_trait]
impl CommandHandler for ChatCommand {
    fn name(&self) -> &'static str {
        "chat"
    }

    fn description(&self) -> &'static str {
        "Ask the AI assistant anything"
    }

    fn category(&self) -> &'static str {
        "Assistant"
    }

    fn progress(&self, _invocation: &Invocation) -> Option<ProgressSpec> {
        Some(ProgressSpec::new("AI Assistant", 30))
    }

    async fn call(&self, agent: &mut SessionAgent, invocation: Invocation) -> Result<Outcome> {
        let text = match &invocation {
            Invocation::Start { args } => args.join(" "),
            Invocation::Resume { reply, .. } => reply.clone(),
        };
        let text = text.trim();
        if text.is_empty() {
            return Ok(Outcome::fail("No input provided"));
        }

        if agent.api_key().await?.is_none() {
            return Ok(Outcome::fail(
                "I'd love to help, but I need an API key first. Run /setup to configure your Gemini API key.",
            ));
        }

        agent.ensure_session("General Assistant").await?;

        let reply = match agent.send_with_system(prompts::CHAT_SYSTEM, text).await {
            Ok(reply) => reply,
            Err(e) => return Ok(Outcome::fail(format!("AI assistant failed: {:#}", e))),
        };

        Ok(Outcome::ok_with(
            reply.text.clone(),
            payload(&[
                ("model", json!(reply.model)),
                ("session_id", json!(reply.session_id)),
            ]),
        ))
    }
}
