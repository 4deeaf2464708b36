// Review command - AI code review of pending git changes

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::outcome::{payload, Outcome, PromptKind};
use super::prompts;
use super::{CommandHandler, Invocation, ProgressSpec};
use crate::agent::SessionAgent;
use crate::git;

#[derive(Debug, Serialize, Deserialize)]
struct ReviewState {
    session_id: i64,
}

pub struct ReviewCommand;

#[async_trait]
impl CommandHandler for ReviewCommand {
    fn name(&self) -> &'static str {
        "review-changes"
    }

    fn description(&self) -> &'static str {
        "AI review of staged and unstaged git changes"
    }

    fn category(&self) -> &'static str {
        "Code Review"
    }

    fn help(&self) -> String {
        "/review-changes - run an AI code review over everything that\n\
         changed since HEAD (staged and unstaged). Afterwards choose\n\
         whether to keep the review in the conversation log (yes) or\n\
         discard it (no)."
            .to_string()
    }

    fn progress(&self, invocation: &Invocation) -> Option<ProgressSpec> {
        match invocation {
            Invocation::Start { .. } => Some(ProgressSpec::new("Review", 45)),
            Invocation::Resume { .. } => None,
        }
    }

    async fn call(&self, agent: &mut SessionAgent, invocation: Invocation) -> Result<Outcome> {
        match invocation {
            Invocation::Start { .. } => self.review(agent).await,
            Invocation::Resume { state, reply } => {
                let state: ReviewState = serde_json::from_value(state)?;
                let reply = reply.trim();

                if reply.eq_ignore_ascii_case("yes") {
                    Ok(Outcome::ok_with(
                        format!("Review saved (session {})", state.session_id),
                        payload(&[("session_id", json!(state.session_id))]),
                    ))
                } else if reply.eq_ignore_ascii_case("no") {
                    agent.delete_session(state.session_id).await?;
                    Ok(Outcome::ok("Review discarded"))
                } else {
                    Ok(Outcome::prompt(
                        PromptKind::Confirm,
                        "Save this review to the conversation log? (yes/no)",
                        serde_json::to_value(state)?,
                    ))
                }
            }
        }
    }
}

impl ReviewCommand {
    async fn review(&self, agent: &mut SessionAgent) -> Result<Outcome> {
        if !git::is_repository(std::path::Path::new(".")) {
            return Ok(Outcome::fail(
                "No git repository found in the current directory",
            ));
        }

        if agent.api_key().await?.is_none() {
            return Ok(Outcome::fail(
                "No API key found. Please run /setup first to configure your Gemini API key.",
            ));
        }

        let changes_diff = match git::all_changes_diff() {
            Ok(diff) => diff,
            Err(e) => return Ok(Outcome::fail(format!("{:#}", e))),
        };
        if changes_diff.is_empty() {
            return Ok(Outcome::fail(
                "No changes found. There is nothing to review.",
            ));
        }

        let git_status = git::status().unwrap_or_default();
        let recent_commits = git::recent_commits(3).unwrap_or_default();

        agent.start_session(Some("Code Review")).await?;

        let user_message = prompts::review_user(&git_status, &changes_diff, &recent_commits);
        let reply = match agent
            .send_with_system(prompts::REVIEW_SYSTEM, &user_message)
            .await
        {
            Ok(reply) => reply,
            Err(e) => return Ok(Outcome::fail(format!("AI code review failed: {:#}", e))),
        };

        let message = format!(
            "Git status:\n{}\n\nAI code review:\n{}\n\nGenerated by {} (session {})\n\nSave this review to the conversation log? (yes/no)",
            git_status, reply.text, reply.model, reply.session_id
        );

        Ok(Outcome::prompt(
            PromptKind::Confirm,
            message,
            serde_json::to_value(ReviewState {
                session_id: reply.session_id,
            })?,
        ))
    }
}
