// Commit command - AI-generated commit messages
//
// One remote call generates the draft; the yes/no/edit confirmation
// loop afterwards never calls the AI again. Revised drafts travel in
// the prompt state until the user accepts or cancels.

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
struct CommitState {
    draft: String,
    session_id: i64,
    model: String,
}

fn strip_quotes(message: &str) -> &str {
    let message = message.trim();
    message
        .strip_prefix('"')
        .and_then(|m| m.strip_suffix('"'))
        .or_else(|| {
            message
                .strip_prefix('\'')
                .and_then(|m| m.strip_suffix('\''))
        })
        .unwrap_or(message)
}

fn confirm_prompt(state: CommitState, heading: &str, staged_files: Option<&str>) -> Result<Outcome> {
    let mut message = String::new();
    if let Some(files) = staged_files {
        message.push_str("Staged files:\n");
        message.push_str(files);
        message.push_str("\n\n");
    }
    message.push_str(&format!("{}\n\"{}\"", heading, state.draft));
    message.push_str("\n\nExecute this commit? (yes/no/edit <new message>)");
    Ok(Outcome::prompt(
        PromptKind::YesNoEdit,
        message,
        serde_json::to_value(state)?,
    ))
}

pub struct CommitCommand;

#[async_trait]
impl CommandHandler for CommitCommand {
    fn name(&self) -> &'static str {
        "commit"
    }

    fn description(&self) -> &'static str {
        "Generate an AI commit message for staged changes"
    }

    fn category(&self) -> &'static str {
        "Version Control"
    }

    fn help(&self) -> String {
        "/commit - generate a commit message from the staged diff\n\n\
         Stage your files first (git add), then run /commit. The AI\n\
         drafts a message; reply yes to commit, no to cancel, or type a\n\
         revised message (optionally prefixed with `edit `) to replace\n\
         the draft without another AI call."
            .to_string()
    }

    fn progress(&self, invocation: &Invocation) -> Option<ProgressSpec> {
        // Only the draft generation talks to the AI; the confirmation
        // loop must stay instant.
        match invocation {
            Invocation::Start { .. } => Some(ProgressSpec::new("Commit", 45)),
            Invocation::Resume { .. } => None,
        }
    }

    async fn call(&self, agent: &mut SessionAgent, invocation: Invocation) -> Result<Outcome> {
        match invocation {
            Invocation::Start { .. } => self.generate(agent).await,
            Invocation::Resume { state, reply } => {
                let state: CommitState = serde_json::from_value(state)?;
                let reply = reply.trim();

                if reply.eq_ignore_ascii_case("yes") {
                    let result = match git::commit(&state.draft) {
                        Ok(result) => result,
                        Err(e) => return Ok(Outcome::fail(format!("Commit failed: {:#}", e))),
                    };
                    return Ok(Outcome::ok_with(
                        result,
                        payload(&[
                            ("action", json!("executed")),
                            ("session_id", json!(state.session_id)),
                        ]),
                    ));
                }

                // Anything else is a revised draft; re-emit without
                // touching the remote service.
                let revised = reply.strip_prefix("edit ").unwrap_or(reply).trim();
                confirm_prompt(
                    CommitState {
                        draft: revised.to_string(),
                        ..state
                    },
                    "Updated commit message:",
                    None,
                )
            }
        }
    }
}

impl CommitCommand {
    async fn generate(&self, agent: &mut SessionAgent) -> Result<Outcome> {
        if !git::is_repository(std::path::Path::new(".")) {
            return Ok(Outcome::fail(
                "No git repository found in the current directory",
            ));
        }

        let staged_files = match git::staged_files() {
            Ok(files) => files,
            Err(e) => return Ok(Outcome::fail(format!("{:#}", e))),
        };
        if staged_files.is_empty() {
            return Ok(Outcome::fail(
                "No staged files. Stage changes with `git add` first.",
            ));
        }

        if agent.api_key().await?.is_none() {
            return Ok(Outcome::fail(
                "No API key found. Please run /setup first to configure your Gemini API key.",
            ));
        }

        let staged_diff = match git::staged_diff() {
            Ok(diff) => diff,
            Err(e) => return Ok(Outcome::fail(format!("{:#}", e))),
        };
        let recent_commits = git::recent_commits(3).unwrap_or_default();

        agent.start_session(Some("Git Commit Message Generation")).await?;

        let user_message = prompts::commit_user(&staged_files, &staged_diff, &recent_commits);
        let reply = match agent
            .send_with_system(prompts::COMMIT_SYSTEM, &user_message)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                return Ok(Outcome::fail(format!(
                    "AI commit message generation failed: {:#}",
                    e
                )))
            }
        };

        let draft = strip_quotes(&reply.text).to_string();
        confirm_prompt(
            CommitState {
                draft,
                session_id: reply.session_id,
                model: reply.model,
            },
            "AI-generated commit message:",
            Some(&staged_files),
        )
    }
}
