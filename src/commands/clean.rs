// Clean command - conversation database maintenance
//
// clean (destructive, double-confirmed), stats, vacuum.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::outcome::{Outcome, PromptKind};
use super::{CommandHandler, Invocation};
use crate::agent::SessionAgent;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
enum CleanState {
    ChooseAction,
    ConfirmClean,
}

fn action_prompt(note: Option<&str>) -> Result<Outcome> {
    let mut message = String::new();
    if let Some(note) = note {
        message.push_str(note);
        message.push_str("\n\n");
    }
    message.push_str("Database maintenance - what would you like to do?");
    Ok(Outcome::prompt(
        PromptKind::Choice,
        message,
        serde_json::to_value(CleanState::ChooseAction)?,
    )
    .with_choices(vec![
        "clean - delete all conversations and settings".to_string(),
        "stats - show database statistics".to_string(),
        "vacuum - optimize and reclaim space".to_string(),
    ]))
}

pub struct CleanCommand;

#[async_trait]
impl CommandHandler for CleanCommand {
    fn name(&self) -> &'static str {
        "clean"
    }

    fn description(&self) -> &'static str {
        "Conversation database maintenance"
    }

    fn category(&self) -> &'static str {
        "Maintenance"
    }

    fn help(&self) -> String {
        "/clean - database maintenance\n\n\
         Actions:\n\
           clean  - delete ALL data: settings, API key, every conversation\n\
           stats  - table counts and database size\n\
           vacuum - reclaim unused space\n\n\
         The clean action asks for an explicit `yes` before deleting."
            .to_string()
    }

    async fn call(&self, agent: &mut SessionAgent, invocation: Invocation) -> Result<Outcome> {
        match invocation {
            Invocation::Start { .. } => action_prompt(None),
            Invocation::Resume { state, reply } => {
                let state: CleanState = serde_json::from_value(state)?;
                let reply = reply.trim().to_lowercase();
                match state {
                    CleanState::ChooseAction => match reply.as_str() {
                        "1" | "clean" => Ok(Outcome::prompt(
                            PromptKind::Confirm,
                            "This permanently deletes all conversations, settings and the API key.\nType yes to confirm:",
                            serde_json::to_value(CleanState::ConfirmClean)?,
                        )),
                        "2" | "stats" => self.stats(agent).await,
                        "3" | "vacuum" => {
                            agent.store().vacuum().await?;
                            Ok(Outcome::ok("Database vacuumed"))
                        }
                        _ => action_prompt(Some(
                            "Unknown action. Choose 1-3, or clean/stats/vacuum",
                        )),
                    },
                    CleanState::ConfirmClean => {
                        if reply == "yes" {
                            agent.store().purge_all().await?;
                            agent.clear_current();
                            Ok(Outcome::ok(
                                "Database cleaned - all conversations and settings deleted",
                            ))
                        } else {
                            Ok(Outcome::ok("Clean cancelled - nothing was deleted"))
                        }
                    }
                }
            }
        }
    }
}

impl CleanCommand {
    async fn stats(&self, agent: &SessionAgent) -> Result<Outcome> {
        let stats = agent.store().stats().await?;
        let location = stats
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(in memory)".to_string());
        Ok(Outcome::ok(format!(
            "Database statistics:\n  Location: {}\n  Size: {} bytes\n  Users: {}\n  Sessions: {}\n  Messages: {}",
            location, stats.db_size_bytes, stats.users, stats.sessions, stats.messages
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::gemini::{ChatBackend, ChatMessage, ChatResponse};
    use crate::store::SessionStore;
    use std::sync::Arc;

    struct NoBackend;

    #[async_trait]
    impl ChatBackend for NoBackend {
        async fn send(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: &[ChatMessage],
        ) -> Result<ChatResponse> {
            anyhow::bail!("not used")
        }
    }

    async fn agent_with_data() -> SessionAgent {
        let store = Arc::new(SessionStore::in_memory().unwrap());
        let user = store.get_or_create_default_user().await.unwrap();
        let session = store
            .create_session(user.id, "gemini-pro", None)
            .await
            .unwrap();
        store
            .append_message(session.id, "user", "hello", None)
            .await
            .unwrap();
        SessionAgent::new(store, Arc::new(NoBackend), Settings::default())
    }

    #[tokio::test]
    async fn clean_requires_explicit_yes() {
        let mut agent = agent_with_data().await;
        let cmd = CleanCommand;

        let confirm = cmd
            .call(
                &mut agent,
                Invocation::Resume {
                    state: serde_json::to_value(CleanState::ChooseAction).unwrap(),
                    reply: "clean".to_string(),
                },
            )
            .await
            .unwrap();
        let state = match confirm {
            Outcome::NeedsInput {
                kind: PromptKind::Confirm,
                state,
                ..
            } => state,
            other => panic!("expected confirm, got {:?}", other),
        };

        // A hesitant reply cancels
        let declined = cmd
            .call(
                &mut agent,
                Invocation::Resume {
                    state: state.clone(),
                    reply: "no".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(matches!(declined, Outcome::Done { success: true, .. }));
        assert_eq!(agent.store().stats().await.unwrap().messages, 1);

        // An explicit yes purges
        cmd.call(
            &mut agent,
            Invocation::Resume {
                state,
                reply: "yes".to_string(),
            },
        )
        .await
        .unwrap();
        let stats = agent.store().stats().await.unwrap();
        assert_eq!(stats.sessions, 0);
        assert_eq!(stats.messages, 0);
    }

    #[tokio::test]
    async fn stats_reports_counts() {
        let mut agent = agent_with_data().await;
        let outcome = CleanCommand
            .call(
                &mut agent,
                Invocation::Resume {
                    state: serde_json::to_value(CleanState::ChooseAction).unwrap(),
                    reply: "stats".to_string(),
                },
            )
            .await
            .unwrap();
        match outcome {
            Outcome::Done {
                success: true,
                message,
                ..
            } => {
                assert!(message.contains("Sessions: 1"));
                assert!(message.contains("Messages: 1"));
            }
            other => panic!("expected stats, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unknown_action_reprompts() {
        let mut agent = agent_with_data().await;
        let outcome = CleanCommand
            .call(
                &mut agent,
                Invocation::Resume {
                    state: serde_json::to_value(CleanState::ChooseAction).unwrap(),
                    reply: "explode".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            Outcome::NeedsInput {
                kind: PromptKind::Choice,
                ..
            }
        ));
    }
}
