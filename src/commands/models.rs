// Models command - show and change the active Gemini model

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::outcome::{payload, Outcome, PromptKind};
use super::{CommandHandler, Invocation};
use crate::agent::SessionAgent;
use crate::config::constants::{API_KEY_URL, AVAILABLE_MODELS};

#[derive(Debug, Serialize, Deserialize)]
struct ModelsState {
    current: String,
}

fn choice_prompt(current: &str, note: Option<&str>) -> Result<Outcome> {
    let mut message = String::new();
    if let Some(note) = note {
        message.push_str(note);
        message.push_str("\n\n");
    }
    message.push_str(&format!("Current model: {}\n\nAvailable models:", current));
    Ok(Outcome::prompt(
        PromptKind::Choice,
        message,
        serde_json::to_value(ModelsState {
            current: current.to_string(),
        })?,
    )
    .with_choices(AVAILABLE_MODELS.iter().map(|m| m.to_string()).collect()))
}

pub struct ModelsCommand;

#[async_trait]
impl CommandHandler for ModelsCommand {
    fn name(&self) -> &'static str {
        "models"
    }

    fn description(&self) -> &'static str {
        "Show and change the AI model"
    }

    fn category(&self) -> &'static str {
        "Agent Configuration"
    }

    fn help(&self) -> String {
        let list = AVAILABLE_MODELS
            .iter()
            .map(|m| format!("  * {}", m))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "/models - show the current model and switch to another\n\nAvailable models:\n{}\n\nSelect by number; press Enter to cancel.",
            list
        )
    }

    async fn call(&self, agent: &mut SessionAgent, invocation: Invocation) -> Result<Outcome> {
        match invocation {
            Invocation::Start { .. } => {
                let current = agent.model().await?;
                let note = if agent.api_key().await?.is_none() {
                    Some(format!(
                        "No API key configured yet - run /setup to set one (get a key at {})",
                        API_KEY_URL
                    ))
                } else {
                    None
                };
                choice_prompt(&current, note.as_deref())
            }
            Invocation::Resume { state, reply } => {
                let state: ModelsState = serde_json::from_value(state)?;
                match reply.trim().parse::<usize>() {
                    Ok(n) if (1..=AVAILABLE_MODELS.len()).contains(&n) => {
                        let selected = AVAILABLE_MODELS[n - 1];
                        agent.store().update_user_model(selected).await?;
                        Ok(Outcome::ok_with(
                            format!("Model changed to: {}", selected),
                            payload(&[
                                ("model", json!(selected)),
                                ("previous_model", json!(state.current)),
                            ]),
                        ))
                    }
                    _ => choice_prompt(
                        &state.current,
                        Some(&format!(
                            "Please enter a number between 1 and {}",
                            AVAILABLE_MODELS.len()
                        )),
                    ),
                }
            }
        }
    }
}
