// Setup command - API key and model configuration wizard
//
// Three-step continuation chain: optional reconfigure confirmation,
// API key entry, model selection. All state travels in the prompt's
// resumable blob; nothing is remembered between turns outside it.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::outcome::{payload, Outcome, PromptKind};
use super::{CommandHandler, Invocation};
use crate::agent::SessionAgent;
use crate::config::constants::{API_KEY_URL, AVAILABLE_MODELS, MIN_API_KEY_LEN};

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
enum SetupState {
    ConfirmReconfigure,
    ApiKey,
    Model { api_key: String },
}

fn api_key_prompt(note: Option<&str>) -> Result<Outcome> {
    let mut message = String::new();
    if let Some(note) = note {
        message.push_str(note);
        message.push_str("\n\n");
    }
    message.push_str(&format!(
        "Gemini API key configuration\nEnter your API key (get one at {}):",
        API_KEY_URL
    ));
    Ok(Outcome::prompt(
        PromptKind::FreeText,
        message,
        serde_json::to_value(SetupState::ApiKey)?,
    ))
}

fn model_prompt(api_key: String, current: &str, note: Option<&str>) -> Result<Outcome> {
    let mut message = String::new();
    if let Some(note) = note {
        message.push_str(note);
        message.push_str("\n\n");
    }
    message.push_str(&format!("Current model: {}\n\nSelect a model:", current));
    Ok(
        Outcome::prompt(
            PromptKind::Choice,
            message,
            serde_json::to_value(SetupState::Model { api_key })?,
        )
        .with_choices(AVAILABLE_MODELS.iter().map(|m| m.to_string()).collect()),
    )
}

pub struct SetupCommand;

#[async_trait]
impl CommandHandler for SetupCommand {
    fn name(&self) -> &'static str {
        "setup"
    }

    fn description(&self) -> &'static str {
        "Configure the Gemini API key and model"
    }

    fn category(&self) -> &'static str {
        "Agent Configuration"
    }

    fn help(&self) -> String {
        format!(
            "/setup - configure the agent\n\n\
             Walks through API key entry and model selection, then saves\n\
             the configuration. Keys are stored locally and shown masked.\n\
             Get a key at {}",
            API_KEY_URL
        )
    }

    async fn call(&self, agent: &mut SessionAgent, invocation: Invocation) -> Result<Outcome> {
        match invocation {
            Invocation::Start { .. } => {
                let user = agent.store().get_or_create_default_user().await?;
                if user.is_setup_complete() {
                    Ok(Outcome::prompt(
                        PromptKind::Confirm,
                        format!(
                            "Agent is already configured.\nAPI key: {}\nModel: {}\n\nReconfigure? (yes/no)",
                            user.masked_api_key(),
                            user.model()
                        ),
                        serde_json::to_value(SetupState::ConfirmReconfigure)?,
                    ))
                } else {
                    api_key_prompt(None)
                }
            }
            Invocation::Resume { state, reply } => {
                let state: SetupState = serde_json::from_value(state)?;
                let reply = reply.trim();
                match state {
                    SetupState::ConfirmReconfigure => {
                        if reply.eq_ignore_ascii_case("yes") {
                            api_key_prompt(None)
                        } else {
                            Ok(Outcome::ok("Setup cancelled"))
                        }
                    }
                    SetupState::ApiKey => {
                        if reply.len() < MIN_API_KEY_LEN {
                            api_key_prompt(Some(
                                "API key seems too short. Please check and try again.",
                            ))
                        } else {
                            let current = agent.model().await?;
                            model_prompt(reply.to_string(), &current, None)
                        }
                    }
                    SetupState::Model { api_key } => match parse_choice(reply) {
                        Some(model) => {
                            let user = agent.store().update_user_config(&api_key, model).await?;
                            Ok(Outcome::ok_with(
                                format!(
                                    "Setup completed successfully\nAPI key: {}\nModel: {}",
                                    user.masked_api_key(),
                                    model
                                ),
                                payload(&[("api_key_set", json!(true)), ("model", json!(model))]),
                            ))
                        }
                        None => {
                            let current = agent.model().await?;
                            model_prompt(
                                api_key,
                                &current,
                                Some(&format!(
                                    "Please enter a number between 1 and {}",
                                    AVAILABLE_MODELS.len()
                                )),
                            )
                        }
                    },
                }
            }
        }
    }
}

fn parse_choice(reply: &str) -> Option<&'static str> {
    let n: usize = reply.parse().ok()?;
    (1..=AVAILABLE_MODELS.len())
        .contains(&n)
        .then(|| AVAILABLE_MODELS[n - 1])
}
