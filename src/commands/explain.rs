// Explain command - AI explanation of pasted code, a file, or a directory
//
// Two-step continuation: first pick the source (paste / file / current
// directory), then the analysis leg performs exactly one remote call.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;

use super::outcome::{payload, Outcome, PromptKind};
use super::prompts;
use super::{CommandHandler, Invocation, ProgressSpec};
use crate::agent::SessionAgent;
use crate::project;

/// Files above this size are truncated before prompting.
const MAX_FILE_CHARS: usize = 24_000;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
enum ExplainState {
    ChooseSource,
    PasteCode,
}

fn source_prompt(note: Option<&str>) -> Result<Outcome> {
    let mut message = String::new();
    if let Some(note) = note {
        message.push_str(note);
        message.push_str("\n\n");
    }
    message.push_str("What would you like explained?");
    Ok(Outcome::prompt(
        PromptKind::Choice,
        message,
        serde_json::to_value(ExplainState::ChooseSource)?,
    )
    .with_choices(vec![
        "paste - paste code to analyze".to_string(),
        "file <path> - analyze a specific file".to_string(),
        "current - analyze the current directory".to_string(),
    ]))
}

pub struct ExplainCommand;

#[async_trait]
impl CommandHandler for ExplainCommand {
    fn name(&self) -> &'static str {
        "explain"
    }

    fn description(&self) -> &'static str {
        "Explain code from a file, paste or directory"
    }

    fn category(&self) -> &'static str {
        "Code Analysis"
    }

    fn help(&self) -> String {
        "/explain - AI code explanation\n\n\
         Choose a source when prompted:\n\
           1 or paste        - paste code on the next line\n\
           2 or file <path>  - analyze one file\n\
           3 or current      - analyze the current directory"
            .to_string()
    }

    fn progress(&self, invocation: &Invocation) -> Option<ProgressSpec> {
        // Animate only the legs that reach the AI.
        let Invocation::Resume { state, reply } = invocation else {
            return None;
        };
        match state.get("step").and_then(|s| s.as_str()) {
            Some("paste_code") => Some(ProgressSpec::new("Code Analysis", 45)),
            Some("choose_source") => {
                let reply = reply.trim();
                if reply == "3" || reply.eq_ignore_ascii_case("current") {
                    Some(ProgressSpec::new("Directory Analysis", 45))
                } else if reply.starts_with("file ") || reply.starts_with("2 ") {
                    Some(ProgressSpec::new("File Analysis", 45))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    async fn call(&self, agent: &mut SessionAgent, invocation: Invocation) -> Result<Outcome> {
        match invocation {
            Invocation::Start { .. } => source_prompt(None),
            Invocation::Resume { state, reply } => {
                let state: ExplainState = serde_json::from_value(state)?;
                match state {
                    ExplainState::ChooseSource => self.dispatch_source(agent, reply.trim()).await,
                    ExplainState::PasteCode => self.analyze_code(agent, &reply).await,
                }
            }
        }
    }
}

impl ExplainCommand {
    async fn dispatch_source(&self, agent: &mut SessionAgent, reply: &str) -> Result<Outcome> {
        if reply == "1" || reply.eq_ignore_ascii_case("paste") {
            return Ok(Outcome::prompt(
                PromptKind::FreeText,
                "Paste the code to analyze:",
                serde_json::to_value(ExplainState::PasteCode)?,
            ));
        }

        if reply == "3" || reply.eq_ignore_ascii_case("current") {
            return self.analyze_directory(agent).await;
        }

        if let Some(path) = reply
            .strip_prefix("file ")
            .or_else(|| reply.strip_prefix("2 "))
        {
            return self.analyze_file(agent, path.trim()).await;
        }

        source_prompt(Some(
            "Please choose 1-3, or type `paste`, `file <path>` or `current`",
        ))
    }

    async fn ensure_key(&self, agent: &SessionAgent) -> Result<Option<Outcome>> {
        if agent.api_key().await?.is_none() {
            return Ok(Some(Outcome::fail(
                "No API key found. Please run /setup first to configure your Gemini API key.",
            )));
        }
        Ok(None)
    }

    async fn analyze_code(&self, agent: &mut SessionAgent, code: &str) -> Result<Outcome> {
        if let Some(failure) = self.ensure_key(agent).await? {
            return Ok(failure);
        }

        agent.start_session(Some("Code Explanation")).await?;
        let reply = match agent
            .send_with_system(prompts::EXPLAIN_CODE_SYSTEM, code)
            .await
        {
            Ok(reply) => reply,
            Err(e) => return Ok(Outcome::fail(format!("Analysis failed: {:#}", e))),
        };

        Ok(Outcome::ok_with(
            format!("Code explanation:\n\n{}", reply.text),
            payload(&[
                ("model", json!(reply.model)),
                ("session_id", json!(reply.session_id)),
            ]),
        ))
    }

    async fn analyze_file(&self, agent: &mut SessionAgent, path: &str) -> Result<Outcome> {
        let file_path = Path::new(path);
        let mut contents = match std::fs::read_to_string(file_path) {
            Ok(contents) => contents,
            Err(e) => {
                return Ok(Outcome::fail(format!(
                    "Could not read {}: {}. Use a path like ./src/main.rs",
                    path, e
                )))
            }
        };
        if contents.len() > MAX_FILE_CHARS {
            let mut cut = MAX_FILE_CHARS;
            while !contents.is_char_boundary(cut) {
                cut -= 1;
            }
            contents.truncate(cut);
            contents.push_str("\n\n[... file truncated ...]");
        }

        if let Some(failure) = self.ensure_key(agent).await? {
            return Ok(failure);
        }

        agent.start_session(Some("File Explanation")).await?;
        let user_message = format!("File: {}\n\n{}", path, contents);
        let reply = match agent
            .send_with_system(prompts::EXPLAIN_FILE_SYSTEM, &user_message)
            .await
        {
            Ok(reply) => reply,
            Err(e) => return Ok(Outcome::fail(format!("Analysis failed: {:#}", e))),
        };

        Ok(Outcome::ok_with(
            format!("Explanation of {}:\n\n{}", path, reply.text),
            payload(&[
                ("model", json!(reply.model)),
                ("session_id", json!(reply.session_id)),
                ("file", json!(path)),
            ]),
        ))
    }

    async fn analyze_directory(&self, agent: &mut SessionAgent) -> Result<Outcome> {
        let cwd = std::env::current_dir()?;
        let summary = match project::summary(&cwd) {
            Ok(summary) => summary,
            Err(e) => return Ok(Outcome::fail(format!("{:#}", e))),
        };

        if let Some(failure) = self.ensure_key(agent).await? {
            return Ok(failure);
        }

        agent.start_session(Some("Directory Explanation")).await?;
        let reply = match agent
            .send_with_system(prompts::EXPLAIN_DIR_SYSTEM, &summary)
            .await
        {
            Ok(reply) => reply,
            Err(e) => return Ok(Outcome::fail(format!("Analysis failed: {:#}", e))),
        };

        Ok(Outcome::ok_with(
            format!("Project analysis:\n\n{}", reply.text),
            payload(&[
                ("model", json!(reply.model)),
                ("session_id", json!(reply.session_id)),
                ("directory", json!(cwd.display().to_string())),
            ]),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::gemini::{ChatBackend, ChatMessage, ChatResponse, TokenUsage};
    use crate::store::SessionStore;
    use std::sync::Arc;

    struct EchoBackend;

    #[async_trait]
    impl ChatBackend for EchoBackend {
        async fn send(
            &self,
            _: &str,
            model: &str,
            prompt: &str,
            _: &[ChatMessage],
        ) -> Result<ChatResponse> {
            Ok(ChatResponse {
                text: format!("explained {} chars", prompt.len()),
                model: model.to_string(),
                usage: TokenUsage::default(),
            })
        }
    }

    async fn configured_agent() -> SessionAgent {
        let store = Arc::new(SessionStore::in_memory().unwrap());
        store
            .update_user_config("test-key-1234567890", "gemini-pro")
            .await
            .unwrap();
        SessionAgent::new(store, Arc::new(EchoBackend), Settings::default())
    }

    #[tokio::test]
    async fn start_offers_three_sources() {
        let mut agent = configured_agent().await;
        let outcome = ExplainCommand
            .call(&mut agent, Invocation::Start { args: vec![] })
            .await
            .unwrap();
        match outcome {
            Outcome::NeedsInput {
                kind: PromptKind::Choice,
                choices,
                ..
            } => assert_eq!(choices.len(), 3),
            other => panic!("expected source prompt, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn paste_flow_reaches_analysis() {
        let mut agent = configured_agent().await;
        let cmd = ExplainCommand;

        let picked = cmd
            .call(
                &mut agent,
                Invocation::Resume {
                    state: serde_json::to_value(ExplainState::ChooseSource).unwrap(),
                    reply: "paste".to_string(),
                },
            )
            .await
            .unwrap();
        let state = match picked {
            Outcome::NeedsInput {
                kind: PromptKind::FreeText,
                state,
                ..
            } => state,
            other => panic!("expected paste prompt, got {:?}", other),
        };

        let analyzed = cmd
            .call(
                &mut agent,
                Invocation::Resume {
                    state,
                    reply: "fn main() {}".to_string(),
                },
            )
            .await
            .unwrap();
        match analyzed {
            Outcome::Done {
                success: true,
                message,
                ..
            } => assert!(message.contains("explained")),
            other => panic!("expected explanation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn invalid_source_choice_reprompts() {
        let mut agent = configured_agent().await;
        let outcome = ExplainCommand
            .call(
                &mut agent,
                Invocation::Resume {
                    state: serde_json::to_value(ExplainState::ChooseSource).unwrap(),
                    reply: "7".to_string(),
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

    #[test]
    fn progress_only_on_analysis_legs() {
        let cmd = ExplainCommand;
        assert!(cmd.progress(&Invocation::Start { args: vec![] }).is_none());
        assert!(cmd
            .progress(&Invocation::Resume {
                state: json!({"step": "choose_source"}),
                reply: "paste".to_string(),
            })
            .is_none());
        assert!(cmd
            .progress(&Invocation::Resume {
                state: json!({"step": "choose_source"}),
                reply: "current".to_string(),
            })
            .is_some());
        assert!(cmd
            .progress(&Invocation::Resume {
                state: json!({"step": "paste_code"}),
                reply: "fn main() {}".to_string(),
            })
            .is_some());
    }
}
