// Init command - AI-generated project documentation
//
// Prompts for a project path, analyzes the tree, then one remote call
// produces README.md content. PROJECT_ANALYSIS.md records what the
// generation was based on.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;

use super::outcome::{payload, Outcome, PromptKind};
use super::prompts;
use super::{CommandHandler, Invocation, ProgressSpec};
use crate::agent::SessionAgent;
use crate::project;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
enum InitState {
    ProjectPath,
}

pub struct InitCommand;

#[async_trait]
impl CommandHandler for InitCommand {
    fn name(&self) -> &'static str {
        "init"
    }

    fn description(&self) -> &'static str {
        "Generate project documentation"
    }

    fn category(&self) -> &'static str {
        "Project Initialization"
    }

    fn help(&self) -> String {
        "/init - generate README.md and PROJECT_ANALYSIS.md\n\n\
         Analyzes the project structure, languages and key files, then\n\
         asks the AI to write a README. Existing files are overwritten."
            .to_string()
    }

    fn progress(&self, invocation: &Invocation) -> Option<ProgressSpec> {
        match invocation {
            Invocation::Start { .. } => None,
            Invocation::Resume { .. } => Some(ProgressSpec::new("Documentation", 60)),
        }
    }

    async fn call(&self, agent: &mut SessionAgent, invocation: Invocation) -> Result<Outcome> {
        match invocation {
            Invocation::Start { .. } => Ok(Outcome::prompt(
                PromptKind::FreeText,
                "Enter the project path ('.' for the current directory):",
                serde_json::to_value(InitState::ProjectPath)?,
            )),
            Invocation::Resume { state, reply } => {
                let _: InitState = serde_json::from_value(state)?;
                self.generate(agent, reply.trim()).await
            }
        }
    }
}

impl InitCommand {
    async fn generate(&self, agent: &mut SessionAgent, path: &str) -> Result<Outcome> {
        let root: PathBuf = if path.is_empty() || path == "." || path.eq_ignore_ascii_case("current")
        {
            std::env::current_dir()?
        } else {
            PathBuf::from(path)
        };

        let summary = match project::summary(&root) {
            Ok(summary) => summary,
            Err(e) => {
                return Ok(Outcome::fail(format!(
                    "{:#}. Use an absolute or relative directory path.",
                    e
                )))
            }
        };

        if agent.api_key().await?.is_none() {
            return Ok(Outcome::fail(
                "No API key found. Please run /setup first to configure your Gemini API key.",
            ));
        }

        agent.start_session(Some("Project Documentation")).await?;

        let reply = match agent.send_with_system(prompts::INIT_SYSTEM, &summary).await {
            Ok(reply) => reply,
            Err(e) => {
                return Ok(Outcome::fail(format!(
                    "AI documentation generation failed: {:#}",
                    e
                )))
            }
        };

        let readme_path = root.join("README.md");
        if let Err(e) = std::fs::write(&readme_path, &reply.text) {
            return Ok(Outcome::fail(format!(
                "Failed to write {}: {}",
                readme_path.display(),
                e
            )));
        }

        let analysis = format!(
            "# Project Analysis\n\nGenerated automatically by tern.\n\n\
             Model: {}\nSession: {}\n\n{}",
            reply.model, reply.session_id, summary
        );
        let analysis_path = root.join("PROJECT_ANALYSIS.md");
        let mut files_created = vec!["README.md".to_string()];
        match std::fs::write(&analysis_path, analysis) {
            Ok(()) => files_created.push("PROJECT_ANALYSIS.md".to_string()),
            Err(e) => tracing::warn!("Failed to write PROJECT_ANALYSIS.md: {}", e),
        }

        Ok(Outcome::ok_with(
            format!(
                "Project documentation generated\nCreated: {}\nModel: {}",
                files_created.join(", "),
                reply.model
            ),
            payload(&[
                ("files_created", json!(files_created)),
                ("model", json!(reply.model)),
                ("session_id", json!(reply.session_id)),
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

    struct ReadmeBackend;

    #[async_trait]
    impl ChatBackend for ReadmeBackend {
        async fn send(
            &self,
            _: &str,
            model: &str,
            _: &str,
            _: &[ChatMessage],
        ) -> Result<ChatResponse> {
            Ok(ChatResponse {
                text: "# Generated Project\n\nA readme.".to_string(),
                model: model.to_string(),
                usage: TokenUsage::default(),
            })
        }
    }

    #[tokio::test]
    async fn writes_both_files_into_target() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]").unwrap();

        let store = Arc::new(SessionStore::in_memory().unwrap());
        store
            .update_user_config("test-key-1234567890", "gemini-pro")
            .await
            .unwrap();
        let mut agent = SessionAgent::new(store, Arc::new(ReadmeBackend), Settings::default());

        let outcome = InitCommand
            .call(
                &mut agent,
                Invocation::Resume {
                    state: serde_json::to_value(InitState::ProjectPath).unwrap(),
                    reply: dir.path().display().to_string(),
                },
            )
            .await
            .unwrap();

        match outcome {
            Outcome::Done {
                success: true,
                payload,
                ..
            } => {
                assert_eq!(
                    payload.get("files_created"),
                    Some(&json!(["README.md", "PROJECT_ANALYSIS.md"]))
                );
            }
            other => panic!("expected success, got {:?}", other),
        }

        let readme = std::fs::read_to_string(dir.path().join("README.md")).unwrap();
        assert!(readme.starts_with("# Generated Project"));
        assert!(dir.path().join("PROJECT_ANALYSIS.md").exists());
    }

    #[tokio::test]
    async fn bad_path_fails_with_hint() {
        let store = Arc::new(SessionStore::in_memory().unwrap());
        let mut agent = SessionAgent::new(store, Arc::new(ReadmeBackend), Settings::default());

        let outcome = InitCommand
            .call(
                &mut agent,
                Invocation::Resume {
                    state: serde_json::to_value(InitState::ProjectPath).unwrap(),
                    reply: "/definitely/not/a/path".to_string(),
                },
            )
            .await
            .unwrap();

        match outcome {
            Outcome::Done {
                success: false,
                message,
                ..
            } => assert!(message.contains("directory")),
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
