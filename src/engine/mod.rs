// Interactive session engine - the cooperative state machine
//
// One line of user input drives at most one handler invocation. The
// engine is always in exactly one of two states:
//
//   Idle          - the next line is a command (or free-form chat)
//   AwaitingReply - a handler asked for more input; every line is a
//                   reply to that prompt until it resolves or the user
//                   cancels with an empty line
//
// No handler error escapes this module: anything a command throws is
// converted into a failure outcome so every turn ends in a well-defined
// state.

pub mod progress;

use serde_json::{Map, Value};
use std::sync::Arc;

use crate::agent::SessionAgent;
use crate::commands::outcome::{Outcome, PromptKind};
use crate::commands::{CommandHandler, CommandRegistry, Invocation};
use progress::ProgressController;

pub const COMMAND_PREFIX: char = '/';

/// An open continuation request. Engine-held only, never persisted.
#[derive(Debug, Clone)]
pub struct PendingPrompt {
    pub command: String,
    pub kind: PromptKind,
    pub message: String,
    pub choices: Vec<String>,
    pub state: Value,
}

#[derive(Debug, Clone)]
pub enum EngineState {
    Idle,
    AwaitingReply(PendingPrompt),
}

/// Minimal emphasis marker the presentation layer maps to styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Plain,
    Info,
    Success,
    Error,
    Dim,
    Notice,
}

/// One rendered line handed to the presentation collaborator.
#[derive(Debug, Clone)]
pub struct OutputLine {
    pub style: LineStyle,
    pub text: String,
}

impl OutputLine {
    pub fn plain(text: impl Into<String>) -> Self {
        Self { style: LineStyle::Plain, text: text.into() }
    }
    pub fn info(text: impl Into<String>) -> Self {
        Self { style: LineStyle::Info, text: text.into() }
    }
    pub fn success(text: impl Into<String>) -> Self {
        Self { style: LineStyle::Success, text: text.into() }
    }
    pub fn error(text: impl Into<String>) -> Self {
        Self { style: LineStyle::Error, text: text.into() }
    }
    pub fn dim(text: impl Into<String>) -> Self {
        Self { style: LineStyle::Dim, text: text.into() }
    }
    pub fn notice(text: impl Into<String>) -> Self {
        Self { style: LineStyle::Notice, text: text.into() }
    }
}

pub struct Engine {
    registry: CommandRegistry,
    agent: SessionAgent,
    progress: ProgressController,
    state: EngineState,
}

impl Engine {
    pub fn new(registry: CommandRegistry, agent: SessionAgent) -> Self {
        Self {
            registry,
            agent,
            progress: ProgressController::new(),
            state: EngineState::Idle,
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn is_awaiting_reply(&self) -> bool {
        matches!(self.state, EngineState::AwaitingReply(_))
    }

    pub fn agent(&self) -> &SessionAgent {
        &self.agent
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Input-field hint for the current state; refreshed by the
    /// presentation layer on every transition.
    pub fn placeholder(&self) -> String {
        match &self.state {
            EngineState::Idle => {
                "Type /help for commands - or just ask the assistant".to_string()
            }
            EngineState::AwaitingReply(p) => match p.kind {
                PromptKind::FreeText => {
                    format!("/{} - enter a value (Enter cancels)", p.command)
                }
                PromptKind::Choice => {
                    format!("Enter a number 1-{} (Enter cancels)", p.choices.len())
                }
                PromptKind::YesNoEdit => "yes / no / edit <text>".to_string(),
                PromptKind::Confirm => "yes / no".to_string(),
            },
        }
    }

    /// Process one line of user input and return the lines to render.
    pub async fn handle_line(&mut self, line: &str) -> Vec<OutputLine> {
        let input = line.trim();

        match std::mem::replace(&mut self.state, EngineState::Idle) {
            EngineState::Idle => self.handle_idle(input).await,
            EngineState::AwaitingReply(pending) => self.handle_reply(pending, input).await,
        }
    }

    async fn handle_idle(&mut self, input: &str) -> Vec<OutputLine> {
        if input.is_empty() {
            return Vec::new();
        }

        if let Some(rest) = input.strip_prefix(COMMAND_PREFIX) {
            let mut parts = rest.split_whitespace();
            let name = parts.next().unwrap_or("");
            let args: Vec<String> = parts.map(String::from).collect();

            match self.registry.resolve(name) {
                Some(handler) => self.invoke(handler, Invocation::Start { args }).await,
                None => {
                    let known = self
                        .registry
                        .names()
                        .iter()
                        .map(|n| format!("/{}", n))
                        .collect::<Vec<_>>()
                        .join(", ");
                    vec![
                        OutputLine::error(format!("Unknown command: /{}", name)),
                        OutputLine::dim(format!("Available: {}", known)),
                    ]
                }
            }
        } else {
            // Free-form chat goes through the identical protocol.
            let handler = self.registry.fallback();
            self.invoke(
                handler,
                Invocation::Start {
                    args: vec![input.to_string()],
                },
            )
            .await
        }
    }

    async fn handle_reply(&mut self, pending: PendingPrompt, input: &str) -> Vec<OutputLine> {
        // Empty reply always cancels, without calling the handler.
        if input.is_empty() {
            tracing::debug!(command = %pending.command, "Pending prompt cancelled");
            return vec![OutputLine::notice(format!(
                "Cancelled /{}",
                pending.command
            ))];
        }

        // yes/no/edit grammar: "no" cancels like an empty line.
        if pending.kind == PromptKind::YesNoEdit && input.eq_ignore_ascii_case("no") {
            tracing::debug!(command = %pending.command, "Pending prompt declined");
            return vec![OutputLine::notice(format!(
                "Cancelled /{}",
                pending.command
            ))];
        }

        let handler = match self.resolve_pending(&pending.command) {
            Some(handler) => handler,
            None => {
                tracing::warn!(command = %pending.command, "Pending prompt for unknown handler");
                return vec![OutputLine::error(format!(
                    "Internal error: /{} is no longer available",
                    pending.command
                ))];
            }
        };

        self.invoke(
            handler,
            Invocation::Resume {
                state: pending.state,
                reply: input.to_string(),
            },
        )
        .await
    }

    fn resolve_pending(&self, command: &str) -> Option<Arc<dyn CommandHandler>> {
        if let Some(handler) = self.registry.resolve(command) {
            return Some(handler);
        }
        let fallback = self.registry.fallback();
        (fallback.name() == command).then_some(fallback)
    }

    async fn invoke(
        &mut self,
        handler: Arc<dyn CommandHandler>,
        invocation: Invocation,
    ) -> Vec<OutputLine> {
        let name = handler.name().to_string();
        let spec = handler.progress(&invocation);

        let result = match spec {
            Some(spec) => {
                let work = handler.call(&mut self.agent, invocation);
                self.progress.run(spec, work).await
            }
            None => handler.call(&mut self.agent, invocation).await,
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(command = %name, "Command failed: {:#}", e);
                Outcome::Done {
                    success: false,
                    message: format!("Error executing command: {:#}", e),
                    payload: Map::new(),
                }
            }
        };

        self.apply(name, outcome)
    }

    fn apply(&mut self, command: String, outcome: Outcome) -> Vec<OutputLine> {
        match outcome {
            Outcome::Done {
                success,
                message,
                payload,
            } => {
                self.state = EngineState::Idle;
                let mut lines = vec![if success {
                    OutputLine::success(message)
                } else {
                    OutputLine::error(message)
                }];
                for (key, value) in &payload {
                    let rendered = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    lines.push(OutputLine::dim(format!("{}: {}", key, rendered)));
                }
                lines
            }
            Outcome::NeedsInput {
                kind,
                message,
                choices,
                state,
            } => {
                if state.is_null() {
                    // A continuation without state can never be resumed;
                    // fail the turn instead of wedging the session.
                    tracing::warn!(
                        command = %command,
                        "Protocol violation: NeedsInput without resumable state"
                    );
                    self.state = EngineState::Idle;
                    return vec![OutputLine::error(format!(
                        "Internal error in /{} - the command lost its state. Please try again.",
                        command
                    ))];
                }

                let mut lines = vec![OutputLine::info(message.clone())];
                for (i, choice) in choices.iter().enumerate() {
                    lines.push(OutputLine::plain(format!("  {}. {}", i + 1, choice)));
                }
                lines.push(OutputLine::dim(reply_hint(kind, choices.len())));

                self.state = EngineState::AwaitingReply(PendingPrompt {
                    command,
                    kind,
                    message,
                    choices,
                    state,
                });
                lines
            }
        }
    }
}

fn reply_hint(kind: PromptKind, choice_count: usize) -> String {
    match kind {
        PromptKind::FreeText => "(press Enter on an empty line to cancel)".to_string(),
        PromptKind::Choice => format!(
            "Reply with a number 1-{}, or press Enter to cancel",
            choice_count
        ),
        PromptKind::YesNoEdit => "Reply yes, no, or a revised message (Enter cancels)".to_string(),
        PromptKind::Confirm => "Reply yes or no (Enter cancels)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_hints_mention_cancellation() {
        for kind in [
            PromptKind::FreeText,
            PromptKind::Choice,
            PromptKind::YesNoEdit,
            PromptKind::Confirm,
        ] {
            assert!(reply_hint(kind, 3).to_lowercase().contains("cancel"));
        }
    }
}
