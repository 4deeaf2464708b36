// Command registry and the handler capability
//
// Each command is a handler behind `CommandHandler`: execute one
// invocation, return an Outcome, describe itself for /help. The
// registry is a pure lookup table built once at startup; the fallback
// handler catches free-form input that names no command.

pub mod chat;
pub mod clean;
pub mod commit;
pub mod explain;
pub mod init;
pub mod models;
pub mod outcome;
pub mod prompts;
pub mod review;
pub mod setup;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use crate::agent::SessionAgent;
use outcome::Outcome;

/// One call into a handler: a fresh command, or the reply to a prompt
/// the same handler issued on an earlier turn.
#[derive(Debug, Clone)]
pub enum Invocation {
    Start { args: Vec<String> },
    Resume { state: Value, reply: String },
}

/// How to animate a long-running invocation.
#[derive(Debug, Clone)]
pub struct ProgressSpec {
    /// Label keying the rotating caption list.
    pub label: String,
    /// Expected duration driving the percentage estimate.
    pub expected: Duration,
}

impl ProgressSpec {
    pub fn new(label: impl Into<String>, expected_secs: u64) -> Self {
        Self {
            label: label.into(),
            expected: Duration::from_secs(expected_secs),
        }
    }
}

/// The capability every registered command implements.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn category(&self) -> &'static str;

    fn help(&self) -> String {
        format!("/{} - {}", self.name(), self.description())
    }

    /// Progress animation for this invocation, if it is long-running.
    /// Inspected per leg: a command may animate only the leg that
    /// performs the remote call.
    fn progress(&self, _invocation: &Invocation) -> Option<ProgressSpec> {
        None
    }

    /// Execute one invocation. Errors are converted to failure outcomes
    /// at the engine boundary, never propagated past it.
    async fn call(&self, agent: &mut SessionAgent, invocation: Invocation) -> Result<Outcome>;
}

/// Name -> handler lookup table, plus the free-form fallback.
pub struct CommandRegistry {
    commands: HashMap<String, Arc<dyn CommandHandler>>,
    order: Vec<String>,
    fallback: Arc<dyn CommandHandler>,
}

impl CommandRegistry {
    pub fn new(fallback: Arc<dyn CommandHandler>) -> Self {
        Self {
            commands: HashMap::new(),
            order: Vec::new(),
            fallback,
        }
    }

    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) {
        let name = handler.name().to_lowercase();
        if self.commands.insert(name.clone(), handler).is_none() {
            self.order.push(name);
        }
    }

    /// Case-insensitive, trimmed lookup.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.commands.get(&name.trim().to_lowercase()).cloned()
    }

    pub fn fallback(&self) -> Arc<dyn CommandHandler> {
        self.fallback.clone()
    }

    /// Registered command names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Help text grouped by category, in registration order.
    pub fn help_text(&self) -> String {
        let mut out = String::from("Available commands:\n");
        let mut last_category = "";
        for name in &self.order {
            if let Some(handler) = self.commands.get(name) {
                if handler.category() != last_category {
                    last_category = handler.category();
                    let _ = write!(out, "\n{}:\n", last_category);
                }
                let _ = writeln!(out, "  /{} - {}", handler.name(), handler.description());
            }
        }
        out.push_str("\nAnything else is sent to the AI assistant. Type /exit to quit.\n");
        out
    }
}

/// Registry with every built-in command registered.
pub fn default_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new(Arc::new(chat::ChatCommand));
    registry.register(Arc::new(setup::SetupCommand));
    registry.register(Arc::new(models::ModelsCommand));
    registry.register(Arc::new(init::InitCommand));
    registry.register(Arc::new(review::ReviewCommand));
    registry.register(Arc::new(explain::ExplainCommand));
    registry.register(Arc::new(commit::CommitCommand));
    registry.register(Arc::new(clean::CleanCommand));
    registry
}
