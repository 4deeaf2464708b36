// Outcome protocol - the result shape every command handler returns
//
// A handler invocation either finishes (Done) or asks for more input
// (NeedsInput). A NeedsInput must be answered by exactly one call back
// into the same handler carrying the user's reply plus the state blob,
// verbatim. The state is the handler's sole memory between turns.

use serde_json::{Map, Value};

/// What kind of reply an open prompt expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Any non-empty text (paths, pasted code, API keys).
    FreeText,
    /// A 1-based number into the ordered choice list.
    Choice,
    /// `yes` / `no` / a revised draft (optionally `edit <text>`).
    YesNoEdit,
    /// `yes` / `no`.
    Confirm,
}

/// The value returned by every handler invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Terminal result of a command.
    Done {
        success: bool,
        message: String,
        payload: Map<String, Value>,
    },
    /// Continuation request: the engine stores `state` in the pending
    /// prompt and hands it back on the next turn.
    NeedsInput {
        kind: PromptKind,
        message: String,
        choices: Vec<String>,
        state: Value,
    },
}

impl Outcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Outcome::Done {
            success: true,
            message: message.into(),
            payload: Map::new(),
        }
    }

    pub fn ok_with(message: impl Into<String>, payload: Map<String, Value>) -> Self {
        Outcome::Done {
            success: true,
            message: message.into(),
            payload,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Outcome::Done {
            success: false,
            message: message.into(),
            payload: Map::new(),
        }
    }

    pub fn prompt(kind: PromptKind, message: impl Into<String>, state: Value) -> Self {
        Outcome::NeedsInput {
            kind,
            message: message.into(),
            choices: Vec::new(),
            state,
        }
    }

    pub fn with_choices(self, choices: Vec<String>) -> Self {
        match self {
            Outcome::NeedsInput {
                kind,
                message,
                state,
                ..
            } => Outcome::NeedsInput {
                kind,
                message,
                choices,
                state,
            },
            done => done,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done { .. })
    }
}

/// Build a payload map from (key, value) pairs.
pub fn payload(entries: &[(&str, Value)]) -> Map<String, Value> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
