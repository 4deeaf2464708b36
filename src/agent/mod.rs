// Session agent - AI calls with a durable conversation log
//
// Composes the chat backend with the session store. Owns the single
// optional current session; replays the session's ordered history into
// every call; appends the user turn then the assistant turn only after
// the remote call has already succeeded, so a failed call never leaves a
// half-written exchange behind.

use anyhow::{anyhow, Result};
use serde_json::json;
use std::sync::Arc;

use crate::config::Settings;
use crate::gemini::{ChatBackend, ChatMessage, TokenUsage};
use crate::store::{MessageRow, SessionRow, SessionStore};

/// Result of one `send`: the assistant's reply plus bookkeeping.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub text: String,
    pub model: String,
    pub session_id: i64,
    pub usage: TokenUsage,
}

pub struct SessionAgent {
    store: Arc<SessionStore>,
    backend: Arc<dyn ChatBackend>,
    settings: Settings,
    current: Option<SessionRow>,
}

impl SessionAgent {
    pub fn new(store: Arc<SessionStore>, backend: Arc<dyn ChatBackend>, settings: Settings) -> Self {
        Self {
            store,
            backend,
            settings,
            current: None,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn current_session(&self) -> Option<&SessionRow> {
        self.current.as_ref()
    }

    /// The API key in effect: the key saved through /setup, falling back
    /// to GEMINI_API_KEY / the config file.
    pub async fn api_key(&self) -> Result<Option<String>> {
        let user = self.store.get_or_create_default_user().await?;
        Ok(user
            .gemini_api_key
            .filter(|k| !k.is_empty())
            .or_else(|| self.settings.api_key_fallback.clone()))
    }

    /// The model in effect for new sessions.
    pub async fn model(&self) -> Result<String> {
        let user = self.store.get_or_create_default_user().await?;
        Ok(user.model().to_string())
    }

    /// Create and persist a new session and make it current.
    pub async fn start_session(&mut self, title: Option<&str>) -> Result<SessionRow> {
        let user = self.store.get_or_create_default_user().await?;
        let model = user.model().to_string();
        let session = self.store.create_session(user.id, &model, title).await?;
        self.current = Some(session.clone());
        Ok(session)
    }

    /// Make sure a current session exists, creating one titled `title`.
    pub async fn ensure_session(&mut self, title: &str) -> Result<SessionRow> {
        if let Some(session) = &self.current {
            return Ok(session.clone());
        }
        self.start_session(Some(title)).await
    }

    /// Send a message through the backend and log both sides of the
    /// exchange. Nothing is written when the remote call fails.
    pub async fn send(&mut self, text: &str) -> Result<ChatReply> {
        let session = self
            .current
            .clone()
            .ok_or_else(|| anyhow!("No active session; call start_session first"))?;

        let api_key = self
            .api_key()
            .await?
            .ok_or_else(|| anyhow!("No valid API key found. Please run /setup first."))?;

        let history: Vec<ChatMessage> = self
            .store
            .messages(session.id)
            .await?
            .into_iter()
            .map(|row| ChatMessage {
                role: row.role,
                content: row.content,
            })
            .collect();

        let response = self
            .backend
            .send(&api_key, &session.model, text, &history)
            .await?;

        // Remote call succeeded - now log the exchange, user turn first.
        self.store
            .append_message(session.id, "user", text, None)
            .await?;
        self.store
            .append_message(
                session.id,
                "assistant",
                &response.text,
                Some(&json!({
                    "model": response.model,
                    "usage": {
                        "prompt_tokens": response.usage.prompt_tokens,
                        "completion_tokens": response.usage.completion_tokens,
                    },
                })),
            )
            .await?;
        self.store.touch_session(session.id).await?;

        Ok(ChatReply {
            text: response.text,
            model: response.model,
            session_id: session.id,
            usage: response.usage,
        })
    }

    /// Send with system instructions prepended, the way the Gemini API
    /// is driven without a dedicated system role.
    pub async fn send_with_system(&mut self, system_prompt: &str, text: &str) -> Result<ChatReply> {
        let combined = format!("System: {}\n\nUser: {}", system_prompt, text);
        self.send(&combined).await
    }

    /// Ordered message history of a session.
    pub async fn history(&self, session_id: i64) -> Result<Vec<MessageRow>> {
        Ok(self.store.messages(session_id).await?)
    }

    /// Delete a session (cascading to its messages). Clears the current
    /// pointer when it referenced the deleted session.
    pub async fn delete_session(&mut self, session_id: i64) -> Result<bool> {
        let deleted = self.store.delete_session(session_id).await?;
        if deleted && self.current.as_ref().map(|s| s.id) == Some(session_id) {
            self.current = None;
        }
        Ok(deleted)
    }

    /// Drop the current-session pointer (used after /clean).
    pub fn clear_current(&mut self) {
        self.current = None;
    }
}
