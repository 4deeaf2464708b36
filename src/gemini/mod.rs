// Gemini API integration
// Client facade, retry policy and wire types

mod client;
mod retry;
mod types;

pub use client::{ChatBackend, GeminiClient};
pub use retry::with_retry;
pub use types::{ChatMessage, ChatResponse, TokenUsage};
