// Project-wide constants
//
// Centralised here so model names and other magic values have one
// source of truth. Import via `use crate::config::constants::*;`.

/// Gemini models the user can select from.
///
/// Selection prompts are 1-based indexes into this list, so the order is
/// part of the interface.
pub const AVAILABLE_MODELS: [&str; 4] = [
    "gemini-2.0-flash-exp",
    "gemini-1.5-pro",
    "gemini-1.5-flash",
    "gemini-pro",
];

/// Model used when the user has not picked one yet.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";

/// Where to get an API key (shown by setup and in error hints).
pub const API_KEY_URL: &str = "https://makersuite.google.com/app/apikey";

/// Minimum plausible API key length accepted by setup.
pub const MIN_API_KEY_LEN: usize = 10;
