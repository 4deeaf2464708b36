// Configuration loader
// Loads settings from ~/.tern/config.toml or environment variables

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Runtime settings resolved from the config file and environment.
///
/// The API key stored here is only a fallback: a key saved through `/setup`
/// lives in the database and takes precedence.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Path to the SQLite conversation database.
    pub db_path: PathBuf,

    /// Fallback Gemini API key (GEMINI_API_KEY or config file).
    pub api_key_fallback: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        let db_path = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tern")
            .join("tern.db");

        Self {
            db_path,
            api_key_fallback: None,
        }
    }
}

/// Load settings from ~/.tern/config.toml, then apply environment overrides.
///
/// A missing config file is not an error; everything has a default.
pub fn load_settings() -> Result<Settings> {
    let mut settings = Settings::default();

    if let Some(home) = dirs::home_dir() {
        let config_path = home.join(".tern/config.toml");
        if config_path.exists() {
            let contents = fs::read_to_string(&config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;

            #[derive(Deserialize)]
            struct TomlConfig {
                #[serde(default)]
                db_path: Option<PathBuf>,
                #[serde(default)]
                gemini_api_key: Option<String>,
            }

            let toml_config: TomlConfig = toml::from_str(&contents).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?;

            if let Some(db_path) = toml_config.db_path {
                settings.db_path = db_path;
            }
            if let Some(key) = toml_config.gemini_api_key {
                if !key.is_empty() {
                    settings.api_key_fallback = Some(key);
                }
            }
        }
    }

    // Environment wins over the config file
    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        if !key.is_empty() {
            settings.api_key_fallback = Some(key);
        }
    }
    if let Ok(path) = std::env::var("TERN_DB_PATH") {
        if !path.is_empty() {
            settings.db_path = PathBuf::from(path);
        }
    }

    Ok(settings)
}
