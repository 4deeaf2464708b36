// Configuration module
// Public interface for configuration loading

pub mod constants;
mod loader;

pub use loader::{load_settings, Settings};
