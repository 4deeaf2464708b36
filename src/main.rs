// Tern - AI pair-programming companion for the terminal
// Main entry point

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use tern::agent::SessionAgent;
use tern::cli::Repl;
use tern::commands::default_registry;
use tern::config::load_settings;
use tern::engine::Engine;
use tern::gemini::GeminiClient;
use tern::store::SessionStore;

#[derive(Parser)]
#[command(
    name = "tern",
    version,
    about = "AI pair-programming companion for the terminal"
)]
struct Cli {
    /// Override the conversation database location
    #[arg(long)]
    db_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Diagnostics go to stderr so they never interleave with the REPL
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut settings = load_settings()?;
    if let Some(db_path) = cli.db_path {
        settings.db_path = db_path;
    }

    let store = Arc::new(SessionStore::open(&settings.db_path)?);
    let backend = Arc::new(GeminiClient::new()?);
    let agent = SessionAgent::new(store, backend, settings);
    let engine = Engine::new(default_registry(), agent);

    Repl::new(engine).run().await
}
