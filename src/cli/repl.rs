// Interactive REPL driving the session engine
//
// Reads one line per submission and hands it to the engine; /help,
// /clear and /exit are interface concerns handled here, everything
// else is engine territory. The placeholder hint is refreshed from the
// engine on every state transition.

use anyhow::Result;
use crossterm::{
    cursor,
    terminal::{Clear, ClearType},
    ExecutableCommand,
};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io;

use super::console::Console;
use crate::engine::Engine;

pub struct Repl {
    engine: Engine,
    console: Console,
}

impl Repl {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            console: Console::new(),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut editor = DefaultEditor::new()?;

        self.banner();

        loop {
            println!();
            self.console.dim(&self.engine.placeholder());

            let line = match editor.readline("> ") {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => {
                    if self.engine.is_awaiting_reply() {
                        // Ctrl-C on an open prompt cancels it, like an
                        // empty line, instead of killing the session.
                        let lines = self.engine.handle_line("").await;
                        self.console.render(&lines);
                        continue;
                    }
                    self.console.plain("Goodbye!");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    self.console.plain("Goodbye!");
                    break;
                }
                Err(e) => return Err(e.into()),
            };

            let trimmed = line.trim();

            if !self.engine.is_awaiting_reply() {
                match trimmed.to_lowercase().as_str() {
                    "/exit" | "/quit" => {
                        self.console.plain("Goodbye!");
                        break;
                    }
                    "/help" => {
                        self.console.plain(&self.engine.registry().help_text());
                        continue;
                    }
                    "/clear" => {
                        self.clear_screen()?;
                        continue;
                    }
                    _ => {}
                }
            }

            if !trimmed.is_empty() {
                let _ = editor.add_history_entry(trimmed);
            }

            let lines = self.engine.handle_line(&line).await;
            self.console.render(&lines);
        }

        Ok(())
    }

    fn banner(&self) {
        self.console.plain(&format!(
            "tern v{} - AI pair-programming companion",
            env!("CARGO_PKG_VERSION")
        ));
        println!();
        self.console.plain(&self.engine.registry().help_text());
        self.console.plain("Ready. Type /help for commands.");
    }

    fn clear_screen(&self) -> Result<()> {
        io::stdout()
            .execute(Clear(ClearType::All))?
            .execute(cursor::MoveTo(0, 0))?;
        Ok(())
    }
}
