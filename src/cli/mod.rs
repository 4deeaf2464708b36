// Terminal interface
// Console rendering and the interactive REPL

mod console;
mod repl;

pub use console::Console;
pub use repl::Repl;
