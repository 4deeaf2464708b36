// Console renderer - maps emphasis markers to terminal styling

use crossterm::style::Stylize;
use std::io::{self, IsTerminal};

use crate::engine::{LineStyle, OutputLine};

pub struct Console {
    styled: bool,
}

impl Console {
    pub fn new() -> Self {
        Self {
            styled: io::stdout().is_terminal(),
        }
    }

    /// Render engine output. Each OutputLine may span multiple text
    /// lines; the style applies to all of them.
    pub fn render(&self, lines: &[OutputLine]) {
        for line in lines {
            for text in line.text.lines() {
                if self.styled {
                    match line.style {
                        LineStyle::Plain => println!("{}", text),
                        LineStyle::Info => println!("{}", text.cyan()),
                        LineStyle::Success => println!("{}", text.green()),
                        LineStyle::Error => println!("{}", text.red()),
                        LineStyle::Dim => println!("{}", text.dim()),
                        LineStyle::Notice => println!("{}", text.yellow()),
                    }
                } else {
                    println!("{}", text);
                }
            }
        }
    }

    pub fn plain(&self, text: &str) {
        self.render(&[OutputLine::plain(text)]);
    }

    pub fn dim(&self, text: &str) {
        self.render(&[OutputLine::dim(text)]);
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}
