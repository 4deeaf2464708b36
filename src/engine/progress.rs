// Progress controller - animation for long-running commands
//
// Runs exactly one background task - the animation loop - concurrently
// with the handler's work. The percentage is an elapsed-time estimate
// that holds at 95 until the work actually finishes, then snaps to 100.
// Cancelling the animation never cancels the work and is a no-op when
// the loop has already ended.

use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::commands::ProgressSpec;

const TICK: Duration = Duration::from_millis(500);
const CAPTION_ROTATE_SECS: u64 = 6;
const HOLD_AT: f64 = 95.0;

pub struct ProgressController;

impl ProgressController {
    pub fn new() -> Self {
        Self
    }

    /// Run `work` with a progress animation bracketed around it.
    /// The work's result passes through untouched, success or error.
    pub async fn run<F, T>(&self, spec: ProgressSpec, work: F) -> T
    where
        F: Future<Output = T>,
    {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template("{bar:30.cyan/blue} {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        run_on(bar, spec, work).await
    }
}

impl Default for ProgressController {
    fn default() -> Self {
        Self::new()
    }
}

/// Animation bracketing on a caller-supplied bar (tests pass a hidden one).
pub(crate) async fn run_on<F, T>(bar: ProgressBar, spec: ProgressSpec, work: F) -> T
where
    F: Future<Output = T>,
{
    let token = CancellationToken::new();
    let animation = tokio::spawn(animate(bar.clone(), spec, token.clone()));

    let result = work.await;

    // Work is complete; the animation dies quietly regardless of
    // whether it is still ticking or already finished.
    token.cancel();
    let _ = animation.await;

    bar.set_position(100);
    bar.finish_and_clear();

    result
}

async fn animate(bar: ProgressBar, spec: ProgressSpec, token: CancellationToken) {
    let captions = captions_for(&spec.label);
    let expected = spec.expected.as_secs_f64().max(1.0);
    let start = Instant::now();
    let mut caption_index = 0;
    bar.set_message(captions[0]);

    let mut ticker = tokio::time::interval(TICK);
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                let elapsed = start.elapsed().as_secs_f64();
                let pct = ((elapsed / expected) * 100.0).min(HOLD_AT) as u64;
                bar.set_position(pct);

                let next = (elapsed as u64 / CAPTION_ROTATE_SECS) as usize % captions.len();
                if next != caption_index {
                    caption_index = next;
                    bar.set_message(captions[caption_index]);
                }
            }
        }
    }
}

/// Rotating status captions keyed by the operation's label. Pure UX.
fn captions_for(label: &str) -> &'static [&'static str] {
    if label.contains("Commit") {
        &[
            "Checking git repository status...",
            "Analyzing staged files...",
            "Reading git diff changes...",
            "Sending changes to AI for analysis...",
            "AI is crafting a commit message...",
            "Formatting commit message...",
        ]
    } else if label.contains("Review") {
        &[
            "Checking git repository status...",
            "Scanning code changes...",
            "Reading modified files...",
            "AI is reviewing the code...",
            "Identifying potential issues...",
            "Preparing the review...",
        ]
    } else if label.contains("Code Analysis") {
        &[
            "Parsing code structure...",
            "Analyzing syntax and patterns...",
            "Understanding code logic...",
            "Breaking down the implementation...",
            "Preparing the explanation...",
        ]
    } else if label.contains("File Analysis") {
        &[
            "Reading file contents...",
            "Identifying the language...",
            "Understanding the architecture...",
            "Extracting key concepts...",
            "Preparing the explanation...",
        ]
    } else if label.contains("Directory Analysis") {
        &[
            "Scanning directory structure...",
            "Identifying project files...",
            "Analyzing the architecture...",
            "Identifying the technology stack...",
            "Preparing project insights...",
        ]
    } else if label.contains("AI Assistant") {
        &[
            "Connecting to the AI assistant...",
            "Understanding your request...",
            "Generating a response...",
            "Preparing guidance...",
        ]
    } else {
        &[
            "Analyzing project structure...",
            "Reading important files...",
            "Sending to AI for analysis...",
            "AI is writing documentation...",
            "Formatting the output...",
            "Saving files...",
        ]
    }
}
