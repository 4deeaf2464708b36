// Git plumbing for the commit and review commands
//
// Thin wrappers over the git binary. Output strings are shown to the
// user and fed into AI prompts; diffs are truncated so a huge change
// set cannot blow the request size.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process::Command;

/// Cap on diff text sent to the AI.
const MAX_DIFF_CHARS: usize = 12_000;

fn run_git(args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .output()
        .with_context(|| format!("Failed to run git {}", args.join(" ")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git {} failed: {}", args.join(" "), stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
}

fn truncate_diff(diff: String) -> String {
    if diff.len() <= MAX_DIFF_CHARS {
        return diff;
    }
    let mut cut = MAX_DIFF_CHARS;
    while !diff.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}\n\n[... diff truncated ...]", &diff[..cut])
}

/// Whether `dir` is inside a git work tree.
pub fn is_repository(dir: &Path) -> bool {
    Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["rev-parse", "--git-dir"])
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// Staged files as `STATUS\tpath` lines; empty string when nothing is staged.
pub fn staged_files() -> Result<String> {
    run_git(&["diff", "--cached", "--name-status"])
}

/// Diff of staged changes, truncated for prompt use.
pub fn staged_diff() -> Result<String> {
    run_git(&["diff", "--cached"]).map(truncate_diff)
}

/// Diff of everything that changed against HEAD (staged and unstaged).
pub fn all_changes_diff() -> Result<String> {
    run_git(&["diff", "HEAD"]).map(truncate_diff)
}

/// Short-format status.
pub fn status() -> Result<String> {
    run_git(&["status", "--short"])
}

/// Last `count` commit subjects, for prompt context. A repository with
/// no commits yet is not an error.
pub fn recent_commits(count: usize) -> Result<String> {
    match run_git(&["log", "--oneline", &format!("-{}", count)]) {
        Ok(log) => Ok(log),
        Err(_) => Ok(String::new()),
    }
}

/// Run `git commit -m <message>` and report the result line.
pub fn commit(message: &str) -> Result<String> {
    let output = run_git(&["commit", "-m", message])?;
    Ok(format!("Commit executed:\n{}", output))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_repository_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_repository(dir.path()));
    }

    #[test]
    fn truncation_keeps_prefix_and_marks_cut() {
        let long = "x".repeat(MAX_DIFF_CHARS + 100);
        let truncated = truncate_diff(long);
        assert!(truncated.len() < MAX_DIFF_CHARS + 50);
        assert!(truncated.ends_with("[... diff truncated ...]"));

        let short = truncate_diff("small diff".to_string());
        assert_eq!(short, "small diff");
    }
}
