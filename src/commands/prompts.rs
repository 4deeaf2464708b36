// Prompt templates for AI-backed commands
//
// Templates live as markdown files next to this module and are compiled
// in. User templates use {placeholder} substitution.

pub const COMMIT_SYSTEM: &str = include_str!("prompts/commit_system.md");
pub const REVIEW_SYSTEM: &str = include_str!("prompts/review_system.md");
pub const EXPLAIN_CODE_SYSTEM: &str = include_str!("prompts/explain_code_system.md");
pub const EXPLAIN_FILE_SYSTEM: &str = include_str!("prompts/explain_file_system.md");
pub const EXPLAIN_DIR_SYSTEM: &str = include_str!("prompts/explain_dir_system.md");
pub const INIT_SYSTEM: &str = include_str!("prompts/init_system.md");
pub const CHAT_SYSTEM: &str = include_str!("prompts/chat_system.md");

const COMMIT_USER: &str = include_str!("prompts/commit_user.md");
const REVIEW_USER: &str = include_str!("prompts/review_user.md");

pub fn commit_user(staged_files: &str, staged_diff: &str, recent_commits: &str) -> String {
    COMMIT_USER
        .replace("{staged_files}", staged_files)
        .replace("{staged_diff}", staged_diff)
        .replace("{recent_commits}", recent_commits)
}

pub fn review_user(git_status: &str, changes_diff: &str, recent_commits: &str) -> String {
    REVIEW_USER
        .replace("{git_status}", git_status)
        .replace("{changes_diff}", changes_diff)
        .replace("{recent_commits}", recent_commits)
}
