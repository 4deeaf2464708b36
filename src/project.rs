// Project analysis for the init and explain commands
//
// Builds the textual project summary fed into documentation and
// directory-analysis prompts: directory tree, language breakdown,
// and the well-known files worth reading first.

use anyhow::{bail, Result};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

const MAX_TREE_DEPTH: usize = 4;
const MAX_TREE_ENTRIES: usize = 200;

const IGNORED_DIRS: [&str; 8] = [
    ".git",
    "target",
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
    "dist",
    ".idea",
];

const KEY_FILES: [&str; 10] = [
    "README.md",
    "Cargo.toml",
    "package.json",
    "pyproject.toml",
    "setup.py",
    "go.mod",
    "Makefile",
    "Dockerfile",
    "LICENSE",
    ".gitignore",
];

fn is_ignored(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| IGNORED_DIRS.contains(&name))
        .unwrap_or(false)
}

/// Indented directory tree, depth- and entry-limited.
pub fn structure(root: &Path) -> String {
    let mut lines = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(MAX_TREE_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_ignored(e));

    for entry in walker.flatten() {
        if lines.len() >= MAX_TREE_ENTRIES {
            lines.push("  [... more entries omitted ...]".to_string());
            break;
        }
        let depth = entry.depth();
        let name = entry.file_name().to_string_lossy();
        let marker = if entry.file_type().is_dir() { "/" } else { "" };
        lines.push(format!("{}{}{}", "  ".repeat(depth), name, marker));
    }

    lines.join("\n")
}

fn language_for(extension: &str) -> Option<&'static str> {
    let language = match extension {
        "rs" => "Rust",
        "py" => "Python",
        "js" | "mjs" => "JavaScript",
        "ts" | "tsx" => "TypeScript",
        "go" => "Go",
        "java" => "Java",
        "c" | "h" => "C",
        "cpp" | "cc" | "hpp" => "C++",
        "rb" => "Ruby",
        "sh" => "Shell",
        "sql" => "SQL",
        "html" => "HTML",
        "css" => "CSS",
        "toml" | "yaml" | "yml" | "json" => "Config",
        "md" => "Markdown",
        _ => return None,
    };
    Some(language)
}

/// File counts per language, largest first.
pub fn languages(root: &Path) -> String {
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_ignored(e));

    for entry in walker.flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(language) = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(language_for)
        {
            *counts.entry(language).or_insert(0) += 1;
        }
    }

    if counts.is_empty() {
        return "No recognized source files".to_string();
    }

    let mut pairs: Vec<_> = counts.into_iter().collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1));

    pairs
        .into_iter()
        .map(|(language, count)| format!("{}: {} files", language, count))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The well-known files present at the project root, with sizes.
pub fn key_files(root: &Path) -> String {
    let mut lines = Vec::new();
    for name in KEY_FILES {
        let path = root.join(name);
        if let Ok(meta) = std::fs::metadata(&path) {
            if meta.is_file() {
                lines.push(format!("{} ({} bytes)", name, meta.len()));
            }
        }
    }

    if lines.is_empty() {
        "No well-known project files found".to_string()
    } else {
        lines.join("\n")
    }
}

/// Full project summary used as AI prompt context.
pub fn summary(root: &Path) -> Result<String> {
    if !root.is_dir() {
        bail!("Not a directory: {}", root.display());
    }

    let mut out = String::new();
    let _ = writeln!(out, "Project root: {}", root.display());
    let _ = writeln!(out, "\n## Key files\n{}", key_files(root));
    let _ = writeln!(out, "\n## Languages\n{}", languages(root));
    let _ = writeln!(out, "\n## Structure\n{}", structure(root));
    Ok(out)
}
