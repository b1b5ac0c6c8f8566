//! CLI Output Formatting Module
//! Provides consistent, colorized output for terminal UX

use chrono::{DateTime, Utc};
use colored::Colorize;

use crate::engine::vcs::model::CommitId;

pub struct CliFormatter;

impl CliFormatter {
    /// Print a success message
    pub fn success(message: &str) {
        println!("{} {}", "✓".green().bold(), message);
    }

    /// Print an error message
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red().bold(), message);
    }

    /// Print a warning message
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow().bold(), message);
    }

    /// Print an info message
    pub fn info(message: &str) {
        println!("{} {}", "ℹ".blue().bold(), message);
    }

    /// Print a section header
    pub fn header(title: &str) {
        println!("\n{}", title.bright_cyan().bold());
        println!("{}", "─".repeat(title.chars().count()).bright_black());
    }

    /// Print a key-value pair
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", key.bright_white().bold(), value);
    }

    /// Print a list item
    pub fn item(text: &str) {
        println!("  {} {}", "•".bright_black(), text);
    }

    /// Print a table header
    pub fn table_header(columns: &[&str]) {
        let plain_width = columns.iter().map(|c| c.chars().count()).sum::<usize>()
            + columns.len().saturating_sub(1) * 3;
        let header = columns
            .iter()
            .map(|c| c.bright_white().bold().to_string())
            .collect::<Vec<_>>()
            .join(" │ ");
        println!("  {}", header);
        println!("  {}", "─".repeat(plain_width).bright_black());
    }

    /// Print a table row
    pub fn table_row(values: &[&str]) {
        println!("  {}", values.join(" │ "));
    }

    /// Print file content indented under a divider
    pub fn content_block(content: &str) {
        Self::divider();
        for line in content.lines() {
            println!("  {}", line.bright_white());
        }
        Self::divider();
    }

    /// Print a divider
    pub fn divider() {
        println!("{}", "─".repeat(60).bright_black());
    }
}

/// `#<id>` for a branch head, `-` for a branch with no commits yet
pub fn format_head(head: Option<CommitId>) -> String {
    match head {
        Some(id) => format!("#{}", id),
        None => "-".to_string(),
    }
}

/// Parent list in `#a, #b` form; `(root)` for a commit without parents
pub fn format_parents(parent_id: Option<CommitId>, parent_id_2: Option<CommitId>) -> String {
    let parents: Vec<String> = [parent_id, parent_id_2]
        .into_iter()
        .flatten()
        .map(|id| format!("#{}", id))
        .collect();
    if parents.is_empty() {
        "(root)".to_string()
    } else {
        parents.join(", ")
    }
}

pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// First line of a message, cut to `width` characters
pub fn summarize(message: &str, width: usize) -> String {
    let first = message.lines().next().unwrap_or("");
    if first.chars().count() <= width {
        first.to_string()
    } else {
        let cut: String = first.chars().take(width.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
