//! User-facing progress output and confirmation.
//!
//! A [`Console`] is created once by the caller and passed by reference to
//! whatever needs to report progress.

use std::io::{self, BufRead, Write};

use colored::*;

/// Timestamped, colored progress lines on stdout.
#[derive(Debug, Clone, Copy)]
pub struct Console {
    enabled: bool,
}

impl Default for Console {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    /// A console that prints nothing.
    pub fn silent() -> Self {
        Self { enabled: false }
    }

    fn line(&self, marker: ColoredString, message: &str) {
        if self.enabled {
            let now = chrono::Local::now().format("%H:%M:%S").to_string();
            println!("[{}] {} {}", now.dimmed(), marker, message);
        }
    }

    pub fn info(&self, message: &str) {
        self.line("→".cyan(), message);
    }

    pub fn success(&self, message: &str) {
        self.line("✓".green(), &message.green().to_string());
    }

    pub fn warn(&self, message: &str) {
        self.line("!".yellow(), &message.yellow().to_string());
    }

    pub fn error(&self, message: &str) {
        self.line("✗".red(), &message.red().to_string());
    }

    /// `[i/n]` progress line for one statement.
    pub fn step(&self, index: usize, total: usize, sql: &str) {
        self.line(
            format!("[{}/{}]", index, total).cyan(),
            &preview(sql).yellow().to_string(),
        );
    }

    /// Numbered listing of statements, e.g. before asking for confirmation.
    pub fn list<'a>(&self, statements: impl IntoIterator<Item = (usize, &'a str)>) {
        if self.enabled {
            for (index, sql) in statements {
                println!("  {} {}", format!("{}.", index).dimmed(), preview(sql));
            }
        }
    }
}

/// First line of a statement, shortened for one-line display.
fn preview(sql: &str) -> String {
    let first = sql.lines().next().unwrap_or("");
    let mut short: String = first.chars().take(100).collect();
    if short.len() < sql.len() {
        short.push_str(" …");
    }
    short
}

/// Yes/no confirmation before statements are executed.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> io::Result<bool>;
}

/// Asks on stdin. Anything but `y`/`yes` declines, including empty input.
#[derive(Debug, Default)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&mut self, prompt: &str) -> io::Result<bool> {
        print!("{} {} ", prompt.bold(), "[y/N]".dimmed());
        io::stdout().flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(is_yes(&answer))
    }
}

/// Always gives the same answer (`--yes`, tests).
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Confirm for FixedAnswer {
    fn confirm(&mut self, _prompt: &str) -> io::Result<bool> {
        Ok(self.0)
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_decline() {
        assert!(!is_yes(""));
        assert!(!is_yes("\n"));
        assert!(!is_yes("no"));
        assert!(!is_yes("yess"));
        assert!(is_yes("Y\n"));
        assert!(is_yes(" yes "));
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("SELECT 1"), "SELECT 1");
        assert_eq!(preview("SELECT 1\nFROM t"), "SELECT 1 …");
        assert_eq!(preview(&"x".repeat(150)).chars().count(), 102);
    }
}
