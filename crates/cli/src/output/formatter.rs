//! Human-readable and JSON output
//!
//! In JSON mode stdout carries exactly one JSON document per command and
//! status lines are suppressed; errors still reach stderr, as JSON.
//!
//! Writes ignore a closed stdout so `stow ls | head` exits quietly instead
//! of panicking on a broken pipe.

use std::io::{self, IsTerminal, Write};

use serde::Serialize;

use super::OutputConfig;

/// Kind of status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Success,
    Warning,
    Error,
}

impl Status {
    const fn symbol(self) -> &'static str {
        match self {
            Status::Success => "✓",
            Status::Warning => "⚠",
            Status::Error => "✗",
        }
    }

    /// ANSI foreground color code
    const fn color(self) -> u8 {
        match self {
            Status::Success => 32,
            Status::Warning => 33,
            Status::Error => 31,
        }
    }
}

fn status_line(status: Status, message: &str, color: bool) -> String {
    if color {
        format!("\x1b[{}m{}\x1b[0m {message}", status.color(), status.symbol())
    } else {
        format!("{} {message}", status.symbol())
    }
}

/// Formatter for CLI output
#[derive(Debug, Clone)]
pub struct Formatter {
    config: OutputConfig,
    color: bool,
}

impl Formatter {
    pub fn new(config: OutputConfig) -> Self {
        let color = !config.no_color && !config.json && std::env::var_os("NO_COLOR").is_none();
        Self { config, color }
    }

    pub fn is_json(&self) -> bool {
        self.config.json
    }

    /// Whether color is allowed at all; terminals are checked per write
    pub fn colors_enabled(&self) -> bool {
        self.color
    }

    /// Status line on stdout, e.g. after an upload
    pub fn success(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }
        let line = status_line(Status::Success, message, self.color && io::stdout().is_terminal());
        write_line(&mut io::stdout().lock(), &line);
    }

    /// Status line on stderr
    pub fn warning(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }
        let line = status_line(Status::Warning, message, self.color && io::stderr().is_terminal());
        write_line(&mut io::stderr().lock(), &line);
    }

    /// Error on stderr; printed even in quiet mode
    pub fn error(&self, message: &str) {
        let line = if self.config.json {
            serde_json::json!({ "error": message }).to_string()
        } else {
            status_line(Status::Error, message, self.color && io::stderr().is_terminal())
        };
        write_line(&mut io::stderr().lock(), &line);
    }

    /// The command's JSON document
    pub fn json<T: Serialize>(&self, value: &T) {
        let mut out = io::stdout().lock();
        match serde_json::to_writer_pretty(&mut out, value) {
            Ok(()) => write_line(&mut out, ""),
            Err(e) if e.is_io() => {}
            Err(e) => self.error(&format!("Failed to serialize output: {e}")),
        }
    }

    /// Plain data line on stdout (respects quiet mode)
    pub fn println(&self, message: &str) {
        if self.config.quiet {
            return;
        }
        write_line(&mut io::stdout().lock(), message);
    }
}

fn write_line(out: &mut impl Write, line: &str) {
    // A reader that went away is not an error for a CLI.
    let _ = writeln!(out, "{line}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_line_plain() {
        assert_eq!(status_line(Status::Success, "Uploaded 2 objects", false), "✓ Uploaded 2 objects");
        assert_eq!(status_line(Status::Error, "boom", false), "✗ boom");
    }

    #[test]
    fn test_status_line_colored() {
        let line = status_line(Status::Warning, "nothing to delete", true);
        assert!(line.starts_with("\x1b[33m⚠\x1b[0m"));
        assert!(line.ends_with("nothing to delete"));
    }

    #[test]
    fn test_json_mode_disables_color() {
        let formatter = Formatter::new(OutputConfig {
            json: true,
            ..Default::default()
        });
        assert!(formatter.is_json());
        assert!(!formatter.colors_enabled());
    }

    #[test]
    fn test_no_color_flag() {
        let formatter = Formatter::new(OutputConfig {
            no_color: true,
            ..Default::default()
        });
        assert!(!formatter.colors_enabled());
    }
}
