//! Terminal output
//!
//! Every command writes through a [`Formatter`] built from the global flags,
//! and long listings or searches show a [`ProgressBar`] spinner on stderr.

mod formatter;
mod progress;

pub use formatter::Formatter;
pub use progress::ProgressBar;

/// Output configuration derived from CLI flags
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    /// Use JSON output format
    pub json: bool,
    /// Disable colored output
    pub no_color: bool,
    /// Disable progress spinners
    pub no_progress: bool,
    /// Suppress non-error output
    pub quiet: bool,
}
