//! Process exit codes
//!
//! Scripts depend on these values; never renumber an existing code.

use stowage_core::Error;

/// Exit status of a `stow` invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// Anything without a more specific code
    GeneralError = 1,

    /// Bad arguments, malformed path, invalid pattern or missing profile
    UsageError = 2,

    /// Transport or backend failure; retrying may help
    NetworkError = 3,

    /// Rejected credentials or missing permission
    AuthError = 4,

    /// Container, object or profile does not exist
    NotFound = 5,

    /// The store refused a conflicting write
    Conflict = 6,

    /// Stopped by Ctrl+C
    Interrupted = 130,
}

impl ExitCode {
    /// Value passed to `std::process::exit`
    #[inline]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Exit code for an engine error
    pub const fn from_error(err: &Error) -> Self {
        match err.exit_code() {
            2 => Self::UsageError,
            3 => Self::NetworkError,
            4 => Self::AuthError,
            5 => Self::NotFound,
            6 => Self::Conflict,
            _ => Self::GeneralError,
        }
    }
}
