//! Error types for stowage-core
//!
//! Provides a unified error type that can be converted to appropriate exit codes.

use thiserror::Error;

/// Result type alias for stowage-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for stowage-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid path format
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Profile not found
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    /// Resource not found (raised by the store)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Object missing after an explicit existence check
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    /// Authentication error
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The store refused a write that conflicts with its current state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Network or backend error
    #[error("Network error: {0}")]
    Network(String),

    /// Search pattern failed to compile
    #[error("Invalid search pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// XML error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::de::DeError),

    /// Payload is not valid UTF-8 text
    #[error("Invalid UTF-8 payload: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Get the appropriate exit code for this error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidPath(_) | Error::Config(_) | Error::Pattern(_) => 2, // UsageError
            Error::Network(_) => 3,                                            // NetworkError
            Error::Auth(_) => 4,                                               // AuthError
            Error::NotFound(_) | Error::ObjectNotFound(_) | Error::ProfileNotFound(_) => 5,
            Error::Conflict(_) => 6,
            _ => 1, // GeneralError
        }
    }

    /// Whether the error means the addressed resource does not exist
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::ObjectNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(Error::InvalidPath("test".into()).exit_code(), 2);
        assert_eq!(Error::Config("test".into()).exit_code(), 2);
        assert_eq!(Error::Network("test".into()).exit_code(), 3);
        assert_eq!(Error::Auth("test".into()).exit_code(), 4);
        assert_eq!(Error::NotFound("test".into()).exit_code(), 5);
        assert_eq!(Error::ObjectNotFound("test".into()).exit_code(), 5);
        assert_eq!(Error::ProfileNotFound("test".into()).exit_code(), 5);
        assert_eq!(Error::Conflict("test".into()).exit_code(), 6);
        assert_eq!(Error::General("test".into()).exit_code(), 1);
    }

    #[test]
    fn test_pattern_error_is_usage_error() {
        let err = regex::Regex::new("(unclosed").unwrap_err();
        assert_eq!(Error::from(err).exit_code(), 2);
    }

    #[test]
    fn test_error_display() {
        let err = Error::ProfileNotFound("prod".into());
        assert_eq!(err.to_string(), "Profile not found: prod");

        let err = Error::ObjectNotFound("bucket/a.txt".into());
        assert_eq!(err.to_string(), "Object not found: bucket/a.txt");
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::NotFound("x".into()).is_not_found());
        assert!(Error::ObjectNotFound("x".into()).is_not_found());
        assert!(!Error::Network("x".into()).is_not_found());
    }
}
