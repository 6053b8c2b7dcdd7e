//! Error types for rule file ingest.

/// Error type for ingest operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The file could not be read at all.
    Io(String),

    /// The file content is not valid YAML or not a valid rule layout.
    Yaml(String),

    /// A single rule definition is invalid.
    InvalidRule(String),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(msg) => write!(f, "Read error: {}", msg),
            Error::Yaml(msg) => write!(f, "YAML parse error: {}", msg),
            Error::InvalidRule(msg) => write!(f, "Invalid rule: {}", msg),
        }
    }
}

/// Result type alias for ingest operations.
pub type Result<T> = std::result::Result<T, Error>;
