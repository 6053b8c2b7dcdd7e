//! Problem records emitted by checks.

use serde::{Deserialize, Serialize};

use crate::lines::LineRange;

/// How serious a reported problem is.
///
/// The ordering matters: hosts use it to decide exit codes and filtering,
/// so `Information < Warning < Bug < Fatal` must hold.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Information,
    Warning,
    Bug,
    Fatal,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Information => write!(f, "information"),
            Severity::Warning => write!(f, "warning"),
            Severity::Bug => write!(f, "bug"),
            Severity::Fatal => write!(f, "fatal"),
        }
    }
}

/// A single problem found in a rule.
///
/// Problems are plain data: checks never fail, they only return fewer or
/// more of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    /// Name of the check that reported this problem, e.g. `alerts/comparison`.
    pub reporter: String,
    /// The offending query fragment, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragment: Option<String>,
    /// Lines in the rule file this problem applies to.
    pub lines: LineRange,
    /// Single paragraph description, free of markup.
    pub text: String,
    /// Optional extended rationale, rendered as Markdown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub severity: Severity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_order_severities_from_information_to_fatal() {
        assert!(Severity::Information < Severity::Warning);
        assert!(Severity::Warning < Severity::Bug);
        assert!(Severity::Bug < Severity::Fatal);
    }

    #[test]
    fn should_format_severity_names() {
        assert_eq!(Severity::Information.to_string(), "information");
        assert_eq!(Severity::Warning.to_string(), "warning");
        assert_eq!(Severity::Bug.to_string(), "bug");
        assert_eq!(Severity::Fatal.to_string(), "fatal");
    }
}
