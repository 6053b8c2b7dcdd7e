//! Rule file ingest and PromQL analysis.
//!
//! This crate turns Prometheus rule files into [`rule::Rule`] values ready
//! for checking, and provides the PromQL label-flow analyzer
//! ([`promql::source`]) that checks build on:
//!
//! - [`read::read_rules`] parses a rule file into rules plus any problems
//!   found along the way (the file itself is never rejected).
//! - [`comments::parse`] handles `# rulelint ...` control comments.
//! - [`promql`] wraps the PromQL parser and walks query ASTs to compute
//!   which labels an expression can, must, or cannot return.

pub mod comments;
pub mod content;
pub mod error;
pub mod promql;
pub mod read;
pub mod rule;

pub use error::{Error, Result};
pub use read::{Entry, Schema, read_rules};
pub use rule::{AlertingRule, RecordingRule, Rule, RuleExpr};
