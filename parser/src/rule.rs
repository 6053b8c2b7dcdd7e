//! Parsed rule definitions.

use std::collections::BTreeMap;

use common::LineRange;
use promql_parser::parser::Expr;

use crate::promql::SyntaxError;

/// A rule expression: the original text, where it lives in the file, and
/// the parsed query or the syntax error the parser returned.
#[derive(Debug, Clone)]
pub struct RuleExpr {
    pub value: String,
    pub lines: LineRange,
    pub query: Result<Expr, SyntaxError>,
}

impl RuleExpr {
    pub fn new(value: String, lines: LineRange) -> Self {
        let query = crate::promql::parse(&value);
        Self {
            value,
            lines,
            query,
        }
    }

    /// The syntax error for this expression, if it failed to parse.
    pub fn syntax_error(&self) -> Option<&SyntaxError> {
        self.query.as_ref().err()
    }
}

#[derive(Debug, Clone)]
pub struct RecordingRule {
    pub record: String,
    pub expr: RuleExpr,
    pub labels: BTreeMap<String, String>,
    pub lines: LineRange,
}

#[derive(Debug, Clone)]
pub struct AlertingRule {
    pub alert: String,
    pub expr: RuleExpr,
    pub for_duration: Option<String>,
    pub keep_firing_for: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub lines: LineRange,
}

/// A single rule parsed out of a rule file.
#[derive(Debug, Clone)]
pub enum Rule {
    Recording(RecordingRule),
    Alerting(AlertingRule),
}

impl Rule {
    /// The record or alert name.
    pub fn name(&self) -> &str {
        match self {
            Rule::Recording(r) => &r.record,
            Rule::Alerting(a) => &a.alert,
        }
    }

    pub fn expr(&self) -> &RuleExpr {
        match self {
            Rule::Recording(r) => &r.expr,
            Rule::Alerting(a) => &a.expr,
        }
    }

    pub fn lines(&self) -> LineRange {
        match self {
            Rule::Recording(r) => r.lines,
            Rule::Alerting(a) => a.lines,
        }
    }

    pub fn is_alerting(&self) -> bool {
        matches!(self, Rule::Alerting(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_expression_on_construction() {
        let expr = RuleExpr::new("up == 0".to_string(), LineRange::single(2));
        assert!(expr.query.is_ok());
        assert!(expr.syntax_error().is_none());

        let expr = RuleExpr::new("up ==".to_string(), LineRange::single(2));
        assert!(expr.query.is_err());
        assert!(expr.syntax_error().is_some());
    }
}
