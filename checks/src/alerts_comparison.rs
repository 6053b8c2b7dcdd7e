//! Alerting rules are expected to carry some condition that can stop the
//! alert from firing. This check flags alert queries that will match
//! whenever the metric exists, which almost always means a permanently
//! firing alert.

use common::{Problem, Severity};
use parser::promql::{children, has_outer_binary, is_comparison_op};
use parser::{Entry, Rule};
use promql_parser::parser::token::*;
use promql_parser::parser::{BinaryExpr, Expr};

use crate::{CheckContext, CheckMeta, RuleChecker};

pub const COMPARISON_CHECK_NAME: &str = "alerts/comparison";

pub struct ComparisonCheck;

impl RuleChecker for ComparisonCheck {
    fn name(&self) -> String {
        COMPARISON_CHECK_NAME.to_string()
    }

    fn meta(&self) -> CheckMeta {
        CheckMeta { is_online: false }
    }

    fn check(
        &self,
        _ctx: &CheckContext,
        _path: &str,
        rule: &Rule,
        _siblings: &[Entry],
    ) -> Vec<Problem> {
        let mut problems = Vec::new();

        let Rule::Alerting(alerting) = rule else {
            return problems;
        };
        let Ok(query) = &alerting.expr.query else {
            return problems;
        };

        if let Some(n) = has_outer_binary(query) {
            if n.op.id() == T_LOR
                && (has_comparison(&n.lhs).is_none() || has_comparison(&n.rhs).is_none())
                && !is_absent(&n.lhs)
                && !is_absent(&n.rhs)
            {
                problems.push(Problem {
                    reporter: COMPARISON_CHECK_NAME.to_string(),
                    fragment: Some(alerting.expr.value.clone()),
                    lines: alerting.expr.lines,
                    text: "alert query uses 'or' operator with one side of the query that will always return a result, this alert will always fire"
                        .to_string(),
                    details: None,
                    severity: rewrite_severity(Severity::Warning, &[n.lhs.as_ref(), n.rhs.as_ref()]),
                });
            }
        }

        if let Some(n) = has_comparison(query) {
            if n.return_bool()
                && has_comparison(&n.lhs).is_none()
                && has_comparison(&n.rhs).is_none()
            {
                problems.push(Problem {
                    reporter: COMPARISON_CHECK_NAME.to_string(),
                    fragment: Some(alerting.expr.value.clone()),
                    lines: alerting.expr.lines,
                    text: "alert query uses bool modifier for comparison, this means it will always return a result and the alert will always fire"
                        .to_string(),
                    details: None,
                    severity: Severity::Bug,
                });
            }
            return problems;
        }

        if is_absent(query) {
            return problems;
        }

        problems.push(Problem {
            reporter: COMPARISON_CHECK_NAME.to_string(),
            fragment: Some(alerting.expr.value.clone()),
            lines: alerting.expr.lines,
            text: "alert query doesn't have any condition, it will always fire if the metric exists"
                .to_string(),
            details: None,
            severity: Severity::Warning,
        });

        problems
    }
}

/// First descendant binary expression that filters results: a comparison
/// or `unless`.
fn has_comparison(node: &Expr) -> Option<&BinaryExpr> {
    if let Expr::Binary(b) = node {
        if is_comparison_op(b.op) || b.op.id() == T_LUNLESS {
            return Some(b);
        }
    }
    for child in children(node) {
        if let Some(b) = has_comparison(child) {
            return Some(b);
        }
    }
    None
}

/// True if any descendant is an `absent()` or `absent_over_time()` call.
fn is_absent(node: &Expr) -> bool {
    if let Expr::Call(call) = node {
        if matches!(call.func.name, "absent" | "absent_over_time") {
            return true;
        }
    }
    children(node).into_iter().any(is_absent)
}

/// `vector()` sides make an always-firing alert a bug, not a warning.
fn rewrite_severity(severity: Severity, nodes: &[&Expr]) -> Severity {
    for node in nodes {
        if let Expr::Call(call) = node {
            if call.func.name == "vector" {
                return Severity::Bug;
            }
        }
    }
    severity
}
