//! Detects queries that depend on an unstable set of labels or series.
//!
//! Two patterns are flagged: aggregations using `without()` inside binary
//! arithmetic, where any label change on either metric silently breaks
//! the match, and `topk()`/`bottomk()` used as a source of series, which
//! can select a different set of series on every query.

use common::{Problem, Severity};
use parser::promql::{children, is_arithmetic_op, node_text, printer, value_type};
use parser::rule::RuleExpr;
use parser::{Entry, Rule};
use promql_parser::parser::token::*;
use promql_parser::parser::value::ValueType;
use promql_parser::parser::{AggregateExpr, BinaryExpr, Expr, LabelModifier};

use crate::{CheckContext, CheckMeta, RuleChecker};

pub const FRAGILE_CHECK_NAME: &str = "promql/fragile";

pub const FRAGILE_CHECK_WITHOUT_TEXT: &str = "Aggregation using `without()` can be fragile when used inside binary expression because both sides must have identical sets of labels to produce any results, adding or removing labels to metrics used here can easily break the query, consider aggregating using `by()` to ensure consistent labels.";

pub const FRAGILE_CHECK_SAMPLING_DETAILS: &str = "\
`topk()` and `bottomk()` pick a sample of all series and the result can include a different set of time series on each evaluation.
Alerts based on such queries can flap as series enter and leave the result set even when nothing about the underlying problem changed.
Aggregate the result or alert on the source series directly to get stable alerts.";

pub struct FragileCheck;

impl RuleChecker for FragileCheck {
    fn name(&self) -> String {
        FRAGILE_CHECK_NAME.to_string()
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
        let expr = rule.expr();
        let Ok(query) = &expr.query else {
            return Vec::new();
        };
        let mut problems = Vec::new();
        check_without(query, expr, &mut problems);
        check_sampling(query, false, expr, &mut problems);
        problems
    }
}

/// Flag `without()` aggregations inside binary arithmetic. Reports the
/// outermost offending binary expression and stops, nested ones are the
/// same problem.
fn check_without(node: &Expr, expr: &RuleExpr, problems: &mut Vec<Problem>) {
    if let Expr::Binary(b) = node {
        if is_fragile_binary(b) {
            problems.push(Problem {
                reporter: FRAGILE_CHECK_NAME.to_string(),
                fragment: Some(node_text(node)),
                lines: expr.lines,
                text: FRAGILE_CHECK_WITHOUT_TEXT.to_string(),
                details: None,
                severity: Severity::Warning,
            });
            return;
        }
    }
    for child in children(node) {
        check_without(child, expr, problems);
    }
}

fn is_fragile_binary(b: &BinaryExpr) -> bool {
    if !is_arithmetic_op(b.op) {
        return false;
    }
    // With on() the matched labels are explicit, the query doesn't break
    // when an extra label shows up.
    if matches!(
        b.modifier.as_ref().map(|m| &m.matching),
        Some(Some(LabelModifier::Include(_)))
    ) {
        return false;
    }
    if value_type(&b.lhs) != ValueType::Vector || value_type(&b.rhs) != ValueType::Vector {
        return false;
    }

    let mut lhs_aggs = Vec::new();
    let mut rhs_aggs = Vec::new();
    outer_aggregations(&b.lhs, &mut lhs_aggs);
    outer_aggregations(&b.rhs, &mut rhs_aggs);

    let uses_without = lhs_aggs.iter().chain(rhs_aggs.iter()).any(|agg| {
        matches!(agg.modifier, Some(LabelModifier::Exclude(_)))
    });
    if !uses_without {
        return false;
    }

    // Both sides aggregating the same input the same way always produces
    // identical label sets, nothing can get out of sync.
    if !lhs_aggs.is_empty()
        && lhs_aggs.len() == rhs_aggs.len()
        && lhs_aggs
            .iter()
            .zip(rhs_aggs.iter())
            .all(|(l, r)| printer::aggregate_text(l) == printer::aggregate_text(r))
    {
        return false;
    }

    true
}

/// Outermost standard aggregations of `node`, descending through
/// wrappers, sampling aggregations and binary operands.
fn outer_aggregations<'a>(node: &'a Expr, out: &mut Vec<&'a AggregateExpr>) {
    match node {
        Expr::Aggregate(agg) => match agg.op.id() {
            T_SUM | T_MIN | T_MAX | T_AVG | T_GROUP | T_STDDEV | T_STDVAR | T_COUNT
            | T_COUNT_VALUES | T_QUANTILE => out.push(agg),
            T_TOPK | T_BOTTOMK => outer_aggregations(&agg.expr, out),
            _ => {}
        },
        Expr::Paren(p) => outer_aggregations(&p.expr, out),
        Expr::Unary(u) => outer_aggregations(&u.expr, out),
        Expr::Subquery(sq) => outer_aggregations(&sq.expr, out),
        Expr::Binary(b) => {
            outer_aggregations(&b.lhs, out);
            outer_aggregations(&b.rhs, out);
        }
        _ => {}
    }
}

fn sampling_text(func: &str) -> String {
    format!(
        "Using `{func}` to select time series might return different set of time series on every query, which would cause flapping alerts."
    )
}

/// Flag `topk()`/`bottomk()` whose result is not aggregated further.
fn check_sampling(node: &Expr, aggregated: bool, expr: &RuleExpr, problems: &mut Vec<Problem>) {
    if let Expr::Aggregate(agg) = node {
        match agg.op.id() {
            T_TOPK | T_BOTTOMK => {
                if !aggregated {
                    let func = printer::aggr_op_text(agg.op);
                    problems.push(Problem {
                        reporter: FRAGILE_CHECK_NAME.to_string(),
                        fragment: Some(node_text(node)),
                        lines: expr.lines,
                        text: sampling_text(func),
                        details: Some(FRAGILE_CHECK_SAMPLING_DETAILS.to_string()),
                        severity: Severity::Warning,
                    });
                }
                for child in children(node) {
                    check_sampling(child, aggregated, expr, problems);
                }
                return;
            }
            T_SUM | T_MIN | T_MAX | T_AVG | T_GROUP | T_STDDEV | T_STDVAR | T_COUNT
            | T_COUNT_VALUES | T_QUANTILE => {
                for child in children(node) {
                    check_sampling(child, true, expr, problems);
                }
                return;
            }
            _ => {}
        }
    }
    for child in children(node) {
        check_sampling(child, aggregated, expr, problems);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::LineRange;
    use parser::{Schema, read_rules};

    fn check_rule(content: &str) -> Vec<Problem> {
        let (entries, problems) = read_rules(content.as_bytes(), false, Schema::Prometheus);
        assert!(problems.is_empty(), "unexpected problems: {problems:?}");
        assert_eq!(entries.len(), 1);
        FragileCheck.check(&CheckContext::new(), "rules.yaml", &entries[0].rule, &entries)
    }

    struct TestCase {
        description: &'static str,
        content: &'static str,
        expected: Vec<(String, Severity)>,
    }

    #[test]
    fn should_match_the_expected_problems() {
        let cases = vec![
            TestCase {
                description: "ignores syntax errors",
                content: "- record: foo\n  expr: up ==\n",
                expected: vec![],
            },
            TestCase {
                description: "ignores simple comparison",
                content: "- record: foo\n  expr: up == 0\n",
                expected: vec![],
            },
            TestCase {
                description: "ignores simple division",
                content: "- record: foo\n  expr: foo / bar\n",
                expected: vec![],
            },
            TestCase {
                description: "ignores unless",
                content: "- record: foo\n  expr: foo unless sum(bar) without(job)\n",
                expected: vec![],
            },
            TestCase {
                description: "ignores safe division",
                content: "- record: foo\n  expr: foo / sum(bar)\n",
                expected: vec![],
            },
            TestCase {
                description: "warns about fragile division",
                content: "- record: foo\n  expr: foo / sum(bar) without(job)\n",
                expected: vec![(FRAGILE_CHECK_WITHOUT_TEXT.to_string(), Severity::Warning)],
            },
            TestCase {
                description: "warns about fragile sum",
                content: "- record: foo\n  expr: sum(foo) without(job) + sum(bar) without(job)\n",
                expected: vec![(FRAGILE_CHECK_WITHOUT_TEXT.to_string(), Severity::Warning)],
            },
            TestCase {
                description: "warns about fragile sum inside a condition",
                content: "- alert: foo\n  expr: (sum(foo) without(job) + sum(bar) without(job)) > 1\n",
                expected: vec![(FRAGILE_CHECK_WITHOUT_TEXT.to_string(), Severity::Warning)],
            },
            TestCase {
                description: "warns about fragile division inside a condition",
                content: "- alert: foo\n  expr: (foo / sum(bar) without(job)) > 1\n",
                expected: vec![(FRAGILE_CHECK_WITHOUT_TEXT.to_string(), Severity::Warning)],
            },
            TestCase {
                description: "warns about fragile sum inside a complex rule",
                content: "- alert: foo\n  expr: (sum(foo) without(job) + sum(bar)) > 1 unless sum(bob) without(job) < 10\n",
                expected: vec![(FRAGILE_CHECK_WITHOUT_TEXT.to_string(), Severity::Warning)],
            },
            TestCase {
                description: "ignores safe addition",
                content: "- record: foo\n  expr: sum(foo) + sum(bar)\n",
                expected: vec![],
            },
            TestCase {
                description: "ignores addition if source metric is the same",
                content: "- record: foo\n  expr: sum(foo) without(bar) + sum(foo) without(bar)\n",
                expected: vec![],
            },
            TestCase {
                description: "handles nested aggregations on the left side",
                content: "- alert: foo\n  expr: count without (foo) (probe_success{job=\"foo\"} == 0 or probe_duration_seconds{job=\"foo\"} >= 15) > 3\n",
                expected: vec![],
            },
            TestCase {
                description: "handles nested aggregations on the right side",
                content: "- alert: foo\n  expr: 3 < count without (foo) (probe_success{job=\"foo\"} == 0 or probe_duration_seconds{job=\"foo\"} >= 15)\n",
                expected: vec![],
            },
            TestCase {
                description: "without() with on() vector matching is ok",
                content: "- alert: foo\n  expr: quantile(0.95, container_memory_working_set_bytes{app_name!=\"foo.service\"} / (container_spec_memory_limit_bytes > 0)) without(instance) * on(app_name) group_left(product, team, notify) job:ownership\n",
                expected: vec![],
            },
            TestCase {
                description: "warns about topk() as source of series",
                content: "- alert: foo\n  expr: topk(10, foo)\n",
                expected: vec![(sampling_text("topk"), Severity::Warning)],
            },
            TestCase {
                description: "warns about topk() behind or",
                content: "- alert: foo\n  expr: bar or topk(10, foo)\n",
                expected: vec![(sampling_text("topk"), Severity::Warning)],
            },
            TestCase {
                description: "warns about every sampling call",
                content: "- alert: foo\n  expr: bar or topk(10, foo) or bottomk(10, foo)\n",
                expected: vec![
                    (sampling_text("topk"), Severity::Warning),
                    (sampling_text("bottomk"), Severity::Warning),
                ],
            },
            TestCase {
                description: "ignores aggregated topk()",
                content: "- alert: foo\n  expr: min(topk(10, foo)) > 5000\n",
                expected: vec![],
            },
        ];

        for case in cases {
            let problems = check_rule(case.content);
            let got: Vec<(String, Severity)> = problems
                .iter()
                .map(|p| (p.text.clone(), p.severity))
                .collect();
            assert_eq!(got, case.expected, "{}", case.description);
            for problem in &problems {
                assert_eq!(problem.reporter, FRAGILE_CHECK_NAME, "{}", case.description);
                assert_eq!(problem.lines, LineRange::single(2), "{}", case.description);
            }
        }
    }

    #[test]
    fn should_attach_sampling_details() {
        let problems = check_rule("- alert: foo\n  expr: topk(10, foo)\n");
        assert_eq!(problems.len(), 1);
        assert_eq!(
            problems[0].details.as_deref(),
            Some(FRAGILE_CHECK_SAMPLING_DETAILS)
        );
        assert_eq!(problems[0].fragment.as_deref(), Some("topk(10, foo)"));
    }
}
