//! Reports query branches that can never return anything.
//!
//! The label-flow analyzer marks a source as dead when it can prove the
//! branch produces no samples: a comparison between constants that is
//! never true, or an `or` branch behind a side that always returns.
//! Such branches are at best clutter and at worst a sign the author
//! expected different semantics.

use common::{Problem, Severity};
use parser::promql::{labels_source, printer};
use parser::{Entry, Rule};

use crate::{CheckContext, CheckMeta, RuleChecker};

pub const IMPOSSIBLE_CHECK_NAME: &str = "promql/impossible";

pub struct ImpossibleCheck;

impl RuleChecker for ImpossibleCheck {
    fn name(&self) -> String {
        IMPOSSIBLE_CHECK_NAME.to_string()
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
        for source in labels_source(query) {
            if !source.is_dead {
                continue;
            }
            let fragment = source
                .selectors
                .first()
                .map(printer::selector_text)
                .or_else(|| Some(expr.value.clone()));
            problems.push(Problem {
                reporter: IMPOSSIBLE_CHECK_NAME.to_string(),
                fragment,
                lines: expr.lines,
                text: "this part of the query is dead code and will never return anything"
                    .to_string(),
                details: None,
                severity: Severity::Warning,
            });
        }
        problems
    }
}
