//! Rule checks.
//!
//! A check is a stateless strategy: it looks at one rule and returns zero
//! or more [`Problem`]s. The runner iterates rules and checks, honoring
//! the control comments that disable checks for a rule and checking for
//! cancellation between rules, never inside a query traversal.

pub mod alerts_comparison;
pub mod promql_fragile;
pub mod promql_impossible;

use common::Problem;
use parser::{Entry, Rule};
use tokio_util::sync::CancellationToken;

pub use alerts_comparison::ComparisonCheck;
pub use promql_fragile::FragileCheck;
pub use promql_impossible::ImpossibleCheck;

/// Static metadata of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckMeta {
    /// True if the check needs a live Prometheus server to run. Offline
    /// checks can run anywhere.
    pub is_online: bool,
}

/// State shared by all checks of one run.
#[derive(Debug, Clone, Default)]
pub struct CheckContext {
    cancel: Option<CancellationToken>,
}

impl CheckContext {
    pub fn new() -> Self {
        Self { cancel: None }
    }

    /// Attach a cancellation token; the runner stops between rules once
    /// it is cancelled.
    pub fn with_cancel(cancel: CancellationToken) -> Self {
        Self {
            cancel: Some(cancel),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
    }
}

/// The contract every check implements.
///
/// Checks are pure: they hold no mutable state and may run in parallel
/// for different rules.
pub trait RuleChecker: Send + Sync {
    /// Stable identifier, e.g. `alerts/comparison`.
    fn name(&self) -> String;

    fn meta(&self) -> CheckMeta;

    /// Check a single rule. `siblings` holds every entry from the same
    /// file for checks that need cross-rule context.
    fn check(&self, ctx: &CheckContext, path: &str, rule: &Rule, siblings: &[Entry])
    -> Vec<Problem>;
}

/// The default set of offline checks.
pub fn default_checks() -> Vec<Box<dyn RuleChecker>> {
    vec![
        Box::new(FragileCheck),
        Box::new(ComparisonCheck),
        Box::new(ImpossibleCheck),
    ]
}

/// True if a `disable` comment value matches a check name: either the
/// bare name or the name followed by a parameter list.
fn check_disabled(disabled: &str, name: &str) -> bool {
    disabled == name
        || disabled
            .strip_prefix(name)
            .is_some_and(|rest| rest.starts_with('('))
}

/// Run every enabled check against every rule.
///
/// Problems for one rule keep the order its checks produced them; there
/// is no ordering guarantee between rules.
pub fn run_checks(
    ctx: &CheckContext,
    path: &str,
    entries: &[Entry],
    checks: &[Box<dyn RuleChecker>],
) -> Vec<Problem> {
    let mut problems = Vec::new();
    for entry in entries {
        if ctx.is_cancelled() {
            break;
        }
        for check in checks {
            let name = check.name();
            if entry
                .disabled_checks
                .iter()
                .any(|disabled| check_disabled(disabled, &name))
            {
                continue;
            }
            problems.extend(check.check(ctx, path, &entry.rule, entries));
        }
    }
    problems
}
