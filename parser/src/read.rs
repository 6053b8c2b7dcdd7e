//! Rule file ingest.
//!
//! [`read_rules`] turns a rule file into [`Entry`] values ready for
//! checking. The file itself is never rejected: anything that fails to
//! parse becomes a [`Problem`] and ingest carries on with whatever it
//! could understand.

use std::collections::BTreeMap;
use std::io::Read;

use chrono::Utc;
use common::{LineRange, Problem, Severity};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::content;
use crate::error::Error;
use crate::comments::{CommentKind, CommentValue};
use crate::rule::{AlertingRule, RecordingRule, Rule, RuleExpr};

/// Reporter name used for YAML and rule layout problems.
pub const PARSE_REPORTER: &str = "rules/parse";
/// Reporter name used for ignored files.
pub const IGNORE_REPORTER: &str = "rules/ignore";
/// Reporter name used for malformed control comments.
pub const COMMENTS_REPORTER: &str = "rules/comments";

/// Which rule file flavor to accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    Prometheus,
    /// Like Prometheus but groups may set `partial_response_strategy`.
    Thanos,
}

/// A parsed rule together with the control comment state that applies
/// to it.
#[derive(Debug, Clone)]
pub struct Entry {
    pub rule: Rule,
    pub owner: Option<String>,
    pub disabled_checks: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RuleDef {
    record: Option<String>,
    alert: Option<String>,
    expr: Option<String>,
    #[serde(rename = "for")]
    for_duration: Option<String>,
    keep_firing_for: Option<String>,
    #[serde(default)]
    labels: BTreeMap<String, String>,
    #[serde(default)]
    annotations: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GroupsFile {
    groups: Vec<GroupDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GroupDef {
    #[allow(dead_code)]
    name: String,
    #[allow(dead_code)]
    interval: Option<String>,
    #[allow(dead_code)]
    query_offset: Option<String>,
    #[allow(dead_code)]
    limit: Option<i64>,
    partial_response_strategy: Option<String>,
    #[serde(default)]
    rules: Vec<RuleDef>,
}

// Relaxed variants that tolerate extra keys.
#[derive(Debug, Deserialize)]
struct GroupsFileLenient {
    groups: Vec<GroupLenient>,
}

#[derive(Debug, Deserialize)]
struct GroupLenient {
    partial_response_strategy: Option<String>,
    #[serde(default)]
    rules: Vec<RuleDef>,
}

/// Read rules from `reader`.
///
/// In strict mode the file must follow the Prometheus `groups:` layout;
/// relaxed mode additionally accepts a bare YAML list of rules. Problems
/// never abort ingest, rules that could be parsed are always returned.
pub fn read_rules<R: Read>(mut reader: R, strict: bool, schema: Schema) -> (Vec<Entry>, Vec<Problem>) {
    let mut problems = Vec::new();

    let mut input = String::new();
    if let Err(err) = reader.read_to_string(&mut input) {
        problems.push(Problem {
            reporter: PARSE_REPORTER.to_string(),
            fragment: None,
            lines: LineRange::single(1),
            text: Error::Io(err.to_string()).to_string(),
            details: None,
            severity: Severity::Fatal,
        });
        return (Vec::new(), problems);
    }

    let content = content::read(&input);
    let file_lines = if content.total_lines == 0 {
        LineRange::single(1)
    } else {
        LineRange::new(1, content.total_lines)
    };

    let mut file_owner: Option<String> = None;
    let mut file_disabled: Vec<String> = Vec::new();
    for comment in &content.comments {
        match (&comment.kind, &comment.value) {
            (CommentKind::FileOwner, CommentValue::Owner(name)) => {
                file_owner = Some(name.clone());
            }
            (CommentKind::FileDisable, CommentValue::Disable(matcher)) => {
                if !file_disabled.contains(matcher) {
                    file_disabled.push(matcher.clone());
                }
            }
            (CommentKind::FileSnooze, CommentValue::Snooze(snooze)) => {
                if snooze.until <= Utc::now() {
                    continue;
                }
                if !file_disabled.contains(&snooze.matcher) {
                    file_disabled.push(snooze.matcher.clone());
                }
                debug!(
                    check = snooze.matcher.as_str(),
                    until = %snooze.until,
                    "Check snoozed by comment"
                );
            }
            (CommentKind::Invalid, CommentValue::Invalid(err)) => {
                problems.push(Problem {
                    reporter: COMMENTS_REPORTER.to_string(),
                    fragment: None,
                    lines: LineRange::single(comment.line),
                    text: err.clone(),
                    details: None,
                    severity: Severity::Warning,
                });
            }
            _ => {}
        }
    }

    if content.ignored {
        problems.push(Problem {
            reporter: IGNORE_REPORTER.to_string(),
            fragment: None,
            lines: file_lines,
            text: "This file was excluded from rulelint checks.".to_string(),
            details: None,
            severity: Severity::Information,
        });
        return (Vec::new(), problems);
    }

    if content.body.trim().is_empty() {
        return (Vec::new(), problems);
    }

    let defs = match decode_defs(&content.body, strict, schema, file_lines, &mut problems) {
        Some(defs) => defs,
        None => return (Vec::new(), problems),
    };

    let spans = rule_spans(&content.body);
    let spans_match = spans.len() == defs.len();
    if !spans_match {
        warn!(
            rules = defs.len(),
            spans = spans.len(),
            "Unable to map rules to their line numbers, problems will cover the whole file"
        );
    }

    let mut entries = Vec::new();
    for (idx, def) in defs.into_iter().enumerate() {
        let (rule_lines, expr_lines) = if spans_match {
            (spans[idx].lines, spans[idx].expr.unwrap_or(spans[idx].lines))
        } else {
            (file_lines, file_lines)
        };

        let rule = match build_rule(def, rule_lines, expr_lines) {
            Ok(rule) => rule,
            Err(err) => {
                problems.push(Problem {
                    reporter: PARSE_REPORTER.to_string(),
                    fragment: None,
                    lines: rule_lines,
                    text: err.to_string(),
                    details: None,
                    severity: Severity::Fatal,
                });
                continue;
            }
        };

        let mut owner = file_owner.clone();
        let mut disabled_checks = file_disabled.clone();
        for comment in &content.comments {
            if comment.line < rule_lines.first || comment.line > rule_lines.last {
                continue;
            }
            match (&comment.kind, &comment.value) {
                (CommentKind::RuleOwner, CommentValue::Owner(name)) => {
                    owner = Some(name.clone());
                }
                (CommentKind::Disable, CommentValue::Disable(matcher)) => {
                    if !disabled_checks.contains(matcher) {
                        disabled_checks.push(matcher.clone());
                    }
                }
                (CommentKind::Snooze, CommentValue::Snooze(snooze)) => {
                    if snooze.until > Utc::now() && !disabled_checks.contains(&snooze.matcher) {
                        disabled_checks.push(snooze.matcher.clone());
                    }
                }
                _ => {}
            }
        }

        entries.push(Entry {
            rule,
            owner,
            disabled_checks,
        });
    }

    debug!(rules = entries.len(), "File parsed");
    (entries, problems)
}

fn decode_defs(
    body: &str,
    strict: bool,
    schema: Schema,
    file_lines: LineRange,
    problems: &mut Vec<Problem>,
) -> Option<Vec<RuleDef>> {
    // Comment-only and blank bodies decode to null, which is not an error.
    if matches!(
        serde_yaml::from_str::<serde_yaml::Value>(body),
        Ok(serde_yaml::Value::Null)
    ) {
        return Some(Vec::new());
    }

    if strict {
        match serde_yaml::from_str::<GroupsFile>(body) {
            Ok(file) => {
                let mut defs = Vec::new();
                for group in file.groups {
                    check_partial_response(
                        group.partial_response_strategy.as_ref(),
                        schema,
                        file_lines,
                        problems,
                    );
                    defs.extend(group.rules);
                }
                Some(defs)
            }
            Err(err) => {
                parse_failure(Error::Yaml(err.to_string()), file_lines, problems);
                None
            }
        }
    } else {
        if let Ok(defs) = serde_yaml::from_str::<Vec<RuleDef>>(body) {
            return Some(defs);
        }
        match serde_yaml::from_str::<GroupsFileLenient>(body) {
            Ok(file) => {
                let mut defs = Vec::new();
                for group in file.groups {
                    check_partial_response(
                        group.partial_response_strategy.as_ref(),
                        schema,
                        file_lines,
                        problems,
                    );
                    defs.extend(group.rules);
                }
                Some(defs)
            }
            Err(err) => {
                parse_failure(Error::Yaml(err.to_string()), file_lines, problems);
                None
            }
        }
    }
}

fn parse_failure(err: Error, file_lines: LineRange, problems: &mut Vec<Problem>) {
    let msg = err.to_string();
    warn!(err = msg.as_str(), "Failed to parse file content");
    problems.push(Problem {
        reporter: PARSE_REPORTER.to_string(),
        fragment: None,
        lines: file_lines,
        text: msg,
        details: None,
        severity: Severity::Fatal,
    });
}

fn check_partial_response(
    strategy: Option<&String>,
    schema: Schema,
    file_lines: LineRange,
    problems: &mut Vec<Problem>,
) {
    if strategy.is_some() && schema != Schema::Thanos {
        problems.push(Problem {
            reporter: PARSE_REPORTER.to_string(),
            fragment: None,
            lines: file_lines,
            text: "invalid key `partial_response_strategy`, it is only valid when parsing rules with the Thanos schema"
                .to_string(),
            details: None,
            severity: Severity::Fatal,
        });
    }
}

fn build_rule(def: RuleDef, rule_lines: LineRange, expr_lines: LineRange) -> crate::Result<Rule> {
    let expr_text = match (&def.record, &def.alert) {
        (Some(_), Some(_)) => {
            return Err(Error::InvalidRule(
                "rule defines both `record` and `alert` keys, it must be either a recording rule or an alerting rule"
                    .to_string(),
            ));
        }
        (None, None) => {
            return Err(Error::InvalidRule(
                "rule must have either a `record` or an `alert` key".to_string(),
            ));
        }
        _ => match def.expr {
            Some(expr) => expr,
            None => {
                return Err(Error::InvalidRule(
                    "rule is missing the `expr` key".to_string(),
                ));
            }
        },
    };

    match (def.record, def.alert) {
        (Some(record), None) => {
            if !def.annotations.is_empty() {
                return Err(Error::InvalidRule(
                    "recording rules can't use `annotations`, only alerting rules accept them"
                        .to_string(),
                ));
            }
            if def.for_duration.is_some() || def.keep_firing_for.is_some() {
                return Err(Error::InvalidRule(
                    "recording rules can't use `for` or `keep_firing_for`".to_string(),
                ));
            }
            Ok(Rule::Recording(RecordingRule {
                record,
                expr: RuleExpr::new(expr_text, expr_lines),
                labels: def.labels,
                lines: rule_lines,
            }))
        }
        (None, Some(alert)) => Ok(Rule::Alerting(AlertingRule {
            alert,
            expr: RuleExpr::new(expr_text, expr_lines),
            for_duration: def.for_duration,
            keep_firing_for: def.keep_firing_for,
            labels: def.labels,
            annotations: def.annotations,
            lines: rule_lines,
        })),
        _ => unreachable!("validated above"),
    }
}

#[derive(Debug, Clone, Copy)]
struct RuleSpan {
    lines: LineRange,
    expr: Option<LineRange>,
}

/// Map each rule definition to the lines it occupies.
///
/// The YAML decoder has no notion of positions, so rule and `expr:` line
/// ranges are recovered by scanning the raw text for list items carrying
/// `record:` or `alert:` keys. Items are matched to decoded rules by
/// document order.
fn rule_spans(body: &str) -> Vec<RuleSpan> {
    let lines: Vec<&str> = body.lines().collect();
    let mut spans = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim_start();
        if !trimmed.starts_with("- ") {
            i += 1;
            continue;
        }
        let dash_col = line.len() - trimmed.len();
        let after_dash = &line[dash_col + 1..];
        let content_col = dash_col + 1 + (after_dash.len() - after_dash.trim_start().len());

        // Extent of this list item: everything below with deeper indentation.
        let mut end = i + 1;
        while end < lines.len() {
            let t = lines[end].trim_start();
            if t.is_empty() {
                end += 1;
                continue;
            }
            let indent = lines[end].len() - t.len();
            if indent <= dash_col {
                break;
            }
            end += 1;
        }

        let is_rule = key_line(&lines, i, end, content_col, "record:").is_some()
            || key_line(&lines, i, end, content_col, "alert:").is_some();
        if !is_rule {
            // Not a rule item, but rules may be nested deeper inside.
            i += 1;
            continue;
        }

        let mut last = i;
        for k in i..end {
            if !lines[k].trim().is_empty() {
                last = k;
            }
        }

        let expr = key_line(&lines, i, end, content_col, "expr:").map(|k| {
            let mut expr_last = k;
            let mut m = k + 1;
            while m < end {
                let t = lines[m].trim_start();
                if t.is_empty() {
                    m += 1;
                    continue;
                }
                let indent = lines[m].len() - t.len();
                if indent <= content_col {
                    break;
                }
                expr_last = m;
                m += 1;
            }
            LineRange::new(k + 1, expr_last + 1)
        });

        spans.push(RuleSpan {
            lines: LineRange::new(i + 1, last + 1),
            expr,
        });
        i = end;
    }
    spans
}

/// Find the line inside `i..end` where `key` sits at column `content_col`.
fn key_line(lines: &[&str], i: usize, end: usize, content_col: usize, key: &str) -> Option<usize> {
    for k in i..end {
        let line = lines[k];
        if line.len() < content_col {
            continue;
        }
        let (head, rest) = line.split_at(content_col);
        let head_ok = if k == i {
            head.trim() == "-"
        } else {
            head.trim().is_empty()
        };
        if head_ok && rest.starts_with(key) {
            return Some(k);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(content: &str) -> (Vec<Entry>, Vec<Problem>) {
        read_rules(content.as_bytes(), false, Schema::Prometheus)
    }

    #[test]
    fn should_read_bare_rule_lists() {
        let (entries, problems) = read("- record: foo\n  expr: up == 0\n- alert: bar\n  expr: up == 0\n  for: 5m\n");
        assert!(problems.is_empty());
        assert_eq!(entries.len(), 2);

        let Rule::Recording(recording) = &entries[0].rule else {
            panic!("expected a recording rule");
        };
        assert_eq!(recording.record, "foo");
        assert_eq!(recording.lines, LineRange::new(1, 2));
        assert_eq!(recording.expr.lines, LineRange::single(2));
        assert!(recording.expr.query.is_ok());

        let Rule::Alerting(alerting) = &entries[1].rule else {
            panic!("expected an alerting rule");
        };
        assert_eq!(alerting.alert, "bar");
        assert_eq!(alerting.for_duration.as_deref(), Some("5m"));
        assert_eq!(alerting.lines, LineRange::new(3, 5));
    }

    #[test]
    fn should_read_group_files() {
        let content = "\
groups:
  - name: example
    rules:
      - record: foo
        expr: sum(up)
      - alert: bar
        expr: up == 0
";
        let (entries, problems) = read(content);
        assert!(problems.is_empty(), "{problems:?}");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].rule.name(), "foo");
        assert_eq!(entries[0].rule.lines(), LineRange::new(4, 5));
        assert_eq!(entries[1].rule.lines(), LineRange::new(6, 7));
    }

    #[test]
    fn should_track_block_scalar_expressions() {
        let content = "\
- alert: foo
  expr: |
    sum(rate(errors_total[5m]))
    > 10
  for: 5m
";
        let (entries, problems) = read(content);
        assert!(problems.is_empty());
        assert_eq!(entries.len(), 1);
        let expr = entries[0].rule.expr();
        assert_eq!(expr.lines, LineRange::new(2, 4));
        assert!(expr.query.is_ok());
        assert_eq!(entries[0].rule.lines(), LineRange::new(1, 5));
    }

    #[test]
    fn should_keep_rules_with_syntax_errors() {
        let (entries, problems) = read("- record: foo\n  expr: up ==\n");
        assert!(problems.is_empty());
        assert_eq!(entries.len(), 1);
        assert!(entries[0].rule.expr().syntax_error().is_some());
    }

    #[test]
    fn should_reject_rules_with_both_record_and_alert() {
        let (entries, problems) = read("- record: foo\n  alert: bar\n  expr: up\n");
        assert!(entries.is_empty());
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].severity, Severity::Fatal);
        assert_eq!(problems[0].lines, LineRange::new(1, 3));
        assert!(problems[0].text.contains("both `record` and `alert`"));
    }

    #[test]
    fn should_reject_rules_without_expr() {
        let (entries, problems) = read("- record: foo\n  labels:\n    a: b\n");
        assert!(entries.is_empty());
        assert_eq!(problems.len(), 1);
        assert!(problems[0].text.contains("missing the `expr` key"));
    }

    #[test]
    fn should_reject_recording_rules_with_annotations() {
        let (entries, problems) = read(
            "- record: foo\n  expr: up\n  annotations:\n    summary: nope\n",
        );
        assert!(entries.is_empty());
        assert_eq!(problems.len(), 1);
        assert!(problems[0].text.contains("annotations"));
    }

    #[test]
    fn should_report_yaml_errors_as_fatal_problems() {
        let (entries, problems) = read("this is not a rule file\n");
        assert!(entries.is_empty());
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].severity, Severity::Fatal);
        assert_eq!(problems[0].lines, LineRange::single(1));
    }

    #[test]
    fn should_require_groups_in_strict_mode() {
        let content = "- record: foo\n  expr: up\n";
        let (entries, problems) = read_rules(content.as_bytes(), true, Schema::Prometheus);
        assert!(entries.is_empty());
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].severity, Severity::Fatal);

        let content = "groups:\n  - name: g\n    rules:\n      - record: foo\n        expr: up\n";
        let (entries, problems) = read_rules(content.as_bytes(), true, Schema::Prometheus);
        assert!(problems.is_empty(), "{problems:?}");
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn should_validate_partial_response_strategy_by_schema() {
        let content = "\
groups:
  - name: g
    partial_response_strategy: warn
    rules:
      - record: foo
        expr: up
";
        let (entries, problems) = read_rules(content.as_bytes(), true, Schema::Prometheus);
        assert_eq!(entries.len(), 1);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].text.contains("partial_response_strategy"));

        let (entries, problems) = read_rules(content.as_bytes(), true, Schema::Thanos);
        assert_eq!(entries.len(), 1);
        assert!(problems.is_empty(), "{problems:?}");
    }

    #[test]
    fn should_skip_ignored_files() {
        let (entries, problems) = read("# rulelint ignore/file\n- record: foo\n  expr: up\n");
        assert!(entries.is_empty());
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].severity, Severity::Information);
        assert_eq!(problems[0].lines, LineRange::new(1, 3));
    }

    #[test]
    fn should_resolve_owners_and_disabled_checks() {
        let content = "\
# rulelint file/owner team-a
# rulelint file/disable promql/fragile
- record: foo
  expr: up
- record: bar # rulelint rule/owner team-b
  expr: up
  # rulelint disable alerts/comparison
";
        let (entries, problems) = read(content);
        assert!(problems.is_empty(), "{problems:?}");
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].owner.as_deref(), Some("team-a"));
        assert_eq!(entries[0].disabled_checks, vec!["promql/fragile"]);

        assert_eq!(entries[1].owner.as_deref(), Some("team-b"));
        assert_eq!(
            entries[1].disabled_checks,
            vec!["promql/fragile", "alerts/comparison"]
        );
    }

    #[test]
    fn should_apply_snooze_comments_until_expiry() {
        let content = "\
# rulelint file/snooze 2099-01-01 promql/fragile
# rulelint file/snooze 2000-01-01 alerts/comparison
- record: foo
  expr: up
";
        let (entries, problems) = read(content);
        assert!(problems.is_empty(), "{problems:?}");
        assert_eq!(entries[0].disabled_checks, vec!["promql/fragile"]);
    }

    #[test]
    fn should_report_invalid_comments() {
        let (entries, problems) = read("# rulelint file/owner\n- record: foo\n  expr: up\n");
        assert_eq!(entries.len(), 1);
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].reporter, COMMENTS_REPORTER);
        assert_eq!(problems[0].severity, Severity::Warning);
        assert_eq!(problems[0].lines, LineRange::single(1));
        assert_eq!(problems[0].text, "missing file/owner value");
    }

    #[test]
    fn should_return_nothing_for_empty_files() {
        let (entries, problems) = read("");
        assert!(entries.is_empty());
        assert!(problems.is_empty());

        let (entries, problems) = read("\n# just a comment\n");
        assert!(entries.is_empty());
        assert!(problems.is_empty());
    }
}
