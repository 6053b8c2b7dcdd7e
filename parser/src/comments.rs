//! Control comments embedded in rule files.
//!
//! Rule files can carry `# rulelint ...` comments that change how the file
//! is checked: ignoring lines or the whole file, assigning owners,
//! disabling checks permanently or until a deadline. A comment can trail
//! other content on the line; anything that does not parse as a known
//! directive is left alone, while a known directive with a malformed value
//! is reported as [`CommentKind::Invalid`].

use chrono::{DateTime, NaiveDate, Utc};

/// Comment marker, as in `# rulelint ignore/line`.
pub const MARKER: &str = "rulelint";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    IgnoreFile,
    IgnoreLine,
    IgnoreNextLine,
    IgnoreBegin,
    IgnoreEnd,
    FileOwner,
    RuleOwner,
    FileDisable,
    Disable,
    FileSnooze,
    Snooze,
    RuleSet,
    Invalid,
}

/// Snooze a check until the given time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snooze {
    pub until: DateTime<Utc>,
    pub matcher: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentValue {
    None,
    /// Owner name for `file/owner` and `rule/owner`.
    Owner(String),
    /// Check matcher for `disable` and `file/disable`.
    Disable(String),
    Snooze(Snooze),
    /// Free-form value for `rule/set`.
    RuleSet(String),
    /// Error message for malformed directives.
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub kind: CommentKind,
    pub value: CommentValue,
    /// 1-based line this comment was found on.
    pub line: usize,
    /// Byte offset of the comment start within its line.
    pub offset: usize,
}

/// Parse all control comments in `text`, which may span multiple lines.
/// `first_line` is the 1-based number of the first line of `text`.
pub fn parse(first_line: usize, text: &str) -> Vec<Comment> {
    let mut comments = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if let Some(comment) = parse_line(first_line + i, line) {
            comments.push(comment);
        }
    }
    comments
}

/// Scan a single line for a `# rulelint DIRECTIVE` comment.
///
/// Every `#` is a candidate comment start; the first one followed by the
/// marker and a known directive wins. Unknown directives are skipped so
/// that things like `# rulelint is great` never produce errors.
pub fn parse_line(line_no: usize, line: &str) -> Option<Comment> {
    for (offset, _) in line.match_indices('#') {
        let rest = line[offset + 1..].trim_start();
        let Some(after_marker) = rest.strip_prefix(MARKER) else {
            continue;
        };
        let body = after_marker.trim_start();
        if body.len() == after_marker.len() && !body.is_empty() {
            // No whitespace after the marker, e.g. `# rulelintxxx`.
            continue;
        }
        if body.is_empty() {
            continue;
        }
        let (directive, suffix) = match body.split_once(char::is_whitespace) {
            Some((directive, suffix)) => (directive, suffix.trim()),
            None => (body, ""),
        };
        if let Some((kind, value)) = parse_directive(directive, suffix) {
            return Some(Comment {
                kind,
                value,
                line: line_no,
                offset,
            });
        }
    }
    None
}

fn parse_directive(directive: &str, suffix: &str) -> Option<(CommentKind, CommentValue)> {
    match directive {
        "ignore/file" => Some(bare(CommentKind::IgnoreFile, suffix)),
        "ignore/line" => Some(bare(CommentKind::IgnoreLine, suffix)),
        "ignore/next-line" => Some(bare(CommentKind::IgnoreNextLine, suffix)),
        "ignore/begin" => Some(bare(CommentKind::IgnoreBegin, suffix)),
        "ignore/end" => Some(bare(CommentKind::IgnoreEnd, suffix)),
        "file/owner" => Some(valued(CommentKind::FileOwner, directive, suffix, |v| {
            CommentValue::Owner(v.to_string())
        })),
        "rule/owner" => Some(valued(CommentKind::RuleOwner, directive, suffix, |v| {
            CommentValue::Owner(v.to_string())
        })),
        "file/disable" => Some(valued(CommentKind::FileDisable, directive, suffix, |v| {
            CommentValue::Disable(v.to_string())
        })),
        "disable" => Some(valued(CommentKind::Disable, directive, suffix, |v| {
            CommentValue::Disable(v.to_string())
        })),
        "file/snooze" => Some(snoozed(CommentKind::FileSnooze, directive, suffix)),
        "snooze" => Some(snoozed(CommentKind::Snooze, directive, suffix)),
        "rule/set" => Some(valued(CommentKind::RuleSet, directive, suffix, |v| {
            CommentValue::RuleSet(v.to_string())
        })),
        _ => None,
    }
}

/// Directive that takes no value: any suffix is an error.
fn bare(kind: CommentKind, suffix: &str) -> (CommentKind, CommentValue) {
    if suffix.is_empty() {
        (kind, CommentValue::None)
    } else {
        (
            CommentKind::Invalid,
            CommentValue::Invalid(format!("unexpected comment suffix: \"{}\"", suffix)),
        )
    }
}

/// Directive that requires a value.
fn valued<F>(
    kind: CommentKind,
    directive: &str,
    suffix: &str,
    build: F,
) -> (CommentKind, CommentValue)
where
    F: Fn(&str) -> CommentValue,
{
    if suffix.is_empty() {
        (
            CommentKind::Invalid,
            CommentValue::Invalid(format!("missing {} value", directive)),
        )
    } else {
        (kind, build(suffix))
    }
}

/// Snooze directives take `$TIME $MATCH`.
fn snoozed(kind: CommentKind, directive: &str, suffix: &str) -> (CommentKind, CommentValue) {
    if suffix.is_empty() {
        return (
            CommentKind::Invalid,
            CommentValue::Invalid(format!("missing {} value", directive)),
        );
    }
    let Some((time, matcher)) = suffix.split_once(char::is_whitespace) else {
        return (
            CommentKind::Invalid,
            CommentValue::Invalid(format!(
                "invalid snooze comment, expected '$TIME $MATCH' got \"{}\"",
                suffix
            )),
        );
    };
    let matcher = matcher.trim_start();
    match parse_until(time) {
        Ok(until) => (
            kind,
            CommentValue::Snooze(Snooze {
                until,
                matcher: matcher.to_string(),
            }),
        ),
        Err(err) => (
            CommentKind::Invalid,
            CommentValue::Invalid(format!("invalid snooze timestamp: {}", err)),
        ),
    }
}

/// Accepts an RFC 3339 timestamp or a plain date, which snoozes until
/// midnight UTC of that day.
fn parse_until(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")?;
    Ok(date.and_time(chrono::NaiveTime::MIN).and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn parse_one(text: &str) -> Option<Comment> {
        let mut comments = parse(1, text);
        assert!(comments.len() <= 1);
        comments.pop()
    }

    #[test]
    fn should_ignore_lines_without_directives() {
        assert_eq!(parse_one("code"), None);
        assert_eq!(parse_one("code # bob"), None);
        assert_eq!(parse_one("# rulelint   bamboozle me this"), None);
        assert_eq!(parse_one("# rulelint/xxx bamboozle"), None);
        assert_eq!(parse_one("# rulelint"), None);
    }

    #[test]
    fn should_parse_bare_ignore_directives() {
        for (text, kind) in [
            ("# rulelint ignore/file", CommentKind::IgnoreFile),
            ("# rulelint ignore/line", CommentKind::IgnoreLine),
            ("# rulelint ignore/next-line", CommentKind::IgnoreNextLine),
            ("# rulelint ignore/begin", CommentKind::IgnoreBegin),
            ("# rulelint ignore/end", CommentKind::IgnoreEnd),
        ] {
            let comment = parse_one(text).expect(text);
            assert_eq!(comment.kind, kind, "{text}");
            assert_eq!(comment.value, CommentValue::None, "{text}");
        }
    }

    #[test]
    fn should_reject_suffix_on_bare_directives() {
        let comment = parse_one("# rulelint ignore/file \t this file").unwrap();
        assert_eq!(comment.kind, CommentKind::Invalid);
        assert_eq!(
            comment.value,
            CommentValue::Invalid("unexpected comment suffix: \"this file\"".to_string())
        );
    }

    #[test]
    fn should_parse_owner_directives() {
        let comment = parse_one("# rulelint file/owner bob and alice").unwrap();
        assert_eq!(comment.kind, CommentKind::FileOwner);
        assert_eq!(comment.value, CommentValue::Owner("bob and alice".to_string()));

        let comment = parse_one("#   rulelint file/owner").unwrap();
        assert_eq!(comment.kind, CommentKind::Invalid);
        assert_eq!(
            comment.value,
            CommentValue::Invalid("missing file/owner value".to_string())
        );

        let comment = parse_one("# rulelint rule/owner bob").unwrap();
        assert_eq!(comment.kind, CommentKind::RuleOwner);
    }

    #[test]
    fn should_parse_disable_directives() {
        let comment =
            parse_one(r##"# rulelint disable promql/series(http_errors_total{label="this has spaces"})"##)
                .unwrap();
        assert_eq!(comment.kind, CommentKind::Disable);
        assert_eq!(
            comment.value,
            CommentValue::Disable(
                r#"promql/series(http_errors_total{label="this has spaces"})"#.to_string()
            )
        );

        let comment = parse_one("# rulelint file/disable promql/fragile").unwrap();
        assert_eq!(comment.kind, CommentKind::FileDisable);
    }

    #[test]
    fn should_parse_snooze_directives() {
        let comment = parse_one("# rulelint snooze 2023-12-31 promql/fragile").unwrap();
        assert_eq!(comment.kind, CommentKind::Snooze);
        assert_eq!(
            comment.value,
            CommentValue::Snooze(Snooze {
                until: Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap(),
                matcher: "promql/fragile".to_string(),
            })
        );

        let comment =
            parse_one("# rulelint file/snooze 2023-12-31T14:00:00Z promql/fragile").unwrap();
        assert_eq!(comment.kind, CommentKind::FileSnooze);
        assert_eq!(
            comment.value,
            CommentValue::Snooze(Snooze {
                until: Utc.with_ymd_and_hms(2023, 12, 31, 14, 0, 0).unwrap(),
                matcher: "promql/fragile".to_string(),
            })
        );
    }

    #[test]
    fn should_reject_malformed_snooze_directives() {
        let comment = parse_one("# rulelint snooze").unwrap();
        assert_eq!(
            comment.value,
            CommentValue::Invalid("missing snooze value".to_string())
        );

        let comment = parse_one("# rulelint snooze 2023-12-31").unwrap();
        assert_eq!(
            comment.value,
            CommentValue::Invalid(
                "invalid snooze comment, expected '$TIME $MATCH' got \"2023-12-31\"".to_string()
            )
        );

        let comment = parse_one("# rulelint snooze 2023-1231 promql/fragile").unwrap();
        assert_eq!(comment.kind, CommentKind::Invalid);
        assert!(matches!(
            &comment.value,
            CommentValue::Invalid(msg) if msg.starts_with("invalid snooze timestamp:")
        ));
    }

    #[test]
    fn should_parse_rule_set_directive() {
        let comment = parse_one("# rulelint rule/set promql/series(found) min-age foo").unwrap();
        assert_eq!(comment.kind, CommentKind::RuleSet);
        assert_eq!(
            comment.value,
            CommentValue::RuleSet("promql/series(found) min-age foo".to_string())
        );
    }

    #[test]
    fn should_track_offset_of_trailing_comments() {
        let comment = parse_one("code # rulelint disable xxx  ").unwrap();
        assert_eq!(comment.kind, CommentKind::Disable);
        assert_eq!(comment.value, CommentValue::Disable("xxx".to_string()));
        assert_eq!(comment.offset, "code ".len());

        let comment = parse_one("{#- comment #} # rulelint ignore/line").unwrap();
        assert_eq!(comment.kind, CommentKind::IgnoreLine);
        assert_eq!(comment.offset, "{#- comment #} ".len());
    }

    #[test]
    fn should_skip_unknown_directives_and_keep_scanning() {
        let text = "#rulelint # rulelint # rulelint boo # rulelint ignore/line";
        let comment = parse_one(text).unwrap();
        assert_eq!(comment.kind, CommentKind::IgnoreLine);
        assert_eq!(
            comment.offset,
            "#rulelint # rulelint # rulelint boo ".len()
        );
    }

    #[test]
    fn should_treat_second_directive_as_suffix() {
        let comment = parse_one("# rulelint ignore/line # rulelint ignore/file").unwrap();
        assert_eq!(comment.kind, CommentKind::Invalid);
        assert_eq!(
            comment.value,
            CommentValue::Invalid(
                "unexpected comment suffix: \"# rulelint ignore/file\"".to_string()
            )
        );
    }

    #[test]
    fn should_parse_multiple_lines() {
        let comments = parse(1, "code # rulelint disable xxx yyy \n # rulelint\tfile/owner bob");
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].kind, CommentKind::Disable);
        assert_eq!(comments[0].value, CommentValue::Disable("xxx yyy".to_string()));
        assert_eq!(comments[0].line, 1);
        assert_eq!(comments[1].kind, CommentKind::FileOwner);
        assert_eq!(comments[1].value, CommentValue::Owner("bob".to_string()));
        assert_eq!(comments[1].line, 2);
        assert_eq!(comments[1].offset, 1);
    }
}
