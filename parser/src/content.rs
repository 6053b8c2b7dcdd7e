//! Pre-YAML content pass.
//!
//! Before the rule file is decoded it goes through a line-oriented pass
//! that collects control comments and applies the `ignore/*` directives.
//! Ignored lines are blanked rather than removed so that every line number
//! in the processed body still matches the original file.

use crate::comments::{self, Comment, CommentKind};

/// Result of the content pass.
#[derive(Debug, Clone)]
pub struct Content {
    /// File body with ignored lines blanked out.
    pub body: String,
    /// Number of lines in the original input.
    pub total_lines: usize,
    /// All control comments found, in file order.
    pub comments: Vec<Comment>,
    /// True if the whole file is excluded by `ignore/file`.
    pub ignored: bool,
    /// Line of the `ignore/file` comment, when `ignored` is true.
    pub ignore_line: usize,
}

/// Run the content pass over a whole file.
pub fn read(input: &str) -> Content {
    let lines: Vec<&str> = input.lines().collect();
    let total_lines = lines.len();

    let mut comments_found = Vec::new();
    let mut ignored = false;
    let mut ignore_line = 0;
    let mut skip_lines = vec![false; total_lines];

    let mut in_ignore_block = false;
    let mut skip_next = false;

    for (i, line) in lines.iter().enumerate() {
        let comment = comments::parse_line(i + 1, line);

        if skip_next {
            skip_lines[i] = true;
            skip_next = false;
        }
        if in_ignore_block {
            skip_lines[i] = true;
        }

        let Some(comment) = comment else {
            continue;
        };
        match comment.kind {
            CommentKind::IgnoreFile => {
                if !ignored {
                    ignored = true;
                    ignore_line = comment.line;
                }
            }
            CommentKind::IgnoreLine => {
                skip_lines[i] = true;
            }
            CommentKind::IgnoreNextLine => {
                skip_next = true;
            }
            CommentKind::IgnoreBegin => {
                in_ignore_block = true;
            }
            CommentKind::IgnoreEnd => {
                in_ignore_block = false;
            }
            _ => {}
        }
        comments_found.push(comment);
    }

    let mut body = String::with_capacity(input.len());
    for (i, line) in lines.iter().enumerate() {
        if !skip_lines[i] {
            body.push_str(line);
        }
        body.push('\n');
    }

    Content {
        body,
        total_lines,
        comments: comments_found,
        ignored,
        ignore_line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_keep_plain_content_untouched() {
        let content = read("- record: foo\n  expr: up\n");
        assert_eq!(content.body, "- record: foo\n  expr: up\n");
        assert_eq!(content.total_lines, 2);
        assert!(!content.ignored);
        assert!(content.comments.is_empty());
    }

    #[test]
    fn should_blank_ignored_lines() {
        let input = "- record: foo\n  expr: up\n- record: bar # rulelint ignore/line\n";
        let content = read(input);
        assert_eq!(content.body, "- record: foo\n  expr: up\n\n");
        assert_eq!(content.total_lines, 3);
    }

    #[test]
    fn should_blank_next_line_after_ignore_next_line() {
        let input = "# rulelint ignore/next-line\nbroken yaml here\n- record: foo\n  expr: up\n";
        let content = read(input);
        assert_eq!(
            content.body,
            "# rulelint ignore/next-line\n\n- record: foo\n  expr: up\n"
        );
    }

    #[test]
    fn should_blank_ignore_blocks() {
        let input = "\
- record: foo
  expr: up
# rulelint ignore/begin
- record: bar
  expr: broken(
# rulelint ignore/end
- record: baz
  expr: up
";
        let content = read(input);
        let lines: Vec<&str> = content.body.lines().collect();
        assert_eq!(lines[0], "- record: foo");
        assert_eq!(lines[3], "");
        assert_eq!(lines[4], "");
        assert_eq!(lines[5], "");
        assert_eq!(lines[6], "- record: baz");
    }

    #[test]
    fn should_flag_ignored_files() {
        let content = read("# rulelint ignore/file\n- record: foo\n  expr: up\n");
        assert!(content.ignored);
        assert_eq!(content.ignore_line, 1);
    }

    #[test]
    fn should_collect_comments_in_order() {
        let input = "# rulelint file/owner bob\n- record: foo # rulelint disable promql/fragile\n  expr: up\n";
        let content = read(input);
        assert_eq!(content.comments.len(), 2);
        assert_eq!(content.comments[0].kind, CommentKind::FileOwner);
        assert_eq!(content.comments[0].line, 1);
        assert_eq!(content.comments[1].kind, CommentKind::Disable);
        assert_eq!(content.comments[1].line, 2);
    }
}
