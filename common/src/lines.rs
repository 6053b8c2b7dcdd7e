//! Line range tracking for diagnostics.

use serde::{Deserialize, Serialize};

/// Inclusive range of 1-based line numbers inside a rule file.
///
/// # Example
///
/// ```
/// use common::LineRange;
///
/// let lines = LineRange::new(2, 4);
/// assert_eq!(lines.expand(), vec![2, 3, 4]);
/// assert_eq!(lines.to_string(), "2-4");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineRange {
    pub first: usize,
    pub last: usize,
}

impl LineRange {
    pub fn new(first: usize, last: usize) -> Self {
        Self { first, last }
    }

    /// Range covering a single line.
    pub fn single(line: usize) -> Self {
        Self {
            first: line,
            last: line,
        }
    }

    /// All line numbers covered by this range.
    pub fn expand(&self) -> Vec<usize> {
        (self.first..=self.last).collect()
    }

    /// Smallest range covering both `self` and `other`.
    pub fn union(&self, other: &LineRange) -> LineRange {
        LineRange {
            first: self.first.min(other.first),
            last: self.last.max(other.last),
        }
    }
}

impl std::fmt::Display for LineRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.first == self.last {
            write!(f, "{}", self.first)
        } else {
            write!(f, "{}-{}", self.first, self.last)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_expand_to_all_covered_lines() {
        assert_eq!(LineRange::new(1, 3).expand(), vec![1, 2, 3]);
        assert_eq!(LineRange::single(7).expand(), vec![7]);
    }

    #[test]
    fn should_format_single_line_without_dash() {
        assert_eq!(LineRange::single(5).to_string(), "5");
        assert_eq!(LineRange::new(2, 9).to_string(), "2-9");
    }

    #[test]
    fn should_union_overlapping_and_disjoint_ranges() {
        assert_eq!(
            LineRange::new(1, 3).union(&LineRange::new(2, 8)),
            LineRange::new(1, 8)
        );
        assert_eq!(
            LineRange::single(4).union(&LineRange::single(2)),
            LineRange::new(2, 4)
        );
    }
}
