//! Edit requests as produced by normalization and escaping code.
//!
//! An [`Edit`] is a `(start, end, replacement)` triple in the coordinates of
//! the layer it will be applied to. A batch of edits is applied with
//! [`Layer::apply_edits`](crate::Layer::apply_edits), or onto a fresh layer
//! with [`Layer::rewrite`](crate::Layer::rewrite).

use regex::Regex;

use crate::interval::Interval;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub span: Interval,
    pub replacement: String,
}

impl Edit {
    pub fn new(start: usize, end: usize, replacement: impl Into<String>) -> Self {
        Self {
            span: Interval::new(start, end),
            replacement: replacement.into(),
        }
    }

    #[must_use]
    pub fn delete(start: usize, end: usize) -> Self {
        Self::new(start, end, String::new())
    }

    pub fn insert(pos: usize, text: impl Into<String>) -> Self {
        Self::new(pos, pos, text)
    }

    /// One edit per match of `regex` in `text`.
    ///
    /// `replacement` may reference capture groups (`$1`, `${name}`), as in
    /// [`Regex::replace_all`]. Matches whose replacement equals the matched
    /// text are skipped so untouched text stays aligned one to one.
    #[must_use]
    pub fn from_regex(text: &str, regex: &Regex, replacement: &str) -> Vec<Edit> {
        regex
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let mut expanded = String::new();
                caps.expand(replacement, &mut expanded);
                (expanded != whole.as_str())
                    .then(|| Edit::new(whole.start(), whole.end(), expanded))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{AlignError, Layer};

    #[test]
    fn regex_edits_expand_captures() {
        let re = Regex::new(r"(\w+)-\s+(\w+)").unwrap();
        let edits = Edit::from_regex("a hyphen- ated word", &re, "$1$2");
        assert_eq!(edits, vec![Edit::new(2, 14, "hyphenated")]);
    }

    #[test]
    fn regex_edits_skip_identity_matches() {
        let re = Regex::new(r"\s+").unwrap();
        let edits = Edit::from_regex("a b  c", &re, " ");
        assert_eq!(edits, vec![Edit::new(3, 5, " ")]);
    }

    #[test]
    fn batch_edits_use_original_coordinates() {
        let base = Layer::new("x &lt; y &amp;&amp; z");
        let re = Regex::new(r"&(lt|amp);").unwrap();
        let edits: Vec<Edit> = re
            .find_iter(&base.text())
            .map(|m| {
                let replacement = if m.as_str() == "&lt;" { "<" } else { "&" };
                Edit::new(m.start(), m.end(), replacement)
            })
            .collect();
        let unescaped = base.rewrite(edits).unwrap();
        assert_eq!(&*unescaped.text(), "x < y && z");
        assert_eq!(
            unescaped.resolve(Interval::new(6, 8)),
            Ok(Interval::new(9, 19))
        );
    }

    #[test]
    fn inserts_at_one_position_keep_their_order() {
        let mut base = Layer::new("ab");
        base.apply_edits([Edit::insert(1, "1"), Edit::insert(1, "2")])
            .unwrap();
        assert_eq!(&*base.text(), "a12b");
    }

    #[test]
    fn insert_next_to_a_replacement() {
        let mut base = Layer::new("abcd");
        let applied = base
            .apply_edits([
                Edit::new(1, 3, "X"),
                Edit::insert(3, "+"),
                Edit::insert(1, "-"),
            ])
            .unwrap();
        assert_eq!(applied, 3);
        assert_eq!(&*base.text(), "a-X+d");
    }

    #[test]
    fn overlapping_edits_are_rejected_up_front() {
        let mut base = Layer::new("abcdef");
        let result = base.apply_edits([Edit::delete(0, 3), Edit::delete(2, 4)]);
        assert_eq!(
            result,
            Err(AlignError::OverlappingEdits {
                first: Interval::new(0, 3),
                second: Interval::new(2, 4),
            })
        );
        assert_eq!(&*base.text(), "abcdef");
    }

    #[test]
    fn out_of_range_batch_changes_nothing() {
        let mut base = Layer::new("abc");
        let result = base.apply_edits([Edit::delete(0, 1), Edit::delete(2, 9)]);
        assert!(matches!(result, Err(AlignError::OutOfBounds { .. })));
        assert_eq!(&*base.text(), "abc");
    }
}
