//! Compiled event-name patterns.
//!
//! A pattern is split on `.` once, at subscribe time. `*` matches exactly
//! one segment, `**` matches whatever remains of the name (including
//! nothing), anything else must match literally.

use std::fmt;

/// One segment of a compiled pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    /// `*`: exactly one segment.
    Single,
    /// `**`: the rest of the name.
    Rest,
}

/// A pattern compiled into segment matchers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Compile a pattern. Never fails: malformed patterns just never match.
    pub fn compile(raw: &str) -> Self {
        let segments = raw
            .split('.')
            .map(|s| match s {
                "*" => Segment::Single,
                "**" => Segment::Rest,
                literal => Segment::Literal(literal.to_string()),
            })
            .collect();
        Self {
            raw: raw.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// True if any segment is `*` or `**`.
    pub fn is_wildcard(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Single | Segment::Rest))
    }

    /// Test an event name against this pattern.
    pub fn matches(&self, name: &str) -> bool {
        let mut parts = name.split('.');
        for segment in &self.segments {
            match segment {
                Segment::Rest => return true,
                Segment::Single => {
                    if parts.next().is_none() {
                        return false;
                    }
                }
                Segment::Literal(lit) => match parts.next() {
                    Some(part) if part == lit => {}
                    _ => return false,
                },
            }
        }
        // Pattern exhausted without `**`: the name must be exhausted too.
        parts.next().is_none()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for Pattern {
    fn from(raw: &str) -> Self {
        Self::compile(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(pattern: &str, name: &str) -> bool {
        Pattern::compile(pattern).matches(name)
    }

    #[test]
    fn literal_matches_only_itself() {
        assert!(m("graph.node.selected", "graph.node.selected"));
        assert!(!m("graph.node.selected", "graph.node"));
        assert!(!m("graph.node", "graph.node.selected"));
        assert!(!m("graph.node.selected", "graph.node.deselected"));
    }

    #[test]
    fn single_wildcard_matches_exactly_one_segment() {
        assert!(m("a.*.c", "a.b.c"));
        assert!(!m("a.*.c", "a.b.d.c"));
        assert!(!m("a.*.c", "a.c"));
        assert!(m("node.*", "node.selected"));
        assert!(!m("node.*", "node"));
    }

    #[test]
    fn rest_wildcard_matches_any_remainder() {
        assert!(m("a.**", "a"));
        assert!(m("a.**", "a.b"));
        assert!(m("a.**", "a.b.c"));
        assert!(!m("a.**", "b.c"));
        assert!(m("**", "anything.at.all"));
    }

    #[test]
    fn rest_wildcard_short_circuits_mid_pattern() {
        // Segments after `**` are never consulted.
        assert!(m("a.**.z", "a.b.c"));
    }

    #[test]
    fn malformed_patterns_do_not_match_ordinary_names() {
        assert!(!m("a..b", "a.b"));
        assert!(!m("", "a"));
        assert!(!m("a.", "a"));
    }

    #[test]
    fn is_wildcard_detects_placeholders() {
        assert!(!Pattern::compile("a.b").is_wildcard());
        assert!(Pattern::compile("a.*").is_wildcard());
        assert!(Pattern::compile("**").is_wildcard());
        // Only whole-segment stars count.
        assert!(!Pattern::compile("a.b*").is_wildcard());
    }

    #[test]
    fn compile_keeps_raw_text() {
        let p = Pattern::compile("dataset.*.uploaded");
        assert_eq!(p.as_str(), "dataset.*.uploaded");
        assert_eq!(p.to_string(), "dataset.*.uploaded");
        assert_eq!(
            p.segments(),
            &[
                Segment::Literal("dataset".to_string()),
                Segment::Single,
                Segment::Literal("uploaded".to_string()),
            ]
        );
    }
}
