//! Capture geometry.
//!
//! A grammar match is one flat list of named spans. Nesting is recovered by
//! containment: the `AttributeSelector` captures belonging to a given
//! `SimpleSelectorSeq` are exactly those whose span lies inside it.

use std::sync::Arc;

/// One completed named capture: the rule that matched and its byte span.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Capture {
    /// Name of the grammar rule that produced this span.
    pub rule: Arc<str>,
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
}

impl Capture {
    /// Create a capture for `rule` over `start..end`.
    #[must_use]
    pub fn new(rule: Arc<str>, start: usize, end: usize) -> Self {
        Self { rule, start, end }
    }

    /// Whether `other` lies entirely within this capture's span.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// Filter `captures` down to those fully contained in `region`.
///
/// Order is preserved, so sorted input yields sorted output.
pub fn within<'c>(
    captures: impl IntoIterator<Item = &'c Capture>,
    region: &Capture,
) -> impl Iterator<Item = &'c Capture> {
    captures
        .into_iter()
        .filter(move |capture| region.contains(capture))
}

/// The outcome of matching a compiled grammar against a complete input.
#[derive(Debug, Clone)]
pub struct GrammarMatch<'i> {
    input: &'i str,
    captures: Vec<Capture>,
}

impl<'i> GrammarMatch<'i> {
    pub(crate) fn new(input: &'i str, captures: Vec<Capture>) -> Self {
        Self { input, captures }
    }

    /// The matched input.
    #[must_use]
    pub fn input(&self) -> &'i str {
        self.input
    }

    /// Every capture, sorted by start offset with enclosing captures first.
    #[must_use]
    pub fn all(&self) -> &[Capture] {
        &self.captures
    }

    /// All captures of `rule`, anywhere in the input.
    pub fn captures<'m>(&'m self, rule: &str) -> impl Iterator<Item = &'m Capture> {
        self.captures.iter().filter(move |c| &*c.rule == rule)
    }

    /// Captures of `rule` lying within `region`.
    pub fn subcaptures<'m>(
        &'m self,
        rule: &str,
        region: &Capture,
    ) -> impl Iterator<Item = &'m Capture> {
        within(self.captures(rule), region)
    }

    /// The first capture of `rule` within `region`, if any.
    #[must_use]
    pub fn first_within(&self, rule: &str, region: &Capture) -> Option<&Capture> {
        self.subcaptures(rule, region).next()
    }

    /// The input text covered by `capture`.
    #[must_use]
    pub fn text(&self, capture: &Capture) -> &'i str {
        &self.input[capture.start..capture.end]
    }
}
