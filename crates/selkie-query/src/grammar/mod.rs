//! Selector grammar compiler.
//!
//! A grammar is a table of named pattern templates. A template refers to
//! another rule by writing its name in braces, e.g. `{Identifier}`. Compiling
//! expands every reference into a named capture region wrapping the referenced
//! rule's own expansion, producing one flat pattern whose captures still
//! describe the nested parse (see [`crate::capture`]).
//!
//! ```text
//! IdSelector = #{Identifier}
//! Identifier = -?[a-zA-Z_][a-zA-Z0-9_\-]*
//!
//! expand(IdSelector) = #(?<Identifier>-?[a-zA-Z_][a-zA-Z0-9_\-]*)
//! ```
//!
//! A brace group that does not name a rule in the table is left as literal
//! text, so `\u{A0}` survives expansion untouched.

mod matcher;
pub(crate) mod pattern;

use std::sync::LazyLock;

use indexmap::IndexMap;

use crate::capture::GrammarMatch;
use crate::error::{GrammarError, SelectError};
use matcher::{MatchOutcome, Program};

/// Rule names of the shipped selector grammar.
pub mod rules {
    /// Start rule: one or more comma-separated selectors.
    pub const GROUP_OF_SELECTORS: &str = "GroupOfSelectors";
    /// One comma-free selector.
    pub const SELECTOR: &str = "Selector";
    /// A combinator followed by the sequence to its right.
    pub const COMBINATOR_SEQ: &str = "CombinatorSeq";
    /// A run of simple selectors constraining one node.
    pub const SIMPLE_SELECTOR_SEQ: &str = "SimpleSelectorSeq";
    /// Attribute, id or pseudo-class selector.
    pub const SIMPLE_SELECTOR: &str = "SimpleSelector";
    /// Element type name.
    pub const TYPE_SELECTOR: &str = "TypeSelector";
    /// `*`
    pub const UNIVERSAL_SELECTOR: &str = "UniversalSelector";
    /// `[name]` or `[name op value]`.
    pub const ATTRIBUTE_SELECTOR: &str = "AttributeSelector";
    /// `#id`
    pub const ID_SELECTOR: &str = "IdSelector";
    /// `:name` or `:name(args)`.
    pub const PSEUDO_SELECTOR: &str = "PseudoSelector";
    /// `::name`
    pub const PSEUDO_ELEMENT: &str = "PseudoElement";
    /// Parenthesized pseudo-class arguments.
    pub const PSEUDO_ARGS: &str = "PseudoArgs";
    /// Attribute comparison operator.
    pub const COMPARISON_OP: &str = "ComparisonOp";
    /// Structural combinator token.
    pub const COMBINATOR: &str = "Combinator";
    /// CSS-style identifier.
    pub const IDENTIFIER: &str = "Identifier";
    /// Attribute comparison value.
    pub const ATTRIBUTE_VALUE: &str = "AttributeValue";
    /// Single- or double-quoted string.
    pub const QUOTED_STRING: &str = "QuotedString";
}

/// An ordered table of named pattern templates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleTable {
    rules: IndexMap<String, String>,
}

impl RuleTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The shipped selector grammar.
    #[must_use]
    pub fn selectors() -> Self {
        use rules::{
            ATTRIBUTE_SELECTOR, ATTRIBUTE_VALUE, COMBINATOR, COMBINATOR_SEQ, COMPARISON_OP,
            GROUP_OF_SELECTORS, ID_SELECTOR, IDENTIFIER, PSEUDO_ARGS, PSEUDO_ELEMENT,
            PSEUDO_SELECTOR, QUOTED_STRING, SELECTOR, SIMPLE_SELECTOR, SIMPLE_SELECTOR_SEQ,
            TYPE_SELECTOR, UNIVERSAL_SELECTOR,
        };

        [
            (GROUP_OF_SELECTORS, r"^\s*{Selector}(\s*,\s*{Selector})*\s*$"),
            (SELECTOR, "{SimpleSelectorSeq}{CombinatorSeq}*{PseudoElement}?"),
            (COMBINATOR_SEQ, r"\s*{Combinator}\s*{SimpleSelectorSeq}"),
            (
                SIMPLE_SELECTOR_SEQ,
                "({TypeSelector}|{UniversalSelector}){SimpleSelector}*|{SimpleSelector}+",
            ),
            (
                SIMPLE_SELECTOR,
                "{AttributeSelector}|{IdSelector}|{PseudoSelector}",
            ),
            (TYPE_SELECTOR, "{Identifier}"),
            (UNIVERSAL_SELECTOR, r"\*"),
            (
                ATTRIBUTE_SELECTOR,
                r"\[\s*{Identifier}(\s*{ComparisonOp}\s*{AttributeValue})?\s*\]",
            ),
            (ID_SELECTOR, "#{Identifier}"),
            (PSEUDO_SELECTOR, ":{Identifier}{PseudoArgs}?"),
            (PSEUDO_ELEMENT, "::{Identifier}"),
            (PSEUDO_ARGS, r#"\(({QuotedString}|[^)'"])*\)"#),
            (COMPARISON_OP, "[~^$*|!]?="),
            (COMBINATOR, r"[\s>+~]"),
            (
                IDENTIFIER,
                r"-?[a-zA-Z_\u{A0}-\u{10FFFF}][a-zA-Z0-9_\-\u{A0}-\u{10FFFF}]*",
            ),
            (ATTRIBUTE_VALUE, "{Identifier}|{QuotedString}"),
            (
                QUOTED_STRING,
                r#""(?:[^\\"\r\n]|\\\r\n|\\.)*"|'(?:[^\\'\r\n]|\\\r\n|\\.)*'"#,
            ),
        ]
        .into_iter()
        .collect()
    }

    /// Add a rule, returning the template it replaced.
    pub fn insert(&mut self, name: impl Into<String>, template: impl Into<String>) -> Option<String> {
        self.rules.insert(name.into(), template.into())
    }

    /// Builder form of [`RuleTable::insert`].
    #[must_use]
    pub fn with_rule(mut self, name: impl Into<String>, template: impl Into<String>) -> Self {
        let _ = self.insert(name, template);
        self
    }

    /// The template of a rule.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.rules.get(name).map(String::as_str)
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the table has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Expand `start` into pattern text with every rule reference replaced.
    ///
    /// The start rule itself is not wrapped in a capture region.
    ///
    /// # Errors
    ///
    /// [`GrammarError::UnknownRule`] if `start` is not in the table, and
    /// [`GrammarError::Cycle`] if expansion would re-enter a rule.
    pub fn expand(&self, start: &str) -> Result<String, GrammarError> {
        let mut out = String::new();
        let mut stack = Vec::new();
        self.expand_into(start, &mut out, &mut stack)?;
        Ok(out)
    }

    fn expand_into(
        &self,
        rule: &str,
        out: &mut String,
        stack: &mut Vec<String>,
    ) -> Result<(), GrammarError> {
        let template = self
            .get(rule)
            .ok_or_else(|| GrammarError::UnknownRule(rule.to_string()))?;
        stack.push(rule.to_string());

        let mut rest = template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let reference = after
                .find('}')
                .map(|close| &after[..close])
                .filter(|name| self.rules.contains_key(*name));

            let Some(name) = reference else {
                out.push('{');
                rest = after;
                continue;
            };
            if stack.iter().any(|entered| entered == name) {
                let mut chain = stack.clone();
                chain.push(name.to_string());
                return Err(GrammarError::Cycle {
                    rule: name.to_string(),
                    chain,
                });
            }

            out.push_str("(?<");
            out.push_str(name);
            out.push('>');
            self.expand_into(name, out, stack)?;
            out.push(')');
            rest = &after[name.len() + 1..];
        }
        out.push_str(rest);

        let _ = stack.pop();
        Ok(())
    }

    /// Compile the grammar rooted at `start`.
    ///
    /// # Errors
    ///
    /// See [`compile`].
    pub fn compile(&self, start: &str) -> Result<CompiledGrammar, GrammarError> {
        compile(self, start)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RuleTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            rules: iter
                .into_iter()
                .map(|(name, template)| (name.into(), template.into()))
                .collect(),
        }
    }
}

/// Compile the grammar rooted at `start` into a matcher.
///
/// # Errors
///
/// [`GrammarError::UnknownRule`] or [`GrammarError::Cycle`] from expansion,
/// and [`GrammarError::Pattern`] if the expanded text is not a valid pattern.
pub fn compile(table: &RuleTable, start: &str) -> Result<CompiledGrammar, GrammarError> {
    let source = table.expand(start)?;
    let program = Program::compile(&pattern::parse(&source)?);
    tracing::debug!(start, pattern_len = source.len(), "compiled grammar");
    Ok(CompiledGrammar {
        start: start.to_string(),
        source,
        program,
    })
}

static SELECTORS: LazyLock<CompiledGrammar> = LazyLock::new(|| {
    compile(&RuleTable::selectors(), rules::GROUP_OF_SELECTORS)
        .expect("shipped selector grammar is valid")
});

/// An immutable, compiled grammar.
#[derive(Debug, Clone)]
pub struct CompiledGrammar {
    start: String,
    source: String,
    program: Program,
}

impl CompiledGrammar {
    /// The shipped selector grammar, compiled on first use.
    ///
    /// # Panics
    ///
    /// Never in practice: the shipped table is covered by tests.
    #[must_use]
    pub fn selectors() -> &'static Self {
        &SELECTORS
    }

    /// Name of the start rule.
    #[must_use]
    pub fn start_rule(&self) -> &str {
        &self.start
    }

    /// The fully expanded pattern text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Match the whole of `input`, recording every capture.
    ///
    /// # Errors
    ///
    /// [`SelectError::Syntax`] if `input` does not match, and
    /// [`SelectError::TooComplex`] if matching ran out of budget.
    pub fn match_full<'i>(&self, input: &'i str) -> Result<GrammarMatch<'i>, SelectError> {
        match matcher::match_full(&self.program, input) {
            MatchOutcome::Matched(captures) => Ok(GrammarMatch::new(input, captures)),
            MatchOutcome::NoMatch => Err(SelectError::Syntax {
                selector: input.to_string(),
            }),
            MatchOutcome::Exhausted => Err(SelectError::TooComplex {
                selector: input.to_string(),
            }),
        }
    }
}
