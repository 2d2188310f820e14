//! Error types for grammar compilation and selector evaluation.

use thiserror::Error;

/// Failure to compile a grammar rule table into a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    /// The requested rule is not in the table.
    #[error("unknown grammar rule `{0}`")]
    UnknownRule(String),

    /// A rule references itself, directly or through other rules.
    #[error("grammar rule `{rule}` is recursive: {}", .chain.join(" -> "))]
    Cycle {
        /// The rule whose expansion re-entered itself.
        rule: String,
        /// The chain of rule names from the start rule back to `rule`.
        chain: Vec<String>,
    },

    /// The expanded pattern text is not valid pattern syntax.
    #[error("invalid pattern at byte {offset}: {message}")]
    Pattern {
        /// Byte offset into the fully expanded pattern.
        offset: usize,
        /// What the pattern parser expected.
        message: String,
    },
}

/// Failure to parse or evaluate a selector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectError {
    /// The selector text does not match the grammar.
    #[error("invalid selector `{selector}`")]
    Syntax {
        /// The full selector text.
        selector: String,
    },

    /// Matching the selector exceeded the backtracking budget.
    #[error("selector `{selector}` is too complex to parse")]
    TooComplex {
        /// The full selector text.
        selector: String,
    },

    /// A pseudo-class or pseudo-element was rejected by the active conventions.
    #[error("unsupported selector `{text}`: pseudo-classes and pseudo-elements have no matching semantics")]
    Unsupported {
        /// The pseudo selector as written.
        text: String,
    },

    /// An attribute selector has a comparison operator but no value.
    #[error("attribute selector `{text}` has a comparison operator but no value")]
    Malformed {
        /// The attribute selector as written.
        text: String,
    },

    /// The grammar produced a token the evaluator cannot interpret.
    ///
    /// Unreachable with the shipped grammar; a custom rule table whose
    /// `ComparisonOp` or `Combinator` rules accept more than the evaluator
    /// understands ends up here.
    #[error("grammar rule `{rule}` matched `{text}`, which the evaluator does not understand")]
    GrammarMismatch {
        /// The grammar rule that produced the token.
        rule: &'static str,
        /// The token text.
        text: String,
    },
}
