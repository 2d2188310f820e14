//! Selector parsing and evaluation.
//!
//! A selector string is matched once against the compiled grammar. The flat
//! capture list is then folded into typed selectors by containment, and each
//! comma-separated alternative is evaluated right to left against the tree
//! index.
//!
//! ```text
//! "a > b[k='v'] c"
//!
//! Selector
//! ├── SimpleSelectorSeq  a
//! ├── Combinator         >
//! ├── SimpleSelectorSeq  b[k='v']
//! ├── Combinator         ' '
//! └── SimpleSelectorSeq  c          <- anchor, its survivors are the result
//! ```

use std::collections::btree_set;
use std::fmt;
use std::iter::successors;
use std::vec;

use strum_macros::{Display, EnumString};

use crate::capture::{Capture, GrammarMatch};
use crate::conventions::PseudoPolicy;
use crate::error::SelectError;
use crate::grammar::{rules, CompiledGrammar};
use crate::index::{MatchSet, TreeIndex};
use crate::tree::Tree;

/// Structural relation between two compound selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum Combinator {
    /// `A B`: B has some strict ancestor matching A.
    #[strum(serialize = " ")]
    Descendant,
    /// `A > B`: B's parent matches A.
    #[strum(serialize = ">")]
    Child,
    /// `A + B`: the element immediately before B matches A.
    #[strum(serialize = "+")]
    NextSibling,
    /// `A ~ B`: some element before B among its siblings matches A.
    #[strum(serialize = "~")]
    SubsequentSibling,
}

impl Combinator {
    /// Interpret a combinator token. Any run of whitespace is a descendant
    /// combinator.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        if !token.is_empty() && token.chars().all(char::is_whitespace) {
            return Some(Self::Descendant);
        }
        token.parse().ok()
    }
}

/// Attribute value comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum ComparisonOp {
    /// `[k=v]`: value equals the literal.
    #[strum(serialize = "=")]
    Equals,
    /// `[k~=v]`: the literal is one whitespace-separated word of the value.
    #[strum(serialize = "~=")]
    Includes,
    /// `[k|=v]`: value equals the literal or starts with it followed by `-`.
    #[strum(serialize = "|=")]
    DashMatch,
    /// `[k^=v]`: value starts with the literal.
    #[strum(serialize = "^=")]
    Prefix,
    /// `[k$=v]`: value ends with the literal.
    #[strum(serialize = "$=")]
    Suffix,
    /// `[k*=v]`: value contains the literal.
    #[strum(serialize = "*=")]
    Substring,
    /// `[k!=v]`: value does not contain the literal.
    #[strum(serialize = "!=")]
    NotContains,
}

impl ComparisonOp {
    /// Compare an attribute `value` against the unquoted `literal`.
    #[must_use]
    pub fn matches(self, value: &str, literal: &str) -> bool {
        match self {
            Self::Equals => value == literal,
            Self::Includes => {
                !literal.is_empty() && value.split_whitespace().any(|word| word == literal)
            }
            Self::DashMatch => {
                value == literal
                    || value
                        .strip_prefix(literal)
                        .is_some_and(|rest| rest.starts_with('-'))
            }
            Self::Prefix => value.starts_with(literal),
            Self::Suffix => value.ends_with(literal),
            Self::Substring => value.contains(literal),
            Self::NotContains => !value.contains(literal),
        }
    }
}

/// `[name]` or `[name op value]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSelector {
    /// Attribute name, compared exactly.
    pub name: String,
    /// Operator and unquoted, unescaped literal.
    pub comparison: Option<(ComparisonOp, String)>,
}

/// `:name` or `:name(args)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PseudoSelector {
    /// Pseudo-class name.
    pub name: String,
    /// Raw text between the parentheses.
    pub args: Option<String>,
}

/// A single condition on one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimpleSelector {
    /// Element type name.
    Type(String),
    /// `*`
    Universal,
    /// `#id`
    Id(String),
    /// Attribute presence or comparison.
    Attribute(AttributeSelector),
    /// Pseudo-class; recognized but never filters.
    Pseudo(PseudoSelector),
}

/// Simple selectors that all apply to the same element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompoundSelector {
    /// The conditions, in source order.
    pub simple_selectors: Vec<SimpleSelector>,
}

/// One comma-free selector: compounds joined by combinators.
///
/// `combinators[i]` joins `compounds[i]` to `compounds[i + 1]`; the last
/// compound is the anchor whose matches are returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexSelector {
    /// Compound selectors, left to right.
    pub compounds: Vec<CompoundSelector>,
    /// Combinators, left to right; always one fewer than `compounds`.
    pub combinators: Vec<Combinator>,
    /// Trailing `::name`, recognized but never filters.
    pub pseudo_element: Option<String>,
}

/// A parsed, comma-separated selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorGroup {
    /// The alternatives in source order.
    pub selectors: Vec<ComplexSelector>,
}

impl SelectorGroup {
    /// Every pseudo-class and pseudo-element, written back as selector text.
    pub fn pseudo_components(&self) -> impl Iterator<Item = String> + '_ {
        self.selectors.iter().flat_map(|selector| {
            let classes = selector
                .compounds
                .iter()
                .flat_map(|compound| &compound.simple_selectors)
                .filter_map(|simple| match simple {
                    SimpleSelector::Pseudo(pseudo) => Some(pseudo.to_string()),
                    _ => None,
                });
            let element = selector
                .pseudo_element
                .iter()
                .map(|name| format!("::{name}"));
            classes.chain(element)
        })
    }

    /// Apply `policy` to the group's pseudo selectors.
    ///
    /// # Errors
    ///
    /// [`SelectError::Unsupported`] for the first pseudo selector found when
    /// the policy is [`PseudoPolicy::Reject`].
    pub fn check_pseudo(&self, policy: PseudoPolicy) -> Result<(), SelectError> {
        for text in self.pseudo_components() {
            match policy {
                PseudoPolicy::Reject => return Err(SelectError::Unsupported { text }),
                PseudoPolicy::Ignore => {
                    let _ = selkie_common::warning::warn_once(
                        "select",
                        &format!("pseudo selector `{text}` has no matching semantics; ignored"),
                    );
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for PseudoSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.name)?;
        if let Some(args) = &self.args {
            write!(f, "({args})")?;
        }
        Ok(())
    }
}

impl fmt::Display for SimpleSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type(tag) => f.write_str(tag),
            Self::Universal => f.write_str("*"),
            Self::Id(id) => write!(f, "#{id}"),
            Self::Attribute(AttributeSelector { name, comparison }) => match comparison {
                None => write!(f, "[{name}]"),
                Some((op, literal)) => write!(f, "[{name}{op}{literal:?}]"),
            },
            Self::Pseudo(pseudo) => fmt::Display::fmt(pseudo, f),
        }
    }
}

impl fmt::Display for ComplexSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, compound) in self.compounds.iter().enumerate() {
            if i > 0 {
                match self.combinators.get(i - 1) {
                    Some(Combinator::Descendant) | None => f.write_str(" ")?,
                    Some(combinator) => write!(f, " {combinator} ")?,
                }
            }
            for simple in &compound.simple_selectors {
                fmt::Display::fmt(simple, f)?;
            }
        }
        if let Some(name) = &self.pseudo_element {
            write!(f, "::{name}")?;
        }
        Ok(())
    }
}

// ========== parsing ==========

/// Parse `text` with `grammar` into typed selectors.
///
/// # Errors
///
/// [`SelectError::Syntax`] if the text does not match the grammar,
/// [`SelectError::TooComplex`] if matching ran out of budget, and
/// [`SelectError::Malformed`] or [`SelectError::GrammarMismatch`] if a custom
/// grammar produced captures the evaluator cannot interpret.
pub fn parse_selector_group(
    grammar: &CompiledGrammar,
    text: &str,
) -> Result<SelectorGroup, SelectError> {
    let matched = grammar.match_full(text)?;
    let selectors = matched
        .captures(rules::SELECTOR)
        .map(|selector| parse_complex(&matched, selector))
        .collect::<Result<Vec<_>, _>>()?;
    if selectors.is_empty() {
        return Err(SelectError::Syntax {
            selector: text.to_string(),
        });
    }
    Ok(SelectorGroup { selectors })
}

fn mismatch(rule: &'static str, text: &str) -> SelectError {
    SelectError::GrammarMismatch {
        rule,
        text: text.to_string(),
    }
}

fn parse_complex(m: &GrammarMatch<'_>, selector: &Capture) -> Result<ComplexSelector, SelectError> {
    let compounds = m
        .subcaptures(rules::SIMPLE_SELECTOR_SEQ, selector)
        .map(|seq| parse_compound(m, seq))
        .collect::<Result<Vec<_>, _>>()?;
    let combinators = m
        .subcaptures(rules::COMBINATOR, selector)
        .map(|token| {
            let text = m.text(token);
            Combinator::from_token(text).ok_or_else(|| mismatch(rules::COMBINATOR, text))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if compounds.is_empty() || combinators.len() + 1 != compounds.len() {
        return Err(mismatch(rules::SELECTOR, m.text(selector)));
    }

    let pseudo_element = m
        .first_within(rules::PSEUDO_ELEMENT, selector)
        .map(|element| identifier_in(m, element, rules::PSEUDO_ELEMENT))
        .transpose()?;

    Ok(ComplexSelector {
        compounds,
        combinators,
        pseudo_element,
    })
}

fn parse_compound(m: &GrammarMatch<'_>, seq: &Capture) -> Result<CompoundSelector, SelectError> {
    let mut simple_selectors = Vec::new();
    for capture in m.all().iter().filter(|c| seq.contains(c)) {
        let simple = match &*capture.rule {
            rules::TYPE_SELECTOR => SimpleSelector::Type(m.text(capture).to_string()),
            rules::UNIVERSAL_SELECTOR => SimpleSelector::Universal,
            rules::ID_SELECTOR => {
                SimpleSelector::Id(identifier_in(m, capture, rules::ID_SELECTOR)?)
            }
            rules::ATTRIBUTE_SELECTOR => {
                SimpleSelector::Attribute(parse_attribute(m, capture)?)
            }
            rules::PSEUDO_SELECTOR => SimpleSelector::Pseudo(PseudoSelector {
                name: identifier_in(m, capture, rules::PSEUDO_SELECTOR)?,
                args: m.first_within(rules::PSEUDO_ARGS, capture).map(|args| {
                    let text = m.text(args);
                    text.strip_prefix('(')
                        .and_then(|t| t.strip_suffix(')'))
                        .unwrap_or(text)
                        .to_string()
                }),
            }),
            _ => continue,
        };
        simple_selectors.push(simple);
    }
    Ok(CompoundSelector { simple_selectors })
}

/// The first identifier inside `region`.
fn identifier_in(
    m: &GrammarMatch<'_>,
    region: &Capture,
    rule: &'static str,
) -> Result<String, SelectError> {
    m.first_within(rules::IDENTIFIER, region)
        .map(|identifier| m.text(identifier).to_string())
        .ok_or_else(|| mismatch(rule, m.text(region)))
}

fn parse_attribute(m: &GrammarMatch<'_>, attribute: &Capture) -> Result<AttributeSelector, SelectError> {
    let name = identifier_in(m, attribute, rules::ATTRIBUTE_SELECTOR)?;
    let op = m.first_within(rules::COMPARISON_OP, attribute);
    let value = m.first_within(rules::ATTRIBUTE_VALUE, attribute);

    let comparison = match (op, value) {
        (None, _) => None,
        (Some(_), None) => {
            return Err(SelectError::Malformed {
                text: m.text(attribute).to_string(),
            });
        }
        (Some(op), Some(value)) => {
            let op_text = m.text(op);
            let op = op_text
                .parse::<ComparisonOp>()
                .map_err(|_| mismatch(rules::COMPARISON_OP, op_text))?;
            Some((op, unquote(m.text(value))))
        }
    };
    Ok(AttributeSelector { name, comparison })
}

/// Strip matching surrounding quotes and resolve backslash escapes.
///
/// An escaped newline is a line continuation and disappears; `\` followed by
/// up to six hex digits (and one optional space) is a code point; any other
/// escaped character stands for itself.
#[must_use]
pub fn unquote(raw: &str) -> String {
    let inner = match raw.chars().next() {
        Some(quote @ ('"' | '\'')) if raw.len() >= 2 && raw.ends_with(quote) => {
            &raw[1..raw.len() - 1]
        }
        _ => return raw.to_string(),
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            None => out.push('\\'),
            Some('\n') => {}
            Some('\r') => {
                let _ = chars.next_if_eq(&'\n');
            }
            Some(first) if first.is_ascii_hexdigit() => {
                let mut digits = String::from(first);
                while digits.len() < 6 {
                    match chars.next_if(char::is_ascii_hexdigit) {
                        Some(digit) => digits.push(digit),
                        None => break,
                    }
                }
                let _ = chars.next_if(|c| c.is_whitespace());
                let decoded = u32::from_str_radix(&digits, 16)
                    .ok()
                    .filter(|&code| code != 0)
                    .and_then(char::from_u32)
                    .unwrap_or(char::REPLACEMENT_CHARACTER);
                out.push(decoded);
            }
            Some(other) => out.push(other),
        }
    }
    out
}

// ========== evaluation ==========

/// Elements of `index` satisfying every condition of `compound`.
///
/// A compound with no narrowing condition (`*`, pseudo-classes only) matches
/// every indexed element.
#[must_use]
pub fn find_candidates<T: Tree>(
    tree: &T,
    index: &TreeIndex<T::Node>,
    compound: &CompoundSelector,
) -> MatchSet {
    let mut set: Option<MatchSet> = None;
    for simple in &compound.simple_selectors {
        let narrowed = match simple {
            SimpleSelector::Universal | SimpleSelector::Pseudo(_) => continue,
            SimpleSelector::Id(id) => {
                let found: MatchSet = index.lookup_by_id(id).into_iter().collect();
                narrow(set, Some(&found))
            }
            SimpleSelector::Type(tag) => narrow(set, index.lookup_by_type(tag)),
            SimpleSelector::Attribute(attribute) => {
                let mut with_name = narrow(set, index.lookup_by_attribute(&attribute.name));
                if let Some((op, literal)) = &attribute.comparison {
                    with_name.retain(|&ordinal| {
                        index
                            .node(ordinal)
                            .and_then(|node| tree.attribute(node, &attribute.name))
                            .is_some_and(|value| op.matches(value, literal))
                    });
                }
                with_name
            }
        };
        if narrowed.is_empty() {
            return narrowed;
        }
        set = Some(narrowed);
    }
    set.unwrap_or_else(|| index.all())
}

/// Seed with `by` when unconstrained, otherwise intersect. A missing lookup
/// empties the set.
fn narrow(set: Option<MatchSet>, by: Option<&MatchSet>) -> MatchSet {
    match (set, by) {
        (_, None) => MatchSet::new(),
        (None, Some(by)) => by.clone(),
        (Some(mut current), Some(by)) => {
            current.retain(|ordinal| by.contains(ordinal));
            current
        }
    }
}

/// Elements matched by `selector`, in document order.
///
/// The rightmost compound yields the anchor candidates. Every combinator
/// then relates the anchor itself to the candidates of the compound on the
/// combinator's left, walking right to left. Those left-hand candidates are
/// the compound's own matches, unconstrained by anything further left: `a > b c`
/// keeps a `c` whose parent is an `a` and which has some `b` ancestor.
#[must_use]
pub fn evaluate<T: Tree>(tree: &T, index: &TreeIndex<T::Node>, selector: &ComplexSelector) -> MatchSet {
    let Some((anchor, rest)) = selector.compounds.split_last() else {
        return MatchSet::new();
    };
    let mut current = find_candidates(tree, index, anchor);

    for (compound, &combinator) in rest.iter().zip(&selector.combinators).rev() {
        if current.is_empty() {
            break;
        }
        let left = find_candidates(tree, index, compound);
        current.retain(|&ordinal| {
            index
                .node(ordinal)
                .is_some_and(|node| related(tree, index, combinator, node, &left))
        });
    }
    current
}

/// Whether `node` stands in `combinator`'s relation to some member of `left`.
fn related<T: Tree>(
    tree: &T,
    index: &TreeIndex<T::Node>,
    combinator: Combinator,
    node: &T::Node,
    left: &MatchSet,
) -> bool {
    let in_left = |candidate: &T::Node| {
        index
            .ordinal(candidate)
            .is_some_and(|ordinal| left.contains(&ordinal))
    };
    match combinator {
        Combinator::Descendant => {
            successors(tree.parent(node), |n| tree.parent(n)).any(|n| in_left(&n))
        }
        Combinator::Child => tree.parent(node).is_some_and(|parent| in_left(&parent)),
        Combinator::NextSibling => tree
            .previous_element_sibling(node)
            .is_some_and(|sibling| in_left(&sibling)),
        Combinator::SubsequentSibling => successors(tree.previous_element_sibling(node), |n| {
            tree.previous_element_sibling(n)
        })
        .any(|sibling| in_left(&sibling)),
    }
}

/// Lazy iterator over the elements matched by a selector group.
///
/// Alternatives are evaluated one at a time, as the iterator reaches them.
/// Each alternative's matches come out in document order; alternatives are
/// concatenated without removing duplicates.
pub struct Matches<'c, T: Tree> {
    tree: &'c T,
    index: &'c TreeIndex<T::Node>,
    pending: vec::IntoIter<ComplexSelector>,
    current: btree_set::IntoIter<usize>,
}

impl<'c, T: Tree> Matches<'c, T> {
    pub(crate) fn new(tree: &'c T, index: &'c TreeIndex<T::Node>, group: SelectorGroup) -> Self {
        Self {
            tree,
            index,
            pending: group.selectors.into_iter(),
            current: MatchSet::new().into_iter(),
        }
    }
}

impl<T: Tree> Iterator for Matches<'_, T> {
    type Item = T::Node;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(ordinal) = self.current.next() {
                if let Some(node) = self.index.node(ordinal) {
                    return Some(node.clone());
                }
                continue;
            }
            let selector = self.pending.next()?;
            let matched = evaluate(self.tree, self.index, &selector);
            tracing::trace!(selector = %selector, matched = matched.len(), "evaluated alternative");
            self.current = matched.into_iter();
        }
    }
}

impl<T: Tree> fmt::Debug for Matches<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matches")
            .field("pending", &self.pending.len())
            .field("buffered", &self.current.len())
            .finish_non_exhaustive()
    }
}
