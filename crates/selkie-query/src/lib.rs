//! Selector queries over indexed element trees.
//!
//! Selkie matches CSS-style selector text such as `a > b[lang|='en'], #t2`
//! against an in-memory tree and returns the matching elements.
//!
//! # Architecture
//!
//! ```text
//! selector text ─▶ CompiledGrammar ─▶ captures ─▶ SelectorGroup
//!                                                      │
//! Tree ─▶ TreeIndex (ids, types, attribute names) ◀────┤ evaluate right to left
//!                                                      ▼
//!                                                   Matches
//! ```
//!
//! - [`grammar`]: named pattern fragments compiled into one matcher that keeps
//!   every capture.
//! - [`capture`]: nested parse structure recovered from span containment.
//! - [`tree`]: the [`Tree`] trait any tree implements to be queried.
//! - [`index`]: the per-root [`TreeIndex`].
//! - [`select`]: typed selectors, candidate search and combinators.
//! - [`conventions`]: id attribute and pseudo selector handling.
//! - [`context`]: [`Context`] and the caching [`Registry`].
//!
//! # Example
//!
//! ```no_run
//! use selkie_dom::{DomTree, ElementData, NodeId};
//! use selkie_query::Registry;
//!
//! # fn main() -> Result<(), selkie_query::SelectError> {
//! let mut tree = DomTree::new();
//! let a = tree.append_element(NodeId::ROOT, ElementData::new("a"));
//! let b = tree.append_element(a, ElementData::new("b").with_attr("index", "2"));
//! let _ = tree.append_text(b, "second");
//!
//! let registry = Registry::new();
//! let context = registry.open(&tree, tree.root(), None);
//! for node in context.select("a > b[index='2']")? {
//!     println!("{}", tree.text_content(node));
//! }
//! registry.close(&context);
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod context;
pub mod conventions;
pub mod error;
pub mod grammar;
pub mod index;
pub mod select;
pub mod tree;

pub use capture::{Capture, GrammarMatch, within};
pub use context::{Context, Registry, ScopedContext};
pub use conventions::{Conventions, ConventionsConfig, IdCase, IdConvention, PseudoPolicy};
pub use error::{GrammarError, SelectError};
pub use grammar::{CompiledGrammar, RuleTable, compile};
pub use index::{MatchSet, TreeIndex};
pub use select::{
    AttributeSelector, Combinator, ComparisonOp, ComplexSelector, CompoundSelector, Matches,
    PseudoSelector, SelectorGroup, SimpleSelector, parse_selector_group,
};
pub use tree::Tree;
