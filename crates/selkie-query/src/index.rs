//! Per-root tree index.
//!
//! Elements under a root are numbered in pre-order; every set the index hands
//! out is a set of those ordinals, so iterating it yields document order.

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

use crate::conventions::IdConvention;
use crate::tree::Tree;

/// A set of element ordinals, iterated in document order.
pub type MatchSet = BTreeSet<usize>;

/// Id, type and attribute-name lookups over one root's elements.
///
/// The index is a snapshot: it does not observe later changes to the tree.
#[derive(Debug, Clone)]
pub struct TreeIndex<N> {
    /// Elements in pre-order; position is the ordinal.
    nodes: Vec<N>,
    ordinals: HashMap<N, usize>,
    ids: HashMap<String, usize>,
    types: HashMap<String, MatchSet>,
    attributes: HashMap<String, MatchSet>,
}

impl<N: Clone + Eq + Hash> TreeIndex<N> {
    /// Index `root` and all its descendants in one pre-order pass.
    ///
    /// Non-element nodes are walked through but not recorded. When several
    /// elements share an id, the last one in document order wins.
    #[must_use]
    pub fn build<T: Tree<Node = N>>(tree: &T, root: &N, id_convention: &IdConvention) -> Self {
        let mut index = Self {
            nodes: Vec::new(),
            ordinals: HashMap::new(),
            ids: HashMap::new(),
            types: HashMap::new(),
            attributes: HashMap::new(),
        };

        // Explicit stack; deep trees must not overflow.
        let mut stack = vec![root.clone()];
        while let Some(node) = stack.pop() {
            let first_child = stack.len();
            stack.extend(tree.children(&node));
            stack[first_child..].reverse();

            let Some(tag) = tree.tag_name(&node) else {
                continue;
            };
            let ordinal = index.nodes.len();
            index.nodes.push(node.clone());
            let _ = index.types.entry(tag.to_string()).or_default().insert(ordinal);
            for (name, value) in tree.attributes(&node) {
                if id_convention.matches(name) {
                    let _ = index.ids.insert(value.to_string(), ordinal);
                }
                let _ = index
                    .attributes
                    .entry(name.to_string())
                    .or_default()
                    .insert(ordinal);
            }
            let _ = index.ordinals.insert(node, ordinal);
        }

        tracing::debug!(
            elements = index.nodes.len(),
            ids = index.ids.len(),
            types = index.types.len(),
            "built tree index"
        );
        index
    }

    /// Number of indexed elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the root has no elements at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Indexed elements in document order.
    #[must_use]
    pub fn nodes(&self) -> &[N] {
        &self.nodes
    }

    /// The element with the given ordinal.
    #[must_use]
    pub fn node(&self, ordinal: usize) -> Option<&N> {
        self.nodes.get(ordinal)
    }

    /// The ordinal of an indexed element.
    #[must_use]
    pub fn ordinal(&self, node: &N) -> Option<usize> {
        self.ordinals.get(node).copied()
    }

    /// Every indexed element.
    #[must_use]
    pub fn all(&self) -> MatchSet {
        (0..self.nodes.len()).collect()
    }

    /// The element carrying identifier `id`.
    #[must_use]
    pub fn lookup_by_id(&self, id: &str) -> Option<usize> {
        self.ids.get(id).copied()
    }

    /// Elements whose type name is exactly `tag`.
    #[must_use]
    pub fn lookup_by_type(&self, tag: &str) -> Option<&MatchSet> {
        self.types.get(tag)
    }

    /// Elements carrying an attribute named exactly `name`.
    #[must_use]
    pub fn lookup_by_attribute(&self, name: &str) -> Option<&MatchSet> {
        self.attributes.get(name)
    }

    /// Resolve a set of ordinals to element handles.
    pub fn resolve<'s>(&'s self, set: &'s MatchSet) -> impl Iterator<Item = &'s N> {
        set.iter().filter_map(|&ordinal| self.node(ordinal))
    }
}
