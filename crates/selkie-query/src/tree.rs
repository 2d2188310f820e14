//! The tree capability the engine queries.
//!
//! Any tree that can name its elements, list their attributes and navigate
//! parent, children and previous sibling can be indexed and queried. The
//! engine never mutates the tree and never owns it.

use std::fmt::Debug;
use std::hash::Hash;

use selkie_dom::{DomTree, NodeId};

/// Read-only navigation over a tree of labeled nodes.
///
/// Nodes are handles: cheap to clone, compared by identity. A node that is not
/// an element (text, comment, document) returns `None` from
/// [`Tree::tag_name`]; it is traversed through but never matched.
pub trait Tree {
    /// Handle to one node of this tree.
    type Node: Clone + Eq + Hash + Debug;

    /// The element type name, or `None` for non-element nodes.
    fn tag_name(&self, node: &Self::Node) -> Option<&str>;

    /// The node's attributes as `(name, value)` pairs in document order.
    fn attributes(&self, node: &Self::Node) -> impl Iterator<Item = (&str, &str)>;

    /// The value of the named attribute (exact name comparison).
    fn attribute(&self, node: &Self::Node, name: &str) -> Option<&str> {
        self.attributes(node)
            .find(|&(attr, _)| attr == name)
            .map(|(_, value)| value)
    }

    /// The node's parent, or `None` at the top of the tree.
    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    /// The node's children in document order.
    fn children(&self, node: &Self::Node) -> impl Iterator<Item = Self::Node>;

    /// The sibling immediately before `node`, element or not.
    fn previous_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Whether `node` is an element.
    fn is_element(&self, node: &Self::Node) -> bool {
        self.tag_name(node).is_some()
    }

    /// The closest preceding sibling that is an element.
    fn previous_element_sibling(&self, node: &Self::Node) -> Option<Self::Node> {
        let mut current = self.previous_sibling(node);
        while let Some(sibling) = current {
            if self.is_element(&sibling) {
                return Some(sibling);
            }
            current = self.previous_sibling(&sibling);
        }
        None
    }
}

impl Tree for DomTree {
    type Node = NodeId;

    fn tag_name(&self, node: &NodeId) -> Option<&str> {
        self.as_element(*node).map(|element| element.tag_name.as_str())
    }

    fn attributes(&self, node: &NodeId) -> impl Iterator<Item = (&str, &str)> {
        self.as_element(*node)
            .into_iter()
            .flat_map(|element| element.attrs.iter())
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<&str> {
        self.as_element(*node).and_then(|element| element.attr(name))
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        DomTree::parent(self, *node)
    }

    fn children(&self, node: &NodeId) -> impl Iterator<Item = NodeId> {
        DomTree::children(self, *node).iter().copied()
    }

    fn previous_sibling(&self, node: &NodeId) -> Option<NodeId> {
        self.prev_sibling(*node)
    }
}
