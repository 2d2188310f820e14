//! Fixtures shared by the integration tests.
#![allow(dead_code)]

use selkie_dom::{DomTree, ElementData, NodeId};
use selkie_query::{Context, Registry};

/// Build a tree from a small XML-like markup string.
///
/// Supports start, end and self-closing tags, single- or double-quoted
/// attribute values, and text. No entities, comments or declarations.
pub fn tree(markup: &str) -> DomTree {
    let mut tree = DomTree::new();
    let mut open = vec![NodeId::ROOT];
    let mut rest = markup;

    while !rest.is_empty() {
        let parent = *open.last().expect("more end tags than start tags");
        if let Some(after) = rest.strip_prefix("</") {
            let end = after.find('>').expect("unclosed end tag");
            let _ = open.pop();
            rest = &after[end + 1..];
        } else if let Some(after) = rest.strip_prefix('<') {
            let end = after.find('>').expect("unclosed start tag");
            let body = &after[..end];
            let (body, self_closing) = match body.strip_suffix('/') {
                Some(body) => (body, true),
                None => (body, false),
            };
            let id = tree.append_element(parent, start_tag(body));
            if !self_closing {
                open.push(id);
            }
            rest = &after[end + 1..];
        } else {
            let end = rest.find('<').unwrap_or(rest.len());
            let _ = tree.append_text(parent, &rest[..end]);
            rest = &rest[end..];
        }
    }
    tree
}

fn start_tag(body: &str) -> ElementData {
    let body = body.trim();
    let name_end = body.find(char::is_whitespace).unwrap_or(body.len());
    let mut element = ElementData::new(&body[..name_end]);

    let mut rest = body[name_end..].trim_start();
    while !rest.is_empty() {
        let eq = rest.find('=').expect("attribute without value");
        let name = rest[..eq].trim();
        let quoted = rest[eq + 1..].trim_start();
        let quote = quoted.chars().next().expect("missing attribute value");
        let close = quoted[1..].find(quote).expect("unterminated attribute value") + 1;
        element = element.with_attr(name, &quoted[1..close]);
        rest = quoted[close + 1..].trim_start();
    }
    element
}

/// An uncached context over the whole document, with the legacy conventions.
pub fn context(tree: &DomTree) -> Context<'_, DomTree> {
    Context::new(tree, tree.root(), Some(&selkie_query::Conventions::new()))
}

/// Run `selector` and collect the matches.
pub fn select(tree: &DomTree, selector: &str) -> Vec<NodeId> {
    context(tree)
        .select(selector)
        .unwrap_or_else(|e| panic!("`{selector}` failed: {e}"))
        .collect()
}

/// Tag names of `nodes`.
pub fn tags(tree: &DomTree, nodes: &[NodeId]) -> Vec<String> {
    nodes
        .iter()
        .map(|&id| tree.as_element(id).expect("element").tag_name.clone())
        .collect()
}

/// Text content of `nodes`.
pub fn texts(tree: &DomTree, nodes: &[NodeId]) -> Vec<String> {
    nodes.iter().map(|&id| tree.text_content(id)).collect()
}

/// A registry for the given tree type.
pub fn registry<'t>() -> Registry<'t, DomTree> {
    Registry::new()
}
