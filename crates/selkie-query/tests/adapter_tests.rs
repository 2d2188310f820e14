//! Tests that selection works over any [`Tree`] implementation, here a nested
//! outline addressed by child-index paths.

use selkie_query::{Context, Conventions, Registry, Tree};

/// One entry of the outline; entries without a label are notes, not elements.
#[derive(Debug)]
struct Entry {
    label: Option<String>,
    attrs: Vec<(String, String)>,
    children: Vec<Entry>,
}

fn el(label: &str, attrs: &[(&str, &str)], children: Vec<Entry>) -> Entry {
    Entry {
        label: Some(label.to_string()),
        attrs: attrs
            .iter()
            .map(|&(name, value)| (name.to_string(), value.to_string()))
            .collect(),
        children,
    }
}

fn note() -> Entry {
    Entry {
        label: None,
        attrs: Vec::new(),
        children: Vec::new(),
    }
}

/// Nodes are paths of child indices from the top entry.
#[derive(Debug)]
struct Outline {
    top: Entry,
}

impl Outline {
    fn get(&self, path: &[usize]) -> Option<&Entry> {
        path.iter()
            .try_fold(&self.top, |entry, &i| entry.children.get(i))
    }
}

impl Tree for Outline {
    type Node = Vec<usize>;

    fn tag_name(&self, node: &Vec<usize>) -> Option<&str> {
        self.get(node).and_then(|entry| entry.label.as_deref())
    }

    fn attributes(&self, node: &Vec<usize>) -> impl Iterator<Item = (&str, &str)> {
        self.get(node)
            .into_iter()
            .flat_map(|entry| entry.attrs.iter())
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    fn parent(&self, node: &Vec<usize>) -> Option<Vec<usize>> {
        node.split_last().map(|(_, parent)| parent.to_vec())
    }

    fn children(&self, node: &Vec<usize>) -> impl Iterator<Item = Vec<usize>> {
        let count = self.get(node).map_or(0, |entry| entry.children.len());
        let base = node.clone();
        (0..count).map(move |i| {
            let mut path = base.clone();
            path.push(i);
            path
        })
    }

    fn previous_sibling(&self, node: &Vec<usize>) -> Option<Vec<usize>> {
        let (&last, parent) = node.split_last()?;
        let previous = last.checked_sub(1)?;
        let mut path = parent.to_vec();
        path.push(previous);
        Some(path)
    }
}

fn outline() -> Outline {
    Outline {
        top: el(
            "book",
            &[],
            vec![
                el("chapter", &[("id", "intro"), ("lang", "en-GB")], vec![
                    el("section", &[("kind", "lead body")], vec![]),
                    note(),
                    el("section", &[("kind", "body")], vec![]),
                ]),
                note(),
                el("chapter", &[("name", "usage"), ("lang", "fr")], vec![
                    el("section", &[], vec![el("figure", &[], vec![])]),
                ]),
            ],
        ),
    }
}

fn select(tree: &Outline, selector: &str) -> Vec<Vec<usize>> {
    Context::new(tree, Vec::new(), Some(&Conventions::new()))
        .select(selector)
        .unwrap()
        .collect()
}

#[test]
fn test_type_selection_in_document_order() {
    let tree = outline();
    assert_eq!(
        select(&tree, "section"),
        [vec![0, 0], vec![0, 2], vec![2, 0]]
    );
    assert_eq!(select(&tree, "*").len(), 7);
}

#[test]
fn test_combinators() {
    let tree = outline();
    assert_eq!(select(&tree, "book section > figure"), [vec![2, 0, 0]]);
    // Every combinator is measured from the figure: its parent is no chapter.
    assert!(select(&tree, "book > chapter > section > figure").is_empty());
    assert_eq!(select(&tree, "book figure"), [vec![2, 0, 0]]);
    assert_eq!(select(&tree, "section + section"), [vec![0, 2]]);
    assert_eq!(select(&tree, "chapter ~ chapter"), [vec![2]]);
    assert!(select(&tree, "section ~ chapter").is_empty());
}

#[test]
fn test_ids_and_attributes() {
    let tree = outline();
    assert_eq!(select(&tree, "#intro"), [vec![0]]);
    assert_eq!(select(&tree, "chapter#usage"), [vec![2]]);
    assert_eq!(select(&tree, "[lang|=en]"), [vec![0]]);
    assert_eq!(select(&tree, "[kind~=lead]"), [vec![0, 0]]);
    assert_eq!(select(&tree, "section[kind$=body]").len(), 2);
}

#[test]
fn test_subtree_root() {
    let tree = outline();
    let context = Context::new(&tree, vec![2], None);
    let found: Vec<_> = context.select("section, figure").unwrap().collect();
    assert_eq!(found, [vec![2, 0], vec![2, 0, 0]]);
}

#[test]
fn test_registry_with_path_nodes() {
    let tree = outline();
    let registry = Registry::new();

    let first = registry.open(&tree, vec![0], None);
    let second = registry.open(&tree, vec![0], None);
    assert_eq!(registry.index_builds(), 1);
    assert_eq!(first.select("section").unwrap().count(), 2);

    registry.close(&second);
    assert!(!registry.is_open(&tree, &vec![0]));
}
