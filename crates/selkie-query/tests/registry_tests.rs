//! Tests for the context registry: caching by root, closing and scoped guards.

mod common;

use std::sync::Arc;

use common::{registry, tree};
use selkie_query::{Conventions, PseudoPolicy, SelectError};

const MARKUP: &str = "<a><b id='one'>1</b><c><b name='two'>2</b></c></a>";

#[test]
fn test_same_root_reuses_context() {
    let doc = tree(MARKUP);
    let registry = registry();

    let first = registry.open(&doc, doc.root(), None);
    let second = registry.open(&doc, doc.root(), None);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(registry.index_builds(), 1);
    assert!(registry.is_open(&doc, &doc.root()));
}

#[test]
fn test_close_then_open_rebuilds() {
    let doc = tree(MARKUP);
    let registry = registry();

    let first = registry.open(&doc, doc.root(), None);
    registry.close(&first);
    assert!(!registry.is_open(&doc, &doc.root()));

    let second = registry.open(&doc, doc.root(), None);
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(registry.index_builds(), 2);
}

#[test]
fn test_closed_context_stays_usable() {
    let doc = tree(MARKUP);
    let registry = registry();

    let context = registry.open(&doc, doc.root(), None);
    registry.close(&context);
    assert_eq!(context.select("b").unwrap().count(), 2);
}

#[test]
fn test_close_is_idempotent() {
    let doc = tree(MARKUP);
    let registry = registry();

    let context = registry.open(&doc, doc.root(), None);
    registry.close(&context);
    registry.close(&context);
    assert!(!registry.is_open(&doc, &doc.root()));
}

#[test]
fn test_close_ignores_foreign_context() {
    let doc = tree(MARKUP);
    let registry = registry();

    let cached = registry.open(&doc, doc.root(), None);
    let uncached = common::context(&doc);
    registry.close(&uncached);
    assert!(registry.is_open(&doc, &doc.root()));

    let again = registry.open(&doc, doc.root(), None);
    assert!(Arc::ptr_eq(&cached, &again));
}

#[test]
fn test_stale_context_does_not_close_its_replacement() {
    let doc = tree(MARKUP);
    let registry = registry();

    let stale = registry.open(&doc, doc.root(), None);
    registry.close(&stale);
    let fresh = registry.open(&doc, doc.root(), None);
    registry.close(&stale);

    assert!(registry.is_open(&doc, &doc.root()));
    assert!(Arc::ptr_eq(&fresh, &registry.open(&doc, doc.root(), None)));
}

#[test]
fn test_different_roots_get_separate_contexts() {
    let doc = tree(MARKUP);
    let registry = registry();
    let a = doc.children(doc.root())[0];

    let whole = registry.open(&doc, doc.root(), None);
    let subtree = registry.open(&doc, a, None);
    assert!(!Arc::ptr_eq(&whole, &subtree));
    assert_eq!(registry.index_builds(), 2);
    assert_eq!(whole.index().len(), 4);
    assert_eq!(subtree.index().len(), 4);

    let c = doc.children(a)[1];
    let inner = registry.open(&doc, c, None);
    assert_eq!(inner.index().len(), 2);
    assert_eq!(inner.select("b").unwrap().count(), 1);
}

#[test]
fn test_equal_trees_are_distinct_roots() {
    let left = tree(MARKUP);
    let right = tree(MARKUP);
    let registry = registry();

    let _ = registry.open(&left, left.root(), None);
    assert!(!registry.is_open(&right, &right.root()));
    let _ = registry.open(&right, right.root(), None);
    assert_eq!(registry.index_builds(), 2);
}

#[test]
fn test_reused_context_keeps_its_conventions() {
    let doc = tree(MARKUP);
    let registry = registry();
    let by_name = Conventions::new().with_id_attribute_name(|| "name".to_string());

    let legacy = registry.open(&doc, doc.root(), Some(&Conventions::new()));
    assert_eq!(legacy.select("#one").unwrap().count(), 1);

    let reused = registry.open(&doc, doc.root(), Some(&by_name));
    assert!(Arc::ptr_eq(&legacy, &reused));
    assert_eq!(reused.select("#one").unwrap().count(), 1);

    registry.close(&reused);
    let rebuilt = registry.open(&doc, doc.root(), Some(&by_name));
    assert_eq!(rebuilt.select("#one").unwrap().count(), 0);
    assert_eq!(rebuilt.select("#two").unwrap().count(), 1);
}

#[test]
fn test_scoped_context_closes_on_drop() {
    let doc = tree(MARKUP);
    let registry = registry();

    let kept = {
        let scoped = registry.scoped(&doc, doc.root(), None);
        assert!(registry.is_open(&doc, &doc.root()));
        assert_eq!(scoped.select("#two").unwrap().count(), 1);
        Arc::clone(scoped.context())
    };

    assert!(!registry.is_open(&doc, &doc.root()));
    assert_eq!(kept.select("c > b").unwrap().count(), 1);
}

#[test]
fn test_scoped_context_uses_conventions() {
    let doc = tree("<a><b/></a>");
    let registry = registry();
    let reject = Conventions::new().with_pseudo_policy(PseudoPolicy::Reject);

    let scoped = registry.scoped(&doc, doc.root(), Some(&reject));
    assert_eq!(scoped.pseudo_policy(), PseudoPolicy::Reject);
    assert!(matches!(
        scoped.select("b:hover"),
        Err(SelectError::Unsupported { .. })
    ));
}

#[test]
fn test_concurrent_open_builds_once() {
    let doc = tree(MARKUP);
    let registry = registry();

    let contexts: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| registry.open(&doc, doc.root(), None)))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });

    assert_eq!(registry.index_builds(), 1);
    assert!(contexts.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}
