//! Query contexts and their registry.
//!
//! A [`Context`] pairs one tree root with its [`TreeIndex`] and the
//! conventions it was built with. A [`Registry`] caches contexts by root
//! identity so the index is built once and reused until the context is
//! closed.
//!
//! Contexts borrow the tree. While any context is alive the tree cannot be
//! mutated through safe code, so an index never goes stale.

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::conventions::{Conventions, IdConvention, PseudoPolicy};
use crate::error::SelectError;
use crate::grammar::CompiledGrammar;
use crate::index::TreeIndex;
use crate::select::{Matches, parse_selector_group};
use crate::tree::Tree;

/// An indexed view of one root, ready to answer selector queries.
pub struct Context<'t, T: Tree> {
    tree: &'t T,
    root: T::Node,
    index: TreeIndex<T::Node>,
    id_convention: IdConvention,
    pseudo_policy: PseudoPolicy,
}

impl<'t, T: Tree> Context<'t, T> {
    /// Index `root` without caching.
    ///
    /// `None` conventions means the process-wide default at this moment; later
    /// changes to the default do not affect the returned context.
    #[must_use]
    pub fn new(tree: &'t T, root: T::Node, conventions: Option<&Conventions>) -> Self {
        let conventions = conventions
            .cloned()
            .unwrap_or_else(Conventions::current_default);
        let id_convention = conventions.id_convention();
        let index = TreeIndex::build(tree, &root, &id_convention);
        Self {
            tree,
            root,
            index,
            id_convention,
            pseudo_policy: conventions.pseudo_policy(),
        }
    }

    /// The queried tree.
    #[must_use]
    pub fn tree(&self) -> &'t T {
        self.tree
    }

    /// The indexed root.
    #[must_use]
    pub fn root(&self) -> &T::Node {
        &self.root
    }

    /// The index built for the root.
    #[must_use]
    pub fn index(&self) -> &TreeIndex<T::Node> {
        &self.index
    }

    /// The id convention resolved at construction.
    #[must_use]
    pub fn id_convention(&self) -> &IdConvention {
        &self.id_convention
    }

    /// The pseudo selector policy captured at construction.
    #[must_use]
    pub fn pseudo_policy(&self) -> PseudoPolicy {
        self.pseudo_policy
    }

    /// Select elements matching `selector` with the shipped grammar.
    ///
    /// The text is parsed eagerly; alternatives are evaluated lazily as the
    /// returned iterator advances. Every call evaluates from scratch.
    ///
    /// # Errors
    ///
    /// See [`Context::select_with`].
    pub fn select(&self, selector: &str) -> Result<Matches<'_, T>, SelectError> {
        self.select_with(CompiledGrammar::selectors(), selector)
    }

    /// Select elements matching `selector` with a custom grammar.
    ///
    /// # Errors
    ///
    /// Any error from [`parse_selector_group`], plus
    /// [`SelectError::Unsupported`] when the selector uses pseudo syntax and
    /// the context's policy is [`PseudoPolicy::Reject`].
    pub fn select_with(
        &self,
        grammar: &CompiledGrammar,
        selector: &str,
    ) -> Result<Matches<'_, T>, SelectError> {
        let group = parse_selector_group(grammar, selector)?;
        group.check_pseudo(self.pseudo_policy)?;
        Ok(Matches::new(self.tree, &self.index, group))
    }
}

impl<T: Tree> fmt::Debug for Context<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("root", &self.root)
            .field("elements", &self.index.len())
            .field("id_convention", &self.id_convention)
            .field("pseudo_policy", &self.pseudo_policy)
            .finish_non_exhaustive()
    }
}

/// Root identity: the tree's address plus the root handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RootKey<N> {
    tree: usize,
    root: N,
}

impl<N> RootKey<N> {
    fn new<T>(tree: &T, root: N) -> Self {
        Self {
            tree: std::ptr::from_ref(tree).addr(),
            root,
        }
    }
}

type Slot<'t, T> = Arc<OnceLock<Arc<Context<'t, T>>>>;

/// Cache of contexts keyed by root identity.
///
/// Get-or-create is atomic per root: the registry lock only guards the map of
/// slots, and each root's index is built under its own slot.
pub struct Registry<'t, T: Tree> {
    contexts: Mutex<HashMap<RootKey<T::Node>, Slot<'t, T>>>,
    builds: AtomicUsize,
}

impl<'t, T: Tree> Registry<'t, T> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            contexts: Mutex::new(HashMap::new()),
            builds: AtomicUsize::new(0),
        }
    }

    /// The cached context for `root`, building it on first use.
    ///
    /// `conventions` only matter when a new context is built; an already open
    /// context is returned as is.
    #[must_use]
    pub fn open(
        &self,
        tree: &'t T,
        root: T::Node,
        conventions: Option<&Conventions>,
    ) -> Arc<Context<'t, T>> {
        let slot = {
            let mut contexts = self.contexts.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                contexts
                    .entry(RootKey::new(tree, root.clone()))
                    .or_default(),
            )
        };

        let mut built = false;
        let context = slot.get_or_init(|| {
            built = true;
            let _ = self.builds.fetch_add(1, Ordering::Relaxed);
            Arc::new(Context::new(tree, root, conventions))
        });
        tracing::debug!(root = ?context.root(), reused = !built, "opened context");
        Arc::clone(context)
    }

    /// Remove `context` from the cache.
    ///
    /// Closing a context that is not cached (never opened here, or already
    /// closed) does nothing. Holders of the `Arc` may keep querying it.
    pub fn close(&self, context: &Context<'t, T>) {
        let key = RootKey::new(context.tree, context.root.clone());
        let mut contexts = self.contexts.lock().unwrap_or_else(PoisonError::into_inner);
        let cached = contexts
            .get(&key)
            .and_then(|slot| slot.get())
            .is_some_and(|open| std::ptr::eq(Arc::as_ptr(open), context));
        if cached {
            let _ = contexts.remove(&key);
            tracing::debug!(root = ?context.root(), "closed context");
        }
    }

    /// Open a context that is closed again when the guard drops.
    #[must_use]
    pub fn scoped(
        &self,
        tree: &'t T,
        root: T::Node,
        conventions: Option<&Conventions>,
    ) -> ScopedContext<'_, 't, T> {
        ScopedContext {
            registry: self,
            context: self.open(tree, root, conventions),
        }
    }

    /// Whether a context for `root` is currently cached.
    #[must_use]
    pub fn is_open(&self, tree: &T, root: &T::Node) -> bool {
        self.contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&RootKey::new(tree, root.clone()))
            .is_some_and(|slot| slot.get().is_some())
    }

    /// Number of indices this registry has built.
    #[must_use]
    pub fn index_builds(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }
}

impl<T: Tree> Default for Registry<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Tree> fmt::Debug for Registry<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = self
            .contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("Registry")
            .field("open", &open)
            .field("builds", &self.index_builds())
            .finish()
    }
}

/// A registry context that closes itself on drop.
pub struct ScopedContext<'r, 't, T: Tree> {
    registry: &'r Registry<'t, T>,
    context: Arc<Context<'t, T>>,
}

impl<'t, T: Tree> ScopedContext<'_, 't, T> {
    /// The shared context, which stays usable after the guard drops.
    #[must_use]
    pub fn context(&self) -> &Arc<Context<'t, T>> {
        &self.context
    }
}

impl<'t, T: Tree> Deref for ScopedContext<'_, 't, T> {
    type Target = Context<'t, T>;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}

impl<T: Tree> Drop for ScopedContext<'_, '_, T> {
    fn drop(&mut self) {
        self.registry.close(&self.context);
    }
}

impl<T: Tree> fmt::Debug for ScopedContext<'_, '_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScopedContext").field(&self.context).finish()
    }
}

