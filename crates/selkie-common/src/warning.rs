//! Engine warnings routed through `tracing`.
//!
//! Provides deduplication to avoid spamming the same warning for every query.
//! Used by the query engine to report selector syntax it accepts but ignores.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// Global set of warnings we've already emitted (to deduplicate)
static WARNED: Mutex<Option<HashSet<String>>> = Mutex::new(None);

/// Warn about an unsupported feature (emits once per unique message)
///
/// The warning is emitted as a `tracing` event at WARN level with the
/// `component` attached as a field, so it shows up in whatever subscriber the
/// host application installed.
///
/// Returns `true` if this call emitted the warning, `false` if it was a
/// duplicate.
///
/// # Example
/// ```ignore
/// warn_once("select", "pseudo-class `:hover` has no matching semantics");
/// ```
pub fn warn_once(component: &str, message: &str) -> bool {
    let key = format!("[{component}] {message}");
    let first_time = WARNED
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get_or_insert_with(HashSet::new)
        .insert(key);

    if first_time {
        tracing::warn!(component, "{message}");
    }
    first_time
}

/// Clear all recorded warnings so they can be emitted again.
pub fn clear_warnings() {
    let mut guard = WARNED.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(set) = guard.as_mut() {
        set.clear();
    }
}
