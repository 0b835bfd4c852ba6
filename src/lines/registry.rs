//! Shared line registry
//!
//! A lock-guarded, insertion-ordered mapping from canonical line text to its
//! [`Line`] descriptor. One writer (the generation worker) and any number of
//! readers (choosers on the scheduler thread) share a registry through an
//! `Arc`.
//!
//! Readers only ever observe a fully-formed mapping: the writer replaces the
//! entire contents in one locked operation rather than mutating
//! incrementally. An empty registry is a normal transient state before the
//! first generation pass completes.

use crate::lines::Line;
use indexmap::IndexMap;
use std::sync::Mutex;
use tracing::debug;

/// Insertion-ordered mapping guarded by a single coarse mutex.
///
/// The raw map and lock are never exposed; callers get snapshot copies and
/// release the lock immediately, so no reader holds it across a sleep or
/// blocking I/O.
#[derive(Debug, Default)]
pub struct LineRegistry {
    inner: Mutex<IndexMap<String, Line>>,
}

impl LineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy out all lines in insertion order.
    pub fn snapshot(&self) -> Vec<Line> {
        self.inner.lock().unwrap().values().cloned().collect()
    }

    /// Copy out the key set in insertion order.
    ///
    /// Key-set equality is the "registry changed" test used by the
    /// refreshing chooser; value changes (a duration being filled in) do not
    /// count as structural changes.
    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().unwrap().keys().cloned().collect()
    }

    /// Look up a line by canonical text.
    pub fn get(&self, text: &str) -> Option<Line> {
        self.inner.lock().unwrap().get(text).cloned()
    }

    /// Atomically replace the entire mapping.
    ///
    /// The previous contents stay visible until this call takes the lock, so
    /// a failed generation pass leaves a stale-but-consistent registry.
    pub fn replace(&self, contents: IndexMap<String, Line>) {
        let mut inner = self.inner.lock().unwrap();
        inner.clear();
        inner.extend(contents);
        debug!("Registry replaced, now {} lines", inner.len());
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}
