//! Per-session EAD tree state
//!
//! Each visitor expands, collapses and searches their own copy of a tree.
//! Copies are keyed by session, database and file and dropped after an
//! idle timeout.

use super::EadTree;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

type TreeKey = (String, String, String);

struct SessionTree {
    tree: EadTree,
    last_access: Instant,
}

pub struct EadSessionStore {
    trees: Mutex<HashMap<TreeKey, SessionTree>>,
    idle_timeout: Duration,
}

fn key(session_id: &str, database: &str, file: &str) -> TreeKey {
    (session_id.to_string(), database.to_string(), file.to_string())
}

impl EadSessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            trees: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TreeKey, SessionTree>> {
        match self.trees.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn contains(&self, session_id: &str, database: &str, file: &str) -> bool {
        self.lock().contains_key(&key(session_id, database, file))
    }

    /// Store a tree for a session unless another request stored one first
    pub fn insert(&self, session_id: &str, database: &str, file: &str, tree: EadTree) {
        self.lock()
            .entry(key(session_id, database, file))
            .or_insert_with(|| SessionTree {
                tree,
                last_access: Instant::now(),
            });
    }

    /// Run `f` on the session's tree; `None` when the session has none
    pub fn with_tree<R>(
        &self,
        session_id: &str,
        database: &str,
        file: &str,
        f: impl FnOnce(&mut EadTree) -> R,
    ) -> Option<R> {
        let mut trees = self.lock();
        let entry = trees.get_mut(&key(session_id, database, file))?;
        entry.last_access = Instant::now();
        Some(f(&mut entry.tree))
    }

    pub fn remove(&self, session_id: &str, database: &str, file: &str) -> bool {
        self.lock().remove(&key(session_id, database, file)).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn evict_idle(&self, now: Instant) -> usize {
        let mut trees = self.lock();
        let before = trees.len();
        trees.retain(|_, t| now.saturating_duration_since(t.last_access) <= self.idle_timeout);
        let evicted = before - trees.len();
        if evicted > 0 {
            debug!(evicted, "Evicted idle EAD session trees");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ead::EadNode;

    fn tree() -> EadTree {
        let root = EadNode::new("root", "Fonds")
            .with_child(EadNode::new("s1", "Series 1").with_child(EadNode::new("f1", "File 1")));
        EadTree::generate(root)
    }

    #[test]
    fn test_sessions_are_independent() {
        let store = EadSessionStore::new(Duration::from_secs(60));
        store.insert("a", "db", "f.xml", tree());
        store.insert("b", "db", "f.xml", tree());

        assert_eq!(store.with_tree("a", "db", "f.xml", |t| t.collapse(0)), Some(true));
        assert_eq!(store.with_tree("a", "db", "f.xml", |t| t.tree_view().len()), Some(1));
        assert_eq!(store.with_tree("b", "db", "f.xml", |t| t.tree_view().len()), Some(3));
        assert_eq!(store.with_tree("c", "db", "f.xml", |t| t.len()), None);
    }

    #[test]
    fn test_insert_keeps_existing_state() {
        let store = EadSessionStore::new(Duration::from_secs(60));
        store.insert("a", "db", "f.xml", tree());
        store.with_tree("a", "db", "f.xml", |t| t.collapse_all());
        store.insert("a", "db", "f.xml", tree());
        assert_eq!(store.with_tree("a", "db", "f.xml", |t| t.tree_view().len()), Some(1));
    }

    #[test]
    fn test_evict_idle() {
        let store = EadSessionStore::new(Duration::from_secs(10));
        store.insert("a", "db", "f.xml", tree());
        assert_eq!(store.evict_idle(Instant::now() + Duration::from_secs(11)), 1);
        assert!(store.is_empty());
        assert!(!store.remove("a", "db", "f.xml"));
    }
}
