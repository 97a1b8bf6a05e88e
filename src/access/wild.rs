//! Wildcard access store
//!
//! Blanket, role-style grants keyed by user and layer path. Grants live only
//! in process memory; they are reseeded from configuration at startup.

use crate::access::path;
use crate::access::rank::Rank;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Layer key that covers every layer
pub const ROOT_LAYER: &str = "";

/// User -> layer path -> rank, safe for concurrent readers and occasional writers
#[derive(Debug, Default)]
pub struct WildcardStore {
    grants: RwLock<HashMap<String, HashMap<String, Rank>>>,
}

impl WildcardStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Recover from poisoned locks; a panicking writer leaves the map usable

    fn read_grants(&self) -> RwLockReadGuard<'_, HashMap<String, HashMap<String, Rank>>> {
        self.grants.read().unwrap_or_else(|poisoned| {
            tracing::warn!("wildcard access lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_grants(&self) -> RwLockWriteGuard<'_, HashMap<String, HashMap<String, Rank>>> {
        self.grants.write().unwrap_or_else(|poisoned| {
            tracing::warn!("wildcard access lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Record (or replace) a grant
    pub fn insert(&self, user_id: &str, layer: &str, rank: Rank) {
        self.write_grants()
            .entry(user_id.to_string())
            .or_default()
            .insert(layer.to_string(), rank);
    }

    /// Rank granted to a user on a layer.
    ///
    /// Walks from the exact layer towards the root and returns the first
    /// recorded nonzero rank; the root grant (`""`) is consulted last. Without
    /// a layer only the root grant applies. No grant at all yields 0.
    pub fn rank_for(&self, user_id: &str, layer: Option<&str>) -> Rank {
        let grants = self.read_grants();
        let Some(user_grants) = grants.get(user_id) else {
            return 0;
        };

        let lookup = |key: &str| user_grants.get(key).copied().filter(|rank| *rank != 0);

        let mut current = layer;
        while let Some(layer) = current {
            if let Some(rank) = lookup(layer) {
                return rank;
            }
            current = path::parent(layer);
        }

        lookup(ROOT_LAYER).unwrap_or(0)
    }

    /// Number of users holding at least one grant
    pub fn user_count(&self) -> usize {
        self.read_grants().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_layer() {
        let store = WildcardStore::new();
        store.insert("u1", "topic.post", 2);
        assert_eq!(store.rank_for("u1", Some("topic.post")), 2);
    }

    #[test]
    fn test_walks_up_to_ancestor() {
        let store = WildcardStore::new();
        store.insert("u1", "topic", 3);
        assert_eq!(store.rank_for("u1", Some("topic.post.comment")), 3);
    }

    #[test]
    fn test_nearest_ancestor_wins() {
        let store = WildcardStore::new();
        store.insert("u1", "topic", 3);
        store.insert("u1", "topic.post", 1);
        assert_eq!(store.rank_for("u1", Some("topic.post.comment")), 1);
    }

    #[test]
    fn test_no_grant_is_zero() {
        let store = WildcardStore::new();
        store.insert("u1", "topic", 3);
        assert_eq!(store.rank_for("u1", Some("forum")), 0);
        assert_eq!(store.rank_for("u2", Some("topic")), 0);
        assert_eq!(store.rank_for("u1", None), 0);
    }

    #[test]
    fn test_root_grant_covers_everything() {
        let store = WildcardStore::new();
        store.insert("root", ROOT_LAYER, 3);
        assert_eq!(store.rank_for("root", Some("topic.post")), 3);
        assert_eq!(store.rank_for("root", None), 3);
    }

    #[test]
    fn test_replace_grant() {
        let store = WildcardStore::new();
        store.insert("u1", "topic", 1);
        store.insert("u1", "topic", 2);
        assert_eq!(store.rank_for("u1", Some("topic")), 2);
        assert_eq!(store.user_count(), 1);
    }

    #[test]
    fn test_concurrent_readers_and_writer() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(WildcardStore::new());
        store.insert("u1", "topic", 1);

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..100 {
                    store.insert(&format!("user{}", i), "topic", 2);
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..100 {
                        assert_eq!(store.rank_for("u1", Some("topic.post")), 1);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.user_count(), 101);
    }
}
