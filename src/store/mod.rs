//! Graph relation store
//!
//! Direct grants and blocks are kept by an external store of scored
//! relations: owner `user:<id>` holds members `node:<id>` under a named
//! relation. This module defines the capability the engine needs from such a
//! store, an in-process implementation, and an HTTP client for a remote one.

pub mod client;
pub mod memory;

pub use client::HttpGraphStore;
pub use memory::MemoryGraphStore;

use crate::error::StoreResult;
// async_trait required for dyn-compatibility with Arc<dyn GraphStore>
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Signed relation score; ranks are positive, [`BLOCK_SCORE`] marks a block
pub type Score = i64;

/// Score recorded for an explicit per-node block
pub const BLOCK_SCORE: Score = -1;

/// Relation holding direct grants (scored by rank)
pub const MEMBERS_RELATION: &str = "_members";

/// Relation holding blocked node prefixes
pub const BLOCKED_RELATION: &str = "blocked";

const USER_PREFIX: &str = "user:";
const NODE_PREFIX: &str = "node:";

/// Owner key for a user
pub fn user_key(user_id: &str) -> String {
    format!("{}{}", USER_PREFIX, user_id)
}

/// Member key for a node
pub fn node_key(node_id: &str) -> String {
    format!("{}{}", NODE_PREFIX, node_id)
}

/// Node identifier of a member key (`node:12` -> `12`).
///
/// Only the segment after the first `:` is kept, so `node:a:b` yields `a`.
/// Keys without a type prefix are returned unchanged.
pub fn member_id(key: &str) -> &str {
    key.split(':').nth(1).unwrap_or(key)
}

/// A member written to a relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationMember {
    pub id: String,
    pub score: Score,
    /// Keep the member when the store expires volatile entries
    pub persist: bool,
}

impl RelationMember {
    pub fn new(id: impl Into<String>, score: Score) -> Self {
        Self {
            id: id.into(),
            score,
            persist: false,
        }
    }

    pub fn persistent(id: impl Into<String>, score: Score) -> Self {
        Self {
            persist: true,
            ..Self::new(id, score)
        }
    }

    /// Wire form: `<id>~<score>:` followed by `!` when persistent
    pub fn encode(&self) -> String {
        format!(
            "{}~{}:{}",
            self.id,
            self.score,
            if self.persist { "!" } else { "" }
        )
    }
}

impl fmt::Display for RelationMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Batched change to an owner's relations, keyed by relation name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationUpdate {
    /// Members to set (replacing any previous score)
    pub add: BTreeMap<String, Vec<RelationMember>>,
    /// Member keys to remove
    pub remove: BTreeMap<String, Vec<String>>,
    /// Members whose score is incremented by the given amount
    pub incr_by: BTreeMap<String, Vec<RelationMember>>,
}

impl RelationUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, relation: &str, member: RelationMember) -> Self {
        self.add.entry(relation.to_string()).or_default().push(member);
        self
    }

    pub fn remove(mut self, relation: &str, member_key: impl Into<String>) -> Self {
        self.remove
            .entry(relation.to_string())
            .or_default()
            .push(member_key.into());
        self
    }

    pub fn incr_by(mut self, relation: &str, member: RelationMember) -> Self {
        self.incr_by
            .entry(relation.to_string())
            .or_default()
            .push(member);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty() && self.incr_by.is_empty()
    }
}

/// Capability required from a graph relation store.
///
/// Implementations perform their own I/O and timeouts; failures surface as
/// `StoreError` and are never retried by the engine.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// All members of an owner's relation with their scores
    async fn relation_members(&self, owner: &str, relation: &str)
    -> StoreResult<HashMap<String, Score>>;

    /// Scores of the given members; absent members map to `None`
    async fn relation_score(
        &self,
        owner: &str,
        relation: &str,
        members: &[String],
    ) -> StoreResult<HashMap<String, Option<Score>>>;

    /// Apply a batched update to an owner's relations
    async fn update_relation(&self, owner: &str, update: &RelationUpdate) -> StoreResult<()>;

    /// Get a description of the store (for logging)
    fn store_type(&self) -> &'static str;
}
