//! In-process graph relation store
//!
//! Keeps relations in a map behind a lock. Used for tests and single-process
//! deployments; it can be switched offline to exercise store failures.

use crate::error::{StoreError, StoreResult};
use crate::store::{GraphStore, RelationUpdate, Score};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// owner -> relation -> member -> score
type Relations = HashMap<String, HashMap<String, HashMap<String, Score>>>;

/// Graph store held entirely in memory
#[derive(Debug)]
pub struct MemoryGraphStore {
    relations: RwLock<Relations>,
    available: AtomicBool,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl Default for MemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self {
            relations: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    fn read_relations(&self) -> RwLockReadGuard<'_, Relations> {
        self.relations.read().unwrap_or_else(|poisoned| {
            tracing::warn!("relation store lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_relations(&self) -> RwLockWriteGuard<'_, Relations> {
        self.relations.write().unwrap_or_else(|poisoned| {
            tracing::warn!("relation store lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Simulate an outage (`false`) or recovery (`true`)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store is offline".into()))
        }
    }

    /// Number of read calls served so far
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of update calls applied so far
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Score of a single member, if present
    pub fn score(&self, owner: &str, relation: &str, member: &str) -> Option<Score> {
        self.read_relations()
            .get(owner)
            .and_then(|relations| relations.get(relation))
            .and_then(|members| members.get(member))
            .copied()
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn relation_members(
        &self,
        owner: &str,
        relation: &str,
    ) -> StoreResult<HashMap<String, Score>> {
        self.ensure_available()?;
        self.reads.fetch_add(1, Ordering::Relaxed);

        Ok(self
            .read_relations()
            .get(owner)
            .and_then(|relations| relations.get(relation))
            .cloned()
            .unwrap_or_default())
    }

    async fn relation_score(
        &self,
        owner: &str,
        relation: &str,
        members: &[String],
    ) -> StoreResult<HashMap<String, Option<Score>>> {
        self.ensure_available()?;
        self.reads.fetch_add(1, Ordering::Relaxed);

        let relations = self.read_relations();
        let scored = relations.get(owner).and_then(|r| r.get(relation));
        Ok(members
            .iter()
            .map(|member| {
                let score = scored.and_then(|m| m.get(member)).copied();
                (member.clone(), score)
            })
            .collect())
    }

    async fn update_relation(&self, owner: &str, update: &RelationUpdate) -> StoreResult<()> {
        self.ensure_available()?;
        self.writes.fetch_add(1, Ordering::Relaxed);

        let mut relations = self.write_relations();
        let owned = relations.entry(owner.to_string()).or_default();

        for (relation, members) in &update.add {
            let scored = owned.entry(relation.clone()).or_default();
            for member in members {
                scored.insert(member.id.clone(), member.score);
            }
        }

        for (relation, members) in &update.incr_by {
            let scored = owned.entry(relation.clone()).or_default();
            for member in members {
                *scored.entry(member.id.clone()).or_insert(0) += member.score;
            }
        }

        for (relation, keys) in &update.remove {
            if let Some(scored) = owned.get_mut(relation) {
                for key in keys {
                    scored.remove(key);
                }
            }
        }

        Ok(())
    }

    fn store_type(&self) -> &'static str {
        "memory"
    }
}
