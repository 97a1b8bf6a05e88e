//! Action rank table
//!
//! Maps action names to positive ranks. Ranks form a total order of privilege;
//! rank 0 is reserved for "no access" and is rejected at construction.

use crate::error::ConfigError;
use std::collections::HashMap;

/// Privilege rank of an action
pub type Rank = u32;

/// Rank given to an unknown inquiry action so that no configured grant reaches it
pub const UNRANKED_CEILING: Rank = 1000;

/// Immutable action -> rank mapping
#[derive(Debug, Clone, Default)]
pub struct RankTable {
    ranks: HashMap<String, Rank>,
}

impl RankTable {
    /// Build a rank table, rejecting any action ranked 0
    pub fn new(ranks: HashMap<String, Rank>) -> Result<Self, ConfigError> {
        if let Some((action, _)) = ranks.iter().find(|(_, rank)| **rank == 0) {
            return Err(ConfigError::ZeroRank {
                action: action.clone(),
            });
        }
        Ok(Self { ranks })
    }

    /// Rank of an action.
    ///
    /// Unknown actions rank [`UNRANKED_CEILING`] when `defensive` (used for the
    /// action being asked about) and 0 otherwise (used for configured actions).
    pub fn rank_of(&self, action: &str, defensive: bool) -> Rank {
        match self.ranks.get(action) {
            Some(rank) => *rank,
            None if defensive => UNRANKED_CEILING,
            None => 0,
        }
    }

    /// Rank of a registered action
    pub fn get(&self, action: &str) -> Option<Rank> {
        self.ranks.get(action).copied()
    }

    pub fn contains(&self, action: &str) -> bool {
        self.ranks.contains_key(action)
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }

    /// Actions ordered from least to most privileged
    pub fn ordered(&self) -> Vec<(&str, Rank)> {
        let mut actions: Vec<(&str, Rank)> = self
            .ranks
            .iter()
            .map(|(action, rank)| (action.as_str(), *rank))
            .collect();
        actions.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        actions
    }
}
