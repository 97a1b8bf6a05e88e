//! Access decision engine
//!
//! Decides whether a user may perform an action on a resource. Rules are
//! evaluated in a fixed order and the first decisive rule wins:
//!
//! 1. **Block** - a blocked node prefix denies unconditionally
//! 2. **Owner** - `owner_can` grants the resource owner
//! 3. **Wildcard** - role-style grant on the layer or an ancestor layer
//! 4. **No one can** - hard ceiling for the layer
//! 5. **Anyone can** - open grant for every user
//! 6. **Direct** - per-node grant (or block) kept in the graph store
//! 7. **Inheritance** - re-evaluate on the parent layer and parent node
//!
//! Anything left undecided is denied. Only the block and direct rules touch
//! the graph store; store failures are returned as errors, never as denials.

use crate::access::layers::{LayerTree, Policy};
use crate::access::path;
use crate::access::rank::{Rank, RankTable};
use crate::access::wild::WildcardStore;
use crate::config::{AccessConfig, WildGrantConfig};
use crate::error::{AccessDeniedError, AppError, ConfigError, StoreResult};
use crate::store::{
    BLOCK_SCORE, BLOCKED_RELATION, GraphStore, MEMBERS_RELATION, RelationMember, RelationUpdate,
    Score, member_id, node_key, user_key,
};
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Score written to the blocked relation; only membership matters
const BLOCKED_MEMBER_SCORE: Score = 1;

/// A single authorization question
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessRequest {
    /// Layer path of the resource kind (`school.classroom`)
    pub layer: Option<String>,
    /// Policy variant of the layer (`staff` selects `_staff`)
    pub variant: Option<String>,
    pub user_id: String,
    /// Node path of the resource instance (`s1.c7`)
    pub node_id: Option<String>,
    pub action: String,
    /// Whether the user owns the resource, as decided by the caller
    pub is_owner: bool,
}

impl AccessRequest {
    pub fn new(user_id: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            action: action.into(),
            ..Default::default()
        }
    }

    pub fn layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    pub fn variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    pub fn node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn owner(mut self, is_owner: bool) -> Self {
        self.is_owner = is_owner;
        self
    }

    /// Human-readable target, for logs and denial messages
    pub fn target(&self) -> String {
        match (&self.layer, &self.node_id) {
            (Some(layer), Some(node)) => format!("{}/{}", layer, node),
            (Some(layer), None) => layer.clone(),
            (None, Some(node)) => node.clone(),
            (None, None) => "*".to_string(),
        }
    }
}

/// Rule that settled a decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// User is blocked on a prefix contained in the node path
    Blocked { prefix: String },
    Owner,
    Wildcard,
    NoOneCan,
    AnyoneCan,
    Direct,
    /// Direct access recorded as an explicit block
    DirectBlock,
    /// Granted while evaluating an ancestor layer
    Inherited { layer: String, via: Box<Rule> },
    /// No rule granted access
    NoMatch,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Blocked { prefix } => write!(f, "blocked on '{}'", prefix),
            Rule::Owner => f.write_str("owner rule"),
            Rule::Wildcard => f.write_str("wildcard access"),
            Rule::NoOneCan => f.write_str("no one may do this on the layer"),
            Rule::AnyoneCan => f.write_str("anyone may do this on the layer"),
            Rule::Direct => f.write_str("direct access"),
            Rule::DirectBlock => f.write_str("direct access is blocked"),
            Rule::Inherited { layer, via } => write!(f, "inherited from '{}' ({})", layer, via),
            Rule::NoMatch => f.write_str("no rule granted access"),
        }
    }
}

/// Outcome of an access check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Granted(Rule),
    Denied(Rule),
}

impl AccessDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Granted(_))
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, AccessDecision::Denied(_))
    }

    pub fn rule(&self) -> &Rule {
        match self {
            AccessDecision::Granted(rule) | AccessDecision::Denied(rule) => rule,
        }
    }
}

/// Borrowed view of a request while walking up the layer hierarchy
#[derive(Debug, Clone, Copy)]
struct Inquiry<'a> {
    layer: Option<&'a str>,
    variant: Option<&'a str>,
    user_id: &'a str,
    node_id: Option<&'a str>,
    action: &'a str,
    is_owner: bool,
    /// Layer that fell through to this one, if any
    child_layer: Option<&'a str>,
}

/// The layered access decision engine
pub struct SharkFin {
    ranks: RankTable,
    layers: LayerTree,
    wild: WildcardStore,
    store: Arc<dyn GraphStore>,
}

impl SharkFin {
    /// Create an engine and seed wildcard grants from the allow-list.
    ///
    /// Fails if an allow-list entry names an unranked action. Policies naming
    /// unranked actions are accepted: such a rule ranks 0, so `owner_can` and
    /// `anyone_can` grant nothing and `no_one_can` denies every inquiry.
    pub fn new(
        ranks: RankTable,
        layers: LayerTree,
        wild_list: &[WildGrantConfig],
        store: Arc<dyn GraphStore>,
    ) -> Result<Self, ConfigError> {
        for entry in layers.entries() {
            for (rule, action) in entry.policy.actions() {
                if !ranks.contains(action) {
                    warn!(
                        layer = %entry.layer,
                        variant = entry.variant,
                        rule,
                        action,
                        "Policy names an unranked action; the rule fails closed"
                    );
                }
            }
        }

        let engine = Self {
            ranks,
            layers,
            wild: WildcardStore::new(),
            store,
        };

        for grant in wild_list {
            engine.add_wild_access(&grant.user_id, &grant.layer, &grant.action)?;
        }

        info!(
            actions = engine.ranks.len(),
            wild_users = engine.wild.user_count(),
            store = engine.store.store_type(),
            "Access engine ready"
        );

        Ok(engine)
    }

    /// Create an engine from the `[access]` configuration section
    pub fn from_config(
        config: &AccessConfig,
        store: Arc<dyn GraphStore>,
    ) -> Result<Self, ConfigError> {
        let ranks = RankTable::new(config.actions.clone())?;
        let layers = LayerTree::from_config(&config.layers)?;
        Self::new(ranks, layers, &config.wild, store)
    }

    pub fn ranks(&self) -> &RankTable {
        &self.ranks
    }

    pub fn layers(&self) -> &LayerTree {
        &self.layers
    }

    /// Whether the request is permitted.
    ///
    /// `Err` means the graph store could not answer; it is never a denial.
    pub async fn is_granted(&self, request: &AccessRequest) -> StoreResult<bool> {
        Ok(self.decide(request).await?.is_granted())
    }

    /// Decide the request and report the rule that settled it
    pub async fn decide(&self, request: &AccessRequest) -> StoreResult<AccessDecision> {
        let inquiry = Inquiry {
            layer: request.layer.as_deref(),
            variant: request.variant.as_deref(),
            user_id: &request.user_id,
            node_id: request.node_id.as_deref(),
            action: &request.action,
            is_owner: request.is_owner,
            child_layer: None,
        };
        self.evaluate(inquiry).await
    }

    /// Like [`decide`](Self::decide), but a denial becomes an error
    pub async fn require(&self, request: &AccessRequest) -> Result<(), AppError> {
        match self.decide(request).await? {
            AccessDecision::Granted(_) => Ok(()),
            AccessDecision::Denied(rule) => Err(AccessDeniedError::new(
                &request.user_id,
                &request.action,
                request.target(),
                rule.to_string(),
            )
            .into()),
        }
    }

    fn evaluate<'a>(&'a self, q: Inquiry<'a>) -> BoxFuture<'a, StoreResult<AccessDecision>> {
        Box::pin(async move {
            let inquiry_rank = self.ranks.rank_of(q.action, true);
            let short_id = q.node_id.map(path::last_segment);
            let policy = match q.layer {
                Some(layer) => self.layers.resolve(layer, q.variant),
                None => Policy::empty(),
            };

            debug!(
                user = q.user_id,
                action = q.action,
                rank = inquiry_rank,
                layer = ?q.layer,
                variant = ?q.variant,
                node = ?q.node_id,
                child_layer = ?q.child_layer,
                is_owner = q.is_owner,
                "Checking access"
            );

            // Block
            if let Some(node_id) = q.node_id
                && let Some(prefix) = self.blocked_prefix(q.user_id, node_id).await?
            {
                trace!(prefix = %prefix, "User is blocked");
                return Ok(AccessDecision::Denied(Rule::Blocked { prefix }));
            }

            // Owner
            if q.is_owner
                && let Some(owner_can) = &policy.owner_can
                && self.ranks.rank_of(owner_can, false) >= inquiry_rank
            {
                trace!("Granted by owner rule");
                return Ok(AccessDecision::Granted(Rule::Owner));
            }

            // Wildcard
            let wild = self.wild.rank_for(q.user_id, q.layer);
            if wild != 0 && wild >= inquiry_rank {
                trace!(wild, "Granted by wildcard access");
                return Ok(AccessDecision::Granted(Rule::Wildcard));
            }

            // No one can
            if let Some(no_one_can) = &policy.no_one_can
                && self.ranks.rank_of(no_one_can, false) <= inquiry_rank
            {
                trace!("Denied by no_one_can");
                return Ok(AccessDecision::Denied(Rule::NoOneCan));
            }

            // Anyone can
            if let Some(anyone_can) = &policy.anyone_can
                && self.ranks.rank_of(anyone_can, false) >= inquiry_rank
            {
                trace!("Granted by anyone_can");
                return Ok(AccessDecision::Granted(Rule::AnyoneCan));
            }

            // Direct
            if !q.user_id.is_empty()
                && let Some(short_id) = short_id
                && let Some(score) = self.direct_access_score(q.user_id, short_id).await?
            {
                if score >= Score::from(inquiry_rank) {
                    trace!(score, "Granted by direct access");
                    return Ok(AccessDecision::Granted(Rule::Direct));
                }
                if score == BLOCK_SCORE {
                    trace!("Denied by direct block");
                    return Ok(AccessDecision::Denied(Rule::DirectBlock));
                }
            }

            // Inheritance
            if policy.inherit
                && let Some(layer) = q.layer
            {
                match path::parent(layer) {
                    Some(parent_layer) => {
                        info!(layer, parent = parent_layer, "Inheriting from parent layer");
                        let parent = Inquiry {
                            layer: Some(parent_layer),
                            node_id: q.node_id.and_then(path::parent),
                            child_layer: Some(layer),
                            ..q
                        };
                        if let AccessDecision::Granted(via) = self.evaluate(parent).await? {
                            return Ok(AccessDecision::Granted(Rule::Inherited {
                                layer: parent_layer.to_string(),
                                via: Box::new(via),
                            }));
                        }
                    }
                    None => warn!(layer, "Layer inherits but has no parent"),
                }
            }

            Ok(AccessDecision::Denied(Rule::NoMatch))
        })
    }

    /// First blocked prefix contained in the node path.
    ///
    /// Matching is plain substring containment on the full node path, so a
    /// block on `12` also matches `120`.
    async fn blocked_prefix(&self, user_id: &str, node_id: &str) -> StoreResult<Option<String>> {
        let blocked = self
            .store
            .relation_members(&user_key(user_id), BLOCKED_RELATION)
            .await?;

        // TODO: match whole leading segments only, once stored blocks are
        // checked for entries that depend on substring hits
        Ok(blocked
            .keys()
            .map(|key| member_id(key))
            .find(|prefix| !prefix.is_empty() && node_id.contains(prefix))
            .map(str::to_string))
    }

    async fn direct_access_score(&self, user_id: &str, node_id: &str) -> StoreResult<Option<Score>> {
        let key = node_key(node_id);
        let mut scores = self
            .store
            .relation_score(&user_key(user_id), MEMBERS_RELATION, std::slice::from_ref(&key))
            .await?;
        Ok(scores.remove(&key).flatten())
    }

    /// Grant `action` on `layer` (and the layers below it) to a user
    pub fn add_wild_access(&self, user_id: &str, layer: &str, action: &str) -> Result<(), ConfigError> {
        let rank = self
            .ranks
            .get(action)
            .ok_or_else(|| ConfigError::unranked(action, format!("wild access for '{}'", user_id)))?;
        self.wild.insert(user_id, layer, rank);
        debug!(user = user_id, layer, action, rank, "Added wild access");
        Ok(())
    }

    /// Wildcard rank of a user on a layer, 0 when none applies
    pub fn wild_access(&self, user_id: &str, layer: Option<&str>) -> Rank {
        self.wild.rank_for(user_id, layer)
    }

    /// Record a direct grant of `action` on a node
    pub async fn add_direct_access(
        &self,
        user_id: &str,
        node_id: &str,
        action: &str,
    ) -> Result<(), AppError> {
        let rank = self
            .ranks
            .get(action)
            .ok_or_else(|| ConfigError::unranked(action, format!("direct access for '{}'", user_id)))?;
        let update = RelationUpdate::new().add(
            MEMBERS_RELATION,
            RelationMember::persistent(node_key(node_id), Score::from(rank)),
        );
        self.store.update_relation(&user_key(user_id), &update).await?;
        debug!(user = user_id, node = node_id, action, rank, "Added direct access");
        Ok(())
    }

    /// Forget any direct grant or block on a node
    pub async fn remove_direct_access(&self, user_id: &str, node_id: &str) -> StoreResult<()> {
        let update = RelationUpdate::new().remove(MEMBERS_RELATION, node_key(node_id));
        self.store.update_relation(&user_key(user_id), &update).await?;
        debug!(user = user_id, node = node_id, "Removed direct access");
        Ok(())
    }

    /// Record an explicit direct block on a node
    pub async fn block_direct_access(&self, user_id: &str, node_id: &str) -> StoreResult<()> {
        let update = RelationUpdate::new().add(
            MEMBERS_RELATION,
            RelationMember::persistent(node_key(node_id), BLOCK_SCORE),
        );
        self.store.update_relation(&user_key(user_id), &update).await?;
        debug!(user = user_id, node = node_id, "Blocked direct access");
        Ok(())
    }

    /// Block a user on every node whose path contains `node_prefix`
    pub async fn block_user(&self, user_id: &str, node_prefix: &str) -> StoreResult<()> {
        let update = RelationUpdate::new().add(
            BLOCKED_RELATION,
            RelationMember::persistent(node_key(node_prefix), BLOCKED_MEMBER_SCORE),
        );
        self.store.update_relation(&user_key(user_id), &update).await?;
        info!(user = user_id, prefix = node_prefix, "Blocked user");
        Ok(())
    }

    pub async fn unblock_user(&self, user_id: &str, node_prefix: &str) -> StoreResult<()> {
        let update = RelationUpdate::new().remove(BLOCKED_RELATION, node_key(node_prefix));
        self.store.update_relation(&user_key(user_id), &update).await?;
        info!(user = user_id, prefix = node_prefix, "Unblocked user");
        Ok(())
    }

    /// Id of the `layer` segment inside a decoded token's layer/id paths
    pub fn layer_id_from_token<'a>(
        &self,
        token_layer: &str,
        token_id: &'a str,
        layer: &str,
    ) -> Option<&'a str> {
        path::segment_for_layer(token_layer, token_id, layer)
    }
}
