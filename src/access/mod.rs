//! Access control module
//!
//! Layered authorization over a hierarchy of resource kinds ("layers") and
//! resource instances ("nodes").
//!
//! ## Access Control Model
//!
//! - Every action has a positive **rank**; a higher rank implies the lower ones.
//! - Every layer has one or more policy **variants** with up to four rules:
//!   `owner_can`, `anyone_can`, `no_one_can` and `inherit`.
//! - **Wildcard** grants give a user a rank on a layer and everything below it.
//! - **Direct** grants and blocks on single nodes, and node **blocks** by
//!   prefix, live in the graph relation store.
//!
//! The order in which these are consulted is documented on [`engine`].
//!
//! ## Example Configuration
//!
//! ```toml
//! [access.actions]
//! read = 1
//! write = 2
//! admin = 3
//!
//! [access.layers.school._default]
//! anyone_can = "read"
//! owner_can = "admin"
//!
//! [access.layers.school.classroom._default]
//! owner_can = "write"
//! inherit = true
//!
//! [[access.wild]]
//! user_id = "superadmin"
//! layer = ""
//! action = "admin"
//! ```

pub mod engine;
pub mod layers;
pub mod path;
pub mod rank;
pub mod wild;

pub use engine::{AccessDecision, AccessRequest, Rule, SharkFin};
pub use layers::{LayerTree, Policy};
pub use rank::{Rank, RankTable, UNRANKED_CEILING};
pub use wild::WildcardStore;
