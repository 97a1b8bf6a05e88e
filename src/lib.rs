//! SharkFin access engine
//!
//! A layered authorization decision engine: given a user, a resource
//! addressed by a hierarchical path, an action and ownership context, it
//! decides whether the action is permitted.
//!
//! ## Features
//!
//! - **Ranked actions** - actions are totally ordered by privilege
//! - **Layer policies** with per-variant overrides and inheritance up the hierarchy
//! - **Wildcard grants** for role-style access on whole subtrees of layers
//! - **Direct grants and blocks** per resource, kept in a graph relation store
//! - **Flexible configuration** via TOML files and environment variables
//!
//! ## Decision Order
//!
//! ```text
//! block → owner → wildcard → no_one_can → anyone_can → direct → inherit → deny
//! ```
//!
//! ## Example
//!
//! ```ignore
//! let store = Arc::new(MemoryGraphStore::new());
//! let engine = SharkFin::from_config(&config.access, store)?;
//!
//! let request = AccessRequest::new("u1", "read")
//!     .layer("school.classroom")
//!     .node("s1.c7");
//! if engine.is_granted(&request).await? {
//!     // serve the classroom
//! }
//! ```

pub mod access;
pub mod config;
pub mod error;
pub mod store;

// Re-export main types
pub use access::{AccessDecision, AccessRequest, Rule, SharkFin};
pub use config::{AppConfig, load_config};
pub use error::{AppError, Result};
pub use store::{GraphStore, HttpGraphStore, MemoryGraphStore};
