//! typeprobe Library
//!
//! Builds a knowledge base of a dynamic runtime's builtin surface: every
//! class, callable and value it exposes, the normalized signature of each
//! callable, and empirically probed operator compatibility between types.

pub mod catalog;
pub mod config;
pub mod error;
pub mod extract;
pub mod harvest;
pub mod interp;
pub mod kb;
pub mod members;
pub mod probe;
pub mod runtime;

pub use catalog::{FrozenCatalog, TOP_TYPE, TypeCatalog, TypeIndex};
pub use config::ProbeConfig;
pub use error::{ProbeError, Result};
pub use harvest::Harvester;
pub use kb::{KnowledgeBase, Layout};
pub use runtime::Runtime;
