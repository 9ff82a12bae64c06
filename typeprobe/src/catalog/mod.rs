//! Type catalog
//!
//! An append-only registry of type identifiers. Every other structure in a
//! harvest refers to types by [`TypeIndex`], never by name, so the catalog is
//! the single source of truth for type identity.
//!
//! The catalog lives in two phases:
//!
//! ```text
//! TypeCatalog (growing) --freeze()--> FrozenCatalog (read-only)
//!   extraction, member walking          dummy building, probing, serialization
//! ```
//!
//! Interning is only available on [`TypeCatalog`], so growing the catalog
//! while operators are probed cannot be expressed.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProbeError, Result};
use crate::members::Exclusions;

/// Name of the universal top type. Always catalog index 0.
pub const TOP_TYPE: &str = "object";

/// Index of a type in the catalog.
///
/// `-1` is the "absent / not applicable" sentinel (no receiver, no return).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeIndex(i32);

impl TypeIndex {
    /// Sentinel for "no applicable type".
    pub const NONE: TypeIndex = TypeIndex(-1);
    /// The top type.
    pub const TOP: TypeIndex = TypeIndex(0);

    pub fn new(raw: i32) -> Self {
        TypeIndex(raw)
    }

    pub fn raw(self) -> i32 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 == -1
    }

    /// Position in the catalog, or `None` for the sentinel.
    pub fn slot(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }

    fn from_slot(slot: usize) -> Self {
        TypeIndex(slot as i32)
    }
}

impl fmt::Display for TypeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Growing catalog, used while callables and members are extracted.
#[derive(Debug, Clone)]
pub struct TypeCatalog {
    names: Vec<String>,
    lookup: HashMap<String, TypeIndex>,
    exclusions: Option<Exclusions>,
    denied: usize,
}

impl TypeCatalog {
    /// Create a catalog seeded with the top type.
    pub fn new() -> Self {
        let mut catalog = TypeCatalog {
            names: Vec::new(),
            lookup: HashMap::new(),
            exclusions: None,
            denied: 0,
        };
        catalog.intern(TOP_TYPE);
        catalog
    }

    /// Create a catalog that never admits an excluded type name. Such names
    /// intern as the top type, so they are neither listed nor probed.
    pub fn excluding(exclusions: Exclusions) -> Self {
        TypeCatalog {
            exclusions: Some(exclusions),
            ..Self::new()
        }
    }

    /// Return the index of `name`, appending it if it is new.
    ///
    /// An empty name maps to [`TypeIndex::NONE`] and is not inserted; an
    /// excluded name maps to [`TypeIndex::TOP`].
    pub fn intern(&mut self, name: &str) -> TypeIndex {
        if name.is_empty() {
            return TypeIndex::NONE;
        }
        if let Some(&index) = self.lookup.get(name) {
            return index;
        }
        if self.exclusions.as_ref().is_some_and(|ex| ex.is_excluded(name)) {
            debug!(name, "excluded type name interned as top type");
            self.denied += 1;
            return TypeIndex::TOP;
        }
        let index = TypeIndex::from_slot(self.names.len());
        self.names.push(name.to_string());
        self.lookup.insert(name.to_string(), index);
        index
    }

    pub fn get(&self, name: &str) -> Option<TypeIndex> {
        self.lookup.get(name).copied()
    }

    /// Inverse of [`intern`](Self::intern), for diagnostics.
    pub fn resolve(&self, index: TypeIndex) -> Option<&str> {
        index
            .slot()
            .and_then(|slot| self.names.get(slot))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Never true: the top type is always present.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// How many excluded names were turned away.
    pub fn denied(&self) -> usize {
        self.denied
    }

    /// End the growth phase.
    pub fn freeze(self) -> FrozenCatalog {
        FrozenCatalog {
            names: self.names,
            lookup: self.lookup,
        }
    }
}

impl Default for TypeCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only catalog, used for probing and serialization.
#[derive(Debug, Clone)]
pub struct FrozenCatalog {
    names: Vec<String>,
    lookup: HashMap<String, TypeIndex>,
}

impl FrozenCatalog {
    pub fn get(&self, name: &str) -> Option<TypeIndex> {
        self.lookup.get(name).copied()
    }

    pub fn resolve(&self, index: TypeIndex) -> Option<&str> {
        index
            .slot()
            .and_then(|slot| self.names.get(slot))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Every index except the top type, in catalog order.
    pub fn probe_indices(&self) -> impl Iterator<Item = TypeIndex> {
        (1..self.names.len()).map(TypeIndex::from_slot)
    }

    pub fn into_names(self) -> Vec<String> {
        self.names
    }
}

/// Check that `index` is the sentinel or a position in a catalog of `len`
/// types.
pub fn check_index(index: TypeIndex, len: usize) -> Result<()> {
    if index.is_none() || index.slot().is_some_and(|slot| slot < len) {
        Ok(())
    } else {
        Err(ProbeError::DanglingType {
            index: index.raw(),
            len,
        })
    }
}
