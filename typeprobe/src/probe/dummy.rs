//! Dummy instance building
//!
//! Best-effort construction of one representative value per catalogued
//! type. Construction runs inside the sandbox; a type whose constructor
//! cannot be satisfied is simply left without an instance.

use tracing::{debug, trace};

use crate::catalog::{FrozenCatalog, TypeIndex};
use crate::extract::{Binding, guarded, strip_receiver};
use crate::runtime::Runtime;
use crate::runtime::sandbox::Sandbox;

/// At most one value per catalog index.
#[derive(Debug, Clone)]
pub struct DummyInstances<V> {
    slots: Vec<Option<V>>,
}

impl<V> DummyInstances<V> {
    pub fn get(&self, index: TypeIndex) -> Option<&V> {
        index.slot().and_then(|slot| self.slots.get(slot)).and_then(Option::as_ref)
    }

    /// Number of types that have an instance.
    pub fn available(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Indices (top type excluded) that could not be instantiated.
    pub fn unavailable(&self) -> impl Iterator<Item = TypeIndex> + '_ {
        self.slots
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, slot)| slot.is_none())
            .map(|(slot, _)| TypeIndex::new(slot as i32))
    }
}

/// Build instances for every probed type of a frozen catalog.
pub fn build_dummies<R: Runtime>(
    sandbox: &mut Sandbox<R>,
    catalog: &FrozenCatalog,
) -> DummyInstances<R::Value> {
    let mut slots = Vec::with_capacity(catalog.len());
    // The top type is never probed.
    slots.push(None);
    for index in catalog.probe_indices() {
        let name = catalog.resolve(index).unwrap_or_default();
        let instance = build_instance(sandbox, name);
        if instance.is_none() {
            debug!(type_name = name, "no dummy instance");
        }
        slots.push(instance);
    }
    DummyInstances { slots }
}

/// Construct a value of the type called `type_name`.
///
/// Tries a zero-argument construction first, then fills every required
/// positional constructor parameter with the runtime's placeholder.
pub fn build_instance<R: Runtime>(sandbox: &mut Sandbox<R>, type_name: &str) -> Option<R::Value> {
    let runtime = std::sync::Arc::clone(sandbox.context());
    let class = runtime.lookup_class(type_name)?;

    let target = class.clone();
    match sandbox.invoke(move |rt: &R| rt.instantiate(&target, &[])) {
        Ok(value) => return Some(value),
        Err(fault) => trace!(type_name, "zero-argument construction failed: {fault}"),
    }

    let signature = match guarded(type_name, || runtime.constructor_signature(&class)) {
        Ok(signature) => signature,
        Err(e) => {
            trace!(type_name, "constructor introspection failed: {e}");
            return None;
        }
    };
    let required = strip_receiver(&signature.params, Binding::Instance)
        .iter()
        .filter(|p| p.kind.is_positional() && !p.has_default)
        .count();
    if required == 0 {
        return None;
    }

    let args = vec![runtime.placeholder(); required];
    match sandbox.invoke(move |rt: &R| rt.instantiate(&class, &args)) {
        Ok(value) => Some(value),
        Err(fault) => {
            trace!(type_name, required, "placeholder construction failed: {fault}");
            None
        }
    }
}
