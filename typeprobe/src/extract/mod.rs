//! Signature extraction
//!
//! Converts one callable's formal interface into a [`SignatureRecord`].
//! Strategies are tried in order until one yields a parameter list:
//!
//! 1. structured introspection ([`Runtime::signature`])
//! 2. the textual signature ([`Runtime::text_signature`])
//! 3. the first line of the documentation ([`Runtime::doc`])
//! 4. a conservative default of two top-typed parameters
//!
//! Extraction never fails: every fault in a strategy demotes the callable
//! to the next one.

pub mod text;

use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::catalog::{TOP_TYPE, TypeCatalog, TypeIndex};
use crate::runtime::{Annotation, IntrospectError, Param, Runtime, Signature};

pub use text::{TextShape, parse_text_signature};

/// Parameter count used when nothing is known about a callable.
pub const DEFAULT_ARITY: usize = 2;

/// How a callable is bound to its class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Binding {
    /// First formal parameter is the instance.
    Instance,
    /// First formal parameter is the class.
    Class,
    /// No implicit receiver.
    Static,
}

impl Binding {
    pub fn has_receiver(self) -> bool {
        !matches!(self, Binding::Static)
    }
}

/// Normalized signature of one callable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRecord {
    /// Receiver excluded.
    pub param_types: Vec<TypeIndex>,
    /// `-1` when unbound, static or free-standing.
    pub self_type: TypeIndex,
    pub return_type: TypeIndex,
}

impl SignatureRecord {
    pub fn indices(&self) -> impl Iterator<Item = TypeIndex> + '_ {
        self.param_types
            .iter()
            .copied()
            .chain([self.self_type, self.return_type])
    }
}

/// Which strategy produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    Structured,
    TextSignature,
    Doc,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub record: SignatureRecord,
    pub strategy: Strategy,
}

/// Extract the signature of `function`.
///
/// `receiver` is the catalog name of the owning class, if any.
pub fn extract<R: Runtime>(
    runtime: &R,
    catalog: &mut TypeCatalog,
    function: &R::Function,
    receiver: Option<&str>,
    binding: Binding,
) -> Extracted {
    let self_type = match receiver {
        Some(name) if binding.has_receiver() => catalog.intern(name),
        _ => TypeIndex::NONE,
    };

    match structured(runtime, function) {
        Ok(signature) => {
            return Extracted {
                record: from_structured(catalog, &signature, binding, self_type),
                strategy: Strategy::Structured,
            };
        }
        Err(e) => trace!("structured introspection unavailable: {e}"),
    }

    if let Some(shape) = runtime
        .text_signature(function)
        .as_deref()
        .and_then(parse_text_signature)
    {
        return Extracted {
            record: top_typed(shape.bound_arity(binding), self_type),
            strategy: Strategy::TextSignature,
        };
    }

    if let Some(shape) = runtime
        .doc(function)
        .as_deref()
        .and_then(|doc| doc.lines().next())
        .and_then(parse_text_signature)
    {
        return Extracted {
            record: top_typed(shape.bound_arity(binding), self_type),
            strategy: Strategy::Doc,
        };
    }

    Extracted {
        record: top_typed(DEFAULT_ARITY, self_type),
        strategy: Strategy::Default,
    }
}

fn structured<R: Runtime>(runtime: &R, function: &R::Function) -> Result<Signature, IntrospectError> {
    guarded("<callable>", || runtime.signature(function))
}

/// Run one introspection call with panics in the runtime demoted to errors.
pub fn guarded<T>(
    subject: &str,
    call: impl FnOnce() -> Result<T, IntrospectError>,
) -> Result<T, IntrospectError> {
    panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|_| {
        Err(IntrospectError::Unsupported {
            name: subject.to_string(),
            reason: "introspection panicked".to_string(),
        })
    })
}

fn from_structured(
    catalog: &mut TypeCatalog,
    signature: &Signature,
    binding: Binding,
    self_type: TypeIndex,
) -> SignatureRecord {
    let param_types = strip_receiver(&signature.params, binding)
        .iter()
        .filter(|p| !p.kind.is_variadic())
        .map(|p| catalog.intern(&normalize_annotation(&p.annotation)))
        .collect();
    SignatureRecord {
        param_types,
        self_type,
        return_type: catalog.intern(&normalize_annotation(&signature.returns)),
    }
}

fn top_typed(arity: usize, self_type: TypeIndex) -> SignatureRecord {
    SignatureRecord {
        param_types: vec![TypeIndex::TOP; arity],
        self_type,
        return_type: TypeIndex::TOP,
    }
}

/// Drop the implicit receiver from a formal parameter list.
///
/// Only instance and class bindings have one, and only a leading `self` or
/// `cls` counts.
pub fn strip_receiver(params: &[Param], binding: Binding) -> &[Param] {
    match params.split_first() {
        Some((first, rest))
            if binding.has_receiver()
                && !first.kind.is_variadic()
                && matches!(first.name.as_str(), "self" | "cls") =>
        {
            rest
        }
        _ => params,
    }
}

/// Map an annotation to a catalog type name.
pub fn normalize_annotation(annotation: &Annotation) -> String {
    let name = match annotation {
        Annotation::Empty | Annotation::Any | Annotation::None => return TOP_TYPE.to_string(),
        Annotation::Named(name) => name.trim(),
        Annotation::Forward(arg) => arg.trim().trim_matches(|c| c == '\'' || c == '"'),
    };
    match name {
        "" | "Any" | "typing.Any" | "object" => TOP_TYPE.to_string(),
        other => other.to_string(),
    }
}
