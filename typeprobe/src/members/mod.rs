//! Member walking
//!
//! Enumerates the attributes declared on a class, drops excluded names,
//! classifies each survivor as callable or data and derives its binding kind
//! from how it was declared.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{TypeCatalog, TypeIndex};
use crate::extract::{self, Binding, SignatureRecord, Strategy};
use crate::runtime::{AttrValue, Runtime, Wrapper};

/// How denylist tokens are matched against names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Excluded if the name contains any token.
    #[default]
    Substring,
    /// Excluded if the name equals a token.
    Exact,
}

/// Name filter applied to namespace entries and class members alike.
#[derive(Debug, Clone)]
pub struct Exclusions {
    tokens: Vec<String>,
    mode: MatchMode,
    skip_dunder: bool,
}

impl Exclusions {
    pub fn new(tokens: Vec<String>, mode: MatchMode, skip_dunder: bool) -> Self {
        Exclusions {
            tokens,
            mode,
            skip_dunder,
        }
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        if self.skip_dunder && is_dunder(name) {
            return true;
        }
        match self.mode {
            MatchMode::Substring => self.tokens.iter().any(|t| name.contains(t.as_str())),
            MatchMode::Exact => self.tokens.iter().any(|t| t == name),
        }
    }
}

/// `__name__`-style protocol hooks.
pub fn is_dunder(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

/// Callable members carry a signature; data members only a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberKind {
    Callable {
        signature: SignatureRecord,
        strategy: Strategy,
    },
    Data(TypeIndex),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRecord {
    pub name: String,
    pub binding: Binding,
    pub kind: MemberKind,
}

impl MemberRecord {
    pub fn is_callable(&self) -> bool {
        matches!(self.kind, MemberKind::Callable { .. })
    }

    /// Qualified name, `Class.member`.
    pub fn qualified(&self, class_name: &str) -> String {
        format!("{class_name}.{}", self.name)
    }
}

impl From<Wrapper> for Binding {
    fn from(wrapper: Wrapper) -> Self {
        match wrapper {
            Wrapper::Plain => Binding::Instance,
            Wrapper::ClassLevel => Binding::Class,
            Wrapper::ReceiverFree => Binding::Static,
        }
    }
}

/// Walk the attributes of `class`, known in the catalog as `class_name`.
pub fn walk_class<R: Runtime>(
    runtime: &R,
    catalog: &mut TypeCatalog,
    class: &R::Class,
    class_name: &str,
    exclusions: &Exclusions,
) -> Vec<MemberRecord> {
    let mut members = Vec::new();
    for attr in runtime.attributes(class) {
        if exclusions.is_excluded(&attr.name) {
            debug!(class = class_name, member = %attr.name, "member excluded");
            continue;
        }
        let binding = Binding::from(attr.wrapper);
        let kind = match &attr.value {
            AttrValue::Function(function) => {
                let out = extract::extract(runtime, catalog, function, Some(class_name), binding);
                MemberKind::Callable {
                    signature: out.record,
                    strategy: out.strategy,
                }
            }
            AttrValue::Data { type_name } => MemberKind::Data(catalog.intern(type_name)),
        };
        members.push(MemberRecord {
            name: attr.name,
            binding,
            kind,
        });
    }
    members
}
