//! Knowledge base document
//!
//! The single serialized artifact of a harvest:
//!
//! ```text
//! { "types": [...], "funcs": {...}, "ops": [...], "uops": [...] }
//! ```
//!
//! `funcs` comes in two layouts, see [`Layout`]. Consumers read the document
//! back with [`KnowledgeBase::load`].

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::{FrozenCatalog, TOP_TYPE, TypeIndex, check_index};
use crate::error::{ProbeError, Result};
use crate::extract::SignatureRecord;
use crate::members::{MemberKind, MemberRecord};
use crate::probe::OperatorTables;

/// Bucket key for free callables and plain namespace values.
pub const UNBOUND_BUCKET: &str = "-1";

/// Shape of the `funcs` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Per-class member lists keyed by type index.
    #[default]
    Grouped,
    /// Qualified callable name to signature.
    Flat,
}

/// One entry of a grouped member list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberEntry {
    pub name: String,
    pub is_callable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub func_sig: Option<SignatureRecord>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_index: Option<TypeIndex>,
}

impl MemberEntry {
    fn callable(name: &str, signature: SignatureRecord) -> Self {
        MemberEntry {
            name: name.to_string(),
            is_callable: true,
            func_sig: Some(signature),
            type_index: None,
        }
    }

    fn data(name: &str, type_index: TypeIndex) -> Self {
        MemberEntry {
            name: name.to_string(),
            is_callable: false,
            func_sig: None,
            type_index: Some(type_index),
        }
    }
}

impl From<&MemberRecord> for MemberEntry {
    fn from(member: &MemberRecord) -> Self {
        match &member.kind {
            MemberKind::Callable { signature, .. } => Self::callable(&member.name, signature.clone()),
            MemberKind::Data(index) => Self::data(&member.name, *index),
        }
    }
}

/// The `funcs` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Funcs {
    Grouped(BTreeMap<String, Vec<MemberEntry>>),
    Flat(BTreeMap<String, SignatureRecord>),
}

impl Funcs {
    pub fn new(layout: Layout) -> Self {
        match layout {
            Layout::Grouped => Funcs::Grouped(BTreeMap::new()),
            Layout::Flat => Funcs::Flat(BTreeMap::new()),
        }
    }

    /// Record a walked class. A class without members still gets a bucket.
    pub fn add_class(&mut self, class_index: TypeIndex, class_name: &str, members: &[MemberRecord]) {
        match self {
            Funcs::Grouped(buckets) => buckets
                .entry(class_index.to_string())
                .or_default()
                .extend(members.iter().map(MemberEntry::from)),
            Funcs::Flat(map) => {
                for member in members {
                    if let MemberKind::Callable { signature, .. } = &member.kind {
                        map.insert(member.qualified(class_name), signature.clone());
                    }
                }
            }
        }
    }

    pub fn add_function(&mut self, name: &str, signature: SignatureRecord) {
        match self {
            Funcs::Grouped(buckets) => buckets
                .entry(UNBOUND_BUCKET.to_string())
                .or_default()
                .push(MemberEntry::callable(name, signature)),
            Funcs::Flat(map) => {
                map.insert(name.to_string(), signature);
            }
        }
    }

    /// Plain values only appear in the grouped layout.
    pub fn add_value(&mut self, name: &str, type_index: TypeIndex) {
        if let Funcs::Grouped(buckets) = self {
            buckets
                .entry(UNBOUND_BUCKET.to_string())
                .or_default()
                .push(MemberEntry::data(name, type_index));
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Funcs::Grouped(buckets) => buckets.values().map(Vec::len).sum(),
            Funcs::Flat(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The serialized knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub types: Vec<String>,
    pub funcs: Funcs,
    pub ops: Vec<Vec<Vec<TypeIndex>>>,
    pub uops: Vec<Vec<TypeIndex>>,
}

impl KnowledgeBase {
    /// Assemble and validate the document.
    pub fn assemble(catalog: FrozenCatalog, funcs: Funcs, tables: OperatorTables) -> Result<Self> {
        let kb = KnowledgeBase {
            types: catalog.into_names(),
            funcs,
            ops: tables.binary,
            uops: tables.unary,
        };
        kb.validate()?;
        Ok(kb)
    }

    /// Check every cross-reference into `types`.
    pub fn validate(&self) -> Result<()> {
        if self.types.first().map(String::as_str) != Some(TOP_TYPE) {
            return Err(ProbeError::malformed(format!("index 0 must be `{TOP_TYPE}`")));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.types.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(ProbeError::malformed(format!("duplicate type `{dup}`")));
        }

        let len = self.types.len();
        // Probe results never name the sentinel or the top type.
        let check_probed = |index: TypeIndex| -> Result<()> {
            if index.raw() < 1 {
                return Err(ProbeError::DanglingType {
                    index: index.raw(),
                    len,
                });
            }
            check_index(index, len)
        };

        for signature in self.signatures().map(|(_, sig)| sig) {
            for index in signature.indices() {
                check_index(index, len)?;
            }
        }
        if let Funcs::Grouped(buckets) = &self.funcs {
            for (key, entries) in buckets {
                let bucket: i32 = key
                    .parse()
                    .map_err(|_| ProbeError::malformed(format!("bad bucket key `{key}`")))?;
                check_index(TypeIndex::new(bucket), len)?;
                for index in entries.iter().filter_map(|e| e.type_index) {
                    check_index(index, len)?;
                }
            }
        }
        for table in &self.ops {
            if table.len() != len {
                return Err(ProbeError::malformed(format!(
                    "operator table has {} rows for {len} types",
                    table.len()
                )));
            }
            for index in table.iter().flatten() {
                check_probed(*index)?;
            }
        }
        for index in self.uops.iter().flatten() {
            check_probed(*index)?;
        }
        Ok(())
    }

    /// Every signature with its qualified name.
    pub fn signatures(&self) -> Box<dyn Iterator<Item = (String, &SignatureRecord)> + '_> {
        match &self.funcs {
            Funcs::Flat(map) => Box::new(map.iter().map(|(name, sig)| (name.clone(), sig))),
            Funcs::Grouped(buckets) => Box::new(buckets.iter().flat_map(move |(key, entries)| {
                let owner = self.owner_name(key);
                entries.iter().filter_map(move |e| {
                    let sig = e.func_sig.as_ref()?;
                    let name = match owner {
                        Some(class) => format!("{class}.{}", e.name),
                        None => e.name.clone(),
                    };
                    Some((name, sig))
                })
            })),
        }
    }

    fn owner_name(&self, bucket: &str) -> Option<&str> {
        let index: usize = bucket.parse().ok()?;
        self.types.get(index).map(String::as_str)
    }

    pub fn type_index(&self, name: &str) -> Option<TypeIndex> {
        self.types
            .iter()
            .position(|t| t == name)
            .map(|slot| TypeIndex::new(slot as i32))
    }

    /// Look up a callable by qualified name (`Class.member` or a bare name).
    pub fn callable(&self, qualified: &str) -> Option<&SignatureRecord> {
        match &self.funcs {
            Funcs::Flat(map) => map.get(qualified),
            Funcs::Grouped(buckets) => {
                let (bucket, member) = match qualified.split_once('.') {
                    Some((class, member)) => (self.type_index(class)?.to_string(), member),
                    None => (UNBOUND_BUCKET.to_string(), qualified),
                };
                buckets
                    .get(&bucket)?
                    .iter()
                    .find(|e| e.name == member)
                    .and_then(|e| e.func_sig.as_ref())
            }
        }
    }

    /// Whether `name` appears as a type, or as a callable, member or value
    /// anywhere in `funcs`.
    pub fn mentions(&self, name: &str) -> bool {
        if self.types.iter().any(|t| t == name) {
            return true;
        }
        match &self.funcs {
            Funcs::Flat(map) => map
                .keys()
                .any(|key| key == name || key.rsplit('.').next() == Some(name)),
            Funcs::Grouped(buckets) => buckets.values().flatten().any(|e| e.name == name),
        }
    }

    /// Whether `left <op> right` completed, `op` being a position in `ops`.
    pub fn succeeds(&self, op: usize, left: TypeIndex, right: TypeIndex) -> bool {
        left.slot()
            .and_then(|slot| self.ops.get(op)?.get(slot))
            .is_some_and(|row| row.contains(&right))
    }

    pub fn unary_succeeds(&self, op: usize, operand: TypeIndex) -> bool {
        self.uops.get(op).is_some_and(|row| row.contains(&operand))
    }

    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }

    /// Write the document to `path`.
    pub fn write_to(&self, path: &Path, pretty: bool) -> Result<()> {
        let json = self.to_json(pretty)?;
        fs::write(path, json).map_err(|e| ProbeError::io(path, e))
    }

    /// Read and validate a document written by [`write_to`](Self::write_to).
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| ProbeError::io(path, e))?;
        let kb: KnowledgeBase = serde_json::from_str(&text)?;
        kb.validate()?;
        Ok(kb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TypeCatalog;
    use crate::extract::{Binding, Strategy};

    fn record(params: &[i32], self_type: i32, ret: i32) -> SignatureRecord {
        SignatureRecord {
            param_types: params.iter().map(|&i| TypeIndex::new(i)).collect(),
            self_type: TypeIndex::new(self_type),
            return_type: TypeIndex::new(ret),
        }
    }

    fn members() -> Vec<MemberRecord> {
        vec![
            MemberRecord {
                name: "upper".into(),
                binding: Binding::Instance,
                kind: MemberKind::Callable {
                    signature: record(&[], 1, 1),
                    strategy: Strategy::TextSignature,
                },
            },
            MemberRecord {
                name: "EMPTY".into(),
                binding: Binding::Instance,
                kind: MemberKind::Data(TypeIndex::new(1)),
            },
        ]
    }

    fn sample(layout: Layout) -> KnowledgeBase {
        let mut catalog = TypeCatalog::new();
        let s = catalog.intern("str");
        let mut funcs = Funcs::new(layout);
        funcs.add_class(s, "str", &members());
        funcs.add_function("len", record(&[0], -1, 0));
        funcs.add_value("True", s);
        let tables = OperatorTables {
            binary: vec![vec![vec![], vec![s]]],
            unary: vec![vec![s]],
        };
        KnowledgeBase::assemble(catalog.freeze(), funcs, tables).unwrap()
    }

    #[test]
    fn test_grouped_layout_json() {
        let kb = sample(Layout::Grouped);
        let json: serde_json::Value = serde_json::from_str(&kb.to_json(false).unwrap()).unwrap();
        assert_eq!(json["types"], serde_json::json!(["object", "str"]));
        assert_eq!(json["funcs"]["1"][0]["name"], "upper");
        assert_eq!(json["funcs"]["1"][0]["isCallable"], true);
        assert_eq!(json["funcs"]["1"][0]["funcSig"]["selfType"], 1);
        assert!(json["funcs"]["1"][0].get("type").is_none());
        assert_eq!(json["funcs"]["1"][1]["type"], 1);
        assert_eq!(json["funcs"]["-1"][0]["funcSig"]["paramTypes"], serde_json::json!([0]));
        assert_eq!(json["funcs"]["-1"][1]["name"], "True");
        assert_eq!(json["ops"], serde_json::json!([[[], [1]]]));
    }

    #[test]
    fn test_flat_layout_skips_data() {
        let kb = sample(Layout::Flat);
        assert_eq!(kb.funcs.len(), 2);
        assert!(kb.callable("str.upper").is_some());
        assert!(kb.callable("len").is_some());
        assert!(!kb.mentions("EMPTY"));
        assert!(!kb.mentions("True"));
    }

    #[test]
    fn test_lookup_helpers_agree_across_layouts() {
        for layout in [Layout::Grouped, Layout::Flat] {
            let kb = sample(layout);
            let s = kb.type_index("str").unwrap();
            assert_eq!(kb.callable("str.upper").unwrap().self_type, s);
            assert_eq!(kb.callable("len").unwrap().self_type, TypeIndex::NONE);
            assert!(kb.mentions("upper"));
            assert!(kb.succeeds(0, s, s));
            assert!(!kb.succeeds(0, TypeIndex::TOP, s));
            assert!(kb.unary_succeeds(0, s));
            let names: Vec<_> = kb.signatures().map(|(name, _)| name).collect();
            assert!(names.contains(&"str.upper".to_string()));
        }
    }

    #[test]
    fn test_validate_rejects_dangling_index() {
        let mut kb = sample(Layout::Grouped);
        if let Funcs::Grouped(buckets) = &mut kb.funcs {
            buckets.get_mut("-1").unwrap()[0].func_sig = Some(record(&[9], -1, 0));
        }
        assert!(matches!(kb.validate(), Err(ProbeError::DanglingType { index: 9, len: 2 })));
    }

    #[test]
    fn test_validate_rejects_top_type_in_table() {
        let mut kb = sample(Layout::Grouped);
        kb.ops[0][1].push(TypeIndex::TOP);
        assert!(matches!(kb.validate(), Err(ProbeError::DanglingType { index: 0, .. })));
    }

    #[test]
    fn test_validate_rejects_duplicate_types() {
        let mut kb = sample(Layout::Flat);
        kb.types.push("str".into());
        kb.ops.clear();
        assert!(matches!(kb.validate(), Err(ProbeError::Malformed { .. })));
    }

    #[test]
    fn test_write_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.json");
        let kb = sample(Layout::Grouped);
        kb.write_to(&path, true).unwrap();
        assert_eq!(KnowledgeBase::load(&path).unwrap(), kb);
    }
}
