//! Integration tests for typeprobe
//!
//! Runs full harvests against the bundled interpreter and checks the
//! resulting knowledge base:
//! - Catalog and cross-reference integrity
//! - Exclusion of denylisted names at every level
//! - Operator probing results
//! - Layouts, serialization and declared locals

use std::sync::Arc;

use typeprobe::extract::DEFAULT_ARITY;
use typeprobe::interp::{Declarations, Interpreter};
use typeprobe::kb::{Funcs, UNBOUND_BUCKET};
use typeprobe::runtime::{BinaryOp, UnaryOp};
use typeprobe::{Harvester, KnowledgeBase, Layout, ProbeConfig, TOP_TYPE, TypeIndex};

/// Helper to harvest the builtin interpreter with a config
fn harvest_with(config: ProbeConfig) -> KnowledgeBase {
    Harvester::new(Arc::new(Interpreter::new()), config)
        .run()
        .expect("harvest should succeed")
}

/// Helper to harvest with defaults and a generous probe timeout
fn harvest() -> KnowledgeBase {
    harvest_with(ProbeConfig {
        probe_timeout_ms: 1000,
        ..ProbeConfig::default()
    })
}

/// Helper to harvest builtins plus declared locals
fn harvest_declared(decls: &str) -> KnowledgeBase {
    let decls = Declarations::from_toml_str(decls).expect("declarations should parse");
    let interp = Interpreter::with_declarations(&decls).expect("declarations should apply");
    let config = ProbeConfig {
        probe_timeout_ms: 1000,
        ..ProbeConfig::default()
    };
    Harvester::new(Arc::new(interp), config).run().expect("harvest should succeed")
}

fn op_position(op: BinaryOp) -> usize {
    BinaryOp::ALL.iter().position(|&o| o == op).unwrap()
}

fn idx(kb: &KnowledgeBase, name: &str) -> TypeIndex {
    kb.type_index(name).unwrap_or_else(|| panic!("type {name} should be catalogued"))
}

// ============================================
// Catalog Integrity
// ============================================

#[test]
fn test_top_type_first_and_names_unique() {
    let kb = harvest();
    assert_eq!(kb.types[0], TOP_TYPE);
    let mut sorted = kb.types.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), kb.types.len());
}

#[test]
fn test_every_index_resolves() {
    let kb = harvest();
    let len = kb.types.len() as i32;
    for (name, sig) in kb.signatures() {
        for index in sig.indices() {
            assert!(index.raw() >= -1 && index.raw() < len, "{name} references {index}");
        }
    }
    assert!(kb.validate().is_ok());
}

#[test]
fn test_signature_only_types_are_catalogued() {
    let kb = harvest();
    // Mentioned only by annotations, never bound to a class.
    let number = idx(&kb, "Number");
    let clamp = kb.callable("clamp").unwrap();
    assert_eq!(clamp.param_types, vec![number]);
    assert_eq!(clamp.return_type, number);
}

#[test]
fn test_value_types_are_catalogued() {
    let kb = harvest();
    assert!(kb.type_index("NoneType").is_some());
    assert!(kb.type_index("ellipsis").is_some());
    let Funcs::Grouped(buckets) = &kb.funcs else {
        panic!("expected grouped layout");
    };
    let none = buckets[UNBOUND_BUCKET].iter().find(|e| e.name == "None").unwrap();
    assert!(!none.is_callable);
    assert_eq!(none.type_index, Some(idx(&kb, "NoneType")));
}

// ============================================
// Exclusions
// ============================================

#[test]
fn test_denylisted_names_absent() {
    let kb = harvest();
    for name in ["eval", "exec", "compile", "open", "input", "print", "help", "exit", "quit", "pow"] {
        assert!(!kb.mentions(name), "{name} should be excluded");
    }
    assert!(!kb.mentions("__import__"));
    assert!(!kb.mentions("__debug__"));
    assert!(kb.mentions("len"));
    assert!(kb.mentions("int"));
}

const SHELL: &str = r#"
    [[class]]
    name = "RemoteShell"
    fields = ["host"]
    operators = ["+"]

    [[class]]
    name = "Session"
    fields = ["id"]

    [[class.method]]
    name = "attach"
    params = [{ name = "self" }, { name = "target", type = "RemoteShell" }]
    returns = "RemoteShell"

    [[class.attribute]]
    name = "DEFAULT"
    type = "RemoteShell"

    [[function]]
    name = "connect"
    params = [{ name = "host", type = "str" }]
    returns = "RemoteShell"

    [[value]]
    name = "LOCAL"
    type = "RemoteShell"
"#;

#[test]
fn test_excluded_type_names_never_reach_the_catalog() {
    let decls = Declarations::from_toml_str(SHELL).unwrap();
    let interp = Interpreter::with_declarations(&decls).unwrap();
    let config = ProbeConfig {
        deny: vec!["Shell".to_string()],
        probe_timeout_ms: 1000,
        ..ProbeConfig::default()
    };
    let kb = Harvester::new(Arc::new(interp), config).run().unwrap();

    assert!(!kb.mentions("RemoteShell"));
    let json = serde_json::to_string(&kb).unwrap();
    assert!(!json.contains("Shell"), "excluded type leaked: {json}");

    // References collapse to the top type instead.
    let connect = kb.callable("connect").unwrap();
    assert_eq!(connect.return_type, TypeIndex::TOP);
    let attach = kb.callable("Session.attach").unwrap();
    assert_eq!(attach.param_types, vec![TypeIndex::TOP]);
    assert_eq!(attach.return_type, TypeIndex::TOP);
    let Funcs::Grouped(buckets) = &kb.funcs else {
        panic!("expected grouped layout");
    };
    let local = buckets[UNBOUND_BUCKET].iter().find(|e| e.name == "LOCAL").unwrap();
    assert_eq!(local.type_index, Some(TypeIndex::TOP));

    // Nothing was built or probed for it: every table row belongs to a listed type.
    for table in &kb.ops {
        assert_eq!(table.len(), kb.types.len());
    }
}

#[test]
fn test_nested_members_are_filtered() {
    let kb = harvest();
    assert!(kb.callable("str.upper").is_some());
    assert!(kb.callable("str.isprintable").is_none());
    assert!(!kb.mentions("isprintable"));
}

#[test]
fn test_exact_matching_keeps_families() {
    let config = ProbeConfig::parse(
        r#"
        deny = ["print"]
        match-mode = "exact"
        binary-ops = []
        unary-ops = []
        "#,
    )
    .unwrap();
    let kb = harvest_with(config);
    assert!(!kb.mentions("print"));
    assert!(kb.callable("str.isprintable").is_some());
    assert!(kb.mentions("eval"));
}

// ============================================
// Signatures
// ============================================

#[test]
fn test_receiver_handling() {
    let kb = harvest();
    let pair = idx(&kb, "Pair");

    let swap = kb.callable("Pair.swap").unwrap();
    assert_eq!(swap.self_type, pair);
    assert!(swap.param_types.is_empty());
    assert_eq!(swap.return_type, pair);

    let of = kb.callable("Pair.of").unwrap();
    assert_eq!(of.self_type, pair);
    assert_eq!(of.param_types, vec![TypeIndex::TOP, TypeIndex::TOP]);
    assert_eq!(of.return_type, pair);

    let describe = kb.callable("Pair.describe").unwrap();
    assert_eq!(describe.self_type, TypeIndex::NONE);
    assert_eq!(describe.param_types, vec![idx(&kb, "str")]);
}

#[test]
fn test_fallback_chain_is_total() {
    let kb = harvest();
    // Text signature, receiver marker dropped.
    assert_eq!(kb.callable("len").unwrap().param_types.len(), 1);
    assert_eq!(kb.callable("sorted").unwrap().param_types.len(), 3);
    assert_eq!(kb.callable("str.split").unwrap().param_types.len(), 2);
    // Doc line.
    assert_eq!(kb.callable("getattr").unwrap().param_types.len(), 2);
    // Nothing known.
    let vars = kb.callable("vars").unwrap();
    assert_eq!(vars.param_types, vec![TypeIndex::TOP; DEFAULT_ARITY]);
    assert_eq!(vars.return_type, TypeIndex::TOP);
    assert_eq!(vars.self_type, TypeIndex::NONE);
}

// ============================================
// Operator Probing
// ============================================

#[test]
fn test_table_shape() {
    let kb = harvest();
    assert_eq!(kb.ops.len(), BinaryOp::ALL.len());
    assert_eq!(kb.uops.len(), UnaryOp::ALL.len());
    for table in &kb.ops {
        assert_eq!(table.len(), kb.types.len());
        assert!(table[0].is_empty());
        assert!(table.iter().flatten().all(|&i| i != TypeIndex::TOP));
    }
    assert!(kb.uops.iter().flatten().all(|&i| i != TypeIndex::TOP));
}

#[test]
fn test_arithmetic_compatibility() {
    let kb = harvest();
    let (int, float, s, list) = (idx(&kb, "int"), idx(&kb, "float"), idx(&kb, "str"), idx(&kb, "list"));
    let add = op_position(BinaryOp::Add);
    let mul = op_position(BinaryOp::Mul);
    assert!(kb.succeeds(add, int, float));
    assert!(kb.succeeds(add, s, s));
    assert!(!kb.succeeds(add, int, s));
    assert!(kb.succeeds(mul, s, int));
    assert!(kb.succeeds(mul, int, list));
    assert!(!kb.succeeds(mul, s, s));
}

#[test]
fn test_zero_dummies_fail_division() {
    let kb = harvest();
    let int = idx(&kb, "int");
    for op in [BinaryOp::Div, BinaryOp::FloorDiv, BinaryOp::Mod] {
        assert!(!kb.succeeds(op_position(op), int, int), "{op} on zero operands");
    }
}

#[test]
fn test_mod_is_asymmetric() {
    let kb = harvest();
    let (int, s) = (idx(&kb, "int"), idx(&kb, "str"));
    let m = op_position(BinaryOp::Mod);
    assert!(kb.succeeds(m, s, int));
    assert!(!kb.succeeds(m, int, s));
}

#[test]
fn test_enum_and_number_do_not_order() {
    let kb = harvest();
    let (ordering, int) = (idx(&kb, "Ordering"), idx(&kb, "int"));
    let lt = op_position(BinaryOp::Lt);
    assert!(!kb.succeeds(lt, ordering, int));
    assert!(!kb.succeeds(lt, int, ordering));
    assert!(kb.succeeds(op_position(BinaryOp::Eq), ordering, int));
}

#[test]
fn test_placeholder_constructed_pair_is_probed() {
    let kb = harvest();
    let pair = idx(&kb, "Pair");
    let eq = op_position(BinaryOp::Eq);
    assert!(kb.succeeds(eq, pair, pair));
    assert!(!kb.succeeds(op_position(BinaryOp::Add), pair, pair));
}

#[test]
fn test_untestable_types_never_appear() {
    let kb = harvest();
    for name in ["Number", "ellipsis", "range"] {
        let index = idx(&kb, name);
        for table in &kb.ops {
            assert!(table[index.slot().unwrap()].is_empty(), "{name} has a row");
            assert!(table.iter().all(|row| !row.contains(&index)), "{name} appears as operand");
        }
        assert!(kb.uops.iter().all(|row| !row.contains(&index)));
    }
}

#[test]
fn test_unary_operators() {
    let kb = harvest();
    let (int, s, none) = (idx(&kb, "int"), idx(&kb, "str"), idx(&kb, "NoneType"));
    let neg = UnaryOp::ALL.iter().position(|&o| o == UnaryOp::Neg).unwrap();
    let not = UnaryOp::ALL.iter().position(|&o| o == UnaryOp::Not).unwrap();
    assert!(kb.unary_succeeds(neg, int));
    assert!(!kb.unary_succeeds(neg, s));
    assert!(kb.unary_succeeds(not, s));
    assert!(kb.unary_succeeds(not, none));
}

// ============================================
// Layouts and Serialization
// ============================================

#[test]
fn test_flat_layout() {
    let kb = harvest_with(ProbeConfig {
        layout: Layout::Flat,
        binary_ops: vec![BinaryOp::Eq],
        ..ProbeConfig::default()
    });
    let Funcs::Flat(map) = &kb.funcs else {
        panic!("expected flat layout");
    };
    assert!(map.contains_key("str.upper"));
    assert!(map.contains_key("int.from_bytes"));
    assert!(map.contains_key("len"));
    assert!(!map.contains_key("None"));
    assert!(!map.keys().any(|k| k.ends_with(".LESS")));
}

#[test]
fn test_write_and_load() {
    let kb = harvest_with(ProbeConfig {
        binary_ops: vec![BinaryOp::Add, BinaryOp::Lt],
        ..ProbeConfig::default()
    });
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kb.json");
    kb.write_to(&path, true).unwrap();

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys.len(), 4);
    for key in ["types", "funcs", "ops", "uops"] {
        assert!(json.get(key).is_some(), "missing {key}");
    }
    assert!(json["funcs"][UNBOUND_BUCKET].is_array());

    let loaded = KnowledgeBase::load(&path).unwrap();
    assert_eq!(loaded, kb);
}

#[test]
fn test_load_rejects_dangling_index() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(
        &path,
        r#"{"types":["object","int"],"funcs":{"-1":[{"name":"f","isCallable":true,"funcSig":{"paramTypes":[7],"selfType":-1,"returnType":0}}]},"ops":[],"uops":[]}"#,
    )
    .unwrap();
    assert!(KnowledgeBase::load(&path).is_err());
}

// ============================================
// Declared Locals
// ============================================

const VECTOR: &str = r#"
    [[class]]
    name = "Vector"
    fields = ["x", "y"]
    operators = ["+", "=="]

    [[class.method]]
    name = "scale"
    params = [{ name = "self" }, { name = "factor", type = "float" }]
    returns = "Vector"

    [[class.method]]
    name = "print_me"

    [[function]]
    name = "dot"
    params = [{ name = "a", type = "Vector" }, { name = "b", type = "Vector" }]
    returns = "float"

    [[value]]
    name = "UNIT"
    type = "Vector"
"#;

#[test]
fn test_declared_class_is_harvested() {
    let kb = harvest_declared(VECTOR);
    let vector = idx(&kb, "Vector");
    let scale = kb.callable("Vector.scale").unwrap();
    assert_eq!(scale.self_type, vector);
    assert_eq!(scale.param_types, vec![idx(&kb, "float")]);
    assert_eq!(scale.return_type, vector);
    assert!(kb.callable("Vector.print_me").is_none());

    let dot = kb.callable("dot").unwrap();
    assert_eq!(dot.param_types, vec![vector, vector]);
}

#[test]
fn test_declared_operators_are_probed() {
    let kb = harvest_declared(VECTOR);
    let vector = idx(&kb, "Vector");
    assert!(kb.succeeds(op_position(BinaryOp::Add), vector, vector));
    assert!(!kb.succeeds(op_position(BinaryOp::Sub), vector, vector));
    assert!(!kb.succeeds(op_position(BinaryOp::Add), vector, idx(&kb, "int")));
    assert!(kb.succeeds(op_position(BinaryOp::Eq), vector, vector));
}
