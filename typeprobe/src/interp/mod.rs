//! Bundled reflectable runtime
//!
//! A small dynamic object model with a builtin namespace of classes,
//! functions and values whose metadata ranges from fully structured to
//! absent. It is the [`Runtime`] the command-line tool harvests, and the
//! fixture the tests run against. Local classes, functions and values can
//! be declared on top of it from TOML (see [`decl`]).

mod builtins;
pub mod decl;
pub mod error;
pub mod ops;
pub mod value;

use std::collections::HashMap;
use std::sync::Arc;

pub use decl::Declarations;
pub use error::{ErrorKind, InterpResult, RuntimeError};
pub use value::Value;

use crate::error::{ProbeError, Result};
use crate::runtime::{
    Attribute, BinaryOp, Fault, IntrospectError, Item, Runtime, Signature, UnaryOp, Wrapper,
};

/// Stack growth parameters for deeply nested values
pub(crate) const STACK_RED_ZONE: usize = 128 * 1024; // 128KB remaining triggers growth
pub(crate) const STACK_GROW_SIZE: usize = 4 * 1024 * 1024; // Grow by 4MB each time

pub type ClassRef = Arc<ClassDef>;
pub type FunctionRef = Arc<FunctionDef>;

/// Native constructor: receives the arguments, receiver excluded.
pub type NativeCtor = fn(&[Value]) -> InterpResult<Value>;

/// How much structured metadata a callable exposes.
#[derive(Debug, Clone, PartialEq)]
pub enum SignatureSource {
    Structured(Signature),
    /// Introspection is attempted and fails with this reason.
    Broken(String),
    Missing,
}

impl SignatureSource {
    fn introspect(&self, name: &str) -> std::result::Result<Signature, IntrospectError> {
        match self {
            SignatureSource::Structured(sig) => Ok(sig.clone()),
            SignatureSource::Broken(reason) => Err(IntrospectError::Unsupported {
                name: name.to_string(),
                reason: reason.clone(),
            }),
            SignatureSource::Missing => Err(IntrospectError::NoSignature(name.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub signature: SignatureSource,
    pub text_signature: Option<String>,
    pub doc: Option<String>,
}

impl FunctionDef {
    pub fn new(name: impl Into<String>, signature: SignatureSource) -> Self {
        FunctionDef {
            name: name.into(),
            signature,
            text_signature: None,
            doc: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text_signature = Some(text.into());
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }
}

#[derive(Debug, Clone)]
pub enum Constructor {
    Native(NativeCtor),
    /// Exactly one argument per field.
    Record { fields: Vec<String> },
    /// No argument yields the first member; one argument selects a member
    /// by name or position.
    Enum { members: Vec<String> },
    Abstract,
}

#[derive(Debug, Clone)]
pub enum AttrDefValue {
    Function(FunctionRef),
    Data { type_name: String },
}

#[derive(Debug, Clone)]
pub struct AttrDef {
    pub name: String,
    pub wrapper: Wrapper,
    pub value: AttrDefValue,
}

impl AttrDef {
    pub fn method(function: FunctionDef) -> Self {
        Self::wrapped(Wrapper::Plain, function)
    }

    pub fn wrapped(wrapper: Wrapper, function: FunctionDef) -> Self {
        AttrDef {
            name: function.name.clone(),
            wrapper,
            value: AttrDefValue::Function(Arc::new(function)),
        }
    }

    pub fn data(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        AttrDef {
            name: name.into(),
            wrapper: Wrapper::Plain,
            value: AttrDefValue::Data {
                type_name: type_name.into(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: String,
    pub constructor: Constructor,
    /// Constructor interface, receiver included.
    pub init: SignatureSource,
    pub attributes: Vec<AttrDef>,
}

impl ClassDef {
    pub fn new(name: impl Into<String>, constructor: Constructor, init: SignatureSource) -> Self {
        ClassDef {
            name: name.into(),
            constructor,
            init,
            attributes: Vec::new(),
        }
    }

    pub fn with(mut self, attribute: AttrDef) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn construct(&self, args: &[Value]) -> InterpResult<Value> {
        match &self.constructor {
            Constructor::Native(ctor) => ctor(args),
            Constructor::Record { fields } => {
                if args.len() != fields.len() {
                    return Err(RuntimeError::arity_mismatch(
                        &self.name,
                        &fields.len().to_string(),
                        args.len(),
                    ));
                }
                Ok(Value::instance(&self.name, args.to_vec()))
            }
            Constructor::Enum { members } => {
                let member = match args {
                    [] => members.first(),
                    [Value::Str(s)] => members.iter().find(|m| m.as_str() == &**s),
                    [Value::Int(i)] => usize::try_from(*i).ok().and_then(|i| members.get(i)),
                    [other] => {
                        return Err(RuntimeError::value_error(format!(
                            "{other} is not a valid {}",
                            self.name
                        )));
                    }
                    _ => return Err(RuntimeError::arity_mismatch(&self.name, "0 to 1", args.len())),
                };
                member
                    .map(|m| Value::Enum(Arc::from(self.name.as_str()), Arc::from(m.as_str())))
                    .ok_or_else(|| RuntimeError::value_error(format!("no such {} member", self.name)))
            }
            Constructor::Abstract => Err(RuntimeError::not_instantiable(&self.name)),
        }
    }
}

/// What a namespace name is bound to.
#[derive(Debug, Clone)]
pub enum Entry {
    Class(ClassRef),
    Function(FunctionRef),
    Value(Value),
}

impl Entry {
    fn to_item(&self) -> Item<Interpreter> {
        match self {
            Entry::Class(class) => Item::Class(Arc::clone(class)),
            Entry::Function(function) => Item::Function(Arc::clone(function)),
            Entry::Value(value) => Item::Value {
                type_name: value.type_name().to_string(),
            },
        }
    }
}

/// The bundled runtime.
#[derive(Debug, Clone)]
pub struct Interpreter {
    builtins: Vec<(String, Entry)>,
    locals: Vec<(String, Entry)>,
    /// Classes reachable only through the type of a value.
    hidden: Vec<ClassRef>,
    /// Same-class operators declared on local classes.
    overloads: HashMap<String, Vec<BinaryOp>>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Create an interpreter with the builtin namespace registered
    pub fn new() -> Self {
        let mut interp = Interpreter {
            builtins: Vec::new(),
            locals: Vec::new(),
            hidden: Vec::new(),
            overloads: HashMap::new(),
        };
        builtins::register(&mut interp);
        interp
    }

    /// Builtins plus the declared local namespace.
    pub fn with_declarations(decls: &Declarations) -> Result<Self> {
        let mut interp = Self::new();
        interp.declare(decls)?;
        Ok(interp)
    }

    pub fn declare(&mut self, decls: &Declarations) -> Result<()> {
        for class in &decls.classes {
            if self.local(&class.name).is_some() {
                return Err(ProbeError::declaration(format!(
                    "'{}' is declared twice",
                    class.name
                )));
            }
            if !class.operators.is_empty() {
                self.overloads.insert(class.name.clone(), class.operators.clone());
            }
            self.define_local(&class.name, Entry::Class(Arc::new(class.to_class_def())));
        }
        for function in &decls.functions {
            self.define_local(&function.name, Entry::Function(Arc::new(function.to_function_def())));
        }
        for value in &decls.values {
            self.define_local(&value.name, Entry::Value(Value::instance(&value.type_name, Vec::new())));
        }
        Ok(())
    }

    pub(crate) fn define_builtin(&mut self, name: &str, entry: Entry) {
        self.builtins.push((name.to_string(), entry));
    }

    pub(crate) fn define_hidden(&mut self, class: ClassDef) {
        self.hidden.push(Arc::new(class));
    }

    /// Bind a local name; rebinding replaces the earlier entry.
    pub fn define_local(&mut self, name: &str, entry: Entry) {
        match self.locals.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = entry,
            None => self.locals.push((name.to_string(), entry)),
        }
    }

    fn local(&self, name: &str) -> Option<&Entry> {
        self.locals.iter().find(|(n, _)| n == name).map(|(_, e)| e)
    }

    fn supports_overload(&self, class: &str, op: BinaryOp) -> bool {
        self.overloads.get(class).is_some_and(|ops| ops.contains(&op))
    }
}

fn class_named<'a>(entries: &'a [(String, Entry)], type_name: &str) -> Option<&'a ClassRef> {
    entries.iter().find_map(|(_, entry)| match entry {
        Entry::Class(class) if class.name == type_name => Some(class),
        _ => None,
    })
}

impl Runtime for Interpreter {
    type Value = Value;
    type Class = ClassRef;
    type Function = FunctionRef;

    fn builtins(&self) -> Vec<(String, Item<Self>)> {
        self.builtins.iter().map(|(name, entry)| (name.clone(), entry.to_item())).collect()
    }

    fn locals(&self) -> Vec<(String, Item<Self>)> {
        self.locals.iter().map(|(name, entry)| (name.clone(), entry.to_item())).collect()
    }

    fn attributes(&self, class: &ClassRef) -> Vec<Attribute<Self>> {
        class
            .attributes
            .iter()
            .map(|attr| match &attr.value {
                AttrDefValue::Function(f) => Attribute::function(&attr.name, attr.wrapper, Arc::clone(f)),
                AttrDefValue::Data { type_name } => Attribute::data(&attr.name, type_name),
            })
            .collect()
    }

    fn lookup_class(&self, type_name: &str) -> Option<ClassRef> {
        class_named(&self.locals, type_name)
            .or_else(|| class_named(&self.builtins, type_name))
            .or_else(|| self.hidden.iter().find(|c| c.name == type_name))
            .cloned()
    }

    fn signature(&self, function: &FunctionRef) -> std::result::Result<Signature, IntrospectError> {
        function.signature.introspect(&function.name)
    }

    fn text_signature(&self, function: &FunctionRef) -> Option<String> {
        function.text_signature.clone()
    }

    fn doc(&self, function: &FunctionRef) -> Option<String> {
        function.doc.clone()
    }

    fn constructor_signature(&self, class: &ClassRef) -> std::result::Result<Signature, IntrospectError> {
        class.init.introspect(&class.name)
    }

    fn instantiate(&self, class: &ClassRef, args: &[Value]) -> std::result::Result<Value, Fault> {
        class.construct(args).map_err(Fault::from)
    }

    fn placeholder(&self) -> Value {
        Value::None
    }

    fn apply_binary(&self, op: BinaryOp, lhs: &Value, rhs: &Value) -> std::result::Result<Value, Fault> {
        if let (Value::Instance(left, _), Value::Instance(right, _)) = (lhs, rhs) {
            if left == right && self.supports_overload(left, op) {
                return Ok(lhs.clone());
            }
        }
        ops::eval_binary(op, lhs, rhs).map_err(Fault::from)
    }

    fn apply_unary(&self, op: UnaryOp, operand: &Value) -> std::result::Result<Value, Fault> {
        ops::eval_unary(op, operand).map_err(Fault::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_namespace_mixes_kinds() {
        let interp = Interpreter::new();
        let items = interp.builtins();
        assert!(items.iter().any(|(n, i)| n == "int" && matches!(i, Item::Class(_))));
        assert!(items.iter().any(|(n, i)| n == "len" && matches!(i, Item::Function(_))));
        assert!(items.iter().any(|(n, i)| n == "None" && matches!(i, Item::Value { type_name } if type_name == "NoneType")));
        assert!(interp.locals().is_empty());
    }

    #[test]
    fn test_hidden_classes_resolve_by_type_name() {
        let interp = Interpreter::new();
        assert!(interp.lookup_class("NoneType").is_some());
        assert!(interp.lookup_class("Number").is_none());
        let none = interp.lookup_class("NoneType").unwrap();
        assert_eq!(interp.instantiate(&none, &[]), Ok(Value::None));
    }

    #[test]
    fn test_enum_construction() {
        let interp = Interpreter::new();
        let ordering = interp.lookup_class("Ordering").unwrap();
        let first = interp.instantiate(&ordering, &[]).unwrap();
        assert_eq!(first.to_string(), "Ordering.LESS");
        let by_name = interp.instantiate(&ordering, &[Value::str("GREATER")]).unwrap();
        assert_eq!(by_name.to_string(), "Ordering.GREATER");
        assert!(interp.instantiate(&ordering, &[Value::None]).is_err());
    }

    #[test]
    fn test_signature_sources() {
        let interp = Interpreter::new();
        let structured = Arc::new(FunctionDef::new("f", SignatureSource::Structured(Signature::default())));
        assert!(interp.signature(&structured).is_ok());
        let broken = Arc::new(FunctionDef::new("g", SignatureSource::Broken("no".into())));
        assert!(matches!(interp.signature(&broken), Err(IntrospectError::Unsupported { .. })));
        let missing = Arc::new(FunctionDef::new("h", SignatureSource::Missing).with_doc("h()"));
        assert_eq!(interp.signature(&missing), Err(IntrospectError::NoSignature("h".into())));
        assert_eq!(interp.doc(&missing).as_deref(), Some("h()"));
    }

    #[test]
    fn test_faults_carry_the_error_message() {
        let interp = Interpreter::new();
        let fault = interp.apply_binary(BinaryOp::Add, &Value::Int(0), &Value::str("")).unwrap_err();
        assert!(matches!(fault, Fault::Raised(msg) if msg.contains("unsupported operand")));
    }

    #[test]
    fn test_locals_shadow_and_rebind() {
        let mut interp = Interpreter::new();
        interp.define_local("x", Entry::Value(Value::Int(1)));
        interp.define_local("x", Entry::Value(Value::str("")));
        let locals = interp.locals();
        assert_eq!(locals.len(), 1);
        assert!(matches!(&locals[0].1, Item::Value { type_name } if type_name == "str"));
    }
}
