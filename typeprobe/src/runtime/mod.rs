//! Reflection boundary
//!
//! Everything the harvester learns about a live runtime goes through the
//! [`Runtime`] trait: namespace enumeration, class attributes, callable
//! introspection, construction and operator application. The latter two run
//! foreign code and are only ever called from inside a [`sandbox::Sandbox`].

pub mod sandbox;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A live, reflectable language runtime.
pub trait Runtime: Send + Sync + 'static {
    /// A runtime value (probe operand, placeholder argument).
    type Value: Clone + Send + Sync + 'static;
    /// Handle to a class-like entity.
    type Class: Clone + Send + Sync + 'static;
    /// Handle to a callable.
    type Function: Clone;

    /// Names bound in the builtin namespace, in declaration order.
    fn builtins(&self) -> Vec<(String, Item<Self>)>;

    /// Names bound in the local (user) namespace, in declaration order.
    fn locals(&self) -> Vec<(String, Item<Self>)>;

    /// Attributes declared directly on `class`, in declaration order.
    fn attributes(&self, class: &Self::Class) -> Vec<Attribute<Self>>;

    /// Find the class that produces values of the type called `type_name`.
    fn lookup_class(&self, type_name: &str) -> Option<Self::Class>;

    /// Structured introspection of a callable's formal interface.
    fn signature(&self, function: &Self::Function) -> Result<Signature, IntrospectError>;

    /// Textual signature description, e.g. `($self, /, sep=None)`.
    fn text_signature(&self, function: &Self::Function) -> Option<String>;

    /// Descriptive documentation text.
    fn doc(&self, function: &Self::Function) -> Option<String>;

    /// Structured introspection of a class constructor, receiver included.
    fn constructor_signature(&self, class: &Self::Class) -> Result<Signature, IntrospectError>;

    /// Construct an instance of `class`.
    fn instantiate(&self, class: &Self::Class, args: &[Self::Value]) -> Result<Self::Value, Fault>;

    /// An opaque value used to fill required constructor arguments.
    fn placeholder(&self) -> Self::Value;

    fn apply_binary(
        &self,
        op: BinaryOp,
        lhs: &Self::Value,
        rhs: &Self::Value,
    ) -> Result<Self::Value, Fault>;

    fn apply_unary(&self, op: UnaryOp, operand: &Self::Value) -> Result<Self::Value, Fault>;
}

/// What a namespace name is bound to.
pub enum Item<R: Runtime + ?Sized> {
    Class(R::Class),
    Function(R::Function),
    /// A plain value; only its type is recorded.
    Value { type_name: String },
}

/// How an attribute was declared on its class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrapper {
    /// A bare function: bound to instances.
    Plain,
    /// Explicitly wrapped as class-level.
    ClassLevel,
    /// Explicitly wrapped as receiver-free.
    ReceiverFree,
}

pub enum AttrValue<R: Runtime + ?Sized> {
    Function(R::Function),
    Data { type_name: String },
}

/// One attribute declared on a class.
pub struct Attribute<R: Runtime + ?Sized> {
    pub name: String,
    pub wrapper: Wrapper,
    pub value: AttrValue<R>,
}

impl<R: Runtime + ?Sized> Attribute<R> {
    pub fn function(name: impl Into<String>, wrapper: Wrapper, function: R::Function) -> Self {
        Attribute {
            name: name.into(),
            wrapper,
            value: AttrValue::Function(function),
        }
    }

    pub fn data(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Attribute {
            name: name.into(),
            wrapper: Wrapper::Plain,
            value: AttrValue::Data {
                type_name: type_name.into(),
            },
        }
    }
}

// ============================================================================
// Signatures
// ============================================================================

/// A structured formal interface.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Signature {
    pub params: Vec<Param>,
    pub returns: Annotation,
}

impl Signature {
    pub fn new(params: Vec<Param>) -> Self {
        Signature {
            params,
            returns: Annotation::Empty,
        }
    }

    pub fn returns(mut self, annotation: Annotation) -> Self {
        self.returns = annotation;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParamKind {
    PositionalOnly,
    PositionalOrKeyword,
    VarPositional,
    KeywordOnly,
    VarKeyword,
}

impl ParamKind {
    /// Catch-all positional or keyword collector.
    pub fn is_variadic(self) -> bool {
        matches!(self, ParamKind::VarPositional | ParamKind::VarKeyword)
    }

    pub fn is_positional(self) -> bool {
        matches!(self, ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    pub annotation: Annotation,
    pub has_default: bool,
}

impl Param {
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Param {
            name: name.into(),
            kind,
            annotation: Annotation::Empty,
            has_default: false,
        }
    }

    pub fn positional(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::PositionalOrKeyword)
    }

    pub fn var_positional(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::VarPositional)
    }

    pub fn var_keyword(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::VarKeyword)
    }

    pub fn keyword_only(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::KeywordOnly)
    }

    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.annotation = annotation;
        self
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }
}

/// A declared type annotation.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Annotation {
    /// No annotation at all.
    #[default]
    Empty,
    /// The fully generic annotation.
    Any,
    /// The `None` annotation.
    None,
    /// A resolved type.
    Named(String),
    /// An unresolved forward reference, possibly quoted.
    Forward(String),
}

impl Annotation {
    pub fn named(name: impl Into<String>) -> Self {
        Annotation::Named(name.into())
    }
}

// ============================================================================
// Faults
// ============================================================================

/// Why structured introspection was unavailable.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum IntrospectError {
    #[error("no signature found for {0}")]
    NoSignature(String),
    #[error("unsupported signature for {name}: {reason}")]
    Unsupported { name: String, reason: String },
}

/// A failure while running foreign code.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Fault {
    #[error("raised: {0}")]
    Raised(String),
    #[error("timed out")]
    TimedOut,
    #[error("panicked: {0}")]
    Panicked(String),
    #[error("sandbox unavailable")]
    Unavailable,
}

// ============================================================================
// Operators
// ============================================================================

/// Binary operators, in the default probing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
    #[serde(rename = "%")]
    Mod,
    #[serde(rename = "**")]
    Pow,
    #[serde(rename = "//")]
    FloorDiv,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "&")]
    BitAnd,
    #[serde(rename = "|")]
    BitOr,
    #[serde(rename = "^")]
    BitXor,
    #[serde(rename = "<<")]
    Shl,
    #[serde(rename = ">>")]
    Shr,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 18] = [
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::Mod,
        BinaryOp::Pow,
        BinaryOp::FloorDiv,
        BinaryOp::Eq,
        BinaryOp::Ne,
        BinaryOp::Lt,
        BinaryOp::Gt,
        BinaryOp::Le,
        BinaryOp::Ge,
        BinaryOp::BitAnd,
        BinaryOp::BitOr,
        BinaryOp::BitXor,
        BinaryOp::Shl,
        BinaryOp::Shr,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.symbol() == symbol)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Unary operators, in the default probing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    #[serde(rename = "-")]
    Neg,
    #[serde(rename = "not")]
    Not,
    #[serde(rename = "~")]
    Invert,
}

impl UnaryOp {
    pub const ALL: [UnaryOp; 3] = [UnaryOp::Neg, UnaryOp::Not, UnaryOp::Invert];

    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "not",
            UnaryOp::Invert => "~",
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_symbols_round_trip() {
        for op in BinaryOp::ALL {
            assert_eq!(BinaryOp::from_symbol(op.symbol()), Some(op));
        }
        assert_eq!(BinaryOp::from_symbol("@"), None);
    }

    #[test]
    fn test_operator_serde_uses_symbols() {
        let ops: Vec<BinaryOp> = serde_json::from_str(r#"["**", "//", ">>"]"#).unwrap();
        assert_eq!(ops, vec![BinaryOp::Pow, BinaryOp::FloorDiv, BinaryOp::Shr]);
        let uops: Vec<UnaryOp> = serde_json::from_str(r#"["not", "~"]"#).unwrap();
        assert_eq!(uops, vec![UnaryOp::Not, UnaryOp::Invert]);
    }

    #[test]
    fn test_param_kind_classification() {
        assert!(ParamKind::VarPositional.is_variadic());
        assert!(ParamKind::VarKeyword.is_variadic());
        assert!(!ParamKind::KeywordOnly.is_variadic());
        assert!(ParamKind::PositionalOnly.is_positional());
        assert!(!ParamKind::KeywordOnly.is_positional());
    }
}
