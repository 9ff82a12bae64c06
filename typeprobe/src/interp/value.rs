//! Runtime values for the interpreter

use std::fmt;
use std::sync::Arc;

use super::{STACK_GROW_SIZE, STACK_RED_ZONE};

/// Runtime value
#[derive(Debug, Clone)]
pub enum Value {
    /// The absent value
    None,
    Bool(bool),
    /// 64-bit integer
    Int(i64),
    /// 64-bit floating point
    Float(f64),
    Str(Arc<str>),
    Bytes(Arc<[u8]>),
    List(Arc<Vec<Value>>),
    Tuple(Arc<Vec<Value>>),
    /// Insertion-ordered mapping
    Dict(Arc<Vec<(Value, Value)>>),
    Set(Arc<Vec<Value>>),
    /// (start, stop, step)
    Range(i64, i64, i64),
    /// Enum member: (enum_name, member_name)
    Enum(Arc<str>, Arc<str>),
    /// Class instance: (class_name, fields)
    Instance(Arc<str>, Arc<Vec<Value>>),
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(Arc::new(items))
    }

    pub fn instance(class: &str, fields: Vec<Value>) -> Self {
        Value::Instance(Arc::from(class), Arc::new(fields))
    }

    /// Check if value is truthy
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bytes(b) => !b.is_empty(),
            Value::List(items) | Value::Tuple(items) | Value::Set(items) => !items.is_empty(),
            Value::Dict(pairs) => !pairs.is_empty(),
            Value::Range(start, stop, step) => range_len(*start, *stop, *step) > 0,
            Value::Enum(_, _) | Value::Instance(_, _) => true,
        }
    }

    /// Get type name, as catalogued
    pub fn type_name(&self) -> &str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Set(_) => "set",
            Value::Range(..) => "range",
            Value::Enum(name, _) => &**name,
            Value::Instance(name, _) => &**name,
        }
    }

    /// Integer view; bools count as integers
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Try to convert to f64
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            Value::Bool(b) => Some(f64::from(u8::from(*b))),
            _ => None,
        }
    }

    /// Items of an iterable value, if it is one
    pub fn iter_items(&self) -> Option<Vec<Value>> {
        match self {
            Value::List(items) | Value::Tuple(items) | Value::Set(items) => Some(items.to_vec()),
            Value::Dict(pairs) => Some(pairs.iter().map(|(k, _)| k.clone()).collect()),
            Value::Str(s) => Some(s.chars().map(|c| Value::str(&c.to_string())).collect()),
            Value::Bytes(b) => Some(b.iter().map(|&x| Value::Int(i64::from(x))).collect()),
            Value::Range(start, stop, step) => {
                let len = range_len(*start, *stop, *step);
                Some((0..len).map(|i| Value::Int(start + i * step)).collect())
            }
            _ => None,
        }
    }
}

/// Number of elements produced by a range
pub fn range_len(start: i64, stop: i64, step: i64) -> i64 {
    if step > 0 && start < stop {
        (stop - start + step - 1) / step
    } else if step < 0 && start > stop {
        (start - stop - step - 1) / -step
    } else {
        0
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.write_to(f))
    }
}

impl Value {
    fn write_to(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Bytes(b) => write!(f, "b{:?}", String::from_utf8_lossy(b)),
            Value::List(items) => write_seq(f, "[", items, "]"),
            Value::Tuple(items) => write_seq(f, "(", items, ")"),
            Value::Set(items) => write_seq(f, "{", items, "}"),
            Value::Dict(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Range(start, stop, step) => write!(f, "range({start}, {stop}, {step})"),
            Value::Enum(enum_name, member) => write!(f, "{enum_name}.{member}"),
            Value::Instance(class, fields) => write_seq(f, &format!("{class}("), fields, ")"),
        }
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, open: &str, items: &[Value], close: &str) -> fmt::Result {
    write!(f, "{open}")?;
    for (i, v) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{v}")?;
    }
    write!(f, "{close}")
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.same_as(other))
    }
}

impl Value {
    fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => {
                a.len() == b.len() && a.iter().all(|x| b.contains(x))
            }
            (Value::Dict(a), Value::Dict(b)) => {
                a.len() == b.len() && a.iter().all(|pair| b.contains(pair))
            }
            (Value::Range(a1, a2, a3), Value::Range(b1, b2, b3)) => (a1, a2, a3) == (b1, b2, b3),
            (Value::Enum(e1, m1), Value::Enum(e2, m2)) => e1 == e2 && m1 == m2,
            (Value::Instance(c1, f1), Value::Instance(c2, f2)) => c1 == c2 && f1 == f2,
            // Numeric tower: bool < int < float
            (Value::Int(_) | Value::Bool(_), Value::Int(_) | Value::Bool(_)) => {
                self.as_int() == other.as_int()
            }
            (Value::Float(_), Value::Int(_) | Value::Bool(_) | Value::Float(_))
            | (Value::Int(_) | Value::Bool(_), Value::Float(_)) => self.as_float() == other.as_float(),
            _ => false,
        }
    }
}
