//! Operator semantics for builtin values

use std::cmp::Ordering;
use std::sync::Arc;

use super::error::{InterpResult, RuntimeError};
use super::value::Value;
use super::{STACK_GROW_SIZE, STACK_RED_ZONE};
use crate::runtime::{BinaryOp, UnaryOp};

/// Longest sequence a repetition may produce.
const MAX_REPEAT_LEN: i64 = 1 << 24;

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

fn numeric(v: &Value) -> Option<Num> {
    match v {
        Value::Int(n) => Some(Num::Int(*n)),
        Value::Bool(b) => Some(Num::Int(i64::from(*b))),
        Value::Float(f) => Some(Num::Float(*f)),
        _ => None,
    }
}

impl Num {
    fn to_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(f) => f,
        }
    }
}

/// Evaluate a binary operation
pub fn eval_binary(op: BinaryOp, left: &Value, right: &Value) -> InterpResult<Value> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(left == right)),
        BinaryOp::Ne => Ok(Value::Bool(left != right)),
        BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => {
            let ord = compare_values(op, left, right)?;
            let result = match op {
                BinaryOp::Lt => ord == Some(Ordering::Less),
                BinaryOp::Gt => ord == Some(Ordering::Greater),
                BinaryOp::Le => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
                _ => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
            };
            Ok(Value::Bool(result))
        }
        _ => {
            if let (Some(a), Some(b)) = (numeric(left), numeric(right)) {
                return eval_numeric(op, a, b, left, right);
            }
            eval_container(op, left, right)
        }
    }
}

fn unsupported(op: BinaryOp, left: &Value, right: &Value) -> RuntimeError {
    RuntimeError::unsupported_operands(op.symbol(), left.type_name(), right.type_name())
}

fn eval_numeric(op: BinaryOp, a: Num, b: Num, left: &Value, right: &Value) -> InterpResult<Value> {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => eval_int(op, x, y, left, right),
        _ => match op {
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor | BinaryOp::Shl | BinaryOp::Shr => {
                Err(unsupported(op, left, right))
            }
            _ => eval_float(op, a.to_f64(), b.to_f64()),
        },
    }
}

fn eval_int(op: BinaryOp, x: i64, y: i64, left: &Value, right: &Value) -> InterpResult<Value> {
    let overflow = || RuntimeError::overflow("integer result");
    let v = match op {
        BinaryOp::Add => Value::Int(x.checked_add(y).ok_or_else(overflow)?),
        BinaryOp::Sub => Value::Int(x.checked_sub(y).ok_or_else(overflow)?),
        BinaryOp::Mul => Value::Int(x.checked_mul(y).ok_or_else(overflow)?),
        BinaryOp::Div => {
            if y == 0 {
                return Err(RuntimeError::division_by_zero());
            }
            Value::Float(x as f64 / y as f64)
        }
        BinaryOp::FloorDiv => {
            if y == 0 {
                return Err(RuntimeError::division_by_zero());
            }
            let q = x.checked_div(y).ok_or_else(overflow)?;
            if x % y != 0 && ((x < 0) != (y < 0)) {
                Value::Int(q - 1)
            } else {
                Value::Int(q)
            }
        }
        BinaryOp::Mod => {
            if y == 0 {
                return Err(RuntimeError::division_by_zero());
            }
            let r = x.checked_rem(y).ok_or_else(overflow)?;
            if r != 0 && ((r < 0) != (y < 0)) {
                Value::Int(r + y)
            } else {
                Value::Int(r)
            }
        }
        BinaryOp::Pow => {
            if y < 0 {
                if x == 0 {
                    return Err(RuntimeError::division_by_zero());
                }
                Value::Float((x as f64).powf(y as f64))
            } else {
                let exp = u32::try_from(y).map_err(|_| overflow())?;
                Value::Int(x.checked_pow(exp).ok_or_else(overflow)?)
            }
        }
        BinaryOp::BitAnd => int_or_bool(left, right, x & y),
        BinaryOp::BitOr => int_or_bool(left, right, x | y),
        BinaryOp::BitXor => int_or_bool(left, right, x ^ y),
        BinaryOp::Shl => {
            if y < 0 {
                return Err(RuntimeError::value_error("negative shift count"));
            }
            if x == 0 {
                Value::Int(0)
            } else if y >= 63 {
                return Err(overflow());
            } else {
                let shifted = x << y;
                if shifted >> y != x {
                    return Err(overflow());
                }
                Value::Int(shifted)
            }
        }
        BinaryOp::Shr => {
            if y < 0 {
                return Err(RuntimeError::value_error("negative shift count"));
            }
            Value::Int(if y >= 64 { if x < 0 { -1 } else { 0 } } else { x >> y })
        }
        _ => return Err(unsupported(op, left, right)),
    };
    Ok(v)
}

fn int_or_bool(left: &Value, right: &Value, bits: i64) -> Value {
    match (left, right) {
        (Value::Bool(_), Value::Bool(_)) => Value::Bool(bits != 0),
        _ => Value::Int(bits),
    }
}

fn eval_float(op: BinaryOp, x: f64, y: f64) -> InterpResult<Value> {
    let v = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => {
            if y == 0.0 {
                return Err(RuntimeError::division_by_zero());
            }
            x / y
        }
        BinaryOp::FloorDiv => {
            if y == 0.0 {
                return Err(RuntimeError::division_by_zero());
            }
            (x / y).floor()
        }
        BinaryOp::Mod => {
            if y == 0.0 {
                return Err(RuntimeError::division_by_zero());
            }
            let r = x % y;
            if r != 0.0 && ((r < 0.0) != (y < 0.0)) { r + y } else { r }
        }
        BinaryOp::Pow => {
            if x == 0.0 && y < 0.0 {
                return Err(RuntimeError::division_by_zero());
            }
            if x < 0.0 && y.fract() != 0.0 {
                return Err(RuntimeError::value_error("negative number raised to a fractional power"));
            }
            x.powf(y)
        }
        _ => {
            return Err(RuntimeError::unsupported_operands(op.symbol(), "float", "float"));
        }
    };
    Ok(Value::Float(v))
}

fn eval_container(op: BinaryOp, left: &Value, right: &Value) -> InterpResult<Value> {
    match (op, left, right) {
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::str(&format!("{a}{b}"))),
        (BinaryOp::Add, Value::Bytes(a), Value::Bytes(b)) => {
            Ok(Value::Bytes(a.iter().chain(b.iter()).copied().collect()))
        }
        (BinaryOp::Add, Value::List(a), Value::List(b)) => Ok(Value::list(concat(a, b))),
        (BinaryOp::Add, Value::Tuple(a), Value::Tuple(b)) => Ok(Value::tuple(concat(a, b))),

        (BinaryOp::Mul, seq, count) if is_sequence(seq) && count.as_int().is_some() => {
            repeat(seq, count.as_int().unwrap_or(0))
        }
        (BinaryOp::Mul, count, seq) if is_sequence(seq) && count.as_int().is_some() => {
            repeat(seq, count.as_int().unwrap_or(0))
        }

        (BinaryOp::Mod, Value::Str(template), args) => format_percent(template, args),

        (BinaryOp::Sub, Value::Set(a), Value::Set(b)) => {
            Ok(set_of(a.iter().filter(|x| !b.contains(x)).cloned()))
        }
        (BinaryOp::BitAnd, Value::Set(a), Value::Set(b)) => {
            Ok(set_of(a.iter().filter(|x| b.contains(x)).cloned()))
        }
        (BinaryOp::BitOr, Value::Set(a), Value::Set(b)) => {
            Ok(set_of(a.iter().chain(b.iter().filter(|x| !a.contains(x))).cloned()))
        }
        (BinaryOp::BitXor, Value::Set(a), Value::Set(b)) => Ok(set_of(
            a.iter()
                .filter(|x| !b.contains(x))
                .chain(b.iter().filter(|x| !a.contains(x)))
                .cloned(),
        )),
        (BinaryOp::BitOr, Value::Dict(a), Value::Dict(b)) => {
            let mut merged: Vec<(Value, Value)> = a.to_vec();
            for (k, v) in b.iter() {
                match merged.iter_mut().find(|(existing, _)| existing == k) {
                    Some(slot) => slot.1 = v.clone(),
                    None => merged.push((k.clone(), v.clone())),
                }
            }
            Ok(Value::Dict(Arc::new(merged)))
        }
        _ => Err(unsupported(op, left, right)),
    }
}

fn is_sequence(v: &Value) -> bool {
    matches!(v, Value::Str(_) | Value::Bytes(_) | Value::List(_) | Value::Tuple(_))
}

fn concat(a: &[Value], b: &[Value]) -> Vec<Value> {
    a.iter().chain(b.iter()).cloned().collect()
}

fn set_of(items: impl Iterator<Item = Value>) -> Value {
    Value::Set(Arc::new(items.collect()))
}

fn repeat(seq: &Value, count: i64) -> InterpResult<Value> {
    let count = count.max(0);
    let len = match seq {
        Value::Str(s) => s.len(),
        Value::Bytes(b) => b.len(),
        Value::List(items) | Value::Tuple(items) => items.len(),
        _ => 0,
    } as i64;
    if len.saturating_mul(count) > MAX_REPEAT_LEN {
        return Err(RuntimeError::overflow("repeated sequence length"));
    }
    let n = count as usize;
    Ok(match seq {
        Value::Str(s) => Value::str(&s.repeat(n)),
        Value::Bytes(b) => Value::Bytes(b.repeat(n).into()),
        Value::List(items) => Value::list(cycle(items, n)),
        Value::Tuple(items) => Value::tuple(cycle(items, n)),
        other => other.clone(),
    })
}

fn cycle(items: &[Value], n: usize) -> Vec<Value> {
    items.iter().cloned().cycle().take(items.len() * n).collect()
}

/// `%`-style interpolation. A template without conversions ignores its
/// argument.
fn format_percent(template: &str, args: &Value) -> InterpResult<Value> {
    let slots = count_conversions(template)?;
    let values: Vec<Value> = match args {
        Value::Tuple(items) => items.to_vec(),
        other => vec![other.clone()],
    };
    if slots == 0 {
        return Ok(Value::str(&template.replace("%%", "%")));
    }
    if values.len() != slots {
        return Err(RuntimeError::type_error(
            &format!("{slots} format argument(s)"),
            &values.len().to_string(),
        ));
    }

    let mut out = String::with_capacity(template.len());
    let mut values = values.into_iter();
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some(spec) => {
                let value = values.next().unwrap_or(Value::None);
                match spec {
                    'd' | 'i' => match value.as_float() {
                        Some(f) => out.push_str(&(f.trunc() as i64).to_string()),
                        None => return Err(RuntimeError::type_error("a number", value.type_name())),
                    },
                    'f' => match value.as_float() {
                        Some(f) => out.push_str(&format!("{f:.6}")),
                        None => return Err(RuntimeError::type_error("a number", value.type_name())),
                    },
                    _ => out.push_str(&value.to_string()),
                }
            }
            None => return Err(RuntimeError::value_error("incomplete format")),
        }
    }
    Ok(Value::str(&out))
}

fn count_conversions(template: &str) -> InterpResult<usize> {
    let mut count = 0;
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c == '%' {
            match chars.next() {
                Some('%') => {}
                Some('s' | 'r' | 'd' | 'i' | 'f') => count += 1,
                Some(other) => {
                    return Err(RuntimeError::value_error(format!(
                        "unsupported format character '{other}'"
                    )));
                }
                None => return Err(RuntimeError::value_error("incomplete format")),
            }
        }
    }
    Ok(count)
}

/// Ordering between two values; `None` for unordered floats.
pub fn compare_values(op: BinaryOp, left: &Value, right: &Value) -> InterpResult<Option<Ordering>> {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || compare_inner(op, left, right))
}

fn compare_inner(op: BinaryOp, left: &Value, right: &Value) -> InterpResult<Option<Ordering>> {
    if let (Some(a), Some(b)) = (numeric(left), numeric(right)) {
        return Ok(match (a, b) {
            (Num::Int(x), Num::Int(y)) => Some(x.cmp(&y)),
            _ => a.to_f64().partial_cmp(&b.to_f64()),
        });
    }
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
        (Value::Bytes(a), Value::Bytes(b)) => Ok(Some(a.cmp(b))),
        (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
            for (x, y) in a.iter().zip(b.iter()) {
                if x != y {
                    return compare_values(op, x, y);
                }
            }
            Ok(Some(a.len().cmp(&b.len())))
        }
        (Value::Set(a), Value::Set(b)) => {
            let a_in_b = a.iter().all(|x| b.contains(x));
            let b_in_a = b.iter().all(|x| a.contains(x));
            Ok(match (a_in_b, b_in_a) {
                (true, true) => Some(Ordering::Equal),
                (true, false) => Some(Ordering::Less),
                (false, true) => Some(Ordering::Greater),
                (false, false) => None,
            })
        }
        _ => Err(RuntimeError::not_orderable(
            op.symbol(),
            left.type_name(),
            right.type_name(),
        )),
    }
}

/// Evaluate a unary operation
pub fn eval_unary(op: UnaryOp, operand: &Value) -> InterpResult<Value> {
    match (op, operand) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Neg, v) => match v.as_int() {
            Some(n) => n
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| RuntimeError::overflow("integer result")),
            None => Err(RuntimeError::bad_operand(op.symbol(), v.type_name())),
        },
        (UnaryOp::Invert, v) => match v.as_int() {
            Some(n) => Ok(Value::Int(!n)),
            None => Err(RuntimeError::bad_operand(op.symbol(), v.type_name())),
        },
    }
}
