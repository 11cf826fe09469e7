//! Comparisons and logical operators
//!
//! All results are pushed as single precision 1 or 0.

use std::cmp::Ordering;

use crate::context::Context;
use crate::heap::Heap;
use crate::value::{Value, ValueKind};
use crate::vm::RuntimeResult;

/// Pop `a` then `b` and push `flag(test(b, a))` on their numeric values
fn numeric(ctx: &mut Context, test: impl FnOnce(f64, f64) -> bool) -> RuntimeResult<()> {
    let (a, _) = ctx.pop_number();
    let (b, _) = ctx.pop_number();
    ctx.push(Value::flag(test(b, a)))
}

/// Pop `a` then `b` and push `flag(test(&b, &a))` on the raw values
fn with_values(ctx: &mut Context, test: impl FnOnce(&Heap, &Value, &Value) -> bool) -> RuntimeResult<()> {
    let a = ctx.pop();
    let b = ctx.pop();
    let result = test(&ctx.heap, &b, &a);
    ctx.release(a);
    ctx.release(b);
    ctx.push(Value::flag(result))
}

/// Legacy numeric equality
pub fn equals(ctx: &mut Context) -> RuntimeResult<()> {
    numeric(ctx, |b, a| b == a)
}

/// Legacy numeric less-than
pub fn less(ctx: &mut Context) -> RuntimeResult<()> {
    numeric(ctx, |b, a| b < a)
}

pub fn and(ctx: &mut Context) -> RuntimeResult<()> {
    with_values(ctx, |_, b, a| b.to_boolean() && a.to_boolean())
}

pub fn or(ctx: &mut Context) -> RuntimeResult<()> {
    with_values(ctx, |_, b, a| b.to_boolean() || a.to_boolean())
}

pub fn not(ctx: &mut Context) -> RuntimeResult<()> {
    let value = ctx.pop();
    let result = !value.to_boolean();
    ctx.release(value);
    ctx.push(Value::flag(result))
}

/// Order two values: bytewise when both are strings, numeric otherwise
///
/// Returns `None` when a numeric comparison involves NaN.
fn relational_order(b: &Value, a: &Value) -> Option<Ordering> {
    if let (Some(bs), Some(as_)) = (b.as_str_view(), a.as_str_view()) {
        return Some(bs.cmp_bytes(&as_));
    }
    b.to_number().partial_cmp(&a.to_number())
}

/// Typed less-than
pub fn less2(ctx: &mut Context) -> RuntimeResult<()> {
    with_values(ctx, |_, b, a| relational_order(b, a) == Some(Ordering::Less))
}

/// Typed greater-than
pub fn greater(ctx: &mut Context) -> RuntimeResult<()> {
    with_values(ctx, |_, b, a| relational_order(b, a) == Some(Ordering::Greater))
}

/// Same kind and same value; strings compare by bytes
pub fn strictly_equal(b: &Value, a: &Value) -> bool {
    if b.kind() != a.kind() {
        return false;
    }
    match (b, a) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Object(x), Value::Object(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => x == y,
        _ if b.is_number() => b.to_number() == a.to_number(),
        _ => match (b.as_str_view(), a.as_str_view()) {
            (Some(x), Some(y)) => x.eq_bytes(&y),
            _ => false,
        },
    }
}

/// Abstract equality with the usual cross-type coercions
pub fn loosely_equal(heap: &Heap, b: &Value, a: &Value) -> bool {
    use ValueKind::*;
    match (b.kind(), a.kind()) {
        (x, y) if x == y => strictly_equal(b, a),
        (Undefined, Null) | (Null, Undefined) => true,
        (Number, String) | (String, Number) | (Boolean, _) | (_, Boolean) => {
            if matches!(b.kind(), Undefined | Null) || matches!(a.kind(), Undefined | Null) {
                return false;
            }
            if b.is_heap() || a.is_heap() {
                return primitive_equal(heap, b, a);
            }
            b.to_number() == a.to_number()
        }
        (Object | Array, Number | String) | (Number | String, Object | Array) => primitive_equal(heap, b, a),
        _ => false,
    }
}

/// Compare a heap value against a primitive through its string form
fn primitive_equal(heap: &Heap, b: &Value, a: &Value) -> bool {
    let (heap_value, other) = if b.is_heap() { (b, a) } else { (a, b) };
    let text = crate::ops::convert::to_string_bytes(heap, heap_value);
    if other.is_string() {
        return other.string_bytes().is_some_and(|s| s.as_ref() == text.as_ref());
    }
    crate::util::parse_number(&text) == other.to_number()
}

pub fn equals2(ctx: &mut Context) -> RuntimeResult<()> {
    with_values(ctx, loosely_equal)
}

pub fn strict_equals(ctx: &mut Context) -> RuntimeResult<()> {
    with_values(ctx, |_, b, a| strictly_equal(b, a))
}
