//! Arithmetic
//!
//! The result is double precision when either operand is, single
//! precision otherwise. Narrow operations are carried out in f64 and
//! rounded once, which gives the same bits as native f32 arithmetic for
//! the basic operators.

use crate::context::Context;
use crate::ops::convert;
use crate::runtime::StringList;
use crate::value::Value;
use crate::vm::RuntimeResult;

/// Result of dividing by zero
pub const DIVIDE_ERROR: &str = "#ERROR#";

/// Pop `a` then `b` and push `b op a`
fn binary(ctx: &mut Context, op: impl FnOnce(f64, f64) -> f64) -> RuntimeResult<()> {
    let (a, a_wide) = ctx.pop_number();
    let (b, b_wide) = ctx.pop_number();
    ctx.push(Value::number(op(b, a), a_wide || b_wide))
}

/// Like [`binary`], but a zero divisor yields the error string
fn divide_like(ctx: &mut Context, op: impl FnOnce(f64, f64) -> f64) -> RuntimeResult<()> {
    let (a, a_wide) = ctx.pop_number();
    let (b, b_wide) = ctx.pop_number();
    if a == 0.0 {
        return ctx.push(Value::str(DIVIDE_ERROR));
    }
    ctx.push(Value::number(op(b, a), a_wide || b_wide))
}

pub fn add(ctx: &mut Context) -> RuntimeResult<()> {
    binary(ctx, |b, a| b + a)
}

pub fn subtract(ctx: &mut Context) -> RuntimeResult<()> {
    binary(ctx, |b, a| b - a)
}

pub fn multiply(ctx: &mut Context) -> RuntimeResult<()> {
    binary(ctx, |b, a| b * a)
}

pub fn divide(ctx: &mut Context) -> RuntimeResult<()> {
    divide_like(ctx, |b, a| b / a)
}

pub fn modulo(ctx: &mut Context) -> RuntimeResult<()> {
    divide_like(ctx, |b, a| b % a)
}

/// Type-aware addition
///
/// If either operand is a string, both are converted to strings and
/// concatenated into a string list; otherwise this is numeric [`add`].
pub fn add2(ctx: &mut Context) -> RuntimeResult<()> {
    let a = ctx.pop();
    let b = ctx.pop();
    if !a.is_string() && !b.is_string() {
        let result = Value::number(b.to_number() + a.to_number(), a.is_wide() || b.is_wide());
        ctx.release(a);
        ctx.release(b);
        return ctx.push(result);
    }

    let left = as_string_value(ctx, b);
    let right = as_string_value(ctx, a);
    ctx.push(Value::StrList(StringList::concat(&left, &right)))
}

/// Convert an owned value to a string value, releasing the original
pub(crate) fn as_string_value(ctx: &mut Context, value: Value) -> Value {
    if value.is_string() {
        return value;
    }
    let bytes = convert::to_string_bytes(&ctx.heap, &value);
    ctx.release(value);
    Value::bytes(bytes)
}

pub fn increment(ctx: &mut Context) -> RuntimeResult<()> {
    let (x, wide) = ctx.pop_number();
    ctx.push(Value::number(x + 1.0, wide))
}

pub fn decrement(ctx: &mut Context) -> RuntimeResult<()> {
    let (x, wide) = ctx.pop_number();
    ctx.push(Value::number(x - 1.0, wide))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::testing::{context, push_all};

    fn run(op: fn(&mut Context) -> RuntimeResult<()>, b: Value, a: Value) -> Value {
        let (mut ctx, _) = context();
        push_all(&mut ctx, &[b, a]);
        op(&mut ctx).unwrap();
        assert_eq!(ctx.stack().len(), 1);
        ctx.pop()
    }

    #[test]
    fn test_operand_order() {
        assert_eq!(run(subtract, Value::F32(10.0), Value::F32(3.0)), Value::F32(7.0));
        assert_eq!(run(divide, Value::F32(9.0), Value::F32(3.0)), Value::F32(3.0));
        assert_eq!(run(modulo, Value::F32(7.0), Value::F32(4.0)), Value::F32(3.0));
    }

    #[test]
    fn test_precision_promotion() {
        assert_eq!(run(add, Value::F32(1.5), Value::F32(1.0)), Value::F32(2.5));
        assert_eq!(run(add, Value::F32(1.5), Value::F64(1.0)), Value::F64(2.5));
        assert_eq!(run(multiply, Value::F64(2.0), Value::F32(4.0)), Value::F64(8.0));
        // Strings coerce to doubles
        assert_eq!(run(add, Value::str("3"), Value::F32(1.0)), Value::F64(4.0));
    }

    #[test]
    fn test_divide_by_zero_is_error_string() {
        assert_eq!(run(divide, Value::F32(1.0), Value::F32(0.0)), Value::str(DIVIDE_ERROR));
        assert_eq!(run(modulo, Value::F64(5.0), Value::F64(0.0)), Value::str(DIVIDE_ERROR));
        assert_eq!(run(divide, Value::F32(0.0), Value::F32(2.0)), Value::F32(0.0));
    }

    #[test]
    fn test_add2_concatenates_strings() {
        let result = run(add2, Value::str("3"), Value::F32(1.0));
        assert_eq!(result.string_bytes().unwrap().as_ref(), b"31");

        let result = run(add2, Value::Undefined, Value::str("x"));
        assert_eq!(result.string_bytes().unwrap().as_ref(), b"undefinedx");

        assert_eq!(run(add2, Value::F32(3.0), Value::F32(1.0)), Value::F32(4.0));
        assert_eq!(run(add2, Value::Bool(true), Value::F32(1.0)), Value::F32(2.0));
    }

    #[test]
    fn test_increment_and_decrement() {
        let (mut ctx, _) = context();
        push_all(&mut ctx, &[Value::F32(1.0)]);
        increment(&mut ctx).unwrap();
        assert_eq!(ctx.pop(), Value::F32(2.0));
        push_all(&mut ctx, &[Value::F64(1.0)]);
        decrement(&mut ctx).unwrap();
        assert_eq!(ctx.pop(), Value::F64(0.0));
    }
}
