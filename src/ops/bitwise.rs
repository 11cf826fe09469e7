//! Bitwise operators
//!
//! Operands go through ToInt32; shift counts use their low five bits.
//! Results are exact 32-bit integers pushed as doubles.

use crate::context::Context;
use crate::ops::convert::{to_int32, to_uint32};
use crate::value::Value;
use crate::vm::RuntimeResult;

fn binary(ctx: &mut Context, op: impl FnOnce(i32, i32) -> f64) -> RuntimeResult<()> {
    let (a, _) = ctx.pop_number();
    let (b, _) = ctx.pop_number();
    ctx.push(Value::F64(op(to_int32(b), to_int32(a))))
}

pub fn bit_and(ctx: &mut Context) -> RuntimeResult<()> {
    binary(ctx, |b, a| (b & a) as f64)
}

pub fn bit_or(ctx: &mut Context) -> RuntimeResult<()> {
    binary(ctx, |b, a| (b | a) as f64)
}

pub fn bit_xor(ctx: &mut Context) -> RuntimeResult<()> {
    binary(ctx, |b, a| (b ^ a) as f64)
}

pub fn bit_lshift(ctx: &mut Context) -> RuntimeResult<()> {
    binary(ctx, |value, count| value.wrapping_shl(count as u32 & 0x1F) as f64)
}

pub fn bit_rshift(ctx: &mut Context) -> RuntimeResult<()> {
    binary(ctx, |value, count| (value >> (count as u32 & 0x1F)) as f64)
}

pub fn bit_urshift(ctx: &mut Context) -> RuntimeResult<()> {
    let (count, _) = ctx.pop_number();
    let (value, _) = ctx.pop_number();
    let shifted = to_uint32(value) >> (to_int32(count) as u32 & 0x1F);
    ctx.push(Value::F64(shifted as f64))
}
