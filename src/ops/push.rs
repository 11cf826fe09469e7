//! Push items
//!
//! One function per Push item kind. Constant strings come from the
//! installed string table so they keep their ID.

use log::debug;

use crate::context::Context;
use crate::value::{StrValue, Value};
use crate::vm::RuntimeResult;

/// Push a constant string by ID
pub fn string(ctx: &mut Context, id: u32) -> RuntimeResult<()> {
    let value = match ctx.string(id) {
        Some(bytes) => Value::Str(StrValue::constant(bytes.clone(), id)),
        None => {
            debug!("push of unknown string id {}", id);
            Value::bytes(&b""[..])
        }
    };
    ctx.push(value)
}

pub fn float(ctx: &mut Context, x: f32) -> RuntimeResult<()> {
    ctx.push(Value::F32(x))
}

pub fn double(ctx: &mut Context, x: f64) -> RuntimeResult<()> {
    ctx.push(Value::F64(x))
}

/// 32-bit integers are carried as doubles
pub fn integer(ctx: &mut Context, n: i32) -> RuntimeResult<()> {
    ctx.push(Value::F64(n as f64))
}

pub fn null(ctx: &mut Context) -> RuntimeResult<()> {
    ctx.push(Value::Null)
}

pub fn undefined(ctx: &mut Context) -> RuntimeResult<()> {
    ctx.push(Value::Undefined)
}

pub fn boolean(ctx: &mut Context, b: bool) -> RuntimeResult<()> {
    ctx.push(Value::Bool(b))
}

/// Push a copy of a register
pub fn register(ctx: &mut Context, index: u8) -> RuntimeResult<()> {
    let value = ctx.register(index);
    ctx.push(value)
}
