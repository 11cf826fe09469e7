//! String actions
//!
//! Byte-oriented actions treat strings as raw bytes; the `mb_` variants
//! walk UTF-8 sequences leniently (see [`crate::util::unicode`]).
//! Indices are zero based and clamped to the string.

use crate::context::Context;
use crate::ops::arith::as_string_value;
use crate::ops::convert::to_int32;
use crate::runtime::StringList;
use crate::util::unicode::char_range;
use crate::util::{count_chars, decode_first, encode_code_point};
use crate::value::Value;
use crate::vm::RuntimeResult;

/// Pop `a` then `b`, both as string values
fn pop_string_pair(ctx: &mut Context) -> (Value, Value) {
    let a = ctx.pop();
    let a = as_string_value(ctx, a);
    let b = ctx.pop();
    let b = as_string_value(ctx, b);
    (a, b)
}

fn compare_strings(ctx: &mut Context, test: impl FnOnce(std::cmp::Ordering) -> bool) -> RuntimeResult<()> {
    let (a, b) = pop_string_pair(ctx);
    let order = match (b.as_str_view(), a.as_str_view()) {
        (Some(bv), Some(av)) => bv.cmp_bytes(&av),
        _ => std::cmp::Ordering::Equal,
    };
    ctx.push(Value::flag(test(order)))
}

pub fn string_equals(ctx: &mut Context) -> RuntimeResult<()> {
    compare_strings(ctx, |o| o.is_eq())
}

pub fn string_less(ctx: &mut Context) -> RuntimeResult<()> {
    compare_strings(ctx, |o| o.is_lt())
}

pub fn string_greater(ctx: &mut Context) -> RuntimeResult<()> {
    compare_strings(ctx, |o| o.is_gt())
}

/// Concatenate `b` and `a` into a string list
pub fn string_add(ctx: &mut Context) -> RuntimeResult<()> {
    let (a, b) = pop_string_pair(ctx);
    ctx.push(Value::StrList(StringList::concat(&b, &a)))
}

/// Byte length
pub fn string_length(ctx: &mut Context) -> RuntimeResult<()> {
    let value = ctx.pop();
    let len = match value.as_str_view() {
        Some(view) => view.len(),
        None => crate::ops::convert::to_string_bytes(&ctx.heap, &value).len(),
    };
    ctx.release(value);
    ctx.push(Value::F32(len as f32))
}

/// Character count
pub fn mb_string_length(ctx: &mut Context) -> RuntimeResult<()> {
    let bytes = ctx.pop_string();
    ctx.push(Value::F32(count_chars(&bytes) as f32))
}

/// Pop count, index and source string
fn pop_extract_args(ctx: &mut Context) -> (i32, i32, std::rc::Rc<[u8]>) {
    let (count, _) = ctx.pop_number();
    let (index, _) = ctx.pop_number();
    let source = ctx.pop_string();
    (to_int32(count), to_int32(index), source)
}

/// Byte substring; a negative count is empty
pub fn string_extract(ctx: &mut Context) -> RuntimeResult<()> {
    let (count, index, source) = pop_extract_args(ctx);
    let start = index.max(0) as usize;
    if start >= source.len() {
        return ctx.push(Value::str(""));
    }
    let end = start + (count.max(0) as usize).min(source.len() - start);
    ctx.push(Value::bytes(&source[start..end]))
}

/// Character substring; a negative count takes the rest of the string
pub fn mb_string_extract(ctx: &mut Context) -> RuntimeResult<()> {
    let (count, index, source) = pop_extract_args(ctx);
    let count = if count < 0 { usize::MAX } else { count as usize };
    let range = char_range(&source, index.max(0) as usize, count);
    ctx.push(Value::bytes(&source[range]))
}

/// Code of the first byte; NaN for the empty string
pub fn char_to_ascii(ctx: &mut Context) -> RuntimeResult<()> {
    let bytes = ctx.pop_string();
    let code = bytes.first().map_or(f32::NAN, |&b| b as f32);
    ctx.push(Value::F32(code))
}

/// One-byte string from the low eight bits of a code
pub fn ascii_to_char(ctx: &mut Context) -> RuntimeResult<()> {
    let (x, _) = ctx.pop_number();
    let byte = (to_int32(x) & 0xFF) as u8;
    ctx.push(Value::bytes(vec![byte]))
}

/// Code point of the first character; 0 for the empty string
pub fn mb_char_to_ascii(ctx: &mut Context) -> RuntimeResult<()> {
    let bytes = ctx.pop_string();
    ctx.push(Value::F32(decode_first(&bytes) as f32))
}

/// UTF-8 encoding of a code point; empty when out of range
pub fn mb_ascii_to_char(ctx: &mut Context) -> RuntimeResult<()> {
    let (x, _) = ctx.pop_number();
    let code = if x.is_finite() && x >= 0.0 { x as u32 } else { u32::MAX };
    let bytes = encode_code_point(code).unwrap_or_default();
    ctx.push(Value::bytes(bytes))
}
