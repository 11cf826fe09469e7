//! Type conversions

use std::rc::Rc;

use crate::context::Context;
use crate::heap::Heap;
use crate::util::format_g15;
use crate::value::Value;
use crate::vm::RuntimeResult;

/// Nested arrays deeper than this render as nothing
const MAX_JOIN_DEPTH: usize = 8;

/// Script string of a number (`%.15g`)
pub fn number_to_bytes(x: f64) -> Vec<u8> {
    format_g15(x).into_bytes()
}

/// Append the string form of `value` to `out`
pub fn append_string(heap: &Heap, value: &Value, out: &mut Vec<u8>) {
    append_at_depth(heap, value, out, 0);
}

fn append_at_depth(heap: &Heap, value: &Value, out: &mut Vec<u8>, depth: usize) {
    match value {
        Value::Undefined => out.extend_from_slice(b"undefined"),
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::F32(x) => out.extend_from_slice(format_g15(*x as f64).as_bytes()),
        Value::F64(x) => out.extend_from_slice(format_g15(*x).as_bytes()),
        Value::Str(s) => out.extend_from_slice(s.bytes()),
        Value::StrList(l) => {
            for fragment in l.fragments() {
                out.extend_from_slice(fragment);
            }
        }
        Value::Object(obj) => {
            if heap.is_function(*obj) {
                out.extend_from_slice(b"[type Function]");
            } else {
                out.extend_from_slice(b"[object Object]");
            }
        }
        Value::Array(arr) => {
            if depth >= MAX_JOIN_DEPTH {
                return;
            }
            let Some(array) = heap.array(*arr) else {
                return;
            };
            for (i, element) in array.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                // Holes and undefined elements join as empty text
                if !element.is_undefined() && !element.is_null() {
                    append_at_depth(heap, element, out, depth + 1);
                }
            }
        }
    }
}

/// String form of any value
pub fn to_string_bytes(heap: &Heap, value: &Value) -> Rc<[u8]> {
    if let Value::Str(s) = value {
        return s.shared().clone();
    }
    let mut out = Vec::new();
    append_string(heap, value, &mut out);
    Rc::from(out)
}

/// ECMA ToInt32
pub fn to_int32(x: f64) -> i32 {
    if !x.is_finite() {
        return 0;
    }
    let m = x.trunc().rem_euclid(4_294_967_296.0);
    if m >= 2_147_483_648.0 {
        (m - 4_294_967_296.0) as i32
    } else {
        m as i32
    }
}

/// ToUint32, used by the unsigned shift
pub fn to_uint32(x: f64) -> u32 {
    to_int32(x) as u32
}

/// Name reported by TypeOf
pub fn type_name(heap: &Heap, value: &Value) -> &'static str {
    match value {
        Value::Undefined => "undefined",
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::F32(_) | Value::F64(_) => "number",
        Value::Str(_) | Value::StrList(_) => "string",
        Value::Object(obj) if heap.is_function(*obj) => "function",
        Value::Object(_) | Value::Array(_) => "object",
    }
}

/// ToInteger: truncate toward zero; NaN and infinities become 0
pub fn to_integer(ctx: &mut Context) -> RuntimeResult<()> {
    let (x, _) = ctx.pop_number();
    let n = if x.is_finite() { x.trunc() as i32 } else { 0 };
    ctx.push(Value::F32(n as f32))
}

/// ToNumber: numeric coercion, keeping the operand's precision
pub fn to_number(ctx: &mut Context) -> RuntimeResult<()> {
    let (x, wide) = ctx.pop_number();
    ctx.push(Value::number(x, wide))
}

/// ToString
pub fn to_string(ctx: &mut Context) -> RuntimeResult<()> {
    let value = ctx.pop();
    let result = match value {
        Value::Str(_) | Value::StrList(_) => value,
        other => {
            let bytes = to_string_bytes(&ctx.heap, &other);
            ctx.release(other);
            Value::bytes(bytes)
        }
    };
    ctx.push(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::testing::{context, push_all};

    #[test]
    fn test_string_forms() {
        let mut heap = Heap::new(None);
        let s = |v: &Value, heap: &Heap| String::from_utf8(to_string_bytes(heap, v).to_vec()).unwrap();
        assert_eq!(s(&Value::Undefined, &heap), "undefined");
        assert_eq!(s(&Value::Null, &heap), "null");
        assert_eq!(s(&Value::Bool(true), &heap), "true");
        assert_eq!(s(&Value::F32(0.5), &heap), "0.5");
        assert_eq!(s(&Value::F64(1e21), &heap), "1e+21");
        assert_eq!(s(&Value::F64(f64::NAN), &heap), "NaN");

        let obj = heap.new_object().unwrap();
        assert_eq!(s(&Value::Object(obj), &heap), "[object Object]");

        let inner = heap.new_array().unwrap();
        heap.push_element(inner, Value::F32(2.0));
        heap.push_element(inner, Value::F32(3.0));
        let outer = heap.new_array().unwrap();
        heap.push_element(outer, Value::F32(1.0));
        heap.push_element(outer, Value::Array(inner));
        heap.push_element(outer, Value::Undefined);
        assert_eq!(s(&Value::Array(outer), &heap), "1,2,3,");
    }

    #[test]
    fn test_self_referencing_array_terminates() {
        let mut heap = Heap::new(None);
        let arr = heap.new_array().unwrap();
        heap.push_element(arr, Value::F32(1.0));
        heap.set_element(arr, 1, &Value::Array(arr));
        let text = to_string_bytes(&heap, &Value::Array(arr));
        assert!(text.starts_with(b"1,1,1,"));
    }

    #[test]
    fn test_to_int32() {
        assert_eq!(to_int32(1.9), 1);
        assert_eq!(to_int32(-1.9), -1);
        assert_eq!(to_int32(4_294_967_295.0), -1);
        assert_eq!(to_int32(2_147_483_648.0), i32::MIN);
        assert_eq!(to_int32(f64::NAN), 0);
        assert_eq!(to_int32(f64::INFINITY), 0);
        assert_eq!(to_uint32(-1.0), u32::MAX);
    }

    #[test]
    fn test_to_integer_action() {
        let (mut ctx, _) = context();
        push_all(&mut ctx, &[Value::F64(-3.7)]);
        to_integer(&mut ctx).unwrap();
        assert_eq!(ctx.pop(), Value::F32(-3.0));

        push_all(&mut ctx, &[Value::str("abc")]);
        to_integer(&mut ctx).unwrap();
        assert_eq!(ctx.pop(), Value::F32(0.0));
    }

    #[test]
    fn test_to_number_and_to_string_actions() {
        let (mut ctx, _) = context();
        push_all(&mut ctx, &[Value::str("12.5")]);
        to_number(&mut ctx).unwrap();
        assert_eq!(ctx.pop(), Value::F64(12.5));

        push_all(&mut ctx, &[Value::F32(7.0)]);
        to_string(&mut ctx).unwrap();
        assert_eq!(ctx.pop(), Value::str("7"));
    }

    #[test]
    fn test_type_names() {
        let mut heap = Heap::new(None);
        let arr = heap.new_array().unwrap();
        assert_eq!(type_name(&heap, &Value::F32(1.0)), "number");
        assert_eq!(type_name(&heap, &Value::Array(arr)), "object");
        assert_eq!(type_name(&heap, &Value::Bool(false)), "boolean");
        assert_eq!(type_name(&heap, &Value::Null), "null");
    }
}
