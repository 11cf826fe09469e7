//! Stack shuffling, tracing and introspection

use log::debug;

use crate::context::Context;
use crate::ops::convert::{to_int32, to_string_bytes, type_name};
use crate::value::Value;
use crate::vm::RuntimeResult;

pub fn pop(ctx: &mut Context) -> RuntimeResult<()> {
    let value = ctx.pop();
    ctx.release(value);
    Ok(())
}

/// Pop a value and write its string form as one output line
pub fn trace(ctx: &mut Context) -> RuntimeResult<()> {
    let value = ctx.pop();
    let text = to_string_bytes(&ctx.heap, &value);
    ctx.release(value);
    ctx.write_trace(&text)
}

/// Pop a range and push an integer in `[0, range)`
pub fn random_number(ctx: &mut Context) -> RuntimeResult<()> {
    let (range, _) = ctx.pop_number();
    let n = ctx.rng.random(to_int32(range));
    ctx.push(Value::F32(n as f32))
}

/// Milliseconds since the movie started
pub fn get_time(ctx: &mut Context) -> RuntimeResult<()> {
    let ms = ctx.elapsed_ms();
    ctx.push(Value::F32(ms as f32))
}

pub fn type_of(ctx: &mut Context) -> RuntimeResult<()> {
    let value = ctx.pop();
    let name = type_name(&ctx.heap, &value);
    ctx.release(value);
    ctx.push(Value::str(name))
}

/// Pop an object and push its target path
///
/// Only the main timeline exists, so every object reports `_root`.
pub fn target_path(ctx: &mut Context) -> RuntimeResult<()> {
    let value = ctx.pop();
    let path = if value.is_heap() { "_root" } else { "" };
    ctx.release(value);
    ctx.push(Value::str(path))
}

pub fn push_duplicate(ctx: &mut Context) -> RuntimeResult<()> {
    let copy = match ctx.peek().cloned() {
        Some(top) => ctx.share(&top),
        None => {
            debug!("duplicate of an empty stack");
            Value::Undefined
        }
    };
    ctx.push(copy)
}

pub fn stack_swap(ctx: &mut Context) -> RuntimeResult<()> {
    if !ctx.stack.swap() {
        debug!("swap needs two values, stack holds {}", ctx.stack.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Config;
    use crate::ops::testing::{context, push_all};

    #[test]
    fn test_trace_formats_values() {
        let (mut ctx, out) = context();
        for v in [Value::F32(1.5), Value::F64(0.1), Value::Bool(true), Value::Undefined, Value::str("hi")] {
            push_all(&mut ctx, &[v]);
            trace(&mut ctx).unwrap();
        }
        assert_eq!(out.text(), "1.5\n0.1\ntrue\nundefined\nhi\n");
    }

    #[test]
    fn test_type_of() {
        let (mut ctx, _) = context();
        let obj = Value::Object(ctx.heap.new_object().unwrap());
        for (v, expected) in [
            (Value::F32(1.0), "number"),
            (Value::str("s"), "string"),
            (Value::Null, "null"),
            (obj, "object"),
        ] {
            push_all(&mut ctx, &[v]);
            type_of(&mut ctx).unwrap();
            assert_eq!(ctx.pop(), Value::str(expected));
        }
    }

    #[test]
    fn test_duplicate_and_swap() {
        let (mut ctx, _) = context();
        push_all(&mut ctx, &[Value::F32(1.0), Value::F32(2.0)]);
        stack_swap(&mut ctx).unwrap();
        push_duplicate(&mut ctx).unwrap();
        assert_eq!(ctx.pop(), Value::F32(1.0));
        assert_eq!(ctx.pop(), Value::F32(1.0));
        assert_eq!(ctx.pop(), Value::F32(2.0));

        let obj = Value::Object(ctx.heap.new_object().unwrap());
        push_all(&mut ctx, &[obj.clone()]);
        push_duplicate(&mut ctx).unwrap();
        assert_eq!(ctx.heap.refcount(&obj), Some(2));
        pop(&mut ctx).unwrap();
        pop(&mut ctx).unwrap();
        assert_eq!(ctx.heap.stats().live(), 0);
    }

    #[test]
    fn test_seeded_random_is_repeatable() {
        let draw = || {
            let config = Config { random_seed: Some(4), ..Config::default() };
            let mut ctx = Context::new(config);
            (0..5)
                .map(|_| {
                    ctx.push(Value::F32(10.0)).unwrap();
                    random_number(&mut ctx).unwrap();
                    ctx.pop().to_number()
                })
                .collect::<Vec<_>>()
        };
        let first = draw();
        assert_eq!(first, draw());
        assert!(first.iter().all(|&n| (0.0..10.0).contains(&n) && n.fract() == 0.0));
    }

    #[test]
    fn test_target_path() {
        let (mut ctx, _) = context();
        let root = ctx.root_value();
        push_all(&mut ctx, &[root]);
        target_path(&mut ctx).unwrap();
        assert_eq!(ctx.pop(), Value::str("_root"));
        push_all(&mut ctx, &[Value::F32(1.0)]);
        target_path(&mut ctx).unwrap();
        assert_eq!(ctx.pop(), Value::str(""));
    }
}
