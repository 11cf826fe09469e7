//! `with` blocks

use log::debug;

use crate::context::Context;
use crate::ops::control::RegionFn;
use crate::value::Value;
use crate::vm::{Flow, RuntimeResult};

/// Pop an object and run `body` with it as the innermost scope
///
/// Non-objects run the body without a scope. The scope entry is removed
/// when the body leaves, whatever the outcome.
pub fn run_with(ctx: &mut Context, body: RegionFn<'_>) -> RuntimeResult<Flow> {
    let value = ctx.pop();
    let scoped = match value.as_object() {
        Some(obj) if ctx.scope.push(obj) => true,
        Some(_) => {
            debug!("with: scope chain is full");
            ctx.release(value);
            false
        }
        None => {
            debug!("with on a {:?}", value.kind());
            ctx.release(value);
            false
        }
    };

    let result = body(ctx);

    if scoped {
        if let Some(obj) = ctx.scope.pop() {
            ctx.release(Value::Object(obj));
        }
    }
    result
}
