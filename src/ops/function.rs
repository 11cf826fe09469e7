//! Function definition and calls

use std::rc::Rc;

use log::debug;

use crate::context::Context;
use crate::heap::ObjectRef;
use crate::runtime::object::{CONSTRUCTOR, PROTOTYPE};
use crate::runtime::{AsFunction, AsObject, EntryPoint, FunctionDef};
use crate::value::{DYNAMIC_STRING_ID, Value};
use crate::vm::{Flow, RuntimeResult};

/// Pop an argument count and that many arguments (first popped is first)
pub(crate) fn pop_args(ctx: &mut Context) -> Vec<Value> {
    let (count, _) = ctx.pop_number();
    let requested = if count.is_finite() && count > 0.0 { count as usize } else { 0 };
    let available = ctx.stack().len();
    if requested > available {
        debug!("argument count {} exceeds stack depth {}", requested, available);
    }
    (0..requested.min(available)).map(|_| ctx.pop()).collect()
}

/// Create a function object with a fresh prototype
///
/// Named functions are bound in the current scope; anonymous ones are
/// pushed.
pub fn define_function(ctx: &mut Context, def: FunctionDef, entry: EntryPoint) -> RuntimeResult<()> {
    let name: Rc<[u8]> = def.name.clone();
    let anonymous = def.is_anonymous();
    let func = match new_function(ctx, def, entry) {
        Some(func) => Value::Object(func),
        None => {
            debug!("could not allocate function {:?}", String::from_utf8_lossy(&name));
            Value::Null
        }
    };
    if anonymous {
        ctx.push(func)
    } else {
        ctx.define_local(&name, DYNAMIC_STRING_ID, func);
        Ok(())
    }
}

/// Allocate a function object and its prototype
///
/// The prototype's `constructor` is a weak back-reference so the pair
/// does not keep itself alive.
pub fn new_function(ctx: &mut Context, def: FunctionDef, entry: EntryPoint) -> Option<ObjectRef> {
    let func = ctx.heap.alloc_object(AsObject::with_function(AsFunction::new(def, entry)))?;
    match ctx.heap.new_object() {
        Some(proto) => {
            ctx.heap.put_weak_property(proto, CONSTRUCTOR, Value::Object(func));
            ctx.heap.put_property(func, PROTOTYPE, Value::Object(proto));
        }
        None => debug!("could not allocate prototype"),
    }
    Some(func)
}

/// Call `callee` if it is a function object; consumes every argument
fn invoke(ctx: &mut Context, callee: &Value, this: Value, args: Vec<Value>) -> RuntimeResult<Value> {
    match callee.as_object() {
        Some(func) if ctx.heap.is_function(func) => ctx.call_function(func, this, args),
        _ => {
            debug!("call of a non-function {:?}", callee.kind());
            ctx.release(this);
            ctx.heap.release_all(args);
            Ok(Value::Undefined)
        }
    }
}

/// Pop a function name and arguments; push the result
pub fn call_function(ctx: &mut Context) -> RuntimeResult<()> {
    let (name, id) = ctx.pop_name();
    let args = pop_args(ctx);
    let callee = ctx.get_variable(&name, id);
    let this = ctx.this_value();
    let result = invoke(ctx, &callee, this, args);
    ctx.release(callee);
    ctx.push(result?)
}

/// Pop a method name, a target and arguments; push the result
///
/// An undefined or empty name calls the target itself. A target that is
/// not callable is treated as a prototype and its `constructor` is
/// called on the current `this`, which is how `super()` compiles.
pub fn call_method(ctx: &mut Context) -> RuntimeResult<()> {
    let name = ctx.pop();
    let target = ctx.pop();
    let args = pop_args(ctx);

    let name_bytes = match &name {
        Value::Undefined => None,
        other => {
            let bytes = crate::ops::convert::to_string_bytes(&ctx.heap, other);
            (!bytes.is_empty()).then_some(bytes)
        }
    };
    ctx.release(name);

    let (callee, this) = match (name_bytes, target.as_object()) {
        (None, Some(obj)) if ctx.heap.is_function(obj) => {
            let callee = ctx.share(&target);
            (callee, ctx.this_value())
        }
        (None, Some(obj)) => {
            let ctor = ctx.heap.lookup_member(obj, CONSTRUCTOR).cloned().unwrap_or_default();
            let callee = ctx.share(&ctor);
            (callee, ctx.this_value())
        }
        (Some(method), Some(obj)) => {
            let member = ctx.heap.lookup_member(obj, &method).cloned().unwrap_or_default();
            let callee = ctx.share(&member);
            let this = ctx.share(&target);
            (callee, this)
        }
        (_, None) => {
            debug!("method call on a {:?}", target.kind());
            (Value::Undefined, Value::Undefined)
        }
    };
    ctx.release(target);

    let result = invoke(ctx, &callee, this, args);
    ctx.release(callee);
    ctx.push(result?)
}

/// Pop the return value and leave the region
pub fn action_return(ctx: &mut Context) -> RuntimeResult<Flow> {
    Ok(Flow::Return(ctx.pop()))
}
