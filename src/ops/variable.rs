//! Variables and registers

use log::debug;

use crate::context::Context;
use crate::value::Value;
use crate::vm::RuntimeResult;

/// Pop a name and push the variable's value (undefined when missing)
pub fn get_variable(ctx: &mut Context) -> RuntimeResult<()> {
    let (name, id) = ctx.pop_name();
    let value = ctx.get_variable(&name, id);
    ctx.push(value)
}

/// Pop a value, then a name, and assign
pub fn set_variable(ctx: &mut Context) -> RuntimeResult<()> {
    let value = ctx.pop();
    let (name, id) = ctx.pop_name();
    ctx.set_variable(&name, id, value);
    Ok(())
}

/// Pop a value, then a name, and define a local
pub fn define_local(ctx: &mut Context) -> RuntimeResult<()> {
    let value = ctx.pop();
    let (name, id) = ctx.pop_name();
    ctx.define_local(&name, id, value);
    Ok(())
}

/// Pop a name and declare it as a local without assigning
pub fn define_local2(ctx: &mut Context) -> RuntimeResult<()> {
    let (name, id) = ctx.pop_name();
    ctx.declare_local(&name, id);
    Ok(())
}

/// Pop a property name, then an object; delete the property
pub fn delete(ctx: &mut Context) -> RuntimeResult<()> {
    let (name, _) = ctx.pop_name();
    let target = ctx.pop();
    let deleted = match target.as_object() {
        Some(obj) => ctx.heap.delete_property(obj, &name),
        None => {
            debug!("delete {:?} on a non-object", String::from_utf8_lossy(&name));
            false
        }
    };
    ctx.release(target);
    ctx.push(Value::Bool(deleted))
}

/// Pop a variable name and delete it from the scope that holds it
pub fn delete2(ctx: &mut Context) -> RuntimeResult<()> {
    let (name, id) = ctx.pop_name();
    let deleted = ctx.delete_variable(&name, id);
    ctx.push(Value::Bool(deleted))
}

/// Copy the top of the stack into a register without popping
pub fn store_register(ctx: &mut Context, index: u8) -> RuntimeResult<()> {
    let value = match ctx.peek().cloned() {
        Some(top) => ctx.share(&top),
        None => {
            debug!("store to register {} from an empty stack", index);
            Value::Undefined
        }
    };
    ctx.set_register(index, value);
    Ok(())
}
