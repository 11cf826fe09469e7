//! Objects, arrays and members

use std::rc::Rc;

use log::debug;

use crate::context::Context;
use crate::heap::ObjectRef;
use crate::ops::function::pop_args;
use crate::runtime::AsArray;
use crate::runtime::object::{PROTO, PROTOTYPE};
use crate::util::count_chars;
use crate::value::Value;
use crate::vm::RuntimeResult;

/// Parse a member name as an array index
fn array_index(name: &[u8]) -> Option<usize> {
    if name.is_empty() || !name.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(name).ok()?.parse().ok()
}

/// Pop a count and that many (value, name) pairs; push a new object
pub fn init_object(ctx: &mut Context) -> RuntimeResult<()> {
    let (count, _) = ctx.pop_number();
    let count = if count.is_finite() && count > 0.0 { count as usize } else { 0 };
    let mut pairs = Vec::with_capacity(count.min(ctx.stack().len() / 2));
    for _ in 0..count {
        if ctx.stack().len() < 2 {
            debug!("InitObject ran out of operands");
            break;
        }
        let value = ctx.pop();
        let (name, _) = ctx.pop_name();
        pairs.push((name, value));
    }

    let Some(obj) = ctx.heap.new_object() else {
        debug!("InitObject: allocation failed");
        ctx.heap.release_all(pairs.into_iter().map(|(_, v)| v));
        return ctx.push(Value::Null);
    };
    // Pairs were popped last-declared first
    for (name, value) in pairs.into_iter().rev() {
        ctx.heap.put_property(obj, &name, value);
    }
    ctx.push(Value::Object(obj))
}

/// Pop a count and that many elements (first popped is index 0)
pub fn init_array(ctx: &mut Context) -> RuntimeResult<()> {
    let elements = pop_args(ctx);
    let len = elements.len();
    match ctx.heap.alloc_array(AsArray::from_values(elements)) {
        Some(arr) => ctx.push(Value::Array(arr)),
        None => {
            debug!("InitArray: allocation of {} elements failed", len);
            ctx.push(Value::Null)
        }
    }
}

/// Construct an instance of `ctor`, consuming the arguments
///
/// The new object's `__proto__` is the constructor's `prototype`; the
/// constructor runs with the object as `this` and its return value is
/// discarded.
fn construct(ctx: &mut Context, ctor: ObjectRef, args: Vec<Value>) -> RuntimeResult<Value> {
    let Some(obj) = ctx.heap.new_object() else {
        debug!("new: allocation failed");
        ctx.heap.release_all(args);
        return Ok(Value::Null);
    };
    if let Some(proto) = ctx.heap.get_property(ctor, PROTOTYPE).cloned() {
        ctx.heap.set_property(obj, PROTO, &proto);
    }
    let this = ctx.share(&Value::Object(obj));
    let result = ctx.call_function(ctor, this, args);
    match result {
        Ok(returned) => {
            ctx.release(returned);
            Ok(Value::Object(obj))
        }
        Err(e) => {
            ctx.release(Value::Object(obj));
            Err(e)
        }
    }
}

/// Built-in constructors used when no script function has the name
fn construct_builtin(ctx: &mut Context, name: &[u8], args: Vec<Value>) -> Value {
    match name {
        b"Object" => {
            ctx.heap.release_all(args);
            ctx.heap.new_object().map_or(Value::Null, Value::Object)
        }
        b"Array" => {
            // A single numeric argument is a length
            let length = match args.as_slice() {
                [n] if n.is_number() => Some(n.to_number()),
                _ => None,
            };
            let array = match length {
                Some(n) => {
                    ctx.heap.release_all(args);
                    let n = if n.is_finite() && n > 0.0 { n as usize } else { 0 };
                    let arr = ctx.heap.new_array();
                    if let (Some(arr), true) = (arr, n > 0) {
                        ctx.heap.put_element(arr, n - 1, Value::Undefined);
                    }
                    arr
                }
                None => ctx.heap.alloc_array(AsArray::from_values(args)),
            };
            array.map_or(Value::Null, Value::Array)
        }
        _ => {
            debug!("new of unknown constructor {:?}", String::from_utf8_lossy(name));
            ctx.heap.release_all(args);
            Value::Undefined
        }
    }
}

/// Pop a constructor name and arguments; push the new object
pub fn new_object(ctx: &mut Context) -> RuntimeResult<()> {
    let (name, id) = ctx.pop_name();
    let args = pop_args(ctx);
    let ctor = ctx.get_variable(&name, id);
    let result = match ctor.as_object() {
        Some(func) if ctx.heap.is_function(func) => construct(ctx, func, args),
        _ => Ok(construct_builtin(ctx, &name, args)),
    };
    ctx.release(ctor);
    ctx.push(result?)
}

/// Pop a method name, a target and arguments; construct with the method
///
/// An empty or undefined name uses the target itself as the constructor.
pub fn new_method(ctx: &mut Context) -> RuntimeResult<()> {
    let name = ctx.pop();
    let target = ctx.pop();
    let args = pop_args(ctx);

    let ctor = match (&name, target.as_object()) {
        (_, None) => None,
        (Value::Undefined, Some(obj)) => Some(obj),
        (Value::Str(s), Some(obj)) if s.is_empty() => Some(obj),
        (other, Some(obj)) => {
            let method = crate::ops::convert::to_string_bytes(&ctx.heap, other);
            ctx.heap.lookup_member(obj, &method).and_then(|v| v.as_object())
        }
    };
    // Keep the constructor alive while the target is released
    let ctor = ctor.filter(|&c| ctx.heap.is_function(c));
    if let Some(c) = ctor {
        ctx.heap.retain(&Value::Object(c));
    }
    ctx.release(name);
    ctx.release(target);

    let result = match ctor {
        Some(c) => {
            let result = construct(ctx, c, args);
            ctx.release(Value::Object(c));
            result
        }
        None => {
            debug!("NewMethod target is not a constructor");
            ctx.heap.release_all(args);
            Ok(Value::Undefined)
        }
    };
    ctx.push(result?)
}

/// Member value of any value (undefined when missing); a new reference
pub(crate) fn member_of(ctx: &mut Context, target: &Value, name: &[u8]) -> Value {
    let found = match target {
        Value::Object(obj) => ctx.heap.lookup_member(*obj, name).cloned(),
        Value::Array(arr) => {
            if name == b"length" {
                Some(Value::F32(ctx.heap.array_len(*arr) as f32))
            } else {
                array_index(name).and_then(|i| ctx.heap.get_element(*arr, i).cloned())
            }
        }
        Value::Str(_) | Value::StrList(_) if name == b"length" => target
            .string_bytes()
            .map(|bytes| Value::F32(count_chars(&bytes) as f32)),
        _ => None,
    };
    match found {
        Some(value) => ctx.share(&value),
        None => {
            debug!("no member {:?} on {:?}", String::from_utf8_lossy(name), target.kind());
            Value::Undefined
        }
    }
}

/// Pop a name, then a target; push the member value
pub fn get_member(ctx: &mut Context) -> RuntimeResult<()> {
    let (name, _) = ctx.pop_name();
    let target = ctx.pop();
    let value = member_of(ctx, &target, &name);
    ctx.release(target);
    ctx.push(value)
}

/// Pop a value, a name, then a target; store the member
pub fn set_member(ctx: &mut Context) -> RuntimeResult<()> {
    let value = ctx.pop();
    let (name, _) = ctx.pop_name();
    let target = ctx.pop();
    match &target {
        Value::Object(obj) => ctx.heap.put_property(*obj, &name, value),
        Value::Array(arr) => match array_index(&name) {
            Some(index) => ctx.heap.put_element(*arr, index, value),
            None => {
                debug!("ignoring array member {:?}", String::from_utf8_lossy(&name));
                ctx.release(value);
            }
        },
        other => {
            debug!("member store on a {:?}", other.kind());
            ctx.release(value);
        }
    }
    ctx.release(target);
    Ok(())
}

/// Push a null terminator, then every enumerable name of `target`
fn push_names(ctx: &mut Context, target: &Value) -> RuntimeResult<()> {
    let names: Vec<Rc<[u8]>> = match target {
        Value::Object(obj) => ctx.heap.property_names(*obj),
        Value::Array(arr) => (0..ctx.heap.array_len(*arr))
            .map(|i| Rc::from(i.to_string().as_bytes()))
            .collect(),
        _ => Vec::new(),
    };
    ctx.push(Value::Null)?;
    for name in names {
        ctx.push(Value::bytes(name))?;
    }
    Ok(())
}

/// Pop a variable name and enumerate the value it holds
pub fn enumerate(ctx: &mut Context) -> RuntimeResult<()> {
    let (name, id) = ctx.pop_name();
    let target = ctx.get_variable(&name, id);
    let result = push_names(ctx, &target);
    ctx.release(target);
    result
}

/// Pop a value and enumerate it
pub fn enumerate2(ctx: &mut Context) -> RuntimeResult<()> {
    let target = ctx.pop();
    let result = push_names(ctx, &target);
    ctx.release(target);
    result
}

/// Pop a superclass, then a subclass, and link them
pub fn extends(ctx: &mut Context) -> RuntimeResult<()> {
    let sup = ctx.pop();
    let sub = ctx.pop();
    match (sub.as_object(), sup.as_object()) {
        (Some(sub_obj), Some(sup_obj)) => {
            if !ctx.heap.extends(sub_obj, sup_obj) {
                debug!("Extends failed");
            }
        }
        _ => debug!("Extends needs two constructors"),
    }
    ctx.release(sup);
    ctx.release(sub);
    Ok(())
}

/// Pop a constructor, a count and that many interfaces
pub fn implements_op(ctx: &mut Context) -> RuntimeResult<()> {
    let ctor = ctx.pop();
    let interfaces = pop_args(ctx);
    if let Some(ctor_obj) = ctor.as_object() {
        for interface in interfaces.iter().filter_map(Value::as_object) {
            ctx.heap.add_interface(ctor_obj, interface);
        }
    } else {
        debug!("ImplementsOp on a {:?}", ctor.kind());
    }
    ctx.heap.release_all(interfaces);
    ctx.release(ctor);
    Ok(())
}

/// Pop a constructor, then an object; push `object instanceof constructor`
pub fn instance_of(ctx: &mut Context) -> RuntimeResult<()> {
    let ctor = ctx.pop();
    let value = ctx.pop();
    let result = ctor.as_object().is_some_and(|c| ctx.heap.instance_of(&value, c));
    ctx.release(ctor);
    ctx.release(value);
    ctx.push(Value::Bool(result))
}

/// Pop an object, then a constructor; push the object if it is an
/// instance, null otherwise
pub fn cast_op(ctx: &mut Context) -> RuntimeResult<()> {
    let value = ctx.pop();
    let ctor = ctx.pop();
    let ok = ctor.as_object().is_some_and(|c| ctx.heap.instance_of(&value, c));
    ctx.release(ctor);
    if ok {
        ctx.push(value)
    } else {
        ctx.release(value);
        ctx.push(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::function::new_function;
    use crate::ops::testing::{context, push_all};
    use crate::runtime::{EntryPoint, FunctionDef};
    use crate::vm::Flow;

    fn noop() -> EntryPoint {
        Rc::new(|_: &mut Context| Ok(Flow::Normal))
    }

    #[test]
    fn test_init_object_keeps_declaration_order() {
        let (mut ctx, _) = context();
        push_all(
            &mut ctx,
            &[Value::str("x"), Value::F32(5.0), Value::str("y"), Value::F32(10.0), Value::F32(2.0)],
        );
        init_object(&mut ctx).unwrap();
        let obj = ctx.pop().as_object().unwrap();
        let names: Vec<Vec<u8>> = ctx.heap.property_names(obj).iter().map(|n| n.to_vec()).collect();
        assert_eq!(names, vec![b"x".to_vec(), b"y".to_vec()]);
        assert_eq!(ctx.heap.get_property(obj, b"y"), Some(&Value::F32(10.0)));
    }

    #[test]
    fn test_members_on_arrays_and_strings() {
        let (mut ctx, _) = context();
        // [1, 2, 3]: pushed in reverse, then the count
        push_all(&mut ctx, &[Value::F32(3.0), Value::F32(2.0), Value::F32(1.0), Value::F32(3.0)]);
        init_array(&mut ctx).unwrap();
        let arr = ctx.pop();
        assert_eq!(ctx.heap.get_element(arr.as_array().unwrap(), 0), Some(&Value::F32(1.0)));

        assert_eq!(member_of(&mut ctx, &arr, b"length"), Value::F32(3.0));
        assert_eq!(member_of(&mut ctx, &arr, b"2"), Value::F32(3.0));
        assert_eq!(member_of(&mut ctx, &arr, b"7"), Value::Undefined);
        assert_eq!(member_of(&mut ctx, &Value::str("héllo"), b"length"), Value::F32(5.0));

        push_all(&mut ctx, &[arr.clone(), Value::F32(5.0), Value::str("five")]);
        ctx.heap.retain(&arr);
        set_member(&mut ctx).unwrap();
        assert_eq!(ctx.heap.array_len(arr.as_array().unwrap()), 6);
    }

    #[test]
    fn test_get_member_walks_prototypes() {
        let (mut ctx, _) = context();
        let proto = ctx.heap.new_object().unwrap();
        ctx.heap.put_property(proto, b"shared", Value::str("yes"));
        let obj = ctx.heap.new_object().unwrap();
        ctx.heap.put_property(obj, PROTO, Value::Object(proto));

        push_all(&mut ctx, &[Value::Object(obj), Value::str("shared")]);
        get_member(&mut ctx).unwrap();
        assert_eq!(ctx.pop(), Value::str("yes"));
        // get_member consumed the only reference
        assert_eq!(ctx.heap.stats().live(), 0);
    }

    #[test]
    fn test_new_object_links_prototype() {
        let (mut ctx, _) = context();
        let ctor_entry: EntryPoint = Rc::new(|ctx: &mut Context| {
            let this = ctx.get_variable(b"this", 0);
            let obj = this.as_object().unwrap();
            let v = ctx.get_variable(b"v", 0);
            ctx.heap.put_property(obj, b"v", v);
            ctx.release(this);
            Ok(Flow::Normal)
        });
        let ctor = new_function(&mut ctx, FunctionDef::simple(b"Point", &[&b"v"[..]]), ctor_entry).unwrap();
        ctx.set_variable(b"Point", 0, Value::Object(ctor));

        push_all(&mut ctx, &[Value::F32(7.0), Value::F32(1.0), Value::str("Point")]);
        new_object(&mut ctx).unwrap();
        let instance = ctx.pop();
        let obj = instance.as_object().unwrap();
        assert_eq!(ctx.heap.get_property(obj, b"v"), Some(&Value::F32(7.0)));
        assert!(ctx.heap.instance_of(&instance, ctor));

        push_all(&mut ctx, &[instance.clone(), Value::Object(ctor)]);
        ctx.heap.retain(&instance);
        ctx.heap.retain(&Value::Object(ctor));
        instance_of(&mut ctx).unwrap();
        assert_eq!(ctx.pop(), Value::Bool(true));
    }

    #[test]
    fn test_builtin_constructors() {
        let (mut ctx, _) = context();
        push_all(&mut ctx, &[Value::F32(4.0), Value::F32(1.0), Value::str("Array")]);
        new_object(&mut ctx).unwrap();
        let arr = ctx.pop().as_array().unwrap();
        assert_eq!(ctx.heap.array_len(arr), 4);

        push_all(&mut ctx, &[Value::F32(0.0), Value::str("Object")]);
        new_object(&mut ctx).unwrap();
        assert!(ctx.pop().as_object().is_some());
    }

    #[test]
    fn test_enumerate_pushes_terminator_then_names() {
        let (mut ctx, _) = context();
        let obj = ctx.heap.new_object().unwrap();
        ctx.heap.put_property(obj, b"a", Value::F32(1.0));
        ctx.heap.put_property(obj, b"b", Value::F32(2.0));
        ctx.set_variable(b"o", 0, Value::Object(obj));

        push_all(&mut ctx, &[Value::str("o")]);
        enumerate(&mut ctx).unwrap();
        assert_eq!(ctx.pop(), Value::str("b"));
        assert_eq!(ctx.pop(), Value::str("a"));
        assert_eq!(ctx.pop(), Value::Null);
    }

    #[test]
    fn test_extends_and_cast() {
        let (mut ctx, _) = context();
        let base = new_function(&mut ctx, FunctionDef::simple(b"Base", &[]), noop()).unwrap();
        let derived = new_function(&mut ctx, FunctionDef::simple(b"Derived", &[]), noop()).unwrap();
        push_all(&mut ctx, &[Value::Object(derived), Value::Object(base)]);
        ctx.heap.retain(&Value::Object(derived));
        ctx.heap.retain(&Value::Object(base));
        extends(&mut ctx).unwrap();

        let instance = construct(&mut ctx, derived, Vec::new()).unwrap();
        assert!(ctx.heap.instance_of(&instance, base));

        push_all(&mut ctx, &[Value::Object(base), instance.clone()]);
        ctx.heap.retain(&Value::Object(base));
        cast_op(&mut ctx).unwrap();
        assert_eq!(ctx.pop(), instance);
    }

    #[test]
    fn test_implements() {
        let (mut ctx, _) = context();
        let iface = new_function(&mut ctx, FunctionDef::simple(b"I", &[]), noop()).unwrap();
        let class = new_function(&mut ctx, FunctionDef::simple(b"C", &[]), noop()).unwrap();
        push_all(&mut ctx, &[Value::Object(iface), Value::F32(1.0), Value::Object(class)]);
        ctx.heap.retain(&Value::Object(iface));
        ctx.heap.retain(&Value::Object(class));
        implements_op(&mut ctx).unwrap();

        let instance = construct(&mut ctx, class, Vec::new()).unwrap();
        assert!(ctx.heap.instance_of(&instance, iface));
    }
}
