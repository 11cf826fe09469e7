//! Script objects
//!
//! An object is a property list, an optional list of implemented
//! interfaces and, for function objects, the function data. Inheritance is
//! the `__proto__` link installed by `Extends` (or by `new`), walked to a
//! bounded depth.

use std::rc::Rc;

use log::debug;

use crate::heap::{Heap, ObjectRef};
use crate::runtime::function::AsFunction;
use crate::runtime::property::PropertyList;
use crate::value::Value;

/// Prototype link
pub const PROTO: &[u8] = b"__proto__";
/// Back-reference from a prototype to its constructor
pub const CONSTRUCTOR: &[u8] = b"constructor";
/// Superclass constructor installed by `Extends`
pub const SUPER_CONSTRUCTOR: &[u8] = b"__constructor__";
/// Prototype object of a constructor
pub const PROTOTYPE: &[u8] = b"prototype";

/// Maximum `__proto__` links followed during lookup
pub const MAX_PROTO_DEPTH: usize = 32;

/// Names skipped by enumeration
const HIDDEN: [&[u8]; 3] = [PROTO, SUPER_CONSTRUCTOR, CONSTRUCTOR];

/// Object payload
#[derive(Debug, Default)]
pub struct AsObject {
    pub properties: PropertyList,
    /// Constructors this object implements (owned references)
    pub interfaces: Vec<ObjectRef>,
    /// Present on function objects
    pub function: Option<AsFunction>,
}

impl AsObject {
    /// Function object payload
    pub fn with_function(function: AsFunction) -> Self {
        AsObject {
            function: Some(function),
            ..Default::default()
        }
    }
}

impl Heap {
    /// Own property value
    ///
    /// Weak properties whose target has been freed read as absent.
    pub fn get_property(&self, obj: ObjectRef, name: &[u8]) -> Option<&Value> {
        let prop = self.object(obj)?.properties.entry(name)?;
        if prop.weak && !self.is_live(&prop.value) {
            return None;
        }
        Some(&prop.value)
    }

    /// Whether the object has an own property called `name`
    pub fn has_property(&self, obj: ObjectRef, name: &[u8]) -> bool {
        self.get_property(obj, name).is_some()
    }

    /// Prototype of an object (its `__proto__` link)
    pub fn proto_of(&self, obj: ObjectRef) -> Option<ObjectRef> {
        self.get_property(obj, PROTO)?.as_object()
    }

    /// Member lookup: own property, then the prototype chain
    pub fn lookup_member(&self, obj: ObjectRef, name: &[u8]) -> Option<&Value> {
        let mut current = obj;
        for _ in 0..=MAX_PROTO_DEPTH {
            if let Some(v) = self.get_property(current, name) {
                return Some(v);
            }
            current = self.proto_of(current)?;
        }
        debug!("prototype chain deeper than {} while looking up member", MAX_PROTO_DEPTH);
        None
    }

    /// Store a property, retaining the new value and releasing the old one
    pub fn set_property(&mut self, obj: ObjectRef, name: &[u8], value: &Value) {
        let value = self.share(value);
        self.put_property(obj, name, value);
    }

    /// Store a property, taking over the caller's reference to `value`
    pub fn put_property(&mut self, obj: ObjectRef, name: &[u8], value: Value) {
        self.store_property(obj, name, value, false);
    }

    /// Store a property without owning a reference to its value
    pub fn put_weak_property(&mut self, obj: ObjectRef, name: &[u8], value: Value) {
        self.store_property(obj, name, value, true);
    }

    fn store_property(&mut self, obj: ObjectRef, name: &[u8], value: Value, weak: bool) {
        let Some(object) = self.object_mut(obj) else {
            debug!("property store on dead object {:?}", obj);
            if !weak {
                self.release(value);
            }
            return;
        };
        if let Some(old) = object.properties.insert(name, value, weak) {
            if !old.weak {
                self.release(old.value);
            }
        }
    }

    /// Remove an own property; returns whether it existed
    pub fn delete_property(&mut self, obj: ObjectRef, name: &[u8]) -> bool {
        let Some(prop) = self.object_mut(obj).and_then(|o| o.properties.remove(name)) else {
            return false;
        };
        if !prop.weak {
            self.release(prop.value);
        }
        true
    }

    /// Enumerable own property names, in insertion order
    pub fn property_names(&self, obj: ObjectRef) -> Vec<Rc<[u8]>> {
        let Some(object) = self.object(obj) else {
            return Vec::new();
        };
        object
            .properties
            .iter()
            .filter(|p| !HIDDEN.contains(&&*p.name))
            .map(|p| p.name.clone())
            .collect()
    }

    /// Function data of a function object
    pub fn function(&self, obj: ObjectRef) -> Option<&AsFunction> {
        self.object(obj)?.function.as_ref()
    }

    /// Whether the object is callable
    pub fn is_function(&self, obj: ObjectRef) -> bool {
        self.function(obj).is_some()
    }

    /// Record that `ctor` implements `interface`
    pub fn add_interface(&mut self, ctor: ObjectRef, interface: ObjectRef) {
        if self.object(interface).is_none() {
            return;
        }
        let Some(object) = self.object_mut(ctor) else {
            return;
        };
        if object.interfaces.contains(&interface) {
            return;
        }
        object.interfaces.push(interface);
        self.retain(&Value::Object(interface));
    }

    /// Make `sub` inherit from `sup`
    ///
    /// Builds a fresh prototype whose `__proto__` is `sup.prototype`, links
    /// it back to both constructors and installs it as `sub.prototype`.
    /// Returns false when the prototype cannot be allocated.
    pub fn extends(&mut self, sub: ObjectRef, sup: ObjectRef) -> bool {
        let Some(proto) = self.new_object() else {
            debug!("extends: allocation failed");
            return false;
        };

        if let Some(parent_proto) = self.get_property(sup, PROTOTYPE).cloned() {
            self.set_property(proto, PROTO, &parent_proto);
        }
        self.set_property(proto, SUPER_CONSTRUCTOR, &Value::Object(sup));
        self.put_weak_property(proto, CONSTRUCTOR, Value::Object(sub));
        self.put_property(sub, PROTOTYPE, Value::Object(proto));
        true
    }

    /// `instanceof`: prototype chain identity, then declared interfaces
    pub fn instance_of(&self, value: &Value, ctor: ObjectRef) -> bool {
        let Some(obj) = value.as_object() else {
            return false;
        };
        let target = self.get_property(ctor, PROTOTYPE).and_then(|p| p.as_object());

        let mut current = self.proto_of(obj);
        for _ in 0..MAX_PROTO_DEPTH {
            let Some(proto) = current else {
                return false;
            };
            if Some(proto) == target {
                return true;
            }
            let owner = self.get_property(proto, CONSTRUCTOR).and_then(|c| c.as_object());
            if let Some(owner) = owner {
                if self.implements(owner, ctor) {
                    return true;
                }
            }
            current = self.proto_of(proto);
        }
        false
    }

    fn implements(&self, owner: ObjectRef, interface: ObjectRef) -> bool {
        self.object(owner)
            .is_some_and(|o| o.interfaces.contains(&interface))
    }
}
