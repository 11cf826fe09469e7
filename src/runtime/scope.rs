//! Variable storage
//!
//! - [`Globals`]: named variables of the main timeline. Names known at
//!   translation time carry a constant ID that indexes a slot cache, so the
//!   common case skips hashing. Dynamic names go through the hash map. Both
//!   paths reach the same slot.
//! - [`ScopeChain`]: objects pushed by `with`, innermost last.
//! - [`RegisterBank`]: flat indexed storage for registers.
//!
//! None of these know about the heap: stores hand back the value they
//! replaced and the caller releases it.

use std::rc::Rc;

use log::debug;
use rustc_hash::FxHashMap;

use crate::heap::ObjectRef;
use crate::value::{DYNAMIC_STRING_ID, Value};

/// One global variable slot; `None` once deleted
#[derive(Debug)]
struct GlobalSlot {
    name: Rc<[u8]>,
    value: Option<Value>,
}

/// Global variable store
#[derive(Debug, Default)]
pub struct Globals {
    names: FxHashMap<Rc<[u8]>, usize>,
    slots: Vec<GlobalSlot>,
    /// Constant string ID -> slot index
    by_id: Vec<Option<usize>>,
}

impl Globals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh ID cache sized for IDs up to `max_id`
    ///
    /// IDs are only meaningful within one translation, so installing a new
    /// string table invalidates every cached slot.
    pub fn reset_ids(&mut self, max_id: u32) {
        self.by_id.clear();
        self.by_id.resize(max_id as usize + 1, None);
    }

    fn cached(&self, id: u32) -> Option<usize> {
        if id == DYNAMIC_STRING_ID {
            return None;
        }
        self.by_id.get(id as usize).copied().flatten()
    }

    fn cache(&mut self, id: u32, slot: usize) {
        if id == DYNAMIC_STRING_ID {
            return;
        }
        let index = id as usize;
        if index >= self.by_id.len() {
            self.by_id.resize(index + 1, None);
        }
        self.by_id[index] = Some(slot);
    }

    fn find(&self, name: &[u8], id: u32) -> Option<usize> {
        self.cached(id).or_else(|| self.names.get(name).copied())
    }

    /// Read a variable
    pub fn get(&self, name: &[u8], id: u32) -> Option<&Value> {
        let slot = self.find(name, id)?;
        self.slots[slot].value.as_ref()
    }

    /// Whether a variable is defined
    pub fn contains(&self, name: &[u8], id: u32) -> bool {
        self.get(name, id).is_some()
    }

    /// Write a variable, returning the value it replaced
    pub fn set(&mut self, name: &[u8], id: u32, value: Value) -> Option<Value> {
        let slot = match self.find(name, id) {
            Some(slot) => slot,
            None => {
                let name: Rc<[u8]> = Rc::from(name);
                let slot = self.slots.len();
                self.slots.push(GlobalSlot {
                    name: name.clone(),
                    value: None,
                });
                self.names.insert(name, slot);
                slot
            }
        };
        self.cache(id, slot);
        self.slots[slot].value.replace(value)
    }

    /// Delete a variable, returning its value
    ///
    /// The slot stays allocated so cached IDs remain valid.
    pub fn remove(&mut self, name: &[u8], id: u32) -> Option<Value> {
        let slot = self.find(name, id)?;
        self.slots[slot].value.take()
    }

    /// Number of defined variables
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.value.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of defined variables in definition order
    pub fn names(&self) -> impl Iterator<Item = &[u8]> {
        self.slots
            .iter()
            .filter(|s| s.value.is_some())
            .map(|s| &*s.name)
    }

    /// Remove every value, e.g. before releasing them at shutdown
    pub fn drain(&mut self) -> Vec<Value> {
        self.slots.iter_mut().filter_map(|s| s.value.take()).collect()
    }
}

/// Objects pushed by `with` blocks
#[derive(Debug)]
pub struct ScopeChain {
    entries: Vec<ObjectRef>,
    max_depth: usize,
}

impl ScopeChain {
    pub fn new(max_depth: usize) -> Self {
        ScopeChain {
            entries: Vec::new(),
            max_depth,
        }
    }

    /// Push an object; returns false (and keeps nothing) when full
    pub fn push(&mut self, obj: ObjectRef) -> bool {
        if self.entries.len() >= self.max_depth {
            debug!("scope chain full at depth {}", self.max_depth);
            return false;
        }
        self.entries.push(obj);
        true
    }

    pub fn pop(&mut self) -> Option<ObjectRef> {
        self.entries.pop()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries at or above `base`, innermost first
    pub fn innermost_from(&self, base: usize) -> impl Iterator<Item = ObjectRef> + '_ {
        self.entries
            .get(base..)
            .unwrap_or_default()
            .iter()
            .rev()
            .copied()
    }

    /// Remove entries above `len`, returning them for release
    pub fn truncate(&mut self, len: usize) -> Vec<ObjectRef> {
        if len >= self.entries.len() {
            return Vec::new();
        }
        self.entries.split_off(len)
    }
}

/// Indexed register storage
#[derive(Debug, Default)]
pub struct RegisterBank {
    slots: Vec<Value>,
}

impl RegisterBank {
    /// Bank of `count` registers, all undefined
    pub fn new(count: usize) -> Self {
        RegisterBank {
            slots: vec![Value::Undefined; count],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.slots.get(index)
    }

    /// Store into a register
    ///
    /// Returns the previous value, or gives `value` back when the index is
    /// out of range.
    pub fn replace(&mut self, index: usize, value: Value) -> Result<Value, Value> {
        match self.slots.get_mut(index) {
            Some(slot) => Ok(std::mem::replace(slot, value)),
            None => Err(value),
        }
    }

    /// Take every value out for release
    pub fn into_values(self) -> Vec<Value> {
        self.slots
    }
}
