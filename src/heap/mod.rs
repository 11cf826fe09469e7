//! Reference-counted heap
//!
//! Objects and arrays live in two generational arenas. Every stack slot,
//! register, variable, property and array element that holds a heap value
//! owns one reference to it. Releasing the last reference frees the cell
//! and releases everything it owned, iteratively, so deep graphs cannot
//! overflow the native stack. Cycles are not collected; prototype
//! back-references are stored weak to avoid the common one.

pub mod allocator;

pub use allocator::{AllocStats, Arena, Handle};

use log::debug;

use crate::runtime::array::AsArray;
use crate::runtime::object::AsObject;
use crate::value::Value;

/// Handle to an object cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef(Handle);

/// Handle to an array cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrayRef(Handle);

impl ObjectRef {
    #[inline]
    pub fn handle(self) -> Handle {
        self.0
    }
}

impl ArrayRef {
    #[inline]
    pub fn handle(self) -> Handle {
        self.0
    }
}

/// Combined allocation statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    pub objects: AllocStats,
    pub arrays: AllocStats,
}

impl HeapStats {
    /// Live cells across both arenas
    pub fn live(&self) -> usize {
        self.objects.live + self.arrays.live
    }

    /// Refused allocations across both arenas
    pub fn oom_count(&self) -> u64 {
        self.objects.oom_count + self.arrays.oom_count
    }
}

/// Object and array storage
#[derive(Debug, Default)]
pub struct Heap {
    objects: Arena<AsObject>,
    arrays: Arena<AsArray>,
}

impl Heap {
    /// Create a heap; `limit` bounds live cells per arena
    pub fn new(limit: Option<usize>) -> Self {
        Heap {
            objects: Arena::with_limit(limit),
            arrays: Arena::with_limit(limit),
        }
    }

    /// Allocate an object with refcount 1
    pub fn alloc_object(&mut self, object: AsObject) -> Option<ObjectRef> {
        self.objects.alloc(object).map(ObjectRef)
    }

    /// Allocate an empty object with refcount 1
    pub fn new_object(&mut self) -> Option<ObjectRef> {
        self.objects.alloc_default().map(ObjectRef)
    }

    /// Allocate an array with refcount 1
    pub fn alloc_array(&mut self, array: AsArray) -> Option<ArrayRef> {
        self.arrays.alloc(array).map(ArrayRef)
    }

    /// Allocate an empty array with refcount 1
    pub fn new_array(&mut self) -> Option<ArrayRef> {
        self.arrays.alloc_default().map(ArrayRef)
    }

    #[inline]
    pub fn object(&self, obj: ObjectRef) -> Option<&AsObject> {
        self.objects.get(obj.0)
    }

    #[inline]
    pub fn object_mut(&mut self, obj: ObjectRef) -> Option<&mut AsObject> {
        self.objects.get_mut(obj.0)
    }

    #[inline]
    pub fn array(&self, arr: ArrayRef) -> Option<&AsArray> {
        self.arrays.get(arr.0)
    }

    #[inline]
    pub fn array_mut(&mut self, arr: ArrayRef) -> Option<&mut AsArray> {
        self.arrays.get_mut(arr.0)
    }

    /// Reference count of a heap value (None for non-heap or dead values)
    pub fn refcount(&self, value: &Value) -> Option<u32> {
        match value {
            Value::Object(o) => self.objects.refcount(o.0),
            Value::Array(a) => self.arrays.refcount(a.0),
            _ => None,
        }
    }

    /// Whether a heap value still refers to a live cell
    pub fn is_live(&self, value: &Value) -> bool {
        self.refcount(value).is_some()
    }

    /// Add a reference to a heap value; no-op for other values
    pub fn retain(&mut self, value: &Value) {
        match value {
            Value::Object(o) => {
                self.objects.retain(o.0);
            }
            Value::Array(a) => {
                self.arrays.retain(a.0);
            }
            _ => {}
        }
    }

    /// Clone a value, adding the reference the copy owns
    pub fn share(&mut self, value: &Value) -> Value {
        self.retain(value);
        value.clone()
    }

    /// Drop one reference to a heap value; no-op for other values
    ///
    /// Cells reaching zero are freed and every reference they owned is
    /// released in turn.
    pub fn release(&mut self, value: Value) {
        if !value.is_heap() {
            return;
        }

        let mut pending = vec![value];
        while let Some(value) = pending.pop() {
            match value {
                Value::Object(o) => {
                    if let Some(mut object) = self.objects.release(o.0) {
                        for prop in object.properties.drain() {
                            if !prop.weak {
                                pending.push(prop.value);
                            }
                        }
                        pending.extend(object.interfaces.drain(..).map(Value::Object));
                        debug!("freed object {:?}", o);
                    }
                }
                Value::Array(a) => {
                    if let Some(array) = self.arrays.release(a.0) {
                        pending.extend(array.into_elements());
                        debug!("freed array {:?}", a);
                    }
                }
                _ => {}
            }
        }
    }

    /// Release every value in `values`
    pub fn release_all(&mut self, values: impl IntoIterator<Item = Value>) {
        for v in values {
            self.release(v);
        }
    }

    /// Allocation statistics for both arenas
    pub fn stats(&self) -> HeapStats {
        HeapStats {
            objects: self.objects.stats(),
            arrays: self.arrays.stats(),
        }
    }

    /// Free all cells regardless of reference counts
    ///
    /// Returns the number of cells still live, i.e. leaked by cycles or
    /// unbalanced references.
    pub fn shutdown(&mut self) -> usize {
        let leaked = self.objects.shutdown() + self.arrays.shutdown();
        if leaked > 0 {
            debug!("heap shutdown with {} live cells", leaked);
        }
        leaked
    }
}
