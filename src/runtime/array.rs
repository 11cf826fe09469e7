//! Script arrays
//!
//! Dense arrays: every index below the length holds a value. Writing past
//! the end fills the gap with undefined, growing storage to twice the
//! required size.

use log::debug;

use crate::heap::{ArrayRef, Heap};
use crate::value::Value;

/// Largest index a store may target
pub const MAX_ARRAY_LENGTH: usize = 1 << 24;

/// Array payload
#[derive(Debug, Default)]
pub struct AsArray {
    elements: Vec<Value>,
    /// Logical capacity following the legacy growth policy
    capacity: usize,
}

impl AsArray {
    /// Create an empty array
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an array owning `values`
    pub fn from_values(values: Vec<Value>) -> Self {
        let capacity = values.len();
        AsArray {
            elements: values,
            capacity,
        }
    }

    /// Number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Current storage capacity
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Element at `index` (None when out of range)
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.elements.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.elements.iter()
    }

    /// Give up the elements, e.g. when the array is freed
    pub fn into_elements(self) -> Vec<Value> {
        self.elements
    }

    /// Store `value` at `index`, returning the replaced element
    fn store(&mut self, index: usize, value: Value) -> Option<Value> {
        if index >= self.capacity {
            let new_capacity = (index + 1) * 2;
            self.elements.reserve_exact(new_capacity - self.elements.len());
            self.capacity = new_capacity;
        }
        if index < self.elements.len() {
            return Some(std::mem::replace(&mut self.elements[index], value));
        }
        self.elements.resize(index, Value::Undefined);
        self.elements.push(value);
        None
    }
}

impl Heap {
    /// Array length (0 for dead handles)
    pub fn array_len(&self, arr: ArrayRef) -> usize {
        self.array(arr).map_or(0, |a| a.len())
    }

    /// Element at `index` (None when out of range)
    pub fn get_element(&self, arr: ArrayRef, index: usize) -> Option<&Value> {
        self.array(arr)?.get(index)
    }

    /// Store an element, retaining the new value and releasing the old one
    pub fn set_element(&mut self, arr: ArrayRef, index: usize, value: &Value) {
        let value = self.share(value);
        self.put_element(arr, index, value);
    }

    /// Store an element, taking over the caller's reference to `value`
    pub fn put_element(&mut self, arr: ArrayRef, index: usize, value: Value) {
        if index >= MAX_ARRAY_LENGTH {
            debug!("array index {} out of range", index);
            self.release(value);
            return;
        }
        let Some(array) = self.array_mut(arr) else {
            debug!("element store on dead array {:?}", arr);
            self.release(value);
            return;
        };
        if let Some(old) = array.store(index, value) {
            self.release(old);
        }
    }

    /// Append an element, taking over the caller's reference
    pub fn push_element(&mut self, arr: ArrayRef, value: Value) {
        let index = self.array_len(arr);
        self.put_element(arr, index, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_grows_and_fills() {
        let mut heap = Heap::new(None);
        let arr = heap.new_array().unwrap();

        heap.put_element(arr, 3, Value::F32(7.0));
        let array = heap.array(arr).unwrap();
        assert_eq!(array.len(), 4);
        assert_eq!(array.capacity(), 8);
        assert_eq!(array.get(0), Some(&Value::Undefined));
        assert_eq!(array.get(3), Some(&Value::F32(7.0)));
        assert_eq!(array.get(4), None);
    }

    #[test]
    fn test_out_of_range_get() {
        let mut heap = Heap::new(None);
        let arr = heap.alloc_array(AsArray::from_values(vec![Value::F32(1.0)])).unwrap();
        assert_eq!(heap.get_element(arr, 0), Some(&Value::F32(1.0)));
        assert_eq!(heap.get_element(arr, 1), None);
        assert_eq!(heap.get_element(arr, usize::MAX), None);
    }

    #[test]
    fn test_element_replacement_releases_old() {
        let mut heap = Heap::new(None);
        let arr = heap.new_array().unwrap();
        let a = Value::Object(heap.new_object().unwrap());
        let b = Value::Object(heap.new_object().unwrap());

        heap.set_element(arr, 0, &a);
        heap.set_element(arr, 0, &b);
        assert_eq!(heap.refcount(&a), Some(1));
        assert_eq!(heap.refcount(&b), Some(2));

        heap.push_element(arr, Value::F32(2.0));
        assert_eq!(heap.array_len(arr), 2);
    }

    #[test]
    fn test_huge_index_rejected() {
        let mut heap = Heap::new(None);
        let arr = heap.new_array().unwrap();
        let obj = Value::Object(heap.new_object().unwrap());
        heap.put_element(arr, MAX_ARRAY_LENGTH, obj.clone());
        assert_eq!(heap.array_len(arr), 0);
        assert!(!heap.is_live(&obj));
    }
}
