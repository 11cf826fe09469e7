//! Property list
//!
//! Objects store properties in insertion order and look them up with a
//! linear scan. Scripts rarely hold more than a handful of properties per
//! object, so a scan beats hashing. Storage grows 0 -> 4, then by half
//! again each time it fills.

use std::rc::Rc;

use crate::value::Value;

/// Initial property capacity
pub const INITIAL_PROPERTY_CAPACITY: usize = 4;

/// One named property
#[derive(Debug, Clone)]
pub struct Property {
    /// Property name bytes
    pub name: Rc<[u8]>,
    /// Stored value
    pub value: Value,
    /// Weak properties do not own a reference to their heap value
    pub weak: bool,
}

/// Ordered property storage with linear lookup
#[derive(Debug, Default)]
pub struct PropertyList {
    props: Vec<Property>,
    /// Logical capacity following the legacy growth policy
    capacity: usize,
}

impl PropertyList {
    /// Create an empty list (no storage allocated)
    pub fn new() -> Self {
        PropertyList {
            props: Vec::new(),
            capacity: 0,
        }
    }

    /// Number of properties
    #[inline]
    pub fn len(&self) -> usize {
        self.props.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    /// Current storage capacity
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Index of the property named `name`
    pub fn find(&self, name: &[u8]) -> Option<usize> {
        self.props.iter().position(|p| &*p.name == name)
    }

    /// Property named `name`
    pub fn entry(&self, name: &[u8]) -> Option<&Property> {
        self.props.iter().find(|p| &*p.name == name)
    }

    /// Value of the property named `name`
    pub fn get(&self, name: &[u8]) -> Option<&Value> {
        self.entry(name).map(|p| &p.value)
    }

    /// Whether the property exists
    pub fn contains(&self, name: &[u8]) -> bool {
        self.find(name).is_some()
    }

    /// Store a value, returning the property it replaced
    ///
    /// A new name is appended; an existing one is overwritten in place.
    /// The caller owns the returned property and must release its value
    /// unless the property was weak.
    pub fn insert(&mut self, name: &[u8], value: Value, weak: bool) -> Option<Property> {
        if let Some(index) = self.find(name) {
            let slot = &mut self.props[index];
            let old = Property {
                name: slot.name.clone(),
                value: std::mem::replace(&mut slot.value, value),
                weak: slot.weak,
            };
            slot.weak = weak;
            return Some(old);
        }

        if self.props.len() == self.capacity {
            self.grow();
        }
        self.props.push(Property {
            name: Rc::from(name),
            value,
            weak,
        });
        None
    }

    fn grow(&mut self) {
        let new_capacity = if self.capacity == 0 {
            INITIAL_PROPERTY_CAPACITY
        } else {
            self.capacity + self.capacity / 2
        };
        self.props.reserve_exact(new_capacity - self.props.len());
        self.capacity = new_capacity;
    }

    /// Remove a property, keeping the order of the rest
    pub fn remove(&mut self, name: &[u8]) -> Option<Property> {
        let index = self.find(name)?;
        Some(self.props.remove(index))
    }

    /// Iterate over properties in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.props.iter()
    }

    /// Take every property out, leaving the list empty
    pub fn drain(&mut self) -> Vec<Property> {
        self.capacity = 0;
        std::mem::take(&mut self.props)
    }
}
