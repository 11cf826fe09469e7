//! Operand stack
//!
//! Slots own their values: pushing transfers a reference onto the stack
//! and popping transfers it back to the caller. The capacity is fixed when
//! the stack is created; pushing beyond it is a `StackOverflow` error
//! rather than silent corruption.

use log::debug;

use crate::value::Value;
use crate::vm::interpreter::{RuntimeError, RuntimeResult};

/// Value stack for action execution
#[derive(Debug)]
pub struct Stack {
    values: Vec<Value>,
    capacity: usize,
}

impl Stack {
    /// Create a stack holding at most `capacity` values
    pub fn new(capacity: usize) -> Self {
        Stack {
            values: Vec::with_capacity(capacity.min(1 << 16)),
            capacity,
        }
    }

    /// Push a value
    #[inline]
    pub fn push(&mut self, value: Value) -> RuntimeResult<()> {
        if self.values.len() >= self.capacity {
            return Err(RuntimeError::StackOverflow {
                capacity: self.capacity,
            });
        }
        self.values.push(value);
        Ok(())
    }

    /// Pop the top value; an empty stack yields undefined
    #[inline]
    pub fn pop(&mut self) -> Value {
        match self.values.pop() {
            Some(v) => v,
            None => {
                debug!("pop from empty stack");
                Value::Undefined
            }
        }
    }

    /// Peek at the top value without removing it
    #[inline]
    pub fn peek(&self) -> Option<&Value> {
        self.values.last()
    }

    /// Peek at a value at offset from top (0 = top)
    #[inline]
    pub fn peek_at(&self, offset: usize) -> Option<&Value> {
        let len = self.values.len();
        if offset < len {
            Some(&self.values[len - 1 - offset])
        } else {
            None
        }
    }

    /// Get the current stack depth
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the stack is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Maximum depth
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Swap the top two values; returns false with fewer than two
    pub fn swap(&mut self) -> bool {
        let len = self.values.len();
        if len < 2 {
            return false;
        }
        self.values.swap(len - 1, len - 2);
        true
    }

    /// Remove everything above `depth`, handing the values back for release
    pub fn truncate(&mut self, depth: usize) -> Vec<Value> {
        if depth >= self.values.len() {
            return Vec::new();
        }
        self.values.split_off(depth)
    }

    /// Iterate from bottom to top
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }
}
