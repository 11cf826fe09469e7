//! Action value representation
//!
//! `Value` is the closed sum type carried by the operand stack, registers,
//! variables, properties and array elements. Heap values (objects, arrays)
//! are generational handles into the [`Heap`](crate::heap::Heap); whoever
//! holds a `Value` holds one reference to the cell it names, so dropping a
//! heap value without releasing it leaks the cell.
//!
//! Strings are shared byte buffers. A constant string remembers the ID the
//! translator assigned to it, which the global variable store uses as an
//! O(1) fast path. Dynamic strings carry ID 0.

use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

use crate::heap::{ArrayRef, ObjectRef};
use crate::runtime::string::{StrView, StringList};
use crate::util::parse_number;

/// String ID for strings created at runtime
pub const DYNAMIC_STRING_ID: u32 = 0;

/// A string value: shared bytes plus translator-assigned constant ID
#[derive(Clone)]
pub struct StrValue {
    bytes: Rc<[u8]>,
    id: u32,
}

impl StrValue {
    /// Create a dynamic string
    pub fn new(bytes: impl Into<Rc<[u8]>>) -> Self {
        StrValue {
            bytes: bytes.into(),
            id: DYNAMIC_STRING_ID,
        }
    }

    /// Create a string that aliases a constant from the string table
    pub fn constant(bytes: Rc<[u8]>, id: u32) -> Self {
        StrValue { bytes, id }
    }

    /// Raw bytes
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared buffer
    #[inline]
    pub fn shared(&self) -> &Rc<[u8]> {
        &self.bytes
    }

    /// Constant ID (0 for dynamic strings)
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Byte length
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl PartialEq for StrValue {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl fmt::Debug for StrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.bytes))?;
        if self.id != DYNAMIC_STRING_ID {
            write!(f, "#{}", self.id)?;
        }
        Ok(())
    }
}

/// Type class used by strict equality
///
/// Both numeric precisions are one class, as are plain strings and
/// string lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Undefined,
    Null,
    Boolean,
    Number,
    String,
    Object,
    Array,
}

/// An action value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    /// Single precision number (the default numeric width)
    F32(f32),
    /// Double precision number
    F64(f64),
    Str(StrValue),
    /// Lazy concatenation of fragments
    StrList(StringList),
    Object(ObjectRef),
    Array(ArrayRef),
}

impl Default for Value {
    fn default() -> Self {
        Value::Undefined
    }
}

impl Value {
    /// Dynamic string value from text
    pub fn str(s: &str) -> Self {
        Value::Str(StrValue::new(s.as_bytes()))
    }

    /// Dynamic string value from bytes
    pub fn bytes(bytes: impl Into<Rc<[u8]>>) -> Self {
        Value::Str(StrValue::new(bytes))
    }

    /// Number with the requested precision
    #[inline]
    pub fn number(x: f64, wide: bool) -> Self {
        if wide {
            Value::F64(x)
        } else {
            Value::F32(x as f32)
        }
    }

    /// Boolean result encoded the legacy way (1.0 / 0.0)
    #[inline]
    pub fn flag(b: bool) -> Self {
        Value::F32(if b { 1.0 } else { 0.0 })
    }

    /// Type class
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Undefined => ValueKind::Undefined,
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Boolean,
            Value::F32(_) | Value::F64(_) => ValueKind::Number,
            Value::Str(_) | Value::StrList(_) => ValueKind::String,
            Value::Object(_) => ValueKind::Object,
            Value::Array(_) => ValueKind::Array,
        }
    }

    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[inline]
    pub fn is_number(&self) -> bool {
        matches!(self, Value::F32(_) | Value::F64(_))
    }

    #[inline]
    pub fn is_string(&self) -> bool {
        matches!(self, Value::Str(_) | Value::StrList(_))
    }

    /// Whether this value refers to a heap cell
    #[inline]
    pub fn is_heap(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Array(_))
    }

    #[inline]
    pub fn as_object(&self) -> Option<ObjectRef> {
        match self {
            Value::Object(o) => Some(*o),
            _ => None,
        }
    }

    #[inline]
    pub fn as_array(&self) -> Option<ArrayRef> {
        match self {
            Value::Array(a) => Some(*a),
            _ => None,
        }
    }

    /// View of a string value without materializing lists
    pub fn as_str_view(&self) -> Option<StrView<'_>> {
        match self {
            Value::Str(s) => Some(StrView::Plain(s.bytes())),
            Value::StrList(l) => Some(StrView::List(l)),
            _ => None,
        }
    }

    /// Contiguous bytes of a string value
    pub fn string_bytes(&self) -> Option<Cow<'_, [u8]>> {
        match self {
            Value::Str(s) => Some(Cow::Borrowed(s.bytes())),
            Value::StrList(l) => Some(Cow::Owned(l.to_bytes())),
            _ => None,
        }
    }

    /// Whether numeric coercion of this value yields double precision
    ///
    /// Only single precision numbers and booleans stay narrow.
    #[inline]
    pub fn is_wide(&self) -> bool {
        !matches!(self, Value::F32(_) | Value::Bool(_))
    }

    /// Numeric coercion
    ///
    /// Strings parse their longest numeric prefix (empty is 0, garbage is
    /// NaN). Undefined, null and heap values are NaN.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::F32(x) => *x as f64,
            Value::F64(x) => *x,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Str(s) => parse_number(s.bytes()),
            Value::StrList(l) => parse_number(&l.to_bytes()),
            Value::Undefined | Value::Null | Value::Object(_) | Value::Array(_) => f64::NAN,
        }
    }

    /// Truthiness used by conditional branches and logical operators
    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Object(_) | Value::Array(_) => true,
            _ => {
                let n = self.to_number();
                n != 0.0 && !n.is_nan()
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::F64(x)
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::F32(x)
    }
}
