//! Runtime support
//!
//! Core runtime types shared by the opcode library and the interpreter:
//! - Objects and their property lists, arrays
//! - Function objects and call descriptions
//! - String lists (lazy concatenation)
//! - Variable storage: globals, scope chain, registers
//! - The legacy random number generator
//! - Timeline state consumed by the frame player

pub mod array;
pub mod function;
pub mod object;
pub mod property;
pub mod random;
pub mod scope;
pub mod string;
pub mod timeline;

pub use array::{AsArray, MAX_ARRAY_LENGTH};
pub use function::{
    AsFunction, DEFAULT_REGISTER_COUNT, EntryPoint, FunctionDef, FunctionFlags, FunctionKind,
    Param, Preload,
};
pub use object::{AsObject, MAX_PROTO_DEPTH};
pub use property::{Property, PropertyList};
pub use random::RandomState;
pub use scope::{Globals, RegisterBank, ScopeChain};
pub use string::{StrView, StringList};
pub use timeline::{MovieClip, PropertyValue, SendMethod, Timeline, UrlRequest};
