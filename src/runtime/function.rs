//! Function objects
//!
//! Two kinds of script functions exist:
//! - Simple functions (`DefineFunction`): parameters bind by name in the
//!   call's activation object, four scratch registers.
//! - Advanced functions (`DefineFunction2`): a private register bank of the
//!   declared size, parameters bound to registers or names, and flag bits
//!   selecting which special values are preloaded or suppressed.
//!
//! The body is reached through an [`EntryPoint`], which is either an
//! interpreter closure over the decoded region or a translated Rust fn.

use std::fmt;
use std::rc::Rc;

use crate::context::Context;
use crate::vm::{Flow, RuntimeResult};

/// Callable body of a script function
pub type EntryPoint = Rc<dyn Fn(&mut Context) -> RuntimeResult<Flow>>;

/// Registers available to simple functions and the global scope
pub const DEFAULT_REGISTER_COUNT: usize = 4;

/// Function flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// `DefineFunction`
    Simple,
    /// `DefineFunction2`
    Advanced,
}

/// Preload/suppress flag bits of an advanced function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FunctionFlags(u16);

impl FunctionFlags {
    pub const PRELOAD_THIS: u16 = 0x0001;
    pub const SUPPRESS_THIS: u16 = 0x0002;
    pub const PRELOAD_ARGUMENTS: u16 = 0x0004;
    pub const SUPPRESS_ARGUMENTS: u16 = 0x0008;
    pub const PRELOAD_SUPER: u16 = 0x0010;
    pub const SUPPRESS_SUPER: u16 = 0x0020;
    pub const PRELOAD_ROOT: u16 = 0x0040;
    pub const PRELOAD_PARENT: u16 = 0x0080;
    pub const PRELOAD_GLOBAL: u16 = 0x0100;

    #[inline]
    pub const fn from_bits(bits: u16) -> Self {
        FunctionFlags(bits)
    }

    #[inline]
    pub const fn bits(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn contains(self, flag: u16) -> bool {
        self.0 & flag != 0
    }
}

/// Special values a call can preload, in register order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preload {
    This,
    Arguments,
    Super,
    Root,
    Parent,
    Global,
}

impl FunctionFlags {
    /// Values to preload, in the order they take registers starting at 1
    pub fn preloads(self) -> Vec<Preload> {
        [
            (Self::PRELOAD_THIS, Preload::This),
            (Self::PRELOAD_ARGUMENTS, Preload::Arguments),
            (Self::PRELOAD_SUPER, Preload::Super),
            (Self::PRELOAD_ROOT, Preload::Root),
            (Self::PRELOAD_PARENT, Preload::Parent),
            (Self::PRELOAD_GLOBAL, Preload::Global),
        ]
        .into_iter()
        .filter(|(bit, _)| self.contains(*bit))
        .map(|(_, p)| p)
        .collect()
    }
}

/// Declared parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Register the argument goes to (0 = bind by name)
    pub register: u8,
    pub name: Rc<[u8]>,
}

impl Param {
    pub fn new(register: u8, name: &[u8]) -> Self {
        Param {
            register,
            name: Rc::from(name),
        }
    }
}

/// Static description of a function
#[derive(Debug, Clone)]
pub struct FunctionDef {
    /// Empty for anonymous functions
    pub name: Rc<[u8]>,
    pub kind: FunctionKind,
    pub params: Vec<Param>,
    pub register_count: u8,
    pub flags: FunctionFlags,
}

impl FunctionDef {
    /// `DefineFunction` description
    pub fn simple(name: &[u8], params: &[&[u8]]) -> Self {
        FunctionDef {
            name: Rc::from(name),
            kind: FunctionKind::Simple,
            params: params.iter().map(|p| Param::new(0, p)).collect(),
            register_count: DEFAULT_REGISTER_COUNT as u8,
            flags: FunctionFlags::default(),
        }
    }

    /// `DefineFunction2` description
    pub fn advanced(name: &[u8], register_count: u8, flags: FunctionFlags, params: Vec<Param>) -> Self {
        FunctionDef {
            name: Rc::from(name),
            kind: FunctionKind::Advanced,
            params,
            register_count,
            flags,
        }
    }

    /// Whether the function is anonymous
    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty()
    }

    /// Size of the register bank a call gets
    pub fn register_slots(&self) -> usize {
        match self.kind {
            FunctionKind::Simple => DEFAULT_REGISTER_COUNT,
            FunctionKind::Advanced => self.register_count as usize,
        }
    }
}

/// Function payload of a function object
#[derive(Clone)]
pub struct AsFunction {
    pub def: Rc<FunctionDef>,
    pub entry: EntryPoint,
}

impl AsFunction {
    pub fn new(def: FunctionDef, entry: EntryPoint) -> Self {
        AsFunction {
            def: Rc::new(def),
            entry,
        }
    }
}

impl fmt::Debug for AsFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsFunction")
            .field("name", &String::from_utf8_lossy(&self.def.name))
            .field("kind", &self.def.kind)
            .field("params", &self.def.params.len())
            .finish()
    }
}
