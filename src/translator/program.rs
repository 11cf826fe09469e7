//! Decoded program representation
//!
//! The decode pass turns each byte region into a [`Region`]: a flat list
//! of structured instructions plus the set of byte offsets that are jump
//! targets. Jump targets are resolved to instruction indices, so the
//! interpreter never does offset arithmetic. The emitter walks the same
//! structure to produce Rust source.

use std::collections::BTreeSet;
use std::rc::Rc;

use crate::runtime::FunctionDef;
use crate::vm::ActionCode;

/// One value of a Push action
#[derive(Debug, Clone, PartialEq)]
pub enum PushItem {
    /// Constant string, by string-table ID
    Str(u32),
    F32(f32),
    Null,
    Undefined,
    Register(u8),
    Bool(bool),
    F64(f64),
    I32(i32),
}

/// Where a catch block receives the thrown value
#[derive(Debug, Clone, PartialEq)]
pub enum CatchBinding {
    Register(u8),
    Variable(Rc<[u8]>),
}

/// A translated function body
#[derive(Debug)]
pub struct FunctionBody {
    pub def: FunctionDef,
    pub region: Region,
    /// Name of the generated Rust function
    pub symbol: String,
}

/// Try/catch/finally
#[derive(Debug)]
pub struct TryBlock {
    /// Catch binding; `None` when the block has no catch
    pub catch: Option<CatchBinding>,
    pub body: Region,
    pub catch_body: Option<Region>,
    pub finally_body: Option<Region>,
}

/// A structured instruction
#[derive(Debug)]
pub enum Action {
    /// Actions without operands
    Simple(ActionCode),
    Push(Vec<PushItem>),
    /// Unconditional jump to instruction `index` (byte offset `target`)
    Jump { target: usize, index: usize },
    /// Pops a condition and jumps when it is true
    If { target: usize, index: usize },
    /// Skips to `index` unless `frame` is loaded
    WaitForFrame { frame: u16, target: usize, index: usize },
    /// Pops a frame; skips to `index` unless it is loaded
    WaitForFrame2 { target: usize, index: usize },
    GotoFrame(u16),
    GetUrl { url: Rc<[u8]>, target: Rc<[u8]> },
    GetUrl2(u8),
    GotoFrame2 { play: bool, scene_bias: u16 },
    StoreRegister(u8),
    /// Pool declaration; already resolved into string IDs at decode time
    ConstantPool(Vec<u32>),
    SetTarget(Rc<[u8]>),
    GoToLabel(Rc<[u8]>),
    DefineFunction(Rc<FunctionBody>),
    With(Region),
    Try(TryBlock),
    End,
}

/// A decoded instruction and the byte offset it starts at
#[derive(Debug)]
pub struct Instruction {
    pub offset: usize,
    pub action: Action,
}

/// One translated byte region
#[derive(Debug, Default)]
pub struct Region {
    /// Always terminated by [`Action::End`]
    pub instructions: Vec<Instruction>,
    /// Byte offsets that are jump targets
    pub labels: BTreeSet<usize>,
    /// Generated function name
    pub symbol: String,
}

impl Region {
    /// Index of the instruction starting at `offset`
    pub fn index_of(&self, offset: usize) -> Option<usize> {
        self.instructions
            .binary_search_by_key(&offset, |i| i.offset)
            .ok()
    }

    /// Visit every nested region, depth first
    pub fn for_each_nested<'a>(&'a self, f: &mut dyn FnMut(&'a Region)) {
        for instruction in &self.instructions {
            match &instruction.action {
                Action::DefineFunction(body) => {
                    f(&body.region);
                    body.region.for_each_nested(f);
                }
                Action::With(region) => {
                    f(region);
                    region.for_each_nested(f);
                }
                Action::Try(block) => {
                    let parts = [Some(&block.body), block.catch_body.as_ref(), block.finally_body.as_ref()];
                    for region in parts.into_iter().flatten() {
                        f(region);
                        region.for_each_nested(f);
                    }
                }
                _ => {}
            }
        }
    }
}

/// A translated action stream
#[derive(Debug, Default)]
pub struct Program {
    /// String table; index is the string ID, entry 0 is unused
    pub strings: Vec<Rc<[u8]>>,
    /// Top-level scripts in translation order
    pub scripts: Vec<Region>,
}

impl Program {
    /// Highest assigned string ID
    pub fn max_string_id(&self) -> u32 {
        self.strings.len().saturating_sub(1) as u32
    }

    /// Bytes of a constant string
    pub fn string(&self, id: u32) -> Option<&Rc<[u8]>> {
        if id == 0 {
            return None;
        }
        self.strings.get(id as usize)
    }
}
