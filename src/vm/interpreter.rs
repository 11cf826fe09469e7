//! Region interpreter
//!
//! Executes decoded regions directly, with the same runtime calls the
//! emitter generates. Used by `swfrc run`, the REPL and the tests, so that
//! a translation can be checked without compiling its Rust output.

use std::rc::Rc;

use log::{debug, trace};

use crate::context::Context;
use crate::ops;
use crate::ops::control::{CatchTarget, RegionFn, TryRegions};
use crate::runtime::EntryPoint;
use crate::translator::program::{Action, CatchBinding, FunctionBody, Program, PushItem, Region};
use crate::value::Value;

/// Engine-level failure
///
/// Script-level problems never surface here: they degrade to sentinel
/// values. These errors abort the running script.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// Operand stack full
    StackOverflow { capacity: usize },
    /// Too many nested calls
    CallDepthExceeded { limit: usize },
    /// Instruction budget used up
    InstructionLimit { limit: u64 },
    /// Trace output could not be written
    Output(String),
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StackOverflow { capacity } => {
                write!(f, "stack overflow (capacity {} values)", capacity)
            }
            Self::CallDepthExceeded { limit } => write!(f, "call depth exceeded ({})", limit),
            Self::InstructionLimit { limit } => {
                write!(f, "instruction limit of {} reached", limit)
            }
            Self::Output(msg) => write!(f, "output error: {}", msg),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// How a region finished
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Ran off the end or hit End
    Normal,
    /// Return action; the value is owned by the receiver
    Return(Value),
    /// A script exception is pending in the context
    Throw,
}

/// Interpreter over a translated program
pub struct Interpreter {
    program: Rc<Program>,
}

impl Interpreter {
    pub fn new(program: Program) -> Self {
        Interpreter {
            program: Rc::new(program),
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Load the program's string table and scripts into a context
    ///
    /// Script entry points keep the program alive, so the interpreter can
    /// be dropped afterwards.
    pub fn install(&self, ctx: &mut Context) {
        ctx.install_strings(self.program.strings.clone());
        let scripts = (0..self.program.scripts.len())
            .map(|index| {
                let program = self.program.clone();
                let entry: EntryPoint = Rc::new(move |ctx: &mut Context| {
                    Self::run_region(&program.scripts[index], ctx)
                });
                entry
            })
            .collect();
        ctx.install_scripts(scripts);
    }

    /// Install the program and run script `index` once
    pub fn run_script(&self, ctx: &mut Context, index: usize) -> RuntimeResult<()> {
        self.install(ctx);
        ctx.run_script(index)
    }

    /// Install the program and run every script in order
    pub fn run_all(&self, ctx: &mut Context) -> RuntimeResult<()> {
        self.install(ctx);
        for index in 0..self.program.scripts.len() {
            ctx.run_script(index)?;
        }
        Ok(())
    }

    /// Execute one region until it ends, returns or throws
    pub fn run_region(region: &Region, ctx: &mut Context) -> RuntimeResult<Flow> {
        let instructions = &region.instructions;
        let mut pc = 0;

        while let Some(instruction) = instructions.get(pc) {
            ctx.tick()?;
            trace!("{:>5}: {:?}", instruction.offset, instruction.action);
            pc += 1;

            match &instruction.action {
                Action::End => return Ok(Flow::Normal),

                Action::Simple(code) => match ops::dispatch(ctx, *code)? {
                    Flow::Normal => {}
                    flow => return Ok(flow),
                },

                Action::Push(items) => {
                    for item in items {
                        Self::push_item(ctx, item)?;
                    }
                }

                Action::Jump { index, .. } => pc = *index,

                Action::If { index, .. } => {
                    if ops::control::pop_condition(ctx) {
                        pc = *index;
                    }
                }

                Action::WaitForFrame { frame, index, .. } => {
                    if !ops::control::frame_loaded(ctx, *frame as usize) {
                        pc = *index;
                    }
                }

                Action::WaitForFrame2 { index, .. } => {
                    if !ops::control::wait_for_frame2(ctx) {
                        pc = *index;
                    }
                }

                Action::GotoFrame(frame) => ops::control::goto_frame(ctx, *frame)?,

                Action::GetUrl { url, target } => ops::control::get_url(ctx, url, target)?,

                Action::GetUrl2(flags) => ops::control::get_url2(ctx, *flags)?,

                Action::GotoFrame2 { play, scene_bias } => {
                    ops::control::goto_frame2(ctx, *play, *scene_bias)?
                }

                Action::StoreRegister(register) => ops::variable::store_register(ctx, *register)?,

                // Resolved into string IDs by the decoder
                Action::ConstantPool(_) => {}

                Action::SetTarget(target) => ops::control::set_target(ctx, target)?,

                Action::GoToLabel(label) => ops::control::goto_label(ctx, label)?,

                Action::DefineFunction(body) => {
                    ops::function::define_function(ctx, body.def.clone(), Self::entry_point(body))?
                }

                Action::With(body) => {
                    let run = |ctx: &mut Context| Self::run_region(body, ctx);
                    match ops::scope::run_with(ctx, &run)? {
                        Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }

                Action::Try(block) => {
                    let body = |ctx: &mut Context| Self::run_region(&block.body, ctx);
                    let catch_body = block
                        .catch_body
                        .as_ref()
                        .map(|r| move |ctx: &mut Context| Self::run_region(r, ctx));
                    let finally_body = block
                        .finally_body
                        .as_ref()
                        .map(|r| move |ctx: &mut Context| Self::run_region(r, ctx));
                    let regions = TryRegions {
                        catch: match &block.catch {
                            Some(CatchBinding::Register(r)) => CatchTarget::Register(*r),
                            Some(CatchBinding::Variable(name)) => CatchTarget::Variable(name),
                            None => CatchTarget::None,
                        },
                        body: &body,
                        catch_body: catch_body.as_ref().map(|f| f as RegionFn<'_>),
                        finally_body: finally_body.as_ref().map(|f| f as RegionFn<'_>),
                    };
                    match ops::control::run_try(ctx, regions)? {
                        Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
            }

            if ctx.has_exception() {
                debug!("exception pending after offset {}", instruction.offset);
                return Ok(Flow::Throw);
            }
        }

        Ok(Flow::Normal)
    }

    fn push_item(ctx: &mut Context, item: &PushItem) -> RuntimeResult<()> {
        match item {
            PushItem::Str(id) => ops::push::string(ctx, *id),
            PushItem::F32(x) => ops::push::float(ctx, *x),
            PushItem::Null => ops::push::null(ctx),
            PushItem::Undefined => ops::push::undefined(ctx),
            PushItem::Register(r) => ops::push::register(ctx, *r),
            PushItem::Bool(b) => ops::push::boolean(ctx, *b),
            PushItem::F64(x) => ops::push::double(ctx, *x),
            PushItem::I32(n) => ops::push::integer(ctx, *n),
        }
    }

    fn entry_point(body: &Rc<FunctionBody>) -> EntryPoint {
        let body = body.clone();
        Rc::new(move |ctx: &mut Context| Self::run_region(&body.region, ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Config, SharedBuffer};
    use crate::translator::Translator;

    /// Assembles action bytes
    #[derive(Default)]
    struct Asm {
        bytes: Vec<u8>,
    }

    impl Asm {
        fn op(mut self, code: u8) -> Self {
            self.bytes.push(code);
            self
        }

        fn record(mut self, code: u8, payload: &[u8]) -> Self {
            self.bytes.push(code);
            self.bytes.extend_from_slice(&(payload.len() as u16).to_le_bytes());
            self.bytes.extend_from_slice(payload);
            self
        }

        fn push_str(self, s: &str) -> Self {
            let mut payload = vec![0];
            payload.extend_from_slice(s.as_bytes());
            payload.push(0);
            self.record(0x96, &payload)
        }

        fn push_f32(self, x: f32) -> Self {
            let mut payload = vec![1];
            payload.extend_from_slice(&x.to_le_bytes());
            self.record(0x96, &payload)
        }

        fn push_f64(self, x: f64) -> Self {
            let bits = x.to_bits();
            let mut payload = vec![6];
            payload.extend_from_slice(&((bits >> 32) as u32).to_le_bytes());
            payload.extend_from_slice(&(bits as u32).to_le_bytes());
            self.record(0x96, &payload)
        }

        fn push_bool(self, b: bool) -> Self {
            self.record(0x96, &[5, b as u8])
        }

        fn push_reg(self, r: u8) -> Self {
            self.record(0x96, &[4, r])
        }

        fn jump(self, code: u8, offset: i16) -> Self {
            self.record(code, &offset.to_le_bytes())
        }

        fn len(&self) -> usize {
            self.bytes.len()
        }

        fn extend(mut self, other: Asm) -> Self {
            self.bytes.extend(other.bytes);
            self
        }

        fn end(mut self) -> Vec<u8> {
            self.bytes.push(0);
            self.bytes
        }

        fn body(self) -> Vec<u8> {
            self.bytes
        }
    }

    fn run(code: Vec<u8>) -> (String, Context) {
        run_with(code, Config::default())
    }

    fn run_with(code: Vec<u8>, config: Config) -> (String, Context) {
        let program = Translator::new().translate_scripts(&[code]).unwrap();
        let output = SharedBuffer::new();
        let mut ctx = Context::with_output(config, Box::new(output.clone()));
        Interpreter::new(program).run_all(&mut ctx).unwrap();
        (output.text(), ctx)
    }

    fn trace_of(code: Vec<u8>) -> String {
        run(code).0
    }

    #[test]
    fn test_object_members_sum() {
        // o = {}; o.x = 5; o.y = 10; trace(o.x + o.y);
        let code = Asm::default()
            .push_str("o")
            .push_f32(0.0)
            .op(0x43) // InitObject
            .op(0x1D) // SetVariable
            .push_str("o")
            .op(0x1C)
            .push_str("x")
            .push_f32(5.0)
            .op(0x4F) // SetMember
            .push_str("o")
            .op(0x1C)
            .push_str("y")
            .push_f32(10.0)
            .op(0x4F)
            .push_str("o")
            .op(0x1C)
            .push_str("x")
            .op(0x4E) // GetMember
            .push_str("o")
            .op(0x1C)
            .push_str("y")
            .op(0x4E)
            .op(0x47) // Add2
            .op(0x26) // Trace
            .end();
        assert_eq!(trace_of(code), "15\n");
    }

    fn with_block(body: Asm) -> Asm {
        let body = body.body();
        Asm::default()
            .record(0x94, &(body.len() as u16).to_le_bytes())
            .extend(Asm { bytes: body })
    }

    #[test]
    fn test_with_resolves_object_first() {
        // prop = "global"; obj = { prop: "own" }; with (obj) { trace(prop); }
        let code = Asm::default()
            .push_str("prop")
            .push_str("global")
            .op(0x1D)
            .push_str("obj")
            .push_str("prop")
            .push_str("own")
            .push_f32(1.0)
            .op(0x43)
            .op(0x1D)
            .push_str("obj")
            .op(0x1C)
            .extend(with_block(Asm::default().push_str("prop").op(0x1C).op(0x26)))
            .push_str("prop")
            .op(0x1C)
            .op(0x26)
            .end();
        assert_eq!(trace_of(code), "own\nglobal\n");
    }

    #[test]
    fn test_with_falls_back_to_globals() {
        let code = Asm::default()
            .push_str("prop")
            .push_str("global")
            .op(0x1D)
            .push_str("obj")
            .push_f32(0.0)
            .op(0x43)
            .op(0x1D)
            .push_str("obj")
            .op(0x1C)
            .extend(with_block(
                Asm::default()
                    .push_str("prop")
                    .op(0x1C)
                    .op(0x26)
                    // Assignment inside with writes the global when obj lacks it
                    .push_str("prop")
                    .push_str("changed")
                    .op(0x1D),
            ))
            .push_str("prop")
            .op(0x1C)
            .op(0x26)
            .end();
        assert_eq!(trace_of(code), "global\nchanged\n");
    }

    #[test]
    fn test_coercion_rules() {
        let code = Asm::default()
            .push_str("3")
            .push_f32(1.0)
            .op(0x47)
            .op(0x26)
            .push_f32(3.0)
            .push_f32(1.0)
            .op(0x47)
            .op(0x26)
            .push_f32(1.0)
            .push_f32(0.0)
            .op(0x0D)
            .op(0x26)
            .end();
        assert_eq!(trace_of(code), "31\n4\n#ERROR#\n");
    }

    #[test]
    fn test_string_list_equals_literal() {
        let code = Asm::default()
            .push_str("A")
            .push_str("B")
            .op(0x47)
            .push_str("C")
            .op(0x47)
            .op(0x4C) // PushDuplicate
            .push_str("ABC")
            .op(0x66) // StrictEquals
            .op(0x26)
            .op(0x14) // StringLength
            .op(0x26)
            .end();
        assert_eq!(trace_of(code), "1\n3\n");
    }

    #[test]
    fn test_backward_jump_loop() {
        // i = 0; do { trace(i); i = i + 1; } while (i < 3);
        let head = Asm::default().push_str("i").push_f32(0.0).op(0x1D);
        let start = head.len();
        let body = head
            .push_str("i")
            .op(0x1C)
            .op(0x26)
            .push_str("i")
            .push_str("i")
            .op(0x1C)
            .push_f32(1.0)
            .op(0x47)
            .op(0x1D)
            .push_str("i")
            .op(0x1C)
            .push_f32(3.0)
            .op(0x48); // Less2
        let displacement = start as i32 - (body.len() as i32 + 5);
        let code = body.jump(0x9D, displacement as i16).end();
        assert_eq!(trace_of(code), "0\n1\n2\n");
    }

    #[test]
    fn test_forward_if_skips() {
        let skipped = Asm::default().push_str("no").op(0x26);
        let code = Asm::default()
            .push_bool(true)
            .jump(0x9D, skipped.len() as i16)
            .extend(skipped)
            .push_str("yes")
            .op(0x26)
            .end();
        assert_eq!(trace_of(code), "yes\n");
    }

    fn define_function2(name: &str, regs: u8, flags: u16, params: &[(u8, &str)], body: Vec<u8>) -> Asm {
        let mut payload = name.as_bytes().to_vec();
        payload.push(0);
        payload.extend_from_slice(&(params.len() as u16).to_le_bytes());
        payload.push(regs);
        payload.extend_from_slice(&flags.to_le_bytes());
        for (reg, param) in params {
            payload.push(*reg);
            payload.extend_from_slice(param.as_bytes());
            payload.push(0);
        }
        payload.extend_from_slice(&(body.len() as u16).to_le_bytes());
        Asm::default().record(0x8E, &payload).extend(Asm { bytes: body })
    }

    #[test]
    fn test_function_call_with_registers() {
        // function add(a, b) { return a + b; } trace(add(2, 40));
        let body = Asm::default().push_reg(1).push_reg(2).op(0x47).op(0x3E).body();
        let code = define_function2("add", 3, 0, &[(1, "a"), (2, "b")], body)
            .push_f32(40.0)
            .push_f32(2.0)
            .push_f32(2.0)
            .push_str("add")
            .op(0x3D)
            .op(0x26)
            .end();
        assert_eq!(trace_of(code), "42\n");
    }

    #[test]
    fn test_function_locals_do_not_leak() {
        // function f() { var t = 1; } f(); trace(t);
        let body = Asm::default().push_str("t").push_f32(1.0).op(0x3C).body();
        let code = define_function2("f", 1, 0, &[], body)
            .push_f32(0.0)
            .push_str("f")
            .op(0x3D)
            .op(0x17)
            .push_str("t")
            .op(0x1C)
            .op(0x26)
            .end();
        assert_eq!(trace_of(code), "undefined\n");
    }

    #[test]
    fn test_try_catch_binds_register() {
        // try { throw "boom"; trace("after"); } catch (r1) { trace(r1); } finally { trace("fin"); }
        let try_body = Asm::default().push_str("boom").op(0x2A).push_str("after").op(0x26).body();
        let catch_body = Asm::default().push_reg(1).op(0x26).body();
        let finally_body = Asm::default().push_str("fin").op(0x26).body();

        let mut payload = vec![0x01 | 0x02 | 0x04];
        payload.extend_from_slice(&(try_body.len() as u16).to_le_bytes());
        payload.extend_from_slice(&(catch_body.len() as u16).to_le_bytes());
        payload.extend_from_slice(&(finally_body.len() as u16).to_le_bytes());
        payload.push(1);
        let code = Asm::default()
            .record(0x8F, &payload)
            .extend(Asm { bytes: try_body })
            .extend(Asm { bytes: catch_body })
            .extend(Asm { bytes: finally_body })
            .push_str("done")
            .op(0x26)
            .end();
        assert_eq!(trace_of(code), "boom\nfin\ndone\n");
    }

    #[test]
    fn test_uncaught_throw_stops_script() {
        let code = Asm::default()
            .push_str("x")
            .op(0x2A)
            .push_str("unreachable")
            .op(0x26)
            .end();
        let (out, ctx) = run(code);
        assert_eq!(out, "");
        assert!(!ctx.has_exception());
    }

    #[test]
    fn test_random_is_deterministic_with_seed() {
        let code = || {
            let mut asm = Asm::default();
            for _ in 0..8 {
                asm = asm.push_f32(1000.0).op(0x30).op(0x26);
            }
            asm.end()
        };
        let config = || Config {
            random_seed: Some(99),
            ..Config::default()
        };
        let (a, _) = run_with(code(), config());
        let (b, _) = run_with(code(), config());
        assert_eq!(a, b);
        assert_eq!(a.lines().count(), 8);
    }

    #[test]
    fn test_heap_released_after_run() {
        // Temporary objects and arrays die once they leave the stack
        let code = Asm::default()
            .push_f32(0.0)
            .op(0x43)
            .op(0x17)
            .push_f32(3.0)
            .push_f32(2.0)
            .push_f32(1.0)
            .push_f32(3.0)
            .op(0x42) // InitArray
            .op(0x26)
            .end();
        let (out, ctx) = run(code);
        assert_eq!(out, "1,2,3\n");
        assert_eq!(ctx.heap().stats().live(), 0);
    }

    #[test]
    fn test_double_push_and_instruction_limit() {
        let code = Asm::default().push_f64(0.1).op(0x26).end();
        assert_eq!(trace_of(code), "0.1\n");

        // Infinite loop: jump to itself
        let code = Asm::default().jump(0x99, -5).end();
        let program = Translator::new().translate_scripts(&[code]).unwrap();
        let config = Config {
            instruction_limit: Some(100),
            ..Config::default()
        };
        let mut ctx = Context::new(config);
        let err = Interpreter::new(program).run_all(&mut ctx).unwrap_err();
        assert_eq!(err, RuntimeError::InstructionLimit { limit: 100 });
    }
}
