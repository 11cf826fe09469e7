//! Script execution context
//!
//! The Context owns everything a running script touches: the operand
//! stack, the heap, variable stores, call frames, the timeline and the
//! trace output. Every runtime function receives it explicitly, so any
//! number of independent contexts can exist side by side.
//!
//! Variable lookup order:
//! 1. `with` objects pushed inside the current call, innermost first
//! 2. the current call's activation object (locals and named parameters)
//! 3. globals
//! 4. undefined

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::Instant;

use log::debug;

use crate::heap::{Heap, HeapStats, ObjectRef};
use crate::ops::convert;
use crate::runtime::{
    DEFAULT_REGISTER_COUNT, EntryPoint, FunctionFlags, FunctionKind, Globals, Preload,
    RandomState, RegisterBank, ScopeChain, Timeline,
};
use crate::value::{DYNAMIC_STRING_ID, Value};
use crate::vm::{Flow, RuntimeError, RuntimeResult, Stack};

/// Name of the implicit arguments array
const ARGUMENTS: &[u8] = b"arguments";

/// Context configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Operand stack capacity in values
    pub stack_capacity: usize,
    /// Maximum number of nested `with` objects
    pub max_scope_depth: usize,
    /// Maximum number of nested function calls
    pub max_call_depth: usize,
    /// Live cell limit per heap arena
    pub heap_limit: Option<usize>,
    /// Fixed random seed for reproducible runs
    pub random_seed: Option<u32>,
    /// Instructions one script run may execute
    pub instruction_limit: Option<u64>,
    /// Frames the player runs before giving up
    pub max_frames: usize,
    /// Registers available outside of functions
    pub global_registers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            stack_capacity: 4096,
            max_scope_depth: 32,
            max_call_depth: 256,
            heap_limit: None,
            random_seed: None,
            instruction_limit: None,
            max_frames: 10_000,
            global_registers: DEFAULT_REGISTER_COUNT,
        }
    }
}

/// Cloneable in-memory output sink, for capturing traces
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far
    pub fn contents(&self) -> Vec<u8> {
        self.0.borrow().clone()
    }

    /// Output as (lossy) text
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// One active function call
#[derive(Debug)]
struct Frame {
    registers: RegisterBank,
    /// Activation object holding locals and named parameters
    locals: ObjectRef,
    this: Value,
    /// Scope chain depth at entry; `with` objects below it are not visible
    scope_base: usize,
    /// Stack depth at entry; anything above it is dropped on return
    stack_base: usize,
}

/// Script execution context
pub struct Context {
    config: Config,
    pub(crate) stack: Stack,
    pub(crate) heap: Heap,
    pub(crate) globals: Globals,
    pub(crate) scope: ScopeChain,
    pub(crate) timeline: Timeline,
    pub(crate) rng: RandomState,
    /// Global register file
    registers: RegisterBank,
    frames: Vec<Frame>,
    strings: Vec<Rc<[u8]>>,
    scripts: Vec<EntryPoint>,
    root: Option<ObjectRef>,
    exception: Option<Value>,
    try_depth: usize,
    output: Box<dyn Write>,
    started: Instant,
    instructions: u64,
}

impl Default for Context {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Context {
    /// Create a context that traces to stdout
    pub fn new(config: Config) -> Self {
        Self::with_output(config, Box::new(io::stdout()))
    }

    /// Create a context that traces to `output`
    pub fn with_output(config: Config, output: Box<dyn Write>) -> Self {
        Context {
            stack: Stack::new(config.stack_capacity),
            heap: Heap::new(config.heap_limit),
            globals: Globals::new(),
            scope: ScopeChain::new(config.max_scope_depth),
            timeline: Timeline::default(),
            rng: RandomState::new(config.random_seed),
            registers: RegisterBank::new(config.global_registers),
            frames: Vec::new(),
            strings: Vec::new(),
            scripts: Vec::new(),
            root: None,
            exception: None,
            try_depth: 0,
            output,
            started: Instant::now(),
            instructions: 0,
            config,
        }
    }

    pub fn set_output(&mut self, output: Box<dyn Write>) {
        self.output = output;
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn timeline_mut(&mut self) -> &mut Timeline {
        &mut self.timeline
    }

    /// Get memory statistics
    pub fn memory_stats(&self) -> HeapStats {
        self.heap.stats()
    }

    // Stack

    /// Push a value, handing its reference to the stack
    #[inline]
    pub fn push(&mut self, value: Value) -> RuntimeResult<()> {
        if self.stack.len() >= self.stack.capacity() {
            self.heap.release(value);
            return Err(RuntimeError::StackOverflow {
                capacity: self.stack.capacity(),
            });
        }
        self.stack.push(value)
    }

    /// Pop a value; the caller owns its reference
    #[inline]
    pub fn pop(&mut self) -> Value {
        self.stack.pop()
    }

    #[inline]
    pub fn peek(&self) -> Option<&Value> {
        self.stack.peek()
    }

    #[inline]
    pub fn release(&mut self, value: Value) {
        self.heap.release(value);
    }

    #[inline]
    pub fn share(&mut self, value: &Value) -> Value {
        self.heap.share(value)
    }

    /// Pop and coerce to a number; also reports whether the operand was wide
    pub fn pop_number(&mut self) -> (f64, bool) {
        let value = self.pop();
        let result = (value.to_number(), value.is_wide());
        self.heap.release(value);
        result
    }

    /// Pop and convert to string bytes
    pub fn pop_string(&mut self) -> Rc<[u8]> {
        let value = self.pop();
        let bytes = match &value {
            Value::Str(s) => s.shared().clone(),
            other => convert::to_string_bytes(&self.heap, other),
        };
        self.heap.release(value);
        bytes
    }

    /// Pop a variable or member name, keeping its constant ID
    pub fn pop_name(&mut self) -> (Rc<[u8]>, u32) {
        match self.pop() {
            Value::Str(s) => (s.shared().clone(), s.id()),
            other => {
                let bytes = convert::to_string_bytes(&self.heap, &other);
                self.heap.release(other);
                (bytes, DYNAMIC_STRING_ID)
            }
        }
    }

    // Program

    /// Install a string table (index = string ID)
    pub fn install_strings(&mut self, strings: Vec<Rc<[u8]>>) {
        self.globals.reset_ids(strings.len().saturating_sub(1) as u32);
        self.strings = strings;
    }

    /// Constant string by ID
    pub fn string(&self, id: u32) -> Option<&Rc<[u8]>> {
        if id == DYNAMIC_STRING_ID {
            return None;
        }
        self.strings.get(id as usize)
    }

    /// Install frame scripts (index = frame)
    pub fn install_scripts(&mut self, scripts: Vec<EntryPoint>) {
        self.timeline.set_total_frames(scripts.len().max(1));
        self.scripts = scripts;
    }

    pub fn script_count(&self) -> usize {
        self.scripts.len()
    }

    /// Run one top-level script to completion
    ///
    /// Values left on the stack are dropped and an uncaught exception is
    /// logged and cleared. Only engine errors are returned.
    pub fn run_script(&mut self, index: usize) -> RuntimeResult<()> {
        let Some(entry) = self.scripts.get(index).cloned() else {
            debug!("no script for frame {}", index);
            return Ok(());
        };
        self.instructions = 0;
        let stack_base = self.stack.len();
        let scope_base = self.scope.len();

        let result = entry(self);

        let leftovers = self.stack.truncate(stack_base);
        self.heap.release_all(leftovers);
        self.drop_scopes(scope_base);
        self.try_depth = 0;

        match result? {
            Flow::Return(value) => self.heap.release(value),
            Flow::Normal | Flow::Throw => {}
        }
        if let Some(exception) = self.exception.take() {
            let text = convert::to_string_bytes(&self.heap, &exception);
            debug!("uncaught exception in frame {}: {}", index, String::from_utf8_lossy(&text));
            self.heap.release(exception);
        }
        Ok(())
    }

    /// Run the script attached to `frame`, used by the Call action
    pub fn call_frame_script(&mut self, frame: usize) -> RuntimeResult<Flow> {
        let Some(entry) = self.scripts.get(frame).cloned() else {
            debug!("call: no script for frame {}", frame);
            return Ok(Flow::Normal);
        };
        entry(self)
    }

    // Output

    /// Write one trace line
    pub fn write_trace(&mut self, bytes: &[u8]) -> RuntimeResult<()> {
        self.output
            .write_all(bytes)
            .and_then(|_| self.output.write_all(b"\n"))
            .map_err(|e| RuntimeError::Output(e.to_string()))
    }

    pub fn flush_output(&mut self) -> RuntimeResult<()> {
        self.output
            .flush()
            .map_err(|e| RuntimeError::Output(e.to_string()))
    }

    // Exceptions

    /// Make `value` the pending exception
    pub fn raise(&mut self, value: Value) {
        if let Some(old) = self.exception.replace(value) {
            self.heap.release(old);
        }
    }

    #[inline]
    pub fn has_exception(&self) -> bool {
        self.exception.is_some()
    }

    /// Take the pending exception, clearing it
    pub fn take_exception(&mut self) -> Option<Value> {
        self.exception.take()
    }

    /// Number of enclosing try blocks
    pub fn try_depth(&self) -> usize {
        self.try_depth
    }

    pub(crate) fn enter_try(&mut self) {
        self.try_depth += 1;
    }

    pub(crate) fn leave_try(&mut self) {
        self.try_depth = self.try_depth.saturating_sub(1);
    }

    // Budget and clock

    /// Count one executed instruction against the budget
    #[inline]
    pub fn tick(&mut self) -> RuntimeResult<()> {
        self.instructions += 1;
        match self.config.instruction_limit {
            Some(limit) if self.instructions > limit => Err(RuntimeError::InstructionLimit { limit }),
            _ => Ok(()),
        }
    }

    /// Instructions executed by the current run
    pub fn instructions(&self) -> u64 {
        self.instructions
    }

    /// Milliseconds since the context was created
    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    // Special objects

    /// The main timeline object, created on first use
    pub fn root_object(&mut self) -> Option<ObjectRef> {
        if self.root.is_none() {
            self.root = self.heap.new_object();
            if self.root.is_none() {
                debug!("could not allocate the root object");
            }
        }
        self.root
    }

    /// A new reference to the root object (undefined if it cannot exist)
    pub fn root_value(&mut self) -> Value {
        match self.root_object() {
            Some(root) => self.heap.share(&Value::Object(root)),
            None => Value::Undefined,
        }
    }

    /// A new reference to the current `this`
    pub fn this_value(&mut self) -> Value {
        match self.frames.last() {
            Some(frame) => {
                let this = frame.this.clone();
                self.heap.share(&this)
            }
            None => self.root_value(),
        }
    }

    // Variables

    fn scope_base(&self) -> usize {
        self.frames.last().map_or(0, |f| f.scope_base)
    }

    fn lookup(&self, name: &[u8], id: u32) -> Option<&Value> {
        for obj in self.scope.innermost_from(self.scope_base()) {
            if let Some(value) = self.heap.lookup_member(obj, name) {
                return Some(value);
            }
        }
        if let Some(frame) = self.frames.last() {
            if let Some(value) = self.heap.get_property(frame.locals, name) {
                return Some(value);
            }
        }
        self.globals.get(name, id)
    }

    /// Resolve a variable; the result is a new reference
    pub fn get_variable(&mut self, name: &[u8], id: u32) -> Value {
        match name {
            b"this" => return self.this_value(),
            b"_root" | b"_level0" => return self.root_value(),
            _ => {}
        }
        match self.lookup(name, id).cloned() {
            Some(value) => {
                self.heap.retain(&value);
                value
            }
            None => {
                debug!("undefined variable {:?}", String::from_utf8_lossy(name));
                Value::Undefined
            }
        }
    }

    /// Assign a variable, taking over the reference to `value`
    ///
    /// Writes go to the innermost `with` object that already has the
    /// name, then to an existing local, otherwise to the globals.
    pub fn set_variable(&mut self, name: &[u8], id: u32, value: Value) {
        if matches!(name, b"this" | b"_root" | b"_level0") {
            debug!("ignoring assignment to {:?}", String::from_utf8_lossy(name));
            self.heap.release(value);
            return;
        }

        let base = self.scope_base();
        let owner = self
            .scope
            .innermost_from(base)
            .find(|&obj| self.heap.has_property(obj, name));
        if let Some(obj) = owner {
            self.heap.put_property(obj, name, value);
            return;
        }

        if let Some(locals) = self.frames.last().map(|f| f.locals) {
            if self.heap.has_property(locals, name) {
                self.heap.put_property(locals, name, value);
                return;
            }
        }

        if let Some(old) = self.globals.set(name, id, value) {
            self.heap.release(old);
        }
    }

    /// Define a variable in the current call (globals at top level)
    pub fn define_local(&mut self, name: &[u8], id: u32, value: Value) {
        match self.frames.last() {
            Some(frame) => {
                let locals = frame.locals;
                self.heap.put_property(locals, name, value);
            }
            None => {
                if let Some(old) = self.globals.set(name, id, value) {
                    self.heap.release(old);
                }
            }
        }
    }

    /// Declare a variable without assigning; existing values are kept
    pub fn declare_local(&mut self, name: &[u8], id: u32) {
        let exists = match self.frames.last() {
            Some(frame) => self.heap.has_property(frame.locals, name),
            None => self.globals.contains(name, id),
        };
        if !exists {
            self.define_local(name, id, Value::Undefined);
        }
    }

    /// Delete a variable; returns whether anything was removed
    pub fn delete_variable(&mut self, name: &[u8], id: u32) -> bool {
        let base = self.scope_base();
        let owner = self
            .scope
            .innermost_from(base)
            .find(|&obj| self.heap.has_property(obj, name));
        if let Some(obj) = owner {
            return self.heap.delete_property(obj, name);
        }
        if let Some(locals) = self.frames.last().map(|f| f.locals) {
            if self.heap.delete_property(locals, name) {
                return true;
            }
        }
        match self.globals.remove(name, id) {
            Some(old) => {
                self.heap.release(old);
                true
            }
            None => false,
        }
    }

    // Registers

    /// Read a register; the result is a new reference
    pub fn register(&mut self, index: u8) -> Value {
        let bank = match self.frames.last() {
            Some(frame) => &frame.registers,
            None => &self.registers,
        };
        match bank.get(index as usize).cloned() {
            Some(value) => {
                self.heap.retain(&value);
                value
            }
            None => {
                debug!("read of register {} outside bank of {}", index, bank.len());
                Value::Undefined
            }
        }
    }

    /// Write a register, taking over the reference to `value`
    pub fn set_register(&mut self, index: u8, value: Value) {
        let bank = match self.frames.last_mut() {
            Some(frame) => &mut frame.registers,
            None => &mut self.registers,
        };
        store_register(&mut self.heap, bank, index as usize, value);
    }

    // Calls

    /// Depth of the call stack
    pub fn call_depth(&self) -> usize {
        self.frames.len()
    }

    /// Call a function object
    ///
    /// Takes over the references to `this` and `args`; returns an owned
    /// result. Calling a non-function yields undefined. A script exception
    /// thrown by the callee stays pending in the context.
    pub fn call_function(&mut self, func: ObjectRef, this: Value, args: Vec<Value>) -> RuntimeResult<Value> {
        if self.frames.len() >= self.config.max_call_depth {
            self.heap.release(this);
            self.heap.release_all(args);
            return Err(RuntimeError::CallDepthExceeded {
                limit: self.config.max_call_depth,
            });
        }
        let Some(function) = self.heap.function(func).cloned() else {
            debug!("call of non-function object {:?}", func);
            self.heap.release(this);
            self.heap.release_all(args);
            return Ok(Value::Undefined);
        };
        let Some(locals) = self.heap.new_object() else {
            debug!("could not allocate activation object");
            self.heap.release(this);
            self.heap.release_all(args);
            return Ok(Value::Undefined);
        };

        let def = function.def.clone();
        let advanced = def.kind == FunctionKind::Advanced;
        let mut registers = RegisterBank::new(def.register_slots());

        let mut next_register = 1;
        let mut arguments_bound = false;
        if advanced {
            for preload in def.flags.preloads() {
                let value = match preload {
                    Preload::This => self.heap.share(&this),
                    Preload::Arguments => {
                        arguments_bound = true;
                        self.arguments_array(&args)
                    }
                    Preload::Super => self.super_of(&this),
                    Preload::Root | Preload::Parent => self.root_value(),
                    Preload::Global => {
                        debug!("_global preload is not modelled");
                        Value::Undefined
                    }
                };
                store_register(&mut self.heap, &mut registers, next_register, value);
                next_register += 1;
            }
        }
        let suppress_arguments = advanced && def.flags.contains(FunctionFlags::SUPPRESS_ARGUMENTS);
        if !arguments_bound && !suppress_arguments {
            let arguments = self.arguments_array(&args);
            self.heap.put_property(locals, ARGUMENTS, arguments);
        }

        for (i, param) in def.params.iter().enumerate() {
            let arg = match args.get(i) {
                Some(arg) => self.heap.share(arg),
                None => Value::Undefined,
            };
            if advanced && param.register != 0 {
                store_register(&mut self.heap, &mut registers, param.register as usize, arg);
            } else {
                self.heap.put_property(locals, &param.name, arg);
            }
        }
        self.heap.release_all(args);

        self.frames.push(Frame {
            registers,
            locals,
            this,
            scope_base: self.scope.len(),
            stack_base: self.stack.len(),
        });
        let result = (function.entry)(self);
        if let Some(frame) = self.frames.pop() {
            self.drop_frame(frame);
        }

        match result? {
            Flow::Return(value) => Ok(value),
            Flow::Normal | Flow::Throw => Ok(Value::Undefined),
        }
    }

    fn arguments_array(&mut self, args: &[Value]) -> Value {
        let Some(arr) = self.heap.new_array() else {
            debug!("could not allocate arguments array");
            return Value::Undefined;
        };
        for arg in args {
            let value = self.heap.share(arg);
            self.heap.push_element(arr, value);
        }
        Value::Array(arr)
    }

    /// Superclass prototype of `this` (two `__proto__` hops)
    fn super_of(&mut self, this: &Value) -> Value {
        let proto = this
            .as_object()
            .and_then(|obj| self.heap.proto_of(obj))
            .and_then(|proto| self.heap.proto_of(proto));
        match proto {
            Some(proto) => self.heap.share(&Value::Object(proto)),
            None => Value::Undefined,
        }
    }

    fn drop_frame(&mut self, frame: Frame) {
        let leftovers = self.stack.truncate(frame.stack_base);
        self.heap.release_all(leftovers);
        self.drop_scopes(frame.scope_base);
        self.heap.release_all(frame.registers.into_values());
        self.heap.release(Value::Object(frame.locals));
        self.heap.release(frame.this);
    }

    fn drop_scopes(&mut self, depth: usize) {
        for obj in self.scope.truncate(depth) {
            self.heap.release(Value::Object(obj));
        }
    }

    /// Release everything the context holds and tear down the heap
    ///
    /// Returns the number of cells that were still live afterwards, i.e.
    /// leaked through reference cycles.
    pub fn shutdown(&mut self) -> usize {
        while let Some(frame) = self.frames.pop() {
            self.drop_frame(frame);
        }
        let values = self.stack.truncate(0);
        self.heap.release_all(values);
        self.drop_scopes(0);

        let registers = std::mem::take(&mut self.registers);
        self.heap.release_all(registers.into_values());
        self.registers = RegisterBank::new(self.config.global_registers);

        let globals = self.globals.drain();
        self.heap.release_all(globals);
        if let Some(exception) = self.exception.take() {
            self.heap.release(exception);
        }
        if let Some(root) = self.root.take() {
            self.heap.release(Value::Object(root));
        }
        self.heap.shutdown()
    }
}

/// Store into a register bank, releasing whatever the slot held
fn store_register(heap: &mut Heap, bank: &mut RegisterBank, index: usize, value: Value) {
    match bank.replace(index, value) {
        Ok(old) => heap.release(old),
        Err(value) => {
            debug!("write of register {} outside bank of {}", index, bank.len());
            heap.release(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{AsFunction, AsObject, FunctionDef, Param};

    fn context() -> Context {
        Context::with_output(Config::default(), Box::new(SharedBuffer::new()))
    }

    #[test]
    fn test_variable_resolution_order() {
        let mut ctx = context();
        ctx.set_variable(b"v", 0, Value::str("global"));

        let obj = ctx.heap.new_object().unwrap();
        ctx.heap.put_property(obj, b"v", Value::str("scoped"));
        assert!(ctx.scope.push(obj));
        assert_eq!(ctx.get_variable(b"v", 0), Value::str("scoped"));

        // Assignment lands on the scope object that owns the name
        ctx.set_variable(b"v", 0, Value::str("updated"));
        assert_eq!(ctx.heap.get_property(obj, b"v"), Some(&Value::str("updated")));

        ctx.drop_scopes(0);
        assert_eq!(ctx.get_variable(b"v", 0), Value::str("global"));
        assert_eq!(ctx.get_variable(b"missing", 0), Value::Undefined);
        assert_eq!(ctx.shutdown(), 0);
    }

    #[test]
    fn test_string_id_fast_path() {
        let mut ctx = context();
        let names: Vec<Rc<[u8]>> = vec![Rc::from(&b""[..]), Rc::from(&b"score"[..])];
        ctx.install_strings(names);
        ctx.set_variable(b"score", 1, Value::F32(10.0));
        // Dynamic lookup reaches the same slot
        assert_eq!(ctx.get_variable(b"score", 0), Value::F32(10.0));
        assert!(ctx.delete_variable(b"score", 1));
        assert_eq!(ctx.get_variable(b"score", 1), Value::Undefined);
    }

    #[test]
    fn test_registers_outside_functions() {
        let mut ctx = context();
        ctx.set_register(2, Value::str("r2"));
        assert_eq!(ctx.register(2), Value::str("r2"));
        ctx.set_register(200, Value::F32(1.0));
        assert_eq!(ctx.register(200), Value::Undefined);
    }

    #[test]
    fn test_call_binds_params_and_preloads() {
        let mut ctx = context();
        let flags = FunctionFlags::from_bits(FunctionFlags::PRELOAD_THIS | FunctionFlags::PRELOAD_ARGUMENTS);
        let def = FunctionDef::advanced(b"f", 4, flags, vec![Param::new(3, b"a"), Param::new(0, b"b")]);
        let entry: EntryPoint = Rc::new(|ctx: &mut Context| {
            // r1 = this, r2 = arguments, r3 = a, local b
            let this = ctx.register(1);
            let arguments = ctx.register(2);
            let a = ctx.register(3);
            let b = ctx.get_variable(b"b", 0);
            let len = ctx.heap.array_len(arguments.as_array().unwrap());
            let ok = this.as_object().is_some() && len == 2 && a == Value::F32(1.0) && b == Value::F32(2.0);
            ctx.release(this);
            ctx.release(arguments);
            Ok(Flow::Return(Value::Bool(ok)))
        });
        let func = ctx.heap.alloc_object(AsObject::with_function(AsFunction::new(def, entry))).unwrap();
        let this = Value::Object(ctx.heap.new_object().unwrap());

        let result = ctx
            .call_function(func, this, vec![Value::F32(1.0), Value::F32(2.0)])
            .unwrap();
        assert_eq!(result, Value::Bool(true));
        assert_eq!(ctx.call_depth(), 0);

        ctx.release(Value::Object(func));
        // Activation, arguments and this are all gone
        assert_eq!(ctx.heap.stats().live(), 0);
    }

    #[test]
    fn test_call_depth_is_bounded() {
        let config = Config {
            max_call_depth: 8,
            ..Config::default()
        };
        let mut ctx = Context::with_output(config, Box::new(SharedBuffer::new()));
        let entry: EntryPoint = Rc::new(|ctx: &mut Context| {
            let me = ctx.get_variable(b"recurse", 0).as_object().unwrap();
            ctx.call_function(me, Value::Undefined, Vec::new())?;
            Ok(Flow::Normal)
        });
        let def = FunctionDef::simple(b"recurse", &[]);
        let func = ctx.heap.alloc_object(AsObject::with_function(AsFunction::new(def, entry))).unwrap();
        ctx.set_variable(b"recurse", 0, Value::Object(func));
        ctx.heap.retain(&Value::Object(func));

        let err = ctx.call_function(func, Value::Undefined, Vec::new()).unwrap_err();
        assert_eq!(err, RuntimeError::CallDepthExceeded { limit: 8 });
        assert_eq!(ctx.call_depth(), 0);
    }

    #[test]
    fn test_stack_overflow_releases_value() {
        let config = Config {
            stack_capacity: 1,
            ..Config::default()
        };
        let mut ctx = Context::with_output(config, Box::new(SharedBuffer::new()));
        ctx.push(Value::F32(1.0)).unwrap();
        let obj = Value::Object(ctx.heap.new_object().unwrap());
        assert!(ctx.push(obj.clone()).is_err());
        assert!(!ctx.heap.is_live(&obj));
    }

    #[test]
    fn test_trace_output_is_captured() {
        let out = SharedBuffer::new();
        let mut ctx = Context::with_output(Config::default(), Box::new(out.clone()));
        ctx.write_trace(b"hello").unwrap();
        ctx.write_trace(b"world").unwrap();
        assert_eq!(out.text(), "hello\nworld\n");
    }
}
