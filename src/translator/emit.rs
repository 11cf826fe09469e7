//! Rust source emission
//!
//! Output comes in two streams. Declarations hold the string table and
//! `MAX_STRING_ID`. Definitions hold one function per region, written as
//! a `loop { match label { .. } }` state machine whose arms start at the
//! region's jump targets, plus the `SCRIPTS` table and an `install` helper.

use super::program::{Action, CatchBinding, FunctionBody, Program, PushItem, Region};
use crate::runtime::FunctionKind;
use crate::util::escape_bytes;

/// Generated source, split into its two streams
#[derive(Debug, Default, Clone)]
pub struct EmittedSource {
    pub declarations: String,
    pub definitions: String,
}

impl EmittedSource {
    /// Both streams as one module
    pub fn into_source(self) -> String {
        let mut out = String::from(HEADER);
        out.push_str(&self.declarations);
        out.push('\n');
        out.push_str(&self.definitions);
        out
    }
}

const HEADER: &str = "\
// Generated by swfrc. Do not edit.
#![allow(unused_imports, unused_mut, unused_assignments, unreachable_code, clippy::all)]

use std::rc::Rc;

use swfrecomp::context::Context;
use swfrecomp::ops;
use swfrecomp::ops::control::{CatchTarget, RegionFn, TryRegions};
use swfrecomp::runtime::{EntryPoint, FunctionDef, FunctionFlags, Param};
use swfrecomp::vm::{Flow, RuntimeResult};

";

/// Indented line writer
#[derive(Default)]
struct Writer {
    out: String,
    depth: usize,
}

impl Writer {
    fn line(&mut self, text: impl AsRef<str>) {
        for _ in 0..self.depth {
            self.out.push_str("    ");
        }
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.depth += 1;
    }

    fn close(&mut self, text: impl AsRef<str>) {
        self.depth = self.depth.saturating_sub(1);
        self.line(text);
    }
}

fn byte_literal(bytes: &[u8]) -> String {
    format!("b\"{}\"", escape_bytes(bytes))
}

fn f32_literal(x: f32) -> String {
    if x.is_finite() {
        format!("{:?}_f32", x)
    } else {
        format!("f32::from_bits(0x{:08x})", x.to_bits())
    }
}

fn f64_literal(x: f64) -> String {
    if x.is_finite() {
        format!("{:?}_f64", x)
    } else {
        format!("f64::from_bits(0x{:016x})", x.to_bits())
    }
}

/// Emit a whole program
pub fn emit_program(program: &Program) -> EmittedSource {
    EmittedSource {
        declarations: emit_declarations(program),
        definitions: emit_definitions(program),
    }
}

fn emit_declarations(program: &Program) -> String {
    let mut w = Writer::default();
    w.line(format!("pub const MAX_STRING_ID: u32 = {};", program.max_string_id()));
    w.line("");
    for id in 1..=program.max_string_id() {
        if let Some(bytes) = program.string(id) {
            w.line(format!("pub const STR_{}: &[u8] = {};", id, byte_literal(bytes)));
        }
    }
    w.line("");
    w.line("/// String table; the index is the string ID");
    w.open("pub static STRINGS: &[&[u8]] = &[");
    w.line("b\"\",");
    for id in 1..=program.max_string_id() {
        w.line(format!("STR_{},", id));
    }
    w.close("];");
    w.out
}

fn emit_definitions(program: &Program) -> String {
    let mut w = Writer::default();
    for script in &program.scripts {
        emit_region(&mut w, script);
        let mut nested = Vec::new();
        script.for_each_nested(&mut |region| nested.push(region));
        for region in nested {
            emit_region(&mut w, region);
        }
    }

    w.line("/// Frame scripts in translation order");
    w.open("pub static SCRIPTS: &[fn(&mut Context) -> RuntimeResult<Flow>] = &[");
    for script in &program.scripts {
        w.line(format!("{},", script.symbol));
    }
    w.close("];");
    w.line("");
    w.line("/// Load the string table and scripts into a context");
    w.open("pub fn install(ctx: &mut Context) {");
    w.line("ctx.install_strings(STRINGS.iter().map(|s| Rc::from(*s)).collect());");
    w.line("ctx.install_scripts(SCRIPTS.iter().map(|&f| Rc::new(f) as EntryPoint).collect());");
    w.close("}");
    w.out
}

/// Region `symbol`'s function as a label state machine
fn emit_region(w: &mut Writer, region: &Region) {
    w.open(format!("fn {}(ctx: &mut Context) -> RuntimeResult<Flow> {{", region.symbol));
    w.line("let mut label: usize = 0;");
    w.open("loop {");
    w.open("match label {");

    let mut open = false;
    for (i, instruction) in region.instructions.iter().enumerate() {
        let starts_block = i == 0 || region.labels.contains(&instruction.offset);
        if starts_block {
            if open {
                w.line(format!("label = {};", instruction.offset));
                w.close("}");
            }
            let key = if i == 0 { 0 } else { instruction.offset };
            w.open(format!("{} => {{", key));
            w.line("ctx.tick()?;");
            open = true;
        }
        emit_action(w, region, &instruction.action);
    }
    if open {
        w.close("}");
    }
    w.line("_ => return Ok(Flow::Normal),");
    w.close("}");
    w.close("}");
    w.close("}");
    w.line("");
}

fn emit_exception_check(w: &mut Writer) {
    w.line("if ctx.has_exception() {");
    w.line("    return Ok(Flow::Throw);");
    w.line("}");
}

fn emit_flow_match(w: &mut Writer, call: String) {
    w.open(format!("match {}? {{", call));
    w.line("Flow::Normal => {}");
    w.line("flow => return Ok(flow),");
    w.close("}");
}

/// Arm key a branch jumps to: offset 0 always names the first block
fn jump_key(region: &Region, target: usize) -> usize {
    match region.instructions.first() {
        Some(first) if first.offset == target => 0,
        _ => target,
    }
}

fn emit_branch(w: &mut Writer, condition: String, region: &Region, target: usize) {
    w.open(format!("if {} {{", condition));
    w.line(format!("label = {};", jump_key(region, target)));
    w.line("continue;");
    w.close("}");
}

fn emit_action(w: &mut Writer, region: &Region, action: &Action) {
    match action {
        Action::End => w.line("return Ok(Flow::Normal);"),
        Action::Simple(code) => match code.runtime_fn() {
            Some(path) => {
                w.line(format!("ops::{}(ctx)?;", path));
                if code.may_throw() {
                    emit_exception_check(w);
                }
            }
            None => w.line("return ops::function::action_return(ctx);"),
        },
        Action::Push(items) => {
            for item in items {
                let call = match item {
                    PushItem::Str(id) => format!("ops::push::string(ctx, {})?;", id),
                    PushItem::F32(x) => format!("ops::push::float(ctx, {})?;", f32_literal(*x)),
                    PushItem::Null => "ops::push::null(ctx)?;".to_string(),
                    PushItem::Undefined => "ops::push::undefined(ctx)?;".to_string(),
                    PushItem::Register(r) => format!("ops::push::register(ctx, {})?;", r),
                    PushItem::Bool(b) => format!("ops::push::boolean(ctx, {})?;", b),
                    PushItem::F64(x) => format!("ops::push::double(ctx, {})?;", f64_literal(*x)),
                    PushItem::I32(n) => format!("ops::push::integer(ctx, {})?;", n),
                };
                w.line(call);
            }
        }
        Action::Jump { target, .. } => {
            w.line(format!("label = {};", jump_key(region, *target)));
            w.line("continue;");
        }
        Action::If { target, .. } => {
            emit_branch(w, "ops::control::pop_condition(ctx)".to_string(), region, *target)
        }
        Action::WaitForFrame { frame, target, .. } => emit_branch(
            w,
            format!("!ops::control::frame_loaded(ctx, {})", frame),
            region,
            *target,
        ),
        Action::WaitForFrame2 { target, .. } => {
            emit_branch(w, "!ops::control::wait_for_frame2(ctx)".to_string(), region, *target)
        }
        Action::GotoFrame(frame) => w.line(format!("ops::control::goto_frame(ctx, {})?;", frame)),
        Action::GetUrl { url, target } => w.line(format!(
            "ops::control::get_url(ctx, {}, {})?;",
            byte_literal(url),
            byte_literal(target)
        )),
        Action::GetUrl2(flags) => w.line(format!("ops::control::get_url2(ctx, 0x{:02x})?;", flags)),
        Action::GotoFrame2 { play, scene_bias } => w.line(format!(
            "ops::control::goto_frame2(ctx, {}, {})?;",
            play, scene_bias
        )),
        Action::StoreRegister(r) => w.line(format!("ops::variable::store_register(ctx, {})?;", r)),
        Action::ConstantPool(ids) => w.line(format!("// constant pool of {} strings", ids.len())),
        Action::SetTarget(target) => {
            w.line(format!("ops::control::set_target(ctx, {})?;", byte_literal(target)))
        }
        Action::GoToLabel(label) => {
            w.line(format!("ops::control::goto_label(ctx, {})?;", byte_literal(label)))
        }
        Action::DefineFunction(body) => emit_define_function(w, body),
        Action::With(body) => emit_flow_match(w, format!("ops::scope::run_with(ctx, &{})", body.symbol)),
        Action::Try(block) => {
            let catch = match &block.catch {
                Some(CatchBinding::Register(r)) => format!("CatchTarget::Register({})", r),
                Some(CatchBinding::Variable(name)) => format!("CatchTarget::Variable({})", byte_literal(name)),
                None => "CatchTarget::None".to_string(),
            };
            let optional = |region: &Option<Region>| match region {
                Some(region) => format!("Some(&{} as RegionFn<'_>)", region.symbol),
                None => "None".to_string(),
            };
            w.open("match ops::control::run_try(");
            w.line("ctx,");
            w.open("TryRegions {");
            w.line(format!("catch: {},", catch));
            w.line(format!("body: &{},", block.body.symbol));
            w.line(format!("catch_body: {},", optional(&block.catch_body)));
            w.line(format!("finally_body: {},", optional(&block.finally_body)));
            w.close("},");
            w.close(")? {");
            w.depth += 1;
            w.line("Flow::Normal => {}");
            w.line("flow => return Ok(flow),");
            w.close("}");
        }
    }
}

fn emit_define_function(w: &mut Writer, body: &FunctionBody) {
    let def = &body.def;
    let def_expr = match def.kind {
        FunctionKind::Simple => {
            let params: Vec<String> = def
                .params
                .iter()
                .map(|p| format!("&{}[..]", byte_literal(&p.name)))
                .collect();
            format!("FunctionDef::simple({}, &[{}])", byte_literal(&def.name), params.join(", "))
        }
        FunctionKind::Advanced => {
            let params: Vec<String> = def
                .params
                .iter()
                .map(|p| format!("Param::new({}, {})", p.register, byte_literal(&p.name)))
                .collect();
            format!(
                "FunctionDef::advanced({}, {}, FunctionFlags::from_bits(0x{:04x}), vec![{}])",
                byte_literal(&def.name),
                def.register_count,
                def.flags.bits(),
                params.join(", ")
            )
        }
    };
    w.line(format!(
        "ops::function::define_function(ctx, {}, Rc::new({}))?;",
        def_expr, body.symbol
    ));
}
