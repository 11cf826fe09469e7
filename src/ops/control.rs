//! Timeline control, branching and exceptions
//!
//! Timeline actions only update [`Timeline`](crate::runtime::Timeline)
//! state; the frame player acts on it between frames. Frame numbers that
//! come off the stack are one based, frame operands in the bytecode are
//! zero based.

use log::debug;

use crate::context::Context;
use crate::runtime::timeline::{DragState, SpriteClone};
use crate::runtime::{PropertyValue, SendMethod, UrlRequest};
use crate::value::Value;
use crate::vm::{Flow, RuntimeResult};

/// A translated region, callable with the context
pub type RegionFn<'a> = &'a dyn Fn(&mut Context) -> RuntimeResult<Flow>;

/// Where a catch block receives the thrown value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CatchTarget<'a> {
    None,
    Register(u8),
    Variable(&'a [u8]),
}

/// The parts of a try statement
pub struct TryRegions<'a> {
    pub catch: CatchTarget<'a>,
    pub body: RegionFn<'a>,
    pub catch_body: Option<RegionFn<'a>>,
    pub finally_body: Option<RegionFn<'a>>,
}

pub fn next_frame(ctx: &mut Context) -> RuntimeResult<()> {
    ctx.timeline.next_frame();
    Ok(())
}

pub fn prev_frame(ctx: &mut Context) -> RuntimeResult<()> {
    ctx.timeline.prev_frame();
    Ok(())
}

pub fn play(ctx: &mut Context) -> RuntimeResult<()> {
    ctx.timeline.play();
    Ok(())
}

pub fn stop(ctx: &mut Context) -> RuntimeResult<()> {
    ctx.timeline.stop();
    Ok(())
}

pub fn toggle_quality(ctx: &mut Context) -> RuntimeResult<()> {
    ctx.timeline.toggle_quality();
    Ok(())
}

pub fn stop_sounds(ctx: &mut Context) -> RuntimeResult<()> {
    ctx.timeline.stop_sounds();
    Ok(())
}

/// Jump to a zero-based frame
pub fn goto_frame(ctx: &mut Context, frame: u16) -> RuntimeResult<()> {
    ctx.timeline.goto_frame(frame as usize);
    Ok(())
}

pub fn goto_label(ctx: &mut Context, label: &[u8]) -> RuntimeResult<()> {
    ctx.timeline.goto_label(label);
    Ok(())
}

/// Resolve a frame value from the stack to a zero-based frame index
///
/// Numbers (and numeric strings) are one based; other strings are labels.
fn frame_of(ctx: &Context, value: &Value) -> Option<usize> {
    let n = value.to_number();
    if n.is_finite() {
        return Some((n.trunc().max(1.0) - 1.0) as usize);
    }
    let label = value.string_bytes()?;
    ctx.timeline.label_frame(&label)
}

/// Pop a frame (number or label) and jump to it
pub fn goto_frame2(ctx: &mut Context, play: bool, scene_bias: u16) -> RuntimeResult<()> {
    let value = ctx.pop();
    match frame_of(ctx, &value) {
        Some(frame) => ctx.timeline.goto_frame(frame + scene_bias as usize),
        None => debug!("GotoFrame2 to unknown frame {:?}", value),
    }
    ctx.release(value);
    if play {
        ctx.timeline.play();
    } else {
        ctx.timeline.stop();
    }
    Ok(())
}

/// Whether a zero-based frame has loaded
pub fn frame_loaded(ctx: &mut Context, frame: usize) -> bool {
    ctx.timeline.frame_loaded(frame)
}

/// Pop a frame and report whether it has loaded
pub fn wait_for_frame2(ctx: &mut Context) -> bool {
    let value = ctx.pop();
    let loaded = frame_of(ctx, &value).is_some_and(|f| ctx.timeline.frame_loaded(f));
    ctx.release(value);
    loaded
}

/// Pop a branch condition
pub fn pop_condition(ctx: &mut Context) -> bool {
    let value = ctx.pop();
    let result = value.to_boolean();
    ctx.release(value);
    result
}

pub fn set_target(ctx: &mut Context, target: &[u8]) -> RuntimeResult<()> {
    ctx.timeline.set_target(target);
    Ok(())
}

/// Pop a target path and make it current
pub fn set_target2(ctx: &mut Context) -> RuntimeResult<()> {
    let target = ctx.pop_string();
    ctx.timeline.set_target(&target);
    Ok(())
}

pub fn get_url(ctx: &mut Context, url: &[u8], target: &[u8]) -> RuntimeResult<()> {
    ctx.timeline.get_url(UrlRequest {
        url: url.to_vec(),
        target: target.to_vec(),
        method: SendMethod::None,
        load_target: false,
        load_variables: false,
    });
    Ok(())
}

/// Pop a target, then a URL
pub fn get_url2(ctx: &mut Context, flags: u8) -> RuntimeResult<()> {
    let target = ctx.pop_string();
    let url = ctx.pop_string();
    ctx.timeline.get_url(UrlRequest {
        url: url.to_vec(),
        target: target.to_vec(),
        method: SendMethod::from_flags(flags),
        load_target: flags & 0x02 != 0,
        load_variables: flags & 0x01 != 0,
    });
    Ok(())
}

/// Pop a property index, then a target; push the property
pub fn get_property(ctx: &mut Context) -> RuntimeResult<()> {
    let (index, _) = ctx.pop_number();
    let target = ctx.pop_string();
    let index = if index.is_finite() && index >= 0.0 { index as u32 } else { u32::MAX };
    let value = match ctx.timeline.get_property(&target, index) {
        PropertyValue::Number(x) => Value::F32(x),
        PropertyValue::Text(text) => Value::bytes(text),
    };
    ctx.push(value)
}

/// Pop a value, a property index, then a target
pub fn set_property(ctx: &mut Context) -> RuntimeResult<()> {
    let (value, _) = ctx.pop_number();
    let (index, _) = ctx.pop_number();
    let target = ctx.pop_string();
    if index.is_finite() && index >= 0.0 {
        ctx.timeline.set_property(&target, index as u32, value as f32);
    }
    Ok(())
}

/// Pop a depth, a new name, then the source sprite
pub fn clone_sprite(ctx: &mut Context) -> RuntimeResult<()> {
    let (depth, _) = ctx.pop_number();
    let name = ctx.pop_string();
    let source = ctx.pop_string();
    ctx.timeline.clone_sprite(SpriteClone {
        source: source.to_vec(),
        name: name.to_vec(),
        depth: crate::ops::convert::to_int32(depth),
    });
    Ok(())
}

pub fn remove_sprite(ctx: &mut Context) -> RuntimeResult<()> {
    let name = ctx.pop_string();
    if !ctx.timeline.remove_sprite(&name) {
        debug!("RemoveSprite: no clone named {:?}", String::from_utf8_lossy(&name));
    }
    Ok(())
}

/// Pop a target, the lock-center flag and the constrain flag; a
/// constrained drag also pops bottom, right, top and left
pub fn start_drag(ctx: &mut Context) -> RuntimeResult<()> {
    let target = ctx.pop_string();
    let lock_center = pop_condition(ctx);
    let constrained = pop_condition(ctx);
    let constraint = if constrained {
        let (bottom, _) = ctx.pop_number();
        let (right, _) = ctx.pop_number();
        let (top, _) = ctx.pop_number();
        let (left, _) = ctx.pop_number();
        Some([left as f32, top as f32, right as f32, bottom as f32])
    } else {
        None
    };
    ctx.timeline.start_drag(DragState {
        target: target.to_vec(),
        lock_center,
        constraint,
    });
    Ok(())
}

pub fn end_drag(ctx: &mut Context) -> RuntimeResult<()> {
    ctx.timeline.end_drag();
    Ok(())
}

/// Pop a value and make it the pending exception
pub fn throw(ctx: &mut Context) -> RuntimeResult<()> {
    let value = ctx.pop();
    if ctx.try_depth() == 0 {
        debug!("throw outside of any try block");
    }
    ctx.raise(value);
    Ok(())
}

/// Pop a frame and run its script
pub fn call(ctx: &mut Context) -> RuntimeResult<()> {
    let value = ctx.pop();
    let frame = frame_of(ctx, &value);
    ctx.release(value);
    let Some(frame) = frame else {
        debug!("Call to unknown frame");
        return Ok(());
    };
    if let Flow::Return(returned) = ctx.call_frame_script(frame)? {
        ctx.release(returned);
    }
    Ok(())
}

/// Run a try statement
///
/// A pending exception after the body goes to the catch block, bound to
/// its register or variable. The finally block runs on every exit path
/// with any still-pending exception set aside; if it finishes normally the
/// exception is restored, otherwise its own outcome wins.
pub fn run_try(ctx: &mut Context, regions: TryRegions<'_>) -> RuntimeResult<Flow> {
    ctx.enter_try();
    let result = (regions.body)(ctx);
    ctx.leave_try();
    let mut flow = result?;

    if let Some(catch_body) = regions.catch_body {
        if let Some(exception) = ctx.take_exception() {
            match regions.catch {
                CatchTarget::Register(r) => ctx.set_register(r, exception),
                CatchTarget::Variable(name) => ctx.set_variable(name, 0, exception),
                CatchTarget::None => ctx.release(exception),
            }
            flow = catch_body(ctx)?;
        }
    }

    if let Some(finally_body) = regions.finally_body {
        let pending = ctx.take_exception();
        match finally_body(ctx)? {
            Flow::Normal => {
                if let Some(exception) = pending {
                    ctx.raise(exception);
                }
            }
            other => {
                if let Some(exception) = pending {
                    ctx.release(exception);
                }
                if let Flow::Return(old) = std::mem::replace(&mut flow, other) {
                    ctx.release(old);
                }
            }
        }
    }

    if ctx.has_exception() {
        return Ok(Flow::Throw);
    }
    if flow == Flow::Throw {
        flow = Flow::Normal;
    }
    Ok(flow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::testing::{context, push_all};

    fn thrower(ctx: &mut Context) -> RuntimeResult<Flow> {
        ctx.push(Value::str("boom"))?;
        throw(ctx)?;
        Ok(Flow::Throw)
    }

    fn tracer(text: &'static str) -> impl Fn(&mut Context) -> RuntimeResult<Flow> {
        move |ctx: &mut Context| {
            ctx.write_trace(text.as_bytes())?;
            Ok(Flow::Normal)
        }
    }

    #[test]
    fn test_catch_binds_register_and_finally_runs() {
        let (mut ctx, out) = context();
        let catch = |ctx: &mut Context| -> RuntimeResult<Flow> {
            let caught = ctx.register(1);
            let text = crate::ops::convert::to_string_bytes(&ctx.heap, &caught);
            ctx.write_trace(&text)?;
            Ok(Flow::Normal)
        };
        let finally = tracer("fin");
        let flow = run_try(
            &mut ctx,
            TryRegions {
                catch: CatchTarget::Register(1),
                body: &thrower,
                catch_body: Some(&catch),
                finally_body: Some(&finally),
            },
        )
        .unwrap();
        assert_eq!(flow, Flow::Normal);
        assert!(!ctx.has_exception());
        assert_eq!(out.text(), "boom\nfin\n");
        assert_eq!(ctx.try_depth(), 0);
    }

    #[test]
    fn test_uncaught_exception_survives_finally() {
        let (mut ctx, out) = context();
        let finally = tracer("cleanup");
        let flow = run_try(
            &mut ctx,
            TryRegions {
                catch: CatchTarget::None,
                body: &thrower,
                catch_body: None,
                finally_body: Some(&finally),
            },
        )
        .unwrap();
        assert_eq!(flow, Flow::Throw);
        assert_eq!(ctx.take_exception(), Some(Value::str("boom")));
        assert_eq!(out.text(), "cleanup\n");
    }

    #[test]
    fn test_catch_into_variable() {
        let (mut ctx, _) = context();
        let nothing = |_: &mut Context| -> RuntimeResult<Flow> { Ok(Flow::Normal) };
        run_try(
            &mut ctx,
            TryRegions {
                catch: CatchTarget::Variable(b"e"),
                body: &thrower,
                catch_body: Some(&nothing),
                finally_body: None,
            },
        )
        .unwrap();
        assert_eq!(ctx.get_variable(b"e", 0), Value::str("boom"));
    }

    #[test]
    fn test_frame_actions() {
        let (mut ctx, _) = context();
        ctx.timeline.set_total_frames(5);
        ctx.timeline.add_label(b"end", 4);

        push_all(&mut ctx, &[Value::F32(3.0)]);
        goto_frame2(&mut ctx, false, 0).unwrap();
        assert_eq!(ctx.timeline.pending_jump(), Some(2));
        assert!(!ctx.timeline.is_playing());

        push_all(&mut ctx, &[Value::str("end")]);
        goto_frame2(&mut ctx, true, 0).unwrap();
        assert_eq!(ctx.timeline.pending_jump(), Some(4));

        push_all(&mut ctx, &[Value::F32(9.0)]);
        assert!(!wait_for_frame2(&mut ctx));
        assert!(frame_loaded(&mut ctx, 4));
    }

    #[test]
    fn test_properties_and_drag() {
        let (mut ctx, _) = context();
        push_all(&mut ctx, &[Value::str("_root"), Value::F32(0.0), Value::F32(12.0)]);
        set_property(&mut ctx).unwrap();
        push_all(&mut ctx, &[Value::str(""), Value::F32(0.0)]);
        get_property(&mut ctx).unwrap();
        assert_eq!(ctx.pop(), Value::F32(12.0));

        push_all(
            &mut ctx,
            &[
                Value::F32(1.0),
                Value::F32(2.0),
                Value::F32(3.0),
                Value::F32(4.0),
                Value::Bool(true),
                Value::Bool(false),
                Value::str("clip"),
            ],
        );
        start_drag(&mut ctx).unwrap();
        let drag = ctx.timeline.drag().unwrap();
        assert_eq!(drag.constraint, Some([1.0, 2.0, 3.0, 4.0]));
        assert!(!drag.lock_center);
        assert!(ctx.stack().is_empty());
    }

    #[test]
    fn test_get_url2_flags() {
        let (mut ctx, _) = context();
        push_all(&mut ctx, &[Value::str("http://x"), Value::str("_blank")]);
        get_url2(&mut ctx, 0x81).unwrap();
        let request = &ctx.timeline.url_requests()[0];
        assert_eq!(request.url, b"http://x");
        assert_eq!(request.method, SendMethod::Post);
        assert!(request.load_variables);
        assert!(!request.load_target);

        get_url(&mut ctx, b"FSCommand:quit", b"").unwrap();
        assert!(ctx.timeline.quit_requested());
    }
}
