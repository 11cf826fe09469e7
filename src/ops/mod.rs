//! Action semantics
//!
//! One public function per action, shared by the interpreter and by
//! translated code. Binary operations pop their right operand first: the
//! translator pushes operands left to right, so the first value popped is
//! the last one pushed.
//!
//! Script-level failures never surface as errors. A missing variable, a
//! bad index or a failed allocation degrades to a sentinel value and
//! execution continues; only engine failures ([`RuntimeError`]) propagate.
//!
//! [`RuntimeError`]: crate::vm::RuntimeError

pub mod arith;
pub mod bitwise;
pub mod compare;
pub mod control;
pub mod convert;
pub mod function;
pub mod misc;
pub mod object;
pub mod push;
pub mod scope;
pub mod string;
pub mod variable;

use log::debug;

use crate::context::Context;
use crate::vm::{ActionCode, Flow, RuntimeResult};

/// Execute an action that has no operands
pub fn dispatch(ctx: &mut Context, code: ActionCode) -> RuntimeResult<Flow> {
    match code {
        ActionCode::NextFrame => control::next_frame(ctx)?,
        ActionCode::PrevFrame => control::prev_frame(ctx)?,
        ActionCode::Play => control::play(ctx)?,
        ActionCode::Stop => control::stop(ctx)?,
        ActionCode::ToggleQuality => control::toggle_quality(ctx)?,
        ActionCode::StopSounds => control::stop_sounds(ctx)?,

        ActionCode::Add => arith::add(ctx)?,
        ActionCode::Subtract => arith::subtract(ctx)?,
        ActionCode::Multiply => arith::multiply(ctx)?,
        ActionCode::Divide => arith::divide(ctx)?,
        ActionCode::Equals => compare::equals(ctx)?,
        ActionCode::Less => compare::less(ctx)?,
        ActionCode::And => compare::and(ctx)?,
        ActionCode::Or => compare::or(ctx)?,
        ActionCode::Not => compare::not(ctx)?,

        ActionCode::StringEquals => string::string_equals(ctx)?,
        ActionCode::StringLength => string::string_length(ctx)?,
        ActionCode::StringExtract => string::string_extract(ctx)?,
        ActionCode::Pop => misc::pop(ctx)?,
        ActionCode::ToInteger => convert::to_integer(ctx)?,
        ActionCode::GetVariable => variable::get_variable(ctx)?,
        ActionCode::SetVariable => variable::set_variable(ctx)?,
        ActionCode::SetTarget2 => control::set_target2(ctx)?,
        ActionCode::StringAdd => string::string_add(ctx)?,
        ActionCode::GetProperty => control::get_property(ctx)?,
        ActionCode::SetProperty => control::set_property(ctx)?,
        ActionCode::CloneSprite => control::clone_sprite(ctx)?,
        ActionCode::RemoveSprite => control::remove_sprite(ctx)?,
        ActionCode::Trace => misc::trace(ctx)?,
        ActionCode::StartDrag => control::start_drag(ctx)?,
        ActionCode::EndDrag => control::end_drag(ctx)?,
        ActionCode::StringLess => string::string_less(ctx)?,
        ActionCode::Throw => control::throw(ctx)?,
        ActionCode::CastOp => object::cast_op(ctx)?,
        ActionCode::ImplementsOp => object::implements_op(ctx)?,
        ActionCode::RandomNumber => misc::random_number(ctx)?,
        ActionCode::MbStringLength => string::mb_string_length(ctx)?,
        ActionCode::CharToAscii => string::char_to_ascii(ctx)?,
        ActionCode::AsciiToChar => string::ascii_to_char(ctx)?,
        ActionCode::GetTime => misc::get_time(ctx)?,
        ActionCode::MbStringExtract => string::mb_string_extract(ctx)?,
        ActionCode::MbCharToAscii => string::mb_char_to_ascii(ctx)?,
        ActionCode::MbAsciiToChar => string::mb_ascii_to_char(ctx)?,

        ActionCode::Delete => variable::delete(ctx)?,
        ActionCode::Delete2 => variable::delete2(ctx)?,
        ActionCode::DefineLocal => variable::define_local(ctx)?,
        ActionCode::CallFunction => function::call_function(ctx)?,
        ActionCode::Return => return function::action_return(ctx),
        ActionCode::Modulo => arith::modulo(ctx)?,
        ActionCode::NewObject => object::new_object(ctx)?,
        ActionCode::DefineLocal2 => variable::define_local2(ctx)?,
        ActionCode::InitArray => object::init_array(ctx)?,
        ActionCode::InitObject => object::init_object(ctx)?,
        ActionCode::TypeOf => misc::type_of(ctx)?,
        ActionCode::TargetPath => misc::target_path(ctx)?,
        ActionCode::Enumerate => object::enumerate(ctx)?,
        ActionCode::Add2 => arith::add2(ctx)?,
        ActionCode::Less2 => compare::less2(ctx)?,
        ActionCode::Equals2 => compare::equals2(ctx)?,
        ActionCode::ToNumber => convert::to_number(ctx)?,
        ActionCode::ToString => convert::to_string(ctx)?,
        ActionCode::PushDuplicate => misc::push_duplicate(ctx)?,
        ActionCode::StackSwap => misc::stack_swap(ctx)?,
        ActionCode::GetMember => object::get_member(ctx)?,
        ActionCode::SetMember => object::set_member(ctx)?,
        ActionCode::Increment => arith::increment(ctx)?,
        ActionCode::Decrement => arith::decrement(ctx)?,
        ActionCode::CallMethod => function::call_method(ctx)?,
        ActionCode::NewMethod => object::new_method(ctx)?,
        ActionCode::InstanceOf => object::instance_of(ctx)?,
        ActionCode::Enumerate2 => object::enumerate2(ctx)?,

        ActionCode::BitAnd => bitwise::bit_and(ctx)?,
        ActionCode::BitOr => bitwise::bit_or(ctx)?,
        ActionCode::BitXor => bitwise::bit_xor(ctx)?,
        ActionCode::BitLShift => bitwise::bit_lshift(ctx)?,
        ActionCode::BitRShift => bitwise::bit_rshift(ctx)?,
        ActionCode::BitURShift => bitwise::bit_urshift(ctx)?,
        ActionCode::StrictEquals => compare::strict_equals(ctx)?,
        ActionCode::Greater => compare::greater(ctx)?,
        ActionCode::StringGreater => string::string_greater(ctx)?,
        ActionCode::Extends => object::extends(ctx)?,
        ActionCode::Call => control::call(ctx)?,

        ActionCode::GotoFrame
        | ActionCode::GetUrl
        | ActionCode::StoreRegister
        | ActionCode::ConstantPool
        | ActionCode::WaitForFrame
        | ActionCode::SetTarget
        | ActionCode::GoToLabel
        | ActionCode::WaitForFrame2
        | ActionCode::DefineFunction2
        | ActionCode::Try
        | ActionCode::With
        | ActionCode::Push
        | ActionCode::Jump
        | ActionCode::GetUrl2
        | ActionCode::DefineFunction
        | ActionCode::If
        | ActionCode::GotoFrame2 => {
            debug!("{} needs operands; ignored", code.name());
        }
    }
    Ok(Flow::Normal)
}
