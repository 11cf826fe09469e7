//! Action code definitions
//!
//! Every action is one byte. Codes with the high bit set are followed by a
//! little-endian u16 length and that many operand bytes; a region ends at
//! code 0x00.
//!
//! Actions without operands map to exactly one runtime function in
//! [`crate::ops`]. Actions with operands, and the structural forms that
//! contain nested regions, are decoded by the translator and handled
//! individually by the interpreter and the emitter.

/// Region terminator
pub const ACTION_END: u8 = 0x00;

/// First code that carries a length-prefixed operand block
pub const ACTION_HAS_LENGTH: u8 = 0x80;

macro_rules! action_codes {
    ($( $(#[$doc:meta])* $name:ident = $code:literal => $runtime:expr, )*) => {
        /// Action codes
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum ActionCode {
            $( $(#[$doc])* $name = $code, )*
        }

        impl ActionCode {
            /// Every known action
            pub const ALL: &'static [ActionCode] = &[$(ActionCode::$name),*];

            /// Decode an action byte
            pub fn from_u8(byte: u8) -> Option<Self> {
                match byte {
                    $( $code => Some(ActionCode::$name), )*
                    _ => None,
                }
            }

            /// Action name
            pub fn name(self) -> &'static str {
                match self {
                    $( ActionCode::$name => stringify!($name), )*
                }
            }

            /// Path of the runtime function below `ops::` for actions
            /// without operands
            pub fn runtime_fn(self) -> Option<&'static str> {
                match self {
                    $( ActionCode::$name => $runtime, )*
                }
            }
        }
    };
}

action_codes! {
    // Timeline control
    NextFrame = 0x04 => Some("control::next_frame"),
    PrevFrame = 0x05 => Some("control::prev_frame"),
    Play = 0x06 => Some("control::play"),
    Stop = 0x07 => Some("control::stop"),
    ToggleQuality = 0x08 => Some("control::toggle_quality"),
    StopSounds = 0x09 => Some("control::stop_sounds"),

    // Arithmetic and legacy comparisons
    Add = 0x0A => Some("arith::add"),
    Subtract = 0x0B => Some("arith::subtract"),
    Multiply = 0x0C => Some("arith::multiply"),
    Divide = 0x0D => Some("arith::divide"),
    Equals = 0x0E => Some("compare::equals"),
    Less = 0x0F => Some("compare::less"),
    And = 0x10 => Some("compare::and"),
    Or = 0x11 => Some("compare::or"),
    Not = 0x12 => Some("compare::not"),

    // Strings
    StringEquals = 0x13 => Some("string::string_equals"),
    StringLength = 0x14 => Some("string::string_length"),
    StringExtract = 0x15 => Some("string::string_extract"),

    Pop = 0x17 => Some("misc::pop"),
    ToInteger = 0x18 => Some("convert::to_integer"),
    GetVariable = 0x1C => Some("variable::get_variable"),
    SetVariable = 0x1D => Some("variable::set_variable"),
    SetTarget2 = 0x20 => Some("control::set_target2"),
    StringAdd = 0x21 => Some("string::string_add"),
    GetProperty = 0x22 => Some("control::get_property"),
    SetProperty = 0x23 => Some("control::set_property"),
    CloneSprite = 0x24 => Some("control::clone_sprite"),
    RemoveSprite = 0x25 => Some("control::remove_sprite"),
    Trace = 0x26 => Some("misc::trace"),
    StartDrag = 0x27 => Some("control::start_drag"),
    EndDrag = 0x28 => Some("control::end_drag"),
    StringLess = 0x29 => Some("string::string_less"),
    Throw = 0x2A => Some("control::throw"),
    CastOp = 0x2B => Some("object::cast_op"),
    ImplementsOp = 0x2C => Some("object::implements_op"),
    RandomNumber = 0x30 => Some("misc::random_number"),
    MbStringLength = 0x31 => Some("string::mb_string_length"),
    CharToAscii = 0x32 => Some("string::char_to_ascii"),
    AsciiToChar = 0x33 => Some("string::ascii_to_char"),
    GetTime = 0x34 => Some("misc::get_time"),
    MbStringExtract = 0x35 => Some("string::mb_string_extract"),
    MbCharToAscii = 0x36 => Some("string::mb_char_to_ascii"),
    MbAsciiToChar = 0x37 => Some("string::mb_ascii_to_char"),

    // Objects, variables and calls
    Delete = 0x3A => Some("variable::delete"),
    Delete2 = 0x3B => Some("variable::delete2"),
    DefineLocal = 0x3C => Some("variable::define_local"),
    CallFunction = 0x3D => Some("function::call_function"),
    /// Ends the region; emitted as a `return`
    Return = 0x3E => None,
    Modulo = 0x3F => Some("arith::modulo"),
    NewObject = 0x40 => Some("object::new_object"),
    DefineLocal2 = 0x41 => Some("variable::define_local2"),
    InitArray = 0x42 => Some("object::init_array"),
    InitObject = 0x43 => Some("object::init_object"),
    TypeOf = 0x44 => Some("misc::type_of"),
    TargetPath = 0x45 => Some("misc::target_path"),
    Enumerate = 0x46 => Some("object::enumerate"),
    Add2 = 0x47 => Some("arith::add2"),
    Less2 = 0x48 => Some("compare::less2"),
    Equals2 = 0x49 => Some("compare::equals2"),
    ToNumber = 0x4A => Some("convert::to_number"),
    ToString = 0x4B => Some("convert::to_string"),
    PushDuplicate = 0x4C => Some("misc::push_duplicate"),
    StackSwap = 0x4D => Some("misc::stack_swap"),
    GetMember = 0x4E => Some("object::get_member"),
    SetMember = 0x4F => Some("object::set_member"),
    Increment = 0x50 => Some("arith::increment"),
    Decrement = 0x51 => Some("arith::decrement"),
    CallMethod = 0x52 => Some("function::call_method"),
    NewMethod = 0x53 => Some("object::new_method"),
    InstanceOf = 0x54 => Some("object::instance_of"),
    Enumerate2 = 0x55 => Some("object::enumerate2"),

    // Bitwise and newer comparisons
    BitAnd = 0x60 => Some("bitwise::bit_and"),
    BitOr = 0x61 => Some("bitwise::bit_or"),
    BitXor = 0x62 => Some("bitwise::bit_xor"),
    BitLShift = 0x63 => Some("bitwise::bit_lshift"),
    BitRShift = 0x64 => Some("bitwise::bit_rshift"),
    BitURShift = 0x65 => Some("bitwise::bit_urshift"),
    StrictEquals = 0x66 => Some("compare::strict_equals"),
    Greater = 0x67 => Some("compare::greater"),
    StringGreater = 0x68 => Some("string::string_greater"),
    Extends = 0x69 => Some("object::extends"),

    // Actions with operands
    GotoFrame = 0x81 => None,
    GetUrl = 0x83 => None,
    StoreRegister = 0x87 => None,
    ConstantPool = 0x88 => None,
    WaitForFrame = 0x8A => None,
    SetTarget = 0x8B => None,
    GoToLabel = 0x8C => None,
    WaitForFrame2 = 0x8D => None,
    DefineFunction2 = 0x8E => None,
    Try = 0x8F => None,
    With = 0x94 => None,
    Push = 0x96 => None,
    Jump = 0x99 => None,
    GetUrl2 = 0x9A => None,
    DefineFunction = 0x9B => None,
    If = 0x9D => None,
    /// Runs another frame's script; has a length field but no operands
    Call = 0x9E => Some("control::call"),
    GotoFrame2 = 0x9F => None,
}

impl ActionCode {
    /// Whether the action is followed by a u16 length and operand bytes
    #[inline]
    pub fn has_length(self) -> bool {
        self as u8 >= ACTION_HAS_LENGTH
    }

    /// Whether executing the action can leave a pending script exception
    pub fn may_throw(self) -> bool {
        matches!(
            self,
            ActionCode::Throw
                | ActionCode::CallFunction
                | ActionCode::CallMethod
                | ActionCode::NewObject
                | ActionCode::NewMethod
                | ActionCode::Call
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_codes() {
        for &code in ActionCode::ALL {
            assert_eq!(ActionCode::from_u8(code as u8), Some(code));
        }
        assert_eq!(ActionCode::from_u8(0x00), None);
        assert_eq!(ActionCode::from_u8(0x16), None);
        assert_eq!(ActionCode::from_u8(0xFF), None);
    }

    #[test]
    fn test_operand_actions_have_no_runtime_fn() {
        for &code in ActionCode::ALL {
            if code.has_length() && code != ActionCode::Call {
                assert!(code.runtime_fn().is_none(), "{}", code.name());
            }
        }
        assert_eq!(ActionCode::Add2.runtime_fn(), Some("arith::add2"));
        assert_eq!(ActionCode::Return.runtime_fn(), None);
    }

    #[test]
    fn test_coverage() {
        assert_eq!(ActionCode::ALL.len(), 97);
        assert_eq!(ActionCode::Push.name(), "Push");
        assert!(ActionCode::Push.has_length());
        assert!(!ActionCode::Trace.has_length());
    }
}
