//! Execution of decoded programs
//!
//! The interpreter walks decoded regions with the same runtime calls the
//! emitter generates; the player drives it one frame at a time.

pub mod interpreter;
pub mod opcode;
pub mod player;
pub mod stack;

pub use interpreter::{Flow, Interpreter, RuntimeError, RuntimeResult};
pub use opcode::ActionCode;
pub use player::{PlaySummary, Player, StopReason, play_installed};
pub use stack::Stack;
