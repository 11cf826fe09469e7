//! SWFRecomp - ahead-of-time translation of SWF action bytecode
//!
//! Frame scripts are decoded into structured regions and emitted as Rust
//! source that calls one runtime function per action. The runtime gives
//! that code the legacy player's semantics: loosely typed stack values,
//! reference-counted objects and arrays, `with` scope chains and registers.
//!
//! # Features
//! - Two-pass translator with per-region labels and constant pools
//! - Rust emitter producing a label state machine per region
//! - Interpreter over the same decoded form, for running without a build
//! - Generational refcounted heap with allocation limits
//!
//! # Example
//! ```ignore
//! use swfrecomp::{Context, Player, Translator};
//!
//! let program = Translator::new().translate(&action_bytes)?;
//! let mut ctx = Context::default();
//! Player::new(program).play(&mut ctx)?;
//! ```

// Core modules
pub mod context;
pub mod value;

// Heap
pub mod heap;

// Runtime data model
pub mod runtime;

// Action semantics
pub mod ops;

// Translator
pub mod translator;

// Execution
pub mod vm;

// Utilities
pub mod util;

// Re-export main types
pub use context::{Config, Context};
pub use translator::{TranslateError, Translator};
pub use value::Value;
pub use vm::{Interpreter, Player, RuntimeError};
