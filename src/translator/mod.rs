//! Action bytecode translator
//!
//! Decodes frame scripts into [`Program`] regions and renders them as Rust
//! source. One [`Translator`] owns the string table: every distinct string
//! gets one ID for the lifetime of the translator, so several translation
//! calls (as in the REPL) share IDs.

pub mod decode;
pub mod emit;
pub mod program;
pub mod reader;

use std::rc::Rc;

use log::debug;
use rustc_hash::FxHashMap;

pub use decode::TranslateError;
pub use emit::{EmittedSource, emit_program};
pub use program::{Action, Program, Region};

/// Translator state shared across calls
#[derive(Debug)]
pub struct Translator {
    /// Index is the string ID; entry 0 is unused
    strings: Vec<Rc<[u8]>>,
    ids: FxHashMap<Rc<[u8]>, u32>,
    next_symbol: usize,
    next_script: usize,
}

impl Default for Translator {
    fn default() -> Self {
        Self::new()
    }
}

impl Translator {
    pub fn new() -> Self {
        Translator {
            strings: vec![Rc::from(&b""[..])],
            ids: FxHashMap::default(),
            next_symbol: 0,
            next_script: 0,
        }
    }

    /// ID of a constant string, assigning one on first sight
    pub fn intern(&mut self, bytes: &[u8]) -> u32 {
        if let Some(&id) = self.ids.get(bytes) {
            return id;
        }
        let id = self.strings.len() as u32;
        let shared: Rc<[u8]> = Rc::from(bytes);
        self.strings.push(shared.clone());
        self.ids.insert(shared, id);
        id
    }

    /// Number of distinct strings seen so far
    pub fn string_count(&self) -> usize {
        self.strings.len() - 1
    }

    /// Unique Rust identifier for a nested region
    fn symbol(&mut self, prefix: &str, name: &[u8]) -> String {
        self.next_symbol += 1;
        if name.is_empty() {
            return format!("{}_{}", prefix, self.next_symbol);
        }
        let name: String = name
            .iter()
            .map(|&b| if b.is_ascii_alphanumeric() { b as char } else { '_' })
            .collect();
        format!("{}_{}_{}", prefix, name, self.next_symbol)
    }

    /// Translate frame scripts, in order
    pub fn translate_scripts<B: AsRef<[u8]>>(&mut self, scripts: &[B]) -> Result<Program, TranslateError> {
        let mut regions = Vec::with_capacity(scripts.len());
        for script in scripts {
            let symbol = format!("script_{}", self.next_script);
            self.next_script += 1;
            regions.push(self.decode_region(script.as_ref(), &[], symbol)?);
        }
        debug!(
            "translated {} scripts, {} strings",
            regions.len(),
            self.string_count()
        );
        Ok(Program {
            strings: self.strings.clone(),
            scripts: regions,
        })
    }

    /// Translate one script
    pub fn translate(&mut self, script: &[u8]) -> Result<Program, TranslateError> {
        self.translate_scripts(&[script])
    }

    /// Translate scripts straight to Rust source
    pub fn translate_to_rust<B: AsRef<[u8]>>(&mut self, scripts: &[B]) -> Result<String, TranslateError> {
        let program = self.translate_scripts(scripts)?;
        Ok(emit_program(&program).into_source())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_is_stable_across_calls() {
        let mut translator = Translator::new();
        let push_hi = [0x96, 0x04, 0x00, 0x00, b'h', b'i', 0x00, 0x00];
        let first = translator.translate(&push_hi).unwrap();
        let second = translator.translate(&push_hi).unwrap();
        assert_eq!(first.max_string_id(), 1);
        assert_eq!(second.max_string_id(), 1);
        assert_eq!(second.string(1).map(|s| &s[..]), Some(&b"hi"[..]));
        assert_eq!(second.scripts[0].symbol, "script_1");
    }

    #[test]
    fn test_backward_jump_round_trip() {
        // Trace-free loop body: Play, Stop, Jump back to Play
        let mut code = vec![0x06, 0x07, 0x99, 0x02, 0x00];
        code.extend((-7i16).to_le_bytes());
        code.push(0);
        let program = Translator::new().translate(&code).unwrap();
        let region = &program.scripts[0];
        let Action::Jump { target, index } = region.instructions[2].action else {
            panic!("expected a jump");
        };
        // instruction end (7) plus displacement (-7)
        assert_eq!(target, 0);
        assert!(region.labels.contains(&target));
        assert_eq!(region.instructions[index].offset, target);

        let source = emit_program(&program).into_source();
        assert!(source.contains("label = 0;"));
    }

    #[test]
    fn test_symbols_are_identifiers() {
        let mut translator = Translator::new();
        assert_eq!(translator.symbol("func", b"my-fn"), "func_my_fn_1");
        assert_eq!(translator.symbol("with", b""), "with_2");
    }

    #[test]
    fn test_error_propagates_from_nested_script() {
        let err = Translator::new().translate_scripts(&[vec![0x06, 0x00], vec![0xFF]]).unwrap_err();
        assert_eq!(err, TranslateError::UnknownOpcode { opcode: 0xFF, offset: 0 });
        assert_eq!(err.to_string(), "unknown action 0xFF at offset 0");
    }
}
