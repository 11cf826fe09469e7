//! Two-pass region decoder
//!
//! The first pass splits a region into records and computes every byte
//! offset some jump or frame wait can land on. The second pass decodes
//! each record's operands into an [`Action`], recursing into the bodies
//! of function definitions, `with` blocks and try statements. Offsets are
//! always relative to the start of the region being decoded.

use std::collections::BTreeSet;
use std::rc::Rc;

use log::{debug, trace};

use super::Translator;
use super::program::{Action, CatchBinding, FunctionBody, Instruction, PushItem, Region, TryBlock};
use super::reader::ByteReader;
use crate::runtime::{FunctionDef, FunctionFlags, Param};
use crate::vm::ActionCode;
use crate::vm::opcode::ACTION_END;

/// Translation-fatal error
#[derive(Debug, Clone, PartialEq)]
pub enum TranslateError {
    /// Byte that is not a known action
    UnknownOpcode { opcode: u8, offset: usize },
    /// Record or operand runs past the end of its block
    Truncated { offset: usize, needed: usize },
    /// Push refers past the end of the constant pool
    ConstantPoolIndex { index: u16, pool_len: usize, offset: usize },
    /// Push item with an unknown type byte
    UnknownPushType { kind: u8, offset: usize },
    /// Jump lands inside an instruction
    MisalignedJump { target: usize, offset: usize },
    /// Jump lands outside the region
    JumpOutOfRegion { target: i64, offset: usize },
    /// Nested body extends past the end of the region
    BodyOutOfRange { offset: usize, size: usize },
}

impl std::fmt::Display for TranslateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownOpcode { opcode, offset } => {
                write!(f, "unknown action 0x{:02X} at offset {}", opcode, offset)
            }
            Self::Truncated { offset, needed } => {
                write!(f, "truncated action at offset {} ({} more bytes needed)", offset, needed)
            }
            Self::ConstantPoolIndex { index, pool_len, offset } => write!(
                f,
                "constant pool index {} out of range ({} entries) at offset {}",
                index, pool_len, offset
            ),
            Self::UnknownPushType { kind, offset } => {
                write!(f, "unknown push type {} at offset {}", kind, offset)
            }
            Self::MisalignedJump { target, offset } => write!(
                f,
                "jump at offset {} lands inside an instruction at {}",
                offset, target
            ),
            Self::JumpOutOfRegion { target, offset } => {
                write!(f, "jump at offset {} leaves the region (target {})", offset, target)
            }
            Self::BodyOutOfRange { offset, size } => write!(
                f,
                "body of {} bytes at offset {} extends past the region",
                size, offset
            ),
        }
    }
}

impl std::error::Error for TranslateError {}

/// One undecoded action
#[derive(Debug)]
struct Record<'a> {
    offset: usize,
    code: ActionCode,
    operands: &'a [u8],
    /// Offset of the first operand byte
    operands_at: usize,
    /// Offset just past the operands
    end: usize,
    /// Offset of the next record, past any nested body
    next: usize,
}

impl<'a> Record<'a> {
    fn reader(&self) -> ByteReader<'a> {
        ByteReader::at(self.operands, self.operands_at)
    }
}

/// Size of the nested bodies that follow a record
fn nested_size(code: ActionCode, record: &mut ByteReader<'_>) -> Result<usize, TranslateError> {
    match code {
        ActionCode::DefineFunction | ActionCode::DefineFunction2 => {
            // The body size is always the last operand field
            let skip = record.remaining().saturating_sub(2);
            record.take(skip)?;
            Ok(record.u16()? as usize)
        }
        ActionCode::With => Ok(record.u16()? as usize),
        ActionCode::Try => {
            record.u8()?;
            let sizes = [record.u16()?, record.u16()?, record.u16()?];
            Ok(sizes.iter().map(|&s| s as usize).sum())
        }
        _ => Ok(0),
    }
}

/// Split a region into records; returns them and the region end offset
fn scan(bytes: &[u8]) -> Result<(Vec<Record<'_>>, usize), TranslateError> {
    let mut records = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let byte = bytes[pos];
        if byte == ACTION_END {
            return Ok((records, pos));
        }
        let code = ActionCode::from_u8(byte).ok_or(TranslateError::UnknownOpcode {
            opcode: byte,
            offset: pos,
        })?;

        let mut reader = ByteReader::at(&bytes[pos + 1..], pos + 1);
        let operands = if code.has_length() {
            let len = reader.u16()? as usize;
            reader.take(len)?
        } else {
            &[][..]
        };
        let operands_at = reader.offset() - operands.len();
        let end = reader.offset();

        let nested = nested_size(code, &mut ByteReader::at(operands, operands_at))?;
        let next = end + nested;
        if next > bytes.len() {
            return Err(TranslateError::BodyOutOfRange { offset: pos, size: nested });
        }

        records.push(Record {
            offset: pos,
            code,
            operands,
            operands_at,
            end,
            next,
        });
        pos = next;
    }
    Ok((records, bytes.len()))
}

/// Label pass: the branch target of every record, if it has one
///
/// Frame waits carry a count of actions to skip rather than an offset, so
/// their target is found by stepping over that many following records.
fn branch_targets(records: &[Record<'_>], end: usize) -> Result<Vec<Option<usize>>, TranslateError> {
    let starts: BTreeSet<usize> = records.iter().map(|r| r.offset).chain([end]).collect();
    let skip_to = |i: usize, skip: u8| records.get(i + 1 + skip as usize).map_or(end, |r| r.offset);

    records
        .iter()
        .enumerate()
        .map(|(i, record)| -> Result<Option<usize>, TranslateError> {
            let mut reader = record.reader();
            let target = match record.code {
                ActionCode::Jump | ActionCode::If => record.end as i64 + reader.i16()? as i64,
                ActionCode::WaitForFrame => {
                    reader.u16()?;
                    skip_to(i, reader.u8()?) as i64
                }
                ActionCode::WaitForFrame2 => skip_to(i, reader.u8()?) as i64,
                _ => return Ok(None),
            };
            if target < 0 || target > end as i64 {
                return Err(TranslateError::JumpOutOfRegion {
                    target,
                    offset: record.offset,
                });
            }
            let target = target as usize;
            if !starts.contains(&target) {
                return Err(TranslateError::MisalignedJump {
                    target,
                    offset: record.offset,
                });
            }
            Ok(Some(target))
        })
        .collect()
}

impl Translator {
    /// Translate one region
    ///
    /// `pool` is the constant pool in effect where the region starts; a
    /// ConstantPool inside the region replaces it from that point on.
    pub(super) fn decode_region(&mut self, bytes: &[u8], pool: &[u32], symbol: String) -> Result<Region, TranslateError> {
        let (records, end) = scan(bytes)?;
        let targets = branch_targets(&records, end)?;
        let labels: BTreeSet<usize> = targets.iter().flatten().copied().collect();

        let mut pool = pool.to_vec();
        let mut instructions = Vec::with_capacity(records.len() + 1);
        for (record, target) in records.iter().zip(&targets) {
            let action = self.decode_action(bytes, record, target.unwrap_or(0), &mut pool)?;
            trace!("{} {:>5}: {:?}", symbol, record.offset, record.code);
            instructions.push(Instruction {
                offset: record.offset,
                action,
            });
        }
        instructions.push(Instruction {
            offset: end,
            action: Action::End,
        });

        let mut region = Region {
            instructions,
            labels,
            symbol,
        };
        resolve_jumps(&mut region);
        #[cfg(feature = "dump")]
        for instruction in &region.instructions {
            let mark = if region.labels.contains(&instruction.offset) { "*" } else { " " };
            eprintln!("{} {}{:>5}: {:?}", region.symbol, mark, instruction.offset, instruction.action);
        }
        debug!(
            "decoded {}: {} instructions, {} labels",
            region.symbol,
            region.instructions.len(),
            region.labels.len()
        );
        Ok(region)
    }

    fn decode_action(
        &mut self,
        bytes: &[u8],
        record: &Record<'_>,
        target: usize,
        pool: &mut Vec<u32>,
    ) -> Result<Action, TranslateError> {
        let mut r = record.reader();
        let action = match record.code {
            ActionCode::GotoFrame => Action::GotoFrame(r.u16()?),
            ActionCode::GetUrl => {
                let url = Rc::from(r.cstr());
                let window = Rc::from(r.cstr());
                Action::GetUrl { url, target: window }
            }
            ActionCode::StoreRegister => Action::StoreRegister(r.u8()?),
            ActionCode::ConstantPool => {
                let count = r.u16()?;
                *pool = (0..count).map(|_| self.intern(r.cstr())).collect();
                Action::ConstantPool(pool.clone())
            }
            ActionCode::WaitForFrame => Action::WaitForFrame {
                frame: r.u16()?,
                target,
                index: 0,
            },
            ActionCode::SetTarget => Action::SetTarget(Rc::from(r.cstr())),
            ActionCode::GoToLabel => Action::GoToLabel(Rc::from(r.cstr())),
            ActionCode::WaitForFrame2 => Action::WaitForFrame2 { target, index: 0 },
            ActionCode::DefineFunction => {
                let name = r.cstr();
                let count = r.u16()?;
                let params: Vec<&[u8]> = (0..count).map(|_| r.cstr()).collect();
                let def = FunctionDef::simple(name, &params);
                self.decode_function(bytes, record, def, "func", pool)?
            }
            ActionCode::DefineFunction2 => {
                let name = r.cstr();
                let count = r.u16()?;
                let register_count = r.u8()?;
                let flags = FunctionFlags::from_bits(r.u16()?);
                let mut params = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let register = r.u8()?;
                    params.push(Param::new(register, r.cstr()));
                }
                let def = FunctionDef::advanced(name, register_count, flags, params);
                self.decode_function(bytes, record, def, "func2", pool)?
            }
            ActionCode::Try => self.decode_try(bytes, record, pool)?,
            ActionCode::With => {
                let size = r.u16()? as usize;
                let symbol = self.symbol("with", b"");
                Action::With(self.decode_region(&bytes[record.end..record.end + size], pool, symbol)?)
            }
            ActionCode::Push => Action::Push(self.decode_push(&mut r, pool)?),
            ActionCode::Jump => Action::Jump { target, index: 0 },
            ActionCode::If => Action::If { target, index: 0 },
            ActionCode::GetUrl2 => Action::GetUrl2(r.u8()?),
            ActionCode::GotoFrame2 => {
                let flags = r.u8()?;
                let scene_bias = if flags & 0x02 != 0 { r.u16()? } else { 0 };
                Action::GotoFrame2 {
                    play: flags & 0x01 != 0,
                    scene_bias,
                }
            }
            code => Action::Simple(code),
        };
        Ok(action)
    }

    fn decode_function(
        &mut self,
        bytes: &[u8],
        record: &Record<'_>,
        def: FunctionDef,
        prefix: &str,
        pool: &[u32],
    ) -> Result<Action, TranslateError> {
        let symbol = self.symbol(prefix, &def.name);
        let region = self.decode_region(&bytes[record.end..record.next], pool, symbol.clone())?;
        Ok(Action::DefineFunction(Rc::new(FunctionBody { def, region, symbol })))
    }

    fn decode_try(&mut self, bytes: &[u8], record: &Record<'_>, pool: &[u32]) -> Result<Action, TranslateError> {
        let mut r = record.reader();
        let flags = r.u8()?;
        let try_size = r.u16()? as usize;
        let catch_size = r.u16()? as usize;
        let finally_size = r.u16()? as usize;
        let has_catch = flags & 0x01 != 0;
        let has_finally = flags & 0x02 != 0;
        let binding = if flags & 0x04 != 0 {
            CatchBinding::Register(r.u8()?)
        } else {
            CatchBinding::Variable(Rc::from(r.cstr()))
        };

        let try_start = record.end;
        let catch_start = try_start + try_size;
        let finally_start = catch_start + catch_size;

        let symbol = self.symbol("try", b"");
        let body = self.decode_region(&bytes[try_start..catch_start], pool, symbol)?;
        let catch_body = if has_catch {
            let symbol = self.symbol("catch", b"");
            Some(self.decode_region(&bytes[catch_start..finally_start], pool, symbol)?)
        } else {
            None
        };
        let finally_body = if has_finally {
            let symbol = self.symbol("finally", b"");
            Some(self.decode_region(&bytes[finally_start..finally_start + finally_size], pool, symbol)?)
        } else {
            None
        };

        Ok(Action::Try(TryBlock {
            catch: has_catch.then_some(binding),
            body,
            catch_body,
            finally_body,
        }))
    }

    fn decode_push(&mut self, r: &mut ByteReader<'_>, pool: &[u32]) -> Result<Vec<PushItem>, TranslateError> {
        let mut items = Vec::new();
        while !r.is_empty() {
            let offset = r.offset();
            let item = match r.u8()? {
                0 => PushItem::Str(self.intern(r.cstr())),
                1 => PushItem::F32(r.f32()?),
                2 => PushItem::Null,
                3 => PushItem::Undefined,
                4 => PushItem::Register(r.u8()?),
                5 => PushItem::Bool(r.u8()? != 0),
                6 => PushItem::F64(r.f64()?),
                7 => PushItem::I32(r.i32()?),
                kind @ (8 | 9) => {
                    let index = if kind == 8 { r.u8()? as u16 } else { r.u16()? };
                    let id = pool.get(index as usize).copied().ok_or(TranslateError::ConstantPoolIndex {
                        index,
                        pool_len: pool.len(),
                        offset,
                    })?;
                    PushItem::Str(id)
                }
                kind => return Err(TranslateError::UnknownPushType { kind, offset }),
            };
            items.push(item);
        }
        Ok(items)
    }
}

/// Turn branch target offsets into instruction indices
fn resolve_jumps(region: &mut Region) {
    let indices: Vec<Option<usize>> = region
        .instructions
        .iter()
        .map(|i| match &i.action {
            Action::Jump { target, .. }
            | Action::If { target, .. }
            | Action::WaitForFrame { target, .. }
            | Action::WaitForFrame2 { target, .. } => region.index_of(*target),
            _ => None,
        })
        .collect();

    for (instruction, resolved) in region.instructions.iter_mut().zip(indices) {
        let Some(resolved) = resolved else { continue };
        match &mut instruction.action {
            Action::Jump { index, .. }
            | Action::If { index, .. }
            | Action::WaitForFrame { index, .. }
            | Action::WaitForFrame2 { index, .. } => *index = resolved,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![code];
        out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn decode(bytes: &[u8]) -> Result<Region, TranslateError> {
        Translator::new().decode_region(bytes, &[], "test".to_string())
    }

    #[test]
    fn test_backward_jump_label() {
        // 0: Play, 1: Stop, 2: Jump back to 1
        let mut code = vec![0x06, 0x07];
        code.extend(record(0x99, &(-4i16).to_le_bytes()));
        code.push(0);
        let region = decode(&code).unwrap();
        assert_eq!(region.labels.iter().copied().collect::<Vec<_>>(), vec![1]);
        match region.instructions[2].action {
            Action::Jump { target, index } => {
                assert_eq!(target, 1);
                assert_eq!(index, 1);
                assert_eq!(region.instructions[index].offset, target);
            }
            ref other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_wait_for_frame_skips_actions() {
        // WaitForFrame(frame 3, skip 2) Play Stop NextFrame
        let mut code = record(0x8A, &[3, 0, 2]);
        let wait_len = code.len();
        code.extend([0x06, 0x07, 0x04, 0x00]);
        let region = decode(&code).unwrap();
        assert!(region.labels.contains(&(wait_len + 2)));
        match region.instructions[0].action {
            Action::WaitForFrame { frame, index, .. } => {
                assert_eq!(frame, 3);
                assert_eq!(index, 3);
            }
            ref other => panic!("unexpected {:?}", other),
        }

        // Skipping past the end lands on the terminator
        let mut code = record(0x8D, &[5]);
        code.extend([0x06, 0x00]);
        let region = decode(&code).unwrap();
        assert!(matches!(region.instructions[0].action, Action::WaitForFrame2 { index: 2, .. }));
    }

    #[test]
    fn test_bad_jumps_are_rejected() {
        let mut code = record(0x99, &(100i16).to_le_bytes());
        code.push(0);
        assert!(matches!(decode(&code), Err(TranslateError::JumpOutOfRegion { target: 105, offset: 0 })));

        // Into the middle of the jump itself
        let mut code = record(0x99, &(-3i16).to_le_bytes());
        code.push(0);
        assert_eq!(decode(&code).unwrap_err(), TranslateError::MisalignedJump { target: 2, offset: 0 });
    }

    #[test]
    fn test_unknown_opcode_and_truncation() {
        assert_eq!(decode(&[0x06, 0x16, 0x00]).unwrap_err(), TranslateError::UnknownOpcode { opcode: 0x16, offset: 1 });
        assert_eq!(decode(&[0x96, 0x05, 0x00, 0x01]).unwrap_err(), TranslateError::Truncated { offset: 3, needed: 4 });
    }

    #[test]
    fn test_constant_pool_items() {
        let mut code = record(0x88, b"\x02\x00a\0b\0");
        code.extend(record(0x96, &[8, 1, 9, 0, 0]));
        code.push(0);
        let mut translator = Translator::new();
        let region = translator.decode_region(&code, &[], "pool".to_string()).unwrap();
        let a = translator.intern(b"a");
        let b = translator.intern(b"b");
        match &region.instructions[1].action {
            Action::Push(items) => assert_eq!(items, &vec![PushItem::Str(b), PushItem::Str(a)]),
            other => panic!("unexpected {:?}", other),
        }

        let mut code = record(0x96, &[8, 0]);
        code.push(0);
        assert!(matches!(decode(&code), Err(TranslateError::ConstantPoolIndex { index: 0, pool_len: 0, .. })));
    }

    #[test]
    fn test_nested_regions_are_relative() {
        // with (...) { Jump +0; Play }  Stop
        let mut body = record(0x99, &0i16.to_le_bytes());
        body.push(0x06);
        let mut code = record(0x94, &(body.len() as u16).to_le_bytes());
        code.extend(&body);
        code.extend([0x07, 0x00]);

        let region = decode(&code).unwrap();
        assert_eq!(region.instructions.len(), 3);
        match &region.instructions[0].action {
            Action::With(inner) => {
                assert_eq!(inner.labels.iter().copied().collect::<Vec<_>>(), vec![5]);
                assert!(matches!(inner.instructions[1].action, Action::Simple(ActionCode::Play)));
                assert!(matches!(inner.instructions[2].action, Action::End));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(region.instructions[1].action, Action::Simple(ActionCode::Stop)));
    }

    #[test]
    fn test_function_body_out_of_range() {
        let mut payload = b"f\0".to_vec();
        payload.extend_from_slice(&0u16.to_le_bytes());
        payload.extend_from_slice(&50u16.to_le_bytes());
        let mut code = record(0x9B, &payload);
        code.push(0);
        assert_eq!(decode(&code).unwrap_err(), TranslateError::BodyOutOfRange { offset: 0, size: 50 });
    }
}
