//! The `Code` attribute: bytecode decoding and re-assembly.
//!
//! Rewriting a method body means splicing call sequences into its
//! instruction stream, which invalidates every byte offset after the splice
//! point. This module therefore decodes a `Code` attribute into an
//! offset-free form — a list of [`Insn`] values whose branch targets are
//! *instruction indices*, plus an exception table expressed the same way —
//! lets the rewriter edit that list freely, and re-assembles it with all
//! branch offsets, switch padding and exception-table pcs recomputed.
//!
//! Short branches whose displacement no longer fits in 16 bits after
//! injection are widened to `goto_w`/`jsr_w`; a conditional branch pushed
//! out of range is reported as malformed (such a method would be megabytes
//! of bytecode).

use crate::{classfile::AttributeInfo, file::io::write_be, file::parser::Parser, Result};

/// Opcodes the instrumentation pipeline matches on or emits.
#[allow(missing_docs)]
pub mod opcodes {
    pub const NOP: u8 = 0x00;
    pub const ICONST_M1: u8 = 0x02;
    pub const ICONST_0: u8 = 0x03;
    pub const BIPUSH: u8 = 0x10;
    pub const SIPUSH: u8 = 0x11;
    pub const LDC: u8 = 0x12;
    pub const LDC_W: u8 = 0x13;
    pub const ALOAD_0: u8 = 0x2A;
    pub const DUP: u8 = 0x59;
    pub const IINC: u8 = 0x84;
    pub const TABLESWITCH: u8 = 0xAA;
    pub const LOOKUPSWITCH: u8 = 0xAB;
    pub const RETURN: u8 = 0xB1;
    pub const GETSTATIC: u8 = 0xB2;
    pub const PUTSTATIC: u8 = 0xB3;
    pub const GETFIELD: u8 = 0xB4;
    pub const PUTFIELD: u8 = 0xB5;
    pub const INVOKESPECIAL: u8 = 0xB7;
    pub const INVOKESTATIC: u8 = 0xB8;
    pub const INVOKEINTERFACE: u8 = 0xB9;
    pub const NEW: u8 = 0xBB;
    pub const CHECKCAST: u8 = 0xC0;
    pub const MONITORENTER: u8 = 0xC2;
    pub const MONITOREXIT: u8 = 0xC3;
    pub const WIDE: u8 = 0xC4;
    pub const GOTO: u8 = 0xA7;
    pub const JSR: u8 = 0xA8;
    pub const GOTO_W: u8 = 0xC8;
    pub const JSR_W: u8 = 0xC9;
}

use opcodes::*;

/// One decoded instruction.
///
/// Non-branching instructions keep their exact original bytes in
/// [`Insn::Raw`]; only control transfers are lifted into symbolic form so
/// their targets survive splicing. Targets are indices into the owning
/// instruction list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insn {
    /// A complete instruction with no code offsets in its operands.
    Raw(Vec<u8>),
    /// A 16-bit branch (`ifeq`..`jsr`, `ifnull`, `ifnonnull`, `goto`).
    Branch {
        /// The branch opcode.
        opcode: u8,
        /// Index of the target instruction.
        target: usize,
    },
    /// A 32-bit branch (`goto_w`, `jsr_w`).
    BranchWide {
        /// The branch opcode.
        opcode: u8,
        /// Index of the target instruction.
        target: usize,
    },
    /// A `tableswitch` instruction.
    TableSwitch {
        /// Index of the default target instruction.
        default: usize,
        /// Lowest case value.
        low: i32,
        /// Highest case value.
        high: i32,
        /// One target per case value, `low..=high` in order.
        targets: Vec<usize>,
    },
    /// A `lookupswitch` instruction.
    LookupSwitch {
        /// Index of the default target instruction.
        default: usize,
        /// Sorted (match, target) pairs.
        pairs: Vec<(i32, usize)>,
    },
}

impl Insn {
    /// The instruction's opcode byte.
    #[must_use]
    pub fn opcode(&self) -> u8 {
        match self {
            Insn::Raw(bytes) => bytes[0],
            Insn::Branch { opcode, .. } | Insn::BranchWide { opcode, .. } => *opcode,
            Insn::TableSwitch { .. } => TABLESWITCH,
            Insn::LookupSwitch { .. } => LOOKUPSWITCH,
        }
    }

    /// For the two-byte-operand constant pool instructions
    /// (`getstatic`..`invokeinterface`, `new`, `checkcast`, ...), the pool
    /// index embedded in the operand bytes.
    #[must_use]
    pub fn pool_index(&self) -> Option<u16> {
        match self {
            Insn::Raw(bytes) if bytes.len() >= 3 => {
                Some(u16::from_be_bytes([bytes[1], bytes[2]]))
            }
            _ => None,
        }
    }
}

/// One exception table entry, pcs expressed as instruction indices.
///
/// `end` is exclusive and may equal the instruction count (a protected
/// range running to the end of the method).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// First protected instruction.
    pub start: usize,
    /// Exclusive end of the protected range.
    pub end: usize,
    /// Handler entry instruction.
    pub handler: usize,
    /// Constant pool index of the caught class, 0 for catch-all.
    pub catch_type: u16,
}

/// A decoded `Code` attribute.
#[derive(Debug, Clone)]
pub struct CodeAttribute {
    /// Operand stack depth limit.
    pub max_stack: u16,
    /// Local variable array size.
    pub max_locals: u16,
    /// The instruction list.
    pub insns: Vec<Insn>,
    /// Exception table, in original order.
    pub handlers: Vec<ExceptionHandler>,
    /// Nested attributes (`StackMapTable`, `LineNumberTable`, ...), raw.
    pub attributes: Vec<AttributeInfo>,
}

/// Operand byte count for fixed-length instructions. `None` marks opcodes
/// that are variable-length, branching, or not legal in a class file.
fn operand_len(opcode: u8) -> Option<usize> {
    match opcode {
        0x00..=0x0F => Some(0),          // nop, consts
        0x10 | 0x12 => Some(1),          // bipush, ldc
        0x11 | 0x13 | 0x14 => Some(2),   // sipush, ldc_w, ldc2_w
        0x15..=0x19 => Some(1),          // loads
        0x1A..=0x35 => Some(0),          // loads_n, array loads
        0x36..=0x3A => Some(1),          // stores
        0x3B..=0x83 => Some(0),          // stores_n, stack, arithmetic
        0x84 => Some(2),                 // iinc
        0x85..=0x98 => Some(0),          // conversions, comparisons
        0xA9 => Some(1),                 // ret
        0xAC..=0xB1 => Some(0),          // returns
        0xB2..=0xB8 => Some(2),          // field access, invokes
        0xB9 | 0xBA => Some(4),          // invokeinterface, invokedynamic
        0xBB | 0xBD => Some(2),          // new, anewarray
        0xBC => Some(1),                 // newarray
        0xBE | 0xBF => Some(0),          // arraylength, athrow
        0xC0 | 0xC1 => Some(2),          // checkcast, instanceof
        0xC2 | 0xC3 => Some(0),          // monitorenter, monitorexit
        0xC5 => Some(3),                 // multianewarray
        _ => None,
    }
}

fn is_branch16(opcode: u8) -> bool {
    matches!(opcode, 0x99..=0xA8 | 0xC6 | 0xC7)
}

/// Intermediate decoded instruction with byte-offset targets.
enum PreInsn {
    Raw(Vec<u8>),
    Branch { opcode: u8, target: usize },
    BranchWide { opcode: u8, target: usize },
    TableSwitch {
        default: usize,
        low: i32,
        high: i32,
        targets: Vec<usize>,
    },
    LookupSwitch {
        default: usize,
        pairs: Vec<(i32, usize)>,
    },
}

fn branch_target(insn_offset: usize, delta: i64, code_len: usize) -> Result<usize> {
    let target = insn_offset as i64 + delta;
    if target < 0 || target as usize >= code_len {
        return Err(malformed_error!(
            "Branch at {} targets offset {} outside the code array",
            insn_offset,
            target
        ));
    }
    Ok(target as usize)
}

impl CodeAttribute {
    /// Decode the raw bytes of a `Code` attribute.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for unknown opcodes, branches
    /// landing inside an instruction, or an inconsistent exception table;
    /// [`crate::Error::OutOfBounds`] on truncation.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut parser = Parser::new(data);
        let max_stack = parser.read_u16()?;
        let max_locals = parser.read_u16()?;
        let code_len = parser.read_u32()? as usize;
        let code = parser.read_bytes(code_len)?;

        let (insns, offsets) = Self::decode_instructions(code)?;
        let insn_count = insns.len();

        let index_of = |offset: usize, allow_end: bool| -> Result<usize> {
            if allow_end && offset == code_len {
                return Ok(insn_count);
            }
            offsets
                .binary_search(&offset)
                .map_err(|_| malformed_error!("Offset {} is not an instruction boundary", offset))
        };

        let handler_count = parser.read_u16()?;
        let mut handlers = Vec::with_capacity(handler_count as usize);
        for _ in 0..handler_count {
            let start_pc = parser.read_u16()? as usize;
            let end_pc = parser.read_u16()? as usize;
            let handler_pc = parser.read_u16()? as usize;
            let catch_type = parser.read_u16()?;
            handlers.push(ExceptionHandler {
                start: index_of(start_pc, false)?,
                end: index_of(end_pc, true)?,
                handler: index_of(handler_pc, false)?,
                catch_type,
            });
        }

        let attr_count = parser.read_u16()?;
        let mut attributes = Vec::with_capacity(attr_count as usize);
        for _ in 0..attr_count {
            let name_index = parser.read_u16()?;
            let len = parser.read_u32()? as usize;
            attributes.push(AttributeInfo {
                name_index,
                info: parser.read_bytes(len)?.to_vec(),
            });
        }

        let insns = Self::resolve_targets(insns, &offsets)?;
        Ok(CodeAttribute {
            max_stack,
            max_locals,
            insns,
            handlers,
            attributes,
        })
    }

    /// First pass: scan the code array, producing instructions with
    /// byte-offset targets plus the offset of every instruction start.
    fn decode_instructions(code: &[u8]) -> Result<(Vec<PreInsn>, Vec<usize>)> {
        let mut parser = Parser::new(code);
        let mut insns = Vec::new();
        let mut offsets = Vec::new();

        while parser.has_more_data() {
            let offset = parser.pos();
            offsets.push(offset);
            let opcode = parser.read_u8()?;

            let insn = if is_branch16(opcode) {
                let delta = i64::from(parser.read_i16()?);
                PreInsn::Branch {
                    opcode,
                    target: branch_target(offset, delta, code.len())?,
                }
            } else {
                match opcode {
                    GOTO_W | JSR_W => {
                        let delta = i64::from(parser.read_i32()?);
                        PreInsn::BranchWide {
                            opcode,
                            target: branch_target(offset, delta, code.len())?,
                        }
                    }
                    TABLESWITCH => {
                        parser.align4(0)?;
                        let default =
                            branch_target(offset, i64::from(parser.read_i32()?), code.len())?;
                        let low = parser.read_i32()?;
                        let high = parser.read_i32()?;
                        if high < low {
                            return Err(malformed_error!(
                                "tableswitch at {} has high {} < low {}",
                                offset,
                                high,
                                low
                            ));
                        }
                        let count = (i64::from(high) - i64::from(low) + 1) as usize;
                        let mut targets = Vec::with_capacity(count);
                        for _ in 0..count {
                            targets.push(branch_target(
                                offset,
                                i64::from(parser.read_i32()?),
                                code.len(),
                            )?);
                        }
                        PreInsn::TableSwitch {
                            default,
                            low,
                            high,
                            targets,
                        }
                    }
                    LOOKUPSWITCH => {
                        parser.align4(0)?;
                        let default =
                            branch_target(offset, i64::from(parser.read_i32()?), code.len())?;
                        let npairs = parser.read_i32()?;
                        if npairs < 0 {
                            return Err(malformed_error!(
                                "lookupswitch at {} has negative pair count",
                                offset
                            ));
                        }
                        let mut pairs = Vec::with_capacity(npairs as usize);
                        for _ in 0..npairs {
                            let key = parser.read_i32()?;
                            let target = branch_target(
                                offset,
                                i64::from(parser.read_i32()?),
                                code.len(),
                            )?;
                            pairs.push((key, target));
                        }
                        PreInsn::LookupSwitch { default, pairs }
                    }
                    WIDE => {
                        let modified = parser.peek_byte()?;
                        let operand_bytes = if modified == IINC { 5 } else { 3 };
                        parser.advance_by(operand_bytes)?;
                        PreInsn::Raw(code[offset..parser.pos()].to_vec())
                    }
                    _ => match operand_len(opcode) {
                        Some(len) => {
                            parser.advance_by(len)?;
                            PreInsn::Raw(code[offset..parser.pos()].to_vec())
                        }
                        None => {
                            return Err(malformed_error!(
                                "Unknown opcode 0x{:02X} at offset {}",
                                opcode,
                                offset
                            ))
                        }
                    },
                }
            };

            insns.push(insn);
        }

        Ok((insns, offsets))
    }

    /// Second pass: map byte-offset targets to instruction indices.
    fn resolve_targets(pres: Vec<PreInsn>, offsets: &[usize]) -> Result<Vec<Insn>> {
        let index_of = |offset: usize| -> Result<usize> {
            offsets
                .binary_search(&offset)
                .map_err(|_| malformed_error!("Branch target {} is not an instruction boundary", offset))
        };

        pres.into_iter()
            .map(|pre| {
                Ok(match pre {
                    PreInsn::Raw(bytes) => Insn::Raw(bytes),
                    PreInsn::Branch { opcode, target } => Insn::Branch {
                        opcode,
                        target: index_of(target)?,
                    },
                    PreInsn::BranchWide { opcode, target } => Insn::BranchWide {
                        opcode,
                        target: index_of(target)?,
                    },
                    PreInsn::TableSwitch {
                        default,
                        low,
                        high,
                        targets,
                    } => Insn::TableSwitch {
                        default: index_of(default)?,
                        low,
                        high,
                        targets: targets
                            .into_iter()
                            .map(index_of)
                            .collect::<Result<Vec<_>>>()?,
                    },
                    PreInsn::LookupSwitch { default, pairs } => Insn::LookupSwitch {
                        default: index_of(default)?,
                        pairs: pairs
                            .into_iter()
                            .map(|(key, target)| Ok((key, index_of(target)?)))
                            .collect::<Result<Vec<_>>>()?,
                    },
                })
            })
            .collect()
    }

    /// Size in bytes of `insn` when placed at byte `offset`.
    fn insn_size(insn: &Insn, offset: usize) -> usize {
        match insn {
            Insn::Raw(bytes) => bytes.len(),
            Insn::Branch { .. } => 3,
            Insn::BranchWide { .. } => 5,
            Insn::TableSwitch { targets, .. } => {
                let pad = (4 - ((offset + 1) % 4)) % 4;
                1 + pad + 12 + 4 * targets.len()
            }
            Insn::LookupSwitch { pairs, .. } => {
                let pad = (4 - ((offset + 1) % 4)) % 4;
                1 + pad + 8 + 8 * pairs.len()
            }
        }
    }

    /// Compute the byte offset of every instruction plus the total length,
    /// widening 16-bit unconditional branches that no longer fit.
    ///
    /// Widening only grows the layout, so the loop reaches a fixpoint.
    fn layout(insns: &mut Vec<Insn>) -> Result<(Vec<usize>, usize)> {
        loop {
            let mut offsets = Vec::with_capacity(insns.len());
            let mut offset = 0usize;
            for insn in insns.iter() {
                offsets.push(offset);
                offset += Self::insn_size(insn, offset);
            }
            let code_len = offset;

            let mut widened = false;
            for i in 0..insns.len() {
                if let Insn::Branch { opcode, target } = insns[i] {
                    let delta = offsets[target] as i64 - offsets[i] as i64;
                    if i16::try_from(delta).is_err() {
                        match opcode {
                            GOTO => {
                                insns[i] = Insn::BranchWide {
                                    opcode: GOTO_W,
                                    target,
                                };
                            }
                            JSR => {
                                insns[i] = Insn::BranchWide {
                                    opcode: JSR_W,
                                    target,
                                };
                            }
                            _ => {
                                return Err(malformed_error!(
                                    "Conditional branch displacement {} exceeds 16 bits",
                                    delta
                                ))
                            }
                        }
                        widened = true;
                    }
                }
            }

            if !widened {
                return Ok((offsets, code_len));
            }
        }
    }

    /// Re-assemble into raw `Code` attribute bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the assembled code exceeds the
    /// 65535-byte pc range of the exception table, if a branch target index
    /// is out of range, or if a conditional branch cannot reach its target.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut insns = self.insns.clone();
        for insn in &insns {
            let target_ok = |t: usize| t < insns.len();
            let ok = match insn {
                Insn::Raw(bytes) => !bytes.is_empty(),
                Insn::Branch { target, .. } | Insn::BranchWide { target, .. } => {
                    target_ok(*target)
                }
                Insn::TableSwitch {
                    default, targets, ..
                } => target_ok(*default) && targets.iter().all(|t| target_ok(*t)),
                Insn::LookupSwitch { default, pairs } => {
                    target_ok(*default) && pairs.iter().all(|(_, t)| target_ok(*t))
                }
            };
            if !ok {
                return Err(malformed_error!("Instruction references an invalid target"));
            }
        }

        let (offsets, code_len) = Self::layout(&mut insns)?;
        if code_len > u16::MAX as usize {
            return Err(malformed_error!(
                "Rewritten method body of {} bytes exceeds the 65535-byte pc range",
                code_len
            ));
        }

        let mut out = Vec::with_capacity(code_len + 64);
        write_be(&mut out, self.max_stack);
        write_be(&mut out, self.max_locals);
        write_be(&mut out, code_len as u32);

        let code_base = out.len();
        for (i, insn) in insns.iter().enumerate() {
            let insn_offset = offsets[i];
            debug_assert_eq!(out.len() - code_base, insn_offset);
            match insn {
                Insn::Raw(bytes) => out.extend_from_slice(bytes),
                Insn::Branch { opcode, target } => {
                    let delta = offsets[*target] as i64 - insn_offset as i64;
                    write_be(&mut out, *opcode);
                    write_be(&mut out, delta as i16);
                }
                Insn::BranchWide { opcode, target } => {
                    let delta = offsets[*target] as i64 - insn_offset as i64;
                    write_be(&mut out, *opcode);
                    write_be(&mut out, delta as i32);
                }
                Insn::TableSwitch {
                    default,
                    low,
                    high,
                    targets,
                } => {
                    write_be(&mut out, TABLESWITCH);
                    let pad = (4 - ((insn_offset + 1) % 4)) % 4;
                    out.extend(std::iter::repeat(0u8).take(pad));
                    write_be(&mut out, (offsets[*default] as i64 - insn_offset as i64) as i32);
                    write_be(&mut out, *low);
                    write_be(&mut out, *high);
                    for target in targets {
                        write_be(
                            &mut out,
                            (offsets[*target] as i64 - insn_offset as i64) as i32,
                        );
                    }
                }
                Insn::LookupSwitch { default, pairs } => {
                    write_be(&mut out, LOOKUPSWITCH);
                    let pad = (4 - ((insn_offset + 1) % 4)) % 4;
                    out.extend(std::iter::repeat(0u8).take(pad));
                    write_be(&mut out, (offsets[*default] as i64 - insn_offset as i64) as i32);
                    write_be(&mut out, pairs.len() as i32);
                    for (key, target) in pairs {
                        write_be(&mut out, *key);
                        write_be(
                            &mut out,
                            (offsets[*target] as i64 - insn_offset as i64) as i32,
                        );
                    }
                }
            }
        }

        let pc_of = |index: usize, allow_end: bool| -> Result<u16> {
            let pc = if index == insns.len() {
                if !allow_end {
                    return Err(malformed_error!("Handler pc past the end of the method"));
                }
                code_len
            } else {
                offsets[index]
            };
            Ok(pc as u16)
        };

        write_be(&mut out, self.handlers.len() as u16);
        for handler in &self.handlers {
            write_be(&mut out, pc_of(handler.start, false)?);
            write_be(&mut out, pc_of(handler.end, true)?);
            write_be(&mut out, pc_of(handler.handler, false)?);
            write_be(&mut out, handler.catch_type);
        }

        write_be(&mut out, self.attributes.len() as u16);
        for attr in &self.attributes {
            write_be(&mut out, attr.name_index);
            write_be(&mut out, attr.info.len() as u32);
            out.extend_from_slice(&attr.info);
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// iconst_0, istore_1, iload_1, ifeq +5 (-> return), iinc 1 1, return
    fn sample_code() -> Vec<u8> {
        let mut code = vec![
            0x03, // iconst_0
            0x3C, // istore_1
            0x1B, // iload_1
            0x99, 0x00, 0x06, // ifeq -> offset 3 + 6 = 9 (return)
            0x84, 0x01, 0x01, // iinc 1, 1
            0xB1, // return (offset 9)
        ];
        let mut data = Vec::new();
        write_be(&mut data, 2u16); // max_stack
        write_be(&mut data, 2u16); // max_locals
        write_be(&mut data, code.len() as u32);
        data.append(&mut code);
        write_be(&mut data, 0u16); // exception table
        write_be(&mut data, 0u16); // attributes
        data
    }

    #[test]
    fn decode_resolves_branch_targets() {
        let code = CodeAttribute::decode(&sample_code()).unwrap();
        assert_eq!(code.insns.len(), 6);
        assert_eq!(
            code.insns[3],
            Insn::Branch {
                opcode: 0x99,
                target: 5
            }
        );
    }

    #[test]
    fn encode_round_trips() {
        let data = sample_code();
        let code = CodeAttribute::decode(&data).unwrap();
        assert_eq!(code.encode().unwrap(), data);
    }

    #[test]
    fn branch_survives_insertion() {
        let data = sample_code();
        let mut code = CodeAttribute::decode(&data).unwrap();

        // Splice a 3-byte invokestatic ahead of the iinc; the ifeq target
        // index shifts by one and its encoded displacement must grow by 3.
        code.insns.insert(4, Insn::Raw(vec![0xB8, 0x00, 0x01]));
        if let Insn::Branch { target, .. } = &mut code.insns[3] {
            *target += 1;
        }

        let encoded = code.encode().unwrap();
        let reparsed = CodeAttribute::decode(&encoded).unwrap();
        assert_eq!(
            reparsed.insns[3],
            Insn::Branch {
                opcode: 0x99,
                target: 6
            }
        );
        // Displacement bytes: original 6 plus the 3 injected bytes.
        assert_eq!(&encoded[8 + 3 + 1..8 + 3 + 3], &[0x00, 0x09]);
    }

    #[test]
    fn tableswitch_padding_recomputed() {
        // nop at 0; tableswitch opcode at 1, padded with 2 bytes so its four
        // 32-bit words occupy offsets 4..20; return at 20. Single case 0,
        // both targets the return.
        let mut code = vec![0x00, 0xAA, 0, 0];
        code.extend_from_slice(&(20i32 - 1).to_be_bytes());
        code.extend_from_slice(&0i32.to_be_bytes());
        code.extend_from_slice(&0i32.to_be_bytes());
        code.extend_from_slice(&(20i32 - 1).to_be_bytes());
        code.push(0xB1);
        assert_eq!(code.len(), 21);

        let mut data = Vec::new();
        write_be(&mut data, 1u16);
        write_be(&mut data, 1u16);
        write_be(&mut data, code.len() as u32);
        data.extend_from_slice(&code);
        write_be(&mut data, 0u16);
        write_be(&mut data, 0u16);

        let decoded = CodeAttribute::decode(&data).unwrap();
        assert_eq!(decoded.insns.len(), 3);

        // Removing the leading nop moves the switch to offset 0 and its
        // padding from 2 bytes to 3; re-assembly must stay self-consistent.
        let mut moved = decoded.clone();
        moved.insns.remove(0);
        let remap = |insn: &mut Insn| {
            if let Insn::TableSwitch {
                default, targets, ..
            } = insn
            {
                *default -= 1;
                for t in targets {
                    *t -= 1;
                }
            }
        };
        remap(&mut moved.insns[0]);
        let encoded = moved.encode().unwrap();
        let reparsed = CodeAttribute::decode(&encoded).unwrap();
        assert_eq!(
            reparsed.insns[0],
            Insn::TableSwitch {
                default: 1,
                low: 0,
                high: 0,
                targets: vec![1]
            }
        );
    }

    #[test]
    fn exception_table_pcs_remap() {
        // Protected range covering the whole body, handler at the return.
        let mut data = sample_code();
        // Patch exception table count and append an entry by rebuilding.
        let code = CodeAttribute::decode(&data).unwrap();
        let mut with_handler = code.clone();
        with_handler.handlers.push(ExceptionHandler {
            start: 0,
            end: 6,
            handler: 5,
            catch_type: 0,
        });
        data = with_handler.encode().unwrap();

        let mut reparsed = CodeAttribute::decode(&data).unwrap();
        assert_eq!(reparsed.handlers.len(), 1);
        assert_eq!(reparsed.handlers[0].handler, 5);

        // Insert three bytes at the front; handler pc must move with it.
        reparsed.insns.insert(0, Insn::Raw(vec![0xB8, 0x00, 0x01]));
        for handler in &mut reparsed.handlers {
            handler.start += 1;
            handler.end += 1;
            handler.handler += 1;
        }
        if let Insn::Branch { target, .. } = &mut reparsed.insns[4] {
            *target += 1;
        }
        let encoded = reparsed.encode().unwrap();
        let round = CodeAttribute::decode(&encoded).unwrap();
        assert_eq!(round.handlers[0].start, 1);
        assert_eq!(round.handlers[0].handler, 6);
    }

    #[test]
    fn unknown_opcode_is_malformed() {
        let mut data = Vec::new();
        write_be(&mut data, 0u16);
        write_be(&mut data, 0u16);
        write_be(&mut data, 1u32);
        data.push(0xCB); // not a real opcode
        write_be(&mut data, 0u16);
        write_be(&mut data, 0u16);
        assert!(matches!(
            CodeAttribute::decode(&data),
            Err(crate::Error::Malformed { .. })
        ));
    }
}
