//! Instruction encoders: IR to 32-bit machine words.
//!
//! Alias mnemonics are first rewritten into their canonical form by a pure
//! transformation (`cmp` becomes `subs` with a zero destination, `mul`
//! becomes `madd` with a zero accumulator, and so on) — the rewrite changes
//! operand arity, so it must happen before any arity-driven dispatch. The
//! category encoders then place fields with the bit codec; the executor side
//! extracts the same ranges.
//!
//! By the time a word is encoded every label operand must already have been
//! resolved to an address; a surviving label reference is a hard error.

use alloc::format;
use alloc::vec::Vec;

use crate::bits::{insert32, sign_extend};
use crate::error::AsmError;
use crate::ir::{
    AddrMode, Category, Instruction, Mnemonic, Operand, Register, ShiftKind, Width,
};

// Arithmetic (immediate): opc|100|010
const ADD_IMM_OPCODE: u32 = 0x22;
const ADDS_IMM_OPCODE: u32 = 0x62;
const SUB_IMM_OPCODE: u32 = 0xA2;
const SUBS_IMM_OPCODE: u32 = 0xE2;

// Wide move: opc|100|101
const MOVN_OPCODE: u32 = 0x25;
const MOVZ_OPCODE: u32 = 0xA5;
const MOVK_OPCODE: u32 = 0xE5;

// Arithmetic (register): opc|0|101|1xx0
const ADD_REG_OPCODE: u32 = 0x58;
const ADDS_REG_OPCODE: u32 = 0x158;
const SUB_REG_OPCODE: u32 = 0x258;
const SUBS_REG_OPCODE: u32 = 0x358;

// Logical (register): opc|0|101|0xxN
const AND_OPCODE: u32 = 0x50;
const BIC_OPCODE: u32 = 0x51;
const ORR_OPCODE: u32 = 0x150;
const ORN_OPCODE: u32 = 0x151;
const EOR_OPCODE: u32 = 0x250;
const EON_OPCODE: u32 = 0x251;
const ANDS_OPCODE: u32 = 0x350;
const BICS_OPCODE: u32 = 0x351;

// Multiply: opc|1|101|1000 — msub differs only in the x bit (15).
const MADD_OPCODE: u32 = 0xD8;

// Branch family base: 000101 at 31:26.
const BRANCH_OPC: u32 = 0x1400_0000;
const BRANCH_REG_MISC_BITS: u32 = 0x21F;

/// Encode one instruction at its assigned address.
///
/// # Errors
///
/// Returns [`AsmError`] for operand-shape mismatches, out-of-range fields,
/// misaligned offsets, and unresolved label operands.
pub fn encode(instr: &Instruction, address: u32) -> Result<u32, AsmError> {
    let instr = normalize(instr);
    match instr.mnemonic.category() {
        Category::DataProcessing => encode_data_processing(&instr),
        Category::LoadStore => encode_load_store(&instr, address),
        Category::Branch => encode_branch(&instr, address),
    }
}

/// Encode a `.int` directive: the literal value as a raw word.
#[inline]
#[must_use]
pub fn encode_directive(value: i32) -> u32 {
    value as u32
}

// ── Alias normalization ──────────────────────────────────────────────────

/// Rewrite alias mnemonics into canonical instructions.
///
/// Pure: returns a new instruction value, leaving the input untouched.
/// Non-alias instructions come back as a plain clone.
#[must_use]
pub fn normalize(instr: &Instruction) -> Instruction {
    let width = match instr.operands.first() {
        Some(Operand::Register(r)) => r.width,
        _ => Width::W64,
    };
    let zr = Operand::Register(Register::zr(width));

    let (mnemonic, operands) = match instr.mnemonic {
        // cmp/cmn Rn, op → subs/adds ZR, Rn, op
        Mnemonic::Cmp | Mnemonic::Cmn => {
            let canonical = if instr.mnemonic == Mnemonic::Cmp {
                Mnemonic::Subs
            } else {
                Mnemonic::Adds
            };
            let mut ops = Vec::with_capacity(instr.operands.len() + 1);
            ops.push(zr);
            ops.extend(instr.operands.iter().cloned());
            (canonical, ops)
        }
        // neg/negs Rd, op → sub/subs Rd, ZR, op
        Mnemonic::Neg | Mnemonic::Negs => {
            let canonical = if instr.mnemonic == Mnemonic::Neg {
                Mnemonic::Sub
            } else {
                Mnemonic::Subs
            };
            (canonical, with_second(&instr.operands, zr))
        }
        // tst Rn, Rm → ands ZR, Rn, Rm
        Mnemonic::Tst => {
            let mut ops = Vec::with_capacity(instr.operands.len() + 1);
            ops.push(zr);
            ops.extend(instr.operands.iter().cloned());
            (Mnemonic::Ands, ops)
        }
        // mvn Rd, Rm → orn Rd, ZR, Rm
        Mnemonic::Mvn => (Mnemonic::Orn, with_second(&instr.operands, zr)),
        // mov Rd, Rm → orr Rd, ZR, Rm
        Mnemonic::Mov => (Mnemonic::Orr, with_second(&instr.operands, zr)),
        // mul/mneg Rd, Rn, Rm → madd/msub Rd, Rn, Rm, ZR
        Mnemonic::Mul | Mnemonic::Mneg => {
            let canonical = if instr.mnemonic == Mnemonic::Mul {
                Mnemonic::Madd
            } else {
                Mnemonic::Msub
            };
            let mut ops = instr.operands.clone();
            ops.push(zr);
            (canonical, ops)
        }
        _ => return instr.clone(),
    };

    Instruction::new(mnemonic, operands, instr.span)
}

/// Insert `extra` after the first operand.
fn with_second(operands: &[Operand], extra: Operand) -> Vec<Operand> {
    let mut ops = Vec::with_capacity(operands.len() + 1);
    if let Some(first) = operands.first() {
        ops.push(first.clone());
    }
    ops.push(extra);
    ops.extend(operands.iter().skip(1).cloned());
    ops
}

// ── Operand access helpers ───────────────────────────────────────────────

fn invalid(instr: &Instruction, detail: &str) -> AsmError {
    AsmError::InvalidOperands {
        detail: format!("{}: {}", instr.mnemonic, detail),
        span: instr.span,
    }
}

fn get_register(instr: &Instruction, index: usize) -> Result<Register, AsmError> {
    match instr.operands.get(index) {
        Some(Operand::Register(r)) => Ok(*r),
        _ => Err(invalid(instr, "expected a register operand")),
    }
}

fn get_immediate(instr: &Instruction, index: usize) -> Result<u32, AsmError> {
    match instr.operands.get(index) {
        Some(Operand::Immediate(v)) => Ok(*v),
        _ => Err(invalid(instr, "expected an immediate operand")),
    }
}

fn get_shift(instr: &Instruction, index: usize) -> Option<(ShiftKind, u32)> {
    match instr.operands.get(index) {
        Some(Operand::Shift { kind, amount }) => Some((*kind, *amount)),
        _ => None,
    }
}

/// Resolve a branch/literal target that must already be an address.
fn get_address(instr: &Instruction, index: usize) -> Result<u32, AsmError> {
    match instr.operands.get(index) {
        Some(Operand::Address(a)) => Ok(*a),
        Some(Operand::Label(name)) => Err(AsmError::UndefinedLabel {
            label: name.clone(),
            span: instr.span,
        }),
        _ => Err(invalid(instr, "expected a resolved address operand")),
    }
}

// ── Data processing ──────────────────────────────────────────────────────

/// Whether the canonical instruction takes the register-form layout.
fn is_register_form(instr: &Instruction) -> bool {
    if instr.operands.len() < 2 {
        return false;
    }
    match instr.mnemonic {
        Mnemonic::Movn | Mnemonic::Movz | Mnemonic::Movk => false,
        Mnemonic::And
        | Mnemonic::Ands
        | Mnemonic::Bic
        | Mnemonic::Bics
        | Mnemonic::Eor
        | Mnemonic::Orr
        | Mnemonic::Eon
        | Mnemonic::Orn
        | Mnemonic::Madd
        | Mnemonic::Msub => true,
        Mnemonic::Add | Mnemonic::Adds | Mnemonic::Sub | Mnemonic::Subs => {
            matches!(instr.operands.get(2), Some(Operand::Register(_)))
        }
        _ => false,
    }
}

fn encode_data_processing(instr: &Instruction) -> Result<u32, AsmError> {
    let rd = get_register(instr, 0)?;
    let sf = rd.width.sf();

    // Common to both layouts: sf at 31, Rd at 4:0.
    let mut word;

    if is_register_form(instr) {
        let opcode = match instr.mnemonic {
            Mnemonic::Add => ADD_REG_OPCODE,
            Mnemonic::Adds => ADDS_REG_OPCODE,
            Mnemonic::Sub => SUB_REG_OPCODE,
            Mnemonic::Subs => SUBS_REG_OPCODE,
            Mnemonic::And => AND_OPCODE,
            Mnemonic::Bic => BIC_OPCODE,
            Mnemonic::Orr => ORR_OPCODE,
            Mnemonic::Orn => ORN_OPCODE,
            Mnemonic::Eor => EOR_OPCODE,
            Mnemonic::Eon => EON_OPCODE,
            Mnemonic::Ands => ANDS_OPCODE,
            Mnemonic::Bics => BICS_OPCODE,
            Mnemonic::Madd | Mnemonic::Msub => MADD_OPCODE,
            _ => return Err(invalid(instr, "not a register-form mnemonic")),
        };
        // sf|opcode(21:30)|Rm|…|Rn|Rd
        word = opcode << 21;
        word = insert32(word, 31, 31, sf);
        word = insert32(word, 0, 4, u32::from(rd.num));

        let rn = get_register(instr, 1)?;
        let rm = get_register(instr, 2)?;
        word = insert32(word, 5, 9, u32::from(rn.num));
        word = insert32(word, 16, 20, u32::from(rm.num));

        match instr.mnemonic {
            Mnemonic::Madd | Mnemonic::Msub => {
                // sf|0011011000|Rm|x|Ra|Rn|Rd
                if instr.operands.len() != 4 {
                    return Err(invalid(instr, "expected Rd, Rn, Rm, Ra"));
                }
                let ra = get_register(instr, 3)?;
                word = insert32(word, 10, 14, u32::from(ra.num));
                if instr.mnemonic == Mnemonic::Msub {
                    word = insert32(word, 15, 15, 1);
                }
            }
            _ => {
                // Optional shift suffix: kind at 23:22, amount at 15:10.
                if let Some((kind, amount)) = get_shift(instr, 3) {
                    let arithmetic = matches!(
                        instr.mnemonic,
                        Mnemonic::Add | Mnemonic::Adds | Mnemonic::Sub | Mnemonic::Subs
                    );
                    if kind == ShiftKind::Ror && arithmetic {
                        return Err(invalid(
                            instr,
                            "ror shifts are only allowed on logical instructions",
                        ));
                    }
                    let max = rd.width.bits() - 1;
                    if amount > max {
                        return Err(AsmError::ImmediateOverflow {
                            value: i64::from(amount),
                            min: 0,
                            max: i64::from(max),
                            span: instr.span,
                        });
                    }
                    word = insert32(word, 22, 23, kind.encoding());
                    word = insert32(word, 10, 15, amount);
                } else if instr.operands.len() > 3 {
                    return Err(invalid(instr, "too many operands"));
                }
            }
        }
    } else {
        match instr.mnemonic {
            Mnemonic::Movn | Mnemonic::Movz | Mnemonic::Movk => {
                let opcode = match instr.mnemonic {
                    Mnemonic::Movn => MOVN_OPCODE,
                    Mnemonic::Movz => MOVZ_OPCODE,
                    _ => MOVK_OPCODE,
                };
                // sf|opc100101|hw|imm16|Rd
                word = opcode << 23;
                word = insert32(word, 31, 31, sf);
                word = insert32(word, 0, 4, u32::from(rd.num));

                let imm16 = get_immediate(instr, 1)?;
                if imm16 > 0xFFFF {
                    return Err(AsmError::ImmediateOverflow {
                        value: i64::from(imm16),
                        min: 0,
                        max: 0xFFFF,
                        span: instr.span,
                    });
                }
                word = insert32(word, 5, 20, imm16);

                if let Some((kind, amount)) = get_shift(instr, 2) {
                    if kind != ShiftKind::Lsl || amount % 16 != 0 {
                        return Err(invalid(
                            instr,
                            "wide-move shift must be lsl by a multiple of 16",
                        ));
                    }
                    let hw = amount / 16;
                    let max_hw = if rd.width == Width::W64 { 3 } else { 1 };
                    if hw > max_hw {
                        return Err(AsmError::ImmediateOverflow {
                            value: i64::from(amount),
                            min: 0,
                            max: i64::from(max_hw * 16),
                            span: instr.span,
                        });
                    }
                    word = insert32(word, 21, 22, hw);
                }
            }
            Mnemonic::Add | Mnemonic::Adds | Mnemonic::Sub | Mnemonic::Subs => {
                let opcode = match instr.mnemonic {
                    Mnemonic::Add => ADD_IMM_OPCODE,
                    Mnemonic::Adds => ADDS_IMM_OPCODE,
                    Mnemonic::Sub => SUB_IMM_OPCODE,
                    _ => SUBS_IMM_OPCODE,
                };
                // sf|opc100010|sh|imm12|Rn|Rd
                word = opcode << 23;
                word = insert32(word, 31, 31, sf);
                word = insert32(word, 0, 4, u32::from(rd.num));

                let rn = get_register(instr, 1)?;
                word = insert32(word, 5, 9, u32::from(rn.num));

                let imm12 = get_immediate(instr, 2)?;
                if imm12 > 0xFFF {
                    return Err(AsmError::ImmediateOverflow {
                        value: i64::from(imm12),
                        min: 0,
                        max: 0xFFF,
                        span: instr.span,
                    });
                }
                word = insert32(word, 10, 21, imm12);

                if let Some((kind, amount)) = get_shift(instr, 3) {
                    if kind != ShiftKind::Lsl || (amount != 0 && amount != 12) {
                        return Err(invalid(
                            instr,
                            "arithmetic immediates only shift by lsl #12",
                        ));
                    }
                    if amount == 12 {
                        word = insert32(word, 22, 22, 1);
                    }
                }
            }
            _ => return Err(invalid(instr, "not an immediate-form mnemonic")),
        }
    }

    Ok(word)
}

// ── Load / store ─────────────────────────────────────────────────────────

fn encode_load_store(instr: &Instruction, address: u32) -> Result<u32, AsmError> {
    let rt = get_register(instr, 0)?;
    let sf = rt.width.sf();

    // Common skeleton: 11 at 28:27, sf at 30, Rt at 4:0.
    let mut word = 0;
    word = insert32(word, 27, 28, 0b11);
    word = insert32(word, 30, 30, sf);
    word = insert32(word, 0, 4, u32::from(rt.num));

    match instr.operands.get(1) {
        // PC-relative literal load: 0|sf|011000|simm19|Rt
        Some(Operand::Address(_)) | Some(Operand::Label(_)) => {
            if instr.mnemonic != Mnemonic::Ldr {
                return Err(invalid(instr, "only ldr has a literal form"));
            }
            let target = get_address(instr, 1)?;
            let disp = i64::from(target) - i64::from(address);
            if disp.unsigned_abs() > 1 << 20 {
                return Err(AsmError::OffsetOutOfRange {
                    disp,
                    max: 1 << 20,
                    span: instr.span,
                });
            }
            if disp % 4 != 0 {
                return Err(AsmError::Misaligned {
                    value: disp,
                    align: 4,
                    span: instr.span,
                });
            }
            let simm19 = (disp >> 2) as u32;
            word = insert32(word, 5, 23, simm19);
            return Ok(word);
        }
        Some(Operand::Mem { .. }) => {}
        _ => return Err(invalid(instr, "expected an address operand")),
    }

    // Single data transfer: 1|sf|111…, L at 22.
    word = insert32(word, 31, 31, 1);
    word = insert32(word, 29, 29, 1);
    let l_bit = u32::from(instr.mnemonic == Mnemonic::Ldr);
    word = insert32(word, 22, 22, l_bit);

    let Some(Operand::Mem { base, mode }) = instr.operands.get(1) else {
        return Err(invalid(instr, "expected an address operand"));
    };
    word = insert32(word, 5, 9, u32::from(*base));

    match *mode {
        AddrMode::PostIndex(simm9) | AddrMode::PreIndex(simm9) => {
            // I at 11 (1 = pre), marker at 10, simm9 at 20:12.
            if matches!(mode, AddrMode::PreIndex(_)) {
                word = insert32(word, 11, 11, 1);
            }
            word = insert32(word, 10, 10, 1);
            if simm9 <= -256 || simm9 >= 255 {
                return Err(AsmError::ImmediateOverflow {
                    value: i64::from(simm9),
                    min: -255,
                    max: 254,
                    span: instr.span,
                });
            }
            word = insert32(word, 12, 20, simm9 as u32);
        }
        AddrMode::RegisterOffset(rm) => {
            // 1 at 21, 11 at 14:13, 1 at 11, Rm at 20:16.
            word = insert32(word, 21, 21, 1);
            word = insert32(word, 13, 14, 0b11);
            word = insert32(word, 11, 11, 1);
            word = insert32(word, 16, 20, u32::from(rm));
        }
        AddrMode::UnsignedOffset(raw) => {
            // U at 24, imm12 at 21:10 scaled by the element size.
            let scale = if rt.width == Width::W64 { 8 } else { 4 };
            if raw % scale != 0 {
                return Err(AsmError::Misaligned {
                    value: i64::from(raw),
                    align: scale,
                    span: instr.span,
                });
            }
            let imm12 = raw / scale;
            if imm12 > 4095 {
                return Err(AsmError::ImmediateOverflow {
                    value: i64::from(raw),
                    min: 0,
                    max: i64::from(4095 * scale),
                    span: instr.span,
                });
            }
            word = insert32(word, 10, 21, imm12);
            word = insert32(word, 24, 24, 1);
        }
    }

    Ok(word)
}

// ── Branch ───────────────────────────────────────────────────────────────

fn encode_branch(instr: &Instruction, address: u32) -> Result<u32, AsmError> {
    let mut word = BRANCH_OPC;

    match instr.mnemonic {
        Mnemonic::B => {
            // 000101|simm26
            let offset = branch_offset(instr, address, 26)?;
            word |= (offset as u32) & 0x03FF_FFFF;
        }
        Mnemonic::Br => {
            // 1101011000111110000000|Rn|00000
            let rn = get_register(instr, 0)?;
            word = insert32(word, 30, 31, 0b11);
            word = insert32(word, 16, 25, BRANCH_REG_MISC_BITS);
            word = insert32(word, 5, 9, u32::from(rn.num));
        }
        Mnemonic::Bcond(cond) => {
            // 0101010|0|simm19|0|cond
            word = insert32(word, 30, 31, 0b01);
            let offset = branch_offset(instr, address, 19)?;
            word = insert32(word, 5, 23, offset as u32);
            word = insert32(word, 0, 3, cond.encoding());
        }
        _ => return Err(invalid(instr, "not a branch mnemonic")),
    }

    Ok(word)
}

/// Instruction-unit offset to the (resolved) target, range-checked against a
/// signed field of `field_bits`.
fn branch_offset(instr: &Instruction, address: u32, field_bits: u32) -> Result<i64, AsmError> {
    let target = get_address(instr, 0)?;
    let disp = i64::from(target) - i64::from(address);
    let offset = disp >> 2;
    let limit = 1i64 << (field_bits - 1);
    if offset <= -limit || offset > limit {
        return Err(AsmError::OffsetOutOfRange {
            disp,
            max: limit << 2,
            span: instr.span,
        });
    }
    // Round-trip the field width to drop high sign bits.
    Ok(sign_extend(offset as u64, field_bits))
}
