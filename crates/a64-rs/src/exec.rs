//! Fetch-decode-execute loop and the three instruction executors.
//!
//! Each step fetches a little-endian word at the program counter, tests for
//! the terminate pattern, and dispatches on the 4-bit category selector at
//! 28:25. The counter then advances by one instruction unless the executor
//! already redirected it (taken branch, register branch).
//!
//! All arithmetic runs at the operative width: 32-bit operations mask their
//! inputs up front and their result on write-back, with flags computed at
//! that width.

use crate::bits::{bit32, extract32, insert64, sign_extend};
use crate::cpu::{Machine, Pstate, TERMINATE};
use crate::error::EmuError;
use crate::ir::{Cond, ShiftKind};

const MASK32: u64 = 0xFFFF_FFFF;

// Category selector values (word bits 28:25).
const OP0_DP_IMM_A: u32 = 0x8;
const OP0_DP_IMM_B: u32 = 0x9;
const OP0_DP_REG_A: u32 = 0x5;
const OP0_DP_REG_B: u32 = 0xD;
const OP0_LS_A: u32 = 0x4;
const OP0_LS_B: u32 = 0x6;
const OP0_LS_C: u32 = 0xC;
const OP0_LS_D: u32 = 0xE;
const OP0_BRANCH_A: u32 = 0xA;
const OP0_BRANCH_B: u32 = 0xB;

// Data-processing (immediate) classes (word bits 25:23).
const OPI_ARITH: u32 = 0x2;
const OPI_WIDE_MOVE: u32 = 0x5;

// Multiply op field (word bits 30:21).
const OP_MULTIPLY: u32 = 0xD8;

/// Outcome of a single fetch-decode-execute step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// An instruction executed; the machine keeps running.
    Continue,
    /// The terminate pattern was fetched.
    Halted,
}

impl Machine {
    /// Execute one instruction.
    ///
    /// # Errors
    ///
    /// Returns [`EmuError`] on an unrecognized category or condition, a
    /// malformed word within a known category, or an out-of-bounds access.
    /// The machine should not be stepped further after an error.
    pub fn step(&mut self) -> Result<Step, EmuError> {
        let pc = self.pc();
        let word = self.read_word(pc)?;
        if word == TERMINATE {
            return Ok(Step::Halted);
        }

        let op0 = extract32(word, 25, 28);
        match op0 {
            OP0_DP_IMM_A | OP0_DP_IMM_B => exec_dp_immediate(self, word, pc)?,
            OP0_DP_REG_A | OP0_DP_REG_B => exec_dp_register(self, word, pc)?,
            OP0_LS_A | OP0_LS_B | OP0_LS_C | OP0_LS_D => exec_load_store(self, word, pc)?,
            OP0_BRANCH_A | OP0_BRANCH_B => exec_branch(self, word, pc)?,
            _ => {
                return Err(EmuError::UnknownCategory {
                    op0: op0 as u8,
                    word,
                    pc,
                })
            }
        }

        // Advance iff the executor did not already move the counter.
        if self.pc() == pc {
            self.set_pc(pc + 4);
        }
        Ok(Step::Continue)
    }

    /// Run until the terminate pattern is fetched.
    ///
    /// # Errors
    ///
    /// Stops with the first [`EmuError`] an instruction raises.
    pub fn run(&mut self) -> Result<(), EmuError> {
        while self.step()? == Step::Continue {}
        Ok(())
    }
}

/// Load a program image into a fresh machine and run it to the halt.
///
/// # Errors
///
/// Returns [`EmuError`] if the image does not fit or execution faults.
///
/// # Examples
///
/// ```rust
/// let code = a64_rs::assemble("movz x0, #7\nand x0, x0, x0").unwrap();
/// let machine = a64_rs::emulate(&code).unwrap();
/// assert_eq!(machine.reg(0), 7);
/// ```
pub fn emulate(image: &[u8]) -> Result<Machine, EmuError> {
    let mut machine = Machine::new();
    machine.load(image)?;
    machine.run()?;
    Ok(machine)
}

// ── Shared arithmetic ────────────────────────────────────────────────────

/// `lhs ± operand` at the operative width; the low opc bit requests flag
/// update, the high bit selects subtraction. Inputs must already be masked
/// for 32-bit operation; the result comes back masked.
fn arithmetic(machine: &mut Machine, lhs: u64, operand: u64, opc: u32, sf: bool) -> u64 {
    let update_flags = opc & 1 != 0;
    let is_sub = opc >> 1 != 0;

    if sf {
        let result = if is_sub {
            lhs.wrapping_sub(operand)
        } else {
            lhs.wrapping_add(operand)
        };
        if update_flags {
            let (c, v) = if is_sub {
                (
                    lhs >= operand,
                    (lhs as i64).overflowing_sub(operand as i64).1,
                )
            } else {
                (
                    lhs.checked_add(operand).is_none(),
                    (lhs as i64).overflowing_add(operand as i64).1,
                )
            };
            let flags = machine.pstate_mut();
            flags.n = result >> 63 != 0;
            flags.z = result == 0;
            flags.c = c;
            flags.v = v;
        }
        result
    } else {
        let l = lhs as u32;
        let o = operand as u32;
        let result = if is_sub {
            l.wrapping_sub(o)
        } else {
            l.wrapping_add(o)
        };
        if update_flags {
            let (c, v) = if is_sub {
                (l >= o, (l as i32).overflowing_sub(o as i32).1)
            } else {
                (l.checked_add(o).is_none(), (l as i32).overflowing_add(o as i32).1)
            };
            let flags = machine.pstate_mut();
            flags.n = result >> 31 != 0;
            flags.z = result == 0;
            flags.c = c;
            flags.v = v;
        }
        u64::from(result)
    }
}

/// Bitwise operation selected by opc; `ands` (0b11) sets N/Z and clears C/V.
fn logic(machine: &mut Machine, a: u64, b: u64, opc: u32, sf: bool) -> u64 {
    match opc {
        0b00 => a & b,
        0b01 => a | b,
        0b10 => a ^ b,
        _ => {
            let result = a & b;
            let flags = machine.pstate_mut();
            flags.n = result >> (if sf { 63 } else { 31 }) != 0;
            flags.z = result == 0;
            flags.c = false;
            flags.v = false;
            result
        }
    }
}

/// Apply a register-operand shift at the operative width.
fn apply_shift(
    value: u64,
    kind: ShiftKind,
    amount: u32,
    is_arith: bool,
    sf: bool,
    word: u32,
    pc: u64,
) -> Result<u64, EmuError> {
    let shifted = match kind {
        ShiftKind::Lsl => {
            let v = value << amount;
            if sf {
                v
            } else {
                v & MASK32
            }
        }
        ShiftKind::Lsr => value >> amount,
        ShiftKind::Asr => {
            if sf {
                ((value as i64) >> amount) as u64
            } else {
                (((value as u32) as i32) >> amount) as u32 as u64
            }
        }
        ShiftKind::Ror => {
            if is_arith {
                return Err(EmuError::Decode {
                    detail: "rotate-right on an arithmetic opcode".into(),
                    word,
                    pc,
                });
            }
            let width = if sf { 64 } else { 32 };
            let rotated = (value >> amount) | (value << (width - amount));
            if sf {
                rotated
            } else {
                rotated & MASK32
            }
        }
    };
    Ok(shifted)
}

// ── Data processing (immediate) ──────────────────────────────────────────

fn exec_dp_immediate(machine: &mut Machine, word: u32, pc: u64) -> Result<(), EmuError> {
    let sf = bit32(word, 31);
    let opc = extract32(word, 29, 30);
    let opi = extract32(word, 23, 25);
    let rd = extract32(word, 0, 4) as u8;

    match opi {
        OPI_ARITH => {
            let sh = bit32(word, 22);
            let imm12 = u64::from(extract32(word, 10, 21));
            let rn = extract32(word, 5, 9) as u8;

            let operand = if sh { imm12 << 12 } else { imm12 };
            let mut lhs = machine.reg(rn);
            if !sf {
                lhs &= MASK32;
            }

            let result = arithmetic(machine, lhs, operand, opc, sf);
            machine.set_reg(rd, result);
            Ok(())
        }
        OPI_WIDE_MOVE => {
            let hw = extract32(word, 21, 22);
            let imm16 = u64::from(extract32(word, 5, 20));

            if !sf && hw > 1 {
                return Err(EmuError::Decode {
                    detail: "wide move halfword position exceeds 32-bit width".into(),
                    word,
                    pc,
                });
            }

            let shift = hw * 16;
            let operand = imm16 << shift;
            let result = match opc {
                0b00 => !operand,
                0b10 => operand,
                0b11 => insert64(machine.reg(rd), shift, shift + 15, imm16),
                _ => {
                    return Err(EmuError::Decode {
                        detail: "unsupported wide move opcode".into(),
                        word,
                        pc,
                    })
                }
            };
            machine.set_reg(rd, if sf { result } else { result & MASK32 });
            Ok(())
        }
        _ => Err(EmuError::Decode {
            detail: "unknown data-processing-immediate class".into(),
            word,
            pc,
        }),
    }
}

// ── Data processing (register) ───────────────────────────────────────────

fn exec_dp_register(machine: &mut Machine, word: u32, pc: u64) -> Result<(), EmuError> {
    let sf = bit32(word, 31);
    let opc = extract32(word, 29, 30);
    let rd = extract32(word, 0, 4) as u8;

    let mut a = machine.reg(extract32(word, 5, 9) as u8);
    let mut b = machine.reg(extract32(word, 16, 20) as u8);
    if !sf {
        a &= MASK32;
        b &= MASK32;
    }

    let result = if bit32(word, 28) {
        // Multiply: accumulate ± (a*b), flags suppressed.
        if extract32(word, 21, 30) != OP_MULTIPLY {
            return Err(EmuError::Decode {
                detail: "invalid multiply op field".into(),
                word,
                pc,
            });
        }
        let mut acc = machine.reg(extract32(word, 10, 14) as u8);
        let mut product = a.wrapping_mul(b);
        if !sf {
            acc &= MASK32;
            product &= MASK32;
        }
        // The x bit routes into the sub/add selector with flag update off.
        let x = u32::from(bit32(word, 15));
        arithmetic(machine, acc, product, x << 1, sf)
    } else {
        let is_arith = bit32(word, 24);
        let negate = bit32(word, 21);
        let amount = extract32(word, 10, 15);
        if amount >= if sf { 64 } else { 32 } {
            return Err(EmuError::Decode {
                detail: "shift amount exceeds register width".into(),
                word,
                pc,
            });
        }
        let kind = match extract32(word, 22, 23) {
            0b00 => ShiftKind::Lsl,
            0b01 => ShiftKind::Lsr,
            0b10 => ShiftKind::Asr,
            _ => ShiftKind::Ror,
        };
        if amount != 0 {
            b = apply_shift(b, kind, amount, is_arith, sf, word, pc)?;
        }

        if is_arith {
            if negate {
                return Err(EmuError::Decode {
                    detail: "arithmetic register op with the N bit set".into(),
                    word,
                    pc,
                });
            }
            arithmetic(machine, a, b, opc, sf)
        } else {
            if negate {
                b = !b;
                if !sf {
                    b &= MASK32;
                }
            }
            logic(machine, a, b, opc, sf)
        }
    };

    machine.set_reg(rd, if sf { result } else { result & MASK32 });
    Ok(())
}

// ── Load / store ─────────────────────────────────────────────────────────

fn exec_load_store(machine: &mut Machine, word: u32, pc: u64) -> Result<(), EmuError> {
    let sf = bit32(word, 30);
    let rt = extract32(word, 0, 4) as u8;
    let size: usize = if sf { 8 } else { 4 };

    let (target, literal) = if bit32(word, 31) {
        (transfer_address(machine, word, size), false)
    } else {
        // Load literal: target = PC + simm19 * 4.
        let simm19 = u64::from(extract32(word, 5, 23));
        let target = (pc as i64).wrapping_add(sign_extend(simm19, 19).wrapping_mul(4)) as u64;
        (target, true)
    };

    if bit32(word, 22) || literal {
        let value = machine.read_mem(target, size)?;
        machine.set_reg(rt, value);
    } else {
        machine.write_mem(target, size, machine.reg(rt))?;
    }
    Ok(())
}

/// Compute the transfer address for the four bracketed modes, performing
/// pre/post-index write-back to the base register.
fn transfer_address(machine: &mut Machine, word: u32, size: usize) -> u64 {
    let xn = extract32(word, 5, 9) as u8;
    let base = machine.reg(xn);

    if bit32(word, 24) {
        // Unsigned offset: imm12 scaled by the element size.
        let imm12 = u64::from(extract32(word, 10, 21));
        base.wrapping_add(imm12 * size as u64)
    } else if bit32(word, 21) {
        // Register offset, unscaled.
        let xm = extract32(word, 16, 20) as u8;
        base.wrapping_add(machine.reg(xm))
    } else {
        // Pre/post-index: base + simm9, written back to the base register.
        let simm9 = sign_extend(u64::from(extract32(word, 12, 20)), 9);
        let indexed = (base as i64).wrapping_add(simm9) as u64;
        machine.set_reg(xn, indexed);
        if bit32(word, 11) {
            indexed // pre-index: use the updated address
        } else {
            base // post-index: use the original base
        }
    }
}

// ── Branch ───────────────────────────────────────────────────────────────

fn exec_branch(machine: &mut Machine, word: u32, pc: u64) -> Result<(), EmuError> {
    match extract32(word, 30, 31) {
        0b00 => {
            // Unconditional: PC += simm26 * 4.
            let simm26 = sign_extend(u64::from(extract32(word, 0, 25)), 26);
            machine.set_pc((pc as i64).wrapping_add(simm26.wrapping_mul(4)) as u64);
            Ok(())
        }
        0b11 => {
            // Register branch.
            let xn = extract32(word, 5, 9) as u8;
            machine.set_pc(machine.reg(xn));
            Ok(())
        }
        0b01 => {
            let cond_bits = extract32(word, 0, 3);
            let Some(cond) = Cond::from_encoding(cond_bits) else {
                return Err(EmuError::UnknownCondition {
                    cond: cond_bits as u8,
                    pc,
                });
            };
            if condition_holds(cond, machine.pstate()) {
                let simm19 = sign_extend(u64::from(extract32(word, 5, 23)), 19);
                machine.set_pc((pc as i64).wrapping_add(simm19.wrapping_mul(4)) as u64);
            }
            Ok(())
        }
        _ => Err(EmuError::Decode {
            detail: "unallocated branch type".into(),
            word,
            pc,
        }),
    }
}

/// Evaluate a condition against the current flags.
fn condition_holds(cond: Cond, p: Pstate) -> bool {
    match cond {
        Cond::Eq => p.z,
        Cond::Ne => !p.z,
        Cond::Ge => p.n == p.v,
        Cond::Lt => p.n != p.v,
        Cond::Gt => !p.z && p.n == p.v,
        Cond::Le => p.z || p.n != p.v,
        Cond::Al => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Load raw words at address 0 and run the machine to the halt.
    fn run_words(words: &[u32]) -> Machine {
        let mut image = alloc::vec::Vec::new();
        for w in words {
            image.extend_from_slice(&w.to_le_bytes());
        }
        image.extend_from_slice(&TERMINATE.to_le_bytes());
        emulate(&image).unwrap()
    }

    #[test]
    fn halts_immediately_on_terminate() {
        let m = run_words(&[]);
        assert_eq!(m.pc(), 0);
        assert!(m.pstate().z);
    }

    #[test]
    fn movz_then_add_register() {
        // movz x0, #5 ; movz x1, #3 ; add x0, x0, x1
        let m = run_words(&[0xD280_00A0, 0xD280_0061, 0x8B01_0000]);
        assert_eq!(m.reg(0), 8);
        assert_eq!(m.reg(1), 3);
        assert_eq!(m.pc(), 12);
    }

    #[test]
    fn add_immediate_with_lsl12() {
        // add x0, xzr, #1, lsl #12
        let word = 0x9100_0000 | (1 << 22) | (1 << 10) | (31 << 5);
        let m = run_words(&[word]);
        assert_eq!(m.reg(0), 0x1000);
    }

    #[test]
    fn subs_zero_sets_z_and_c() {
        // subs x0, x0, x0
        let m = run_words(&[0xEB00_0000]);
        assert_eq!(m.reg(0), 0);
        let p = m.pstate();
        assert!(p.z);
        assert!(p.c);
        assert!(!p.n);
        assert!(!p.v);
    }

    #[test]
    fn subs_negative_result_flags() {
        // movz x1, #1 ; subs x0, xzr, x1  → result = -1
        let subs = 0xEB00_0000 | (1 << 16) | (31 << 5);
        let m = run_words(&[0xD280_0021, subs]);
        assert_eq!(m.reg(0), u64::MAX);
        let p = m.pstate();
        assert!(p.n);
        assert!(!p.z);
        assert!(!p.c); // borrow
        assert!(!p.v);
    }

    #[test]
    fn adds_unsigned_carry_32bit() {
        // movn w1, #0 (w1 = 0xFFFF_FFFF) ; adds w0, w1, #1
        let movn = 0x1280_0001;
        let adds = 0x3100_0400 | (1 << 5);
        let m = run_words(&[movn, adds]);
        assert_eq!(m.reg(0), 0);
        let p = m.pstate();
        assert!(p.z);
        assert!(p.c);
        assert!(!p.v);
    }

    #[test]
    fn signed_overflow_64bit() {
        // movn x1, #0x8000, lsl #48 → x1 = !(0x8000 << 48) = i64::MAX
        // adds x0, x1, #1 → signed overflow
        let movn = 0x9280_0000 | (3 << 21) | (0x8000 << 5) | 1;
        let adds = 0xB100_0400 | (1 << 5);
        let m = run_words(&[movn, adds]);
        assert_eq!(m.reg(0), 0x8000_0000_0000_0000);
        let p = m.pstate();
        assert!(p.v);
        assert!(p.n);
        assert!(!p.c);
    }

    #[test]
    fn wide_move_keep_inserts_field() {
        // movz x0, #0xAAAA ; movk x0, #0xBBBB, lsl #16
        let movz = 0xD280_0000 | (0xAAAA << 5);
        let movk = 0xF280_0000 | (1 << 21) | (0xBBBB << 5);
        let m = run_words(&[movz, movk]);
        assert_eq!(m.reg(0), 0xBBBB_AAAA);
    }

    #[test]
    fn movn_inverts() {
        // movn w0, #5 → w0 = !5 masked to 32 bits
        let m = run_words(&[0x1280_0000 | (5 << 5)]);
        assert_eq!(m.reg(0), 0xFFFF_FFFA);
    }

    #[test]
    fn logical_ops_and_flags() {
        // movz x1, #0xF0F0 ; movz x2, #0xFF00 ; ands x0, x1, x2
        let movz1 = 0xD280_0000 | (0xF0F0 << 5) | 1;
        let movz2 = 0xD280_0000 | (0xFF00 << 5) | 2;
        let ands = 0xEA00_0000 | (2 << 16) | (1 << 5);
        let m = run_words(&[movz1, movz2, ands]);
        assert_eq!(m.reg(0), 0xF000);
        assert!(!m.pstate().z);
        assert!(!m.pstate().n);
        assert!(!m.pstate().c);
        assert!(!m.pstate().v);
    }

    #[test]
    fn orn_computes_not() {
        // movz x1, #0xFFFF ; orn x0, xzr, x1 → !0xFFFF
        let movz = 0xD280_0000 | (0xFFFF << 5) | 1;
        let orn = 0xAA20_0000 | (1 << 16) | (31 << 5);
        let m = run_words(&[movz, orn]);
        assert_eq!(m.reg(0), !0xFFFFu64);
    }

    #[test]
    fn shifted_register_operand() {
        // movz x1, #1 ; add x0, xzr, x1, lsl #4
        let movz = 0xD280_0020 | 1;
        let add = 0x8B00_0000 | (1 << 16) | (4 << 10) | (31 << 5);
        let m = run_words(&[movz, add]);
        assert_eq!(m.reg(0), 16);
    }

    #[test]
    fn asr_preserves_sign() {
        // movn x1, #0 (x1 = -1) ; add x0, xzr, x1, asr #8 → still -1
        let movn = 0x9280_0000 | 1;
        let add = 0x8B00_0000 | (0b10 << 22) | (1 << 16) | (8 << 10) | (31 << 5);
        let m = run_words(&[movn, add]);
        assert_eq!(m.reg(0), u64::MAX);
    }

    #[test]
    fn ror_on_logical_rotates() {
        // movz w1, #0b11 ; orr w0, wzr, w1, ror #1
        let movz = 0x5280_0000 | (0b11 << 5) | 1;
        let orr = 0x2A00_0000 | (0b11 << 22) | (1 << 16) | (1 << 10) | (31 << 5);
        let m = run_words(&[movz, orr]);
        assert_eq!(m.reg(0), 0x8000_0001);
    }

    #[test]
    fn ror_on_arithmetic_is_decode_error() {
        // add x0, x0, x1, ror #1 — unencodable by the assembler, decodable by bits.
        let add: u32 = 0x8B00_0000 | (0b11 << 22) | (1 << 16) | (1 << 10);
        let mut image = alloc::vec::Vec::new();
        image.extend_from_slice(&add.to_le_bytes());
        assert!(matches!(
            emulate(&image),
            Err(EmuError::Decode { .. })
        ));
    }

    #[test]
    fn multiply_accumulate_and_negate() {
        // movz x1, #6 ; movz x2, #7 ; madd x0, x1, x2, xzr → 42
        let movz1 = 0xD280_00C1;
        let movz2 = 0xD280_00E2;
        let madd = 0x9B02_0000 | (31 << 10) | (1 << 5);
        let m = run_words(&[movz1, movz2, madd]);
        assert_eq!(m.reg(0), 42);

        // msub x3, x1, x2, xzr → -42
        let msub = 0x9B02_8000 | (31 << 10) | (1 << 5) | 3;
        let m = run_words(&[movz1, movz2, msub]);
        assert_eq!(m.reg(3), (-42i64) as u64);
    }

    #[test]
    fn multiply_leaves_flags_alone() {
        // subs x0, x0, x0 sets Z and C; mul must not touch them.
        let subs = 0xEB00_0000;
        let movz = 0xD280_00C1; // x1 = 6
        let madd = 0x9B01_0000 | (31 << 10) | (1 << 5) | 2; // x2 = x1*x1
        let m = run_words(&[subs, movz, madd]);
        assert_eq!(m.reg(2), 36);
        assert!(m.pstate().z);
        assert!(m.pstate().c);
    }

    #[test]
    fn store_then_load_round_trips() {
        // movz x0, #0xBEEF ; movz x1, #0x100 ; str x0, [x1] ; ldr x2, [x1]
        let movz0 = 0xD280_0000 | (0xBEEF << 5);
        let movz1 = 0xD280_0000 | (0x100 << 5) | 1;
        let str_ = 0xF900_0000 | (1 << 5);
        let ldr = 0xF940_0000 | (1 << 5) | 2;
        let m = run_words(&[movz0, movz1, str_, ldr]);
        assert_eq!(m.reg(2), 0xBEEF);
        assert_eq!(m.read_mem(0x100, 8).unwrap(), 0xBEEF);
    }

    #[test]
    fn unsigned_offset_scales_by_element_size() {
        // movz x1, #0x100 ; str x1, [x1, #8]  (imm12 = 1 → byte offset 8)
        let movz1 = 0xD280_0000 | (0x100 << 5) | 1;
        let str_ = 0xF900_0000 | (1 << 10) | (1 << 5) | 1;
        let m = run_words(&[movz1, str_]);
        assert_eq!(m.read_mem(0x108, 8).unwrap(), 0x100);
    }

    #[test]
    fn pre_index_writes_back_before_use() {
        // movz x1, #0x100 ; movz x0, #1 ; str x0, [x1, #8]!
        let movz1 = 0xD280_0000 | (0x100 << 5) | 1;
        let movz0 = 0xD280_0020;
        let str_ = 0xF800_0C00 | (8 << 12) | (1 << 5);
        let m = run_words(&[movz1, movz0, str_]);
        assert_eq!(m.reg(1), 0x108);
        assert_eq!(m.read_mem(0x108, 8).unwrap(), 1);
    }

    #[test]
    fn post_index_writes_back_after_use() {
        // movz x1, #0x100 ; movz x0, #1 ; str x0, [x1], #8
        let movz1 = 0xD280_0000 | (0x100 << 5) | 1;
        let movz0 = 0xD280_0020;
        let str_ = 0xF800_0400 | (8 << 12) | (1 << 5);
        let m = run_words(&[movz1, movz0, str_]);
        assert_eq!(m.reg(1), 0x108);
        assert_eq!(m.read_mem(0x100, 8).unwrap(), 1);
        assert_eq!(m.read_mem(0x108, 8).unwrap(), 0);
    }

    #[test]
    fn negative_post_index_offset() {
        // movz x1, #0x100 ; ldr x0, [x1], #-16
        let movz1 = 0xD280_0000 | (0x100 << 5) | 1;
        let simm9 = (-16i32 as u32) & 0x1FF;
        let ldr = 0xF840_0400 | (simm9 << 12) | (1 << 5);
        let m = run_words(&[movz1, ldr]);
        assert_eq!(m.reg(1), 0xF0);
    }

    #[test]
    fn register_offset_addressing() {
        // movz x1, #0x100 ; movz x2, #0x20 ; movz x0, #9 ; str x0, [x1, x2]
        let movz1 = 0xD280_0000 | (0x100 << 5) | 1;
        let movz2 = 0xD280_0000 | (0x20 << 5) | 2;
        let movz0 = 0xD280_0000 | (9 << 5);
        let str_ = 0xF820_6800 | (2 << 16) | (1 << 5);
        let m = run_words(&[movz1, movz2, movz0, str_]);
        assert_eq!(m.read_mem(0x120, 8).unwrap(), 9);
    }

    #[test]
    fn literal_load_is_pc_relative() {
        // ldr x0, +8 (simm19 = 2) at pc 0 reads the word pair at 8.
        let ldr = 0x5800_0000 | (2 << 5);
        let halt_then_data = [ldr, TERMINATE, 0x1234_5678, 0x9ABC_DEF0];
        let mut image = alloc::vec::Vec::new();
        for w in halt_then_data {
            image.extend_from_slice(&w.to_le_bytes());
        }
        let m = emulate(&image).unwrap();
        assert_eq!(m.reg(0), 0x9ABC_DEF0_1234_5678);
    }

    #[test]
    fn load_32bit_zero_extends() {
        // movz x1, #0x100 ; movn x0, #0 ; str x0, [x1] ; ldr w2, [x1]
        let movz1 = 0xD280_0000 | (0x100 << 5) | 1;
        let movn0 = 0x9280_0000;
        let str_ = 0xF900_0000 | (1 << 5);
        let ldr_w = 0xB940_0000 | (1 << 5) | 2;
        let m = run_words(&[movz1, movn0, str_, ldr_w]);
        assert_eq!(m.reg(2), 0xFFFF_FFFF);
    }

    #[test]
    fn out_of_bounds_access_faults() {
        // movn x1, #0 (x1 = huge) ; ldr x0, [x1]
        let movn: u32 = 0x9280_0001;
        let ldr = 0xF940_0000 | (1 << 5);
        let mut image = alloc::vec::Vec::new();
        for w in [movn, ldr] {
            image.extend_from_slice(&w.to_le_bytes());
        }
        assert!(matches!(
            emulate(&image),
            Err(EmuError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn unconditional_branch_redirects() {
        // b +8 ; movz x0, #1 (skipped) ; movz x1, #2
        let b = 0x1400_0002;
        let m = run_words(&[b, 0xD280_0020, 0xD280_0041]);
        assert_eq!(m.reg(0), 0);
        assert_eq!(m.reg(1), 2);
    }

    #[test]
    fn conditional_branch_taken_on_startup_z() {
        // b.eq +8 skips one instruction thanks to the startup Z flag.
        let beq = 0x5400_0040;
        let m = run_words(&[beq, 0xD280_0020, 0xD280_0041]);
        assert_eq!(m.reg(0), 0);
        assert_eq!(m.reg(1), 2);
    }

    #[test]
    fn conditional_branch_not_taken_falls_through() {
        // b.ne +8 is not taken at startup (Z set).
        let bne = 0x5400_0041;
        let m = run_words(&[bne, 0xD280_0020, 0xD280_0041]);
        assert_eq!(m.reg(0), 1);
        assert_eq!(m.reg(1), 2);
    }

    #[test]
    fn signed_conditions() {
        // movz x1, #5 ; subs x0, xzr, x1 (result -5) ; b.lt +8 ; movz x2, #1 ; movz x3, #2
        let movz1 = 0xD280_00A1;
        let subs = 0xEB01_03E0;
        let blt = 0x5400_004B;
        let m = run_words(&[movz1, subs, blt, 0xD280_0022, 0xD280_0043]);
        assert_eq!(m.reg(2), 0);
        assert_eq!(m.reg(3), 2);
    }

    #[test]
    fn register_branch_jumps_to_register_value() {
        // movz x1, #16 ; br x1 ; (skipped) ; movz x0, #1 at 16
        let movz1 = 0xD280_0201;
        let br = 0xD61F_0020;
        let m = run_words(&[movz1, br, 0xD280_0BBF, 0xD280_0BBF, 0xD280_0020]);
        assert_eq!(m.reg(0), 1);
    }

    #[test]
    fn backward_branch_loops() {
        // movz x0, #3          ; counter
        // loop: subs x0, x0, #1
        // b.ne loop            ; at 8, offset -1
        let movz = 0xD280_0060;
        let subs = 0xF100_0400;
        let simm19 = (-1i32 as u32) & 0x7_FFFF;
        let bne = 0x5400_0001 | (simm19 << 5);
        let m = run_words(&[movz, subs, bne]);
        assert_eq!(m.reg(0), 0);
        assert!(m.pstate().z);
    }

    #[test]
    fn unknown_category_is_fatal() {
        // op0 = 0x7 is unallocated.
        let word: u32 = 0x7 << 25;
        let mut image = alloc::vec::Vec::new();
        image.extend_from_slice(&word.to_le_bytes());
        assert!(matches!(
            emulate(&image),
            Err(EmuError::UnknownCategory { op0: 0x7, .. })
        ));
    }

    #[test]
    fn unknown_condition_is_fatal() {
        // Condition 0x5 is outside the supported set.
        let bad: u32 = 0x5400_0045;
        let mut image = alloc::vec::Vec::new();
        image.extend_from_slice(&bad.to_le_bytes());
        assert!(matches!(
            emulate(&image),
            Err(EmuError::UnknownCondition { cond: 0x5, .. })
        ));
    }

    #[test]
    fn writes_to_zero_register_discarded() {
        // movz xzr, #7 then use xzr: add x0, xzr, #0
        let movz_zr = 0xD280_00FF; // movz xzr, #7
        let add = 0x9100_0000 | (31 << 5);
        let m = run_words(&[movz_zr, add]);
        assert_eq!(m.reg(0), 0);
    }

    #[test]
    fn fetch_past_memory_end_faults() {
        // A single branch to the top of memory, then fetch fails bounds.
        let mut m = Machine::new();
        m.set_pc(crate::cpu::MEMORY_SIZE as u64 - 2);
        assert!(matches!(m.step(), Err(EmuError::OutOfBounds { .. })));
    }
}
