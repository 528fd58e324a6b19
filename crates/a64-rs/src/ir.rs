//! Intermediate representation shared by the parser, encoder, and executors.
//!
//! Each source line parses to a [`Line`]; instructions carry a closed
//! [`Mnemonic`] and up to five [`Operand`]s whose count and kinds are
//! validated at encode time, because alias rewriting changes arity.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::error::Span;

/// Register index whose reads yield zero and whose writes are discarded.
pub const ZERO_REG: u8 = 31;

/// Operand width: W registers operate on the low 32 bits, X on all 64.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Width {
    /// 32-bit (`w` registers).
    W32,
    /// 64-bit (`x` registers).
    W64,
}

impl Width {
    /// The `sf` encoding bit: 1 for 64-bit, 0 for 32-bit.
    #[inline]
    #[must_use]
    pub fn sf(self) -> u32 {
        match self {
            Width::W64 => 1,
            Width::W32 => 0,
        }
    }

    /// Width in bits.
    #[inline]
    #[must_use]
    pub fn bits(self) -> u32 {
        match self {
            Width::W64 => 64,
            Width::W32 => 32,
        }
    }
}

/// A general-purpose register reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Register {
    /// Register index 0–31; 31 is the zero register.
    pub num: u8,
    /// Operand width selected by the `x`/`w` name prefix.
    pub width: Width,
}

impl Register {
    /// 64-bit register `x<num>`.
    #[must_use]
    pub fn x(num: u8) -> Self {
        Self {
            num,
            width: Width::W64,
        }
    }

    /// 32-bit register `w<num>`.
    #[must_use]
    pub fn w(num: u8) -> Self {
        Self {
            num,
            width: Width::W32,
        }
    }

    /// The 64-bit zero register `xzr`.
    #[must_use]
    pub fn xzr() -> Self {
        Self::x(ZERO_REG)
    }

    /// The zero register at the given width.
    #[must_use]
    pub fn zr(width: Width) -> Self {
        Self {
            num: ZERO_REG,
            width,
        }
    }

    /// Whether this is the read-as-zero / discard-on-write register.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.num == ZERO_REG
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.width {
            Width::W64 => 'x',
            Width::W32 => 'w',
        };
        if self.is_zero() {
            write!(f, "{}zr", prefix)
        } else {
            write!(f, "{}{}", prefix, self.num)
        }
    }
}

/// Shift applied to a register-form operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ShiftKind {
    /// Logical shift left.
    Lsl,
    /// Logical shift right.
    Lsr,
    /// Arithmetic (sign-preserving) shift right.
    Asr,
    /// Rotate right — logical operations only.
    Ror,
}

impl ShiftKind {
    /// The 2-bit wire encoding.
    #[inline]
    #[must_use]
    pub fn encoding(self) -> u32 {
        match self {
            ShiftKind::Lsl => 0b00,
            ShiftKind::Lsr => 0b01,
            ShiftKind::Asr => 0b10,
            ShiftKind::Ror => 0b11,
        }
    }

    /// Decode the 2-bit wire encoding.
    #[must_use]
    pub fn from_encoding(bits: u32) -> Option<Self> {
        match bits {
            0b00 => Some(ShiftKind::Lsl),
            0b01 => Some(ShiftKind::Lsr),
            0b10 => Some(ShiftKind::Asr),
            0b11 => Some(ShiftKind::Ror),
            _ => None,
        }
    }

    /// Parse a shift keyword.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "lsl" => Some(ShiftKind::Lsl),
            "lsr" => Some(ShiftKind::Lsr),
            "asr" => Some(ShiftKind::Asr),
            "ror" => Some(ShiftKind::Ror),
            _ => None,
        }
    }
}

impl fmt::Display for ShiftKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShiftKind::Lsl => write!(f, "lsl"),
            ShiftKind::Lsr => write!(f, "lsr"),
            ShiftKind::Asr => write!(f, "asr"),
            ShiftKind::Ror => write!(f, "ror"),
        }
    }
}

/// Branch condition, with its fixed 4-bit wire encoding.
///
/// The mapping is an explicit match in both directions; nothing depends on
/// declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Cond {
    /// Equal (`Z`).
    Eq,
    /// Not equal (`!Z`).
    Ne,
    /// Signed greater or equal (`N == V`).
    Ge,
    /// Signed less than (`N != V`).
    Lt,
    /// Signed greater than (`!Z && N == V`).
    Gt,
    /// Signed less or equal (`Z || N != V`).
    Le,
    /// Always.
    Al,
}

impl Cond {
    /// The 4-bit wire encoding.
    #[must_use]
    pub fn encoding(self) -> u32 {
        match self {
            Cond::Eq => 0x0,
            Cond::Ne => 0x1,
            Cond::Ge => 0xA,
            Cond::Lt => 0xB,
            Cond::Gt => 0xC,
            Cond::Le => 0xD,
            Cond::Al => 0xE,
        }
    }

    /// Decode the 4-bit wire encoding.
    #[must_use]
    pub fn from_encoding(bits: u32) -> Option<Self> {
        match bits {
            0x0 => Some(Cond::Eq),
            0x1 => Some(Cond::Ne),
            0xA => Some(Cond::Ge),
            0xB => Some(Cond::Lt),
            0xC => Some(Cond::Gt),
            0xD => Some(Cond::Le),
            0xE => Some(Cond::Al),
            _ => None,
        }
    }

    /// The mnemonic suffix (`eq` in `b.eq`).
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Cond::Eq => "eq",
            Cond::Ne => "ne",
            Cond::Ge => "ge",
            Cond::Lt => "lt",
            Cond::Gt => "gt",
            Cond::Le => "le",
            Cond::Al => "al",
        }
    }

    /// Parse a mnemonic suffix.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "eq" => Some(Cond::Eq),
            "ne" => Some(Cond::Ne),
            "ge" => Some(Cond::Ge),
            "lt" => Some(Cond::Lt),
            "gt" => Some(Cond::Gt),
            "le" => Some(Cond::Le),
            "al" => Some(Cond::Al),
            _ => None,
        }
    }
}

impl fmt::Display for Cond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

/// Addressing mode of a bracketed memory operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AddrMode {
    /// `[Xn], #simm` — use base, then write `base + simm` back.
    PostIndex(i32),
    /// `[Xn, #simm]!` — write `base + simm` back, then use it.
    PreIndex(i32),
    /// `[Xn {, #imm}]` — `base + imm`, imm scaled by element size on the wire.
    UnsignedOffset(u32),
    /// `[Xn, Xm]` — `base + Xm`, unscaled.
    RegisterOffset(u8),
}

/// A single instruction operand.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operand {
    /// A register reference.
    Register(Register),
    /// An unsigned immediate (`#imm`). Signed offsets travel inside
    /// [`AddrMode`].
    Immediate(u32),
    /// A shift suffix: kind plus amount.
    Shift {
        /// Shift kind.
        kind: ShiftKind,
        /// Shift amount in bits.
        amount: u32,
    },
    /// An unresolved label reference. Must be rewritten to [`Operand::Address`]
    /// before encoding.
    Label(String),
    /// A resolved literal address.
    Address(u32),
    /// A bracketed memory operand: base register plus addressing mode.
    Mem {
        /// Base register index (always a 64-bit register).
        base: u8,
        /// Offset form and value.
        mode: AddrMode,
    },
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Register(r) => write!(f, "{}", r),
            Operand::Immediate(v) => write!(f, "#{:#x}", v),
            Operand::Shift { kind, amount } => write!(f, "{} #{}", kind, amount),
            Operand::Label(name) => write!(f, "{}", name),
            Operand::Address(a) => write!(f, "{:#x}", a),
            Operand::Mem { base, mode } => match mode {
                AddrMode::PostIndex(simm) => write!(f, "[x{}], #{}", base, simm),
                AddrMode::PreIndex(simm) => write!(f, "[x{}, #{}]!", base, simm),
                AddrMode::UnsignedOffset(imm) => write!(f, "[x{}, #{}]", base, imm),
                AddrMode::RegisterOffset(rm) => write!(f, "[x{}, x{}]", base, rm),
            },
        }
    }
}

/// Top-level instruction category, selecting the encoder and executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Category {
    /// Arithmetic, logical, wide-move, and multiply instructions.
    DataProcessing,
    /// Loads and stores, including the PC-relative literal form.
    LoadStore,
    /// Unconditional, register, and conditional branches.
    Branch,
}

/// The closed mnemonic set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mnemonic {
    /// Add.
    Add,
    /// Add, setting flags.
    Adds,
    /// Subtract.
    Sub,
    /// Subtract, setting flags.
    Subs,
    /// Compare — alias of `subs` with a zero destination.
    Cmp,
    /// Compare negative — alias of `adds` with a zero destination.
    Cmn,
    /// Negate — alias of `sub` from the zero register.
    Neg,
    /// Negate, setting flags — alias of `subs` from the zero register.
    Negs,
    /// Bitwise AND.
    And,
    /// Bitwise AND, setting flags.
    Ands,
    /// Bit clear (`AND` with complemented operand).
    Bic,
    /// Bit clear, setting flags.
    Bics,
    /// Bitwise exclusive OR.
    Eor,
    /// Bitwise OR.
    Orr,
    /// Bitwise exclusive OR NOT.
    Eon,
    /// Bitwise OR NOT.
    Orn,
    /// Test — alias of `ands` with a zero destination.
    Tst,
    /// Move wide with NOT.
    Movn,
    /// Move wide with zero.
    Movz,
    /// Move wide with keep.
    Movk,
    /// Move register — alias of `orr` from the zero register.
    Mov,
    /// Bitwise NOT — alias of `orn` from the zero register.
    Mvn,
    /// Multiply-add.
    Madd,
    /// Multiply-subtract.
    Msub,
    /// Multiply — alias of `madd` with a zero accumulator.
    Mul,
    /// Multiply-negate — alias of `msub` with a zero accumulator.
    Mneg,
    /// Unconditional branch.
    B,
    /// Conditional branch (`b.eq`, `b.ne`, …).
    Bcond(Cond),
    /// Branch to register.
    Br,
    /// Load register.
    Ldr,
    /// Store register.
    Str,
}

impl Mnemonic {
    /// Parse a lower-case mnemonic token.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        if let Some(suffix) = s.strip_prefix("b.") {
            return Cond::parse(suffix).map(Mnemonic::Bcond);
        }
        match s {
            "add" => Some(Mnemonic::Add),
            "adds" => Some(Mnemonic::Adds),
            "sub" => Some(Mnemonic::Sub),
            "subs" => Some(Mnemonic::Subs),
            "cmp" => Some(Mnemonic::Cmp),
            "cmn" => Some(Mnemonic::Cmn),
            "neg" => Some(Mnemonic::Neg),
            "negs" => Some(Mnemonic::Negs),
            "and" => Some(Mnemonic::And),
            "ands" => Some(Mnemonic::Ands),
            "bic" => Some(Mnemonic::Bic),
            "bics" => Some(Mnemonic::Bics),
            "eor" => Some(Mnemonic::Eor),
            "orr" => Some(Mnemonic::Orr),
            "eon" => Some(Mnemonic::Eon),
            "orn" => Some(Mnemonic::Orn),
            "tst" => Some(Mnemonic::Tst),
            "movn" => Some(Mnemonic::Movn),
            "movz" => Some(Mnemonic::Movz),
            "movk" => Some(Mnemonic::Movk),
            "mov" => Some(Mnemonic::Mov),
            "mvn" => Some(Mnemonic::Mvn),
            "madd" => Some(Mnemonic::Madd),
            "msub" => Some(Mnemonic::Msub),
            "mul" => Some(Mnemonic::Mul),
            "mneg" => Some(Mnemonic::Mneg),
            "b" => Some(Mnemonic::B),
            "br" => Some(Mnemonic::Br),
            "ldr" => Some(Mnemonic::Ldr),
            "str" => Some(Mnemonic::Str),
            _ => None,
        }
    }

    /// The encoder/executor category this mnemonic belongs to.
    #[must_use]
    pub fn category(self) -> Category {
        match self {
            Mnemonic::B | Mnemonic::Bcond(_) | Mnemonic::Br => Category::Branch,
            Mnemonic::Ldr | Mnemonic::Str => Category::LoadStore,
            _ => Category::DataProcessing,
        }
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mnemonic::Add => "add",
            Mnemonic::Adds => "adds",
            Mnemonic::Sub => "sub",
            Mnemonic::Subs => "subs",
            Mnemonic::Cmp => "cmp",
            Mnemonic::Cmn => "cmn",
            Mnemonic::Neg => "neg",
            Mnemonic::Negs => "negs",
            Mnemonic::And => "and",
            Mnemonic::Ands => "ands",
            Mnemonic::Bic => "bic",
            Mnemonic::Bics => "bics",
            Mnemonic::Eor => "eor",
            Mnemonic::Orr => "orr",
            Mnemonic::Eon => "eon",
            Mnemonic::Orn => "orn",
            Mnemonic::Tst => "tst",
            Mnemonic::Movn => "movn",
            Mnemonic::Movz => "movz",
            Mnemonic::Movk => "movk",
            Mnemonic::Mov => "mov",
            Mnemonic::Mvn => "mvn",
            Mnemonic::Madd => "madd",
            Mnemonic::Msub => "msub",
            Mnemonic::Mul => "mul",
            Mnemonic::Mneg => "mneg",
            Mnemonic::B => "b",
            Mnemonic::Bcond(cond) => return write!(f, "b.{}", cond),
            Mnemonic::Br => "br",
            Mnemonic::Ldr => "ldr",
            Mnemonic::Str => "str",
        };
        write!(f, "{}", name)
    }
}

/// A parsed instruction before encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instruction {
    /// The mnemonic.
    pub mnemonic: Mnemonic,
    /// Ordered operands, at most five after alias rewriting.
    pub operands: Vec<Operand>,
    /// Source location of the whole instruction.
    pub span: Span,
}

impl Instruction {
    /// Construct an instruction value.
    #[must_use]
    pub fn new(mnemonic: Mnemonic, operands: Vec<Operand>, span: Span) -> Self {
        Self {
            mnemonic,
            operands,
            span,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic)?;
        for (i, op) in self.operands.iter().enumerate() {
            if i == 0 {
                write!(f, " {}", op)?;
            } else {
                write!(f, ", {}", op)?;
            }
        }
        Ok(())
    }
}

/// One classified source line.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Line {
    /// An instruction; occupies 4 bytes.
    Instruction(Instruction),
    /// An `.int` directive with its literal value; occupies 4 bytes.
    Directive(i32, Span),
    /// A label definition; occupies no space.
    Label(String, Span),
    /// A blank or comment-only line.
    Skip,
}
