//! Error types and source-span diagnostics for both toolchain halves.

#[allow(unused_imports)]
use alloc::format;
use alloc::string::String;
#[allow(unused_imports)]
use alloc::vec;
use core::fmt;

/// Source location for diagnostics.
///
/// Tracks the line, column, byte offset within the line, and length of a
/// token or construct in the original assembly source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number (byte offset within line).
    pub col: u32,
    /// 0-based byte offset from the start of the line.
    pub offset: usize,
    /// Byte length of the spanned region.
    pub len: usize,
}

impl Span {
    /// Create a new span.
    #[must_use]
    pub fn new(line: u32, col: u32, offset: usize, len: usize) -> Self {
        Self {
            line,
            col,
            offset,
            len,
        }
    }

    /// A dummy span for generated/internal constructs.
    #[must_use]
    pub fn dummy() -> Self {
        Self {
            line: 0,
            col: 0,
            offset: 0,
            len: 0,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Assembly error with source location and descriptive message.
///
/// Every error is terminal for the current run: the two-pass driver stops at
/// the first one it encounters.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AsmError {
    /// Unknown mnemonic.
    UnknownMnemonic {
        /// The mnemonic that was not recognized.
        mnemonic: String,
        /// Source location of the unknown mnemonic.
        span: Span,
    },

    /// Syntax error during tokenizing or line parsing.
    Syntax {
        /// The syntax error message.
        msg: String,
        /// Source location of the syntax error.
        span: Span,
    },

    /// Invalid operand combination for the instruction.
    InvalidOperands {
        /// Description of why the operands are invalid.
        detail: String,
        /// Source location of the instruction.
        span: Span,
    },

    /// Immediate or shift amount exceeds the allowed range for its field.
    ImmediateOverflow {
        /// The value that overflowed.
        value: i64,
        /// Minimum allowed value.
        min: i64,
        /// Maximum allowed value.
        max: i64,
        /// Source location of the immediate.
        span: Span,
    },

    /// A PC-relative offset (branch or literal load) is out of encodable range.
    OffsetOutOfRange {
        /// The actual displacement to the target, in bytes.
        disp: i64,
        /// Maximum allowed displacement magnitude, in bytes.
        max: i64,
        /// Source location of the instruction.
        span: Span,
    },

    /// An offset that must be a multiple of the transfer size is not.
    Misaligned {
        /// The misaligned value.
        value: i64,
        /// The required alignment in bytes.
        align: u32,
        /// Source location of the offset.
        span: Span,
    },

    /// Referenced label was never defined.
    UndefinedLabel {
        /// The undefined label name.
        label: String,
        /// Source location of the reference.
        span: Span,
    },

    /// The assembled program exceeds the emulator's memory capacity.
    CapacityExceeded {
        /// The capacity in bytes that was exceeded.
        capacity: usize,
    },
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsmError::UnknownMnemonic { mnemonic, span } => {
                write!(f, "{}: unknown mnemonic '{}'", span, mnemonic)
            }
            AsmError::Syntax { msg, span } => {
                write!(f, "{}: {}", span, msg)
            }
            AsmError::InvalidOperands { detail, span } => {
                write!(f, "{}: invalid operand combination: {}", span, detail)
            }
            AsmError::ImmediateOverflow {
                value,
                min,
                max,
                span,
            } => {
                write!(
                    f,
                    "{}: immediate value {} out of range [{}..{}]",
                    span, value, min, max
                )
            }
            AsmError::OffsetOutOfRange { disp, max, span } => {
                write!(
                    f,
                    "{}: pc-relative target out of range (displacement={}, max=±{})",
                    span, disp, max
                )
            }
            AsmError::Misaligned { value, align, span } => {
                write!(
                    f,
                    "{}: offset {} must be a multiple of {}",
                    span, value, align
                )
            }
            AsmError::UndefinedLabel { label, span } => {
                write!(f, "{}: undefined label '{}'", span, label)
            }
            AsmError::CapacityExceeded { capacity } => {
                write!(
                    f,
                    "program exceeds the {} byte memory capacity",
                    capacity
                )
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AsmError {}

/// Emulation error, reported with the program counter at the failing step.
///
/// Like assembly errors these are terminal: the fetch loop halts with
/// failure as soon as one is raised.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EmuError {
    /// The top-level category selector matched no executor.
    UnknownCategory {
        /// The 4-bit op0 selector value.
        op0: u8,
        /// The fetched word.
        word: u32,
        /// Program counter at the failing fetch.
        pc: u64,
    },

    /// A conditional branch carried an unrecognized condition encoding.
    UnknownCondition {
        /// The 4-bit condition encoding.
        cond: u8,
        /// Program counter at the failing fetch.
        pc: u64,
    },

    /// A word within a recognized category decoded to no valid instruction.
    Decode {
        /// Description of the malformed field.
        detail: String,
        /// The fetched word.
        word: u32,
        /// Program counter at the failing fetch.
        pc: u64,
    },

    /// A data transfer reached past the end of memory.
    OutOfBounds {
        /// Start address of the access.
        addr: u64,
        /// Transfer size in bytes.
        size: usize,
    },

    /// The program image does not fit in memory.
    ImageTooLarge {
        /// Image length in bytes.
        len: usize,
        /// Memory capacity in bytes.
        capacity: usize,
    },
}

impl fmt::Display for EmuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmuError::UnknownCategory { op0, word, pc } => {
                write!(
                    f,
                    "pc={:#x}: unknown instruction category {:#x} in word {:#010x}",
                    pc, op0, word
                )
            }
            EmuError::UnknownCondition { cond, pc } => {
                write!(f, "pc={:#x}: invalid branch condition encoding {:#x}", pc, cond)
            }
            EmuError::Decode { detail, word, pc } => {
                write!(f, "pc={:#x}: cannot decode word {:#010x}: {}", pc, word, detail)
            }
            EmuError::OutOfBounds { addr, size } => {
                write!(
                    f,
                    "memory access out of bounds: {} bytes at {:#x}",
                    size, addr
                )
            }
            EmuError::ImageTooLarge { len, capacity } => {
                write!(
                    f,
                    "program image of {} bytes exceeds the {} byte memory",
                    len, capacity
                )
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EmuError {}
