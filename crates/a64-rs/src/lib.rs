//! # a64-rs — AArch64-Subset Assembler and Emulator
//!
//! `a64-rs` is a pure Rust, zero-C-dependency toolchain for a fixed subset
//! of the AArch64 instruction set: an assembler that turns source text into
//! 32-bit machine words, and an emulator that fetches, decodes, and executes
//! those same words against a simulated CPU. Both halves share one
//! bit-layout model, so a word produced by the encoder executes identically
//! under the executors.
//!
//! ## Quick Start
//!
//! ```rust
//! use a64_rs::{assemble, emulate};
//!
//! let code = assemble(
//!     "movz x0, #5\n\
//!      movz x1, #3\n\
//!      add x0, x0, x1\n\
//!      and x0, x0, x0", // terminate pattern
//! )
//! .unwrap();
//!
//! let machine = emulate(&code).unwrap();
//! assert_eq!(machine.reg(0), 8);
//! ```
//!
//! ## Features
//!
//! - **Pure Rust** — no C/C++ FFI, no system assembler at runtime.
//! - **Two-directional** — the encoder and the executors agree bit for bit.
//! - **Labels** — forward and backward branch targets resolve automatically.
//! - **`no_std` + `alloc`** — the `std` feature only adds `Error` impls.

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
// ── Pedantic lint policy ─────────────────────────────────────────────────
// An assembler/emulator pair performs many deliberate narrowing and
// sign-changing casts between integer widths (i64→u32, u64→i64) and uses
// dense hex literals without separators (0x03FFFFFF, 0xD61F0000). The lints
// below are expected and acceptable in this context.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::cast_possible_wrap,
    clippy::unreadable_literal,
    clippy::match_same_arms,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args,
    clippy::doc_markdown,
    clippy::similar_names,
    clippy::too_many_lines,
    clippy::missing_errors_doc,
    clippy::must_use_candidate
)]

extern crate alloc;

/// Two-pass assembly driver: builder API and one-shot [`assemble`].
pub mod assembler;
/// Closed-range bit-field extract/insert and sign extension.
pub mod bits;
/// Machine state: registers, flags, memory, and the state dump.
pub mod cpu;
/// Per-category instruction encoders and alias normalization.
pub mod encoder;
/// Error types and source-span diagnostics.
pub mod error;
/// Fetch-decode-execute loop and the three executors.
pub mod exec;
/// Intermediate representation: registers, operands, instructions, lines.
pub mod ir;
/// Per-line tokenizer with span tracking.
pub mod lexer;
/// Line classification and per-category operand parsing.
pub mod parser;
/// Label symbol table with forward-reference support.
pub mod symtab;

// Re-exports
pub use assembler::{assemble, Assembler, AssemblyResult};
pub use cpu::{Machine, Pstate, MEMORY_SIZE, TERMINATE};
pub use error::{AsmError, EmuError, Span};
pub use exec::{emulate, Step};
pub use ir::{
    AddrMode, Category, Cond, Instruction, Line, Mnemonic, Operand, Register, ShiftKind, Width,
};
pub use symtab::SymbolTable;
