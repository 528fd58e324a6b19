//! Two-pass assembly driver and public assembler API.
//!
//! Pass one scans the source line by line, assigning a 4-byte address to
//! every instruction and directive line and populating the symbol table with
//! label definitions and pending references. Pass two resolves every literal
//! label operand against the table and encodes each line into a 32-bit
//! little-endian word. Both passes abort on the first error.

use alloc::string::String;
use alloc::vec::Vec;

use crate::cpu::MEMORY_SIZE;
use crate::encoder::{encode, encode_directive};
use crate::error::AsmError;
use crate::ir::{Instruction, Line, Mnemonic, Operand};
use crate::parser::parse_line;
use crate::symtab::SymbolTable;

/// The result of a successful assembly: output bytes plus resolved labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyResult {
    bytes: Vec<u8>,
    labels: Vec<(String, u32)>,
}

impl AssemblyResult {
    /// The assembled machine code, one little-endian word per line.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the result, returning the machine code.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// The assembled code as 32-bit words.
    #[must_use]
    pub fn words(&self) -> Vec<u32> {
        self.bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    /// All resolved labels with their addresses, sorted by address.
    #[must_use]
    pub fn labels(&self) -> &[(String, u32)] {
        &self.labels
    }

    /// The address of a label, if it was defined.
    #[must_use]
    pub fn label_address(&self, name: &str) -> Option<u32> {
        self.labels
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, addr)| addr)
    }

    /// Output length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether no code was produced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Incremental assembler. Feed source with [`emit`](Assembler::emit), then
/// call [`finish`](Assembler::finish) to resolve labels and encode.
#[derive(Debug, Default)]
pub struct Assembler {
    symtab: SymbolTable,
    lines: Vec<Line>,
    address: u32,
    line_no: u32,
}

impl Assembler {
    /// Create an empty assembler.
    #[must_use]
    pub fn new() -> Self {
        Self {
            symtab: SymbolTable::new(),
            lines: Vec::new(),
            address: 0,
            line_no: 0,
        }
    }

    /// Scan and parse a chunk of source text (any number of lines).
    ///
    /// # Errors
    ///
    /// Returns the first parse or capacity error; the assembler should be
    /// discarded afterwards.
    pub fn emit(&mut self, source: &str) -> Result<&mut Self, AsmError> {
        for text in source.lines() {
            self.line_no += 1;
            let line = parse_line(text, self.line_no, self.address, &mut self.symtab)?;
            match line {
                Line::Skip => continue,
                Line::Instruction(_) | Line::Directive(..) => {
                    self.address += 4;
                    if self.address as usize > MEMORY_SIZE {
                        return Err(AsmError::CapacityExceeded {
                            capacity: MEMORY_SIZE,
                        });
                    }
                    self.lines.push(line);
                }
                Line::Label(..) => self.lines.push(line),
            }
        }
        Ok(self)
    }

    /// Define a label at an explicit address, as if `name:` had appeared
    /// there in the source.
    pub fn define_label(&mut self, name: &str, addr: u32) -> &mut Self {
        self.symtab.define(name, addr);
        self
    }

    /// Resolve all label references and encode every line.
    ///
    /// # Errors
    ///
    /// Returns the first resolution, range, or operand-shape error.
    pub fn finish(self) -> Result<AssemblyResult, AsmError> {
        let Self {
            symtab,
            lines,
            address: _,
            line_no: _,
        } = self;

        let mut bytes = Vec::with_capacity(lines.len() * 4);
        let mut address: u32 = 0;

        for line in &lines {
            match line {
                Line::Directive(value, _) => {
                    bytes.extend_from_slice(&encode_directive(*value).to_le_bytes());
                    address += 4;
                }
                Line::Instruction(instr) => {
                    let word = match resolve_labels(instr, &symtab)? {
                        Some(resolved) => encode(&resolved, address)?,
                        None => encode(instr, address)?,
                    };
                    bytes.extend_from_slice(&word.to_le_bytes());
                    address += 4;
                }
                Line::Label(..) | Line::Skip => {}
            }
        }

        Ok(AssemblyResult {
            bytes,
            labels: symtab.resolved(),
        })
    }
}

/// Rewrite any literal-label operand to its resolved address.
///
/// Returns `Ok(None)` when the instruction holds no label; lookup failure
/// (label referenced but never defined) is fatal.
fn resolve_labels(
    instr: &Instruction,
    symtab: &SymbolTable,
) -> Result<Option<Instruction>, AsmError> {
    // Only branch targets (operand 0) and ldr literals (operand 1) can hold
    // label references.
    let index = match instr.mnemonic {
        Mnemonic::B | Mnemonic::Bcond(_) => 0,
        Mnemonic::Ldr => 1,
        _ => return Ok(None),
    };

    let Some(Operand::Label(name)) = instr.operands.get(index) else {
        return Ok(None);
    };

    let Some(addr) = symtab.resolve(name) else {
        return Err(AsmError::UndefinedLabel {
            label: name.clone(),
            span: instr.span,
        });
    };

    let mut resolved = instr.clone();
    resolved.operands[index] = Operand::Address(addr);
    Ok(Some(resolved))
}

/// Assemble a complete source text into little-endian machine code bytes.
///
/// One instruction, directive, or label per line; `;` and `//` start
/// comments; labels are defined with a trailing colon.
///
/// # Errors
///
/// Returns [`AsmError`] on the first syntax, resolution, range, or capacity
/// error.
///
/// # Examples
///
/// ```rust
/// let code = a64_rs::assemble("movz x0, #5").unwrap();
/// assert_eq!(code, vec![0xA0, 0x00, 0x80, 0xD2]);
/// ```
pub fn assemble(source: &str) -> Result<Vec<u8>, AsmError> {
    let mut asm = Assembler::new();
    asm.emit(source)?;
    Ok(asm.finish()?.into_bytes())
}
