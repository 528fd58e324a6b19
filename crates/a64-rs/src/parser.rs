//! Line parser: classifies one source line and builds IR.
//!
//! The first token decides the line kind: a `.int` directive, a label
//! definition (trailing colon), or a mnemonic. Instructions are routed to a
//! per-category operand grammar. The operand-shape tables here mirror the
//! encoder's expectations per mnemonic exactly — an instruction the parser
//! accepts either encodes or fails with a range error, never with a shape
//! surprise.
//!
//! Labels are defined and referenced in the symbol table as a side effect,
//! so a single scan pass over the file leaves every backward *and* forward
//! reference either resolved or pending.

use alloc::format;
use alloc::string::ToString;
use alloc::vec::Vec;

use crate::error::{AsmError, Span};
use crate::ir::{
    AddrMode, Instruction, Line, Mnemonic, Operand, Register, Width, ZERO_REG,
};
use crate::lexer::{is_label_name, tokenize_line, Token, TokenKind};
use crate::symtab::SymbolTable;

/// Parse one source line.
///
/// `address` is the address the line will occupy if it contributes code;
/// label definitions bind to it. The symbol table collects definitions and
/// pending references as a side effect.
///
/// # Errors
///
/// Any malformed token, unknown mnemonic, or operand-shape mismatch is a
/// structured [`AsmError`]; the caller aborts assembly on the first one.
pub fn parse_line(
    line: &str,
    line_no: u32,
    address: u32,
    symtab: &mut SymbolTable,
) -> Result<Line, AsmError> {
    let tokens = tokenize_line(line, line_no)?;
    let Some(first) = tokens.first() else {
        return Ok(Line::Skip);
    };

    match first.kind {
        TokenKind::LabelDef => {
            if tokens.len() > 1 {
                return Err(AsmError::Syntax {
                    msg: format!("unexpected tokens after label '{}'", first.text),
                    span: tokens[1].span,
                });
            }
            symtab.define(first.text, address);
            Ok(Line::Label(first.text.to_string(), first.span))
        }
        TokenKind::Ident if first.text == ".int" => parse_directive(&tokens),
        TokenKind::Ident => {
            let Some(mnemonic) = Mnemonic::parse(first.text) else {
                return Err(AsmError::UnknownMnemonic {
                    mnemonic: first.text.to_string(),
                    span: first.span,
                });
            };
            let mut cursor = Cursor {
                tokens: &tokens,
                pos: 1,
                line_no,
            };
            let instr = parse_instruction(mnemonic, first.span, &mut cursor, symtab)?;
            cursor.expect_end()?;
            Ok(Line::Instruction(instr))
        }
        _ => Err(AsmError::Syntax {
            msg: "expected a mnemonic, label, or directive".to_string(),
            span: first.span,
        }),
    }
}

fn parse_directive(tokens: &[Token<'_>]) -> Result<Line, AsmError> {
    let span = tokens[0].span;
    let [_, value_tok] = tokens else {
        return Err(AsmError::Syntax {
            msg: ".int takes exactly one integer".to_string(),
            span,
        });
    };
    let value = match value_tok.kind {
        TokenKind::Number(v) | TokenKind::Imm(v) => v,
        _ => {
            return Err(AsmError::Syntax {
                msg: format!("expected an integer, found '{}'", value_tok.text),
                span: value_tok.span,
            })
        }
    };
    // A directive word is raw bits: accept the i32 range plus the u32 range.
    if value < i64::from(i32::MIN) || value > i64::from(u32::MAX) {
        return Err(AsmError::ImmediateOverflow {
            value,
            min: i64::from(i32::MIN),
            max: i64::from(u32::MAX),
            span: value_tok.span,
        });
    }
    Ok(Line::Directive(value as u32 as i32, span))
}

// ── Token cursor ─────────────────────────────────────────────────────────

struct Cursor<'a, 'src> {
    tokens: &'a [Token<'src>],
    pos: usize,
    line_no: u32,
}

impl<'a, 'src> Cursor<'a, 'src> {
    fn peek(&self) -> Option<&'a Token<'src>> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Token<'src>> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn remaining(&self) -> usize {
        self.tokens.len() - self.pos
    }

    /// Span to blame when the line ends too early.
    fn end_span(&self) -> Span {
        self.tokens
            .last()
            .map_or_else(|| Span::new(self.line_no, 1, 0, 0), |t| t.span)
    }

    fn expect_token(&mut self, what: &str) -> Result<&'a Token<'src>, AsmError> {
        let span = self.end_span();
        self.next().ok_or_else(|| AsmError::Syntax {
            msg: format!("expected {}, found end of line", what),
            span,
        })
    }

    fn expect_register(&mut self) -> Result<Register, AsmError> {
        let tok = self.expect_token("a register")?;
        parse_register(tok)
    }

    fn expect_kind(&mut self, kind: TokenKind, what: &str) -> Result<&'a Token<'src>, AsmError> {
        let tok = self.expect_token(what)?;
        if tok.kind == kind {
            Ok(tok)
        } else {
            Err(AsmError::Syntax {
                msg: format!("expected {}, found '{}'", what, tok.text),
                span: tok.span,
            })
        }
    }

    fn expect_imm(&mut self) -> Result<(i64, Span), AsmError> {
        let tok = self.expect_token("an immediate")?;
        match tok.kind {
            TokenKind::Imm(v) => Ok((v, tok.span)),
            _ => Err(AsmError::Syntax {
                msg: format!("expected an immediate, found '{}'", tok.text),
                span: tok.span,
            }),
        }
    }

    fn expect_end(&mut self) -> Result<(), AsmError> {
        match self.peek() {
            None => Ok(()),
            Some(tok) => Err(AsmError::Syntax {
                msg: format!("unexpected trailing token '{}'", tok.text),
                span: tok.span,
            }),
        }
    }
}

/// Parse a register token: `x0`–`x30`, `w0`–`w30`, `xzr`, `wzr` (and the
/// numeric spelling `x31`/`w31` of the zero register).
fn parse_register(tok: &Token<'_>) -> Result<Register, AsmError> {
    let bad = || AsmError::Syntax {
        msg: format!("expected a register, found '{}'", tok.text),
        span: tok.span,
    };

    if tok.kind != TokenKind::Ident {
        return Err(bad());
    }
    let mut chars = tok.text.as_bytes();
    let width = match chars.first() {
        Some(b'x') => Width::W64,
        Some(b'w') => Width::W32,
        _ => return Err(bad()),
    };
    chars = &chars[1..];

    let num = if chars == b"zr" {
        ZERO_REG
    } else {
        let digits = core::str::from_utf8(chars).map_err(|_| bad())?;
        let num: u8 = digits.parse().map_err(|_| bad())?;
        if num > ZERO_REG {
            return Err(bad());
        }
        num
    };

    Ok(Register { num, width })
}

// ── Mnemonic shape tables ────────────────────────────────────────────────
//
// Operand-arity classes: which data-processing mnemonics take a
// second/third register, which take an immediate second operand, and which
// are multiply-accumulate forms. Must stay in lockstep with the encoder's
// per-mnemonic layouts.

fn takes_second_register(m: Mnemonic) -> bool {
    matches!(
        m,
        Mnemonic::And
            | Mnemonic::Ands
            | Mnemonic::Bic
            | Mnemonic::Bics
            | Mnemonic::Eon
            | Mnemonic::Eor
            | Mnemonic::Madd
            | Mnemonic::Mneg
            | Mnemonic::Mov
            | Mnemonic::Msub
            | Mnemonic::Mul
            | Mnemonic::Mvn
            | Mnemonic::Orn
            | Mnemonic::Orr
            | Mnemonic::Tst
    )
}

fn takes_third_register(m: Mnemonic) -> bool {
    matches!(
        m,
        Mnemonic::And
            | Mnemonic::Ands
            | Mnemonic::Bic
            | Mnemonic::Bics
            | Mnemonic::Eon
            | Mnemonic::Eor
            | Mnemonic::Madd
            | Mnemonic::Mneg
            | Mnemonic::Msub
            | Mnemonic::Mul
            | Mnemonic::Orn
            | Mnemonic::Orr
    )
}

fn is_mul_accumulate(m: Mnemonic) -> bool {
    matches!(m, Mnemonic::Madd | Mnemonic::Msub)
}

fn is_wide_move(m: Mnemonic) -> bool {
    matches!(m, Mnemonic::Movn | Mnemonic::Movz | Mnemonic::Movk)
}

fn is_arith_family(m: Mnemonic) -> bool {
    matches!(
        m,
        Mnemonic::Add
            | Mnemonic::Adds
            | Mnemonic::Sub
            | Mnemonic::Subs
            | Mnemonic::Cmp
            | Mnemonic::Cmn
            | Mnemonic::Neg
            | Mnemonic::Negs
    )
}

fn has_third_source(m: Mnemonic) -> bool {
    matches!(
        m,
        Mnemonic::Add | Mnemonic::Adds | Mnemonic::Sub | Mnemonic::Subs
    )
}

// ── Instruction grammars ─────────────────────────────────────────────────

fn parse_instruction(
    mnemonic: Mnemonic,
    span: Span,
    cursor: &mut Cursor<'_, '_>,
    symtab: &mut SymbolTable,
) -> Result<Instruction, AsmError> {
    let operands = match mnemonic {
        Mnemonic::B | Mnemonic::Bcond(_) => parse_branch_target(cursor, symtab)?,
        Mnemonic::Br => {
            let reg = cursor.expect_register()?;
            if reg.width != Width::W64 {
                return Err(AsmError::InvalidOperands {
                    detail: "br requires a 64-bit register".to_string(),
                    span,
                });
            }
            alloc::vec![Operand::Register(reg)]
        }
        Mnemonic::Ldr | Mnemonic::Str => parse_load_store(mnemonic, span, cursor, symtab)?,
        _ => parse_data_processing(mnemonic, cursor)?,
    };

    Ok(Instruction::new(mnemonic, operands, span))
}

/// `b`/`b.<cond>` take a single label or literal-address operand.
fn parse_branch_target(
    cursor: &mut Cursor<'_, '_>,
    symtab: &mut SymbolTable,
) -> Result<Vec<Operand>, AsmError> {
    let tok = cursor.expect_token("a branch target")?;
    let op = match tok.kind {
        TokenKind::Ident if is_label_name(tok.text) => {
            symtab.reference(tok.text);
            Operand::Label(tok.text.to_string())
        }
        TokenKind::Number(v) | TokenKind::Imm(v) => Operand::Address(address_literal(v, tok.span)?),
        _ => {
            return Err(AsmError::Syntax {
                msg: format!("expected a label or address, found '{}'", tok.text),
                span: tok.span,
            })
        }
    };
    Ok(alloc::vec![op])
}

fn address_literal(v: i64, span: Span) -> Result<u32, AsmError> {
    if v < 0 || v > i64::from(u32::MAX) {
        return Err(AsmError::ImmediateOverflow {
            value: v,
            min: 0,
            max: i64::from(u32::MAX),
            span,
        });
    }
    Ok(v as u32)
}

/// Load/store operand grammar.
///
/// The addressing mode is disambiguated syntactically:
/// `[Xn], #imm` post-index, `[Xn, #imm]!` pre-index, `[Xn {, #imm}]`
/// unsigned offset, `[Xn, Xm]` register offset, and a bare label/literal
/// second operand is the PC-relative load-literal form (`ldr` only).
fn parse_load_store(
    mnemonic: Mnemonic,
    span: Span,
    cursor: &mut Cursor<'_, '_>,
    symtab: &mut SymbolTable,
) -> Result<Vec<Operand>, AsmError> {
    let rt = cursor.expect_register()?;
    let mut operands = alloc::vec![Operand::Register(rt)];

    let tok = cursor.expect_token("an address operand")?;
    match tok.kind {
        TokenKind::LBracket => {
            let base = cursor.expect_register()?;
            if base.width != Width::W64 {
                return Err(AsmError::InvalidOperands {
                    detail: "address base must be a 64-bit register".to_string(),
                    span,
                });
            }
            operands.push(parse_addr_mode(base.num, cursor)?);
        }
        TokenKind::Ident if is_label_name(tok.text) => {
            require_load_literal(mnemonic, span)?;
            symtab.reference(tok.text);
            operands.push(Operand::Label(tok.text.to_string()));
        }
        TokenKind::Number(v) | TokenKind::Imm(v) => {
            require_load_literal(mnemonic, span)?;
            operands.push(Operand::Address(address_literal(v, tok.span)?));
        }
        _ => {
            return Err(AsmError::Syntax {
                msg: format!("expected '[', label, or address, found '{}'", tok.text),
                span: tok.span,
            })
        }
    }

    Ok(operands)
}

fn require_load_literal(mnemonic: Mnemonic, span: Span) -> Result<(), AsmError> {
    if mnemonic == Mnemonic::Ldr {
        Ok(())
    } else {
        Err(AsmError::InvalidOperands {
            detail: "str cannot use the pc-relative literal form".to_string(),
            span,
        })
    }
}

/// Parse the part after `[Xn` into one of the four bracketed modes.
fn parse_addr_mode(base: u8, cursor: &mut Cursor<'_, '_>) -> Result<Operand, AsmError> {
    let tok = cursor.expect_token("']', an offset, or an index register")?;
    let mode = match tok.kind {
        // `[Xn]` alone, or `[Xn], #imm` post-index
        TokenKind::RBracket => match cursor.next() {
            None => AddrMode::UnsignedOffset(0),
            Some(imm_tok) => match imm_tok.kind {
                TokenKind::Imm(v) => AddrMode::PostIndex(signed9(v, imm_tok.span)?),
                _ => {
                    return Err(AsmError::Syntax {
                        msg: format!(
                            "expected a post-index immediate, found '{}'",
                            imm_tok.text
                        ),
                        span: imm_tok.span,
                    })
                }
            },
        },
        // `[Xn, #imm]` unsigned offset or `[Xn, #imm]!` pre-index
        TokenKind::Imm(v) => {
            cursor.expect_kind(TokenKind::RBracket, "']'")?;
            match cursor.peek() {
                Some(bang) if bang.kind == TokenKind::Bang => {
                    cursor.next();
                    AddrMode::PreIndex(signed9(v, tok.span)?)
                }
                _ => {
                    if v < 0 {
                        return Err(AsmError::ImmediateOverflow {
                            value: v,
                            min: 0,
                            max: 4095 * 8,
                            span: tok.span,
                        });
                    }
                    AddrMode::UnsignedOffset(v as u32)
                }
            }
        }
        // `[Xn, Xm]` register offset
        TokenKind::Ident => {
            let rm = parse_register(tok)?;
            if rm.width != Width::W64 {
                return Err(AsmError::InvalidOperands {
                    detail: "offset register must be 64-bit".to_string(),
                    span: tok.span,
                });
            }
            cursor.expect_kind(TokenKind::RBracket, "']'")?;
            AddrMode::RegisterOffset(rm.num)
        }
        _ => {
            return Err(AsmError::Syntax {
                msg: format!("cannot parse address operand at '{}'", tok.text),
                span: tok.span,
            })
        }
    };
    Ok(Operand::Mem { base, mode })
}

fn signed9(v: i64, span: Span) -> Result<i32, AsmError> {
    // Full range check happens at encode; here only guard the i32 carrier.
    i32::try_from(v).map_err(|_| AsmError::ImmediateOverflow {
        value: v,
        min: i64::from(i32::MIN),
        max: i64::from(i32::MAX),
        span,
    })
}

/// Data-processing operand grammar, driven by the mnemonic shape tables.
fn parse_data_processing(
    mnemonic: Mnemonic,
    cursor: &mut Cursor<'_, '_>,
) -> Result<Vec<Operand>, AsmError> {
    let rd = cursor.expect_register()?;
    let mut operands = alloc::vec![Operand::Register(rd)];

    if takes_second_register(mnemonic) {
        operands.push(Operand::Register(cursor.expect_register()?));
        if takes_third_register(mnemonic) {
            operands.push(Operand::Register(cursor.expect_register()?));
            if is_mul_accumulate(mnemonic) {
                operands.push(Operand::Register(cursor.expect_register()?));
            } else {
                parse_optional_shift(cursor, &mut operands)?;
            }
        } else {
            parse_optional_shift(cursor, &mut operands)?;
        }
    } else if is_wide_move(mnemonic) {
        let (v, span) = cursor.expect_imm()?;
        operands.push(Operand::Immediate(unsigned_imm(v, 0xFFFF, span)?));
        parse_optional_shift(cursor, &mut operands)?;
    } else if is_arith_family(mnemonic) {
        let tok = cursor.expect_token("a register or immediate")?;
        match tok.kind {
            TokenKind::Imm(v) => {
                operands.push(Operand::Immediate(unsigned_imm(v, 0xFFF, tok.span)?));
                parse_optional_shift(cursor, &mut operands)?;
            }
            TokenKind::Ident => {
                operands.push(Operand::Register(parse_register(tok)?));
                if has_third_source(mnemonic) {
                    let tok = cursor.expect_token("a register or immediate")?;
                    match tok.kind {
                        TokenKind::Imm(v) => {
                            operands.push(Operand::Immediate(unsigned_imm(v, 0xFFF, tok.span)?));
                        }
                        TokenKind::Ident => {
                            operands.push(Operand::Register(parse_register(tok)?));
                        }
                        _ => {
                            return Err(AsmError::Syntax {
                                msg: format!(
                                    "expected a register or immediate, found '{}'",
                                    tok.text
                                ),
                                span: tok.span,
                            })
                        }
                    }
                }
                parse_optional_shift(cursor, &mut operands)?;
            }
            _ => {
                return Err(AsmError::Syntax {
                    msg: format!("expected a register or immediate, found '{}'", tok.text),
                    span: tok.span,
                })
            }
        }
    } else {
        // Every data-processing mnemonic is covered by a table above.
        unreachable!("unclassified data-processing mnemonic {}", mnemonic);
    }

    Ok(operands)
}

fn unsigned_imm(v: i64, max: u32, span: Span) -> Result<u32, AsmError> {
    if v < 0 || v > i64::from(max) {
        return Err(AsmError::ImmediateOverflow {
            value: v,
            min: 0,
            max: i64::from(max),
            span,
        });
    }
    Ok(v as u32)
}

/// Consume a trailing `<shift> #<amount>` pair when exactly one remains.
fn parse_optional_shift(
    cursor: &mut Cursor<'_, '_>,
    operands: &mut Vec<Operand>,
) -> Result<(), AsmError> {
    if cursor.remaining() == 0 {
        return Ok(());
    }
    let tok = cursor.expect_token("a shift")?;
    let kind = match tok.kind {
        TokenKind::Ident => crate::ir::ShiftKind::parse(tok.text),
        _ => None,
    };
    let Some(kind) = kind else {
        return Err(AsmError::Syntax {
            msg: format!("expected lsl, lsr, asr, or ror, found '{}'", tok.text),
            span: tok.span,
        });
    };
    let (amount, span) = cursor.expect_imm()?;
    let amount = unsigned_imm(amount, 63, span)?;
    operands.push(Operand::Shift { kind, amount });
    Ok(())
}
