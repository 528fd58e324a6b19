//! Per-line tokenizer with span tracking.
//!
//! Source files are assembled line by line, so the lexer works on one line
//! at a time and produces borrowed tokens — no per-token heap allocation.
//! Commas are separators and are dropped; `;` and `//` start comments that
//! run to the end of the line.

use alloc::format;
use alloc::vec::Vec;

use crate::error::{AsmError, Span};

/// A token produced by the lexer. Text is borrowed from the source line.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'src> {
    /// Token classification.
    pub kind: TokenKind,
    /// Source text (for label definitions: the name without the colon).
    pub text: &'src str,
    /// Source location.
    pub span: Span,
}

/// The type of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier: mnemonic, register name, shift keyword, or label reference.
    Ident,
    /// A bare numeric literal (decimal or `0x` hex, optionally negative).
    Number(i64),
    /// A `#`-prefixed immediate.
    Imm(i64),
    /// A label definition (`name:`).
    LabelDef,
    /// Open bracket `[`.
    LBracket,
    /// Close bracket `]`.
    RBracket,
    /// Exclamation mark `!` (pre-index writeback).
    Bang,
}

#[inline]
fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'.'
}

#[inline]
fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'$' || b == b'_' || b == b'.' || b == b':'
}

/// Whether `s` is a syntactically valid label name (without the colon).
#[must_use]
pub fn is_label_name(s: &str) -> bool {
    let bytes = s.as_bytes();
    match bytes.first() {
        Some(&b) if is_ident_start(b) => {}
        _ => return false,
    }
    bytes[1..].iter().all(|&b| is_ident_continue(b))
}

/// Tokenize one source line.
///
/// # Errors
///
/// Returns `Err(AsmError::Syntax)` for unrecognized characters, malformed
/// numbers, and a bare `#` with nothing to quantify.
pub fn tokenize_line(line: &str, line_no: u32) -> Result<Vec<Token<'_>>, AsmError> {
    let bytes = line.as_bytes();
    let len = bytes.len();
    let mut tokens = Vec::new();
    let mut pos = 0usize;

    while pos < len {
        let ch = bytes[pos];

        // Whitespace and comma separators
        if ch == b' ' || ch == b'\t' || ch == b'\r' || ch == b',' {
            pos += 1;
            continue;
        }

        // Comment to end of line: `;` or `//`
        if ch == b';' || (ch == b'/' && bytes.get(pos + 1) == Some(&b'/')) {
            break;
        }

        // Single-character punctuation
        if let Some(kind) = match ch {
            b'[' => Some(TokenKind::LBracket),
            b']' => Some(TokenKind::RBracket),
            b'!' => Some(TokenKind::Bang),
            _ => None,
        } {
            tokens.push(Token {
                kind,
                text: &line[pos..pos + 1],
                span: Span::new(line_no, pos as u32 + 1, pos, 1),
            });
            pos += 1;
            continue;
        }

        // `#`-prefixed immediate
        if ch == b'#' {
            let start = pos;
            pos += 1;
            let value = scan_number(line, bytes, &mut pos, line_no, start)?;
            tokens.push(Token {
                kind: TokenKind::Imm(value),
                text: &line[start..pos],
                span: Span::new(line_no, start as u32 + 1, start, pos - start),
            });
            continue;
        }

        // Bare number (branch targets, directive values)
        if ch.is_ascii_digit() || (ch == b'-' && matches!(bytes.get(pos + 1), Some(b) if b.is_ascii_digit()))
        {
            let start = pos;
            let value = scan_number(line, bytes, &mut pos, line_no, start)?;
            tokens.push(Token {
                kind: TokenKind::Number(value),
                text: &line[start..pos],
                span: Span::new(line_no, start as u32 + 1, start, pos - start),
            });
            continue;
        }

        // Identifier or label definition
        if is_ident_start(ch) {
            let start = pos;
            pos += 1;
            while pos < len && is_ident_continue(bytes[pos]) {
                pos += 1;
            }
            let text = &line[start..pos];
            let span = Span::new(line_no, start as u32 + 1, start, pos - start);
            if let Some(name) = text.strip_suffix(':') {
                if name.is_empty() || !is_label_name(name) {
                    return Err(AsmError::Syntax {
                        msg: format!("malformed label '{}'", text),
                        span,
                    });
                }
                tokens.push(Token {
                    kind: TokenKind::LabelDef,
                    text: name,
                    span,
                });
            } else {
                tokens.push(Token {
                    kind: TokenKind::Ident,
                    text,
                    span,
                });
            }
            continue;
        }

        return Err(AsmError::Syntax {
            msg: format!("unexpected character '{}'", ch as char),
            span: Span::new(line_no, pos as u32 + 1, pos, 1),
        });
    }

    Ok(tokens)
}

/// Scan a decimal or `0x` hexadecimal literal, optionally negated.
fn scan_number(
    line: &str,
    bytes: &[u8],
    pos: &mut usize,
    line_no: u32,
    token_start: usize,
) -> Result<i64, AsmError> {
    let len = bytes.len();
    let mut negative = false;
    if *pos < len && bytes[*pos] == b'-' {
        negative = true;
        *pos += 1;
    }

    let digits_start = *pos;
    let radix = if *pos + 1 < len && bytes[*pos] == b'0' && (bytes[*pos + 1] | 0x20) == b'x' {
        *pos += 2;
        16
    } else {
        10
    };

    let value_start = *pos;
    while *pos < len && bytes[*pos].is_ascii_alphanumeric() {
        *pos += 1;
    }

    let digits = &line[value_start..*pos];
    let err = |msg: alloc::string::String| AsmError::Syntax {
        msg,
        span: Span::new(
            line_no,
            token_start as u32 + 1,
            token_start,
            (*pos).max(digits_start + 1) - token_start,
        ),
    };

    if digits.is_empty() {
        return Err(err("expected a number".into()));
    }

    let magnitude = i64::from_str_radix(digits, radix)
        .map_err(|_| err(format!("malformed numeric literal '{}'", digits)))?;

    Ok(if negative { -magnitude } else { magnitude })
}
