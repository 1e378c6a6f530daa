//! Tokenizer over sanitized formula text.
//!
//! Input is expected to be the output of [`sanitize`](super::sanitize), so
//! every character is ASCII.

use super::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Str(String),
    /// `$N`, 1-indexed.
    Ref(usize),
    Int,
    Len,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Shl,
    Shr,
    UShr,
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub position: usize,
}

/// Returns the index of every `$` reference in order. A bare `$` reports 0.
pub(crate) fn reference_indices(src: &str) -> Vec<usize> {
    let bytes = src.as_bytes();
    let mut indices = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            let (index, end) = read_digits(bytes, i + 1);
            indices.push(index);
            i = end;
        } else {
            i += 1;
        }
    }
    indices
}

/// Reads a run of decimal digits starting at `start`. Saturates on overflow.
fn read_digits(bytes: &[u8], start: usize) -> (usize, usize) {
    let mut end = start;
    let mut value: usize = 0;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        value = value
            .saturating_mul(10)
            .saturating_add((bytes[end] - b'0') as usize);
        end += 1;
    }
    (value, end)
}

pub(crate) fn tokenize(src: &str) -> Result<Vec<Spanned>, ExprError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        let token = match bytes[i] {
            b' ' => {
                i += 1;
                continue;
            }
            b'0'..=b'9' | b'.' => {
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                let text = &src[start..i];
                let n = text.parse::<f64>().map_err(|_| ExprError::Syntax {
                    position: start,
                    message: format!("invalid number '{}'", text),
                })?;
                tokens.push(Spanned {
                    token: Token::Number(n),
                    position: start,
                });
                continue;
            }
            b'\'' => {
                let close = src[start + 1..].find('\'').ok_or_else(|| ExprError::Syntax {
                    position: start,
                    message: "unterminated string".to_string(),
                })?;
                let text = src[start + 1..start + 1 + close].to_string();
                i = start + close + 2;
                tokens.push(Spanned {
                    token: Token::Str(text),
                    position: start,
                });
                continue;
            }
            b'$' => {
                let (index, end) = read_digits(bytes, i + 1);
                if end == i + 1 {
                    return Err(ExprError::Syntax {
                        position: start,
                        message: "'$' without an index".to_string(),
                    });
                }
                i = end;
                tokens.push(Spanned {
                    token: Token::Ref(index),
                    position: start,
                });
                continue;
            }
            _ if src[i..].starts_with("int") => {
                i += 3;
                Token::Int
            }
            _ if src[i..].starts_with("len") => {
                i += 3;
                Token::Len
            }
            _ if src[i..].starts_with(">>>") => {
                i += 3;
                Token::UShr
            }
            _ if src[i..].starts_with(">>") => {
                i += 2;
                Token::Shr
            }
            _ if src[i..].starts_with("<<") => {
                i += 2;
                Token::Shl
            }
            b'+' => single(&mut i, Token::Plus),
            b'-' => single(&mut i, Token::Minus),
            b'*' => single(&mut i, Token::Star),
            b'/' => single(&mut i, Token::Slash),
            b'%' => single(&mut i, Token::Percent),
            b'&' => single(&mut i, Token::Amp),
            b'|' => single(&mut i, Token::Pipe),
            b'^' => single(&mut i, Token::Caret),
            b'~' => single(&mut i, Token::Tilde),
            b'(' => single(&mut i, Token::LParen),
            b')' => single(&mut i, Token::RParen),
            other => {
                return Err(ExprError::Syntax {
                    position: start,
                    message: format!("unexpected character '{}'", other as char),
                })
            }
        };
        tokens.push(Spanned {
            token,
            position: start,
        });
    }

    Ok(tokens)
}

fn single(i: &mut usize, token: Token) -> Token {
    *i += 1;
    token
}
