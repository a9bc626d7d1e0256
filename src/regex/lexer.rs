//! Tokenizer for one regular-expression pattern string.
//!
//! Produces the terminal stream consumed by the bootstrap LR driver in
//! [`super::bootstrap`]. Escapes and bracket classes are resolved here so
//! the grammar above only ever sees atomic CHAR/CLASS tokens.

use crate::bitset::BitSet;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tok {
    /// A literal byte sequence matched verbatim (one byte for plain
    /// characters, several for `\u{...}` and non-ASCII input).
    Char(Vec<u8>),
    /// `.` — any byte except `\n`.
    Dot,
    /// A resolved `[...]` / `[^...]` byte class.
    Class(BitSet),
    LParen,
    RParen,
    Pipe,
    Star,
    Plus,
    Quest,
}

fn lexical(msg: impl Into<String>) -> Error {
    Error::RegexLexical(msg.into())
}

struct Scanner<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Scanner<'a> {
    fn next_char(&mut self) -> Option<char> {
        self.chars.next()
    }

    fn expect_char(&mut self, what: &str) -> Result<char> {
        self.chars
            .next()
            .ok_or_else(|| lexical(format!("truncated {what}")))
    }

    /// Decode one escape sequence, the backslash already consumed.
    /// Returns the matched byte sequence.
    fn escape(&mut self) -> Result<Vec<u8>> {
        let c = self.expect_char("escape")?;
        let byte = match c {
            'n' => b'\n',
            'r' => b'\r',
            't' => b'\t',
            'a' => 0x07,
            'b' => 0x08,
            'f' => 0x0c,
            'v' => 0x0b,
            'x' => {
                let hi = self.expect_char("hex escape")?;
                let lo = self.expect_char("hex escape")?;
                let hi = hi
                    .to_digit(16)
                    .ok_or_else(|| lexical(format!("bad hex digit {hi:?}")))?;
                let lo = lo
                    .to_digit(16)
                    .ok_or_else(|| lexical(format!("bad hex digit {lo:?}")))?;
                (hi * 16 + lo) as u8
            }
            'u' => {
                if self.next_char() != Some('{') {
                    return Err(lexical("expected `{` after \\u"));
                }
                let mut v: u32 = 0;
                let mut ndigits = 0;
                loop {
                    let c = self.expect_char("unicode escape")?;
                    if c == '}' {
                        break;
                    }
                    let d = c
                        .to_digit(16)
                        .ok_or_else(|| lexical(format!("bad hex digit {c:?}")))?;
                    v = v
                        .checked_mul(16)
                        .and_then(|v| v.checked_add(d))
                        .ok_or_else(|| lexical("unicode escape out of range"))?;
                    ndigits += 1;
                }
                if ndigits == 0 {
                    return Err(lexical("empty unicode escape"));
                }
                let ch = char::from_u32(v)
                    .ok_or_else(|| lexical(format!("invalid code point {v:#x}")))?;
                let mut buf = [0u8; 4];
                return Ok(ch.encode_utf8(&mut buf).as_bytes().to_vec());
            }
            '0'..='7' => {
                // Octal: up to three digits including the one just read.
                let mut v = c.to_digit(8).unwrap();
                for _ in 0..2 {
                    match self.chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(d) => {
                            self.next_char();
                            v = v * 8 + d;
                        }
                        None => break,
                    }
                }
                if v > 0xff {
                    return Err(lexical("octal escape out of range"));
                }
                v as u8
            }
            c if c.is_ascii_alphanumeric() => {
                return Err(lexical(format!("unknown escape \\{c}")));
            }
            // Escaped metacharacter or punctuation: itself.
            c if (c as u32) < 0x80 => c as u8,
            c => {
                let mut buf = [0u8; 4];
                return Ok(c.encode_utf8(&mut buf).as_bytes().to_vec());
            }
        };
        Ok(vec![byte])
    }

    /// One class element as a single byte; multi-byte escapes are not
    /// representable inside a byte class.
    fn class_byte(&mut self, c: char) -> Result<u8> {
        if c == '\\' {
            let bytes = self.escape()?;
            if bytes.len() != 1 {
                return Err(lexical("multi-byte escape inside character class"));
            }
            Ok(bytes[0])
        } else if (c as u32) < 0x80 {
            Ok(c as u8)
        } else {
            Err(lexical("non-ASCII literal inside character class"))
        }
    }

    /// Parse `[...]` with the opening bracket already consumed.
    fn class(&mut self) -> Result<BitSet> {
        let mut set = BitSet::new(256)?;
        let negate = if self.chars.peek() == Some(&'^') {
            self.next_char();
            true
        } else {
            false
        };
        let mut closed = false;
        while let Some(c) = self.next_char() {
            if c == ']' {
                closed = true;
                break;
            }
            if (c as u32) < 0x20 {
                return Err(lexical("control character inside character class"));
            }
            let lo = self.class_byte(c)?;
            // Range, unless the `-` is the closing element.
            if self.chars.peek() == Some(&'-') {
                self.next_char();
                match self.chars.peek() {
                    Some(&']') | None => {
                        set.set(lo as usize);
                        set.set(b'-' as usize);
                        continue;
                    }
                    Some(&c2) => {
                        self.next_char();
                        if (c2 as u32) < 0x20 {
                            return Err(lexical("control character inside character class"));
                        }
                        let hi = self.class_byte(c2)?;
                        if hi < lo {
                            return Err(lexical(format!(
                                "reversed class range {}-{}",
                                lo as char, hi as char
                            )));
                        }
                        for b in lo..=hi {
                            set.set(b as usize);
                        }
                        continue;
                    }
                }
            }
            set.set(lo as usize);
        }
        if !closed {
            return Err(lexical("unterminated character class"));
        }
        if negate {
            let mut full = BitSet::new(256)?;
            for b in 0..256 {
                if !set.test(b) {
                    full.set(b);
                }
            }
            set = full;
        }
        Ok(set)
    }
}

/// Tokenize a whole pattern.
pub fn tokenize(pattern: &str) -> Result<Vec<Tok>> {
    let mut sc = Scanner {
        chars: pattern.chars().peekable(),
    };
    let mut out = Vec::new();
    while let Some(c) = sc.next_char() {
        let tok = match c {
            '.' => Tok::Dot,
            '(' => Tok::LParen,
            ')' => Tok::RParen,
            '|' => Tok::Pipe,
            '*' => Tok::Star,
            '+' => Tok::Plus,
            '?' => Tok::Quest,
            '[' => Tok::Class(sc.class()?),
            '^' | '$' => {
                return Err(Error::RegexSyntax(format!(
                    "anchor {c:?} not yet implemented"
                )));
            }
            '\\' => Tok::Char(sc.escape()?),
            c if (c as u32) < 0x20 => {
                return Err(lexical(format!(
                    "literal control character {:#04x} in pattern",
                    c as u32
                )));
            }
            c if (c as u32) < 0x80 => Tok::Char(vec![c as u8]),
            c => {
                let mut buf = [0u8; 4];
                Tok::Char(c.encode_utf8(&mut buf).as_bytes().to_vec())
            }
        };
        out.push(tok);
    }
    Ok(out)
}
