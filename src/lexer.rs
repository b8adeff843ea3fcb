use crate::token::{self, Map, Token, ID};

type Result<T, E = Error> = std::result::Result<T, E>;

/// The Sift lexer.
///
/// ## Implementation Remarks
///
/// This type implements the [`Iterator`] trait to make consumers walk through
/// the tokens without allocating a collection to hold all of them at once;
/// the iterator ends when the source stream is exhausted. Use [`tokenize`]
/// for the eager, collect-everything form.
///
/// Identifiers, keywords and literals all resolve through the provided
/// [`Map`], so keyword recognition is just interning: `func` comes back as
/// its fixed built-in ID. Source must be ASCII; the only place a non-ASCII
/// byte is tolerated is inside a comment.
///
/// A line break terminating a token which satisfies
/// [`is_implicit_semicolon`] produces an extra `;` token, so that the parser
/// never has to care about newlines.
///
/// [`is_implicit_semicolon`]: ID::is_implicit_semicolon
pub struct Lexer<'src, 'map> {
    src: &'src [u8],
    map: &'map mut Map,
    cursor: usize,
    line: u32,
    last: ID,
    failed: bool,
}

/// Eagerly lexes the whole of `src`.
pub fn tokenize(src: &[u8], map: &mut Map) -> Result<Vec<Token>> {
    Lexer::new(src, map).collect()
}

impl Iterator for Lexer<'_, '_> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.scan() {
            Ok(Some(token)) => {
                self.last = token.id;
                Some(Ok(token))
            }
            Ok(None) => None,
            Err(error) => {
                self.failed = true;
                Some(Err(error))
            }
        }
    }
}

impl Lexer<'_, '_> {
    /// Scans the next token, or `None` at end of input.
    fn scan(&mut self) -> Result<Option<Token>> {
        loop {
            let Some(c) = self.peek() else {
                return Ok(None);
            };
            match c {
                b' ' | b'\t' | b'\r' => {
                    self.advance();
                }
                b'\n' => {
                    let line = self.line;
                    self.advance();
                    self.line += 1;
                    if self.last.is_implicit_semicolon(self.map) {
                        return Ok(Some(Token {
                            id: ID::SEMICOLON,
                            line,
                        }));
                    }
                }
                b'/' if self.peek_at(1) == Some(b'/') => self.comment(),
                c if c == b'_' || c.is_ascii_alphabetic() => {
                    return self.ident().map(Some);
                }
                c if c.is_ascii_digit() => return self.number().map(Some),
                b'"' => return self.string().map(Some),
                c if c.is_ascii() => return self.squiggle().map(Some),
                c => {
                    return Err(Error::NonAsciiByte {
                        byte: c,
                        line: self.line,
                    });
                }
            }
        }
    }

    fn ident(&mut self) -> Result<Token> {
        let lo = self.cursor;
        while let Some(c) = self.peek() {
            if c == b'_' || c.is_ascii_alphanumeric() {
                self.advance();
            } else {
                break;
            }
        }
        self.produce(lo)
    }

    fn number(&mut self) -> Result<Token> {
        let lo = self.cursor;
        self.advance();
        let hex = self.peek() == Some(b'x') && self.src[lo] == b'0';
        if hex {
            self.advance();
        }
        while let Some(c) = self.peek() {
            let more = if hex {
                c.is_ascii_hexdigit()
            } else {
                c.is_ascii_digit()
            };
            if !more {
                break;
            }
            self.advance();
        }
        self.produce(lo)
    }

    /// Scans a string literal. The token's interned form keeps the
    /// surrounding quotes, which is what makes the first-byte classification
    /// in [`ID::is_str_literal`] work.
    fn string(&mut self) -> Result<Token> {
        let lo = self.cursor;
        self.advance();
        loop {
            match self.peek() {
                Some(b'"') => {
                    self.advance();
                    return self.produce(lo);
                }
                Some(b'\n') | None => {
                    return Err(Error::UnclosedString { line: self.line });
                }
                Some(c) if !c.is_ascii() => {
                    return Err(Error::NonAsciiByte {
                        byte: c,
                        line: self.line,
                    });
                }
                Some(_) => self.advance(),
            }
        }
    }

    fn comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == b'\n' {
                break;
            }
            self.advance();
        }
    }

    fn squiggle(&mut self) -> Result<Token> {
        let (id, n) = token::next_squiggle(&self.src[self.cursor..]);
        if id == ID::INVALID {
            return Err(Error::UnexpectedByte {
                byte: self.src[self.cursor],
                line: self.line,
            });
        }
        self.cursor += n;
        Ok(Token {
            id,
            line: self.line,
        })
    }
}

impl<'src, 'map> Lexer<'src, 'map> {
    pub fn new(src: &'src [u8], map: &'map mut Map) -> Lexer<'src, 'map> {
        Lexer {
            src,
            map,
            cursor: 0,
            line: 1,
            last: ID::INVALID,
            failed: false,
        }
    }

    /// Returns the current byte without advancing.
    fn peek(&self) -> Option<u8> {
        self.src.get(self.cursor).copied()
    }

    fn peek_at(&self, n: usize) -> Option<u8> {
        self.src.get(self.cursor + n).copied()
    }

    fn advance(&mut self) {
        self.cursor += 1;
    }

    /// Interns the bytes scanned since `lo`, producing a token.
    fn produce(&mut self, lo: usize) -> Result<Token> {
        // The scanning functions only accept ASCII, so the slice is valid
        // UTF-8.
        let name = std::str::from_utf8(&self.src[lo..self.cursor])
            .map_err(|_| Error::NonAsciiByte {
                byte: self.src[lo],
                line: self.line,
            })?;
        let id = self
            .map
            .intern(name)
            .map_err(|_| Error::TooManyTokens { line: self.line })?;
        Ok(Token {
            id,
            line: self.line,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("line {line}: unexpected byte 0x{byte:02X}")]
    UnexpectedByte { byte: u8, line: u32 },
    #[error("line {line}: non-ASCII byte 0x{byte:02X}")]
    NonAsciiByte { byte: u8, line: u32 },
    #[error("line {line}: unclosed string literal")]
    UnclosedString { line: u32 },
    #[error("line {line}: too many distinct tokens")]
    TooManyTokens { line: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lex(src: &str, map: &mut Map) -> Vec<Token> {
        tokenize(src.as_bytes(), map).unwrap()
    }

    fn ids(src: &str, map: &mut Map) -> Vec<ID> {
        lex(src, map).into_iter().map(|t| t.id).collect()
    }

    #[test]
    fn maximal_munch() {
        let m = &mut Map::new();
        assert_eq!(ids("<<=", m), [ID::SHIFT_L_EQ]);
        assert_eq!(ids("<<", m), [ID::SHIFT_L]);
        assert_eq!(ids("<=", m), [ID::LESS_EQ]);
        assert_eq!(ids("<", m), [ID::LESS_THAN]);
        assert_eq!(ids("~sat+=", m), [ID::TILDE_SAT_PLUS_EQ]);
        assert_eq!(ids("~mod-", m), [ID::TILDE_MOD_MINUS]);
        assert_eq!(
            ids("<<=<< <=<", m),
            [ID::SHIFT_L_EQ, ID::SHIFT_L, ID::LESS_EQ, ID::LESS_THAN]
        );
        assert_eq!(ids("=:=", m), [ID::EQ_COLON, ID::EQ]);
    }

    #[test]
    fn keywords_and_identifiers() {
        let m = &mut Map::new();
        let got = ids("func frame_count if else read_u8", m);
        let frame_count = m.intern("frame_count").unwrap();
        assert_eq!(
            got,
            [ID::FUNC, frame_count, ID::IF, ID::ELSE, ID::READ_U8]
        );
        assert!(!frame_count.is_built_in());
        // Interning twice returns the same ID.
        assert_eq!(ids("frame_count frame_count", m), [frame_count, frame_count]);
    }

    #[test]
    fn numbers() {
        let m = &mut Map::new();
        let got = ids("0 255 0xFF", m);
        let v255 = m.intern("255").unwrap();
        let vff = m.intern("0xFF").unwrap();
        assert_eq!(got, [ID::LIT_0, v255, vff]);
        assert!(v255.is_num_literal(m));
        assert!(vff.is_num_literal(m));
    }

    #[test]
    fn strings() {
        let m = &mut Map::new();
        let got = ids("error \"bad receiver\"", m);
        let msg = m.intern("\"bad receiver\"").unwrap();
        assert_eq!(got, [ID::ERROR, msg]);
        assert!(msg.is_str_literal(m));

        assert_eq!(
            tokenize(b"\"oops", &mut Map::new()),
            Err(Error::UnclosedString { line: 1 })
        );
        assert_eq!(
            tokenize(b"\"oops\nmore\"", &mut Map::new()),
            Err(Error::UnclosedString { line: 1 })
        );
    }

    #[test]
    fn comments_produce_no_tokens() {
        let m = &mut Map::new();
        assert_eq!(ids("// nothing here\nif", m), [ID::IF]);
        // A comment still ends the line for implicit-semicolon purposes.
        assert_eq!(
            ids("break // and stop\nif", m),
            [ID::BREAK, ID::SEMICOLON, ID::IF]
        );
    }

    #[test]
    fn implicit_semicolons() {
        let m = &mut Map::new();
        let x = m.intern("x").unwrap();
        assert_eq!(
            ids("x = 1\nbreak\n(\n)\n", m),
            [
                x,
                ID::EQ,
                ID::LIT_1,
                ID::SEMICOLON,
                ID::BREAK,
                ID::SEMICOLON,
                ID::OPEN_PAREN,
                ID::CLOSE_PAREN,
                ID::SEMICOLON,
            ]
        );
        // No insertion after tokens which cannot end a statement.
        assert_eq!(ids("x +\n1", m), [x, ID::PLUS, ID::LIT_1]);
    }

    #[test]
    fn line_numbers() {
        let m = &mut Map::new();
        let tokens = lex("if\n\nwhile {\n}", m);
        let lines: Vec<u32> = tokens.iter().map(|t| t.line).collect();
        assert_eq!(
            tokens.iter().map(|t| t.id).collect::<Vec<_>>(),
            [ID::IF, ID::WHILE, ID::OPEN_CURLY, ID::CLOSE_CURLY]
        );
        assert_eq!(lines, [1, 3, 3, 4]);
    }

    #[test]
    fn rejects_unexpected_bytes() {
        assert_eq!(
            tokenize(b"x # y", &mut Map::new()),
            Err(Error::UnexpectedByte { byte: b'#', line: 1 })
        );
        assert_eq!(
            tokenize("caf\u{e9}".as_bytes(), &mut Map::new()),
            Err(Error::NonAsciiByte { byte: 0xC3, line: 1 })
        );
    }
}
