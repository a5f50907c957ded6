use core::fmt;

/// A single expression operator recognized by the lexer.
///
/// `*` is deliberately excluded: it is ambiguous with the A-indirect address
/// mode character and is only disambiguated once the parser knows its
/// position on the line (see [`TokenKind::Star`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprOp {
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `/`
    Slash,
    /// `%`
    Percent,
}

impl fmt::Display for ExprOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Self::Plus => '+',
            Self::Minus => '-',
            Self::Slash => '/',
            Self::Percent => '%',
        };
        write!(f, "{c}")
    }
}

/// The kind of token produced by the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// An identifier: an opcode, modifier, pseudo-op, or label/symbol name.
    /// Case is preserved; callers compare case-insensitively where the
    /// grammar calls for it (opcodes and pseudo-ops).
    Text(String),
    /// A non-negative integer literal. Sign is never part of a `Number`
    /// token; it is carried by a preceding [`ExprOp::Plus`] or
    /// [`ExprOp::Minus`] token instead.
    Number(i64),
    /// An unambiguous address-mode character: `$ # @ { } < >`.
    AddrMode(redcode::AddrMode),
    /// `*`, ambiguous between the A-indirect address mode and
    /// multiplication. Resolved by the parser based on position.
    Star,
    /// An expression operator other than `*`.
    ExprOp(ExprOp),
    /// `,`
    Comma,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// The text of a comment, from just after the `;` to (not including) the
    /// line ending.
    Comment(String),
    /// A line ending. Newlines are significant: they terminate a source
    /// line.
    Newline,
    /// End of input.
    Eof,
}

/// A token tagged with the 1-indexed source line it was lexed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// 1-indexed source line this token appeared on
    pub line: usize,
}

/// A lexical error: an unexpected character was encountered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    /// 1-indexed source line the bad character appeared on
    pub line: usize,
    /// The offending character
    pub character: char,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lexical error at line {}: unexpected character {:?}",
            self.line, self.character
        )
    }
}

/// Is this character valid within an identifier (after the first
/// character)? Letters, digits, `.`, and `_`.
fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == '_'
}

/// Is this character valid as the first character of an identifier?
/// Identifiers cannot start with a digit.
fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '.' || c == '_'
}

/// Tokenizes a complete redcode source file.
///
/// # Errors
///
/// Returns a [`LexError`] naming the offending character and line if an
/// unrecognized character is encountered. Lexing stops at the first error.
pub fn tokenize(src: &str) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();
    let mut line = 1_usize;
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0_usize;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => {
                tokens.push(Token {
                    kind: TokenKind::Newline,
                    line,
                });
                line += 1;
                i += 1;
            }
            '\r' => {
                // Treat CRLF as a single newline; a lone CR is swallowed as
                // whitespace, matching common redcode tooling.
                i += 1;
            }
            c if c.is_whitespace() => {
                i += 1;
            }
            ';' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != '\n' && chars[end] != '\r'
                {
                    end += 1;
                }
                let text: String = chars[start..end].iter().collect();
                tokens.push(Token {
                    kind: TokenKind::Comment(text),
                    line,
                });
                i = end;
            }
            '$' => push_mode(&mut tokens, line, redcode::AddrMode::Direct, &mut i),
            '#' => {
                push_mode(&mut tokens, line, redcode::AddrMode::Immediate, &mut i);
            }
            '@' => {
                push_mode(&mut tokens, line, redcode::AddrMode::IndirectB, &mut i);
            }
            '{' => push_mode(&mut tokens, line, redcode::AddrMode::PredecA, &mut i),
            '<' => push_mode(&mut tokens, line, redcode::AddrMode::PredecB, &mut i),
            '}' => {
                push_mode(&mut tokens, line, redcode::AddrMode::PostincA, &mut i);
            }
            '>' => {
                push_mode(&mut tokens, line, redcode::AddrMode::PostincB, &mut i);
            }
            '*' => {
                tokens.push(Token {
                    kind: TokenKind::Star,
                    line,
                });
                i += 1;
            }
            '+' => {
                tokens.push(Token {
                    kind: TokenKind::ExprOp(ExprOp::Plus),
                    line,
                });
                i += 1;
            }
            '-' => {
                tokens.push(Token {
                    kind: TokenKind::ExprOp(ExprOp::Minus),
                    line,
                });
                i += 1;
            }
            '/' => {
                tokens.push(Token {
                    kind: TokenKind::ExprOp(ExprOp::Slash),
                    line,
                });
                i += 1;
            }
            '%' => {
                tokens.push(Token {
                    kind: TokenKind::ExprOp(ExprOp::Percent),
                    line,
                });
                i += 1;
            }
            ',' => {
                tokens.push(Token {
                    kind: TokenKind::Comma,
                    line,
                });
                i += 1;
            }
            '(' => {
                tokens.push(Token {
                    kind: TokenKind::LParen,
                    line,
                });
                i += 1;
            }
            ')' => {
                tokens.push(Token {
                    kind: TokenKind::RParen,
                    line,
                });
                i += 1;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                let mut end = i;
                while end < chars.len() && chars[end].is_ascii_digit() {
                    end += 1;
                }
                let text: String = chars[start..end].iter().collect();
                // Digits-only, always fits: guarded by the loop above.
                let value: i64 = text.parse().unwrap_or(i64::MAX);
                tokens.push(Token {
                    kind: TokenKind::Number(value),
                    line,
                });
                i = end;
            }
            c if is_ident_start(c) => {
                let start = i;
                let mut end = i;
                while end < chars.len() && is_ident_continue(chars[end]) {
                    end += 1;
                }
                let text: String = chars[start..end].iter().collect();
                tokens.push(Token {
                    kind: TokenKind::Text(text),
                    line,
                });
                i = end;
            }
            other => {
                return Err(LexError {
                    line,
                    character: other,
                })
            }
        }
    }
    tokens.push(Token {
        kind: TokenKind::Eof,
        line,
    });
    Ok(tokens)
}

/// Pushes an unambiguous address-mode token and advances the cursor by one
/// character.
fn push_mode(
    tokens: &mut Vec<Token>,
    line: usize,
    mode: redcode::AddrMode,
    i: &mut usize,
) {
    tokens.push(Token {
        kind: TokenKind::AddrMode(mode),
        line,
    });
    *i += 1;
}

#[cfg(test)]
mod tests {
    use coverage_helper::test;

    use super::*;

    #[test]
    fn tokenizes_a_simple_instruction() {
        let tokens = tokenize("MOV.I $0, $1\n").expect("should lex");
        let kinds: Vec<&TokenKind> = tokens.iter().map(|t| &t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                &TokenKind::Text("MOV.I".to_owned()),
                &TokenKind::AddrMode(redcode::AddrMode::Direct),
                &TokenKind::Number(0),
                &TokenKind::Comma,
                &TokenKind::AddrMode(redcode::AddrMode::Direct),
                &TokenKind::Number(1),
                &TokenKind::Newline,
                &TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn star_is_its_own_ambiguous_token() {
        let tokens = tokenize("*\n").expect("should lex");
        assert_eq!(tokens[0].kind, TokenKind::Star);
    }

    #[test]
    fn negative_sign_is_a_separate_token_from_the_number() {
        let tokens = tokenize("-5").expect("should lex");
        assert_eq!(
            tokens[0].kind,
            TokenKind::ExprOp(ExprOp::Minus)
        );
        assert_eq!(tokens[1].kind, TokenKind::Number(5));
    }

    #[test]
    fn comment_runs_to_end_of_line_excluding_newline() {
        let tokens = tokenize(";name Imp\nMOV $0,$1").expect("should lex");
        assert_eq!(
            tokens[0].kind,
            TokenKind::Comment("name Imp".to_owned())
        );
        assert_eq!(tokens[1].kind, TokenKind::Newline);
    }

    #[test]
    fn identifiers_may_contain_dots_and_underscores() {
        let tokens = tokenize("my_label.x").expect("should lex");
        assert_eq!(
            tokens[0].kind,
            TokenKind::Text("my_label.x".to_owned())
        );
    }

    #[test]
    fn unexpected_character_is_an_error() {
        let err = tokenize("mov $0, $1 ^").expect_err("should fail to lex");
        assert_eq!(err.character, '^');
    }

    #[test]
    fn lines_are_tracked_for_error_reporting() {
        let tokens = tokenize("mov $0,$1\nmov $0,$1\n^").expect_err("third line is bad");
        assert_eq!(tokens.line, 3);
    }
}
