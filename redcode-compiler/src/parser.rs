use core::fmt;
use std::collections::HashMap;

use redcode::AddrMode;

use crate::lexer::{Token, TokenKind};

/// The grammatical role a parsed source line plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// A blank line, possibly following other blank lines
    Empty,
    /// A redcode instruction, optionally preceded by one or more labels
    Instruction,
    /// A pseudo-op (`equ`, `org`, `end`, `for`, `rof`)
    PseudoOp,
    /// A comment-only line
    Comment,
}

/// A single parsed line of redcode source.
#[derive(Debug, Clone, Default)]
pub struct SourceLine {
    /// 1-indexed source line number
    pub line: usize,
    /// 0-indexed position this line's instruction occupies in the assembled
    /// program, meaningful only when `kind == Instruction`
    pub code_line: usize,
    /// the grammatical role of this line
    pub kind: Option<LineKind>,
    /// zero or more labels preceding this line's op
    pub labels: Vec<String>,
    /// opcode or pseudo-op mnemonic, lowercased comparisons are the caller's
    /// responsibility
    pub op: Option<String>,
    /// explicit A-field address mode character, if present
    pub a_mode: Option<AddrMode>,
    /// A-field expression tokens
    pub a_expr: Vec<Token>,
    /// explicit B-field address mode character, if present
    pub b_mode: Option<AddrMode>,
    /// B-field expression tokens
    pub b_expr: Vec<Token>,
    /// comment text trailing this line, if any
    pub comment: Option<String>,
}

/// A parsed redcode source file: the sequence of lines plus the source line
/// every label and `equ`/`org`/`end` symbol was first defined on, used to
/// detect redefinitions.
#[derive(Debug, Clone, Default)]
pub struct ParsedProgram {
    /// every line of the program in source order
    pub lines: Vec<SourceLine>,
    /// symbol name to the source line it was first defined on
    pub symbols: HashMap<String, usize>,
}

/// A grammar error encountered while parsing redcode source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A token appeared where the grammar didn't allow it
    UnexpectedToken {
        /// 1-indexed source line
        line: usize,
        /// a description of what was found
        found: String,
    },
    /// A label or `equ`/`org` symbol was defined more than once
    LabelRedefined {
        /// 1-indexed source line of the second definition
        line: usize,
        /// the redefined symbol
        name: String,
    },
    /// Input ended mid-statement
    UnexpectedEof {
        /// 1-indexed source line input ended on
        line: usize,
    },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedToken { line, found } => {
                write!(f, "line {line}: unexpected token: {found}")
            }
            Self::LabelRedefined { line, name } => {
                write!(f, "line {line}: symbol '{name}' redefined")
            }
            Self::UnexpectedEof { line } => {
                write!(f, "line {line}: unexpected end of input")
            }
        }
    }
}

/// Pseudo-ops recognized by the grammar.
const PSEUDO_OPS: [&str; 5] = ["end", "equ", "org", "for", "rof"];

/// Does `name` (case-insensitively) name a pseudo-op?
fn is_pseudo_op(name: &str) -> bool {
    let lower = name.to_lowercase();
    PSEUDO_OPS.contains(&lower.as_str())
}

/// Does `name` (case-insensitively, optionally with a `.modifier` suffix)
/// look like an opcode mnemonic? Checked against the full '94 opcode set;
/// dialect-specific validity is the compiler's responsibility, not the
/// grammar's.
fn looks_like_opcode(name: &str) -> bool {
    if name.contains('.') {
        return true;
    }
    redcode::test_utils::OPCODES
        .iter()
        .any(|op| op.to_string().eq_ignore_ascii_case(name))
}

/// Does `name` terminate label collection, i.e. is it an op or pseudo-op?
fn is_op_token(name: &str) -> bool {
    looks_like_opcode(name) || is_pseudo_op(name)
}

/// A cursor-based parser consuming a pre-lexed token stream.
struct Parser<'a> {
    /// remaining tokens, `Eof` always present as the final element
    tokens: &'a [Token],
    /// cursor into `tokens`
    pos: usize,
    /// next synthetic code line index to assign to an instruction
    code_line: usize,
    /// lines accumulated so far
    lines: Vec<SourceLine>,
    /// symbol definitions seen so far, for redefinition checking
    symbols: HashMap<String, usize>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            code_line: 0,
            lines: Vec::new(),
            symbols: HashMap::new(),
        }
    }

    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .unwrap_or_else(|| self.tokens.last().expect("tokens always non-empty"))
    }

    fn bump(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn current_line(&self) -> usize {
        self.peek().line
    }

    fn define_symbol(&mut self, name: String, line: usize) -> Result<(), ParseError> {
        if let Some(&first) = self.symbols.get(&name) {
            let _ = first;
            return Err(ParseError::LabelRedefined { line, name });
        }
        self.symbols.insert(name, line);
        Ok(())
    }

    fn parse_program(mut self) -> Result<ParsedProgram, ParseError> {
        loop {
            match &self.peek().kind {
                TokenKind::Eof => break,
                TokenKind::Newline => self.parse_empty_run()?,
                TokenKind::Comment(_) => self.parse_comment_line()?,
                TokenKind::Text(_) => self.parse_labeled_line()?,
                other => {
                    return Err(ParseError::UnexpectedToken {
                        line: self.current_line(),
                        found: format!("{other:?}"),
                    })
                }
            }
        }
        Ok(ParsedProgram {
            lines: self.lines,
            symbols: self.symbols,
        })
    }

    /// Consumes one or more consecutive blank lines, recorded as a single
    /// `Empty` line per run, matching the loose line-accounting used by
    /// `org`/`equ` elsewhere in the grammar.
    fn parse_empty_run(&mut self) -> Result<(), ParseError> {
        let line = self.current_line();
        while matches!(self.peek().kind, TokenKind::Newline) {
            self.bump();
        }
        self.lines.push(SourceLine {
            line,
            kind: Some(LineKind::Empty),
            ..SourceLine::default()
        });
        Ok(())
    }

    fn parse_comment_line(&mut self) -> Result<(), ParseError> {
        let line = self.current_line();
        let TokenKind::Comment(text) = self.bump().kind else {
            unreachable!("caller checked for Comment")
        };
        self.expect_line_end()?;
        self.lines.push(SourceLine {
            line,
            kind: Some(LineKind::Comment),
            comment: Some(text),
            ..SourceLine::default()
        });
        Ok(())
    }

    /// Consumes a line that opens with one or more `Text` tokens: labels
    /// followed by an op or pseudo-op.
    fn parse_labeled_line(&mut self) -> Result<(), ParseError> {
        let line = self.current_line();
        let mut labels = Vec::new();

        loop {
            let TokenKind::Text(name) = self.peek().kind.clone() else {
                return Err(ParseError::UnexpectedToken {
                    line: self.current_line(),
                    found: format!("{:?}", self.peek().kind),
                });
            };
            if is_op_token(&name) {
                if is_pseudo_op(&name) {
                    return self.parse_pseudo_op(line, labels);
                }
                return self.parse_instruction(line, labels);
            }
            self.define_symbol(name.clone(), self.current_line())?;
            labels.push(name);
            self.bump();
            if !matches!(self.peek().kind, TokenKind::Text(_)) {
                return Err(ParseError::UnexpectedToken {
                    line: self.current_line(),
                    found: format!(
                        "label or op expected, got '{:?}'",
                        self.peek().kind
                    ),
                });
            }
        }
    }

    fn parse_pseudo_op(
        &mut self,
        line: usize,
        labels: Vec<String>,
    ) -> Result<(), ParseError> {
        let TokenKind::Text(op) = self.bump().kind else {
            unreachable!("caller checked for Text")
        };
        for label in &labels {
            self.define_symbol(label.clone(), line)?;
        }

        let mut expr = Vec::new();
        while matches!(
            self.peek().kind,
            TokenKind::Number(_) | TokenKind::ExprOp(_) | TokenKind::Star
                | TokenKind::LParen | TokenKind::RParen | TokenKind::Text(_)
        ) {
            expr.push(self.bump());
        }

        let comment = self.take_trailing_comment();
        let no_operands_ok = op.eq_ignore_ascii_case("end")
            || op.eq_ignore_ascii_case("for")
            || op.eq_ignore_ascii_case("rof");
        if expr.is_empty() && !no_operands_ok {
            return Err(ParseError::UnexpectedToken {
                line,
                found: format!(
                    "expected operand expression after pseudo-op '{op}', got {:?}",
                    self.peek().kind
                ),
            });
        }
        self.expect_line_end()?;

        self.lines.push(SourceLine {
            line,
            kind: Some(LineKind::PseudoOp),
            labels,
            op: Some(op),
            a_expr: expr,
            comment,
            ..SourceLine::default()
        });
        Ok(())
    }

    fn parse_instruction(
        &mut self,
        line: usize,
        labels: Vec<String>,
    ) -> Result<(), ParseError> {
        let TokenKind::Text(op) = self.bump().kind else {
            unreachable!("caller checked for Text")
        };
        let code_line = self.code_line;
        self.code_line += 1;

        let a_mode = self.take_mode_if_present();
        let a_expr = self.parse_expr_run();
        if a_expr.is_empty() && a_mode.is_none() {
            return Err(ParseError::UnexpectedToken {
                line,
                found: format!(
                    "expected operand expression after op, got {:?}",
                    self.peek().kind
                ),
            });
        }

        let (b_mode, b_expr) = if matches!(self.peek().kind, TokenKind::Comma) {
            self.bump();
            let b_mode = self.take_mode_if_present();
            let b_expr = self.parse_expr_run();
            (b_mode, b_expr)
        } else {
            (None, Vec::new())
        };

        let comment = self.take_trailing_comment();
        self.expect_line_end()?;

        self.lines.push(SourceLine {
            line,
            code_line,
            kind: Some(LineKind::Instruction),
            labels,
            op: Some(op),
            a_mode,
            a_expr,
            b_mode,
            b_expr,
            comment,
        });
        Ok(())
    }

    fn take_mode_if_present(&mut self) -> Option<AddrMode> {
        if let TokenKind::AddrMode(mode) = self.peek().kind {
            self.bump();
            Some(mode)
        } else if matches!(self.peek().kind, TokenKind::Star) {
            self.bump();
            Some(AddrMode::IndirectA)
        } else {
            None
        }
    }

    fn parse_expr_run(&mut self) -> Vec<Token> {
        let mut expr = Vec::new();
        while matches!(
            self.peek().kind,
            TokenKind::Number(_) | TokenKind::ExprOp(_) | TokenKind::Star
                | TokenKind::LParen | TokenKind::RParen | TokenKind::Text(_)
        ) {
            expr.push(self.bump());
        }
        expr
    }

    fn take_trailing_comment(&mut self) -> Option<String> {
        if let TokenKind::Comment(text) = self.peek().kind.clone() {
            self.bump();
            Some(text)
        } else {
            None
        }
    }

    fn expect_line_end(&mut self) -> Result<(), ParseError> {
        match self.peek().kind {
            TokenKind::Newline => {
                self.bump();
                Ok(())
            }
            TokenKind::Eof => Ok(()),
            _ => Err(ParseError::UnexpectedToken {
                line: self.current_line(),
                found: format!("expected newline, got {:?}", self.peek().kind),
            }),
        }
    }
}

/// Parses a token stream produced by [`crate::lexer::tokenize`] into a
/// [`ParsedProgram`].
///
/// # Errors
///
/// Returns a [`ParseError`] at the first point the token stream does not
/// match the line grammar, or a label/`equ`/`org` symbol is redefined.
pub fn parse(tokens: &[Token]) -> Result<ParsedProgram, ParseError> {
    Parser::new(tokens).parse_program()
}

#[cfg(test)]
mod tests {
    use coverage_helper::test;

    use super::*;
    use crate::lexer::tokenize;

    #[test]
    fn parses_a_bare_instruction() {
        let tokens = tokenize("MOV.I $0, $1\n").unwrap();
        let program = parse(&tokens).unwrap();
        assert_eq!(program.lines.len(), 1);
        assert_eq!(program.lines[0].kind, Some(LineKind::Instruction));
        assert_eq!(program.lines[0].op.as_deref(), Some("MOV.I"));
    }

    #[test]
    fn parses_a_label_preceding_an_instruction() {
        let tokens = tokenize("loop MOV.I $0, $1\n").unwrap();
        let program = parse(&tokens).unwrap();
        assert_eq!(program.lines[0].labels, vec!["loop".to_owned()]);
        assert!(program.symbols.contains_key("loop"));
    }

    #[test]
    fn redefining_a_label_is_an_error() {
        let tokens =
            tokenize("a MOV $0, $1\na MOV $0, $1\n").unwrap();
        let err = parse(&tokens).unwrap_err();
        assert!(matches!(err, ParseError::LabelRedefined { .. }));
    }

    #[test]
    fn parses_an_equ_pseudo_op() {
        let tokens = tokenize("step equ 4\nMOV $0, $1\n").unwrap();
        let program = parse(&tokens).unwrap();
        assert_eq!(program.lines[0].kind, Some(LineKind::PseudoOp));
        assert_eq!(program.lines[0].op.as_deref(), Some("equ"));
        assert_eq!(program.lines[0].a_expr.len(), 1);
    }

    #[test]
    fn end_with_no_operand_is_valid() {
        let tokens = tokenize("MOV $0, $1\nend\n").unwrap();
        let program = parse(&tokens).unwrap();
        assert_eq!(program.lines[1].op.as_deref(), Some("end"));
        assert!(program.lines[1].a_expr.is_empty());
    }

    #[test]
    fn equ_with_no_operand_is_an_error() {
        let tokens = tokenize("step equ\n").unwrap();
        assert!(parse(&tokens).is_err());
    }

    #[test]
    fn comment_only_line_parses() {
        let tokens = tokenize(";name Imp\nMOV.I $0, $1\n").unwrap();
        let program = parse(&tokens).unwrap();
        assert_eq!(program.lines[0].kind, Some(LineKind::Comment));
        assert_eq!(program.lines[0].comment.as_deref(), Some("name Imp"));
    }

    #[test]
    fn code_lines_are_numbered_independently_of_source_lines() {
        let tokens =
            tokenize("; a comment\nMOV $0, $1\nMOV $0, $1\n").unwrap();
        let program = parse(&tokens).unwrap();
        let instrs: Vec<_> = program
            .lines
            .iter()
            .filter(|l| l.kind == Some(LineKind::Instruction))
            .collect();
        assert_eq!(instrs[0].code_line, 0);
        assert_eq!(instrs[1].code_line, 1);
    }

    #[test]
    fn b_field_is_optional() {
        let tokens = tokenize("DAT #0\n").unwrap();
        let program = parse(&tokens).unwrap();
        assert!(program.lines[0].b_expr.is_empty());
        assert!(program.lines[0].b_mode.is_none());
    }

    #[test]
    fn explicit_modes_are_captured() {
        let tokens = tokenize("MOV }1, <2\n").unwrap();
        let program = parse(&tokens).unwrap();
        assert_eq!(program.lines[0].a_mode, Some(AddrMode::PostincA));
        assert_eq!(program.lines[0].b_mode, Some(AddrMode::PredecB));
    }

    #[test]
    fn star_without_a_preceding_operator_is_an_indirect_a_mode() {
        let tokens = tokenize("MOV *1, $2\n").unwrap();
        let program = parse(&tokens).unwrap();
        assert_eq!(program.lines[0].a_mode, Some(AddrMode::IndirectA));
    }
}
