use core::fmt;
use std::collections::HashMap;

use crate::lexer::{ExprOp, Token, TokenKind};

/// A binary arithmetic operator usable inside a redcode expression.
///
/// `*` doubles as the A-indirect address mode character outside of an
/// expression; within an expression (anywhere the parser has not already
/// consumed it as a mode) it is multiplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
}

/// An error encountered while substituting symbols into, or evaluating, an
/// expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    /// A `/` or `%` attempted division by zero.
    DivisionByZero {
        /// 1-indexed source line
        line: usize,
    },
    /// A symbol referenced in the expression is neither an `equ` value nor a
    /// code label.
    UnresolvedSymbol {
        /// 1-indexed source line
        line: usize,
        /// the unresolved name
        name: String,
    },
    /// The token sequence does not form a valid expression (unbalanced
    /// parens, a missing operand, a stray operator).
    InvalidExpression {
        /// 1-indexed source line
        line: usize,
    },
}

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DivisionByZero { line } => {
                write!(f, "line {line}: division by zero")
            }
            Self::UnresolvedSymbol { line, name } => {
                write!(f, "line {line}: unresolved symbol '{name}'")
            }
            Self::InvalidExpression { line } => {
                write!(f, "line {line}: invalid expression")
            }
        }
    }
}

/// Repeatedly substitutes `equ` symbols and code labels into `tokens` until a
/// fixed point is reached (no further substitution changes the token
/// sequence).
///
/// A label reference is replaced with a signed numeric literal holding its
/// offset from `current_line`, reduced modulo `core_size`: a label's
/// expression value is always relative to the line referencing it, not its
/// absolute address. An `equ` reference is replaced with its (unexpanded)
/// token body, which may itself contain further symbols; the loop continues
/// until no `Text` token resolves to either map.
///
/// # Errors
///
/// Returns [`ExprError::UnresolvedSymbol`] if a `Text` token names neither an
/// `equ` value nor a label.
pub fn substitute_symbols(
    tokens: &[Token],
    equs: &HashMap<String, Vec<Token>>,
    labels: &HashMap<String, usize>,
    current_line: usize,
    core_size: u32,
) -> Result<Vec<Token>, ExprError> {
    let mut current = tokens.to_vec();
    loop {
        let mut next = Vec::with_capacity(current.len());
        let mut changed = false;
        for tok in &current {
            let TokenKind::Text(name) = &tok.kind else {
                next.push(tok.clone());
                continue;
            };
            if let Some(body) = equs.get(name) {
                next.extend(body.iter().cloned());
                changed = true;
                continue;
            }
            if let Some(&label_line) = labels.get(name) {
                let offset = signed_mod(
                    i64::try_from(label_line).unwrap_or(i64::MAX)
                        - i64::try_from(current_line).unwrap_or(i64::MAX),
                    core_size,
                );
                push_signed_literal(&mut next, offset, tok.line);
                changed = true;
                continue;
            }
            return Err(ExprError::UnresolvedSymbol {
                line: tok.line,
                name: name.clone(),
            });
        }
        current = next;
        if !changed {
            return Ok(current);
        }
    }
}

/// Reduces `value` into `(-(core_size as i64 - 1))..=(core_size as i64 - 1)`,
/// matching the modulo-with-sign convention used to render label offsets as
/// source tokens.
fn signed_mod(value: i64, core_size: u32) -> i64 {
    let m = i64::from(core_size);
    if m == 0 {
        return value;
    }
    value % m
}

/// Pushes a (possibly negative) literal as a sign token followed by a
/// `Number` token, matching how the lexer itself represents signed literals.
fn push_signed_literal(tokens: &mut Vec<Token>, value: i64, line: usize) {
    if value < 0 {
        tokens.push(Token {
            kind: TokenKind::ExprOp(ExprOp::Minus),
            line,
        });
        tokens.push(Token {
            kind: TokenKind::Number(value.unsigned_abs().try_into().unwrap_or(i64::MAX)),
            line,
        });
    } else {
        tokens.push(Token {
            kind: TokenKind::Number(value),
            line,
        });
    }
}

/// A small precedence-climbing evaluator over a fully-substituted token
/// stream (no remaining `Text` tokens).
struct Evaluator<'a> {
    /// remaining tokens
    tokens: &'a [Token],
    /// cursor into `tokens`
    pos: usize,
    /// line used to report errors if `tokens` is empty
    fallback_line: usize,
}

impl<'a> Evaluator<'a> {
    fn new(tokens: &'a [Token], fallback_line: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            fallback_line,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn line(&self) -> usize {
        self.peek().map_or(self.fallback_line, |t| t.line)
    }

    fn bump(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        self.pos += 1;
        tok
    }

    /// expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<i64, ExprError> {
        let mut value = self.term()?;
        loop {
            let op = match self.peek().map(|t| &t.kind) {
                Some(TokenKind::ExprOp(ExprOp::Plus)) => ArithOp::Add,
                Some(TokenKind::ExprOp(ExprOp::Minus)) => ArithOp::Sub,
                _ => break,
            };
            self.bump();
            let rhs = self.term()?;
            value = match op {
                ArithOp::Add => value.wrapping_add(rhs),
                ArithOp::Sub => value.wrapping_sub(rhs),
                _ => unreachable!("only Add/Sub produced above"),
            };
        }
        Ok(value)
    }

    /// term := unary (('*' | '/' | '%') unary)*
    fn term(&mut self) -> Result<i64, ExprError> {
        let mut value = self.unary()?;
        loop {
            let op = match self.peek().map(|t| &t.kind) {
                Some(TokenKind::Star) => ArithOp::Mul,
                Some(TokenKind::ExprOp(ExprOp::Slash)) => ArithOp::Div,
                Some(TokenKind::ExprOp(ExprOp::Percent)) => ArithOp::Mod,
                _ => break,
            };
            let line = self.line();
            self.bump();
            let rhs = self.unary()?;
            value = match op {
                ArithOp::Mul => value.wrapping_mul(rhs),
                ArithOp::Div => {
                    if rhs == 0 {
                        return Err(ExprError::DivisionByZero { line });
                    }
                    value.wrapping_div(rhs)
                }
                ArithOp::Mod => {
                    if rhs == 0 {
                        return Err(ExprError::DivisionByZero { line });
                    }
                    value.wrapping_rem(rhs)
                }
                ArithOp::Add | ArithOp::Sub => {
                    unreachable!("only Mul/Div/Mod produced above")
                }
            };
        }
        Ok(value)
    }

    /// unary := ('+' | '-')* primary
    fn unary(&mut self) -> Result<i64, ExprError> {
        let mut negate = false;
        loop {
            match self.peek().map(|t| &t.kind) {
                Some(TokenKind::ExprOp(ExprOp::Plus)) => {
                    self.bump();
                }
                Some(TokenKind::ExprOp(ExprOp::Minus)) => {
                    negate = !negate;
                    self.bump();
                }
                _ => break,
            }
        }
        let value = self.primary()?;
        Ok(if negate { value.wrapping_neg() } else { value })
    }

    /// primary := Number | '(' expr ')'
    fn primary(&mut self) -> Result<i64, ExprError> {
        let line = self.line();
        match self.bump().map(|t| &t.kind) {
            Some(TokenKind::Number(n)) => Ok(*n),
            Some(TokenKind::LParen) => {
                let value = self.expr()?;
                match self.bump().map(|t| &t.kind) {
                    Some(TokenKind::RParen) => Ok(value),
                    _ => Err(ExprError::InvalidExpression { line }),
                }
            }
            _ => Err(ExprError::InvalidExpression { line }),
        }
    }
}

/// Evaluates a fully symbol-substituted token stream to a signed integer.
///
/// Standard precedence applies: `*`, `/`, `%` bind tighter than `+`, `-`;
/// parentheses override precedence; unary `+`/`-` prefixes a primary term.
///
/// # Errors
///
/// Returns [`ExprError::InvalidExpression`] if the tokens don't form a
/// complete expression, or [`ExprError::DivisionByZero`] if a `/` or `%`
/// divisor evaluates to zero.
pub fn evaluate(tokens: &[Token], fallback_line: usize) -> Result<i64, ExprError> {
    if tokens.is_empty() {
        return Err(ExprError::InvalidExpression {
            line: fallback_line,
        });
    }
    let mut evaluator = Evaluator::new(tokens, fallback_line);
    let value = evaluator.expr()?;
    if evaluator.pos != tokens.len() {
        return Err(ExprError::InvalidExpression {
            line: evaluator.line(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use coverage_helper::test;

    use super::*;

    fn num(n: i64) -> Token {
        Token {
            kind: TokenKind::Number(n),
            line: 1,
        }
    }

    fn op(o: ExprOp) -> Token {
        Token {
            kind: TokenKind::ExprOp(o),
            line: 1,
        }
    }

    #[test]
    fn evaluates_a_plain_literal() {
        assert_eq!(evaluate(&[num(5)], 1), Ok(5));
    }

    #[test]
    fn evaluates_addition() {
        let tokens = vec![num(1), op(ExprOp::Plus), num(2)];
        assert_eq!(evaluate(&tokens, 1), Ok(3));
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        // 1 + 2 * 3 == 7
        let tokens = vec![
            num(1),
            op(ExprOp::Plus),
            num(2),
            Token {
                kind: TokenKind::Star,
                line: 1,
            },
            num(3),
        ];
        assert_eq!(evaluate(&tokens, 1), Ok(7));
    }

    #[test]
    fn parens_override_precedence() {
        // (1 + 2) * 3 == 9
        let tokens = vec![
            Token {
                kind: TokenKind::LParen,
                line: 1,
            },
            num(1),
            op(ExprOp::Plus),
            num(2),
            Token {
                kind: TokenKind::RParen,
                line: 1,
            },
            Token {
                kind: TokenKind::Star,
                line: 1,
            },
            num(3),
        ];
        assert_eq!(evaluate(&tokens, 1), Ok(9));
    }

    #[test]
    fn repeated_unary_minus_collapses() {
        // - - 5 == 5
        let tokens = vec![op(ExprOp::Minus), op(ExprOp::Minus), num(5)];
        assert_eq!(evaluate(&tokens, 1), Ok(5));
    }

    #[test]
    fn single_unary_minus_negates() {
        let tokens = vec![op(ExprOp::Minus), num(5)];
        assert_eq!(evaluate(&tokens, 1), Ok(-5));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let tokens = vec![num(5), op(ExprOp::Slash), num(0)];
        assert_eq!(
            evaluate(&tokens, 1),
            Err(ExprError::DivisionByZero { line: 1 })
        );
    }

    #[test]
    fn modulo_by_zero_is_an_error() {
        let tokens = vec![num(5), op(ExprOp::Percent), num(0)];
        assert_eq!(
            evaluate(&tokens, 1),
            Err(ExprError::DivisionByZero { line: 1 })
        );
    }

    #[test]
    fn trailing_garbage_is_invalid() {
        let tokens = vec![num(5), num(6)];
        assert!(evaluate(&tokens, 1).is_err());
    }

    #[test]
    fn unbalanced_parens_are_invalid() {
        let tokens = vec![
            Token {
                kind: TokenKind::LParen,
                line: 1,
            },
            num(1),
        ];
        assert!(evaluate(&tokens, 1).is_err());
    }

    #[test]
    fn substitutes_an_equ_value() {
        let mut equs = HashMap::new();
        equs.insert("FOO".to_owned(), vec![num(42)]);
        let labels = HashMap::new();
        let tokens = vec![Token {
            kind: TokenKind::Text("FOO".to_owned()),
            line: 3,
        }];
        let resolved =
            substitute_symbols(&tokens, &equs, &labels, 0, 8000).unwrap();
        assert_eq!(evaluate(&resolved, 3), Ok(42));
    }

    #[test]
    fn substitutes_a_label_as_a_relative_offset() {
        let equs = HashMap::new();
        let mut labels = HashMap::new();
        labels.insert("loop".to_owned(), 10);
        let tokens = vec![Token {
            kind: TokenKind::Text("loop".to_owned()),
            line: 3,
        }];
        // referenced from code line 5, loop is at line 10: offset +5
        let resolved =
            substitute_symbols(&tokens, &equs, &labels, 5, 8000).unwrap();
        assert_eq!(evaluate(&resolved, 3), Ok(5));
    }

    #[test]
    fn a_backward_label_reference_substitutes_to_a_negative_offset() {
        let equs = HashMap::new();
        let mut labels = HashMap::new();
        labels.insert("start".to_owned(), 2);
        let tokens = vec![Token {
            kind: TokenKind::Text("start".to_owned()),
            line: 1,
        }];
        let resolved =
            substitute_symbols(&tokens, &equs, &labels, 9, 8000).unwrap();
        assert_eq!(evaluate(&resolved, 1), Ok(-7));
    }

    #[test]
    fn unresolved_symbol_is_an_error() {
        let equs = HashMap::new();
        let labels = HashMap::new();
        let tokens = vec![Token {
            kind: TokenKind::Text("nonexistent".to_owned()),
            line: 7,
        }];
        assert_eq!(
            substitute_symbols(&tokens, &equs, &labels, 0, 8000),
            Err(ExprError::UnresolvedSymbol {
                line: 7,
                name: "nonexistent".to_owned()
            })
        );
    }

    #[test]
    fn equ_chains_resolve_transitively() {
        let mut equs = HashMap::new();
        equs.insert(
            "a".to_owned(),
            vec![Token {
                kind: TokenKind::Text("b".to_owned()),
                line: 1,
            }],
        );
        equs.insert("b".to_owned(), vec![num(9)]);
        let labels = HashMap::new();
        let tokens = vec![Token {
            kind: TokenKind::Text("a".to_owned()),
            line: 1,
        }];
        let resolved =
            substitute_symbols(&tokens, &equs, &labels, 0, 8000).unwrap();
        assert_eq!(evaluate(&resolved, 1), Ok(9));
    }
}
