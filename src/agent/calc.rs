//! Arithmetic evaluator for the tutor's `Calculate` capability.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/' | '%') unary)*
//! unary   := ('-' | '+') unary | power
//! power   := primary ('^' unary)?        right-associative
//! primary := number | '(' expr ')'
//! ```
//!
//! `-2^2` is `-4`, as on a school calculator.

use crate::error::{RagError, RagResult};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    LParen,
    RParen,
}

/// Evaluate `expression` and return its value.
///
/// A trailing `=` or `?` ("12 * 4 = ?") is ignored.
pub fn evaluate(expression: &str) -> RagResult<f64> {
    let tokens = tokenize(strip_prompt(expression))?;
    if tokens.is_empty() {
        return Err(invalid("empty expression"));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expr()?;
    if let Some(tok) = parser.peek() {
        return Err(invalid(format!("unexpected {:?} at token {}", tok, parser.pos)));
    }
    if !value.is_finite() {
        return Err(invalid("result is not a finite number"));
    }
    Ok(value)
}

/// Render a result the way a teacher would write it: integers without a
/// fractional part, everything else trimmed to at most ten decimals.
pub fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    let s = format!("{:.10}", value);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// True when `input` contains only characters an arithmetic expression
/// can be made of and at least one digit.
pub fn looks_like_expression(input: &str) -> bool {
    let trimmed = strip_prompt(input);
    !trimmed.is_empty()
        && trimmed.chars().any(|c| c.is_ascii_digit())
        && trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_whitespace() || "+-*/%^().x×÷".contains(c))
        && tokenize(trimmed).is_ok()
}

fn strip_prompt(input: &str) -> &str {
    input
        .trim()
        .trim_end_matches(|c: char| c == '=' || c == '?' || c.is_whitespace())
}

fn invalid(msg: impl Into<String>) -> RagError {
    RagError::InvalidInput(format!("cannot evaluate expression: {}", msg.into()))
}

fn tokenize(input: &str) -> RagResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(i, c)) = chars.peek() {
        let token = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '0'..='9' | '.' => {
                let mut end = i;
                while let Some(&(j, d)) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        end = j + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let literal = &input[i..end];
                let n: f64 = literal
                    .parse()
                    .map_err(|_| invalid(format!("bad number '{}'", literal)))?;
                tokens.push(Token::Number(n));
                continue;
            }
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' | 'x' | '×' => Token::Star,
            '/' | '÷' => Token::Slash,
            '%' => Token::Percent,
            '^' => Token::Caret,
            '(' => Token::LParen,
            ')' => Token::RParen,
            other => return Err(invalid(format!("unexpected character '{}'", other))),
        };
        tokens.push(token);
        chars.next();
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.peek();
        self.pos += 1;
        tok
    }

    fn expr(&mut self) -> RagResult<f64> {
        let mut value = self.term()?;
        while let Some(op @ (Token::Plus | Token::Minus)) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == Token::Plus { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    fn term(&mut self) -> RagResult<f64> {
        let mut value = self.unary()?;
        while let Some(op @ (Token::Star | Token::Slash | Token::Percent)) = self.peek() {
            self.pos += 1;
            let rhs = self.unary()?;
            value = match op {
                Token::Star => value * rhs,
                _ if rhs == 0.0 => return Err(invalid("division by zero")),
                Token::Slash => value / rhs,
                _ => value % rhs,
            };
        }
        Ok(value)
    }

    fn unary(&mut self) -> RagResult<f64> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> RagResult<f64> {
        let base = self.primary()?;
        if self.peek() == Some(Token::Caret) {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> RagResult<f64> {
        match self.next() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(invalid("missing ')'")),
                }
            }
            Some(tok) => Err(invalid(format!("unexpected {:?}", tok))),
            None => Err(invalid("unexpected end of expression")),
        }
    }
}
