//! Restricted arithmetic evaluation.
//!
//! Once every `config.*`/`stats.*` reference in a template value has been
//! substituted, the value is a plain arithmetic expression. This module
//! evaluates exactly that grammar and nothing more:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('+' | '-') unary | primary
//! primary := number | '(' expr ')'
//! number  := decimal [exponent] | "inf" | "nan"
//! ```
//!
//! Identifiers, calls and any other syntax are rejected.

/// Maximum parenthesis/unary nesting accepted before giving up
const MAX_DEPTH: usize = 256;

/// Errors produced while evaluating an expression
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected '{found}' at offset {offset} in '{expr}'")]
    UnexpectedChar {
        found: char,
        offset: usize,
        expr: String,
    },

    #[error("unknown identifier '{name}' in '{expr}'")]
    UnknownIdentifier { name: String, expr: String },

    #[error("invalid number '{literal}' in '{expr}'")]
    InvalidNumber { literal: String, expr: String },

    #[error("unexpected end of expression '{expr}'")]
    UnexpectedEnd { expr: String },

    #[error("division by zero in '{expr}'")]
    DivisionByZero { expr: String },

    #[error("expression nested too deeply: '{expr}'")]
    TooDeep { expr: String },
}

/// Token types for arithmetic expressions
#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LeftParen,
    RightParen,
    Eof,
}

/// Lexer over the characters of one expression
struct Lexer<'a> {
    expr: &'a str,
    input: Vec<char>,
    position: usize,
    current_char: Option<char>,
}

impl<'a> Lexer<'a> {
    fn new(expr: &'a str) -> Self {
        let input: Vec<char> = expr.chars().collect();
        let current_char = input.first().copied();
        Self {
            expr,
            input,
            position: 0,
            current_char,
        }
    }

    fn advance(&mut self) {
        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> Result<Token, ExprError> {
        let mut literal = String::new();
        while let Some(ch) = self.current_char {
            if ch.is_ascii_digit() || ch == '.' {
                literal.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if matches!(self.current_char, Some('e' | 'E')) {
            literal.push('e');
            self.advance();
            if let Some(sign @ ('+' | '-')) = self.current_char {
                literal.push(sign);
                self.advance();
            }
            while let Some(ch) = self.current_char {
                if ch.is_ascii_digit() {
                    literal.push(ch);
                    self.advance();
                } else {
                    break;
                }
            }
        }

        literal
            .parse::<f64>()
            .map(Token::Number)
            .map_err(|_| ExprError::InvalidNumber {
                literal,
                expr: self.expr.to_string(),
            })
    }

    fn read_word(&mut self) -> Result<Token, ExprError> {
        let mut word = String::new();
        while let Some(ch) = self.current_char {
            if ch.is_alphanumeric() || ch == '_' {
                word.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        match word.as_str() {
            "inf" => Ok(Token::Number(f64::INFINITY)),
            "nan" => Ok(Token::Number(f64::NAN)),
            _ => Err(ExprError::UnknownIdentifier {
                name: word,
                expr: self.expr.to_string(),
            }),
        }
    }

    fn next_token(&mut self) -> Result<Token, ExprError> {
        self.skip_whitespace();

        let Some(ch) = self.current_char else {
            return Ok(Token::Eof);
        };

        let simple = match ch {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            _ => None,
        };
        if let Some(token) = simple {
            self.advance();
            return Ok(token);
        }

        if ch.is_ascii_digit() || ch == '.' {
            self.read_number()
        } else if ch.is_alphabetic() || ch == '_' {
            self.read_word()
        } else {
            Err(ExprError::UnexpectedChar {
                found: ch,
                offset: self.position,
                expr: self.expr.to_string(),
            })
        }
    }
}

/// Recursive-descent evaluator
struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(expr: &'a str) -> Result<Self, ExprError> {
        let mut lexer = Lexer::new(expr);
        let current = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            depth: 0,
        })
    }

    fn bump(&mut self) -> Result<(), ExprError> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn unexpected(&self) -> ExprError {
        match self.lexer.current_char {
            Some(found) if self.current != Token::Eof => ExprError::UnexpectedChar {
                found,
                offset: self.lexer.position,
                expr: self.lexer.expr.to_string(),
            },
            _ => ExprError::UnexpectedEnd {
                expr: self.lexer.expr.to_string(),
            },
        }
    }

    fn expression(&mut self) -> Result<f64, ExprError> {
        let mut value = self.term()?;
        loop {
            match self.current {
                Token::Plus => {
                    self.bump()?;
                    value += self.term()?;
                }
                Token::Minus => {
                    self.bump()?;
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<f64, ExprError> {
        let mut value = self.unary()?;
        loop {
            match self.current {
                Token::Star => {
                    self.bump()?;
                    value *= self.unary()?;
                }
                Token::Slash => {
                    self.bump()?;
                    let divisor = self.unary()?;
                    if divisor == 0.0 {
                        return Err(ExprError::DivisionByZero {
                            expr: self.lexer.expr.to_string(),
                        });
                    }
                    value /= divisor;
                }
                _ => return Ok(value),
            }
        }
    }

    fn unary(&mut self) -> Result<f64, ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::TooDeep {
                expr: self.lexer.expr.to_string(),
            });
        }

        let value = match self.current {
            Token::Plus => {
                self.bump()?;
                self.unary()
            }
            Token::Minus => {
                self.bump()?;
                self.unary().map(|v| -v)
            }
            _ => self.primary(),
        };

        self.depth -= 1;
        value
    }

    fn primary(&mut self) -> Result<f64, ExprError> {
        match self.current {
            Token::Number(value) => {
                self.bump()?;
                Ok(value)
            }
            Token::LeftParen => {
                self.bump()?;
                let value = self.expression()?;
                if self.current != Token::RightParen {
                    return Err(self.unexpected());
                }
                self.bump()?;
                Ok(value)
            }
            _ => Err(self.unexpected()),
        }
    }
}

/// Evaluate a single arithmetic expression
pub fn evaluate(expr: &str) -> Result<f64, ExprError> {
    if expr.trim().is_empty() {
        return Err(ExprError::Empty);
    }

    let mut parser = Parser::new(expr)?;
    let value = parser.expression()?;
    if parser.current != Token::Eof {
        return Err(parser.unexpected());
    }
    Ok(value)
}

/// Evaluate a comma-separated list of expressions and re-join the results
pub fn evaluate_list(value: &str) -> Result<String, ExprError> {
    let results = value
        .split(',')
        .map(|element| evaluate(element).map(format_number))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(results.join(","))
}

/// Render an evaluated number; integral values print without a fraction
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value.is_infinite() {
        let sign = if value > 0.0 { "" } else { "-" };
        format!("{}inf", sign)
    } else if value.fract() == 0.0 {
        format!("{:.0}", value + 0.0)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_and_parentheses() {
        assert_eq!(evaluate("1 + 2 * 3").unwrap(), 7.0);
        assert_eq!(evaluate("(1 + 2) * 3").unwrap(), 9.0);
        assert_eq!(evaluate("10 - 4 - 3").unwrap(), 3.0);
        assert_eq!(evaluate("12 / 4 / 3").unwrap(), 1.0);
        assert_eq!(evaluate("3/2").unwrap(), 1.5);
    }

    #[test]
    fn test_unary_signs() {
        assert_eq!(evaluate("-5").unwrap(), -5.0);
        assert_eq!(evaluate("2 - -3").unwrap(), 5.0);
        assert_eq!(evaluate("+4 * -(1 + 1)").unwrap(), -8.0);
    }

    #[test]
    fn test_number_literals() {
        assert_eq!(evaluate("12345.000000").unwrap(), 12345.0);
        assert_eq!(evaluate("1.5e-03 * 2").unwrap(), 0.003);
        assert_eq!(evaluate(".5").unwrap(), 0.5);
        assert!(evaluate("inf").unwrap().is_infinite());
        assert!(matches!(evaluate("1.2.3"), Err(ExprError::InvalidNumber { .. })));
    }

    #[test]
    fn test_identifiers_are_rejected() {
        assert!(matches!(
            evaluate("X86ISA"),
            Err(ExprError::UnknownIdentifier { name, .. }) if name == "X86ISA"
        ));
        assert!(matches!(
            evaluate("__import__(1)"),
            Err(ExprError::UnknownIdentifier { .. })
        ));
        assert!(matches!(evaluate("2 ** 3"), Err(ExprError::UnexpectedChar { .. })));
    }

    #[test]
    fn test_malformed_expressions() {
        assert_eq!(evaluate("  "), Err(ExprError::Empty));
        assert!(matches!(evaluate("(1 + 2"), Err(ExprError::UnexpectedEnd { .. })));
        assert!(evaluate("1 + 2)").is_err());
        assert!(matches!(evaluate("1 % 2"), Err(ExprError::UnexpectedChar { found: '%', .. })));
        assert!(matches!(evaluate("4 / (2 - 2)"), Err(ExprError::DivisionByZero { .. })));
    }

    #[test]
    fn test_deep_nesting_is_bounded() {
        let expr = format!("{}1{}", "(".repeat(1000), ")".repeat(1000));
        assert!(matches!(evaluate(&expr), Err(ExprError::TooDeep { .. })));
    }

    #[test]
    fn test_list_evaluation() {
        assert_eq!(evaluate_list("32768,8,64").unwrap(), "32768,8,64");
        assert_eq!(evaluate_list("64*512, 2*4, 1/4").unwrap(), "32768,8,0.25");
        assert!(evaluate_list("1,,2").is_err());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(24690.0), "24690");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(0.25), "0.25");
        assert_eq!(format_number(1e17), "100000000000000000");
        assert_eq!(format_number(f64::NEG_INFINITY), "-inf");
    }
}
