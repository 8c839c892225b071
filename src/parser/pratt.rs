// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Pratt parser for FHIRPath expressions
//!
//! ### Precedence Levels (highest to lowest):
//! - **Invocation** (12): `.`, `[]`
//! - **Unary** (11): `+`, `-`
//! - **Multiplicative** (10): `*`, `/`, `div`, `mod`
//! - **Additive** (9): `+`, `-`, `&`
//! - **Type** (8): `is`, `as`
//! - **Union** (7): `|`
//! - **Inequality** (6): `<`, `>`, `<=`, `>=`
//! - **Equality** (5): `=`, `!=`, `~`, `!~`
//! - **Membership** (4): `in`, `contains`
//! - **And** (3): `and`
//! - **Or** (2): `or`, `xor`
//! - **Implies** (1): `implies` (right-associative)

use super::error::{ParseError, ParseResult};
use super::tokenizer::{Token, Tokenizer};
use crate::ast::{
    BinaryOperator, ExpressionNode, LiteralValue, SpecialVariable, UnaryOperator,
};
use smallvec::SmallVec;
use std::borrow::Cow;

/// Operator precedence levels (higher = tighter binding)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    /// Lowest precedence - implies (right associative)
    Implies = 1,
    /// Logical OR and XOR
    Or = 2,
    /// Logical AND
    And = 3,
    /// Membership operators (in, contains)
    Membership = 4,
    /// Equality operators (=, !=, ~, !~)
    Equality = 5,
    /// Inequality operators (<, >, <=, >=)
    Inequality = 6,
    /// Union operator (|)
    Union = 7,
    /// Type operators (is, as)
    Type = 8,
    /// Additive operators (+, -, &)
    Additive = 9,
    /// Multiplicative operators (*, /, div, mod)
    Multiplicative = 10,
    /// Unary operators (+, -)
    Unary = 11,
    /// Invocation/Indexing (., [])
    Invocation = 12,
}

impl Precedence {
    /// Get the next higher precedence level for left-associative operators
    #[inline(always)]
    pub const fn next_level(self) -> Self {
        match self {
            Precedence::Implies => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Membership,
            Precedence::Membership => Precedence::Equality,
            Precedence::Equality => Precedence::Inequality,
            Precedence::Inequality => Precedence::Union,
            Precedence::Union => Precedence::Type,
            Precedence::Type => Precedence::Additive,
            Precedence::Additive => Precedence::Multiplicative,
            Precedence::Multiplicative => Precedence::Unary,
            Precedence::Unary => Precedence::Invocation,
            Precedence::Invocation => Precedence::Invocation,
        }
    }

    /// Check if this precedence is right associative
    #[inline(always)]
    pub const fn is_right_associative(self) -> bool {
        matches!(self, Precedence::Implies)
    }
}

#[inline(always)]
fn get_precedence(token: &Token<'_>) -> Option<Precedence> {
    match token {
        Token::Dot | Token::LeftBracket => Some(Precedence::Invocation),
        Token::Equal | Token::NotEqual | Token::Equivalent | Token::NotEquivalent => {
            Some(Precedence::Equality)
        }
        Token::Plus | Token::Minus | Token::Ampersand => Some(Precedence::Additive),
        Token::And => Some(Precedence::And),
        Token::Or | Token::Xor => Some(Precedence::Or),
        Token::Multiply | Token::Divide | Token::Div | Token::Mod => {
            Some(Precedence::Multiplicative)
        }
        Token::LessThan
        | Token::LessThanOrEqual
        | Token::GreaterThan
        | Token::GreaterThanOrEqual => Some(Precedence::Inequality),
        Token::In | Token::Contains => Some(Precedence::Membership),
        Token::Is | Token::As => Some(Precedence::Type),
        Token::Union => Some(Precedence::Union),
        Token::Implies => Some(Precedence::Implies),
        _ => None,
    }
}

#[inline(always)]
fn token_to_binary_op(token: &Token<'_>) -> Option<BinaryOperator> {
    match token {
        Token::Equal => Some(BinaryOperator::Equal),
        Token::NotEqual => Some(BinaryOperator::NotEqual),
        Token::Plus => Some(BinaryOperator::Add),
        Token::Minus => Some(BinaryOperator::Subtract),
        Token::And => Some(BinaryOperator::And),
        Token::Or => Some(BinaryOperator::Or),
        Token::Equivalent => Some(BinaryOperator::Equivalent),
        Token::NotEquivalent => Some(BinaryOperator::NotEquivalent),
        Token::LessThan => Some(BinaryOperator::LessThan),
        Token::LessThanOrEqual => Some(BinaryOperator::LessThanOrEqual),
        Token::GreaterThan => Some(BinaryOperator::GreaterThan),
        Token::GreaterThanOrEqual => Some(BinaryOperator::GreaterThanOrEqual),
        Token::In => Some(BinaryOperator::In),
        Token::Contains => Some(BinaryOperator::Contains),
        Token::Multiply => Some(BinaryOperator::Multiply),
        Token::Divide => Some(BinaryOperator::Divide),
        Token::Div => Some(BinaryOperator::IntegerDivide),
        Token::Mod => Some(BinaryOperator::Modulo),
        Token::Union => Some(BinaryOperator::Union),
        Token::Ampersand => Some(BinaryOperator::Concatenate),
        Token::Xor => Some(BinaryOperator::Xor),
        Token::Implies => Some(BinaryOperator::Implies),
        _ => None,
    }
}

/// Pratt parser over a token stream
///
/// 1. Parse the left-hand side (primary plus postfix invocations)
/// 2. While the next token is a binary operator with sufficient precedence,
///    parse the right-hand side one level tighter (same level for `implies`)
///    and combine
pub struct PrattParser<'input> {
    tokenizer: Tokenizer<'input>,
    current_token: Option<Token<'input>>,
    current_pos: usize,
}

impl<'input> PrattParser<'input> {
    /// Create a parser positioned on the first token
    pub fn new(input: &'input str) -> ParseResult<Self> {
        let mut parser = Self {
            tokenizer: Tokenizer::new(input),
            current_token: None,
            current_pos: 0,
        };
        parser.advance()?;
        Ok(parser)
    }

    #[inline(always)]
    fn advance(&mut self) -> ParseResult<()> {
        self.current_token = self.tokenizer.next_token()?;
        self.current_pos = self.tokenizer.token_start();
        Ok(())
    }

    #[inline(always)]
    fn current(&self) -> Option<&Token<'input>> {
        self.current_token.as_ref()
    }

    fn unexpected(&self) -> ParseError {
        match &self.current_token {
            Some(token) => ParseError::UnexpectedToken {
                token: token.describe(),
                position: self.current_pos,
            },
            None => ParseError::UnexpectedEof,
        }
    }

    fn expect(&mut self, expected: Token<'input>, label: &'static str) -> ParseResult<()> {
        match &self.current_token {
            Some(token) if std::mem::discriminant(token) == std::mem::discriminant(&expected) => {
                self.advance()
            }
            Some(_) => Err(ParseError::ExpectedToken {
                expected: Cow::Borrowed(label),
                position: self.current_pos,
            }),
            None => Err(ParseError::UnexpectedEof),
        }
    }

    fn parse_primary(&mut self) -> ParseResult<ExpressionNode> {
        let position = self.current_pos;
        let Some(token) = self.current_token.clone() else {
            return Err(ParseError::UnexpectedEof);
        };

        match token {
            Token::Identifier(name) => {
                self.advance()?;
                if let Some(Token::LeftParen) = self.current() {
                    let args = self.parse_arguments()?;
                    Ok(ExpressionNode::function_call(name, args))
                } else {
                    Ok(ExpressionNode::identifier(name))
                }
            }
            Token::DelimitedIdentifier(raw) => {
                self.advance()?;
                let name = process_string_escapes(raw, position)?;
                Ok(ExpressionNode::identifier(name))
            }
            Token::Integer(value) => {
                self.advance()?;
                Ok(ExpressionNode::literal(LiteralValue::Integer(value)))
            }
            Token::Decimal(value) => {
                self.advance()?;
                Ok(ExpressionNode::literal(LiteralValue::Decimal(
                    value.to_string(),
                )))
            }
            Token::String(raw) => {
                self.advance()?;
                let value = process_string_escapes(raw, position)?;
                Ok(ExpressionNode::literal(LiteralValue::String(value)))
            }
            Token::True => {
                self.advance()?;
                Ok(ExpressionNode::literal(LiteralValue::Boolean(true)))
            }
            Token::False => {
                self.advance()?;
                Ok(ExpressionNode::literal(LiteralValue::Boolean(false)))
            }
            Token::Date(value) => {
                self.advance()?;
                Ok(ExpressionNode::literal(LiteralValue::Date(value.to_string())))
            }
            Token::DateTime(value) => {
                self.advance()?;
                Ok(ExpressionNode::literal(LiteralValue::DateTime(
                    value.to_string(),
                )))
            }
            Token::Time(value) => {
                self.advance()?;
                Ok(ExpressionNode::literal(LiteralValue::Time(value.to_string())))
            }
            Token::LeftParen => {
                self.advance()?;
                let expr = self.parse_expression_with_precedence(Precedence::Implies)?;
                self.expect(Token::RightParen, "')'")?;
                Ok(expr)
            }
            Token::LeftBrace => {
                self.advance()?;
                self.expect(Token::RightBrace, "'}'")?;
                Ok(ExpressionNode::literal(LiteralValue::Empty))
            }
            Token::DollarThis => {
                self.advance()?;
                Ok(ExpressionNode::Special(SpecialVariable::This))
            }
            Token::DollarIndex => {
                self.advance()?;
                Ok(ExpressionNode::Special(SpecialVariable::Index))
            }
            Token::DollarTotal => {
                self.advance()?;
                Ok(ExpressionNode::Special(SpecialVariable::Total))
            }
            Token::Percent => {
                self.advance()?;
                let name_position = self.current_pos;
                match self.current_token.clone() {
                    Some(Token::Identifier(name)) => {
                        self.advance()?;
                        Ok(ExpressionNode::variable(name))
                    }
                    Some(Token::DelimitedIdentifier(raw)) => {
                        self.advance()?;
                        Ok(ExpressionNode::variable(process_string_escapes(
                            raw,
                            name_position,
                        )?))
                    }
                    Some(Token::String(raw)) => {
                        self.advance()?;
                        Ok(ExpressionNode::variable(process_string_escapes(
                            raw,
                            name_position,
                        )?))
                    }
                    _ => Err(ParseError::ExpectedToken {
                        expected: Cow::Borrowed("variable name after '%'"),
                        position: name_position,
                    }),
                }
            }
            Token::Minus => {
                self.advance()?;
                let operand = self.parse_expression_with_precedence(Precedence::Unary)?;
                Ok(ExpressionNode::unary_op(UnaryOperator::Minus, operand))
            }
            Token::Plus => {
                self.advance()?;
                let operand = self.parse_expression_with_precedence(Precedence::Unary)?;
                Ok(ExpressionNode::unary_op(UnaryOperator::Plus, operand))
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Parse a parenthesised, comma separated argument list
    fn parse_arguments(&mut self) -> ParseResult<SmallVec<[ExpressionNode; 4]>> {
        self.expect(Token::LeftParen, "'('")?;
        let mut args = SmallVec::new();

        if let Some(Token::RightParen) = self.current() {
            self.advance()?;
            return Ok(args);
        }

        loop {
            args.push(self.parse_expression_with_precedence(Precedence::Implies)?);
            match self.current() {
                Some(Token::Comma) => self.advance()?,
                Some(Token::RightParen) => {
                    self.advance()?;
                    return Ok(args);
                }
                Some(_) => {
                    return Err(ParseError::ExpectedToken {
                        expected: Cow::Borrowed("',' or ')' in function arguments"),
                        position: self.current_pos,
                    });
                }
                None => return Err(ParseError::UnexpectedEof),
            }
        }
    }

    fn parse_postfix(&mut self, mut left: ExpressionNode) -> ParseResult<ExpressionNode> {
        loop {
            match self.current() {
                Some(Token::Dot) => {
                    self.advance()?;
                    left = self.parse_path_or_method(left)?;
                }
                Some(Token::LeftBracket) => {
                    self.advance()?;
                    let index = self.parse_expression_with_precedence(Precedence::Implies)?;
                    self.expect(Token::RightBracket, "']'")?;
                    left = ExpressionNode::index(left, index);
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_path_or_method(&mut self, base: ExpressionNode) -> ParseResult<ExpressionNode> {
        let position = self.current_pos;
        let name: String = match self.current() {
            Some(Token::Identifier(name)) => (*name).to_string(),
            Some(Token::DelimitedIdentifier(raw)) => process_string_escapes(raw, position)?,
            Some(token) => match token.keyword_as_name() {
                Some(name) => name.to_string(),
                None => {
                    return Err(ParseError::ExpectedToken {
                        expected: Cow::Borrowed("identifier after '.'"),
                        position,
                    });
                }
            },
            None => return Err(ParseError::UnexpectedEof),
        };
        self.advance()?;

        if let Some(Token::LeftParen) = self.current() {
            let args = self.parse_arguments()?;
            Ok(ExpressionNode::method_call(base, name, args))
        } else {
            Ok(ExpressionNode::path(base, name))
        }
    }

    /// Type specifier after `is`/`as`: `Type`, `System.Type` or `(Type)`
    fn parse_type_specifier(&mut self) -> ParseResult<String> {
        let parenthesised = matches!(self.current(), Some(Token::LeftParen));
        if parenthesised {
            self.advance()?;
        }

        let mut type_name = match self.current() {
            Some(Token::Identifier(name)) => (*name).to_string(),
            _ => {
                return Err(ParseError::ExpectedToken {
                    expected: Cow::Borrowed("type name"),
                    position: self.current_pos,
                });
            }
        };
        self.advance()?;

        while let Some(Token::Dot) = self.current() {
            self.advance()?;
            match self.current() {
                Some(Token::Identifier(part)) => {
                    type_name.push('.');
                    type_name.push_str(part);
                    self.advance()?;
                }
                _ => {
                    return Err(ParseError::ExpectedToken {
                        expected: Cow::Borrowed("identifier in qualified type name"),
                        position: self.current_pos,
                    });
                }
            }
        }

        if parenthesised {
            self.expect(Token::RightParen, "')'")?;
        }
        Ok(type_name)
    }

    fn parse_expression_with_precedence(
        &mut self,
        min_precedence: Precedence,
    ) -> ParseResult<ExpressionNode> {
        let mut left = self.parse_primary()?;
        left = self.parse_postfix(left)?;

        while let Some(current_token) = self.current() {
            let precedence = match get_precedence(current_token) {
                Some(prec) if prec >= min_precedence => prec,
                _ => break,
            };

            match current_token {
                Token::Is => {
                    self.advance()?;
                    let type_name = self.parse_type_specifier()?;
                    left = ExpressionNode::type_check(left, type_name);
                    continue;
                }
                Token::As => {
                    self.advance()?;
                    let type_name = self.parse_type_specifier()?;
                    left = ExpressionNode::type_cast(left, type_name);
                    continue;
                }
                _ => {}
            }

            let Some(op) = token_to_binary_op(current_token) else {
                return Err(self.unexpected());
            };
            self.advance()?;

            let next_min_precedence = if precedence.is_right_associative() {
                precedence
            } else {
                precedence.next_level()
            };

            let right = self.parse_expression_with_precedence(next_min_precedence)?;
            left = ExpressionNode::binary_op(op, left, right);
        }

        Ok(left)
    }

    /// Parse the complete input, rejecting trailing tokens
    pub fn parse(&mut self) -> ParseResult<ExpressionNode> {
        let expr = self.parse_expression_with_precedence(Precedence::Implies)?;

        if self.current_token.is_some() {
            return Err(ParseError::TrailingInput {
                position: self.current_pos,
            });
        }

        Ok(expr)
    }
}

/// Process escape sequences in string literals, including Unicode escapes
fn process_string_escapes(input: &str, position: usize) -> ParseResult<String> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('f') => result.push('\u{000C}'),
            Some('\\') => result.push('\\'),
            Some('/') => result.push('/'),
            Some('\'') => result.push('\''),
            Some('"') => result.push('"'),
            Some('`') => result.push('`'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let decoded = (hex.len() == 4)
                    .then(|| u32::from_str_radix(&hex, 16).ok())
                    .flatten()
                    .and_then(char::from_u32);
                match decoded {
                    Some(unicode_char) => result.push(unicode_char),
                    None => {
                        return Err(ParseError::InvalidEscape {
                            sequence: format!("\\u{hex}"),
                            position,
                        });
                    }
                }
            }
            Some(other) => {
                // Unknown escapes are kept verbatim
                result.push('\\');
                result.push(other);
            }
            None => {
                return Err(ParseError::InvalidEscape {
                    sequence: "\\".to_string(),
                    position,
                });
            }
        }
    }

    Ok(result)
}

/// Parse an expression string into an AST
pub fn parse_expression_pratt(input: &str) -> ParseResult<ExpressionNode> {
    PrattParser::new(input)?.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_ordering() {
        assert!(Precedence::Multiplicative > Precedence::Additive);
        assert!(Precedence::Additive > Precedence::Equality);
        assert!(Precedence::Equality > Precedence::And);
        assert!(Precedence::And > Precedence::Or);
        assert!(Precedence::Or > Precedence::Implies);
    }

    #[test]
    fn test_basic_expressions() {
        let result = parse_expression_pratt("Patient").unwrap();
        assert!(matches!(result, ExpressionNode::Identifier(_)));

        let result = parse_expression_pratt("Patient.name").unwrap();
        assert!(matches!(result, ExpressionNode::Path { .. }));

        let result = parse_expression_pratt("2 + 3 * 4").unwrap();
        let ExpressionNode::BinaryOp(data) = result else {
            panic!("Expected binary operation");
        };
        assert_eq!(data.op, BinaryOperator::Add);
        assert_eq!(
            data.left,
            ExpressionNode::Literal(LiteralValue::Integer(2))
        );
        assert!(
            matches!(&data.right, ExpressionNode::BinaryOp(inner) if inner.op == BinaryOperator::Multiply)
        );
    }

    #[test]
    fn test_associativity() {
        let result = parse_expression_pratt("a implies b implies c").unwrap();
        let ExpressionNode::BinaryOp(data) = result else {
            panic!("Expected implies");
        };
        assert_eq!(data.op, BinaryOperator::Implies);
        assert!(matches!(data.left, ExpressionNode::Identifier(_)));
        assert!(
            matches!(&data.right, ExpressionNode::BinaryOp(inner) if inner.op == BinaryOperator::Implies)
        );

        let result = parse_expression_pratt("10 - 3 - 2").unwrap();
        let ExpressionNode::BinaryOp(data) = result else {
            panic!("Expected subtraction");
        };
        assert!(
            matches!(&data.left, ExpressionNode::BinaryOp(inner) if inner.op == BinaryOperator::Subtract)
        );
    }

    #[test]
    fn test_function_calls() {
        let result = parse_expression_pratt("count()").unwrap();
        assert!(matches!(result, ExpressionNode::FunctionCall(_)));

        let result = parse_expression_pratt("Patient.name.where(use = 'official')").unwrap();
        assert!(matches!(result, ExpressionNode::MethodCall(_)));
    }

    #[test]
    fn test_keyword_method_names() {
        let result = parse_expression_pratt("name.contains('x')").unwrap();
        assert!(
            matches!(result, ExpressionNode::MethodCall(ref data) if data.method == "contains")
        );
    }

    #[test]
    fn test_variables() {
        assert_eq!(
            parse_expression_pratt("%Patient").unwrap(),
            ExpressionNode::Variable("Patient".to_string())
        );
        assert_eq!(
            parse_expression_pratt("%`vs-name`").unwrap(),
            ExpressionNode::Variable("vs-name".to_string())
        );
        assert_eq!(
            parse_expression_pratt("$this").unwrap(),
            ExpressionNode::Special(SpecialVariable::This)
        );
    }

    #[test]
    fn test_type_operators() {
        let result = parse_expression_pratt("value is Quantity").unwrap();
        assert!(
            matches!(result, ExpressionNode::TypeCheck { ref type_name, .. } if type_name == "Quantity")
        );
        let result = parse_expression_pratt("value as System.String").unwrap();
        assert!(
            matches!(result, ExpressionNode::TypeCast { ref type_name, .. } if type_name == "System.String")
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            parse_expression_pratt(r"'it\'s A'").unwrap(),
            ExpressionNode::Literal(LiteralValue::String("it's A".to_string()))
        );
    }

    #[test]
    fn test_errors_carry_positions() {
        assert_eq!(
            parse_expression_pratt("name name").unwrap_err(),
            ParseError::TrailingInput { position: 5 }
        );
        assert_eq!(
            parse_expression_pratt("name.").unwrap_err(),
            ParseError::UnexpectedEof
        );
        assert_eq!(
            parse_expression_pratt("(a").unwrap_err(),
            ParseError::UnexpectedEof
        );
    }
}
