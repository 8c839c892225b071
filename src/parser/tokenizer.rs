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

//! Tokenizer for FHIRPath expressions
//!
//! Produces zero-copy tokens borrowing from the input. String literals keep
//! their escape sequences; the parser unescapes them when building literals.
//! Expressions embedded in templates routinely span several lines, so all
//! ASCII whitespace (including newlines) separates tokens.

use super::error::{ParseError, ParseResult};
use std::borrow::Cow;
use unicode_xid::UnicodeXID;

/// A single lexical token
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'input> {
    /// Integer literal (e.g., 42, 123)
    Integer(i64),
    /// Decimal literal as string slice, parsed on demand (e.g., 3.14, 0.5)
    Decimal(&'input str),
    /// String literal contents, escapes not yet processed
    String(&'input str),
    /// Date literal without the `@` (e.g., 2023-01-01)
    Date(&'input str),
    /// DateTime literal without the `@` (e.g., 2023-01-01T12:00:00)
    DateTime(&'input str),
    /// Time literal without the `@T` (e.g., 12:00:00)
    Time(&'input str),

    /// Plain identifier
    Identifier(&'input str),
    /// Backtick-delimited identifier contents, escapes not yet processed
    DelimitedIdentifier(&'input str),

    /// Addition operator (+)
    Plus,
    /// Subtraction operator (-)
    Minus,
    /// Multiplication operator (*)
    Multiply,
    /// Division operator (/)
    Divide,
    /// Modulo operator (mod keyword)
    Mod,
    /// Integer division operator (div keyword)
    Div,
    /// Equality operator (=)
    Equal,
    /// Inequality operator (!=)
    NotEqual,
    /// Less than operator (<)
    LessThan,
    /// Less than or equal operator (<=)
    LessThanOrEqual,
    /// Greater than operator (>)
    GreaterThan,
    /// Greater than or equal operator (>=)
    GreaterThanOrEqual,
    /// Equivalence operator (~)
    Equivalent,
    /// Non-equivalence operator (!~)
    NotEquivalent,
    /// Logical AND operator (and keyword)
    And,
    /// Logical OR operator (or keyword)
    Or,
    /// Logical XOR operator (xor keyword)
    Xor,
    /// Logical implication operator (implies keyword)
    Implies,
    /// Union operator (|)
    Union,
    /// Membership operator (in keyword)
    In,
    /// Contains operator (contains keyword)
    Contains,
    /// Ampersand operator (&) for string concatenation
    Ampersand,
    /// Type checking operator (is keyword)
    Is,
    /// Type casting operator (as keyword)
    As,
    /// Left parenthesis (
    LeftParen,
    /// Right parenthesis )
    RightParen,
    /// Left square bracket [
    LeftBracket,
    /// Right square bracket ]
    RightBracket,
    /// Left curly brace {
    LeftBrace,
    /// Right curly brace }
    RightBrace,
    /// Dot operator (.) for property access
    Dot,
    /// Comma separator (,)
    Comma,
    /// Percent sign (%) introducing an environment variable
    Percent,

    /// Special variable $this
    DollarThis,
    /// Special variable $index
    DollarIndex,
    /// Special variable $total
    DollarTotal,
    /// Boolean literal true
    True,
    /// Boolean literal false
    False,
}

impl<'input> Token<'input> {
    /// Map a reserved word to its token
    pub fn from_keyword(s: &str) -> Option<Token<'input>> {
        match s {
            "and" => Some(Token::And),
            "or" => Some(Token::Or),
            "xor" => Some(Token::Xor),
            "implies" => Some(Token::Implies),
            "div" => Some(Token::Div),
            "mod" => Some(Token::Mod),
            "in" => Some(Token::In),
            "contains" => Some(Token::Contains),
            "is" => Some(Token::Is),
            "as" => Some(Token::As),
            "true" => Some(Token::True),
            "false" => Some(Token::False),
            _ => None,
        }
    }

    /// Keywords that may still be used as member or function names after a dot
    /// (`Observation.value.as(Quantity)`, `name.contains('x')`)
    pub fn keyword_as_name(&self) -> Option<&'static str> {
        match self {
            Token::Contains => Some("contains"),
            Token::As => Some("as"),
            Token::Is => Some("is"),
            Token::In => Some("in"),
            Token::Div => Some("div"),
            Token::Mod => Some("mod"),
            Token::And => Some("and"),
            Token::Or => Some("or"),
            Token::Xor => Some("xor"),
            Token::Implies => Some("implies"),
            _ => None,
        }
    }

    /// Short human readable form used in error messages
    pub fn describe(&self) -> Cow<'static, str> {
        match self {
            Token::Integer(n) => Cow::Owned(n.to_string()),
            Token::Decimal(s)
            | Token::Identifier(s)
            | Token::Date(s)
            | Token::DateTime(s)
            | Token::Time(s) => Cow::Owned((*s).to_string()),
            Token::String(s) => Cow::Owned(format!("'{s}'")),
            Token::DelimitedIdentifier(s) => Cow::Owned(format!("`{s}`")),
            Token::Plus => Cow::Borrowed("+"),
            Token::Minus => Cow::Borrowed("-"),
            Token::Multiply => Cow::Borrowed("*"),
            Token::Divide => Cow::Borrowed("/"),
            Token::Equal => Cow::Borrowed("="),
            Token::NotEqual => Cow::Borrowed("!="),
            Token::LessThan => Cow::Borrowed("<"),
            Token::LessThanOrEqual => Cow::Borrowed("<="),
            Token::GreaterThan => Cow::Borrowed(">"),
            Token::GreaterThanOrEqual => Cow::Borrowed(">="),
            Token::Equivalent => Cow::Borrowed("~"),
            Token::NotEquivalent => Cow::Borrowed("!~"),
            Token::Union => Cow::Borrowed("|"),
            Token::Ampersand => Cow::Borrowed("&"),
            Token::LeftParen => Cow::Borrowed("("),
            Token::RightParen => Cow::Borrowed(")"),
            Token::LeftBracket => Cow::Borrowed("["),
            Token::RightBracket => Cow::Borrowed("]"),
            Token::LeftBrace => Cow::Borrowed("{"),
            Token::RightBrace => Cow::Borrowed("}"),
            Token::Dot => Cow::Borrowed("."),
            Token::Comma => Cow::Borrowed(","),
            Token::Percent => Cow::Borrowed("%"),
            Token::DollarThis => Cow::Borrowed("$this"),
            Token::DollarIndex => Cow::Borrowed("$index"),
            Token::DollarTotal => Cow::Borrowed("$total"),
            Token::True => Cow::Borrowed("true"),
            Token::False => Cow::Borrowed("false"),
            other => match other.keyword_as_name() {
                Some(name) => Cow::Borrowed(name),
                None => Cow::Borrowed("?"),
            },
        }
    }
}

/// Byte-oriented tokenizer over a borrowed input
#[derive(Clone)]
pub struct Tokenizer<'input> {
    input: &'input str,
    bytes: &'input [u8],
    pos: usize,
    token_start: usize,
}

impl<'input> Tokenizer<'input> {
    /// Create a new tokenizer
    pub fn new(input: &'input str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            token_start: 0,
        }
    }

    #[inline(always)]
    fn slice(&self, start: usize, end: usize) -> &'input str {
        self.input.get(start..end).unwrap_or("")
    }

    #[inline(always)]
    fn current_char(&self) -> Option<char> {
        self.input.get(self.pos..).and_then(|rest| rest.chars().next())
    }

    #[inline(always)]
    fn is_id_start(ch: char) -> bool {
        ch == '_' || ch.is_ascii_alphabetic() || (!ch.is_ascii() && ch.is_xid_start())
    }

    #[inline(always)]
    fn is_id_continue(ch: char) -> bool {
        ch == '_' || ch.is_ascii_alphanumeric() || (!ch.is_ascii() && ch.is_xid_continue())
    }

    fn parse_number(&mut self) -> ParseResult<Token<'input>> {
        let start = self.pos;

        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
            self.pos += 1;
        }

        let is_decimal = self.bytes.get(self.pos) == Some(&b'.')
            && self
                .bytes
                .get(self.pos + 1)
                .is_some_and(|b| b.is_ascii_digit());

        if is_decimal {
            self.pos += 1;
            while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
            return Ok(Token::Decimal(self.slice(start, self.pos)));
        }

        let text = self.slice(start, self.pos);
        text.parse::<i64>()
            .map(Token::Integer)
            .map_err(|_| ParseError::InvalidLiteral {
                literal_type: Cow::Borrowed("integer"),
                value: text.to_string(),
                position: start,
            })
    }

    /// Skip whitespace and comments
    fn skip_trivia(&mut self) -> ParseResult<()> {
        loop {
            while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            match (self.bytes.get(self.pos), self.bytes.get(self.pos + 1)) {
                (Some(b'/'), Some(b'/')) => {
                    while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
                        self.pos += 1;
                    }
                }
                (Some(b'/'), Some(b'*')) => {
                    let start = self.pos;
                    self.pos += 2;
                    loop {
                        if self.pos + 1 >= self.bytes.len() {
                            return Err(ParseError::UnexpectedToken {
                                token: Cow::Borrowed("Unclosed multi-line comment"),
                                position: start,
                            });
                        }
                        if self.bytes[self.pos] == b'*' && self.bytes[self.pos + 1] == b'/' {
                            self.pos += 2;
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn parse_identifier(&mut self) -> &'input str {
        let start = self.pos;
        while let Some(ch) = self.current_char() {
            if !Self::is_id_continue(ch) {
                break;
            }
            self.pos += ch.len_utf8();
        }
        self.slice(start, self.pos)
    }

    /// Scan a quoted section, returning the raw contents between the quotes
    fn parse_quoted(&mut self, quote: u8) -> ParseResult<&'input str> {
        let open = self.pos;
        self.pos += 1;
        let start = self.pos;

        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b if b == quote => {
                    let content = self.slice(start, self.pos);
                    self.pos += 1;
                    return Ok(content);
                }
                b'\\' => self.pos += 2,
                _ => self.pos += 1,
            }
        }

        Err(ParseError::UnclosedString { position: open })
    }

    /// Produce the next token, or `None` at end of input
    pub fn next_token(&mut self) -> ParseResult<Option<Token<'input>>> {
        self.skip_trivia()?;
        self.token_start = self.pos;

        let Some(&byte) = self.bytes.get(self.pos) else {
            return Ok(None);
        };

        let single = |tokenizer: &mut Self, token: Token<'input>| {
            tokenizer.pos += 1;
            token
        };

        let token = match byte {
            b'.' => single(self, Token::Dot),
            b'(' => single(self, Token::LeftParen),
            b')' => single(self, Token::RightParen),
            b'[' => single(self, Token::LeftBracket),
            b']' => single(self, Token::RightBracket),
            b'{' => single(self, Token::LeftBrace),
            b'}' => single(self, Token::RightBrace),
            b',' => single(self, Token::Comma),
            b'+' => single(self, Token::Plus),
            b'-' => single(self, Token::Minus),
            b'*' => single(self, Token::Multiply),
            b'/' => single(self, Token::Divide),
            b'&' => single(self, Token::Ampersand),
            b'|' => single(self, Token::Union),
            b'%' => single(self, Token::Percent),
            b'~' => single(self, Token::Equivalent),
            b'=' => single(self, Token::Equal),
            b'<' => {
                if self.bytes.get(self.pos + 1) == Some(&b'=') {
                    self.pos += 2;
                    Token::LessThanOrEqual
                } else {
                    single(self, Token::LessThan)
                }
            }
            b'>' => {
                if self.bytes.get(self.pos + 1) == Some(&b'=') {
                    self.pos += 2;
                    Token::GreaterThanOrEqual
                } else {
                    single(self, Token::GreaterThan)
                }
            }
            b'!' => match self.bytes.get(self.pos + 1) {
                Some(b'=') => {
                    self.pos += 2;
                    Token::NotEqual
                }
                Some(b'~') => {
                    self.pos += 2;
                    Token::NotEquivalent
                }
                _ => {
                    return Err(ParseError::UnexpectedToken {
                        token: Cow::Borrowed("!"),
                        position: self.pos,
                    });
                }
            },
            b'$' => {
                self.pos += 1;
                let name = self.parse_identifier();
                match name {
                    "this" => Token::DollarThis,
                    "index" => Token::DollarIndex,
                    "total" => Token::DollarTotal,
                    other => {
                        return Err(ParseError::UnexpectedToken {
                            token: Cow::Owned(format!("${other}")),
                            position: self.token_start,
                        });
                    }
                }
            }
            b'0'..=b'9' => self.parse_number()?,
            b'\'' => Token::String(self.parse_quoted(b'\'')?),
            b'`' => Token::DelimitedIdentifier(self.parse_quoted(b'`')?),
            b'@' => self.parse_datetime_literal()?,
            _ => match self.current_char() {
                Some(ch) if Self::is_id_start(ch) => {
                    let ident = self.parse_identifier();
                    Token::from_keyword(ident).unwrap_or(Token::Identifier(ident))
                }
                Some(ch) => {
                    return Err(ParseError::UnexpectedToken {
                        token: Cow::Owned(ch.to_string()),
                        position: self.pos,
                    });
                }
                None => return Ok(None),
            },
        };

        Ok(Some(token))
    }

    /// Date/time literal parsing: `@2020`, `@2020-01-02T10:00:00Z`, `@T10:00`
    fn parse_datetime_literal(&mut self) -> ParseResult<Token<'input>> {
        let start = self.pos;
        self.pos += 1;

        if self.bytes.get(self.pos) == Some(&b'T') {
            self.pos += 1;
            let body = self.pos;
            self.parse_time_part();
            if self.pos == body {
                return Err(self.invalid_datetime(start));
            }
            return Ok(Token::Time(self.slice(body, self.pos)));
        }

        let body = self.pos;
        if !self.parse_date_part() {
            return Err(self.invalid_datetime(start));
        }

        if self.bytes.get(self.pos) == Some(&b'T') {
            self.pos += 1;
            self.parse_time_part();
            Ok(Token::DateTime(self.slice(body, self.pos)))
        } else {
            Ok(Token::Date(self.slice(body, self.pos)))
        }
    }

    fn invalid_datetime(&self, start: usize) -> ParseError {
        ParseError::InvalidLiteral {
            literal_type: Cow::Borrowed("date/time"),
            value: self.slice(start, self.pos.max(start + 1)).to_string(),
            position: start,
        }
    }

    fn digits_at(&self, offset: usize, count: usize) -> bool {
        (0..count).all(|i| {
            self.bytes
                .get(self.pos + offset + i)
                .is_some_and(|b| b.is_ascii_digit())
        })
    }

    fn parse_date_part(&mut self) -> bool {
        if !self.digits_at(0, 4) {
            return false;
        }
        self.pos += 4;

        if self.bytes.get(self.pos) == Some(&b'-') && self.digits_at(1, 2) {
            self.pos += 3;
            if self.bytes.get(self.pos) == Some(&b'-') && self.digits_at(1, 2) {
                self.pos += 3;
            }
        }
        true
    }

    fn parse_time_part(&mut self) {
        if !self.digits_at(0, 2) {
            return;
        }
        self.pos += 2;

        if self.bytes.get(self.pos) == Some(&b':') && self.digits_at(1, 2) {
            self.pos += 3;
            if self.bytes.get(self.pos) == Some(&b':') && self.digits_at(1, 2) {
                self.pos += 3;
                if self.bytes.get(self.pos) == Some(&b'.') && self.digits_at(1, 1) {
                    self.pos += 1;
                    while self.bytes.get(self.pos).is_some_and(|b| b.is_ascii_digit()) {
                        self.pos += 1;
                    }
                }
            }
        }

        match self.bytes.get(self.pos) {
            Some(b'Z') => self.pos += 1,
            Some(b'+') | Some(b'-') if self.digits_at(1, 2) => {
                self.pos += 3;
                if self.bytes.get(self.pos) == Some(&b':') && self.digits_at(1, 2) {
                    self.pos += 3;
                }
            }
            _ => {}
        }
    }

    /// Peek at the next token without consuming it
    pub fn peek(&self) -> ParseResult<Option<Token<'input>>> {
        let mut temp = self.clone();
        temp.next_token()
    }

    /// Current byte position in the input
    #[inline(always)]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Start position of the most recently produced token
    #[inline(always)]
    pub fn token_start(&self) -> usize {
        self.token_start
    }
}

/// Tokenize a whole expression
pub fn tokenize(input: &str) -> ParseResult<Vec<Token<'_>>> {
    let mut tokenizer = Tokenizer::new(input);
    let mut tokens = Vec::new();
    while let Some(token) = tokenizer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenizer_basic() {
        let tokens = tokenize("Patient.name.given").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Identifier("Patient"),
                Token::Dot,
                Token::Identifier("name"),
                Token::Dot,
                Token::Identifier("given"),
            ]
        );
    }

    #[test]
    fn test_operators() {
        let tokens = tokenize("a != b and c <= 1 | d !~ e").unwrap();
        assert!(tokens.contains(&Token::NotEqual));
        assert!(tokens.contains(&Token::And));
        assert!(tokens.contains(&Token::LessThanOrEqual));
        assert!(tokens.contains(&Token::Union));
        assert!(tokens.contains(&Token::NotEquivalent));
    }

    #[test]
    fn test_multiline_expression() {
        let tokens = tokenize("item\n  .where(linkId = 'a')\r\n  .answer").unwrap();
        assert_eq!(tokens.len(), 10);
        assert_eq!(tokens[9], Token::Identifier("answer"));
    }

    #[test]
    fn test_string_literals_keep_escapes() {
        let tokens = tokenize(r"'it\'s'").unwrap();
        assert_eq!(tokens, vec![Token::String(r"it\'s")]);
    }

    #[test]
    fn test_unclosed_string() {
        let err = tokenize("name = 'abc").unwrap_err();
        assert_eq!(err, ParseError::UnclosedString { position: 7 });
    }

    #[test]
    fn test_numbers() {
        let tokens = tokenize("42 3.14 1.").unwrap();
        assert_eq!(tokens[0], Token::Integer(42));
        assert_eq!(tokens[1], Token::Decimal("3.14"));
        assert_eq!(tokens[2], Token::Integer(1));
        assert_eq!(tokens[3], Token::Dot);
    }

    #[test]
    fn test_datetime_literals() {
        let tokens = tokenize("@2020-01-02 @2020-01-02T10:30:00Z @T14:00").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Date("2020-01-02"),
                Token::DateTime("2020-01-02T10:30:00Z"),
                Token::Time("14:00"),
            ]
        );
    }

    #[test]
    fn test_dollar_variable_recognition() {
        let tokens = tokenize("$this $index $total").unwrap();
        assert_eq!(
            tokens,
            vec![Token::DollarThis, Token::DollarIndex, Token::DollarTotal]
        );
        assert!(tokenize("$other").is_err());
    }

    #[test]
    fn test_unicode_identifier() {
        let tokens = tokenize("%имя").unwrap();
        assert_eq!(tokens, vec![Token::Percent, Token::Identifier("имя")]);
    }

    #[test]
    fn test_comments_are_skipped() {
        let tokens = tokenize("a // trailing\n + /* inline */ b").unwrap();
        assert_eq!(
            tokens,
            vec![Token::Identifier("a"), Token::Plus, Token::Identifier("b")]
        );
    }
}
