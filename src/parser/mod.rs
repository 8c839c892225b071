//! FHIRPath expression parser
//!
//! Converts expression text into an [`ExpressionNode`](crate::ast::ExpressionNode)
//! using a hand written tokenizer and a Pratt parser.

#![warn(missing_docs)]

pub mod error;
pub mod pratt;
pub mod tokenizer;

pub use error::{ParseError, ParseResult};
pub use pratt::parse_expression_pratt;

pub use pratt::parse_expression_pratt as parse_expression;

/// Parse an FHIRPath expression string into an AST
pub fn parse(input: &str) -> ParseResult<crate::ast::ExpressionNode> {
    parse_expression_pratt(input)
}
