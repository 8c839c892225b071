//! Abstract Syntax Tree (AST) definitions for FHIRPath expressions
//!
//! The parser produces these nodes and the evaluator walks them.

#![warn(missing_docs)]

mod expression;
mod operator;

pub use expression::*;
pub use operator::*;
