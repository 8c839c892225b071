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

//! Expression AST node definitions

use super::operator::{BinaryOperator, UnaryOperator};
use smallvec::SmallVec;

/// AST representation of FHIRPath expressions
///
/// Large variants are boxed to keep the enum small.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExpressionNode {
    /// Literal value (string, number, boolean, etc.)
    Literal(LiteralValue),

    /// Identifier (property name or type name at the root)
    Identifier(String),

    /// Path navigation (object.property)
    Path {
        /// Base expression
        base: Box<ExpressionNode>,
        /// Property name
        path: String,
    },

    /// Binary operation (boxed for size optimization)
    BinaryOp(Box<BinaryOpData>),

    /// Unary operation
    UnaryOp {
        /// The operator
        op: UnaryOperator,
        /// The operand
        operand: Box<ExpressionNode>,
    },

    /// Function call without an explicit receiver (`where(...)`, `today()`)
    FunctionCall(Box<FunctionCallData>),

    /// Method call on an expression (`expression.method(args)`)
    MethodCall(Box<MethodCallData>),

    /// Index access (collection\[index\])
    Index {
        /// Base expression
        base: Box<ExpressionNode>,
        /// Index expression
        index: Box<ExpressionNode>,
    },

    /// Type check (value is Type)
    TypeCheck {
        /// Expression to check
        expression: Box<ExpressionNode>,
        /// Type name
        type_name: String,
    },

    /// Type cast (value as Type)
    TypeCast {
        /// Expression to cast
        expression: Box<ExpressionNode>,
        /// Target type name
        type_name: String,
    },

    /// Environment variable reference (`%name`), stored without the `%`
    Variable(String),

    /// Special iteration variable (`$this`, `$index`, `$total`)
    Special(SpecialVariable),
}

/// The `$`-prefixed variables bound during lambda evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialVariable {
    /// `$this`
    This,
    /// `$index`
    Index,
    /// `$total`
    Total,
}

impl SpecialVariable {
    /// Parse a special variable name without the leading `$`
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "this" => Some(Self::This),
            "index" => Some(Self::Index),
            "total" => Some(Self::Total),
            _ => None,
        }
    }
}

/// Binary operation data (separate struct to optimize enum size)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BinaryOpData {
    /// The operator
    pub op: BinaryOperator,
    /// Left operand
    pub left: ExpressionNode,
    /// Right operand
    pub right: ExpressionNode,
}

/// Function call data (separate struct to optimize enum size)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionCallData {
    /// Function name
    pub name: String,
    /// Function arguments (SmallVec for common case of 2-4 args)
    pub args: SmallVec<[ExpressionNode; 4]>,
}

/// Method call data (separate struct to optimize enum size)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodCallData {
    /// Base expression to call method on
    pub base: ExpressionNode,
    /// Method name
    pub method: String,
    /// Method arguments
    pub args: SmallVec<[ExpressionNode; 4]>,
}

/// Literal values in FHIRPath
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LiteralValue {
    /// Boolean literal
    Boolean(bool),
    /// Integer literal
    Integer(i64),
    /// Decimal literal (stored as string to preserve precision)
    Decimal(String),
    /// String literal
    String(String),
    /// Date literal (YYYY-MM-DD), without the `@`
    Date(String),
    /// DateTime literal (ISO 8601), without the `@`
    DateTime(String),
    /// Time literal (HH:MM:SS), without the `@T`
    Time(String),
    /// The empty collection literal `{}`
    Empty,
}

impl ExpressionNode {
    /// Create a literal expression
    pub fn literal(value: LiteralValue) -> Self {
        Self::Literal(value)
    }

    /// Create an identifier expression
    pub fn identifier(name: impl Into<String>) -> Self {
        Self::Identifier(name.into())
    }

    /// Create a function call expression
    pub fn function_call(
        name: impl Into<String>,
        args: impl Into<SmallVec<[ExpressionNode; 4]>>,
    ) -> Self {
        Self::FunctionCall(Box::new(FunctionCallData {
            name: name.into(),
            args: args.into(),
        }))
    }

    /// Create a method call expression
    pub fn method_call(
        base: ExpressionNode,
        method: impl Into<String>,
        args: impl Into<SmallVec<[ExpressionNode; 4]>>,
    ) -> Self {
        Self::MethodCall(Box::new(MethodCallData {
            base,
            method: method.into(),
            args: args.into(),
        }))
    }

    /// Create a binary operation expression
    pub fn binary_op(op: BinaryOperator, left: ExpressionNode, right: ExpressionNode) -> Self {
        Self::BinaryOp(Box::new(BinaryOpData { op, left, right }))
    }

    /// Create a unary operation expression
    pub fn unary_op(op: UnaryOperator, operand: ExpressionNode) -> Self {
        Self::UnaryOp {
            op,
            operand: Box::new(operand),
        }
    }

    /// Create a path navigation expression
    pub fn path(base: ExpressionNode, path: impl Into<String>) -> Self {
        Self::Path {
            base: Box::new(base),
            path: path.into(),
        }
    }

    /// Create an index access expression
    pub fn index(base: ExpressionNode, index: ExpressionNode) -> Self {
        Self::Index {
            base: Box::new(base),
            index: Box::new(index),
        }
    }

    /// Create a type check expression
    pub fn type_check(expression: ExpressionNode, type_name: impl Into<String>) -> Self {
        Self::TypeCheck {
            expression: Box::new(expression),
            type_name: type_name.into(),
        }
    }

    /// Create a type cast expression
    pub fn type_cast(expression: ExpressionNode, type_name: impl Into<String>) -> Self {
        Self::TypeCast {
            expression: Box::new(expression),
            type_name: type_name.into(),
        }
    }

    /// Create an environment variable reference
    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    /// Check if this expression is a literal
    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    /// Get the identifier name if this is an identifier expression
    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Self::Identifier(name) => Some(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn test_constructors() {
        let expr = ExpressionNode::path(ExpressionNode::identifier("Patient"), "name");
        match &expr {
            ExpressionNode::Path { base, path } => {
                assert_eq!(base.as_identifier(), Some("Patient"));
                assert_eq!(path, "name");
            }
            other => panic!("unexpected node {other:?}"),
        }

        let call = ExpressionNode::method_call(
            expr,
            "where",
            smallvec![ExpressionNode::literal(LiteralValue::Boolean(true))],
        );
        assert!(matches!(call, ExpressionNode::MethodCall(ref data) if data.method == "where"));
    }

    #[test]
    fn test_special_variable_names() {
        assert_eq!(SpecialVariable::from_name("this"), Some(SpecialVariable::This));
        assert_eq!(SpecialVariable::from_name("total"), Some(SpecialVariable::Total));
        assert_eq!(SpecialVariable::from_name("that"), None);
    }
}
