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

// Error types for FHIRPath evaluation

use crate::mapping::guard::ForbiddenAccess;
use crate::parser::ParseError;
use thiserror::Error;

/// Result type for evaluation operations
pub type EvaluationResult<T> = Result<T, EvaluationError>;

/// Errors that can occur during FHIRPath evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    /// The expression text could not be parsed
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Function evaluation error
    #[error("Function error: {0}")]
    Function(#[from] crate::registry::function::FunctionError),

    /// Operator evaluation error
    #[error("Operator error: {0}")]
    Operator(String),

    /// Type error during evaluation
    #[error("Type error: expected {expected}, got {actual}")]
    TypeError {
        /// Expected type
        expected: String,
        /// Actual type found
        actual: String,
    },

    /// Neither a built-in nor a user function has this name
    #[error("Unknown function: {name}")]
    UnknownFunction {
        /// Function name
        name: String,
    },

    /// Variable not found
    #[error("Attempting to access an undefined environment variable: {name}")]
    VariableNotFound {
        /// Variable name
        name: String,
    },

    /// A strict-mode resource was read beyond `resourceType`
    #[error(transparent)]
    ForbiddenAccess(#[from] ForbiddenAccess),

    /// The expression nests deeper than the configured limit
    #[error("Recursion limit of {limit} exceeded")]
    RecursionLimitExceeded {
        /// Configured maximum depth
        limit: usize,
    },

    /// Invalid operation
    #[error("Invalid operation: {message}")]
    InvalidOperation {
        /// Error message
        message: String,
    },
}

impl EvaluationError {
    /// Shorthand for an [`EvaluationError::InvalidOperation`]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_access_message_is_passed_through() {
        let err = EvaluationError::from(ForbiddenAccess {
            property: "name".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "Forbidden access to resource property name in strict mode. Use context instead"
        );
    }
}
