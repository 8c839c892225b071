//! FHIRPath Expression Evaluator
//!
//! Synchronous evaluation of parsed FHIRPath expressions over JSON resources.

#![warn(missing_docs)]

mod context;
mod engine;
mod error;
mod operations;

pub use context::{EvaluationConfig, EvaluationContext, VariableMap, VariableScope};
pub use engine::FhirPathEngine;
pub use error::{EvaluationError, EvaluationResult};
pub use operations::{evaluate_binary_operation, evaluate_unary_operation, is_true, to_boolean};
