//! Function registry for FHIRPath
//!
//! Built-in functions are trait objects keyed by name. Caller-supplied
//! functions live in a separate [`UserInvocationTable`] and are consulted
//! first.

#![warn(missing_docs)]

pub mod function;
pub mod functions;
pub mod signature;
pub mod user;

pub use function::{
    EvaluationContext, FhirPathFunction, FunctionError, FunctionRegistry, FunctionResult,
};
pub use signature::{FunctionSignature, ParameterInfo};
pub use user::{ParamType, UserFunction, UserInvocationTable, answers_function};

/// Create a registry with all built-in functions
pub fn create_standard_registry() -> FunctionRegistry {
    let mut functions = FunctionRegistry::new();
    function::register_builtin_functions(&mut functions);
    functions
}
