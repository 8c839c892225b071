//! FHIRPath Mapping Language in Rust
//!
//! Resolves JSON templates with embedded FHIRPath expressions against FHIR
//! resources. The [`mapping`] module is the template engine; the remaining
//! modules form the FHIRPath evaluator it delegates expressions to.

pub mod ast;
pub mod evaluator;
pub mod mapping;
pub mod model;
pub mod parser;
pub mod registry;

// Re-export main types
pub use evaluator::{EvaluationConfig, EvaluationError, FhirPathEngine};
pub use mapping::{FpOptions, FpmlValidationError, Node, Resolver, resolve};
pub use model::{Collection, FhirPathValue, ModelDescriptor};
pub use parser::{ParseError, parse_expression as parse};
pub use registry::{FunctionRegistry, ParamType, UserFunction, UserInvocationTable};
