//! Data model and value types for FHIRPath expressions
//!
//! This module provides the value model the evaluator works on and the
//! descriptors that configure it per data-model version.

#![warn(missing_docs)]

pub mod descriptor;
pub mod types;
pub mod value;

pub use descriptor::ModelDescriptor;
pub use types::TypeInfo;
pub use value::{Collection, FhirPathValue};
