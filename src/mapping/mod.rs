//! FHIRPath Mapping Language template resolution
//!
//! A template is a JSON document whose strings embed FHIRPath expressions
//! (`{{ expr }}`, `{{+ expr +}}`, `{[ expr ]}`) and whose object keys may be
//! directives (`{% assign %}`, `{% merge %}`, `{% for x in expr %}`,
//! `{% if expr %}`/`{% else %}`, `{{ expr }}`). [`resolve`] and [`Resolver`]
//! turn a template plus a resource into a plain document.

#![warn(missing_docs)]

pub mod adapter;
pub mod context;
pub mod directive;
pub mod error;
pub mod guard;
pub mod interpolation;
pub mod node;
pub mod options;
pub mod path;
pub mod walker;

pub use adapter::ExpressionEvaluator;
pub use context::BindingContext;
pub use directive::{Block, DirectiveSet, KeyKind};
pub use error::{FpmlResult, FpmlValidationError};
pub use guard::{ForbiddenAccess, GuardedResource};
pub use node::Node;
pub use options::FpOptions;
pub use path::{NodePath, PathSegment};
pub use walker::{Resolver, resolve};
