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

//! Function registry and built-in functions

use crate::model::{Collection, FhirPathValue, TypeInfo};
use crate::registry::functions::boolean::*;
use crate::registry::functions::collection::*;
use crate::registry::functions::conversion::*;
use crate::registry::functions::math::*;
use crate::registry::functions::string::*;
use crate::registry::functions::utility::*;
use crate::registry::signature::FunctionSignature;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;

/// Result type for function operations
pub type FunctionResult<T> = Result<T, FunctionError>;

/// Function evaluation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FunctionError {
    /// Invalid number of arguments
    #[error("Function '{name}' expects {min}-{} arguments, got {actual}", max.map_or("∞".to_string(), |n| n.to_string()))]
    InvalidArity {
        /// Function name
        name: String,
        /// Minimum arguments
        min: usize,
        /// Maximum arguments (None for unlimited)
        max: Option<usize>,
        /// Actual arguments provided
        actual: usize,
    },

    /// Invalid argument type
    #[error("Function '{name}' argument {index} expects {expected}, got {actual}")]
    InvalidArgumentType {
        /// Function name
        name: String,
        /// Argument index
        index: usize,
        /// Expected type
        expected: String,
        /// Actual type
        actual: String,
    },

    /// Runtime evaluation error
    #[error("Function '{name}' evaluation error: {message}")]
    EvaluationError {
        /// Function name
        name: String,
        /// Error message
        message: String,
    },
}

impl FunctionError {
    /// Shorthand for an evaluation error raised by `name`
    pub fn evaluation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EvaluationError {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Context for function evaluation
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    /// The collection the function is invoked on
    pub input: Collection,
    /// The input the whole expression started from
    pub root: Collection,
}

impl EvaluationContext {
    /// Create a new evaluation context
    pub fn new(input: Collection) -> Self {
        Self {
            root: input.clone(),
            input,
        }
    }

    /// Replace the input while keeping the root
    pub fn with_input(&self, input: Collection) -> Self {
        Self {
            input,
            root: self.root.clone(),
        }
    }
}

/// Trait implemented by every built-in function
///
/// Arguments arrive already evaluated, one collection per argument. Functions
/// whose arguments are expressions (`where`, `select`, `iif` ...) are not
/// registry functions; the engine evaluates those itself.
pub trait FhirPathFunction: Send + Sync {
    /// Get the function name
    fn name(&self) -> &str;

    /// Get the human-friendly name for the function (for documentation)
    fn human_friendly_name(&self) -> &str;

    /// Get the function signature
    fn signature(&self) -> &FunctionSignature;

    /// Evaluate the function with given arguments
    fn evaluate(
        &self,
        args: &[Collection],
        context: &EvaluationContext,
    ) -> FunctionResult<Collection>;

    /// Get function documentation
    fn documentation(&self) -> &str {
        ""
    }

    /// Check if this function is pure (deterministic with no side effects)
    fn is_pure(&self) -> bool {
        false
    }

    /// Validate arguments before evaluation (both arity and types)
    ///
    /// Empty arguments are always accepted; functions decide themselves how
    /// an empty argument propagates.
    fn validate_args(&self, args: &[Collection]) -> FunctionResult<()> {
        let sig = self.signature();

        if !sig.accepts_arity(args.len()) {
            return Err(FunctionError::InvalidArity {
                name: self.name().to_string(),
                min: sig.min_arity,
                max: sig.max_arity,
                actual: args.len(),
            });
        }

        for (index, arg) in args.iter().enumerate() {
            let Some(param) = sig.parameters.get(index) else {
                continue;
            };
            if param.param_type == TypeInfo::Any || arg.is_empty() {
                continue;
            }
            let actual = match arg.as_singleton() {
                Some(value) if parameter_accepts(&param.param_type, value) => continue,
                Some(value) => value.type_name().to_string(),
                None => format!("collection of {} items", arg.len()),
            };
            return Err(FunctionError::InvalidArgumentType {
                name: self.name().to_string(),
                index,
                expected: param.param_type.to_string(),
                actual,
            });
        }

        Ok(())
    }
}

/// Parameter check with implicit Integer to Decimal widening
fn parameter_accepts(param_type: &TypeInfo, value: &FhirPathValue) -> bool {
    match (param_type, value) {
        (TypeInfo::Decimal, FhirPathValue::Integer(_)) => true,
        _ => param_type.accepts(value),
    }
}

/// Single item of the input collection, erroring on more than one
pub(crate) fn input_singleton<'a>(
    name: &str,
    context: &'a EvaluationContext,
) -> FunctionResult<Option<&'a FhirPathValue>> {
    match context.input.len() {
        0 => Ok(None),
        1 => Ok(context.input.first()),
        n => Err(FunctionError::evaluation(
            name,
            format!("expected a single input item, got {n}"),
        )),
    }
}

/// String form of a single-item argument, `None` when the argument is empty
pub(crate) fn string_arg<'a>(args: &'a [Collection], index: usize) -> Option<&'a str> {
    args.get(index)
        .and_then(Collection::as_singleton)
        .and_then(FhirPathValue::as_string)
}

/// Integer form of a single-item argument, `None` when the argument is empty
pub(crate) fn integer_arg(args: &[Collection], index: usize) -> Option<i64> {
    args.get(index)
        .and_then(Collection::as_singleton)
        .and_then(FhirPathValue::as_integer)
}

/// Registry of built-in functions keyed by name
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: FxHashMap<String, Arc<dyn FhirPathFunction>>,
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("function_count", &self.functions.len())
            .finish()
    }
}

impl FunctionRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function, replacing any function with the same name
    pub fn register<F: FhirPathFunction + 'static>(&mut self, function: F) {
        self.functions
            .insert(function.name().to_string(), Arc::new(function));
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn FhirPathFunction>> {
        self.functions.get(name)
    }

    /// Check if a function is registered
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered function names, sorted
    pub fn function_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Validate and evaluate a registered function
    ///
    /// Returns `None` when no function with that name exists.
    pub fn evaluate(
        &self,
        name: &str,
        args: &[Collection],
        context: &EvaluationContext,
    ) -> Option<FunctionResult<Collection>> {
        let function = self.functions.get(name)?;
        Some(
            function
                .validate_args(args)
                .and_then(|()| function.evaluate(args, context)),
        )
    }
}

/// Register all built-in FHIRPath functions
pub fn register_builtin_functions(registry: &mut FunctionRegistry) {
    // Existence and subsetting
    registry.register(EmptyFunction);
    registry.register(CountFunction);
    registry.register(DistinctFunction);
    registry.register(IsDistinctFunction);
    registry.register(FirstFunction);
    registry.register(LastFunction);
    registry.register(TailFunction);
    registry.register(SkipFunction);
    registry.register(TakeFunction);
    registry.register(SingleFunction);
    registry.register(UnionFunction);
    registry.register(CombineFunction);

    // Boolean functions
    registry.register(NotFunction);
    registry.register(AllTrueFunction);
    registry.register(AnyTrueFunction);
    registry.register(AllFalseFunction);
    registry.register(AnyFalseFunction);

    // String functions
    registry.register(JoinFunction);
    registry.register(SplitFunction);
    registry.register(SubstringFunction);
    registry.register(StartsWithFunction);
    registry.register(EndsWithFunction);
    registry.register(ContainsFunction);
    registry.register(IndexOfFunction);
    registry.register(UpperFunction);
    registry.register(LowerFunction);
    registry.register(ReplaceFunction);
    registry.register(MatchesFunction);
    registry.register(LengthFunction);
    registry.register(TrimFunction);

    // Math functions
    registry.register(AbsFunction);
    registry.register(RoundFunction);
    registry.register(FloorFunction);
    registry.register(CeilingFunction);

    // Type conversion functions
    registry.register(ToStringFunction);
    registry.register(ToIntegerFunction);
    registry.register(ToDecimalFunction);
    registry.register(ToBooleanFunction);

    // Utility functions
    registry.register(ChildrenFunction);
    registry.register(DescendantsFunction);
    registry.register(TraceFunction);
    registry.register(TodayFunction);
    registry.register(NowFunction);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FhirPathValue;

    fn registry() -> FunctionRegistry {
        let mut registry = FunctionRegistry::new();
        register_builtin_functions(&mut registry);
        registry
    }

    #[test]
    fn test_builtin_names() {
        let registry = registry();
        for name in ["count", "join", "toInteger", "children", "now"] {
            assert!(registry.contains(name), "missing {name}");
        }
        assert!(!registry.contains("where"));
    }

    #[test]
    fn test_arity_is_validated() {
        let registry = registry();
        let context = EvaluationContext::new(Collection::new());
        let result = registry
            .evaluate("count", &[Collection::single(FhirPathValue::Integer(1))], &context)
            .unwrap();
        assert!(matches!(result, Err(FunctionError::InvalidArity { actual: 1, .. })));
    }

    #[test]
    fn test_argument_type_is_validated() {
        let registry = registry();
        let context = EvaluationContext::new(Collection::single("abc".into()));
        let result = registry
            .evaluate("startsWith", &[Collection::single(FhirPathValue::Integer(1))], &context)
            .unwrap();
        assert!(matches!(
            result,
            Err(FunctionError::InvalidArgumentType { index: 0, .. })
        ));
    }

    #[test]
    fn test_unknown_function() {
        let context = EvaluationContext::new(Collection::new());
        assert!(registry().evaluate("nope", &[], &context).is_none());
    }
}
