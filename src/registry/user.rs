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

//! Caller-supplied functions
//!
//! A user function is invoked as a method on its input (`input.name(args)`)
//! and takes precedence over a built-in with the same name. Its arity table
//! lists the accepted argument counts together with the parameter types for
//! each count.

use crate::evaluator::{FhirPathEngine, VariableMap};
use crate::model::{Collection, FhirPathValue, ModelDescriptor};
use crate::registry::function::{FunctionError, FunctionResult};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Signature of the callable behind a [`UserFunction`]
pub type UserFunctionImpl =
    dyn Fn(&Collection, &[FhirPathValue]) -> FunctionResult<Collection> + Send + Sync;

/// Named user functions, by function name
pub type UserInvocationTable = IndexMap<String, UserFunction>;

/// Parameter types a user function can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// Any value; collections with several items are passed as a collection
    Any,
    /// A single string
    String,
    /// A single integer
    Integer,
    /// A single integer or decimal
    Number,
    /// A single boolean
    Boolean,
}

impl ParamType {
    fn accepts(self, value: &FhirPathValue) -> bool {
        match self {
            ParamType::Any => true,
            ParamType::String => matches!(value, FhirPathValue::String(_)),
            ParamType::Integer => matches!(value, FhirPathValue::Integer(_)),
            ParamType::Number => {
                matches!(value, FhirPathValue::Integer(_) | FhirPathValue::Decimal(_))
            }
            ParamType::Boolean => matches!(value, FhirPathValue::Boolean(_)),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::Any => "Any",
            ParamType::String => "String",
            ParamType::Integer => "Integer",
            ParamType::Number => "Number",
            ParamType::Boolean => "Boolean",
        };
        f.write_str(name)
    }
}

/// A function registered by the caller
#[derive(Clone)]
pub struct UserFunction {
    /// The implementation, called with the input and one value per argument
    pub func: Arc<UserFunctionImpl>,
    /// Accepted argument counts and their parameter types
    pub arity: BTreeMap<usize, Vec<ParamType>>,
    /// Whether the function is still called when an argument is empty
    pub nullable: bool,
}

impl fmt::Debug for UserFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserFunction")
            .field("arity", &self.arity)
            .field("nullable", &self.nullable)
            .finish_non_exhaustive()
    }
}

impl UserFunction {
    /// Create a user function with an empty arity table
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&Collection, &[FhirPathValue]) -> FunctionResult<Collection> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
            arity: BTreeMap::new(),
            nullable: false,
        }
    }

    /// Accept `params.len()` arguments of the given types
    pub fn with_arity(mut self, params: Vec<ParamType>) -> Self {
        self.arity.insert(params.len(), params);
        self
    }

    /// Call the function even when an argument is empty
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Check the arguments against the arity table and call the function
    pub fn invoke(
        &self,
        name: &str,
        input: &Collection,
        args: &[Collection],
    ) -> FunctionResult<Collection> {
        let Some(params) = self.arity.get(&args.len()) else {
            return Err(FunctionError::InvalidArity {
                name: name.to_string(),
                min: self.arity.keys().next().copied().unwrap_or(0),
                max: self.arity.keys().next_back().copied(),
                actual: args.len(),
            });
        };

        let mut values = Vec::with_capacity(args.len());
        for (index, (arg, param)) in args.iter().zip(params).enumerate() {
            if arg.is_empty() {
                if !self.nullable {
                    log::warn!("user function '{name}' skipped: argument {index} is empty");
                    return Ok(Collection::new());
                }
                values.push(FhirPathValue::Empty);
                continue;
            }

            let value = match (arg.as_singleton(), param) {
                (Some(value), _) => value.clone(),
                (None, ParamType::Any) => FhirPathValue::Collection(arg.clone()),
                (None, _) => {
                    return Err(FunctionError::InvalidArgumentType {
                        name: name.to_string(),
                        index,
                        expected: param.to_string(),
                        actual: format!("collection of {} items", arg.len()),
                    });
                }
            };
            if !param.accepts(&value) {
                return Err(FunctionError::InvalidArgumentType {
                    name: name.to_string(),
                    index,
                    expected: param.to_string(),
                    actual: value.type_name().to_string(),
                });
            }
            values.push(value);
        }

        log::debug!("invoking user function '{name}' with {} argument(s)", values.len());
        (self.func)(input, &values)
    }
}

/// The `answers(linkId)` function over QuestionnaireResponse items
///
/// With a model the answer values are resolved through choice types
/// (`answer.value`); without one the raw `value[x]` objects are unwrapped with
/// `children()`. Without a `linkId` every answer is returned.
pub fn answers_function(model: Option<Arc<ModelDescriptor>>) -> UserFunction {
    let suffix = if model.is_some() { "" } else { ".children()" };
    let by_link_id = format!("repeat(item).where(linkId = %linkId).answer.value{suffix}");
    let all = format!("repeat(item).answer.value{suffix}");
    let engine = Arc::new(FhirPathEngine::new().with_model(model));

    UserFunction::new(move |input, args| {
        let mut variables = VariableMap::default();
        let expression = match args.first() {
            Some(link_id) => {
                variables.insert("linkId".to_string(), Collection::single(link_id.clone()));
                &by_link_id
            }
            None => &all,
        };
        engine
            .evaluate_collection(expression, input.clone(), variables)
            .map_err(|e| FunctionError::evaluation("answers", e.to_string()))
    })
    .with_arity(vec![])
    .with_arity(vec![ParamType::String])
}
