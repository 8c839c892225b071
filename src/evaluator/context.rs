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

// Evaluation context for FHIRPath expressions

use crate::model::{Collection, FhirPathValue};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Environment variables by name, without the `%`
pub type VariableMap = FxHashMap<String, Collection>;

/// Evaluator limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationConfig {
    /// Maximum expression nesting depth
    pub max_recursion_depth: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            max_recursion_depth: 1000,
        }
    }
}

/// Implicit variables of the innermost lambda
///
/// At the top level `$this` is the evaluation input and neither `$index` nor
/// `$total` is defined.
#[derive(Clone, Debug, Default)]
pub struct VariableScope {
    /// `$this`
    pub this: Collection,
    /// `$index`
    pub index: Option<usize>,
    /// `$total`, only bound inside `aggregate()`
    pub total: Option<Collection>,
}

impl VariableScope {
    /// Create the top-level scope
    pub fn new(input: Collection) -> Self {
        Self {
            this: input,
            index: None,
            total: None,
        }
    }

    /// Create a lambda scope for one item of the iterated collection
    pub fn lambda_scope(item: FhirPathValue, index: usize, total: Option<Collection>) -> Self {
        Self {
            this: Collection::single(item),
            index: Some(index),
            total,
        }
    }
}

/// Context threaded through a single evaluation
#[derive(Clone, Debug)]
pub struct EvaluationContext {
    /// Input of the whole expression (`%resource`, `%context` by default)
    pub root: Collection,
    /// Caller variables
    pub variables: Arc<VariableMap>,
    /// Current lambda scope
    pub scope: VariableScope,
}

impl EvaluationContext {
    /// Create a context for evaluating against `input`
    pub fn new(input: Collection, variables: VariableMap) -> Self {
        Self {
            scope: VariableScope::new(input.clone()),
            root: input,
            variables: Arc::new(variables),
        }
    }

    /// Derive the context for one lambda iteration
    pub fn with_lambda_implicits(&self, item: FhirPathValue, index: usize) -> Self {
        Self {
            root: self.root.clone(),
            variables: Arc::clone(&self.variables),
            scope: VariableScope::lambda_scope(item, index, self.scope.total.clone()),
        }
    }

    /// Derive the context for one `aggregate()` step
    pub fn with_total(&self, item: FhirPathValue, index: usize, total: Collection) -> Self {
        Self {
            root: self.root.clone(),
            variables: Arc::clone(&self.variables),
            scope: VariableScope::lambda_scope(item, index, Some(total)),
        }
    }

    /// Look up `%name`
    ///
    /// Caller variables shadow the environment defaults.
    pub fn get_variable(&self, name: &str) -> Option<Collection> {
        if let Some(value) = self.variables.get(name) {
            return Some(value.clone());
        }
        match name {
            "context" | "resource" | "rootResource" => Some(self.root.clone()),
            "ucum" => Some(Collection::single("http://unitsofmeasure.org".into())),
            "sct" => Some(Collection::single("http://snomed.info/sct".into())),
            "loinc" => Some(Collection::single("http://loinc.org".into())),
            _ => None,
        }
    }
}
