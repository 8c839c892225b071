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

//! Template tree walker
//!
//! The walker descends the template top-down. At a mapping it binds the
//! assign block first, then dispatches at most one control-flow block. At a
//! string it interpolates. Every result passes through
//! [`Node::normalized`] on the way up, which is where absent values leave
//! their containers and emptied containers become absent themselves.

use indexmap::IndexMap;
use std::sync::Arc;

use super::adapter::ExpressionEvaluator;
use super::context::BindingContext;
use super::directive::{Block, DirectiveSet};
use super::error::{FpmlResult, FpmlValidationError};
use super::guard::GuardedResource;
use super::interpolation::interpolate;
use super::node::Node;
use super::options::FpOptions;
use super::path::NodePath;
use crate::evaluator::FhirPathEngine;
use crate::model::{Collection, FhirPathValue, ModelDescriptor};

/// Resolves templates against resources
///
/// ```
/// use octofhir_fpml::mapping::{Node, Resolver};
/// use octofhir_fpml::FhirPathEngine;
/// use serde_json::json;
///
/// let resolver = Resolver::new(FhirPathEngine::new());
/// let resource = Node::from(json!({"name": "Ann"}));
/// let template = Node::from(json!({"greeting": "Hello, {{ name }}"}));
/// let result = resolver.resolve(&resource, &template, &Default::default()).unwrap();
/// assert_eq!(serde_json::Value::from(result), json!({"greeting": "Hello, Ann"}));
/// ```
pub struct Resolver<E = FhirPathEngine> {
    evaluator: Arc<E>,
    strict: bool,
}

impl<E> Clone for Resolver<E> {
    fn clone(&self) -> Self {
        Self {
            evaluator: Arc::clone(&self.evaluator),
            strict: self.strict,
        }
    }
}

impl<E: std::fmt::Debug> std::fmt::Debug for Resolver<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("evaluator", &self.evaluator)
            .field("strict", &self.strict)
            .finish()
    }
}

impl<E: ExpressionEvaluator> Resolver<E> {
    /// Create a non-strict resolver
    pub fn new(evaluator: E) -> Self {
        Self::from_shared(Arc::new(evaluator))
    }

    /// Create a resolver around an evaluator shared with other resolvers
    pub fn from_shared(evaluator: Arc<E>) -> Self {
        Self {
            evaluator,
            strict: false,
        }
    }

    /// Guard the resource so expressions can only reach its data through
    /// bindings
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Whether the resource is guarded
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// The underlying evaluator
    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// Resolve `template` against `resource`
    ///
    /// `context` supplies the initial bindings. `%context` refers to the
    /// resource unless `context` overrides it.
    pub fn resolve(
        &self,
        resource: &Node,
        template: &Node,
        context: &IndexMap<String, Node>,
    ) -> FpmlResult<Node> {
        log::debug!(
            "resolving {} template (strict: {}, {} binding(s))",
            template.kind(),
            self.strict,
            context.len()
        );
        let bindings = BindingContext::with_root(resource, context);
        let root = self.root_value(resource);
        self.resolve_node(&NodePath::root(), &root, template, &bindings)
    }

    fn root_value(&self, resource: &Node) -> FhirPathValue {
        match resource {
            Node::Mapping(_) => {
                let json = Arc::new(resource.to_json());
                if self.strict {
                    FhirPathValue::Guarded(Arc::new(GuardedResource::new(json)))
                } else {
                    FhirPathValue::Resource(json)
                }
            }
            other => FhirPathValue::Collection(other.to_collection()),
        }
    }

    fn evaluate(
        &self,
        path: &NodePath,
        resource: &FhirPathValue,
        expression: &str,
        bindings: &BindingContext,
    ) -> FpmlResult<Collection> {
        log::debug!("evaluating '{expression}' at '{path}'");
        self.evaluator
            .evaluate(resource, expression, bindings.to_variables())
            .map_err(|e| FpmlValidationError::evaluation(expression, &e, path))
    }

    fn resolve_node(
        &self,
        path: &NodePath,
        resource: &FhirPathValue,
        node: &Node,
        bindings: &BindingContext,
    ) -> FpmlResult<Node> {
        log::trace!("walking {} at '{path}'", node.kind());
        let resolved = match node {
            Node::Mapping(entries) => self.resolve_mapping(path, resource, entries, bindings)?,
            Node::Sequence(items) => {
                let mut resolved = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    resolved.push(self.resolve_node(&path.index(index), resource, item, bindings)?);
                }
                Node::Sequence(resolved)
            }
            Node::String(text) => {
                interpolate(text, |expression| {
                    self.evaluate(path, resource, expression, bindings)
                })?
            }
            other => other.clone(),
        };
        Ok(resolved.normalized())
    }

    fn resolve_mapping(
        &self,
        path: &NodePath,
        resource: &FhirPathValue,
        entries: &IndexMap<String, Node>,
        bindings: &BindingContext,
    ) -> FpmlResult<Node> {
        let directives = DirectiveSet::classify(entries)
            .map_err(|message| FpmlValidationError::new(message, path))?;

        let bindings = match directives.assign {
            Some(assign) => self.assign(path, resource, assign, bindings)?,
            None => bindings.clone(),
        };

        let Some(block) = &directives.block else {
            return self
                .resolve_literals(path, resource, &directives, &bindings)
                .map(Node::Mapping);
        };

        match *block {
            Block::ContextRebind { expression, body } => {
                let answers = self.evaluate(path, resource, expression, &bindings)?;
                log::debug!("context block at '{path}' over {} item(s)", answers.len());
                let mut resolved = Vec::with_capacity(answers.len());
                for answer in answers.iter() {
                    resolved.push(self.resolve_node(path, answer, body, &bindings)?);
                }
                Ok(Node::Sequence(resolved))
            }
            Block::Merge { body } => {
                let items = match body {
                    Node::Sequence(items) => items.as_slice(),
                    single => std::slice::from_ref(single),
                };
                log::debug!("merge block at '{path}' with {} item(s)", items.len());
                let mut layers = Vec::with_capacity(items.len());
                for item in items {
                    match self.resolve_node(path, resource, item, &bindings)? {
                        Node::Mapping(layer) => layers.push(layer),
                        Node::Null | Node::Absent => {}
                        _ => {
                            return Err(FpmlValidationError::new(
                                "Merge block must contain object",
                                path,
                            ));
                        }
                    }
                }
                let mut merged = self.resolve_literals(path, resource, &directives, &bindings)?;
                for layer in layers {
                    merged.extend(layer);
                }
                Ok(Node::Mapping(merged))
            }
            Block::ForEach {
                index_var,
                item_var,
                source,
                body,
            } => {
                let answers = self.evaluate(path, resource, source, &bindings)?;
                log::debug!("for block at '{path}' over {} item(s)", answers.len());
                let mut resolved = Vec::with_capacity(answers.len());
                for (index, answer) in answers.into_iter().enumerate() {
                    let mut scope = bindings.extend_value(item_var, answer);
                    if let Some(index_var) = index_var {
                        scope = scope.extend(index_var, Node::Number(index.into()));
                    }
                    resolved.push(self.resolve_node(path, resource, body, &scope)?);
                }
                Ok(Node::Sequence(resolved))
            }
            Block::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                let test = format!("iif({condition}, true, false)");
                let answers = self.evaluate(path, resource, &test, &bindings)?;
                let taken = matches!(answers.first(), Some(FhirPathValue::Boolean(true)));
                log::debug!(
                    "if block at '{path}' takes the {} branch",
                    if taken { "if" } else { "else" }
                );

                let branch = if taken { Some(then_branch) } else { else_branch };
                let chosen = match branch {
                    Some(branch) => self.resolve_node(path, resource, branch, &bindings)?,
                    None => Node::Absent,
                };
                if directives.is_exclusive() {
                    return Ok(chosen);
                }

                let mut merged = self.resolve_literals(path, resource, &directives, &bindings)?;
                match chosen {
                    Node::Mapping(layer) => merged.extend(layer),
                    Node::Null | Node::Absent => {}
                    _ => {
                        return Err(FpmlValidationError::new(
                            "If/else block must return object for implicit merge into existing node",
                            path,
                        ));
                    }
                }
                Ok(Node::Mapping(merged))
            }
        }
    }

    fn resolve_literals(
        &self,
        path: &NodePath,
        resource: &FhirPathValue,
        directives: &DirectiveSet<'_>,
        bindings: &BindingContext,
    ) -> FpmlResult<IndexMap<String, Node>> {
        let mut resolved = IndexMap::with_capacity(directives.literals.len());
        for &(key, value) in &directives.literals {
            let node = self.resolve_node(&path.key(key), resource, value, bindings)?;
            if !node.is_absent() {
                resolved.insert(key.to_string(), node);
            }
        }
        Ok(resolved)
    }

    /// Bind the entries of an assign block left to right
    fn assign(
        &self,
        path: &NodePath,
        resource: &FhirPathValue,
        assign: &Node,
        bindings: &BindingContext,
    ) -> FpmlResult<BindingContext> {
        let entries = match assign {
            Node::Sequence(items) => items.as_slice(),
            Node::Mapping(_) => std::slice::from_ref(assign),
            _ => {
                return Err(FpmlValidationError::new(
                    "Assign block must accept array or object",
                    path,
                ));
            }
        };

        let mut scope = bindings.clone();
        for entry in entries {
            let Node::Mapping(entry) = entry else {
                return Err(FpmlValidationError::new(
                    "Assign block must accept only one key per object",
                    path,
                ));
            };
            let Some((name, value)) = entry.first().filter(|_| entry.len() == 1) else {
                return Err(FpmlValidationError::new(
                    "Assign block must accept only one key per object",
                    path,
                ));
            };
            let resolved = self.resolve_node(&path.key(name.as_str()), resource, value, &scope)?;
            log::debug!("assigning %{name} at '{path}'");
            scope = scope.extend(name.clone(), resolved);
        }
        Ok(scope)
    }
}

/// Resolve a template with a freshly configured FHIRPath engine
///
/// `model` selects the data-model flavour used for choice types and
/// `options` registers user functions. In `strict` mode expressions can
/// only read the resource's `resourceType`; everything else has to go
/// through `%context` or another binding.
pub fn resolve(
    resource: &Node,
    template: &Node,
    context: &IndexMap<String, Node>,
    model: Option<Arc<ModelDescriptor>>,
    options: Option<FpOptions>,
    strict: bool,
) -> FpmlResult<Node> {
    let options = options.unwrap_or_default();
    let engine = FhirPathEngine::new()
        .with_model(model)
        .with_user_functions(options.user_functions);
    Resolver::new(engine).strict(strict).resolve(resource, template, context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{EvaluationError, VariableMap};
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use std::sync::Mutex;

    /// Records every call and answers from the variables
    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl ExpressionEvaluator for Recording {
        fn evaluate(
            &self,
            _resource: &FhirPathValue,
            expression: &str,
            variables: VariableMap,
        ) -> Result<Collection, EvaluationError> {
            let mut names: Vec<String> = variables.keys().cloned().collect();
            names.sort();
            self.calls
                .lock()
                .unwrap()
                .push((expression.to_string(), names));
            let name = expression.trim_start_matches('%');
            variables
                .get(name)
                .cloned()
                .ok_or_else(|| EvaluationError::VariableNotFound {
                    name: name.to_string(),
                })
        }
    }

    fn run(template: Value) -> FpmlResult<Value> {
        let resolver = Resolver::new(FhirPathEngine::new());
        resolver
            .resolve(&Node::from(json!({"list": [1, 2]})), &Node::from(template), &IndexMap::new())
            .map(Value::from)
    }

    #[test]
    fn test_every_evaluator_call_sees_its_own_scope() {
        let resolver = Resolver::new(Recording::default());
        let template = Node::from(json!({
            "{% assign %}": [{"a": 1}],
            "first": "{{ %a }}",
            "nested": {"{% assign %}": {"b": 2}, "value": "{{ %b }}"},
            "last": "{{ %context }}"
        }));
        let result = resolver
            .resolve(&Node::from(json!({"x": 1})), &template, &IndexMap::new())
            .unwrap();
        assert_eq!(
            Value::from(result),
            json!({"first": 1, "nested": {"value": 2}, "last": {"x": 1}})
        );

        let calls = resolver.evaluator().calls.lock().unwrap();
        assert_eq!(calls[0].1, vec!["a", "context"]);
        assert_eq!(calls[1].1, vec!["a", "b", "context"]);
        assert_eq!(calls[2].1, vec!["a", "context"]);
    }

    #[test]
    fn test_absent_template_resolves_to_absent() {
        let resolver = Resolver::new(FhirPathEngine::new());
        let result = resolver
            .resolve(&Node::Null, &Node::from(json!({"a": []})), &IndexMap::new())
            .unwrap();
        assert_eq!(result, Node::Absent);
    }

    #[test]
    fn test_directive_output_is_not_walked_again() {
        let resolver = Resolver::new(FhirPathEngine::new());
        let resource = Node::from(json!({"list": [1, 2], "raw": "{{ %x }}"}));
        let template = Node::from(json!({"{% for x in list %}": "{{ raw }}"}));
        let result = resolver
            .resolve(&resource, &template, &IndexMap::new())
            .unwrap();
        assert_eq!(Value::from(result), json!(["{{ %x }}", "{{ %x }}"]));
    }

    #[test]
    fn test_for_index_and_item() {
        let result = run(json!({
            "items": {"{% for i, x in list %}": {"pos": "{{ %i }}", "value": "{{ %x }}"}}
        }))
        .unwrap();
        assert_eq!(
            result,
            json!({"items": [{"pos": 0, "value": 1}, {"pos": 1, "value": 2}]})
        );
    }

    #[test]
    fn test_error_path_points_into_template() {
        let err = run(json!({"a": [{"b": "{{ %missing }}"}]})).unwrap_err();
        assert_eq!(err.error_path(), "a.0.b");
        assert_eq!(
            err.to_string(),
            "Can not evaluate '%missing': Attempting to access an undefined environment variable: missing. Path 'a.0.b'"
        );
    }

    #[test]
    fn test_assign_error_reports_node_path() {
        let err = run(json!({"x": {"{% assign %}": [{"a": 1, "b": 2}]}})).unwrap_err();
        assert_eq!(err.error_message(), "Assign block must accept only one key per object");
        assert_eq!(err.error_path(), "x");
    }
}
