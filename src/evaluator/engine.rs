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

//! FHIRPath evaluation engine
//!
//! A tree-walking interpreter over [`ExpressionNode`]. Every node evaluates
//! to a [`Collection`]; navigation flattens arrays and drops JSON `null`.
//! Functions whose arguments are expressions (`where`, `select`, `repeat`,
//! `exists`, `all`, `iif`, `aggregate` and the type functions) are evaluated
//! here, everything else goes through the [`FunctionRegistry`].

use super::context::{EvaluationConfig, EvaluationContext, VariableMap};
use super::error::{EvaluationError, EvaluationResult};
use super::operations::{evaluate_binary_operation, evaluate_unary_operation, is_true, singleton};
use crate::ast::{ExpressionNode, LiteralValue, SpecialVariable};
use crate::model::{Collection, FhirPathValue, ModelDescriptor, TypeInfo};
use crate::parser::parse_expression;
use crate::registry::function::{EvaluationContext as FunctionContext, FunctionError};
use crate::registry::{FunctionRegistry, UserInvocationTable, create_standard_registry};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;
use std::sync::Arc;

/// Main FHIRPath evaluation engine
///
/// The engine is immutable once built and can be shared between threads
/// behind an `Arc`.
#[derive(Clone)]
pub struct FhirPathEngine {
    functions: Arc<FunctionRegistry>,
    user_functions: Arc<UserInvocationTable>,
    model: Option<Arc<ModelDescriptor>>,
    config: EvaluationConfig,
}

impl std::fmt::Debug for FhirPathEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FhirPathEngine")
            .field("functions", &self.functions)
            .field("user_functions", &self.user_functions.keys().collect::<Vec<_>>())
            .field("model", &self.model.as_ref().map(|m| m.version.as_str()))
            .field("config", &self.config)
            .finish()
    }
}

impl Default for FhirPathEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FhirPathEngine {
    /// Create an engine with the built-in functions and no data model
    pub fn new() -> Self {
        Self {
            functions: Arc::new(create_standard_registry()),
            user_functions: Arc::new(UserInvocationTable::new()),
            model: None,
            config: EvaluationConfig::default(),
        }
    }

    /// Use a data model for choice-type navigation
    pub fn with_model(mut self, model: Option<Arc<ModelDescriptor>>) -> Self {
        self.model = model;
        self
    }

    /// Register caller functions; they shadow built-ins of the same name
    pub fn with_user_functions(mut self, user_functions: UserInvocationTable) -> Self {
        self.user_functions = Arc::new(user_functions);
        self
    }

    /// Replace the evaluation limits
    pub fn with_config(mut self, config: EvaluationConfig) -> Self {
        self.config = config;
        self
    }

    /// The configured data model
    pub fn model(&self) -> Option<&Arc<ModelDescriptor>> {
        self.model.as_ref()
    }

    /// The built-in function registry
    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// The registered user functions
    pub fn user_functions(&self) -> &UserInvocationTable {
        &self.user_functions
    }

    /// Evaluate an expression against a single input value
    pub fn evaluate(&self, expression: &str, input: FhirPathValue) -> EvaluationResult<Collection> {
        self.evaluate_with_variables(expression, input, VariableMap::default())
    }

    /// Evaluate an expression with environment variables
    pub fn evaluate_with_variables(
        &self,
        expression: &str,
        input: FhirPathValue,
        variables: VariableMap,
    ) -> EvaluationResult<Collection> {
        self.evaluate_collection(expression, Collection::single(input), variables)
    }

    /// Evaluate an expression against an input collection
    pub fn evaluate_collection(
        &self,
        expression: &str,
        input: Collection,
        variables: VariableMap,
    ) -> EvaluationResult<Collection> {
        let ast = parse_expression(expression)?;
        self.evaluate_ast(&ast, input, variables)
    }

    /// Evaluate a parsed expression
    pub fn evaluate_ast(
        &self,
        ast: &ExpressionNode,
        input: Collection,
        variables: VariableMap,
    ) -> EvaluationResult<Collection> {
        let context = EvaluationContext::new(input, variables);
        let input = context.root.clone();
        self.evaluate_node(ast, &input, &context, 0)
    }

    fn evaluate_node(
        &self,
        node: &ExpressionNode,
        input: &Collection,
        context: &EvaluationContext,
        depth: usize,
    ) -> EvaluationResult<Collection> {
        if depth > self.config.max_recursion_depth {
            return Err(EvaluationError::RecursionLimitExceeded {
                limit: self.config.max_recursion_depth,
            });
        }
        let depth = depth + 1;

        match node {
            ExpressionNode::Literal(literal) => literal_value(literal),
            ExpressionNode::Identifier(name) => self.navigate_identifier(input, name),
            ExpressionNode::Path { base, path } => {
                let base = self.evaluate_node(base, input, context, depth)?;
                self.navigate(&base, path)
            }
            ExpressionNode::BinaryOp(data) => {
                let left = self.evaluate_node(&data.left, input, context, depth)?;
                let right = self.evaluate_node(&data.right, input, context, depth)?;
                evaluate_binary_operation(data.op, left, right)
            }
            ExpressionNode::UnaryOp { op, operand } => {
                let operand = self.evaluate_node(operand, input, context, depth)?;
                evaluate_unary_operation(*op, operand)
            }
            ExpressionNode::FunctionCall(data) => {
                self.call_function(&data.name, &data.args, input.clone(), context, depth)
            }
            ExpressionNode::MethodCall(data) => {
                let base = self.evaluate_node(&data.base, input, context, depth)?;
                self.call_function(&data.method, &data.args, base, context, depth)
            }
            ExpressionNode::Index { base, index } => {
                let base = self.evaluate_node(base, input, context, depth)?;
                let index = self.evaluate_node(index, input, context, depth)?;
                match singleton("[]", &index)? {
                    None => Ok(Collection::new()),
                    Some(FhirPathValue::Integer(i)) => Ok(usize::try_from(*i)
                        .ok()
                        .and_then(|i| base.get(i).cloned())
                        .into_iter()
                        .collect()),
                    Some(other) => Err(EvaluationError::TypeError {
                        expected: "Integer".to_string(),
                        actual: other.type_name().to_string(),
                    }),
                }
            }
            ExpressionNode::TypeCheck {
                expression,
                type_name,
            } => {
                let value = self.evaluate_node(expression, input, context, depth)?;
                type_check(&value, type_name)
            }
            ExpressionNode::TypeCast {
                expression,
                type_name,
            } => {
                let value = self.evaluate_node(expression, input, context, depth)?;
                Ok(type_cast(value, type_name))
            }
            ExpressionNode::Variable(name) => {
                context
                    .get_variable(name)
                    .ok_or_else(|| EvaluationError::VariableNotFound {
                        name: name.clone(),
                    })
            }
            ExpressionNode::Special(SpecialVariable::This) => Ok(context.scope.this.clone()),
            ExpressionNode::Special(SpecialVariable::Index) => Ok(context
                .scope
                .index
                .map(|i| FhirPathValue::Integer(i as i64))
                .into_iter()
                .collect()),
            ExpressionNode::Special(SpecialVariable::Total) => {
                Ok(context.scope.total.clone().unwrap_or_default())
            }
        }
    }

    /// Navigate the first segment of a path
    ///
    /// A resource whose `resourceType` equals the identifier stands for
    /// itself, so `Patient.name` works on a Patient.
    fn navigate_identifier(&self, input: &Collection, name: &str) -> EvaluationResult<Collection> {
        let is_type_name = name.starts_with(|c: char| c.is_ascii_uppercase());
        let mut result = Collection::new();
        for item in input {
            if is_type_name
                && matches!(item, FhirPathValue::Resource(_) | FhirPathValue::Guarded(_))
                && item.type_name() == name
            {
                result.push(item.clone());
            } else {
                self.navigate_item(item, name, &mut result)?;
            }
        }
        Ok(result)
    }

    fn navigate(&self, input: &Collection, name: &str) -> EvaluationResult<Collection> {
        let mut result = Collection::new();
        for item in input {
            self.navigate_item(item, name, &mut result)?;
        }
        Ok(result)
    }

    fn navigate_item(
        &self,
        item: &FhirPathValue,
        name: &str,
        result: &mut Collection,
    ) -> EvaluationResult<()> {
        match item {
            FhirPathValue::Resource(_) => {
                if let Some(object) = item.as_json_object() {
                    self.navigate_object(object, name, result);
                }
            }
            FhirPathValue::Guarded(guarded) => {
                if let Some(value) = guarded.get(name)? {
                    result.push(FhirPathValue::from_json(value));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn navigate_object(&self, object: &Map<String, Value>, name: &str, result: &mut Collection) {
        if let Some(value) = object.get(name) {
            result.push(FhirPathValue::from_json(value));
            return;
        }
        if let Some(model) = &self.model {
            for candidate in model.choice_candidates(name) {
                if let Some(value) = object.get(&candidate) {
                    result.push(FhirPathValue::from_json(value));
                }
            }
        }
    }

    fn call_function(
        &self,
        name: &str,
        args: &[ExpressionNode],
        input: Collection,
        context: &EvaluationContext,
        depth: usize,
    ) -> EvaluationResult<Collection> {
        if let Some(function) = self.user_functions.get(name) {
            let values = self.evaluate_arguments(args, context, depth)?;
            return Ok(function.invoke(name, &input, &values)?);
        }

        match name {
            "where" => {
                expect_arity(name, args, 1, 1)?;
                let mut result = Collection::new();
                for (index, item) in input.iter().enumerate() {
                    if is_true(&self.evaluate_lambda(&args[0], item, index, context, depth)?) {
                        result.push(item.clone());
                    }
                }
                Ok(result)
            }
            "select" => {
                expect_arity(name, args, 1, 1)?;
                let mut result = Collection::new();
                for (index, item) in input.iter().enumerate() {
                    result.extend(self.evaluate_lambda(&args[0], item, index, context, depth)?);
                }
                Ok(result)
            }
            "repeat" => {
                expect_arity(name, args, 1, 1)?;
                self.repeat(&args[0], input, context, depth)
            }
            "exists" => {
                expect_arity(name, args, 0, 1)?;
                let found = match args.first() {
                    None => !input.is_empty(),
                    Some(criteria) => {
                        let mut found = false;
                        for (index, item) in input.iter().enumerate() {
                            if is_true(&self.evaluate_lambda(criteria, item, index, context, depth)?)
                            {
                                found = true;
                                break;
                            }
                        }
                        found
                    }
                };
                Ok(Collection::single(FhirPathValue::Boolean(found)))
            }
            "all" => {
                expect_arity(name, args, 1, 1)?;
                let mut all = true;
                for (index, item) in input.iter().enumerate() {
                    if !is_true(&self.evaluate_lambda(&args[0], item, index, context, depth)?) {
                        all = false;
                        break;
                    }
                }
                Ok(Collection::single(FhirPathValue::Boolean(all)))
            }
            "iif" => {
                expect_arity(name, args, 2, 3)?;
                let criterion = self.evaluate_node(&args[0], &input, context, depth)?;
                if is_true(&criterion) {
                    self.evaluate_node(&args[1], &input, context, depth)
                } else if let Some(otherwise) = args.get(2) {
                    self.evaluate_node(otherwise, &input, context, depth)
                } else {
                    Ok(Collection::new())
                }
            }
            "aggregate" => {
                expect_arity(name, args, 1, 2)?;
                let mut total = match args.get(1) {
                    Some(init) => self.evaluate_arguments(std::slice::from_ref(init), context, depth)?
                        .pop()
                        .unwrap_or_default(),
                    None => Collection::new(),
                };
                for (index, item) in input.iter().enumerate() {
                    let step = context.with_total(item.clone(), index, total);
                    total = self.evaluate_node(&args[0], &step.scope.this, &step, depth)?;
                }
                Ok(total)
            }
            "ofType" => {
                expect_arity(name, args, 1, 1)?;
                Ok(type_cast(input, &type_specifier(name, &args[0])?))
            }
            "is" => {
                expect_arity(name, args, 1, 1)?;
                type_check(&input, &type_specifier(name, &args[0])?)
            }
            "as" => {
                expect_arity(name, args, 1, 1)?;
                Ok(type_cast(input, &type_specifier(name, &args[0])?))
            }
            _ => {
                let values = self.evaluate_arguments(args, context, depth)?;
                let function_context = FunctionContext {
                    input,
                    root: context.root.clone(),
                };
                match self.functions.evaluate(name, &values, &function_context) {
                    Some(result) => Ok(result?),
                    None => Err(EvaluationError::UnknownFunction {
                        name: name.to_string(),
                    }),
                }
            }
        }
    }

    /// Evaluate plain arguments against the current `$this`
    fn evaluate_arguments(
        &self,
        args: &[ExpressionNode],
        context: &EvaluationContext,
        depth: usize,
    ) -> EvaluationResult<Vec<Collection>> {
        args.iter()
            .map(|arg| self.evaluate_node(arg, &context.scope.this, context, depth))
            .collect()
    }

    fn evaluate_lambda(
        &self,
        body: &ExpressionNode,
        item: &FhirPathValue,
        index: usize,
        context: &EvaluationContext,
        depth: usize,
    ) -> EvaluationResult<Collection> {
        let scope = context.with_lambda_implicits(item.clone(), index);
        self.evaluate_node(body, &scope.scope.this, &scope, depth)
    }

    /// Apply `projection` until no new items appear
    fn repeat(
        &self,
        projection: &ExpressionNode,
        input: Collection,
        context: &EvaluationContext,
        depth: usize,
    ) -> EvaluationResult<Collection> {
        let mut result = Collection::new();
        let mut current = input;
        while !current.is_empty() {
            let mut next = Collection::new();
            for (index, item) in current.iter().enumerate() {
                for value in self.evaluate_lambda(projection, item, index, context, depth)? {
                    if !result.contains_value(&value) {
                        result.push(value.clone());
                        next.push(value);
                    }
                }
            }
            current = next;
        }
        Ok(result)
    }
}

fn expect_arity(
    name: &str,
    args: &[ExpressionNode],
    min: usize,
    max: usize,
) -> EvaluationResult<()> {
    if args.len() < min || args.len() > max {
        return Err(FunctionError::InvalidArity {
            name: name.to_string(),
            min,
            max: Some(max),
            actual: args.len(),
        }
        .into());
    }
    Ok(())
}

/// Read a type specifier written as a function argument (`ofType(FHIR.string)`)
fn type_specifier(function: &str, node: &ExpressionNode) -> EvaluationResult<String> {
    match node {
        ExpressionNode::Identifier(name) => Ok(name.clone()),
        ExpressionNode::Path { base, path } => {
            let namespace = type_specifier(function, base)?;
            Ok(format!("{namespace}.{path}"))
        }
        _ => Err(EvaluationError::invalid(format!(
            "{function}() expects a type name"
        ))),
    }
}

fn type_check(value: &Collection, type_name: &str) -> EvaluationResult<Collection> {
    Ok(singleton("is", value)?
        .map(|item| {
            let matches = TypeInfo::from_type_specifier(type_name).accepts(item);
            FhirPathValue::Boolean(matches)
        })
        .into_iter()
        .collect())
}

fn type_cast(value: Collection, type_name: &str) -> Collection {
    let type_info = TypeInfo::from_type_specifier(type_name);
    value
        .into_iter()
        .filter(|item| type_info.accepts(item))
        .collect()
}

fn literal_value(literal: &LiteralValue) -> EvaluationResult<Collection> {
    let value = match literal {
        LiteralValue::Boolean(b) => FhirPathValue::Boolean(*b),
        LiteralValue::Integer(i) => FhirPathValue::Integer(*i),
        LiteralValue::Decimal(text) => Decimal::from_str(text)
            .map(FhirPathValue::Decimal)
            .map_err(|e| EvaluationError::invalid(format!("invalid decimal {text}: {e}")))?,
        LiteralValue::String(s) => FhirPathValue::String(s.clone()),
        LiteralValue::Date(text) => FhirPathValue::Date(parse_date(text)?),
        LiteralValue::DateTime(text) => FhirPathValue::DateTime(parse_datetime(text)?),
        LiteralValue::Time(text) => FhirPathValue::Time(parse_time(text)?),
        LiteralValue::Empty => return Ok(Collection::new()),
    };
    Ok(Collection::single(value))
}

/// Full `YYYY-MM-DD` dates only; partial dates have no single-day value
fn parse_date(text: &str) -> EvaluationResult<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|_| EvaluationError::invalid(format!("unsupported date literal @{text}")))
}

/// Pad `HH` and `HH:MM` to full seconds
fn parse_time(text: &str) -> EvaluationResult<NaiveTime> {
    let padded = match text.len() {
        0 => "00:00:00".to_string(),
        2 => format!("{text}:00:00"),
        5 => format!("{text}:00"),
        _ => text.to_string(),
    };
    NaiveTime::parse_from_str(&padded, "%H:%M:%S%.f")
        .map_err(|_| EvaluationError::invalid(format!("unsupported time literal @T{text}")))
}

/// DateTime literals without a zone are read as UTC
fn parse_datetime(text: &str) -> EvaluationResult<DateTime<FixedOffset>> {
    let invalid = || EvaluationError::invalid(format!("unsupported datetime literal @{text}"));
    let (date, time) = text.split_once('T').ok_or_else(invalid)?;
    let date = parse_date(date)?;

    let (time, offset) = if let Some(time) = time.strip_suffix('Z') {
        (time, 0)
    } else if time.len() > 6 && matches!(time.as_bytes()[time.len() - 6], b'+' | b'-') {
        let (time, zone) = time.split_at(time.len() - 6);
        let sign = if zone.starts_with('-') { -1 } else { 1 };
        let hours: i32 = zone[1..3].parse().map_err(|_| invalid())?;
        let minutes: i32 = zone[4..6].parse().map_err(|_| invalid())?;
        (time, sign * (hours * 3600 + minutes * 60))
    } else {
        (time, 0)
    };

    let offset = FixedOffset::east_opt(offset).ok_or_else(invalid)?;
    NaiveDateTime::new(date, parse_time(time)?)
        .and_local_timezone(offset)
        .single()
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ParamType, UserFunction};
    use serde_json::json;

    fn patient() -> FhirPathValue {
        FhirPathValue::resource(json!({
            "resourceType": "Patient",
            "name": [
                {"given": ["Ann", "Marie"], "family": "Smith"},
                {"given": ["Annie"]}
            ],
            "deceasedBoolean": false
        }))
    }

    fn strings(values: &[&str]) -> Collection {
        values.iter().map(|v| FhirPathValue::from(*v)).collect()
    }

    #[test]
    fn test_navigation_flattens() {
        let engine = FhirPathEngine::new();
        let result = engine.evaluate("Patient.name.given", patient()).unwrap();
        assert_eq!(result, strings(&["Ann", "Marie", "Annie"]));

        let result = engine.evaluate("name.given", patient()).unwrap();
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_choice_navigation_requires_model() {
        let engine = FhirPathEngine::new();
        assert!(engine.evaluate("deceased", patient()).unwrap().is_empty());

        let engine = engine.with_model(Some(Arc::new(ModelDescriptor::r4())));
        assert_eq!(
            engine.evaluate("deceased", patient()).unwrap(),
            Collection::single(FhirPathValue::Boolean(false))
        );
    }

    #[test]
    fn test_lambdas() {
        let engine = FhirPathEngine::new();
        let result = engine
            .evaluate("name.where(family.exists()).given.first()", patient())
            .unwrap();
        assert_eq!(result, strings(&["Ann"]));

        let result = engine
            .evaluate("name.select(given.count())", patient())
            .unwrap();
        assert_eq!(
            result,
            vec![FhirPathValue::Integer(2), FhirPathValue::Integer(1)].into()
        );

        let result = engine
            .evaluate("name.given.where($index > 0)", patient())
            .unwrap();
        assert_eq!(result, strings(&["Marie", "Annie"]));
    }

    #[test]
    fn test_iif_and_variables() {
        let engine = FhirPathEngine::new();
        let mut variables = VariableMap::default();
        variables.insert("flag".to_string(), Collection::single(FhirPathValue::Boolean(true)));
        let result = engine
            .evaluate_with_variables("iif(%flag, 'yes', 'no')", patient(), variables)
            .unwrap();
        assert_eq!(result, strings(&["yes"]));

        let err = engine.evaluate("%missing", patient()).unwrap_err();
        assert!(matches!(err, EvaluationError::VariableNotFound { .. }));
    }

    #[test]
    fn test_repeat_and_aggregate() {
        let engine = FhirPathEngine::new();
        let tree = FhirPathValue::resource(json!({
            "item": [{"id": 1, "item": [{"id": 2}]}, {"id": 3}]
        }));
        let result = engine.evaluate("repeat(item).id", tree).unwrap();
        assert_eq!(
            result,
            vec![
                FhirPathValue::Integer(1),
                FhirPathValue::Integer(3),
                FhirPathValue::Integer(2)
            ]
            .into()
        );

        let result = engine
            .evaluate("(1 | 2 | 3).aggregate($this + $total, 0)", FhirPathValue::Empty)
            .unwrap();
        assert_eq!(result, Collection::single(FhirPathValue::Integer(6)));
    }

    #[test]
    fn test_literals() {
        let engine = FhirPathEngine::new();
        let result = engine
            .evaluate("@2020-01-02T10:00:00+02:00 < @2020-01-02T09:00:00Z", FhirPathValue::Empty)
            .unwrap();
        assert_eq!(result, Collection::single(FhirPathValue::Boolean(true)));
        assert!(engine.evaluate("@2020", FhirPathValue::Empty).is_err());
        assert!(engine.evaluate("{}", FhirPathValue::Empty).unwrap().is_empty());
    }

    #[test]
    fn test_type_operators() {
        let engine = FhirPathEngine::new();
        let result = engine.evaluate("Patient is Patient", patient()).unwrap();
        assert_eq!(result, Collection::single(FhirPathValue::Boolean(true)));

        let result = engine
            .evaluate("(1 | 'a' | 2).ofType(Integer).count()", FhirPathValue::Empty)
            .unwrap();
        assert_eq!(result, Collection::single(FhirPathValue::Integer(2)));
    }

    #[test]
    fn test_user_functions_shadow_builtins() {
        let mut table = UserInvocationTable::new();
        table.insert(
            "count".to_string(),
            UserFunction::new(|_, _| Ok(Collection::single(FhirPathValue::Integer(-1))))
                .with_arity(vec![]),
        );
        table.insert(
            "double".to_string(),
            UserFunction::new(|_, args| {
                let value = args[0].as_integer().unwrap_or(0);
                Ok(Collection::single(FhirPathValue::Integer(value * 2)))
            })
            .with_arity(vec![ParamType::Integer]),
        );
        let engine = FhirPathEngine::new().with_user_functions(table);

        assert_eq!(
            engine.evaluate("name.count()", patient()).unwrap(),
            Collection::single(FhirPathValue::Integer(-1))
        );
        assert_eq!(
            engine.evaluate("double(21)", patient()).unwrap(),
            Collection::single(FhirPathValue::Integer(42))
        );
    }

    #[test]
    fn test_recursion_limit() {
        let engine = FhirPathEngine::new().with_config(EvaluationConfig {
            max_recursion_depth: 3,
        });
        let err = engine.evaluate("1 + (2 + (3 + (4 + 5)))", FhirPathValue::Empty).unwrap_err();
        assert_eq!(err, EvaluationError::RecursionLimitExceeded { limit: 3 });
    }

    #[test]
    fn test_unknown_function() {
        let engine = FhirPathEngine::new();
        let err = engine.evaluate("name.frobnicate()", patient()).unwrap_err();
        assert!(matches!(err, EvaluationError::UnknownFunction { .. }));
    }
}
