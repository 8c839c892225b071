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

//! Operator semantics
//!
//! Operands arrive fully evaluated. Arithmetic and comparison need single
//! items and propagate empty operands; logic is three-valued.

use super::error::{EvaluationError, EvaluationResult};
use crate::ast::{BinaryOperator, UnaryOperator};
use crate::model::{Collection, FhirPathValue};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::cmp::Ordering;

/// Apply a binary operator to two evaluated operands
pub fn evaluate_binary_operation(
    op: BinaryOperator,
    left: Collection,
    right: Collection,
) -> EvaluationResult<Collection> {
    use BinaryOperator::*;

    match op {
        Equal => Ok(boolean_or_empty(equals(&left, &right))),
        NotEqual => Ok(boolean_or_empty(equals(&left, &right).map(|b| !b))),
        Equivalent => Ok(boolean(equivalent(&left, &right))),
        NotEquivalent => Ok(boolean(!equivalent(&left, &right))),
        LessThan | LessThanOrEqual | GreaterThan | GreaterThanOrEqual => {
            compare(op, &left, &right)
        }
        And | Or | Xor | Implies => logical(op, &left, &right),
        Union => {
            let mut merged = left;
            merged.extend(right);
            Ok(merged.distinct())
        }
        In => membership(op, &left, &right),
        Contains => membership(op, &right, &left),
        Concatenate => {
            let left = concat_operand(&left)?;
            let right = concat_operand(&right)?;
            Ok(Collection::single(FhirPathValue::String(left + &right)))
        }
        Add | Subtract | Multiply | Divide | IntegerDivide | Modulo => {
            arithmetic(op, &left, &right)
        }
    }
}

/// Apply a unary operator to an evaluated operand
pub fn evaluate_unary_operation(
    op: UnaryOperator,
    operand: Collection,
) -> EvaluationResult<Collection> {
    let Some(value) = singleton(op.as_str(), &operand)? else {
        return Ok(Collection::new());
    };
    let result = match (op, value) {
        (UnaryOperator::Plus, FhirPathValue::Integer(_) | FhirPathValue::Decimal(_)) => {
            value.clone()
        }
        (UnaryOperator::Minus, FhirPathValue::Integer(i)) => match i.checked_neg() {
            Some(negated) => FhirPathValue::Integer(negated),
            None => return Ok(Collection::new()),
        },
        (UnaryOperator::Minus, FhirPathValue::Decimal(d)) => FhirPathValue::Decimal(-*d),
        (_, other) => {
            return Err(EvaluationError::TypeError {
                expected: "Integer or Decimal".to_string(),
                actual: other.type_name().to_string(),
            });
        }
    };
    Ok(Collection::single(result))
}

/// The collection holds exactly one `true`
///
/// This is the truth test used by `iif()`, `where()` and `all()`.
pub fn is_true(collection: &Collection) -> bool {
    matches!(collection.as_singleton(), Some(FhirPathValue::Boolean(true)))
}

/// Singleton evaluation of a collection as a boolean
///
/// A single non-boolean item counts as `true`.
pub fn to_boolean(operator: &str, collection: &Collection) -> EvaluationResult<Option<bool>> {
    Ok(singleton(operator, collection)?.map(|value| value.as_boolean().unwrap_or(true)))
}

pub(crate) fn singleton<'a>(
    operator: &str,
    collection: &'a Collection,
) -> EvaluationResult<Option<&'a FhirPathValue>> {
    match collection.len() {
        0 => Ok(None),
        1 => Ok(collection.first()),
        n => Err(EvaluationError::Operator(format!(
            "'{operator}' expects a single item, got a collection of {n}"
        ))),
    }
}

fn boolean(value: bool) -> Collection {
    Collection::single(FhirPathValue::Boolean(value))
}

fn boolean_or_empty(value: Option<bool>) -> Collection {
    value.map(boolean).unwrap_or_default()
}

fn equals(left: &Collection, right: &Collection) -> Option<bool> {
    if left.is_empty() || right.is_empty() {
        return None;
    }
    if left.len() != right.len() {
        return Some(false);
    }
    Some(left.iter().zip(right.iter()).all(|(l, r)| l.equals(r)))
}

fn equivalent(left: &Collection, right: &Collection) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter()
        .all(|l| right.iter().any(|r| items_equivalent(l, r)))
}

fn items_equivalent(left: &FhirPathValue, right: &FhirPathValue) -> bool {
    match (left, right) {
        (FhirPathValue::String(l), FhirPathValue::String(r)) => {
            normalize_for_equivalence(l) == normalize_for_equivalence(r)
        }
        _ => left.equals(right),
    }
}

fn normalize_for_equivalence(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn compare(
    op: BinaryOperator,
    left: &Collection,
    right: &Collection,
) -> EvaluationResult<Collection> {
    let (Some(l), Some(r)) = (singleton(op.as_str(), left)?, singleton(op.as_str(), right)?)
    else {
        return Ok(Collection::new());
    };

    let ordering = match (l, r) {
        (
            FhirPathValue::Integer(_) | FhirPathValue::Decimal(_),
            FhirPathValue::Integer(_) | FhirPathValue::Decimal(_),
        ) => l.as_decimal().partial_cmp(&r.as_decimal()),
        (FhirPathValue::String(a), FhirPathValue::String(b)) => Some(a.cmp(b)),
        (FhirPathValue::Date(a), FhirPathValue::Date(b)) => Some(a.cmp(b)),
        (FhirPathValue::DateTime(a), FhirPathValue::DateTime(b)) => Some(a.cmp(b)),
        (FhirPathValue::Time(a), FhirPathValue::Time(b)) => Some(a.cmp(b)),
        // Differing temporal precision is indeterminate
        (FhirPathValue::Date(_), FhirPathValue::DateTime(_))
        | (FhirPathValue::DateTime(_), FhirPathValue::Date(_)) => None,
        _ => {
            return Err(EvaluationError::TypeError {
                expected: l.type_name().to_string(),
                actual: r.type_name().to_string(),
            });
        }
    };

    let Some(ordering) = ordering else {
        return Ok(Collection::new());
    };
    let result = match op {
        BinaryOperator::LessThan => ordering == Ordering::Less,
        BinaryOperator::LessThanOrEqual => ordering != Ordering::Greater,
        BinaryOperator::GreaterThan => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
    };
    Ok(boolean(result))
}

fn logical(
    op: BinaryOperator,
    left: &Collection,
    right: &Collection,
) -> EvaluationResult<Collection> {
    let l = to_boolean(op.as_str(), left)?;
    let r = to_boolean(op.as_str(), right)?;

    let result = match op {
        BinaryOperator::And => match (l, r) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        },
        BinaryOperator::Or => match (l, r) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        },
        BinaryOperator::Xor => match (l, r) {
            (Some(a), Some(b)) => Some(a != b),
            _ => None,
        },
        _ => match (l, r) {
            (Some(false), _) | (_, Some(true)) => Some(true),
            (Some(true), other) => other,
            (None, _) => None,
        },
    };
    Ok(boolean_or_empty(result))
}

fn membership(
    op: BinaryOperator,
    item: &Collection,
    collection: &Collection,
) -> EvaluationResult<Collection> {
    match singleton(op.as_str(), item)? {
        Some(value) => Ok(boolean(collection.contains_value(value))),
        None => Ok(Collection::new()),
    }
}

fn concat_operand(collection: &Collection) -> EvaluationResult<String> {
    match singleton("&", collection)? {
        None => Ok(String::new()),
        Some(value) => value.to_string_value().ok_or_else(|| EvaluationError::TypeError {
            expected: "String".to_string(),
            actual: value.type_name().to_string(),
        }),
    }
}

fn arithmetic(
    op: BinaryOperator,
    left: &Collection,
    right: &Collection,
) -> EvaluationResult<Collection> {
    let (Some(l), Some(r)) = (singleton(op.as_str(), left)?, singleton(op.as_str(), right)?)
    else {
        return Ok(Collection::new());
    };

    let result = match (l, r) {
        (FhirPathValue::String(a), FhirPathValue::String(b)) if op == BinaryOperator::Add => {
            Some(FhirPathValue::String(format!("{a}{b}")))
        }
        (FhirPathValue::Integer(a), FhirPathValue::Integer(b)) => integer_arithmetic(op, *a, *b),
        (
            FhirPathValue::Integer(_) | FhirPathValue::Decimal(_),
            FhirPathValue::Integer(_) | FhirPathValue::Decimal(_),
        ) => match (l.as_decimal(), r.as_decimal()) {
            (Some(a), Some(b)) => decimal_arithmetic(op, a, b),
            _ => None,
        },
        _ => {
            return Err(EvaluationError::Operator(format!(
                "cannot apply '{}' to {} and {}",
                op.as_str(),
                l.type_name(),
                r.type_name()
            )));
        }
    };
    Ok(result.into_iter().collect())
}

/// Integer arithmetic; overflow and division by zero yield empty
fn integer_arithmetic(op: BinaryOperator, a: i64, b: i64) -> Option<FhirPathValue> {
    match op {
        BinaryOperator::Add => a.checked_add(b).map(FhirPathValue::Integer),
        BinaryOperator::Subtract => a.checked_sub(b).map(FhirPathValue::Integer),
        BinaryOperator::Multiply => a.checked_mul(b).map(FhirPathValue::Integer),
        BinaryOperator::IntegerDivide => a.checked_div(b).map(FhirPathValue::Integer),
        BinaryOperator::Modulo => a.checked_rem(b).map(FhirPathValue::Integer),
        _ => decimal_arithmetic(op, Decimal::from(a), Decimal::from(b)),
    }
}

fn decimal_arithmetic(op: BinaryOperator, a: Decimal, b: Decimal) -> Option<FhirPathValue> {
    match op {
        BinaryOperator::Add => a.checked_add(b).map(FhirPathValue::Decimal),
        BinaryOperator::Subtract => a.checked_sub(b).map(FhirPathValue::Decimal),
        BinaryOperator::Multiply => a.checked_mul(b).map(FhirPathValue::Decimal),
        BinaryOperator::Divide => a.checked_div(b).map(|d| FhirPathValue::Decimal(d.normalize())),
        BinaryOperator::IntegerDivide => a
            .checked_div(b)
            .and_then(|d| d.trunc().to_i64())
            .map(FhirPathValue::Integer),
        BinaryOperator::Modulo => a.checked_rem(b).map(FhirPathValue::Decimal),
        _ => None,
    }
}
