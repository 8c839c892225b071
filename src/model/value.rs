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

//! Core value types for FHIRPath expressions

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, SecondsFormat};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::types::TypeInfo;
use crate::mapping::guard::GuardedResource;

/// Core value type for FHIRPath expressions
///
/// Every FHIRPath result is conceptually a collection; single items are
/// represented directly and gathered into a [`Collection`] by the evaluator.
/// JSON strings are never reinterpreted as dates: only date literals and the
/// date functions produce temporal values.
#[derive(Clone, PartialEq)]
pub enum FhirPathValue {
    /// Boolean value
    Boolean(bool),

    /// Integer value (64-bit signed)
    Integer(i64),

    /// Decimal value with arbitrary precision
    Decimal(Decimal),

    /// String value
    String(String),

    /// Date value (without time)
    Date(NaiveDate),

    /// DateTime value with timezone
    DateTime(DateTime<FixedOffset>),

    /// Time value (without date)
    Time(NaiveTime),

    /// JSON object (resource or complex element)
    Resource(Arc<Value>),

    /// Resource wrapped by the strict-mode access guard
    Guarded(Arc<GuardedResource>),

    /// Nested collection, flattened by the evaluator on insertion
    Collection(Collection),

    /// Empty value (equivalent to an empty collection)
    Empty,
}

/// Ordered collection of values, the unit every FHIRPath operation works on
#[derive(Clone, PartialEq, Default)]
pub struct Collection(Vec<FhirPathValue>);

impl Collection {
    /// Create a new empty collection
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Create a collection from a vector
    pub fn from_vec(values: Vec<FhirPathValue>) -> Self {
        Self(values)
    }

    /// Create a single-item collection
    pub fn single(value: FhirPathValue) -> Self {
        let mut collection = Self::new();
        collection.push(value);
        collection
    }

    /// Get the length of the collection
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the collection is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get an iterator over the values
    pub fn iter(&self) -> std::slice::Iter<'_, FhirPathValue> {
        self.0.iter()
    }

    /// Push a value, flattening nested collections and dropping empties
    pub fn push(&mut self, value: FhirPathValue) {
        match value {
            FhirPathValue::Empty => {}
            FhirPathValue::Collection(items) => self.0.extend(items.0),
            other => self.0.push(other),
        }
    }

    /// Extend the collection with another
    pub fn extend(&mut self, other: Collection) {
        self.0.extend(other.0);
    }

    /// Get the first value
    pub fn first(&self) -> Option<&FhirPathValue> {
        self.0.first()
    }

    /// Get the last value
    pub fn last(&self) -> Option<&FhirPathValue> {
        self.0.last()
    }

    /// Take ownership of the inner vector
    pub fn into_vec(self) -> Vec<FhirPathValue> {
        self.0
    }

    /// Borrow the values as a slice
    pub fn as_slice(&self) -> &[FhirPathValue] {
        &self.0
    }

    /// Get an element by index
    pub fn get(&self, index: usize) -> Option<&FhirPathValue> {
        self.0.get(index)
    }

    /// The single item of a one-element collection
    pub fn as_singleton(&self) -> Option<&FhirPathValue> {
        match self.0.as_slice() {
            [item] => Some(item),
            _ => None,
        }
    }

    /// Check whether an equal item is present
    pub fn contains_value(&self, value: &FhirPathValue) -> bool {
        self.0.iter().any(|item| item.equals(value))
    }

    /// Remove duplicate items, keeping the first occurrence
    pub fn distinct(&self) -> Collection {
        let mut unique = Collection::new();
        for item in &self.0 {
            if !unique.contains_value(item) {
                unique.0.push(item.clone());
            }
        }
        unique
    }
}

impl From<Vec<FhirPathValue>> for Collection {
    fn from(values: Vec<FhirPathValue>) -> Self {
        values.into_iter().collect()
    }
}

impl FromIterator<FhirPathValue> for Collection {
    fn from_iter<I: IntoIterator<Item = FhirPathValue>>(iter: I) -> Self {
        let mut collection = Collection::new();
        for value in iter {
            collection.push(value);
        }
        collection
    }
}

impl IntoIterator for Collection {
    type Item = FhirPathValue;
    type IntoIter = std::vec::IntoIter<FhirPathValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a FhirPathValue;
    type IntoIter = std::slice::Iter<'a, FhirPathValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FhirPathValue {
    /// Create an empty value
    pub fn empty() -> Self {
        Self::Empty
    }

    /// Wrap a JSON document as a resource value
    pub fn resource(value: Value) -> Self {
        Self::Resource(Arc::new(value))
    }

    /// Convert a JSON value into a FHIRPath value
    ///
    /// Arrays become collections, `null` becomes empty. Numbers that fit an
    /// `i64` are integers; every other number is read as a decimal from its
    /// textual form so no binary rounding is introduced.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Empty,
            Value::Bool(b) => Self::Boolean(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => {
                    let text = n.to_string();
                    Decimal::from_str(&text)
                        .or_else(|_| Decimal::from_scientific(&text))
                        .map(Self::Decimal)
                        .unwrap_or(Self::String(text))
                }
            },
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::Collection(items.iter().map(Self::from_json).collect()),
            Value::Object(_) => Self::Resource(Arc::new(value.clone())),
        }
    }

    /// Convert to plain JSON
    ///
    /// Temporal values are rendered as ISO strings without the `@` marker and
    /// integral decimals collapse to JSON integers.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Boolean(b) => Value::Bool(*b),
            Self::Integer(i) => Value::Number((*i).into()),
            Self::Decimal(d) => decimal_to_json(d),
            Self::String(s) => Value::String(s.clone()),
            Self::Date(_) | Self::DateTime(_) | Self::Time(_) => {
                Value::String(self.to_string_value().unwrap_or_default())
            }
            Self::Resource(resource) => resource.as_ref().clone(),
            Self::Guarded(guarded) => guarded.visible_json(),
            Self::Collection(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Empty => Value::Null,
        }
    }

    /// Check if the value is empty
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Collection(items) => items.is_empty(),
            _ => false,
        }
    }

    /// FHIRPath equality of single items
    ///
    /// Integers and decimals compare numerically; values of different kinds
    /// are never equal.
    pub fn equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Integer(_) | Self::Decimal(_), Self::Integer(_) | Self::Decimal(_)) => {
                self.as_decimal() == other.as_decimal()
            }
            (Self::Guarded(a), Self::Guarded(b)) => Arc::ptr_eq(a, b),
            _ => self == other,
        }
    }

    /// Get the JSON object behind a resource value
    ///
    /// Guarded resources are deliberately not exposed here; their fields are
    /// only reachable through the guard.
    pub fn as_json_object(&self) -> Option<&serde_json::Map<String, Value>> {
        match self {
            Self::Resource(resource) => resource.as_object(),
            _ => None,
        }
    }

    /// Text form of primitive values, `None` for objects and collections
    pub fn to_string_value(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Boolean(b) => Some(b.to_string()),
            Self::Integer(i) => Some(i.to_string()),
            Self::Decimal(d) => Some(d.normalize().to_string()),
            Self::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            Self::DateTime(dt) => Some(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Time(t) => Some(format_time(t)),
            _ => None,
        }
    }

    /// Get the type name for this value
    pub fn type_name(&self) -> &str {
        match self {
            Self::Boolean(_) => "Boolean",
            Self::Integer(_) => "Integer",
            Self::Decimal(_) => "Decimal",
            Self::String(_) => "String",
            Self::Date(_) => "Date",
            Self::DateTime(_) => "DateTime",
            Self::Time(_) => "Time",
            Self::Resource(resource) => resource
                .get("resourceType")
                .and_then(Value::as_str)
                .unwrap_or("Object"),
            Self::Guarded(guarded) => guarded.resource_type().unwrap_or("Object"),
            Self::Collection(_) => "Collection",
            Self::Empty => "Empty",
        }
    }

    /// Get the TypeInfo for this value
    pub fn to_type_info(&self) -> TypeInfo {
        match self {
            Self::Boolean(_) => TypeInfo::Boolean,
            Self::Integer(_) => TypeInfo::Integer,
            Self::Decimal(_) => TypeInfo::Decimal,
            Self::String(_) => TypeInfo::String,
            Self::Date(_) => TypeInfo::Date,
            Self::DateTime(_) => TypeInfo::DateTime,
            Self::Time(_) => TypeInfo::Time,
            Self::Resource(_) | Self::Guarded(_) => TypeInfo::Resource(self.type_name().to_string()),
            Self::Collection(_) | Self::Empty => TypeInfo::Any,
        }
    }

    /// Try to convert to an integer
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to convert to a decimal, widening integers
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Decimal(d) => Some(*d),
            Self::Integer(i) => Some(Decimal::from(*i)),
            _ => None,
        }
    }

    /// Try to convert to a string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to convert to a boolean
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

fn format_time(time: &NaiveTime) -> String {
    if time.format("%.f").to_string().is_empty() {
        time.format("%H:%M:%S").to_string()
    } else {
        time.format("%H:%M:%S%.3f").to_string()
    }
}

fn decimal_to_json(d: &Decimal) -> Value {
    if d.fract().is_zero() {
        if let Some(i) = d.to_i64() {
            return Value::Number(i.into());
        }
    }
    d.to_f64()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(d.to_string()))
}

impl From<bool> for FhirPathValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for FhirPathValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for FhirPathValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for FhirPathValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Value> for FhirPathValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(_) => Self::Resource(Arc::new(value)),
            other => Self::from_json(&other),
        }
    }
}

/// Display renders the text form used in string interpolation
impl fmt::Display for FhirPathValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_string_value() {
            Some(text) => f.write_str(&text),
            None => match self {
                Self::Empty => Ok(()),
                other => write!(f, "{}", other.to_json()),
            },
        }
    }
}

impl fmt::Debug for FhirPathValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "String({s})"),
            Self::Boolean(b) => write!(f, "Boolean({b})"),
            Self::Integer(i) => write!(f, "Integer({i})"),
            Self::Decimal(d) => write!(f, "Decimal({d})"),
            Self::Date(d) => write!(f, "Date({})", d.format("%Y-%m-%d")),
            Self::DateTime(dt) => write!(f, "DateTime({})", dt.to_rfc3339()),
            Self::Time(t) => write!(f, "Time({})", format_time(t)),
            Self::Resource(resource) => write!(f, "Resource({resource})"),
            Self::Guarded(guarded) => write!(f, "Guarded({})", guarded.visible_json()),
            Self::Collection(items) => write!(f, "Collection({items:?})"),
            Self::Empty => write!(f, "Empty"),
        }
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}
