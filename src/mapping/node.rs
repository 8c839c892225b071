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

//! Tri-state template values

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value};
use std::sync::Arc;

use crate::model::{Collection, FhirPathValue};

/// A value flowing through template resolution
///
/// `Absent` marks something that must disappear from its parent container,
/// `Null` is an explicit null that is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Node {
    /// Omitted from the parent
    #[default]
    Absent,
    /// Retained `null`
    Null,
    /// Boolean scalar
    Bool(bool),
    /// Numeric scalar
    Number(Number),
    /// String scalar
    String(String),
    /// Ordered list
    Sequence(Vec<Node>),
    /// Keyed object
    Mapping(IndexMap<String, Node>),
}

impl Node {
    /// Convert from JSON
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Bool(*b),
            Value::Number(n) => Node::Number(n.clone()),
            Value::String(s) => Node::String(s.clone()),
            Value::Array(items) => Node::Sequence(items.iter().map(Node::from_json).collect()),
            Value::Object(object) => Node::Mapping(
                object
                    .iter()
                    .map(|(key, value)| (key.clone(), Node::from_json(value)))
                    .collect(),
            ),
        }
    }

    /// Convert to JSON, `Absent` renders as `null`
    pub fn to_json(&self) -> Value {
        match self {
            Node::Absent | Node::Null => Value::Null,
            Node::Bool(b) => Value::Bool(*b),
            Node::Number(n) => Value::Number(n.clone()),
            Node::String(s) => Value::String(s.clone()),
            Node::Sequence(items) => Value::Array(items.iter().map(Node::to_json).collect()),
            Node::Mapping(entries) => Value::Object(
                entries
                    .iter()
                    .filter(|(_, value)| !value.is_absent())
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }

    /// Convert one evaluator answer
    ///
    /// Structured answers are pruned at every depth, so empty containers
    /// inside resource data never reach the output.
    pub fn from_value(value: &FhirPathValue) -> Self {
        match value {
            FhirPathValue::Empty => Node::Absent,
            FhirPathValue::Collection(items) => Node::from_collection(items),
            other => Node::from_json(&other.to_json()).pruned(),
        }
    }

    /// Convert a full evaluator result into a sequence
    pub fn from_collection(collection: &Collection) -> Self {
        Node::Sequence(collection.iter().map(Node::from_value).collect())
    }

    /// The evaluator view of this node
    ///
    /// Absent and null are the empty collection and sequences contribute
    /// their items.
    pub fn to_collection(&self) -> Collection {
        match self {
            Node::Absent | Node::Null => Collection::new(),
            Node::Sequence(items) => items.iter().flat_map(Node::to_collection).collect(),
            Node::Mapping(_) => {
                Collection::single(FhirPathValue::Resource(Arc::new(self.to_json())))
            }
            scalar => Collection::single(FhirPathValue::from_json(&scalar.to_json())),
        }
    }

    /// Check for `Absent`
    pub fn is_absent(&self) -> bool {
        matches!(self, Node::Absent)
    }

    /// Check for `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }

    /// Check for a mapping
    pub fn is_mapping(&self) -> bool {
        matches!(self, Node::Mapping(_))
    }

    /// Short kind name for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Absent => "absent",
            Node::Null => "null",
            Node::Bool(_) => "boolean",
            Node::Number(_) => "number",
            Node::String(_) => "string",
            Node::Sequence(_) => "array",
            Node::Mapping(_) => "object",
        }
    }

    /// Apply the emptiness rules one level deep
    ///
    /// Nested sequences are spliced into their parent, absent entries and
    /// keys are dropped, and a container left empty becomes `Absent`.
    pub fn normalized(self) -> Node {
        match self {
            Node::Sequence(items) => {
                let mut flat = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Node::Absent => {}
                        Node::Sequence(inner) => {
                            flat.extend(inner.into_iter().filter(|node| !node.is_absent()))
                        }
                        other => flat.push(other),
                    }
                }
                if flat.is_empty() {
                    Node::Absent
                } else {
                    Node::Sequence(flat)
                }
            }
            Node::Mapping(mut entries) => {
                entries.retain(|_, value| !value.is_absent());
                if entries.is_empty() {
                    Node::Absent
                } else {
                    Node::Mapping(entries)
                }
            }
            other => other,
        }
    }

    /// Apply the emptiness rules at every depth, innermost first
    pub fn pruned(self) -> Node {
        match self {
            Node::Sequence(items) => {
                Node::Sequence(items.into_iter().map(Node::pruned).collect()).normalized()
            }
            Node::Mapping(entries) => Node::Mapping(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, value.pruned()))
                    .collect(),
            )
            .normalized(),
            other => other,
        }
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Node::from_json(&value)
    }
}

impl From<&Value> for Node {
    fn from(value: &Value) -> Self {
        Node::from_json(value)
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        node.to_json()
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Node::from)
    }
}
