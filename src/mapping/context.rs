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

//! Variable bindings visible to template expressions

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use std::sync::Arc;

use super::node::Node;
use crate::evaluator::VariableMap;
use crate::model::{Collection, FhirPathValue};

/// Name of the implicit binding to the root resource
pub const ROOT_BINDING: &str = "context";

#[derive(Debug)]
struct Binding {
    node: Node,
    collection: OnceCell<Collection>,
}

impl Binding {
    fn from_node(node: Node) -> Arc<Self> {
        Arc::new(Self {
            node,
            collection: OnceCell::new(),
        })
    }

    fn from_value(value: FhirPathValue) -> Arc<Self> {
        Arc::new(Self {
            node: Node::from_value(&value),
            collection: OnceCell::with_value(Collection::single(value)),
        })
    }

    fn collection(&self) -> &Collection {
        self.collection.get_or_init(|| self.node.to_collection())
    }
}

/// Immutable name to value mapping threaded through resolution
///
/// Extending returns a new context and leaves the original untouched, so a
/// binding made while resolving one subtree is never seen by its siblings.
/// Cloning is cheap. The evaluator view of each binding is computed once and
/// shared by every context that inherits it.
#[derive(Debug, Clone, Default)]
pub struct BindingContext {
    bindings: Arc<IndexMap<String, Arc<Binding>>>,
}

impl BindingContext {
    /// An empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// The initial context of a resolution call
    ///
    /// `context` is bound to `resource` unless the caller supplies it.
    pub fn with_root(resource: &Node, caller: &IndexMap<String, Node>) -> Self {
        let mut bindings = IndexMap::with_capacity(caller.len() + 1);
        bindings.insert(ROOT_BINDING.to_string(), Binding::from_node(resource.clone()));
        for (name, node) in caller {
            bindings.insert(name.clone(), Binding::from_node(node.clone()));
        }
        Self {
            bindings: Arc::new(bindings),
        }
    }

    /// Look up a binding
    pub fn get(&self, name: &str) -> Option<&Node> {
        self.bindings.get(name).map(|binding| &binding.node)
    }

    /// Check whether `name` is bound
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Number of bindings
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Check if nothing is bound
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Bound names in binding order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    /// A copy of this context with `name` bound to a resolved node
    pub fn extend(&self, name: impl Into<String>, node: Node) -> Self {
        self.extended(name.into(), Binding::from_node(node))
    }

    /// A copy of this context with `name` bound to an evaluator answer
    ///
    /// The answer is kept as is, so typed values such as dates survive the
    /// round trip into later expressions.
    pub fn extend_value(&self, name: impl Into<String>, value: FhirPathValue) -> Self {
        self.extended(name.into(), Binding::from_value(value))
    }

    fn extended(&self, name: String, binding: Arc<Binding>) -> Self {
        let mut bindings = self.bindings.as_ref().clone();
        bindings.insert(name, binding);
        Self {
            bindings: Arc::new(bindings),
        }
    }

    /// A fresh variable map for one evaluator call
    ///
    /// The evaluator owns the returned map, so nothing it does to it can leak
    /// into this context or into another call.
    pub fn to_variables(&self) -> VariableMap {
        self.bindings
            .iter()
            .map(|(name, binding)| (name.clone(), binding.collection().clone()))
            .collect()
    }
}

impl FromIterator<(String, Node)> for BindingContext {
    fn from_iter<I: IntoIterator<Item = (String, Node)>>(iter: I) -> Self {
        Self {
            bindings: Arc::new(
                iter.into_iter()
                    .map(|(name, node)| (name, Binding::from_node(node)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_root_binding_and_caller_override() {
        let resource = Node::from(json!({"id": "r"}));
        let mut caller = IndexMap::new();
        caller.insert("Resource".to_string(), Node::from(json!(1)));
        let context = BindingContext::with_root(&resource, &caller);
        assert_eq!(context.get("context"), Some(&resource));
        assert_eq!(context.names().collect::<Vec<_>>(), vec!["context", "Resource"]);

        caller.insert("context".to_string(), Node::Null);
        let context = BindingContext::with_root(&resource, &caller);
        assert_eq!(context.get("context"), Some(&Node::Null));
    }

    #[test]
    fn test_extend_does_not_touch_parent() {
        let parent: BindingContext = [("a".to_string(), Node::from(json!(1)))]
            .into_iter()
            .collect();
        let child = parent.extend("a", Node::from(json!(2))).extend("b", Node::Null);

        assert_eq!(parent.get("a"), Some(&Node::from(json!(1))));
        assert!(!parent.contains("b"));
        assert_eq!(child.get("a"), Some(&Node::from(json!(2))));
        assert_eq!(child.len(), 2);
    }

    #[test]
    fn test_variables_are_fresh_copies() {
        let context = BindingContext::new().extend_value("n", FhirPathValue::Integer(3));
        let mut first = context.to_variables();
        first.insert("n".to_string(), Collection::new());
        let second = context.to_variables();
        assert_eq!(second["n"], Collection::single(FhirPathValue::Integer(3)));
        assert_eq!(context.get("n"), Some(&Node::from(json!(3))));
    }
}
