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

//! Template paths used in diagnostics

use smallvec::SmallVec;
use std::fmt;

/// Synthetic key the template is wrapped under before walking
pub const ROOT_MARKER: &str = "__rootNode__";

/// One step from a parent node to a child
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Mapping key
    Key(String),
    /// Sequence position
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Waypoints from the template root to the current node
///
/// Rendered dot-joined with the synthetic root marker left out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath(SmallVec<[PathSegment; 8]>);

impl NodePath {
    /// The empty path
    pub fn new() -> Self {
        Self::default()
    }

    /// Path of the synthetic root wrapper
    pub fn root() -> Self {
        Self::new().key(ROOT_MARKER)
    }

    /// Extend with a mapping key
    pub fn key(&self, key: impl Into<String>) -> Self {
        self.child(PathSegment::Key(key.into()))
    }

    /// Extend with a sequence position
    pub fn index(&self, index: usize) -> Self {
        self.child(PathSegment::Index(index))
    }

    fn child(&self, segment: PathSegment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }

    /// Segments including the root marker
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Segments a user would recognize
    pub fn visible_segments(&self) -> impl Iterator<Item = &PathSegment> {
        self.0
            .iter()
            .filter(|segment| !matches!(segment, PathSegment::Key(key) if key == ROOT_MARKER))
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, segment) in self.visible_segments().enumerate() {
            if position > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_marker_is_hidden() {
        let path = NodePath::root().key("entry").index(2).key("resource");
        assert_eq!(path.to_string(), "entry.2.resource");
        assert_eq!(path.segments().len(), 4);
        assert_eq!(NodePath::root().to_string(), "");
    }
}
