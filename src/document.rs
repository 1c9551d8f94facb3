//! Document tree model
//!
//! Mod configuration files are trees of mappings, sequences and scalar leaves.
//! Everything else in the crate (diffing, scheduling, persistence) is expressed
//! over [`DocumentNode`] and addresses individual leaves with a [`NodePath`].
//!
//! Mapping keys keep their insertion order so that a result file written back to
//! disk lists keys in the same order as the source it was derived from.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value};
use std::fmt;

/// A leaf value.
///
/// Only [`Scalar::Text`] is ever sent for translation; numbers, booleans and
/// null pass through untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Number(Number),
    Bool(bool),
    Null,
}

impl Scalar {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Text that is worth a translation request: non-empty after trimming.
    pub fn is_translatable(&self) -> bool {
        matches!(self, Scalar::Text(text) if !text.trim().is_empty())
    }
}

/// A node in a document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentNode {
    Scalar(Scalar),
    Mapping(IndexMap<String, DocumentNode>),
    Sequence(Vec<DocumentNode>),
}

/// The structural kind of a node, used for shape comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Scalar,
    Mapping,
    Sequence,
}

impl DocumentNode {
    pub fn text(text: impl Into<String>) -> Self {
        DocumentNode::Scalar(Scalar::Text(text.into()))
    }

    pub fn empty_mapping() -> Self {
        DocumentNode::Mapping(IndexMap::new())
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            DocumentNode::Scalar(_) => NodeKind::Scalar,
            DocumentNode::Mapping(_) => NodeKind::Mapping,
            DocumentNode::Sequence(_) => NodeKind::Sequence,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            DocumentNode::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        self.as_scalar().and_then(Scalar::as_text)
    }

    /// Returns the node reachable at `path`, if every segment exists.
    pub fn get(&self, path: &NodePath) -> Option<&DocumentNode> {
        let mut node = self;
        for segment in path.segments() {
            node = match (node, segment) {
                (DocumentNode::Mapping(map), PathSegment::Key(key)) => map.get(key)?,
                (DocumentNode::Sequence(items), PathSegment::Index(index)) => items.get(*index)?,
                _ => return None,
            };
        }
        Some(node)
    }

    pub fn get_mut(&mut self, path: &NodePath) -> Option<&mut DocumentNode> {
        let mut node = self;
        for segment in path.segments() {
            node = match (node, segment) {
                (DocumentNode::Mapping(map), PathSegment::Key(key)) => map.get_mut(key)?,
                (DocumentNode::Sequence(items), PathSegment::Index(index)) => {
                    items.get_mut(*index)?
                }
                _ => return None,
            };
        }
        Some(node)
    }

    /// Replaces the node at `path`. Returns `false` when the path does not exist;
    /// the tree is never grown here.
    pub fn set(&mut self, path: &NodePath, value: DocumentNode) -> bool {
        match self.get_mut(path) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Visits every node depth-first, parents before children, mapping keys in
    /// insertion order and sequence elements by index.
    pub fn walk<F>(&self, visitor: &mut F)
    where
        F: FnMut(&NodePath, &DocumentNode),
    {
        let mut path = NodePath::root();
        self.walk_at(&mut path, visitor);
    }

    fn walk_at<F>(&self, path: &mut NodePath, visitor: &mut F)
    where
        F: FnMut(&NodePath, &DocumentNode),
    {
        visitor(path, self);
        match self {
            DocumentNode::Scalar(_) => {}
            DocumentNode::Mapping(map) => {
                for (key, child) in map {
                    path.push(PathSegment::Key(key.clone()));
                    child.walk_at(path, visitor);
                    path.pop();
                }
            }
            DocumentNode::Sequence(items) => {
                for (index, child) in items.iter().enumerate() {
                    path.push(PathSegment::Index(index));
                    child.walk_at(path, visitor);
                    path.pop();
                }
            }
        }
    }

    /// All scalar leaves with their paths, in walk order.
    pub fn leaves(&self) -> Vec<(NodePath, &Scalar)> {
        let mut leaves = Vec::new();
        collect_leaves(self, &mut NodePath::root(), &mut leaves);
        leaves
    }

    /// Serializes the tree as pretty JSON (two-space indent, non-ASCII kept as is).
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn collect_leaves<'a>(
    node: &'a DocumentNode,
    path: &mut NodePath,
    out: &mut Vec<(NodePath, &'a Scalar)>,
) {
    match node {
        DocumentNode::Scalar(scalar) => out.push((path.clone(), scalar)),
        DocumentNode::Mapping(map) => {
            for (key, child) in map {
                path.push(PathSegment::Key(key.clone()));
                collect_leaves(child, path, out);
                path.pop();
            }
        }
        DocumentNode::Sequence(items) => {
            for (index, child) in items.iter().enumerate() {
                path.push(PathSegment::Index(index));
                collect_leaves(child, path, out);
                path.pop();
            }
        }
    }
}

impl From<Value> for DocumentNode {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => DocumentNode::Scalar(Scalar::Null),
            Value::Bool(b) => DocumentNode::Scalar(Scalar::Bool(b)),
            Value::Number(n) => DocumentNode::Scalar(Scalar::Number(n)),
            Value::String(s) => DocumentNode::Scalar(Scalar::Text(s)),
            Value::Array(items) => {
                DocumentNode::Sequence(items.into_iter().map(DocumentNode::from).collect())
            }
            Value::Object(map) => DocumentNode::Mapping(
                map.into_iter()
                    .map(|(key, value)| (key, DocumentNode::from(value)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for DocumentNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DocumentNode::Scalar(Scalar::Text(text)) => serializer.serialize_str(text),
            DocumentNode::Scalar(Scalar::Number(number)) => number.serialize(serializer),
            DocumentNode::Scalar(Scalar::Bool(b)) => serializer.serialize_bool(*b),
            DocumentNode::Scalar(Scalar::Null) => serializer.serialize_unit(),
            DocumentNode::Mapping(map) => map.serialize(serializer),
            DocumentNode::Sequence(items) => items.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for DocumentNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(DocumentNode::from)
    }
}

/// One step from a container to a child.
///
/// Serialized bare: keys as strings, indices as numbers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Location of a node inside a tree, from the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodePath(Vec<PathSegment>);

impl NodePath {
    pub fn root() -> Self {
        NodePath(Vec::new())
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn push(&mut self, segment: PathSegment) {
        self.0.push(segment);
    }

    pub fn pop(&mut self) -> Option<PathSegment> {
        self.0.pop()
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.0.push(PathSegment::Key(key.into()));
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.0.push(PathSegment::Index(index));
        self
    }
}

impl fmt::Display for NodePath {
    /// Renders as `menu.items[2]`; keys that would be ambiguous are quoted
    /// (`["a.b"]`), the root is `$`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "$");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
                PathSegment::Key(key) if key.is_empty() || key.contains(['.', '[', ']']) => {
                    write!(f, "[{:?}]", key)?
                }
                PathSegment::Key(key) => {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "{}", key)?
                }
            }
        }
        Ok(())
    }
}

/// Which side of a [`merge`] wins for a leaf present in both trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeSide {
    Base,
    Overlay,
}

/// Merges two trees path by path.
///
/// Containers present on only one side are taken from that side. Where both
/// sides hold a scalar, `policy` decides. Where the shapes disagree the base
/// shape wins, so merging never changes the structure of `base` at a path
/// `base` already defines.
pub fn merge<F>(base: &DocumentNode, overlay: &DocumentNode, policy: &mut F) -> DocumentNode
where
    F: FnMut(&NodePath, &Scalar, &Scalar) -> MergeSide,
{
    merge_at(base, overlay, &mut NodePath::root(), policy)
}

fn merge_at<F>(
    base: &DocumentNode,
    overlay: &DocumentNode,
    path: &mut NodePath,
    policy: &mut F,
) -> DocumentNode
where
    F: FnMut(&NodePath, &Scalar, &Scalar) -> MergeSide,
{
    match (base, overlay) {
        (DocumentNode::Scalar(left), DocumentNode::Scalar(right)) => {
            match policy(path, left, right) {
                MergeSide::Base => base.clone(),
                MergeSide::Overlay => overlay.clone(),
            }
        }
        (DocumentNode::Mapping(left), DocumentNode::Mapping(right)) => {
            let mut merged = IndexMap::with_capacity(left.len());
            for (key, child) in left {
                let value = match right.get(key) {
                    Some(other) => {
                        path.push(PathSegment::Key(key.clone()));
                        let value = merge_at(child, other, path, policy);
                        path.pop();
                        value
                    }
                    None => child.clone(),
                };
                merged.insert(key.clone(), value);
            }
            for (key, child) in right {
                if !merged.contains_key(key) {
                    merged.insert(key.clone(), child.clone());
                }
            }
            DocumentNode::Mapping(merged)
        }
        (DocumentNode::Sequence(left), DocumentNode::Sequence(right)) => {
            let len = left.len().max(right.len());
            let mut merged = Vec::with_capacity(len);
            for index in 0..len {
                let value = match (left.get(index), right.get(index)) {
                    (Some(l), Some(r)) => {
                        path.push(PathSegment::Index(index));
                        let value = merge_at(l, r, path, policy);
                        path.pop();
                        value
                    }
                    (Some(only), None) | (None, Some(only)) => only.clone(),
                    (None, None) => break,
                };
                merged.push(value);
            }
            DocumentNode::Sequence(merged)
        }
        _ => base.clone(),
    }
}
