//! Rendered Nodes
//!
//! A [`Node`] is one rendered component instance: a type tag, an optional
//! stable key, an ordered attribute map, and ordered children. Node
//! identity for diffing purposes is (tag, key); `node_id` is transport
//! addressing only and is excluded from equality.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// An attribute value: anything externally comparable and serializable.
///
/// The engine never interprets attribute values; it only compares them for
/// the differ and ships them over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Absent / null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Ordered list.
    List(Vec<AttrValue>),
    /// Ordered string-keyed map.
    Map(IndexMap<String, AttrValue>),
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

/// One rendered component instance in the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Component type tag.
    pub tag: String,

    /// Explicit stable key, if the author declared one.
    pub key: Option<String>,

    /// Identity of the owning computation, used by the remote renderer to
    /// address interaction events. Not part of structural equality.
    pub node_id: u64,

    /// Attribute mapping, in declaration order.
    pub attrs: IndexMap<String, AttrValue>,

    /// Ordered children.
    pub children: Vec<Node>,
}

impl Node {
    /// Create a node with the given tag and no key, attributes or children.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            key: None,
            node_id: 0,
            attrs: IndexMap::new(),
            children: Vec::new(),
        }
    }

    /// Builder: set the stable key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Builder: set an attribute.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Builder: append a child.
    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// A text node: tag `text` with a `value` attribute.
    pub fn text(value: impl Into<String>) -> Self {
        Self::new("text").with_attr("value", value.into())
    }

    /// Whether `other` has the same identity (tag and key).
    ///
    /// Matching identity means the node survives a re-render and the differ
    /// recurses; differing identity means remove + insert.
    pub fn identity_matches(&self, other: &Node) -> bool {
        self.tag == other.tag && self.key == other.key
    }
}

/// Structural equality: tag, key, attributes, children order. `node_id` is
/// deliberately ignored so a replayed patch compares equal to a rendered
/// tree.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag
            && self.key == other.key
            && self.attrs == other.attrs
            && self.children == other.children
    }
}
