//! Render tree handed to the presentation layer
//!
//! Blocks render to [`RenderNode`]s: a widget name, an optional stable id, a
//! bag of rendering props and child nodes. Nested content is passed to a block
//! as a [`Content`] producer so the block never sees child descriptors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A renderable node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderNode {
    /// Widget name understood by the presentation layer (e.g. "TextArea")
    pub widget: String,
    /// Stable id so external tooling and tests can target the widget
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Rendering configuration
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub props: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RenderNode>,
}

impl RenderNode {
    pub fn new(widget: impl Into<String>) -> Self {
        Self {
            widget: widget.into(),
            id: None,
            props: Map::new(),
            children: Vec::new(),
        }
    }

    /// Set the widget id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set a prop; `null` values are skipped so absent options stay absent
    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        if !value.is_null() {
            self.props.insert(key.into(), value);
        }
        self
    }

    /// Set an optional prop
    pub fn with_opt_prop<T: Into<Value>>(self, key: impl Into<String>, value: Option<T>) -> Self {
        match value {
            Some(v) => self.with_prop(key, v),
            None => self,
        }
    }

    pub fn with_children(mut self, children: Vec<RenderNode>) -> Self {
        self.children = children;
        self
    }

    pub fn with_child(mut self, child: RenderNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn prop(&self, key: &str) -> Option<&Value> {
        self.props.get(key)
    }

    /// Depth-first search for a node by id
    pub fn find(&self, id: &str) -> Option<&RenderNode> {
        if self.id.as_deref() == Some(id) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Visit every node depth-first, parents before children
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a RenderNode)) {
        f(self);
        for child in &self.children {
            child.walk(f);
        }
    }
}

/// Lazy, restartable producer of a block's nested content
///
/// The runtime prepares one producer per render; invoking it renders each
/// child through its own already-prepared render function. It may be invoked
/// any number of times, or not at all.
pub struct Content<'a> {
    producer: Option<&'a dyn Fn() -> Vec<RenderNode>>,
}

impl<'a> Content<'a> {
    pub fn new(producer: &'a dyn Fn() -> Vec<RenderNode>) -> Self {
        Self {
            producer: Some(producer),
        }
    }

    /// Content for blocks without children
    pub fn empty() -> Self {
        Self { producer: None }
    }

    pub fn is_empty(&self) -> bool {
        self.producer.is_none()
    }

    /// Render the nested content
    pub fn render(&self) -> Vec<RenderNode> {
        match self.producer {
            Some(produce) => produce(),
            None => Vec::new(),
        }
    }
}

/// One committed render of the whole tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Monotonic render counter
    pub generation: u64,
    pub roots: Vec<RenderNode>,
}

impl Frame {
    pub fn find(&self, id: &str) -> Option<&RenderNode> {
        self.roots.iter().find_map(|root| root.find(id))
    }
}
