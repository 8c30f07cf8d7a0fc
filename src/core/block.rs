//! Block trait and related types
//!
//! This module defines the Block trait every block type implements, the
//! declarative descriptor a block instance is created from, the native
//! interactions a presentation widget reports back, and block-level errors.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::event::ActionSpec;
use super::node::{Content, RenderNode};
use super::surface::{CssClassGenerator, ModalId};
use super::{BlockId, Properties};
use crate::blocks::BlockType;
use crate::runtime::methods::BlockMethods;

/// Core block trait that all blocks must implement
///
/// `render` is a pure function of the block's props and prepared content.
/// Everything imperative (value mutation, event emission, method
/// registration, deferred effects) goes through the [`BlockMethods`] façade
/// handed to the lifecycle and interaction hooks.
pub trait Block: Send + Sync {
    /// The block's type
    fn block_type(&self) -> BlockType;

    /// How the descriptor's `blocks` are used
    fn content_kind(&self) -> ContentKind {
        ContentKind::Children
    }

    /// Render the block to a node
    fn render(&self, props: &BlockProps<'_>, content: &Content<'_>) -> RenderNode;

    /// Lifecycle hook: called once after the block is mounted
    fn on_mount(&self, _methods: &BlockMethods) -> Result<(), BlockError> {
        Ok(())
    }

    /// Handle a native interaction reported by the block's widget
    fn on_interaction(
        &self,
        _interaction: Interaction,
        _methods: &BlockMethods,
    ) -> Result<(), BlockError> {
        Ok(())
    }

    /// Lifecycle hook: called before the block is removed from the tree
    fn on_unmount(&self, _methods: &BlockMethods) {}
}

/// How a block's child descriptors are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Children are mounted once and rendered as nested content
    Children,
    /// Children are a template rendered once per item of the block's value
    ItemTemplate,
}

/// Declarative description of one block in the tree
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDescriptor {
    pub block_id: BlockId,
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub properties: Properties,
    /// Event name → action pipeline
    #[serde(default)]
    pub events: HashMap<String, Vec<ActionSpec>>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub validation: Validation,
    #[serde(default)]
    pub loading: bool,
    /// Initial value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<BlockDescriptor>,
}

impl BlockDescriptor {
    pub fn new(block_id: impl Into<BlockId>, block_type: impl Into<String>) -> Self {
        Self {
            block_id: block_id.into(),
            block_type: block_type.into(),
            properties: Properties::new(),
            events: HashMap::new(),
            required: false,
            validation: Validation::default(),
            loading: false,
            value: None,
            blocks: Vec::new(),
        }
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_event(mut self, name: impl Into<String>, actions: Vec<ActionSpec>) -> Self {
        self.events.insert(name.into(), actions);
        self
    }

    pub fn with_block(mut self, child: BlockDescriptor) -> Self {
        self.blocks.push(child);
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Parse a descriptor tree from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Visit this descriptor and every nested descriptor
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a BlockDescriptor)) {
        f(self);
        for child in &self.blocks {
            child.walk(f);
        }
    }
}

/// Validation state derived externally and shown by input blocks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Validation {
    /// Presentation status, e.g. "error" or "warning"
    pub status: Option<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Everything a block renders from
pub struct BlockProps<'a> {
    pub block_id: &'a BlockId,
    pub properties: &'a Properties,
    pub value: &'a Value,
    pub required: bool,
    pub validation: &'a Validation,
    pub loading: bool,
    pub css: &'a dyn CssClassGenerator,
}

impl BlockProps<'_> {
    /// Class name for a style entry of the block's properties
    pub fn css_class(&self, key: &str) -> String {
        self.css
            .make_css_class(self.properties.get(key).unwrap_or(&Value::Null))
    }
}

/// Text selection offsets inside an input widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// A collapsed caret
    pub fn caret(at: usize) -> Self {
        Self { start: at, end: at }
    }
}

/// Native interaction reported by a presentation widget
#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    /// The widget's value changed; `selection` is the caret/selection at the time
    Change {
        value: Value,
        selection: Option<Selection>,
    },
    /// Enter pressed inside the widget
    PressEnter,
    /// A modal shown by the block was confirmed
    ModalOk { modal: ModalId },
    /// A modal shown by the block was dismissed
    ModalCancel { modal: ModalId },
}

impl Interaction {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Interaction::Change { .. } => "change",
            Interaction::PressEnter => "pressEnter",
            Interaction::ModalOk { .. } => "modalOk",
            Interaction::ModalCancel { .. } => "modalCancel",
        }
    }
}

/// Block errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BlockError {
    /// List mutation with an invalid position
    #[error("Index {index} out of range for list of length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    /// Method arguments did not match the method's shape
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Block properties could not be decoded
    #[error("Invalid properties: {0}")]
    InvalidProperties(String),

    /// A façade outlived the block instance it was issued for
    #[error("Block instance is no longer mounted: {0}")]
    StaleInstance(BlockId),

    /// List operation requested on a block without list state
    #[error("Block has no list state: {0}")]
    NotAList(BlockId),

    /// The runtime that issued a façade has been dropped
    #[error("Runtime has been dropped")]
    RuntimeDropped,

    /// Method registration rejected by the registry
    #[error("Registration failed: {0}")]
    Registration(String),
}

impl From<serde_json::Error> for BlockError {
    fn from(error: serde_json::Error) -> Self {
        BlockError::InvalidProperties(error.to_string())
    }
}
