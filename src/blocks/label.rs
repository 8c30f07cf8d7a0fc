//! Label wrapper shared by input blocks
//!
//! Input blocks render their widget inside a `Label` node that carries the
//! block id, the title, and the externally derived required / validation /
//! loading state.

use serde_json::{Map, Value};

use crate::core::block::BlockProps;
use crate::core::node::RenderNode;
use crate::core::Properties;

pub const LABEL_WIDGET: &str = "Label";

/// Label options of an input block
///
/// `title` and `size` come from the block's top-level properties; entries of
/// the `label` object override them.
pub fn label_options(properties: &Properties) -> Map<String, Value> {
    let mut options = Map::new();
    for key in ["title", "size"] {
        if let Some(value) = properties.get(key) {
            options.insert(key.to_string(), value.clone());
        }
    }
    if let Some(label) = properties.get_object("label") {
        for (key, value) in label {
            if !value.is_null() {
                options.insert(key.clone(), value.clone());
            }
        }
    }
    options
}

/// Wrap `input` in a label node identified by the block id
pub fn render_label(props: &BlockProps<'_>, options: Map<String, Value>, input: RenderNode) -> RenderNode {
    let validation = props.validation;
    let mut node = RenderNode::new(LABEL_WIDGET).with_id(props.block_id.as_str());
    for (key, value) in options {
        node = node.with_prop(key, value);
    }
    if !validation.errors.is_empty() {
        node = node.with_prop("errors", validation.errors.clone());
    }
    if !validation.warnings.is_empty() {
        node = node.with_prop("warnings", validation.warnings.clone());
    }
    node.with_prop("required", props.required)
        .with_prop("loading", props.loading)
        .with_opt_prop("validationStatus", validation.status.clone())
        .with_child(input)
}
