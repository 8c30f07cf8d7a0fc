//! Box: a plain container around its nested content

use crate::core::block::{Block, BlockProps};
use crate::core::node::{Content, RenderNode};
use crate::core::BlockId;

use super::BlockType;

pub const BOX_WIDGET: &str = "Box";

/// Render a box node; shared with blocks that wrap their content in a box
pub fn render_box(block_id: &BlockId, class_name: String, children: Vec<RenderNode>) -> RenderNode {
    RenderNode::new(BOX_WIDGET)
        .with_id(block_id.as_str())
        .with_prop("className", class_name)
        .with_children(children)
}

/// Container block
///
/// Properties:
/// - `style`: style object turned into the box's class name
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerBlock;

impl Block for ContainerBlock {
    fn block_type(&self) -> BlockType {
        BlockType::Box
    }

    fn render(&self, props: &BlockProps<'_>, content: &Content<'_>) -> RenderNode {
        render_box(props.block_id, props.css_class("style"), content.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::block::Validation;
    use crate::core::surface::HashedCssClasses;
    use crate::core::Properties;
    use serde_json::{json, Value};

    #[test]
    fn test_renders_content_inside_box() {
        let id = BlockId::from("box");
        let properties = Properties::new().with("style", json!({ "padding": 8 }));
        let css = HashedCssClasses::default();
        let validation = Validation::default();
        let props = BlockProps {
            block_id: &id,
            properties: &properties,
            value: &Value::Null,
            required: false,
            validation: &validation,
            loading: false,
            css: &css,
        };
        let produce = || vec![RenderNode::new("Text").with_id("a"), RenderNode::new("Text").with_id("b")];

        let node = ContainerBlock.render(&props, &Content::new(&produce));
        assert_eq!(node.widget, BOX_WIDGET);
        assert_eq!(node.id.as_deref(), Some("box"));
        assert_eq!(node.children.len(), 2);
        assert!(node.prop("className").unwrap().as_str().unwrap().starts_with("lf-"));

        let empty = ContainerBlock.render(&props, &Content::empty());
        assert!(empty.children.is_empty());
    }
}
