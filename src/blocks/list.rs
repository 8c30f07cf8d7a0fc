//! List: renders its item template once per entry of its value
//!
//! At mount the block publishes the engine-provided list mutations
//! (`pushItem`, `unshiftItem`, `removeItem`, `moveItemDown`, `moveItemUp`)
//! under their own names, so other blocks and action pipelines can drive the
//! list through the method registry.

use tracing::debug;

use crate::core::block::{Block, BlockError, BlockProps, ContentKind};
use crate::core::node::{Content, RenderNode};
use crate::runtime::BlockMethods;

use super::container::render_box;
use super::BlockType;

/// List block
///
/// Properties:
/// - `style`: style object of the surrounding box
#[derive(Debug, Clone, Copy, Default)]
pub struct ListBlock;

impl Block for ListBlock {
    fn block_type(&self) -> BlockType {
        BlockType::List
    }

    fn content_kind(&self) -> ContentKind {
        ContentKind::ItemTemplate
    }

    fn render(&self, props: &BlockProps<'_>, content: &Content<'_>) -> RenderNode {
        render_box(props.block_id, props.css_class("style"), content.render())
    }

    fn on_mount(&self, methods: &BlockMethods) -> Result<(), BlockError> {
        for (name, method) in methods.list_methods()? {
            methods.register_method(name, method)?;
        }
        debug!(block_id = %methods.block_id(), "list methods registered");
        Ok(())
    }
}
