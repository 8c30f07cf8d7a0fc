//! TextArea: labelled multi-line text input
//!
//! The input is controlled: every change writes the block value and the next
//! render recreates the widget with it, which resets the caret. The change
//! handler therefore records the selection reported with the change and
//! reapplies it after the next commit through a deferred effect.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{trace, warn};

use crate::core::block::{Block, BlockError, BlockProps, Interaction};
use crate::core::event::Event;
use crate::core::node::{Content, RenderNode};
use crate::core::BlockId;
use crate::runtime::BlockMethods;

use super::label::{label_options, render_label};
use super::BlockType;

pub const TEXT_AREA_WIDGET: &str = "TextArea";
pub const ON_CHANGE: &str = "onChange";
pub const ON_PRESS_ENTER: &str = "onPressEnter";
const SELECTION_SLOT: &str = "selection";
const DEFAULT_MIN_ROWS: u64 = 3;

/// Id of the input widget inside the label
pub fn input_id(block_id: &BlockId) -> String {
    block_id.suffixed("input")
}

/// Options read from the block's properties
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextAreaProperties {
    pub input_style: Option<Value>,
    pub disabled: bool,
    pub auto_focus: bool,
    pub placeholder: Option<String>,
    pub allow_clear: bool,
    /// Fixed height; takes precedence over `auto_size`
    pub rows: Option<u64>,
    pub auto_size: Option<Value>,
}

impl TextAreaProperties {
    /// Effective `autoSize` of the widget
    pub fn auto_size(&self) -> Value {
        match (self.rows, &self.auto_size) {
            (Some(rows), _) if rows > 0 => json!({ "minRows": rows, "maxRows": rows }),
            (_, Some(auto_size)) => auto_size.clone(),
            _ => json!({ "minRows": DEFAULT_MIN_ROWS }),
        }
    }
}

/// Text area block
#[derive(Debug, Clone, Copy, Default)]
pub struct TextAreaBlock;

impl Block for TextAreaBlock {
    fn block_type(&self) -> BlockType {
        BlockType::TextArea
    }

    fn render(&self, props: &BlockProps<'_>, _content: &Content<'_>) -> RenderNode {
        let options: TextAreaProperties = props.properties.deserialize().unwrap_or_else(|err| {
            warn!(block_id = %props.block_id, error = %err, "invalid text area properties");
            TextAreaProperties::default()
        });
        let class_name = props
            .css
            .make_css_class(options.input_style.as_ref().unwrap_or(&Value::Null));

        let input = RenderNode::new(TEXT_AREA_WIDGET)
            .with_id(input_id(props.block_id))
            .with_prop("className", class_name)
            .with_prop("disabled", options.disabled)
            .with_prop("autoFocus", options.auto_focus)
            .with_opt_prop("placeholder", options.placeholder.clone())
            .with_prop("value", props.value.clone())
            .with_prop("allowClear", options.allow_clear)
            .with_prop("autoSize", options.auto_size());

        render_label(props, label_options(props.properties), input)
    }

    fn on_interaction(&self, interaction: Interaction, methods: &BlockMethods) -> Result<(), BlockError> {
        match interaction {
            Interaction::Change { value, selection } => {
                methods.set_value(value)?;
                methods.trigger_event(Event::new(ON_CHANGE))?;
                if let Some(selection) = selection {
                    let input = methods.widget(input_id(methods.block_id()));
                    methods.effect_slot(SELECTION_SLOT)?.run_after_update(move || {
                        if !input.set_selection_range(selection.start, selection.end) {
                            trace!(widget = input.id(), "input gone before selection restore");
                        }
                    });
                }
                Ok(())
            }
            Interaction::PressEnter => {
                methods.trigger_event(Event::new(ON_PRESS_ENTER))?;
                Ok(())
            }
            other => {
                trace!(block_id = %methods.block_id(), interaction = other.name(), "ignored");
                Ok(())
            }
        }
    }
}
