//! ConfirmModal: a confirmation dialog opened imperatively
//!
//! The block renders only an empty anchor. At mount it registers an `open`
//! method; each call shows one dialog on the surface. Every dialog resolves
//! exactly once, into either the `onOk` or the `onCancel` action, and is
//! closed on the surface when it does. A block built with
//! [`ConfirmModalBlock::on_ok`] or [`ConfirmModalBlock::on_cancel`] runs that
//! handler instead of the matching action.

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::core::block::{Block, BlockError, BlockProps, Interaction};
use crate::core::node::{Content, RenderNode};
use crate::core::registry::{ArgShape, Method};
use crate::core::surface::{CssClassGenerator, ModalId, ModalRequest};
use crate::core::{BlockId, Properties};
use crate::runtime::BlockMethods;

use super::BlockType;

pub const OPEN: &str = "open";
pub const ON_OK: &str = "onOk";
pub const ON_CANCEL: &str = "onCancel";
pub const ANCHOR_WIDGET: &str = "div";
pub const ICON_WIDGET: &str = "Icon";

/// Dialog kinds a surface knows how to show
pub const MODAL_KINDS: [&str; 5] = ["confirm", "info", "success", "error", "warning"];

/// Options read from the block's properties
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfirmModalProperties {
    pub title: Option<Value>,
    /// Fallback body when the block has no content children
    pub content: Option<Value>,
    pub status: Option<String>,
    pub modal_style: Option<Value>,
    pub ok_text: Option<String>,
    pub cancel_text: Option<String>,
    pub ok_button: Option<Value>,
    pub cancel_button: Option<Value>,
    pub centered: bool,
    pub mask: Option<bool>,
    pub mask_closable: bool,
    pub width: Option<Value>,
    pub z_index: Option<Value>,
    pub icon: Option<Value>,
}

/// Arguments of the `open` method
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OpenArgs {
    /// Overrides the dialog kind of the properties
    pub status: Option<String>,
}

fn non_empty(text: &Option<String>) -> Option<&str> {
    text.as_deref().filter(|t| !t.is_empty())
}

/// Build the dialog shown by one `open` call
pub fn modal_request(
    block_id: &BlockId,
    properties: &Properties,
    args: &OpenArgs,
    content: Vec<RenderNode>,
    css: &dyn CssClassGenerator,
) -> Result<ModalRequest, BlockError> {
    let options: ConfirmModalProperties = properties.deserialize()?;
    let kind = non_empty(&args.status)
        .or_else(|| non_empty(&options.status))
        .unwrap_or("confirm");
    if !MODAL_KINDS.contains(&kind) {
        return Err(BlockError::InvalidArguments(format!(
            "unknown modal status '{}', expected one of {:?}",
            kind, MODAL_KINDS
        )));
    }

    let body = if content.is_empty() {
        options.content.clone().unwrap_or(Value::Null)
    } else {
        serde_json::to_value(content)?
    };

    let mut props = Map::new();
    let mut set = |key: &str, value: Value| {
        if !value.is_null() {
            props.insert(key.to_string(), value);
        }
    };
    set("title", options.title.clone().unwrap_or(Value::Null));
    set("content", body);
    set(
        "className",
        json!(css.make_css_class(options.modal_style.as_ref().unwrap_or(&Value::Null))),
    );
    set("okText", json!(non_empty(&options.ok_text).unwrap_or("Ok")));
    set("cancelText", json!(non_empty(&options.cancel_text).unwrap_or("Cancel")));
    set("okButtonProps", options.ok_button.clone().unwrap_or(Value::Null));
    set("cancelButtonProps", options.cancel_button.clone().unwrap_or(Value::Null));
    set("centered", json!(options.centered));
    set("mask", json!(options.mask.unwrap_or(true)));
    set("maskClosable", json!(options.mask_closable));
    set("width", options.width.clone().unwrap_or(Value::Null));
    set("zIndex", options.z_index.clone().unwrap_or(Value::Null));
    if let Some(icon) = &options.icon {
        let node = RenderNode::new(ICON_WIDGET)
            .with_id(block_id.suffixed("icon"))
            .with_prop("properties", icon.clone());
        set("icon", serde_json::to_value(node)?);
    }

    Ok(ModalRequest {
        id: block_id.suffixed("confirm_modal"),
        kind: kind.to_string(),
        props,
    })
}

/// Whether a confirm modal block has an unresolved dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalState {
    Closed,
    Open,
}

/// Runs in place of the `onOk` or `onCancel` action of a dialog
pub type ModalHandler = Arc<dyn Fn(&BlockMethods) -> Result<(), BlockError> + Send + Sync>;

/// Confirm modal block
#[derive(Clone, Default)]
pub struct ConfirmModalBlock {
    /// Dialogs shown and not yet resolved
    open: Arc<Mutex<HashSet<ModalId>>>,
    on_ok: Option<ModalHandler>,
    on_cancel: Option<ModalHandler>,
}

impl ConfirmModalBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle confirmations with `handler` instead of the `onOk` action
    pub fn on_ok<F>(mut self, handler: F) -> Self
    where
        F: Fn(&BlockMethods) -> Result<(), BlockError> + Send + Sync + 'static,
    {
        self.on_ok = Some(Arc::new(handler));
        self
    }

    /// Handle dismissals with `handler` instead of the `onCancel` action
    pub fn on_cancel<F>(mut self, handler: F) -> Self
    where
        F: Fn(&BlockMethods) -> Result<(), BlockError> + Send + Sync + 'static,
    {
        self.on_cancel = Some(Arc::new(handler));
        self
    }

    pub fn state(&self) -> ModalState {
        if self.open.lock().is_empty() {
            ModalState::Closed
        } else {
            ModalState::Open
        }
    }

    /// Number of dialogs awaiting an outcome
    pub fn open_count(&self) -> usize {
        self.open.lock().len()
    }

    fn resolve(
        &self,
        modal: ModalId,
        action: &str,
        handler: Option<&ModalHandler>,
        methods: &BlockMethods,
    ) -> Result<(), BlockError> {
        if !self.open.lock().remove(&modal) {
            debug!(block_id = %methods.block_id(), %modal, action, "modal already resolved");
            return Ok(());
        }
        methods.surface().close_modal(modal);
        debug!(block_id = %methods.block_id(), %modal, action, "modal resolved");
        match handler {
            Some(handler) => handler(methods),
            None => methods.call_action(action).map(|_| ()),
        }
    }
}

impl fmt::Debug for ConfirmModalBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfirmModalBlock")
            .field("open", &self.open_count())
            .field("on_ok", &self.on_ok.is_some())
            .field("on_cancel", &self.on_cancel.is_some())
            .finish()
    }
}

impl Block for ConfirmModalBlock {
    fn block_type(&self) -> BlockType {
        BlockType::ConfirmModal
    }

    fn render(&self, props: &BlockProps<'_>, _content: &Content<'_>) -> RenderNode {
        RenderNode::new(ANCHOR_WIDGET).with_id(props.block_id.as_str())
    }

    fn on_mount(&self, methods: &BlockMethods) -> Result<(), BlockError> {
        let owner = methods.clone();
        let open = Arc::clone(&self.open);
        let method = Method::new(ArgShape::Options, move |args| {
            let args: OpenArgs = match args {
                Value::Null => OpenArgs::default(),
                other => serde_json::from_value(other)
                    .map_err(|err| BlockError::InvalidArguments(err.to_string()))?,
            };
            let request = modal_request(
                owner.block_id(),
                &owner.properties()?,
                &args,
                owner.render_content()?,
                owner.css(),
            )?;
            let kind = request.kind.clone();
            let modal = owner.surface().show_modal(request);
            open.lock().insert(modal);
            debug!(block_id = %owner.block_id(), %modal, %kind, "modal shown");
            Ok(json!(modal.0))
        });
        methods.register_method(OPEN, method)?;
        Ok(())
    }

    fn on_interaction(&self, interaction: Interaction, methods: &BlockMethods) -> Result<(), BlockError> {
        match interaction {
            Interaction::ModalOk { modal } => self.resolve(modal, ON_OK, self.on_ok.as_ref(), methods),
            Interaction::ModalCancel { modal } => {
                self.resolve(modal, ON_CANCEL, self.on_cancel.as_ref(), methods)
            }
            other => {
                debug!(block_id = %methods.block_id(), interaction = other.name(), "ignored");
                Ok(())
            }
        }
    }

    fn on_unmount(&self, methods: &BlockMethods) {
        let open: Vec<ModalId> = self.open.lock().drain().collect();
        let surface = methods.surface();
        for modal in open {
            surface.close_modal(modal);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::surface::HashedCssClasses;

    fn request(properties: Value, args: OpenArgs) -> Result<ModalRequest, BlockError> {
        modal_request(
            &BlockId::from("confirm"),
            &Properties::from_value(properties),
            &args,
            Vec::new(),
            &HashedCssClasses::default(),
        )
    }

    #[test]
    fn test_defaults() {
        let modal = request(json!({ "title": "Delete?" }), OpenArgs::default()).unwrap();
        assert_eq!(modal.id, "confirm_confirm_modal");
        assert_eq!(modal.kind, "confirm");
        assert_eq!(modal.props["title"], json!("Delete?"));
        assert_eq!(modal.props["okText"], json!("Ok"));
        assert_eq!(modal.props["cancelText"], json!("Cancel"));
        assert_eq!(modal.props["centered"], json!(false));
        assert_eq!(modal.props["mask"], json!(true));
        assert_eq!(modal.props["maskClosable"], json!(false));
        assert!(!modal.props.contains_key("icon"));
        assert!(!modal.props.contains_key("width"));
    }

    #[test]
    fn test_status_precedence() {
        let from_props = request(json!({ "status": "warning" }), OpenArgs::default()).unwrap();
        assert_eq!(from_props.kind, "warning");

        let from_args = request(
            json!({ "status": "warning" }),
            OpenArgs {
                status: Some("error".into()),
            },
        )
        .unwrap();
        assert_eq!(from_args.kind, "error");

        assert!(matches!(
            request(json!({ "status": "explode" }), OpenArgs::default()),
            Err(BlockError::InvalidArguments(_))
        ));
    }

    #[test]
    fn test_overrides_and_icon() {
        let modal = request(
            json!({
                "okText": "Yes",
                "cancelText": "",
                "mask": false,
                "width": 600,
                "content": "Are you sure?",
                "icon": { "name": "WarningOutlined" }
            }),
            OpenArgs::default(),
        )
        .unwrap();
        assert_eq!(modal.props["okText"], json!("Yes"));
        assert_eq!(modal.props["cancelText"], json!("Cancel"));
        assert_eq!(modal.props["mask"], json!(false));
        assert_eq!(modal.props["width"], json!(600));
        assert_eq!(modal.props["content"], json!("Are you sure?"));
        assert_eq!(modal.props["icon"]["id"], json!("confirm_icon"));
    }

    #[test]
    fn test_content_children_win_over_property() {
        let modal = modal_request(
            &BlockId::from("confirm"),
            &Properties::new().with("content", "fallback"),
            &OpenArgs::default(),
            vec![RenderNode::new("Text").with_id("body")],
            &HashedCssClasses::default(),
        )
        .unwrap();
        assert_eq!(modal.props["content"][0]["id"], json!("body"));
    }
}
