//! The `methods` façade handed to a block instance
//!
//! A [`BlockMethods`] is bound to one mounted lifetime of one block. It holds
//! only a weak reference to the runtime, so callables that capture it (and
//! are stored in the runtime's own registry) never keep the runtime alive.
//! Every call checks that the instance is still the mounted one; a façade
//! kept past unmount fails with [`BlockError::StaleInstance`].

use serde_json::{json, Value};
use std::fmt;
use std::sync::{Arc, Weak};

use crate::core::block::BlockError;
use crate::core::event::{Event, Triggered};
use crate::core::list::{
    ListHandle, MOVE_ITEM_DOWN, MOVE_ITEM_UP, PUSH_ITEM, REMOVE_ITEM, UNSHIFT_ITEM,
};
use crate::core::node::RenderNode;
use crate::core::registry::{index_arg, ArgShape, Method, Registration, RegistryError};
use crate::core::scheduler::RunAfterUpdate;
use crate::core::surface::{CssClassGenerator, Surface, WidgetHandle};
use crate::core::{BlockId, InstanceId, Properties};

use super::{into_block_error, RuntimeInner};

/// Per-instance view of the runtime
#[derive(Clone)]
pub struct BlockMethods {
    block_id: BlockId,
    instance: InstanceId,
    runtime: Weak<RuntimeInner>,
    surface: Arc<dyn Surface>,
    css: Arc<dyn CssClassGenerator>,
}

impl BlockMethods {
    pub(crate) fn new(block_id: BlockId, instance: InstanceId, runtime: &Arc<RuntimeInner>) -> Self {
        Self {
            block_id,
            instance,
            surface: Arc::clone(&runtime.surface),
            css: Arc::clone(&runtime.css),
            runtime: Arc::downgrade(runtime),
        }
    }

    pub fn block_id(&self) -> &BlockId {
        &self.block_id
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// Upgrade to the runtime, checking this façade's instance is still mounted
    fn runtime(&self) -> Result<Arc<RuntimeInner>, BlockError> {
        let runtime = self.runtime.upgrade().ok_or(BlockError::RuntimeDropped)?;
        if runtime.current_instance(&self.block_id) != Some(self.instance) {
            return Err(BlockError::StaleInstance(self.block_id.clone()));
        }
        Ok(runtime)
    }

    /// Whether this façade still addresses a mounted instance
    pub fn is_current(&self) -> bool {
        self.runtime().is_ok()
    }

    /// Replace the block's value
    pub fn set_value(&self, value: Value) -> Result<(), BlockError> {
        self.runtime()?.write_value(&self.block_id, value)
    }

    /// Current value of the block
    pub fn value(&self) -> Result<Value, BlockError> {
        Ok(self.runtime()?.read_value(&self.block_id))
    }

    /// Latest properties of the block
    pub fn properties(&self) -> Result<Properties, BlockError> {
        let runtime = self.runtime()?;
        runtime
            .descriptor(&self.block_id)
            .map(|d| d.properties.clone())
            .ok_or_else(|| BlockError::StaleInstance(self.block_id.clone()))
    }

    /// Report an event; resolution happens in the action pipeline
    pub fn trigger_event(&self, event: Event) -> Result<Triggered, BlockError> {
        let runtime = self.runtime()?;
        let descriptor = runtime
            .descriptor(&self.block_id)
            .ok_or_else(|| BlockError::StaleInstance(self.block_id.clone()))?;
        Ok(runtime
            .dispatcher
            .trigger(&self.block_id, &descriptor.events, event))
    }

    /// Run the pipeline configured for `action` on this block
    pub fn call_action(&self, action: &str) -> Result<Triggered, BlockError> {
        self.trigger_event(Event::new(action))
    }

    /// Publish a callable under `name` for this instance
    pub fn register_method(&self, name: &str, method: Method) -> Result<Registration, BlockError> {
        let runtime = self.runtime()?;
        runtime
            .registry
            .register(&self.block_id, self.instance, name, method)
            .map_err(|err| match err {
                RegistryError::StaleRegistration { .. } => {
                    BlockError::StaleInstance(self.block_id.clone())
                }
                other => BlockError::Registration(other.to_string()),
            })
    }

    /// Invoke a method on another block (or this one) through the registry
    pub fn invoke(&self, target: &BlockId, name: &str, args: Value) -> Result<Value, RegistryError> {
        let runtime = self.runtime()?;
        runtime.registry.invoke(target, name, args)
    }

    pub fn make_css_class(&self, style: &Value) -> String {
        self.css.make_css_class(style)
    }

    pub fn css(&self) -> &dyn CssClassGenerator {
        self.css.as_ref()
    }

    /// Scheduling slot for callbacks that must run after the next commit
    pub fn effect_slot(&self, slot: &str) -> Result<RunAfterUpdate, BlockError> {
        Ok(self.runtime()?.effects.slot(&self.block_id, slot))
    }

    pub fn surface(&self) -> Arc<dyn Surface> {
        Arc::clone(&self.surface)
    }

    /// Handle to a widget by id, resolved at call time
    pub fn widget(&self, widget_id: impl Into<String>) -> WidgetHandle {
        WidgetHandle::new(widget_id, Arc::clone(&self.surface))
    }

    /// Render this block's nested content
    pub fn render_content(&self) -> Result<Vec<RenderNode>, BlockError> {
        Ok(self.runtime()?.render_content(&self.block_id))
    }

    /// Request a render on the next `render_if_dirty`
    pub fn invalidate(&self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.mark_dirty();
        }
    }

    /// Mount children for new items and unmount those of removed ones
    fn sync_list(&self) -> Result<(), BlockError> {
        let runtime = self.runtime()?;
        runtime.sync_items(&self.block_id).map_err(into_block_error)?;
        runtime.mark_dirty();
        Ok(())
    }

    /// The list state owned by this block
    pub fn list(&self) -> Result<ListHandle, BlockError> {
        self.runtime()?
            .list(&self.block_id)
            .ok_or_else(|| BlockError::NotAList(self.block_id.clone()))
    }

    /// Engine-provided list mutations, ready to be registered under their names
    pub fn list_methods(&self) -> Result<Vec<(&'static str, Method)>, BlockError> {
        let list = self.list()?;

        let push = {
            let (list, owner) = (list.clone(), self.clone());
            Method::new(ArgShape::Any, move |item| {
                let id = list.with(|state| state.push_item(item));
                owner.sync_list()?;
                Ok(json!(id.0))
            })
        };
        let unshift = {
            let (list, owner) = (list.clone(), self.clone());
            Method::new(ArgShape::Any, move |item| {
                let id = list.with(|state| state.unshift_item(item));
                owner.sync_list()?;
                Ok(json!(id.0))
            })
        };
        let remove = {
            let (list, owner) = (list.clone(), self.clone());
            Method::new(ArgShape::Index, move |args| {
                let index = index_arg(&args)?;
                let removed = list.with(|state| state.remove_item(index))?;
                owner.sync_list()?;
                Ok(removed)
            })
        };
        let down = {
            let (list, owner) = (list.clone(), self.clone());
            Method::new(ArgShape::Index, move |args| {
                let index = index_arg(&args)?;
                let moved = list.with(|state| state.move_item_down(index))?;
                if moved {
                    owner.invalidate();
                }
                Ok(Value::Bool(moved))
            })
        };
        let up = {
            let owner = self.clone();
            Method::new(ArgShape::Index, move |args| {
                let index = index_arg(&args)?;
                let moved = list.with(|state| state.move_item_up(index))?;
                if moved {
                    owner.invalidate();
                }
                Ok(Value::Bool(moved))
            })
        };

        Ok(vec![
            (PUSH_ITEM, push),
            (UNSHIFT_ITEM, unshift),
            (REMOVE_ITEM, remove),
            (MOVE_ITEM_DOWN, down),
            (MOVE_ITEM_UP, up),
        ])
    }
}

impl fmt::Debug for BlockMethods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockMethods")
            .field("block_id", &self.block_id)
            .field("instance", &self.instance)
            .finish()
    }
}
