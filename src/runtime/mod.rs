//! Block runtime
//!
//! Owns the mounted block tree and the services every block shares: the
//! method registry, the event dispatcher, the deferred-effect queue and the
//! presentation surface. Hosts drive it through a small cycle:
//!
//! 1. `interact` reports a native interaction to a block's handler
//! 2. `render` builds a [`Frame`], commits it, then flushes deferred effects
//! 3. `dispatch_events` hands queued triggers to the action resolver
//!
//! `handle` runs the three steps in order.

pub mod methods;
pub mod validation;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::blocks::BlockCatalog;
use crate::config::RuntimeConfig;
use crate::core::block::{
    Block, BlockDescriptor, BlockError, BlockProps, ContentKind, Interaction, Validation,
};
use crate::core::event::{ActionResolver, ActionSpec, DispatchReport, EventDispatcher};
use crate::core::list::{ItemId, ListHandle, ListState};
use crate::core::node::{Content, Frame, RenderNode};
use crate::core::registry::{MethodRegistry, RegistryError};
use crate::core::scheduler::DeferredEffects;
use crate::core::surface::{CssClassGenerator, HashedCssClasses, Surface};
use crate::core::{BlockId, InstanceId, Properties};

pub use methods::BlockMethods;
pub use validation::{TreeValidationResult, TreeValidator};

/// Widget name of the wrapper rendered around each list item
pub const LIST_ITEM_WIDGET: &str = "ListItem";

// ── Instance tree ───────────────────────────────────────────────────────────

/// Where the value of a list item's child lives: `item[field]` of its list
#[derive(Debug, Clone)]
struct ItemBinding {
    list: BlockId,
    item: ItemId,
    field: String,
}

#[derive(Clone)]
struct MountedBlock {
    instance: InstanceId,
    /// Descriptor without its nested `blocks`; children are tracked by id
    descriptor: Arc<BlockDescriptor>,
    block: Arc<dyn Block>,
    parent: Option<BlockId>,
    /// Content children, or for a list the children of every item
    children: Vec<BlockId>,
    list: Option<ListHandle>,
    /// Item template of a list
    template: Arc<Vec<BlockDescriptor>>,
    binding: Option<ItemBinding>,
}

#[derive(Default)]
struct BlockTree {
    roots: Vec<BlockId>,
    nodes: HashMap<BlockId, MountedBlock>,
}

impl BlockTree {
    /// Collect a subtree, children before parents
    fn subtree(&self, block_id: &BlockId, out: &mut Vec<MountedBlock>) {
        if let Some(node) = self.nodes.get(block_id) {
            for child in &node.children {
                self.subtree(child, out);
            }
            out.push(node.clone());
        }
    }
}

/// Id prefix shared by the children of one list item
fn item_scope(list_id: &BlockId, item: ItemId) -> String {
    format!("{}.{}", list_id, item)
}

struct ItemScope<'a> {
    list: &'a BlockId,
    item: ItemId,
    prefix: String,
}

impl ItemScope<'_> {
    fn child_id(&self, block_id: &BlockId) -> BlockId {
        BlockId::new(format!("{}.{}", self.prefix, block_id))
    }
}

enum ValueSource {
    List(ListHandle),
    Item(ListHandle, ItemBinding),
    Own,
}

/// Flatten a runtime error raised inside a block callback
pub(crate) fn into_block_error(err: RegistryError) -> BlockError {
    match err {
        RegistryError::Block(err) => err,
        other => BlockError::Registration(other.to_string()),
    }
}

/// Partial replacement of a mounted block's inputs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BlockUpdate {
    pub properties: Option<Properties>,
    pub events: Option<HashMap<String, Vec<ActionSpec>>>,
    pub required: Option<bool>,
    pub validation: Option<Validation>,
    pub loading: Option<bool>,
}

impl BlockUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn with_events(mut self, events: HashMap<String, Vec<ActionSpec>>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = Some(validation);
        self
    }

    pub fn with_loading(mut self, loading: bool) -> Self {
        self.loading = Some(loading);
        self
    }

    /// Apply to a descriptor; returns whether properties changed
    fn apply(self, descriptor: &mut BlockDescriptor) -> bool {
        let mut properties_changed = false;
        if let Some(properties) = self.properties {
            properties_changed = properties != descriptor.properties;
            descriptor.properties = properties;
        }
        if let Some(events) = self.events {
            descriptor.events = events;
        }
        if let Some(required) = self.required {
            descriptor.required = required;
        }
        if let Some(validation) = self.validation {
            descriptor.validation = validation;
        }
        if let Some(loading) = self.loading {
            descriptor.loading = loading;
        }
        properties_changed
    }
}

// ── Shared state ────────────────────────────────────────────────────────────

pub(crate) struct RuntimeInner {
    pub(crate) config: RuntimeConfig,
    pub(crate) catalog: BlockCatalog,
    pub(crate) registry: MethodRegistry,
    pub(crate) dispatcher: EventDispatcher,
    pub(crate) effects: DeferredEffects,
    pub(crate) surface: Arc<dyn Surface>,
    pub(crate) css: Arc<dyn CssClassGenerator>,
    tree: RwLock<BlockTree>,
    values: RwLock<HashMap<BlockId, Value>>,
    dirty: AtomicBool,
    generation: AtomicU64,
}

impl RuntimeInner {
    pub(crate) fn current_instance(&self, block_id: &BlockId) -> Option<InstanceId> {
        self.tree.read().nodes.get(block_id).map(|node| node.instance)
    }

    pub(crate) fn descriptor(&self, block_id: &BlockId) -> Option<Arc<BlockDescriptor>> {
        self.tree
            .read()
            .nodes
            .get(block_id)
            .map(|node| Arc::clone(&node.descriptor))
    }

    pub(crate) fn list(&self, block_id: &BlockId) -> Option<ListHandle> {
        self.tree
            .read()
            .nodes
            .get(block_id)
            .and_then(|node| node.list.clone())
    }

    pub(crate) fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    fn value_source(&self, block_id: &BlockId) -> ValueSource {
        let tree = self.tree.read();
        let Some(node) = tree.nodes.get(block_id) else {
            return ValueSource::Own;
        };
        if let Some(list) = &node.list {
            return ValueSource::List(list.clone());
        }
        match &node.binding {
            Some(binding) => match tree.nodes.get(&binding.list).and_then(|owner| owner.list.clone()) {
                Some(list) => ValueSource::Item(list, binding.clone()),
                None => ValueSource::Own,
            },
            None => ValueSource::Own,
        }
    }

    pub(crate) fn read_value(&self, block_id: &BlockId) -> Value {
        match self.value_source(block_id) {
            ValueSource::List(list) => list.to_value(),
            ValueSource::Item(list, binding) => list
                .with(|state| state.item_field(binding.item, &binding.field))
                .unwrap_or(Value::Null),
            ValueSource::Own => self
                .values
                .read()
                .get(block_id)
                .cloned()
                .unwrap_or(Value::Null),
        }
    }

    pub(crate) fn write_value(self: &Arc<Self>, block_id: &BlockId, value: Value) -> Result<(), BlockError> {
        match self.value_source(block_id) {
            ValueSource::List(list) => {
                let values = match value {
                    Value::Array(values) => values,
                    Value::Null => Vec::new(),
                    other => {
                        return Err(BlockError::InvalidArguments(format!(
                            "list value must be an array, got {}",
                            other
                        )))
                    }
                };
                list.with(|state| state.set_values(values));
                self.sync_items(block_id).map_err(into_block_error)?;
            }
            ValueSource::Item(list, binding) => {
                let written =
                    list.with(|state| state.set_item_field(binding.item, &binding.field, value));
                if !written {
                    return Err(BlockError::StaleInstance(block_id.clone()));
                }
            }
            ValueSource::Own => {
                self.values.write().insert(block_id.clone(), value);
            }
        }
        trace!(block_id = %block_id, "value set");
        self.mark_dirty();
        Ok(())
    }

    /// Nested content of a mounted block, as its `Content` would produce it
    pub(crate) fn render_content(&self, block_id: &BlockId) -> Vec<RenderNode> {
        let mounted = self.tree.read().nodes.get(block_id).cloned();
        match mounted {
            Some(mounted) => self.produce_content(block_id, &mounted),
            None => Vec::new(),
        }
    }

    // ── Instances ───────────────────────────────────────────────────────────

    /// Create instances for a descriptor tree, parents before children
    fn instantiate(
        &self,
        mut descriptor: BlockDescriptor,
        parent: Option<BlockId>,
        scope: Option<&ItemScope<'_>>,
        out: &mut Vec<MountedBlock>,
    ) -> Result<(), RegistryError> {
        let block = self.catalog.create(&descriptor)?;
        let child_descriptors = std::mem::take(&mut descriptor.blocks);
        let binding = scope.map(|scope| {
            let field = descriptor.block_id.as_str().to_string();
            descriptor.block_id = scope.child_id(&descriptor.block_id);
            ItemBinding {
                list: scope.list.clone(),
                item: scope.item,
                field,
            }
        });
        let block_id = descriptor.block_id.clone();

        match block.content_kind() {
            ContentKind::Children => {
                let children = child_descriptors
                    .iter()
                    .map(|child| match scope {
                        Some(scope) => scope.child_id(&child.block_id),
                        None => child.block_id.clone(),
                    })
                    .collect();
                out.push(MountedBlock {
                    instance: InstanceId::new(),
                    descriptor: Arc::new(descriptor),
                    block,
                    parent,
                    children,
                    list: None,
                    template: Arc::new(Vec::new()),
                    binding,
                });
                for child in child_descriptors {
                    self.instantiate(child, Some(block_id.clone()), scope, out)?;
                }
            }
            ContentKind::ItemTemplate => {
                if scope.is_some() {
                    return Err(RegistryError::ValidationError(format!(
                        "List {} cannot be part of another list's item template",
                        block_id
                    )));
                }
                let state = ListState::from_value(descriptor.value.as_ref().unwrap_or(&Value::Null));
                let items = state.ids();
                let template = Arc::new(child_descriptors);
                let at = out.len();
                out.push(MountedBlock {
                    instance: InstanceId::new(),
                    descriptor: Arc::new(descriptor),
                    block,
                    parent,
                    children: Vec::new(),
                    list: Some(ListHandle::new(state)),
                    template: Arc::clone(&template),
                    binding: None,
                });
                let mut children = Vec::new();
                for item in items {
                    children.extend(self.instantiate_item(&block_id, item, &template, out)?);
                }
                out[at].children = children;
            }
        }
        Ok(())
    }

    /// Create the template children of one list item
    ///
    /// # Returns
    /// Ids of the item's top-level children
    fn instantiate_item(
        &self,
        list_id: &BlockId,
        item: ItemId,
        template: &[BlockDescriptor],
        out: &mut Vec<MountedBlock>,
    ) -> Result<Vec<BlockId>, RegistryError> {
        let scope = ItemScope {
            list: list_id,
            item,
            prefix: item_scope(list_id, item),
        };
        let mut roots = Vec::with_capacity(template.len());
        for child in template {
            roots.push(scope.child_id(&child.block_id));
            self.instantiate(child.clone(), Some(list_id.clone()), Some(&scope), out)?;
        }
        Ok(roots)
    }

    /// Insert instantiated nodes under `parent`, then run their mount hooks
    /// children first
    ///
    /// When a hook fails every node is discarded again; only blocks whose
    /// `on_mount` completed see `on_unmount`.
    fn attach(
        self: &Arc<Self>,
        parent: Option<&BlockId>,
        roots: &[BlockId],
        created: &[MountedBlock],
    ) -> Result<(), RegistryError> {
        {
            let mut tree = self.tree.write();
            if let Some(taken) = created
                .iter()
                .find(|node| tree.nodes.contains_key(&node.descriptor.block_id))
            {
                return Err(RegistryError::DuplicateBlock(taken.descriptor.block_id.clone()));
            }
            match parent {
                Some(parent_id) => match tree.nodes.get_mut(parent_id) {
                    Some(node) => node.children.extend(roots.iter().cloned()),
                    None => return Err(RegistryError::BlockNotFound(parent_id.clone())),
                },
                None => tree.roots.extend(roots.iter().cloned()),
            }

            let mut values = self.values.write();
            for node in created {
                let block_id = node.descriptor.block_id.clone();
                self.registry.attach(&block_id, node.instance);
                if node.list.is_none() && node.binding.is_none() {
                    if let Some(value) = &node.descriptor.value {
                        values.insert(block_id.clone(), value.clone());
                    }
                }
                tree.nodes.insert(block_id, node.clone());
            }
        }

        let mut hooked = HashSet::new();
        for node in created.iter().rev() {
            let block_id = &node.descriptor.block_id;
            let methods = BlockMethods::new(block_id.clone(), node.instance, self);
            if let Err(err) = node.block.on_mount(&methods) {
                warn!(block_id = %block_id, error = %err, "mount hook failed");
                let order: Vec<MountedBlock> = created.iter().rev().cloned().collect();
                self.discard(parent, roots, &order, |id| hooked.contains(id));
                return Err(err.into());
            }
            hooked.insert(block_id.clone());
        }
        Ok(())
    }

    /// Drop nodes from the tree, the registry and the effect queue
    ///
    /// `nodes` are ordered children first; `on_unmount` runs for the ids
    /// `hooked` accepts.
    fn discard(
        self: &Arc<Self>,
        parent: Option<&BlockId>,
        roots: &[BlockId],
        nodes: &[MountedBlock],
        hooked: impl Fn(&BlockId) -> bool,
    ) {
        for node in nodes {
            let block_id = &node.descriptor.block_id;
            if hooked(block_id) {
                node.block
                    .on_unmount(&BlockMethods::new(block_id.clone(), node.instance, self));
            }
            self.registry.detach(block_id, node.instance);
            let cancelled = self.effects.cancel_block(block_id);
            if cancelled > 0 {
                trace!(block_id = %block_id, cancelled, "pending effects cancelled");
            }
        }

        {
            let mut tree = self.tree.write();
            for node in nodes {
                tree.nodes.remove(&node.descriptor.block_id);
            }
            match parent {
                Some(parent_id) => {
                    if let Some(node) = tree.nodes.get_mut(parent_id) {
                        node.children.retain(|child| !roots.contains(child));
                    }
                }
                None => tree.roots.retain(|root| !roots.contains(root)),
            }
        }
        let mut values = self.values.write();
        for node in nodes {
            values.remove(&node.descriptor.block_id);
        }
    }

    fn unmount_subtree(self: &Arc<Self>, block_id: &BlockId) -> Result<usize, RegistryError> {
        let (order, parent) = {
            let tree = self.tree.read();
            let node = tree
                .nodes
                .get(block_id)
                .ok_or_else(|| RegistryError::BlockNotFound(block_id.clone()))?;
            let parent = node.parent.clone();
            let mut order = Vec::new();
            tree.subtree(block_id, &mut order);
            (order, parent)
        };

        self.discard(parent.as_ref(), std::slice::from_ref(block_id), &order, |_| true);
        self.mark_dirty();
        debug!(block_id = %block_id, blocks = order.len(), "unmounted");
        Ok(order.len())
    }

    /// Mount children for new items of a list and unmount those of removed items
    pub(crate) fn sync_items(self: &Arc<Self>, list_id: &BlockId) -> Result<(), RegistryError> {
        let (list, template, mounted) = {
            let tree = self.tree.read();
            let Some(node) = tree.nodes.get(list_id) else {
                return Ok(());
            };
            let Some(list) = node.list.clone() else {
                return Ok(());
            };
            let mut mounted: BTreeMap<ItemId, Vec<BlockId>> = BTreeMap::new();
            for child in &node.children {
                if let Some(binding) = tree.nodes.get(child).and_then(|c| c.binding.as_ref()) {
                    mounted.entry(binding.item).or_default().push(child.clone());
                }
            }
            (list, Arc::clone(&node.template), mounted)
        };
        if template.is_empty() {
            return Ok(());
        }

        let items = list.with(|state| state.ids());
        let live: HashSet<ItemId> = items.iter().copied().collect();
        let mut removed = 0;
        for (item, roots) in &mounted {
            if !live.contains(item) {
                for root in roots {
                    removed += self.unmount_subtree(root)?;
                }
            }
        }

        let mut added = 0;
        for item in items {
            if mounted.contains_key(&item) {
                continue;
            }
            let mut created = Vec::new();
            let roots = self.instantiate_item(list_id, item, &template, &mut created)?;
            self.attach(Some(list_id), &roots, &created)?;
            added += created.len();
        }
        if added + removed > 0 {
            trace!(block_id = %list_id, added, removed, "item children synced");
        }
        Ok(())
    }

    /// Catch up on list items changed through a bare [`ListHandle`]
    fn sync_lists(self: &Arc<Self>) {
        let lists: Vec<BlockId> = self
            .tree
            .read()
            .nodes
            .iter()
            .filter(|(_, node)| node.list.is_some())
            .map(|(id, _)| id.clone())
            .collect();
        for list_id in lists {
            if let Err(err) = self.sync_items(&list_id) {
                warn!(block_id = %list_id, error = %err, "item children out of sync");
            }
        }
    }

    // ── Rendering ───────────────────────────────────────────────────────────

    fn render_block(&self, block_id: &BlockId) -> Option<RenderNode> {
        let mounted = self.tree.read().nodes.get(block_id).cloned()?;
        let value = self.read_value(block_id);

        let produce = || self.produce_content(block_id, &mounted);
        let content = if mounted.children.is_empty() && mounted.list.is_none() {
            Content::empty()
        } else {
            Content::new(&produce)
        };

        let descriptor = &mounted.descriptor;
        let props = BlockProps {
            block_id,
            properties: &descriptor.properties,
            value: &value,
            required: descriptor.required,
            validation: &descriptor.validation,
            loading: descriptor.loading,
            css: self.css.as_ref(),
        };
        Some(mounted.block.render(&props, &content))
    }

    fn produce_content(&self, block_id: &BlockId, mounted: &MountedBlock) -> Vec<RenderNode> {
        match &mounted.list {
            Some(list) => {
                list.render_items(|_, item, _| self.render_item(block_id, item, &mounted.template))
            }
            None => mounted
                .children
                .iter()
                .filter_map(|child| self.render_block(child))
                .collect(),
        }
    }

    fn render_item(&self, list_id: &BlockId, item: ItemId, template: &[BlockDescriptor]) -> RenderNode {
        let scope = item_scope(list_id, item);
        let children = template
            .iter()
            .filter_map(|child| {
                self.render_block(&BlockId::new(format!("{}.{}", scope, child.block_id)))
            })
            .collect();
        RenderNode::new(LIST_ITEM_WIDGET)
            .with_id(scope)
            .with_children(children)
    }
}

// ── Runtime ─────────────────────────────────────────────────────────────────

/// Hosts a tree of blocks
///
/// Cloning yields another handle to the same runtime.
#[derive(Clone)]
pub struct BlockRuntime {
    inner: Arc<RuntimeInner>,
}

impl BlockRuntime {
    /// Create a runtime with the built-in block types
    pub fn new(
        config: RuntimeConfig,
        surface: Arc<dyn Surface>,
        resolver: Arc<dyn ActionResolver>,
    ) -> Self {
        Self::with_catalog(config, BlockCatalog::with_builtin(), surface, resolver)
    }

    /// Create a runtime with a custom catalog
    pub fn with_catalog(
        config: RuntimeConfig,
        catalog: BlockCatalog,
        surface: Arc<dyn Surface>,
        resolver: Arc<dyn ActionResolver>,
    ) -> Self {
        let css = Arc::new(HashedCssClasses::new(config.css_prefix.clone()));
        Self::with_parts(config, catalog, surface, resolver, css)
    }

    /// Create a runtime from every collaborator
    pub fn with_parts(
        config: RuntimeConfig,
        catalog: BlockCatalog,
        surface: Arc<dyn Surface>,
        resolver: Arc<dyn ActionResolver>,
        css: Arc<dyn CssClassGenerator>,
    ) -> Self {
        let inner = RuntimeInner {
            registry: MethodRegistry::with_options(config.strict_lifecycle, config.retired_limit),
            dispatcher: EventDispatcher::new(resolver),
            effects: DeferredEffects::new(config.effect_policy),
            config,
            catalog,
            surface,
            css,
            tree: RwLock::new(BlockTree::default()),
            values: RwLock::new(HashMap::new()),
            dirty: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn catalog(&self) -> &BlockCatalog {
        &self.inner.catalog
    }

    pub fn registry(&self) -> &MethodRegistry {
        &self.inner.registry
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.inner.dispatcher
    }

    pub fn effects(&self) -> &DeferredEffects {
        &self.inner.effects
    }

    pub fn surface(&self) -> Arc<dyn Surface> {
        Arc::clone(&self.inner.surface)
    }

    // ── Tree ────────────────────────────────────────────────────────────────

    /// Mount a descriptor tree as a new root
    ///
    /// # Returns
    /// * `Ok(BlockId)` of the mounted root
    /// * `Err(RegistryError::ValidationError)` when the tree fails validation
    /// * `Err(RegistryError::Block)` when a block's mount hook fails; the tree
    ///   is unmounted again
    pub fn mount(&self, descriptor: BlockDescriptor) -> Result<BlockId, RegistryError> {
        self.mount_at(None, descriptor)
    }

    /// Mount a descriptor tree as the last child of a mounted block
    pub fn mount_child(
        &self,
        parent: &BlockId,
        descriptor: BlockDescriptor,
    ) -> Result<BlockId, RegistryError> {
        self.mount_at(Some(parent.clone()), descriptor)
    }

    fn mount_at(
        &self,
        parent: Option<BlockId>,
        descriptor: BlockDescriptor,
    ) -> Result<BlockId, RegistryError> {
        let inner = &self.inner;

        let mounted_ids: HashSet<BlockId> = {
            let tree = inner.tree.read();
            if let Some(parent_id) = &parent {
                let node = tree
                    .nodes
                    .get(parent_id)
                    .ok_or_else(|| RegistryError::BlockNotFound(parent_id.clone()))?;
                if node.block.content_kind() != ContentKind::Children {
                    return Err(RegistryError::ValidationError(format!(
                        "Block {} renders an item template and cannot take children",
                        parent_id
                    )));
                }
                if node.binding.is_some() {
                    return Err(RegistryError::ValidationError(format!(
                        "Block {} belongs to a list item and cannot take children",
                        parent_id
                    )));
                }
            }
            tree.nodes.keys().cloned().collect()
        };

        let report = TreeValidator::validate(&descriptor, &inner.catalog, &mounted_ids);
        for warning in &report.warnings {
            warn!(block_id = ?warning.block_id, "{}", warning.message);
        }
        if !report.valid {
            return Err(RegistryError::ValidationError(report.summary()));
        }

        let root_id = descriptor.block_id.clone();
        let mut created = Vec::new();
        inner.instantiate(descriptor, parent.clone(), None, &mut created)?;
        inner.attach(parent.as_ref(), std::slice::from_ref(&root_id), &created)?;

        inner.mark_dirty();
        debug!(block_id = %root_id, blocks = created.len(), "mounted");
        Ok(root_id)
    }

    /// Tear down a mounted subtree, children first
    ///
    /// Children of list items come and go with their items and cannot be
    /// unmounted on their own.
    ///
    /// # Returns
    /// The number of blocks removed
    pub fn unmount(&self, block_id: &BlockId) -> Result<usize, RegistryError> {
        let bound = {
            let tree = self.inner.tree.read();
            let node = tree
                .nodes
                .get(block_id)
                .ok_or_else(|| RegistryError::BlockNotFound(block_id.clone()))?;
            node.binding.is_some()
        };
        if bound {
            return Err(RegistryError::ValidationError(format!(
                "Block {} belongs to a list item; remove the item instead",
                block_id
            )));
        }
        self.inner.unmount_subtree(block_id)
    }

    /// Replace some inputs of a mounted block
    pub fn update(&self, block_id: &BlockId, update: BlockUpdate) -> Result<(), RegistryError> {
        let (list, binding) = {
            let mut tree = self.inner.tree.write();
            let node = tree
                .nodes
                .get_mut(block_id)
                .ok_or_else(|| RegistryError::BlockNotFound(block_id.clone()))?;
            let mut descriptor = (*node.descriptor).clone();
            let properties_changed = update.apply(&mut descriptor);
            node.descriptor = Arc::new(descriptor);
            let list = if properties_changed { node.list.clone() } else { None };
            (list, node.binding.clone())
        };
        if let Some(list) = list {
            list.with(|state| state.invalidate_all());
        }
        // an item child is part of its item's cached render
        if let Some(binding) = binding {
            if let Some(list) = self.inner.list(&binding.list) {
                list.with(|state| state.invalidate_item(binding.item));
            }
        }
        self.inner.mark_dirty();
        trace!(block_id = %block_id, "block updated");
        Ok(())
    }

    pub fn is_mounted(&self, block_id: &BlockId) -> bool {
        self.inner.tree.read().nodes.contains_key(block_id)
    }

    pub fn block_count(&self) -> usize {
        self.inner.tree.read().nodes.len()
    }

    /// Ids of every mounted block, sorted
    pub fn block_ids(&self) -> Vec<BlockId> {
        let mut ids: Vec<BlockId> = self.inner.tree.read().nodes.keys().cloned().collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }

    /// Current instance of a mounted block
    pub fn instance(&self, block_id: &BlockId) -> Option<InstanceId> {
        self.inner.current_instance(block_id)
    }

    /// The `methods` façade of a mounted block
    pub fn methods(&self, block_id: &BlockId) -> Result<BlockMethods, RegistryError> {
        let instance = self
            .inner
            .current_instance(block_id)
            .ok_or_else(|| RegistryError::BlockNotFound(block_id.clone()))?;
        Ok(BlockMethods::new(block_id.clone(), instance, &self.inner))
    }

    // ── Values ──────────────────────────────────────────────────────────────

    pub fn set_value(&self, block_id: &BlockId, value: Value) -> Result<(), RegistryError> {
        if !self.is_mounted(block_id) {
            return Err(RegistryError::BlockNotFound(block_id.clone()));
        }
        self.inner.write_value(block_id, value)?;
        Ok(())
    }

    pub fn value(&self, block_id: &BlockId) -> Result<Value, RegistryError> {
        if !self.is_mounted(block_id) {
            return Err(RegistryError::BlockNotFound(block_id.clone()));
        }
        Ok(self.inner.read_value(block_id))
    }

    /// List state of a mounted list block
    pub fn list(&self, block_id: &BlockId) -> Option<ListHandle> {
        self.inner.list(block_id)
    }

    // ── Render ──────────────────────────────────────────────────────────────

    /// Render the whole tree, commit it, then run deferred effects
    pub fn render(&self) -> Frame {
        let inner = &self.inner;
        inner.sync_lists();
        inner.dirty.store(false, Ordering::SeqCst);

        let roots = inner.tree.read().roots.clone();
        let nodes = roots
            .iter()
            .filter_map(|root| inner.render_block(root))
            .collect();
        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let frame = Frame {
            generation,
            roots: nodes,
        };

        inner.surface.commit(&frame);
        let flushed = inner.effects.flush();
        debug!(
            generation,
            roots = frame.roots.len(),
            effects = flushed.ran,
            "frame committed"
        );
        frame
    }

    /// Render only when something changed since the last render
    pub fn render_if_dirty(&self) -> Option<Frame> {
        if self.is_dirty() {
            Some(self.render())
        } else {
            None
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }

    /// Generation of the last committed frame; zero before the first render
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    // ── Methods, interactions and events ────────────────────────────────────

    /// Invoke a registered method
    pub fn invoke(&self, block_id: &BlockId, name: &str, args: Value) -> Result<Value, RegistryError> {
        self.inner.registry.invoke(block_id, name, args)
    }

    /// Names of the methods a block has registered, sorted
    pub fn method_names(&self, block_id: &BlockId) -> Vec<String> {
        self.inner.registry.method_names(block_id)
    }

    /// Run a block's interaction handler to completion
    pub fn interact(&self, block_id: &BlockId, interaction: Interaction) -> Result<(), RegistryError> {
        let (block, instance) = {
            let tree = self.inner.tree.read();
            let node = tree
                .nodes
                .get(block_id)
                .ok_or_else(|| RegistryError::BlockNotFound(block_id.clone()))?;
            (Arc::clone(&node.block), node.instance)
        };
        trace!(block_id = %block_id, interaction = interaction.name(), "interaction");
        let methods = BlockMethods::new(block_id.clone(), instance, &self.inner);
        block.on_interaction(interaction, &methods)?;
        Ok(())
    }

    /// Deliver queued triggers to the action resolver
    pub async fn dispatch_events(&self) -> DispatchReport {
        self.inner.dispatcher.dispatch_pending().await
    }

    /// Interact, render, then dispatch the triggers the interaction raised
    pub async fn handle(
        &self,
        block_id: &BlockId,
        interaction: Interaction,
    ) -> Result<DispatchReport, RegistryError> {
        self.interact(block_id, interaction)?;
        if self.inner.config.render_only_when_dirty {
            self.render_if_dirty();
        } else {
            self.render();
        }
        Ok(self.dispatch_events().await)
    }
}
