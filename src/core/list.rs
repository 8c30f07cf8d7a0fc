//! List state machine
//!
//! Keeps an ordered value collection and the rendered items bound to it in
//! lock-step. Every mutation touches both vectors; positions are 0-based and
//! each item also carries an [`ItemId`] that stays stable across reorders.
//!
//! ## Operations
//!
//! | Method | Effect | Fails with |
//! |--------|--------|------------|
//! | `pushItem` | append | never |
//! | `unshiftItem` | prepend, later indices shift up | never |
//! | `removeItem` | remove at index, later indices shift down | `IndexOutOfRange` |
//! | `moveItemUp` | swap with predecessor, no-op at 0 | `IndexOutOfRange` |
//! | `moveItemDown` | swap with successor, no-op at last | `IndexOutOfRange` |

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::block::BlockError;
use super::node::RenderNode;

pub const PUSH_ITEM: &str = "pushItem";
pub const UNSHIFT_ITEM: &str = "unshiftItem";
pub const REMOVE_ITEM: &str = "removeItem";
pub const MOVE_ITEM_DOWN: &str = "moveItemDown";
pub const MOVE_ITEM_UP: &str = "moveItemUp";

/// Names under which list mutations are published to the method registry
pub const LIST_METHODS: [&str; 5] = [PUSH_ITEM, UNSHIFT_ITEM, REMOVE_ITEM, MOVE_ITEM_DOWN, MOVE_ITEM_UP];

/// Stable identity of a list item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The rendered half of a list entry
#[derive(Debug, Clone)]
pub struct ListItem {
    pub id: ItemId,
    /// Cached content; `None` until rendered or after invalidation
    rendered: Option<RenderNode>,
    /// How many times this item's content has been produced
    renders: u64,
}

impl ListItem {
    fn new(id: ItemId) -> Self {
        Self {
            id,
            rendered: None,
            renders: 0,
        }
    }

    pub fn rendered(&self) -> Option<&RenderNode> {
        self.rendered.as_ref()
    }

    pub fn render_count(&self) -> u64 {
        self.renders
    }
}

/// Ordered values paired 1:1 with rendered items
#[derive(Debug, Clone, Default)]
pub struct ListState {
    values: Vec<Value>,
    items: Vec<ListItem>,
    next_id: u64,
}

impl ListState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from an initial value; anything but an array starts empty
    pub fn from_value(value: &Value) -> Self {
        let mut state = Self::new();
        if let Value::Array(values) = value {
            for v in values {
                state.push_item(v.clone());
            }
        }
        state
    }

    fn mint(&mut self) -> ItemId {
        let id = ItemId(self.next_id);
        self.next_id += 1;
        id
    }

    fn check_index(&self, index: i64) -> Result<usize, BlockError> {
        let len = self.values.len();
        match usize::try_from(index) {
            Ok(position) if position < len => Ok(position),
            _ => Err(BlockError::IndexOutOfRange { index, len }),
        }
    }

    pub fn len(&self) -> usize {
        debug_assert!(self.is_aligned());
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Both halves have the same length
    pub fn is_aligned(&self) -> bool {
        self.values.len() == self.items.len()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn items(&self) -> &[ListItem] {
        &self.items
    }

    /// The list's value as a JSON array
    pub fn to_value(&self) -> Value {
        Value::Array(self.values.clone())
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Current ids, in order
    pub fn ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|item| item.id).collect()
    }

    /// Re-resolve a stable id to its current position
    pub fn position(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    /// Append to the end of both sequences
    pub fn push_item(&mut self, value: Value) -> ItemId {
        let id = self.mint();
        self.values.push(value);
        self.items.push(ListItem::new(id));
        id
    }

    /// Prepend; every existing index shifts up by one
    pub fn unshift_item(&mut self, value: Value) -> ItemId {
        let id = self.mint();
        self.values.insert(0, value);
        self.items.insert(0, ListItem::new(id));
        id
    }

    /// Remove the value and its paired item; later indices shift down by one
    pub fn remove_item(&mut self, index: i64) -> Result<Value, BlockError> {
        let index = self.check_index(index)?;
        self.items.remove(index);
        Ok(self.values.remove(index))
    }

    /// Swap with the predecessor
    ///
    /// # Returns
    /// `Ok(false)` when already first
    pub fn move_item_up(&mut self, index: i64) -> Result<bool, BlockError> {
        let index = self.check_index(index)?;
        if index == 0 {
            return Ok(false);
        }
        self.values.swap(index - 1, index);
        self.items.swap(index - 1, index);
        Ok(true)
    }

    /// Swap with the successor
    ///
    /// # Returns
    /// `Ok(false)` when already last
    pub fn move_item_down(&mut self, index: i64) -> Result<bool, BlockError> {
        let index = self.check_index(index)?;
        if index + 1 == self.values.len() {
            return Ok(false);
        }
        self.values.swap(index, index + 1);
        self.items.swap(index, index + 1);
        Ok(true)
    }

    /// Replace one value; only that item re-renders
    pub fn set_item_value(&mut self, index: i64, value: Value) -> Result<(), BlockError> {
        let index = self.check_index(index)?;
        if self.values[index] != value {
            self.values[index] = value;
            self.items[index].rendered = None;
        }
        Ok(())
    }

    /// Value an item's `field` child reads
    ///
    /// Object items expose their entry under `field`; any other item value is
    /// handed to every child as is. `None` when the item is gone.
    pub fn item_field(&self, id: ItemId, field: &str) -> Option<Value> {
        let value = self.position(id).map(|position| &self.values[position])?;
        Some(match value {
            Value::Object(fields) => fields.get(field).cloned().unwrap_or(Value::Null),
            other => other.clone(),
        })
    }

    /// Write an item's `field` child value; only that item re-renders
    ///
    /// Null items become an object holding the field, other non-object items
    /// are replaced whole. Returns `false` when the item is gone.
    pub fn set_item_field(&mut self, id: ItemId, field: &str, value: Value) -> bool {
        let Some(position) = self.position(id) else {
            return false;
        };
        let next = match &self.values[position] {
            Value::Object(fields) => {
                let mut fields = fields.clone();
                fields.insert(field.to_string(), value);
                Value::Object(fields)
            }
            Value::Null => {
                let mut fields = serde_json::Map::new();
                fields.insert(field.to_string(), value);
                Value::Object(fields)
            }
            _ => value,
        };
        if self.values[position] != next {
            self.values[position] = next;
            self.items[position].rendered = None;
        }
        true
    }

    /// Drop one item's cached render
    pub fn invalidate_item(&mut self, id: ItemId) {
        if let Some(position) = self.position(id) {
            self.items[position].rendered = None;
        }
    }

    /// Cache content rendered from `value` outside the lock
    ///
    /// Discarded when the item is gone or its value changed in the meantime.
    fn store_render(&mut self, id: ItemId, value: &Value, node: RenderNode) {
        if let Some(position) = self.position(id) {
            let item = &mut self.items[position];
            item.renders += 1;
            if &self.values[position] == value {
                item.rendered = Some(node);
            }
        }
    }

    /// Reconcile a wholesale replacement of the value collection
    ///
    /// Positions that survive keep their item id and cache (invalidated when
    /// the value differs); extra positions are dropped from the end and new
    /// ones appended with fresh ids.
    pub fn set_values(&mut self, values: Vec<Value>) {
        let keep = values.len().min(self.values.len());
        self.values.truncate(keep);
        self.items.truncate(keep);

        for (index, value) in values.into_iter().enumerate() {
            if index < keep {
                if self.values[index] != value {
                    self.values[index] = value;
                    self.items[index].rendered = None;
                }
            } else {
                self.push_item(value);
            }
        }
    }

    /// Drop every cached render, e.g. after the list's properties changed
    pub fn invalidate_all(&mut self) {
        for item in &mut self.items {
            item.rendered = None;
        }
    }

    /// Produce each item's content, rendering only items without a cached node
    ///
    /// `render` receives the current index, the item's stable id and its value.
    pub fn render_items<F>(&mut self, mut render: F) -> Vec<RenderNode>
    where
        F: FnMut(usize, ItemId, &Value) -> RenderNode,
    {
        let mut nodes = Vec::with_capacity(self.items.len());
        for (index, (item, value)) in self.items.iter_mut().zip(self.values.iter()).enumerate() {
            let node = match &item.rendered {
                Some(node) => node.clone(),
                None => {
                    let node = render(index, item.id, value);
                    item.rendered = Some(node.clone());
                    item.renders += 1;
                    node
                }
            };
            nodes.push(node);
        }
        nodes
    }
}

/// Shared handle to a list block's state
#[derive(Clone, Default)]
pub struct ListHandle(Arc<Mutex<ListState>>);

impl ListHandle {
    pub fn new(state: ListState) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    /// Run `f` with exclusive access to the state
    pub fn with<R>(&self, f: impl FnOnce(&mut ListState) -> R) -> R {
        f(&mut self.0.lock())
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_value(&self) -> Value {
        self.0.lock().to_value()
    }

    pub fn values(&self) -> Vec<Value> {
        self.0.lock().values().to_vec()
    }

    /// [`ListState::render_items`] without holding the lock while `render` runs
    ///
    /// Item content may read the list (its children's values live there), so
    /// the state is snapshotted first and fresh renders are cached afterwards.
    pub fn render_items<F>(&self, mut render: F) -> Vec<RenderNode>
    where
        F: FnMut(usize, ItemId, &Value) -> RenderNode,
    {
        let snapshot: Vec<(ItemId, Value, Option<RenderNode>)> = self.with(|state| {
            state
                .items
                .iter()
                .zip(state.values.iter())
                .map(|(item, value)| (item.id, value.clone(), item.rendered.clone()))
                .collect()
        });

        let mut fresh = Vec::new();
        let mut nodes = Vec::with_capacity(snapshot.len());
        for (index, (id, value, cached)) in snapshot.into_iter().enumerate() {
            let node = match cached {
                Some(node) => node,
                None => {
                    let node = render(index, id, &value);
                    fresh.push((id, value, node.clone()));
                    node
                }
            };
            nodes.push(node);
        }

        if !fresh.is_empty() {
            self.with(|state| {
                for (id, value, node) in fresh {
                    state.store_render(id, &value, node);
                }
            });
        }
        nodes
    }
}
