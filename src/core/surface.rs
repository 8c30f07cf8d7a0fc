//! Presentation layer boundary
//!
//! The runtime never draws anything itself. It commits frames to a
//! [`Surface`], asks it to show modal dialogs, and reaches widgets through
//! [`WidgetHandle`]s that resolve by id at call time, so a handle captured
//! before a render always addresses the widget committed after it.
//!
//! [`HeadlessSurface`] is an in-memory surface that behaves like a controlled
//! input layer: when a commit changes a widget's value the widget is recreated
//! and its caret jumps to the end of the new text. It keeps only a short
//! history of committed frames and forgets dialogs once they are closed.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::trace;

use super::block::Selection;
use super::node::{Frame, RenderNode};

/// Identifies one modal dialog shown by a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModalId(pub u64);

impl fmt::Display for ModalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "modal-{}", self.0)
    }
}

/// A modal dialog to present
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalRequest {
    /// Widget id of the dialog
    pub id: String,
    /// Dialog kind, e.g. "confirm", "info", "warning"
    pub kind: String,
    /// Dialog configuration (title, content, button texts, ...)
    pub props: Map<String, Value>,
}

/// Opaque presentation capability consumed by the runtime
pub trait Surface: Send + Sync {
    /// Present a committed frame
    fn commit(&self, frame: &Frame);

    /// Apply a selection range to the widget currently committed under `widget_id`
    ///
    /// # Returns
    /// `false` when no such widget is committed
    fn set_selection_range(&self, widget_id: &str, selection: Selection) -> bool;

    /// Current selection of a widget, if it has one
    fn selection(&self, widget_id: &str) -> Option<Selection>;

    /// Present a modal dialog; the host later reports its outcome by id
    fn show_modal(&self, request: ModalRequest) -> ModalId;

    /// Dismiss a dialog whose outcome has been handled
    fn close_modal(&self, _modal: ModalId) {}
}

/// A widget addressed by id through a surface
#[derive(Clone)]
pub struct WidgetHandle {
    id: String,
    surface: Arc<dyn Surface>,
}

impl WidgetHandle {
    pub fn new(id: impl Into<String>, surface: Arc<dyn Surface>) -> Self {
        Self {
            id: id.into(),
            surface,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_selection_range(&self, start: usize, end: usize) -> bool {
        self.surface
            .set_selection_range(&self.id, Selection::new(start, end))
    }

    pub fn selection(&self) -> Option<Selection> {
        self.surface.selection(&self.id)
    }
}

impl fmt::Debug for WidgetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetHandle").field("id", &self.id).finish()
    }
}

/// Turns a style configuration into a class name
pub trait CssClassGenerator: Send + Sync {
    /// `null` or empty styles yield an empty class name
    fn make_css_class(&self, style: &Value) -> String;
}

/// Deterministic class names derived from a hash of the style object
#[derive(Debug, Clone)]
pub struct HashedCssClasses {
    prefix: String,
}

impl HashedCssClasses {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for HashedCssClasses {
    fn default() -> Self {
        Self::new("lf")
    }
}

impl CssClassGenerator for HashedCssClasses {
    fn make_css_class(&self, style: &Value) -> String {
        let empty = match style {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            Value::Array(list) => list.is_empty(),
            _ => false,
        };
        if empty {
            return String::new();
        }
        // serde_json keeps object keys sorted, so equal styles hash equally
        let mut hasher = DefaultHasher::new();
        style.to_string().hash(&mut hasher);
        format!("{}-{:x}", self.prefix, hasher.finish())
    }
}

/// A widget as currently committed on the headless surface
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedWidget {
    pub widget: String,
    /// Increments each time the widget is recreated
    pub serial: u64,
    pub value: Value,
    pub selection: Option<Selection>,
    pub props: Map<String, Value>,
}

/// Frames a [`HeadlessSurface`] retains unless told otherwise
pub const DEFAULT_FRAME_HISTORY: usize = 8;

struct HeadlessState {
    widgets: HashMap<String, CommittedWidget>,
    /// Most recent frames, oldest first
    history: VecDeque<Frame>,
    history_limit: usize,
    committed: usize,
    /// Dialogs shown and not yet closed
    modals: Vec<(ModalId, ModalRequest)>,
    next_serial: u64,
    next_modal: u64,
}

/// In-memory surface for tests and host-less embedding
#[derive(Clone)]
pub struct HeadlessSurface {
    state: Arc<RwLock<HeadlessState>>,
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self::with_history_limit(DEFAULT_FRAME_HISTORY)
    }
}

fn text_len(value: &Value) -> usize {
    value.as_str().map(|s| s.chars().count()).unwrap_or(0)
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Surface retaining at most `limit` committed frames; at least the last
    /// one is always kept
    pub fn with_history_limit(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            state: Arc::new(RwLock::new(HeadlessState {
                widgets: HashMap::new(),
                history: VecDeque::with_capacity(limit),
                history_limit: limit,
                committed: 0,
                modals: Vec::new(),
                next_serial: 0,
                next_modal: 0,
            })),
        }
    }

    pub fn widget(&self, id: &str) -> Option<CommittedWidget> {
        self.state.read().widgets.get(id).cloned()
    }

    /// Frames committed over the surface's lifetime
    pub fn frame_count(&self) -> usize {
        self.state.read().committed
    }

    pub fn last_frame(&self) -> Option<Frame> {
        self.state.read().history.back().cloned()
    }

    /// Retained frames, oldest first
    pub fn frames(&self) -> Vec<Frame> {
        self.state.read().history.iter().cloned().collect()
    }

    /// Dialogs still open, oldest first
    pub fn modals(&self) -> Vec<(ModalId, ModalRequest)> {
        self.state.read().modals.clone()
    }

    /// Simulate the user placing the caret
    pub fn place_caret(&self, id: &str, selection: Selection) -> bool {
        self.set_selection_range(id, selection)
    }
}

impl Surface for HeadlessSurface {
    fn commit(&self, frame: &Frame) {
        let mut state = self.state.write();
        let mut seen: Vec<(String, RenderNode)> = Vec::new();
        for root in &frame.roots {
            root.walk(&mut |node| {
                if let Some(id) = &node.id {
                    seen.push((id.clone(), node.clone()));
                }
            });
        }

        let mut next: HashMap<String, CommittedWidget> = HashMap::with_capacity(seen.len());
        for (id, node) in seen {
            let value = node.prop("value").cloned().unwrap_or(Value::Null);
            let previous = state.widgets.remove(&id);
            let widget = match previous {
                Some(mut existing) if existing.widget == node.widget && existing.value == value => {
                    existing.props = node.props.clone();
                    existing
                }
                Some(existing) if existing.widget == node.widget => {
                    // controlled input re-created with a new value: caret jumps to the end
                    state.next_serial += 1;
                    let end = text_len(&value);
                    CommittedWidget {
                        widget: node.widget.clone(),
                        serial: state.next_serial,
                        selection: existing.selection.map(|_| Selection::caret(end)),
                        value,
                        props: node.props.clone(),
                    }
                }
                _ => {
                    state.next_serial += 1;
                    CommittedWidget {
                        widget: node.widget.clone(),
                        serial: state.next_serial,
                        selection: None,
                        value,
                        props: node.props.clone(),
                    }
                }
            };
            next.insert(id, widget);
        }

        state.widgets = next;
        if state.history.len() == state.history_limit {
            state.history.pop_front();
        }
        state.history.push_back(frame.clone());
        state.committed += 1;
        trace!(generation = frame.generation, widgets = state.widgets.len(), "headless commit");
    }

    fn set_selection_range(&self, widget_id: &str, selection: Selection) -> bool {
        let mut state = self.state.write();
        match state.widgets.get_mut(widget_id) {
            Some(widget) => {
                let len = text_len(&widget.value);
                widget.selection = Some(Selection::new(selection.start.min(len), selection.end.min(len)));
                true
            }
            None => false,
        }
    }

    fn selection(&self, widget_id: &str) -> Option<Selection> {
        self.state
            .read()
            .widgets
            .get(widget_id)
            .and_then(|w| w.selection)
    }

    fn show_modal(&self, request: ModalRequest) -> ModalId {
        let mut state = self.state.write();
        state.next_modal += 1;
        let id = ModalId(state.next_modal);
        state.modals.push((id, request));
        id
    }

    fn close_modal(&self, modal: ModalId) {
        self.state.write().modals.retain(|(id, _)| *id != modal);
    }
}
