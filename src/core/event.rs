//! Event dispatch
//!
//! A block reports a named occurrence ("onChange", "onOk", ...) through the
//! [`EventDispatcher`]. The dispatcher resolves the name against the block's
//! declarative `events` configuration and queues the configured action
//! pipeline; the host's [`ActionResolver`] runs it later. Triggers are
//! delivered in the order they were raised and are never coalesced.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::BlockId;

/// A named occurrence raised by a block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Value::Null,
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }
}

/// One step of an action pipeline, as configured on a block's event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    /// Author-chosen id of the action step
    pub id: String,
    /// Action type understood by the host, e.g. "CallMethod"
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl ActionSpec {
    pub fn new(id: impl Into<String>, action_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            action_type: action_type.into(),
            params: Value::Null,
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }
}

/// A resolved trigger waiting for the action resolver
#[derive(Debug, Clone, PartialEq)]
pub struct ActionCall {
    pub block_id: BlockId,
    pub event: Event,
    pub actions: Vec<ActionSpec>,
    /// Position in the global trigger order
    pub sequence: u64,
}

/// Host capability that runs action pipelines
#[async_trait]
pub trait ActionResolver: Send + Sync {
    /// Run the actions configured for one trigger
    async fn run(&self, call: ActionCall) -> anyhow::Result<()>;
}

/// Resolver that accepts every call and does nothing
pub struct NoopResolver;

#[async_trait]
impl ActionResolver for NoopResolver {
    async fn run(&self, call: ActionCall) -> anyhow::Result<()> {
        trace!(block_id = %call.block_id, event = %call.event.name, "no resolver; dropping call");
        Ok(())
    }
}

/// Result of a trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Triggered {
    /// Actions were configured and the call was queued
    Queued,
    /// No actions are configured for the event name
    Unhandled,
}

/// Summary of one dispatch pass
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Calls delivered to the resolver
    pub delivered: usize,
    /// Calls whose pipeline failed, with the error message
    pub failures: Vec<(BlockId, String, String)>,
}

impl DispatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Default)]
struct DispatchQueue {
    pending: VecDeque<ActionCall>,
    next_sequence: u64,
}

/// FIFO of resolved triggers shared by every block façade
#[derive(Clone)]
pub struct EventDispatcher {
    queue: Arc<Mutex<DispatchQueue>>,
    resolver: Arc<dyn ActionResolver>,
}

impl EventDispatcher {
    pub fn new(resolver: Arc<dyn ActionResolver>) -> Self {
        Self {
            queue: Arc::new(Mutex::new(DispatchQueue::default())),
            resolver,
        }
    }

    /// Resolve `event` against a block's events configuration
    ///
    /// Unhandled names are a no-op. Returns without waiting for the pipeline.
    pub fn trigger(
        &self,
        block_id: &BlockId,
        events: &HashMap<String, Vec<ActionSpec>>,
        event: Event,
    ) -> Triggered {
        let actions = match events.get(&event.name) {
            Some(actions) if !actions.is_empty() => actions.clone(),
            _ => {
                trace!(block_id = %block_id, event = %event.name, "event unhandled");
                return Triggered::Unhandled;
            }
        };

        let mut queue = self.queue.lock();
        let sequence = queue.next_sequence;
        queue.next_sequence += 1;
        debug!(block_id = %block_id, event = %event.name, sequence, "event queued");
        queue.pending.push_back(ActionCall {
            block_id: block_id.clone(),
            event,
            actions,
            sequence,
        });
        Triggered::Queued
    }

    /// Number of queued calls
    pub fn pending(&self) -> usize {
        self.queue.lock().pending.len()
    }

    /// Drop queued calls raised by a block
    pub fn discard_block(&self, block_id: &BlockId) -> usize {
        let mut queue = self.queue.lock();
        let before = queue.pending.len();
        queue.pending.retain(|call| &call.block_id != block_id);
        before - queue.pending.len()
    }

    /// Deliver queued calls to the resolver, oldest first
    ///
    /// Calls queued while the pass is running are delivered in the same pass,
    /// after everything queued before them. A failing pipeline is logged and
    /// recorded; the remaining calls still run.
    pub async fn dispatch_pending(&self) -> DispatchReport {
        let mut report = DispatchReport::default();
        loop {
            let next = self.queue.lock().pending.pop_front();
            let Some(call) = next else { break };

            let block_id = call.block_id.clone();
            let event_name = call.event.name.clone();
            report.delivered += 1;
            if let Err(err) = self.resolver.run(call).await {
                warn!(block_id = %block_id, event = %event_name, error = %err, "action pipeline failed");
                report.failures.push((block_id, event_name, err.to_string()));
            }
        }
        report
    }
}
