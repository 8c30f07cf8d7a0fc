//! Deferred effects run after the next render commit
//!
//! A block schedules a callback through a [`RunAfterUpdate`] slot while
//! handling an interaction. The runtime flushes pending callbacks right after
//! it commits the next frame, so the callback observes the freshly committed
//! widgets. Used to reapply transient widget state (caret position) that a
//! value-driven re-render would otherwise clobber.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error};

use super::BlockId;

type Effect = Box<dyn FnOnce() + Send>;

/// What happens when a slot is rescheduled before its callback fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EffectPolicy {
    /// The newer callback replaces the pending one (last caller wins)
    #[default]
    Replace,
    /// Every callback runs, in schedule order
    Queue,
}

/// Identifies one scheduling site: a block and a slot name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub block_id: BlockId,
    pub slot: String,
}

struct Pending {
    key: SlotKey,
    sequence: u64,
    effect: Effect,
}

#[derive(Default)]
struct EffectsInner {
    pending: Vec<Pending>,
    next_sequence: u64,
}

/// Summary of one flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub ran: usize,
    pub panicked: usize,
}

/// Post-commit callback queue
#[derive(Clone)]
pub struct DeferredEffects {
    inner: Arc<Mutex<EffectsInner>>,
    policy: EffectPolicy,
}

impl DeferredEffects {
    pub fn new(policy: EffectPolicy) -> Self {
        Self {
            inner: Arc::new(Mutex::new(EffectsInner::default())),
            policy,
        }
    }

    pub fn policy(&self) -> EffectPolicy {
        self.policy
    }

    /// Handle for one scheduling site
    pub fn slot(&self, block_id: &BlockId, slot: impl Into<String>) -> RunAfterUpdate {
        RunAfterUpdate {
            effects: self.clone(),
            key: SlotKey {
                block_id: block_id.clone(),
                slot: slot.into(),
            },
        }
    }

    fn schedule(&self, key: SlotKey, effect: Effect) {
        let mut inner = self.inner.lock();
        if self.policy == EffectPolicy::Replace {
            inner.pending.retain(|p| p.key != key);
        }
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner.pending.push(Pending {
            key,
            sequence,
            effect,
        });
    }

    /// Number of callbacks waiting for the next commit
    pub fn pending(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Drop every pending callback of a block
    pub fn cancel_block(&self, block_id: &BlockId) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.pending.len();
        inner.pending.retain(|p| &p.key.block_id != block_id);
        before - inner.pending.len()
    }

    /// Run everything scheduled before this call, once, in schedule order
    ///
    /// Called by the runtime after a frame is committed. The pending set is
    /// taken out of the lock first: callbacks scheduled while flushing wait
    /// for the next commit, and a panicking callback is contained and counted.
    pub fn flush(&self) -> FlushReport {
        let mut batch = std::mem::take(&mut self.inner.lock().pending);
        batch.sort_by_key(|p| p.sequence);

        let mut report = FlushReport::default();
        for pending in batch {
            let key = pending.key;
            match panic::catch_unwind(AssertUnwindSafe(pending.effect)) {
                Ok(()) => report.ran += 1,
                Err(_) => {
                    report.panicked += 1;
                    error!(block_id = %key.block_id, slot = %key.slot, "deferred effect panicked");
                }
            }
        }
        if report.ran + report.panicked > 0 {
            debug!(ran = report.ran, panicked = report.panicked, "deferred effects flushed");
        }
        report
    }
}

impl Default for DeferredEffects {
    fn default() -> Self {
        Self::new(EffectPolicy::default())
    }
}

/// Scheduling handle for one slot
#[derive(Clone)]
pub struct RunAfterUpdate {
    effects: DeferredEffects,
    key: SlotKey,
}

impl RunAfterUpdate {
    /// Run `f` exactly once after the next commit
    pub fn run_after_update(&self, f: impl FnOnce() + Send + 'static) {
        self.effects.schedule(self.key.clone(), Box::new(f));
    }

    pub fn key(&self) -> &SlotKey {
        &self.key
    }
}
