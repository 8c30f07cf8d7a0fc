//! Shared test fixtures

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::config::RuntimeConfig;
use crate::core::event::{ActionCall, ActionResolver, ActionSpec};
use crate::core::surface::HeadlessSurface;
use crate::core::BlockId;
use crate::runtime::BlockRuntime;

/// Resolver that records every call it receives
#[derive(Default)]
pub struct RecordingResolver {
    calls: Mutex<Vec<ActionCall>>,
    fail_on: Option<String>,
}

impl RecordingResolver {
    /// Fails every pipeline of the named event
    pub fn failing_on(event: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_on: Some(event.to_string()),
        }
    }

    pub fn calls(&self) -> Vec<ActionCall> {
        self.calls.lock().clone()
    }

    /// `(block id, event name)` of every call, in delivery order
    pub fn events(&self) -> Vec<(String, String)> {
        self.calls
            .lock()
            .iter()
            .map(|call| (call.block_id.to_string(), call.event.name.clone()))
            .collect()
    }

    pub fn count(&self, block_id: &str, event: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.block_id.as_str() == block_id && call.event.name == event)
            .count()
    }
}

#[async_trait]
impl ActionResolver for RecordingResolver {
    async fn run(&self, call: ActionCall) -> anyhow::Result<()> {
        let fails = self.fail_on.as_deref() == Some(call.event.name.as_str());
        self.calls.lock().push(call);
        if fails {
            anyhow::bail!("pipeline failed");
        }
        Ok(())
    }
}

/// A runtime wired to a headless surface and a recording resolver
pub struct Harness {
    pub runtime: BlockRuntime,
    pub surface: HeadlessSurface,
    pub resolver: Arc<RecordingResolver>,
}

pub fn harness() -> Harness {
    harness_with(RuntimeConfig::default(), RecordingResolver::default())
}

pub fn harness_with(config: RuntimeConfig, resolver: RecordingResolver) -> Harness {
    let surface = HeadlessSurface::new();
    let resolver = Arc::new(resolver);
    let runtime = BlockRuntime::new(config, Arc::new(surface.clone()), resolver.clone());
    Harness {
        runtime,
        surface,
        resolver,
    }
}

pub fn id(block_id: &str) -> BlockId {
    BlockId::from(block_id)
}

/// A one-step action pipeline
pub fn pipeline(action_id: &str) -> Vec<ActionSpec> {
    vec![ActionSpec::new(action_id, "SetState")]
}
