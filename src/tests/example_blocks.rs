//! Example block implementations
//!
//! A custom block type written only against the public API: it keeps its
//! state in the block value, publishes methods through the registry, raises
//! events, and wraps its nested content.

use serde_json::{json, Value};
use std::sync::Arc;

use super::support::{harness, id, pipeline};
use crate::blocks::{BlockCatalog, BlockType};
use crate::config::RuntimeConfig;
use crate::core::block::{Block, BlockDescriptor, BlockError, BlockProps, Interaction};
use crate::core::event::{Event, NoopResolver};
use crate::core::node::{Content, RenderNode};
use crate::core::registry::{ArgShape, Method};
use crate::core::surface::HeadlessSurface;
use crate::runtime::{BlockMethods, BlockRuntime};

// ============================================================================
// Counter: value-backed state with methods and events
// ============================================================================

/// Counts presses; `increment` and `reset` are callable through the registry
struct CounterBlock;

impl CounterBlock {
    fn current(methods: &BlockMethods) -> Result<i64, BlockError> {
        Ok(methods.value()?.as_i64().unwrap_or(0))
    }

    fn bump(methods: &BlockMethods, by: i64) -> Result<Value, BlockError> {
        let next = Self::current(methods)? + by;
        methods.set_value(json!(next))?;
        methods.trigger_event(Event::new("onIncrement").with_params(json!({ "count": next })))?;
        Ok(json!(next))
    }
}

impl Block for CounterBlock {
    fn block_type(&self) -> BlockType {
        BlockType::Custom("Counter".to_string())
    }

    fn render(&self, props: &BlockProps<'_>, content: &Content<'_>) -> RenderNode {
        let label = props.properties.get_str("label").unwrap_or("Count");
        RenderNode::new("Counter")
            .with_id(props.block_id.as_str())
            .with_prop("label", label)
            .with_prop("count", props.value.as_i64().unwrap_or(0))
            .with_children(content.render())
    }

    fn on_mount(&self, methods: &BlockMethods) -> Result<(), BlockError> {
        let owner = methods.clone();
        methods.register_method(
            "increment",
            Method::new(ArgShape::Options, move |args| {
                let by = args.get("by").and_then(Value::as_i64).unwrap_or(1);
                Self::bump(&owner, by)
            }),
        )?;
        let owner = methods.clone();
        methods.register_method(
            "reset",
            Method::new(ArgShape::Any, move |_| {
                owner.set_value(json!(0))?;
                Ok(json!(0))
            }),
        )?;
        Ok(())
    }

    fn on_interaction(&self, interaction: Interaction, methods: &BlockMethods) -> Result<(), BlockError> {
        if interaction == Interaction::PressEnter {
            Self::bump(methods, 1)?;
        }
        Ok(())
    }
}

fn counter_runtime() -> (BlockRuntime, HeadlessSurface) {
    let catalog = BlockCatalog::with_builtin();
    catalog
        .register("Counter", |_| Arc::new(CounterBlock) as Arc<dyn Block>)
        .unwrap();
    let surface = HeadlessSurface::new();
    let runtime = BlockRuntime::with_catalog(
        RuntimeConfig::default(),
        catalog,
        Arc::new(surface.clone()),
        Arc::new(NoopResolver),
    );
    (runtime, surface)
}

#[test]
fn test_counter_methods() {
    let (runtime, _) = counter_runtime();
    runtime
        .mount(BlockDescriptor::new("clicks", "Counter").with_value(json!(5)))
        .unwrap();

    assert_eq!(runtime.invoke(&id("clicks"), "increment", Value::Null).unwrap(), json!(6));
    assert_eq!(
        runtime.invoke(&id("clicks"), "increment", json!({ "by": 10 })).unwrap(),
        json!(16)
    );
    runtime.invoke(&id("clicks"), "reset", Value::Null).unwrap();
    assert_eq!(runtime.value(&id("clicks")).unwrap(), json!(0));
}

#[test]
fn test_counter_renders_nested_content() {
    let (runtime, surface) = counter_runtime();
    runtime
        .mount(
            BlockDescriptor::new("clicks", "Counter")
                .with_properties(crate::core::Properties::new().with("label", "Clicks"))
                .with_block(BlockDescriptor::new("note", "TextArea")),
        )
        .unwrap();
    runtime.interact(&id("clicks"), Interaction::PressEnter).unwrap();

    let frame = runtime.render();
    let counter = frame.find("clicks").unwrap();
    assert_eq!(counter.prop("label"), Some(&json!("Clicks")));
    assert_eq!(counter.prop("count"), Some(&json!(1)));
    assert!(counter.find("note_input").is_some());
    assert!(surface.widget("note_input").is_some());
}

#[tokio::test]
async fn test_counter_events_reach_the_resolver() {
    let h = harness();
    h.runtime
        .catalog()
        .register("Counter", |_| Arc::new(CounterBlock) as Arc<dyn Block>)
        .unwrap();
    h.runtime
        .mount(BlockDescriptor::new("clicks", "Counter").with_event("onIncrement", pipeline("log")))
        .unwrap();

    h.runtime.handle(&id("clicks"), Interaction::PressEnter).await.unwrap();
    h.runtime.invoke(&id("clicks"), "increment", Value::Null).unwrap();
    h.runtime.dispatch_events().await;

    let params: Vec<Value> = h.resolver.calls().iter().map(|c| c.event.params.clone()).collect();
    assert_eq!(params, vec![json!({ "count": 1 }), json!({ "count": 2 })]);
}

#[test]
fn test_counter_type_name() {
    assert_eq!(CounterBlock.block_type().to_string(), "Counter");
    assert!(!CounterBlock.block_type().is_builtin());
}
