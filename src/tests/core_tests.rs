//! Façade, registry lifecycle and list method tests
//!
//! These go through a mounted runtime rather than the bare components, to
//! check that the pieces are wired together the way blocks see them.

use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::support::{harness, harness_with, id, pipeline, RecordingResolver};
use crate::config::RuntimeConfig;
use crate::core::block::{BlockDescriptor, BlockError};
use crate::core::event::{Event, Triggered};
use crate::core::registry::{ArgShape, Method, Registration, RegistryError};
use crate::core::Properties;

fn todo_list(values: Value) -> BlockDescriptor {
    BlockDescriptor::new("todos", "List")
        .with_value(values)
        .with_block(BlockDescriptor::new("title", "TextArea"))
}

// ── Registration ───────────────────────────────────────────────────────────

#[test]
fn test_list_registers_its_methods_at_mount() {
    let h = harness();
    h.runtime.mount(todo_list(json!([]))).unwrap();
    assert_eq!(
        h.runtime.method_names(&id("todos")),
        vec!["moveItemDown", "moveItemUp", "pushItem", "removeItem", "unshiftItem"]
    );
}

#[test]
fn test_register_twice_keeps_latest() {
    let h = harness();
    h.runtime.mount(BlockDescriptor::new("box", "Box")).unwrap();
    let methods = h.runtime.methods(&id("box")).unwrap();

    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let (a, b) = (first.clone(), second.clone());
    let outcome = methods
        .register_method(
            "ping",
            Method::new(ArgShape::Any, move |_| {
                a.fetch_add(1, Ordering::SeqCst);
                Ok(json!("first"))
            }),
        )
        .unwrap();
    assert_eq!(outcome, Registration::Added);
    let outcome = methods
        .register_method(
            "ping",
            Method::new(ArgShape::Any, move |_| {
                b.fetch_add(1, Ordering::SeqCst);
                Ok(json!("second"))
            }),
        )
        .unwrap();
    assert_eq!(outcome, Registration::Replaced);

    assert_eq!(h.runtime.invoke(&id("box"), "ping", Value::Null).unwrap(), json!("second"));
    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 1);
}

#[test]
fn test_missing_method() {
    let h = harness();
    h.runtime.mount(BlockDescriptor::new("box", "Box")).unwrap();
    let err = h.runtime.invoke(&id("box"), "open", Value::Null).unwrap_err();
    assert!(matches!(err, RegistryError::MethodNotFound { method, .. } if method == "open"));
}

// ── Lifecycle ───────────────────────────────────────────────────────────────

#[test]
fn test_invoke_after_unmount_is_stale() {
    let h = harness();
    h.runtime.mount(todo_list(json!(["a"]))).unwrap();
    h.runtime.unmount(&id("todos")).unwrap();

    let err = h.runtime.invoke(&id("todos"), "pushItem", json!("b")).unwrap_err();
    assert!(matches!(err, RegistryError::StaleRegistration { .. }));
}

#[test]
fn test_lenient_lifecycle_reports_missing_method() {
    let h = harness_with(
        RuntimeConfig::new().with_strict_lifecycle(false),
        RecordingResolver::default(),
    );
    h.runtime.mount(todo_list(json!([]))).unwrap();
    h.runtime.unmount(&id("todos")).unwrap();

    let err = h.runtime.invoke(&id("todos"), "pushItem", json!("b")).unwrap_err();
    assert!(matches!(err, RegistryError::MethodNotFound { .. }));
}

#[test]
fn test_facade_outliving_its_instance() {
    let h = harness();
    h.runtime.mount(BlockDescriptor::new("notes", "TextArea")).unwrap();
    let old = h.runtime.methods(&id("notes")).unwrap();
    assert!(old.is_current());

    h.runtime.unmount(&id("notes")).unwrap();
    h.runtime.mount(BlockDescriptor::new("notes", "TextArea")).unwrap();
    let new = h.runtime.methods(&id("notes")).unwrap();

    assert!(!old.is_current());
    assert_ne!(old.instance(), new.instance());
    assert_eq!(old.set_value(json!("late")), Err(BlockError::StaleInstance(id("notes"))));
    let stale = old.register_method("ping", Method::new(ArgShape::Any, |_| Ok(Value::Null)));
    assert_eq!(stale, Err(BlockError::StaleInstance(id("notes"))));

    new.set_value(json!("fresh")).unwrap();
    assert_eq!(h.runtime.value(&id("notes")).unwrap(), json!("fresh"));
}

#[test]
fn test_facade_after_runtime_dropped() {
    let h = harness();
    h.runtime.mount(BlockDescriptor::new("notes", "TextArea")).unwrap();
    let methods = h.runtime.methods(&id("notes")).unwrap();
    drop(h);
    assert_eq!(methods.value(), Err(BlockError::RuntimeDropped));
}

#[test]
fn test_remount_gets_a_fresh_method_table() {
    let h = harness();
    h.runtime.mount(todo_list(json!([]))).unwrap();
    h.runtime.unmount(&id("todos")).unwrap();
    h.runtime.mount(todo_list(json!(["x"]))).unwrap();

    h.runtime.invoke(&id("todos"), "pushItem", json!("y")).unwrap();
    assert_eq!(h.runtime.value(&id("todos")).unwrap(), json!(["x", "y"]));
}

// ── Façade ──────────────────────────────────────────────────────────────────

#[test]
fn test_trigger_event_only_queues_configured_events() {
    let h = harness();
    h.runtime
        .mount(BlockDescriptor::new("notes", "TextArea").with_event("onChange", pipeline("a1")))
        .unwrap();
    let methods = h.runtime.methods(&id("notes")).unwrap();

    assert_eq!(methods.trigger_event(Event::new("onChange")).unwrap(), Triggered::Queued);
    assert_eq!(methods.trigger_event(Event::new("onBlur")).unwrap(), Triggered::Unhandled);
    assert_eq!(h.runtime.dispatcher().pending(), 1);
}

#[test]
fn test_properties_follow_updates() {
    let h = harness();
    h.runtime
        .mount(
            BlockDescriptor::new("notes", "TextArea")
                .with_properties(Properties::new().with("title", "Notes")),
        )
        .unwrap();
    let methods = h.runtime.methods(&id("notes")).unwrap();
    assert_eq!(methods.properties().unwrap().get_str("title"), Some("Notes"));

    h.runtime
        .update(
            &id("notes"),
            crate::runtime::BlockUpdate::new()
                .with_properties(Properties::new().with("title", "Comments")),
        )
        .unwrap();
    assert_eq!(methods.properties().unwrap().get_str("title"), Some("Comments"));
}

#[test]
fn test_list_accessor_on_non_list() {
    let h = harness();
    h.runtime.mount(BlockDescriptor::new("box", "Box")).unwrap();
    let methods = h.runtime.methods(&id("box")).unwrap();
    assert!(matches!(methods.list(), Err(BlockError::NotAList(_))));
    assert!(methods.list_methods().is_err());
}

#[test]
fn test_cross_block_invoke_through_facade() {
    let h = harness();
    h.runtime
        .mount(
            BlockDescriptor::new("page", "Box")
                .with_block(BlockDescriptor::new("notes", "TextArea"))
                .with_block(todo_list(json!([]))),
        )
        .unwrap();
    let notes = h.runtime.methods(&id("notes")).unwrap();
    notes.invoke(&id("todos"), "pushItem", json!("from notes")).unwrap();
    assert_eq!(h.runtime.value(&id("todos")).unwrap(), json!(["from notes"]));
}

// ── List methods ────────────────────────────────────────────────────────────

#[test]
fn test_list_methods_through_registry() {
    let h = harness();
    h.runtime.mount(todo_list(json!(["A", "B", "C"]))).unwrap();
    let todos = id("todos");

    h.runtime.invoke(&todos, "moveItemUp", json!(2)).unwrap();
    assert_eq!(h.runtime.value(&todos).unwrap(), json!(["A", "C", "B"]));

    h.runtime.invoke(&todos, "moveItemDown", json!({ "index": 0 })).unwrap();
    assert_eq!(h.runtime.value(&todos).unwrap(), json!(["C", "A", "B"]));

    h.runtime.invoke(&todos, "unshiftItem", json!("Z")).unwrap();
    let removed = h.runtime.invoke(&todos, "removeItem", json!(1)).unwrap();
    assert_eq!(removed, json!("C"));
    assert_eq!(h.runtime.value(&todos).unwrap(), json!(["Z", "A", "B"]));
}

#[test]
fn test_list_boundary_moves_are_noops() {
    let h = harness();
    h.runtime.mount(todo_list(json!(["A", "B"]))).unwrap();
    let todos = id("todos");
    assert_eq!(h.runtime.invoke(&todos, "moveItemUp", json!(0)).unwrap(), json!(false));
    assert_eq!(h.runtime.invoke(&todos, "moveItemDown", json!(1)).unwrap(), json!(false));
    assert_eq!(h.runtime.value(&todos).unwrap(), json!(["A", "B"]));
}

#[test]
fn test_remove_out_of_range_leaves_state() {
    let h = harness();
    h.runtime.mount(todo_list(json!(["A", "B", "C"]))).unwrap();
    let todos = id("todos");

    for index in [3, -1] {
        let err = h.runtime.invoke(&todos, "removeItem", json!(index)).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Block(BlockError::IndexOutOfRange { len: 3, .. })
        ));
    }
    assert_eq!(h.runtime.value(&todos).unwrap(), json!(["A", "B", "C"]));
    assert!(h.runtime.list(&todos).unwrap().with(|state| state.is_aligned()));
}

#[test]
fn test_list_argument_shapes() {
    let h = harness();
    h.runtime.mount(todo_list(json!(["A"]))).unwrap();
    let err = h.runtime.invoke(&id("todos"), "removeItem", json!("first")).unwrap_err();
    assert!(matches!(err, RegistryError::Block(BlockError::InvalidArguments(_))));
}

#[test]
fn test_list_value_replacement() {
    let h = harness();
    h.runtime.mount(todo_list(json!(["A", "B"]))).unwrap();
    let todos = id("todos");
    let ids_before = h.runtime.list(&todos).unwrap().with(|state| state.ids());

    h.runtime.set_value(&todos, json!(["A", "b", "C"])).unwrap();
    let list = h.runtime.list(&todos).unwrap();
    assert_eq!(list.values(), vec![json!("A"), json!("b"), json!("C")]);
    assert_eq!(list.with(|state| state.ids())[..2], ids_before[..]);

    assert!(h.runtime.set_value(&todos, json!("nope")).is_err());
    assert_eq!(list.len(), 3);
}
