//! Tests for path aliasing and method/wildcard observer matching.

use ripple_store::{PropertyConfig, Store, StoreError, Value};
use serde_json::json;
use std::sync::{Arc, Mutex};

type Log = Arc<Mutex<Vec<(String, Value)>>>;

fn recording_store(log: &Log) -> Store {
    let observer_log = log.clone();
    Store::builder()
        .property("x", PropertyConfig::new().observer("_changed"))
        .property("y", PropertyConfig::new().observer("_changed"))
        .method("_changed", move |_, args| {
            observer_log
                .lock()
                .unwrap()
                .push((args[2].as_str().unwrap().to_owned(), args[0].clone()));
            None
        })
        .build()
        .unwrap()
}

fn changed_keys(log: &Log) -> Vec<String> {
    log.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
}

fn clear(log: &Log) {
    log.lock().unwrap().clear();
}

// ============================================================================
// Linked paths
// ============================================================================

#[test]
fn test_linked_paths_mirror_both_directions() -> Result<(), StoreError> {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let mut store = recording_store(&log);
    store.ready()?;
    store.set("x", json!({"sub": 0}))?;
    store.set("y", json!({"sub": 0}))?;
    store.link_paths("x", "y");
    clear(&log);

    store.set("x.sub", json!(1))?;
    assert_eq!(store.get("y.sub"), Some(&json!(1)));
    assert_eq!(changed_keys(&log), ["x.sub", "y.sub"]);
    clear(&log);

    store.set("y.sub", json!(2))?;
    assert_eq!(store.get("x.sub"), Some(&json!(2)));
    assert_eq!(changed_keys(&log), ["y.sub", "x.sub"]);
    Ok(())
}

#[test]
fn test_linked_root_replacement_mirrors() -> Result<(), StoreError> {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let mut store = recording_store(&log);
    store.ready()?;
    store.set("x", json!({}))?;
    store.set("y", json!({}))?;
    store.link_paths("x", "y");
    clear(&log);

    store.set("x", json!({"fresh": true}))?;
    assert_eq!(store.get("y.fresh"), Some(&json!(true)));
    assert_eq!(changed_keys(&log), ["x", "y"]);
    Ok(())
}

#[test]
fn test_unlink_paths_deletes_alias() -> Result<(), StoreError> {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let mut store = recording_store(&log);
    store.ready()?;
    store.set("x", json!({"sub": 0}))?;
    store.set("y", json!({"sub": 0}))?;
    store.link_paths("x", "y");
    store.unlink_paths("x");
    clear(&log);

    store.set("x.sub", json!(9))?;
    assert_eq!(store.get("y.sub"), Some(&json!(0)));
    assert_eq!(changed_keys(&log), ["x.sub"]);
    Ok(())
}

// ============================================================================
// Method observers and wildcard matching
// ============================================================================

#[test]
fn test_method_observer_on_root_ignores_descendants() -> Result<(), StoreError> {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let observer_log = log.clone();
    let mut store = Store::builder()
        .property("a", PropertyConfig::new())
        .observer_expression("_onA(a)")
        .method("_onA", move |_, args| {
            observer_log.lock().unwrap().push(("a".into(), args[0].clone()));
            None
        })
        .build()
        .unwrap();
    store.ready()?;

    store.set("a", json!({"b": 1}))?;
    assert_eq!(log.lock().unwrap().len(), 1);

    // A descendant write does not retrigger the root-bound observer.
    store.set("a.b", json!(2))?;
    assert_eq!(log.lock().unwrap().len(), 1);
    Ok(())
}

#[test]
fn test_wildcard_observer_sees_descendants_and_replacements() -> Result<(), StoreError> {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let observer_log = log.clone();
    let mut store = Store::builder()
        .property("profile", PropertyConfig::new())
        .observer_expression("_onProfile(profile.*)")
        .method("_onProfile", move |_, args| {
            observer_log.lock().unwrap().push(("call".into(), args[0].clone()));
            None
        })
        .build()
        .unwrap();
    store.ready()?;

    store.set("profile", json!({"name": "ann"}))?;
    store.set("profile.name", json!("bob"))?;

    let calls = log.lock().unwrap().clone();
    assert_eq!(calls.len(), 2);

    // Subtree replacement binds the descriptor to the base path.
    assert_eq!(calls[0].1["path"], json!("profile"));
    assert_eq!(calls[0].1["base"], json!({"name": "ann"}));

    // A descendant write binds it to the concrete changed path.
    assert_eq!(calls[1].1["path"], json!("profile.name"));
    assert_eq!(calls[1].1["value"], json!("bob"));
    assert_eq!(calls[1].1["base"], json!({"name": "bob"}));
    Ok(())
}

#[test]
fn test_method_observer_runs_once_per_cycle_for_multiple_inputs() -> Result<(), StoreError> {
    let calls = Arc::new(Mutex::new(0usize));
    let counter = calls.clone();
    let mut store = Store::builder()
        .property("a", PropertyConfig::new())
        .property("b", PropertyConfig::new())
        .observer_expression("_onEither(a, b)")
        .method("_onEither", move |_, _| {
            *counter.lock().unwrap() += 1;
            None
        })
        .build()
        .unwrap();
    store.ready()?;

    // Both inputs change in one batch; the observer fires once.
    store.set_properties([("a", json!(1)), ("b", json!(2))])?;
    assert_eq!(*calls.lock().unwrap(), 1);

    store.set("a", json!(3))?;
    assert_eq!(*calls.lock().unwrap(), 2);
    Ok(())
}

#[test]
fn test_notify_path_forces_deep_notification() -> Result<(), StoreError> {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let mut store = recording_store(&log);
    store.ready()?;
    store.set("x", json!({"deep": {"leaf": 1}}))?;
    clear(&log);

    // Mutate the tree bypassing the store, then notify.
    if let Some(tree) = store.raw().get("x") {
        assert_eq!(tree["deep"]["leaf"], json!(1));
    }
    store.notify_path("x.deep.leaf", Some(json!(2)))?;
    assert_eq!(changed_keys(&log), ["x.deep.leaf"]);

    // Omitted value: current value is read and notified.
    store.notify_path("x.deep", None)?;
    assert_eq!(changed_keys(&log), ["x.deep.leaf", "x.deep"]);
    Ok(())
}
