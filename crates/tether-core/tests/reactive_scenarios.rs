//! End-to-end scenarios for the reactive core: wrapping, tracking, computed
//! values and frame batching working together on one runtime.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use pretty_assertions::assert_eq;
use serde_json::json;
use tether_core::{Field, ManualHost, Node, ReactiveError, Runtime, Value, WrapOptions};
use web_time::Duration;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn runtime() -> (Runtime, ManualHost) {
    Runtime::manual()
}

fn sorted_paths(paths: impl IntoIterator<Item = impl ToString>) -> Vec<String> {
    let mut out: Vec<String> = paths.into_iter().map(|p| p.to_string()).collect();
    out.sort();
    out
}

fn record_flushes(rt: &Runtime) -> Rc<RefCell<Vec<(String, Value)>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    rt.set_update_handler(move |path, value| {
        sink.borrow_mut().push((path.to_string(), value.clone()));
        Ok(())
    });
    log
}

// ---------------------------------------------------------------------------
// Wrapping
// ---------------------------------------------------------------------------

#[test]
fn wrapping_twice_yields_the_same_wrapper() {
    let (rt, _) = runtime();
    let data = rt.wrap(json!({"a": 1})).unwrap();
    let again = rt.wrap(&data).unwrap();
    let by_node = rt.wrap(data.node().clone()).unwrap();
    assert!(data.ptr_eq(&again));
    assert!(data.ptr_eq(&by_node));
}

#[test]
fn primitive_root_is_rejected() {
    let (rt, _) = runtime();
    let err = rt.wrap(json!("text")).unwrap_err();
    assert_eq!(err, ReactiveError::InvalidRoot { kind: "string" });
}

#[test]
fn shallow_root_hands_out_raw_nested_objects() {
    let (rt, _) = runtime();
    let data = rt
        .wrap_with(json!({"user": {"name": "Ada"}}), WrapOptions::new().with_deep(false))
        .unwrap();
    let tracked = rt.track(|| data.get_path("user.name"));
    assert_eq!(tracked.result.as_str(), Some("Ada"));
    assert_eq!(sorted_paths(&tracked.dependencies), vec!["user"]);
}

#[test]
fn cyclic_data_does_not_recurse() {
    let (rt, _) = runtime();
    let root = Node::object();
    let child = Node::object();
    child.insert("parent", Value::Node(root.clone())).unwrap();
    root.insert("child", Value::Node(child.clone())).unwrap();

    let data = rt.wrap(root.clone()).unwrap();
    let child_wrapper = data.get("child").into_reactive().unwrap();
    match child_wrapper.get("parent") {
        Field::Value(Value::Node(node)) => assert!(node.ptr_eq(&root)),
        other => panic!("expected raw node, got {other:?}"),
    }

    // Break the cycle so the test does not leak.
    child.remove("parent");
}

// ---------------------------------------------------------------------------
// Writes and batching
// ---------------------------------------------------------------------------

#[test]
fn unchanged_write_produces_nothing() {
    let (rt, host) = runtime();
    let log = record_flushes(&rt);
    let data = rt.wrap(json!({"name": "Ada"})).unwrap();
    data.set("name", "Ada").unwrap();
    assert!(!rt.is_scheduled());
    assert_eq!(host.pending_frames(), 0);
    assert_eq!(host.run_frame(), 0);
    assert!(log.borrow().is_empty());
}

#[test]
fn writes_in_one_tick_coalesce_per_path() {
    let (rt, host) = runtime();
    let log = record_flushes(&rt);
    let data = rt.wrap(json!({"a": 0, "b": 0})).unwrap();

    for i in 1..=10 {
        data.set("a", i).unwrap();
    }
    data.set("b", 1).unwrap();
    data.set("a", 99).unwrap();
    assert_eq!(host.pending_frames(), 1);

    host.run_frame();
    let log = log.borrow();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].0, "a");
    assert_eq!(log[0].1.as_f64(), Some(99.0));
    assert_eq!(log[1].0, "b");
}

#[test]
fn forced_flush_cancels_the_frame() {
    let (rt, host) = runtime();
    let log = record_flushes(&rt);
    let data = rt.wrap(json!({"a": 0})).unwrap();
    data.set("a", 1).unwrap();

    let report = rt.flush();
    assert_eq!(report.delivered, 1);
    assert_eq!(host.pending_frames(), 0);
    assert_eq!(host.run_frame(), 0);
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn handler_failure_does_not_stop_the_flush() {
    let (rt, _host) = runtime();
    let delivered = Rc::new(Cell::new(0));
    let d = Rc::clone(&delivered);
    rt.set_update_handler(move |path, _| {
        if path.as_str() == "bad" {
            return Err("render failed".into());
        }
        d.set(d.get() + 1);
        Ok(())
    });
    let data = rt.wrap(json!({"good": 0, "bad": 0, "also": 0})).unwrap();
    data.set("good", 1).unwrap();
    data.set("bad", 1).unwrap();
    data.set("also", 1).unwrap();

    let report = rt.flush();
    assert_eq!(report.delivered, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path.as_str(), "bad");
    assert_eq!(report.failures[0].message, "render failed");
    assert_eq!(delivered.get(), 2);
}

#[test]
fn writes_from_the_handler_land_in_the_next_frame() {
    let (rt, host) = runtime();
    let data = rt.wrap(json!({"a": 0, "echo": 0})).unwrap();
    let d = data.clone();
    let log = Rc::new(RefCell::new(Vec::new()));
    let l = Rc::clone(&log);
    rt.set_update_handler(move |path, value| {
        l.borrow_mut().push(path.to_string());
        if path.as_str() == "a" {
            d.set("echo", value.clone())?;
        }
        Ok(())
    });

    data.set("a", 5).unwrap();
    host.run_frame();
    assert_eq!(*log.borrow(), vec!["a"]);
    assert!(rt.is_scheduled());

    host.run_frame();
    assert_eq!(*log.borrow(), vec!["a", "echo"]);
    assert_eq!(data.get("echo").as_f64(), Some(5.0));
}

// ---------------------------------------------------------------------------
// Tracking and computed
// ---------------------------------------------------------------------------

#[test]
fn tracked_call_records_exactly_what_it_read() {
    let (rt, _) = runtime();
    let data = rt.wrap(json!({"a": 1, "b": 2, "c": 3})).unwrap();
    let tracked = rt.track(|| {
        data.get("a").as_f64().unwrap_or(0.0) + data.get("b").as_f64().unwrap_or(0.0)
    });
    assert_eq!(tracked.result, 3.0);
    assert_eq!(sorted_paths(&tracked.dependencies), vec!["a", "b"]);
}

#[test]
fn computed_over_nested_paths() {
    let (rt, _) = runtime();
    let data = rt
        .wrap(json!({"user": {"first": "Ada", "last": "Lovelace"}, "noise": 0}))
        .unwrap();
    let calls = Rc::new(Cell::new(0));
    let c = Rc::clone(&calls);
    let d = data.clone();
    let full_name = rt.computed(move || {
        c.set(c.get() + 1);
        format!(
            "{} {}",
            d.get_path("user.first").display_string(),
            d.get_path("user.last").display_string()
        )
    });

    assert_eq!(full_name.get().unwrap(), "Ada Lovelace");
    assert_eq!(
        sorted_paths(full_name.dependency_paths()),
        vec!["user", "user.first", "user.last"]
    );

    data.set("noise", 1).unwrap();
    assert_eq!(full_name.get().unwrap(), "Ada Lovelace");
    assert_eq!(calls.get(), 1);

    data.set_path("user.last", "Byron").unwrap();
    data.set_path("user.first", "Augusta").unwrap();
    assert_eq!(full_name.get().unwrap(), "Augusta Byron");
    assert_eq!(calls.get(), 2);

    // Replacing the parent object invalidates as well.
    data.set("user", json!({"first": "Grace", "last": "Hopper"})).unwrap();
    assert_eq!(full_name.get().unwrap(), "Grace Hopper");
    assert_eq!(calls.get(), 3);
}

#[test]
fn computed_chain_stays_fresh() {
    let (rt, _) = runtime();
    let data = rt.wrap(json!({"items": [1, 2, 3]})).unwrap();
    let d = data.clone();
    let total = rt.computed(move || {
        let items = d.get("items").into_reactive();
        items.map_or(0.0, |items| {
            let len = items.get("length").as_f64().unwrap_or(0.0) as usize;
            (0..len)
                .filter_map(|i| items.get(&i.to_string()).as_f64())
                .sum()
        })
    });
    let t = total.clone();
    let label = rt.try_computed(move || Ok(format!("total: {}", t.get()?)));

    assert_eq!(label.get().unwrap(), "total: 6");

    let items = data.get("items").into_reactive().unwrap();
    items.push(4).unwrap();
    assert!(label.is_dirty());
    assert_eq!(label.get().unwrap(), "total: 10");
}

#[test]
fn mutual_computeds_report_a_cycle() {
    let (rt, _) = runtime();
    let slot = Rc::new(RefCell::new(None::<tether_core::Computed<i32>>));
    let s = Rc::clone(&slot);
    let b = rt.try_computed(move || {
        let a = s.borrow().clone();
        a.map_or(Ok(0), |a| a.get())
    });
    let bb = b.clone();
    let a = rt.try_computed(move || Ok(bb.get()? + 1));
    *slot.borrow_mut() = Some(a.clone());

    let err = a.get().unwrap_err();
    assert!(err.is_circular());
    assert!(err.to_string().contains("circular dependency"));
    slot.borrow_mut().take();
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

#[test]
fn manual_host_drives_timers_and_frames_independently() {
    let (rt, host) = runtime();
    let fired = Rc::new(Cell::new(false));
    let f = Rc::clone(&fired);
    rt.host()
        .set_timeout(Duration::from_millis(50), Box::new(move || f.set(true)));
    let data = rt.wrap(json!({"a": 0})).unwrap();
    data.set("a", 1).unwrap();

    assert_eq!(host.run_frame(), 1);
    assert!(!fired.get());
    host.advance(Duration::from_millis(49));
    assert!(!fired.get());
    host.advance(Duration::from_millis(1));
    assert!(fired.get());
}
