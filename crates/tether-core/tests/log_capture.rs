//! The recoverable failure paths degrade to log events instead of errors.
//! These tests install a capturing `tracing` layer and check the events.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde_json::json;
use tether_core::{Node, Runtime, Value};
use tracing::Subscriber;
use tracing::field::{Field, Visit};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

// ---------------------------------------------------------------------------
// Capture layer
// ---------------------------------------------------------------------------

// Same layer as `crates/tether-dom/tests/log_capture.rs`; keep the two in step.

#[derive(Debug, Clone)]
struct Captured {
    level: tracing::Level,
    message: String,
    fields: Vec<(String, String)>,
}

impl Captured {
    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_owned();
        } else {
            self.fields.push((field.name().to_owned(), value.to_owned()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{value:?}");
        if field.name() == "message" {
            self.message = rendered;
        } else {
            self.fields.push((field.name().to_owned(), rendered));
        }
    }
}

struct CaptureLayer {
    events: Arc<Mutex<Vec<Captured>>>,
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);
        self.events.lock().expect("capture lock").push(Captured {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

fn capture<R>(f: impl FnOnce() -> R) -> (R, Vec<Captured>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(CaptureLayer {
        events: Arc::clone(&events),
    });
    let result = tracing::subscriber::with_default(subscriber, f);
    let captured = events.lock().expect("capture lock").clone();
    (result, captured)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn cyclic_data_logs_a_warning() {
    let ((), events) = capture(|| {
        let (rt, _host) = Runtime::manual();
        let node = Node::object();
        node.insert("self", Value::Node(node.clone())).unwrap();
        let data = rt.wrap(node.clone()).unwrap();
        assert!(data.get("self").as_reactive().is_none());
        node.remove("self");
    });

    let warning = events
        .iter()
        .find(|e| e.level == tracing::Level::WARN)
        .expect("expected a warning");
    assert!(warning.message.contains("already wrapped"));
    assert_eq!(warning.field("path"), Some("self"));
}

#[test]
fn failing_flush_entry_logs_an_error_with_its_path() {
    let (report, events) = capture(|| {
        let (rt, _host) = Runtime::manual();
        rt.set_update_handler(|path, _| {
            if path.as_str() == "b" {
                Err("boom".into())
            } else {
                Ok(())
            }
        });
        let data = rt.wrap(json!({"a": 0, "b": 0})).unwrap();
        data.set("a", 1).unwrap();
        data.set("b", 1).unwrap();
        rt.flush()
    });

    assert_eq!(report.delivered, 1);
    let errors: Vec<&Captured> = events
        .iter()
        .filter(|e| e.level == tracing::Level::ERROR)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field("path"), Some("b"));
    assert_eq!(errors[0].field("error"), Some("boom"));
}
