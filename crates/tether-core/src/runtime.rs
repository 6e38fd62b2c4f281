#![forbid(unsafe_code)]

//! The reactive runtime: one explicit context object per application.
//!
//! A [`Runtime`] owns the tracking stack, the path subscribers, the batch
//! scheduler and the registry of wrapped roots. Every [`Reactive`] and
//! [`Computed`] keeps a handle to the runtime that created it; nothing is
//! global, so independent runtimes (one per test, say) never observe each
//! other.
//!
//! # Example
//!
//! ```
//! use tether_core::Runtime;
//! use serde_json::json;
//!
//! let (runtime, host) = Runtime::manual();
//! let state = runtime.wrap(json!({"count": 1})).unwrap();
//!
//! let doubled = {
//!     let state = state.clone();
//!     runtime.computed(move || state.get("count").as_f64().unwrap_or(0.0) * 2.0)
//! };
//! assert_eq!(doubled.get().unwrap(), 2.0);
//!
//! state.set("count", 5).unwrap();
//! assert_eq!(doubled.get().unwrap(), 10.0);
//! assert!(runtime.is_scheduled());
//! host.run_frame();
//! assert!(!runtime.is_scheduled());
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use tracing::{debug, trace};

use crate::batch::{BatchScheduler, FlushReport, HandlerError};
use crate::computed::Computed;
use crate::error::{ReactiveError, Result};
use crate::host::{Host, ManualHost};
use crate::path::Path;
use crate::reactive::{Reactive, Source, WeakReactive, WrapOptions};
use crate::subscription::{Subscribers, Subscription};
use crate::tracking::{Tracked, Tracker};
use crate::value::{NodeId, Value};

struct RuntimeInner {
    tracker: Tracker,
    subscribers: Rc<Subscribers>,
    batch: BatchScheduler,
    roots: RefCell<AHashMap<NodeId, WeakReactive>>,
    next_id: Cell<u64>,
}

/// Shared handle to a reactive runtime. Cloning yields the same runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    /// Create a runtime driven by `host`.
    #[must_use]
    pub fn new(host: impl Host + 'static) -> Self {
        Self::with_host(Rc::new(host))
    }

    #[must_use]
    pub fn with_host(host: Rc<dyn Host>) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                tracker: Tracker::default(),
                subscribers: Rc::new(Subscribers::default()),
                batch: BatchScheduler::new(host),
                roots: RefCell::new(AHashMap::new()),
                next_id: Cell::new(0),
            }),
        }
    }

    /// A runtime on a [`ManualHost`], plus the host to drive it.
    #[must_use]
    pub fn manual() -> (Self, ManualHost) {
        let host = ManualHost::new();
        (Self::new(host.clone()), host)
    }

    #[must_use]
    pub fn host(&self) -> &Rc<dyn Host> {
        self.inner.batch.host()
    }

    // -----------------------------------------------------------------------
    // Wrapping
    // -----------------------------------------------------------------------

    /// Wrap an object or array with default [`WrapOptions`].
    pub fn wrap(&self, source: impl Into<Source>) -> Result<Reactive> {
        self.wrap_with(source, WrapOptions::default())
    }

    /// Wrap an object or array.
    ///
    /// Wrapping a [`Reactive`] returns it unchanged, and wrapping a node that
    /// is already a root of this runtime returns that root; `options` are
    /// ignored in both cases.
    ///
    /// # Errors
    ///
    /// [`ReactiveError::InvalidRoot`] for primitives.
    pub fn wrap_with(&self, source: impl Into<Source>, options: WrapOptions) -> Result<Reactive> {
        let node = match source.into() {
            Source::Wrapped(reactive) => return Ok(reactive),
            Source::Plain(Value::Node(node)) => node,
            Source::Plain(other) => {
                return Err(ReactiveError::InvalidRoot {
                    kind: other.type_name(),
                });
            }
        };

        let existing = self
            .inner
            .roots
            .borrow()
            .get(&node.id())
            .and_then(Reactive::upgrade)
            .filter(|root| root.node().ptr_eq(&node));
        if let Some(root) = existing {
            return Ok(root);
        }

        let root = Reactive::root(self.clone(), node, options);
        let mut roots = self.inner.roots.borrow_mut();
        roots.retain(|_, weak| weak.strong_count() > 0);
        roots.insert(root.node().id(), root.downgrade());
        debug!(path = %root.path(), deep = root.is_deep(), roots = roots.len(), "wrapped root");
        Ok(root)
    }

    // -----------------------------------------------------------------------
    // Tracking
    // -----------------------------------------------------------------------

    /// Run `f` in a fresh tracking context and return the paths it read.
    ///
    /// The context is popped even if `f` panics. Paths read inside `f` are
    /// not added to any enclosing context.
    pub fn track<R>(&self, f: impl FnOnce() -> R) -> Tracked<R> {
        self.inner.tracker.track(f)
    }

    #[must_use]
    pub fn is_tracking(&self) -> bool {
        self.inner.tracker.is_active()
    }

    /// Add `paths` to the current tracking context, if any.
    pub fn record_all<'a>(&self, paths: impl IntoIterator<Item = &'a Path>) {
        self.inner.tracker.record_all(paths);
    }

    pub(crate) fn record(&self, path: &Path) {
        self.inner.tracker.record(path);
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    /// Call `callback(path, new_value)` synchronously after every effective
    /// write to exactly `path`.
    pub fn subscribe(
        &self,
        path: impl Into<Path>,
        callback: impl Fn(&Path, &Value) + 'static,
    ) -> Subscription {
        self.inner.subscribers.subscribe(path.into(), callback)
    }

    #[must_use]
    pub fn subscriber_count(&self, path: &str) -> usize {
        self.inner.subscribers.count(path)
    }

    // -----------------------------------------------------------------------
    // Computed
    // -----------------------------------------------------------------------

    /// A memoized value recomputed only after one of the paths it read
    /// changes.
    pub fn computed<T: Clone + 'static>(&self, compute: impl Fn() -> T + 'static) -> Computed<T> {
        self.try_computed(move || Ok(compute()))
    }

    /// Like [`computed`](Self::computed) for bodies that read other
    /// computeds or can otherwise fail.
    pub fn try_computed<T: Clone + 'static>(
        &self,
        compute: impl Fn() -> Result<T> + 'static,
    ) -> Computed<T> {
        Computed::new(self.clone(), self.next_id(), Box::new(compute))
    }

    // -----------------------------------------------------------------------
    // Batching
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn scheduler(&self) -> &BatchScheduler {
        &self.inner.batch
    }

    /// Queue an entry as if `path` had been written with `value`.
    pub fn schedule(&self, path: impl Into<Path>, value: impl Into<Value>) {
        self.inner.batch.schedule(path.into(), value.into());
    }

    /// Deliver pending batch entries now.
    pub fn flush(&self) -> FlushReport {
        self.inner.batch.flush()
    }

    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.inner.batch.is_scheduled()
    }

    pub fn set_update_handler(
        &self,
        handler: impl Fn(&Path, &Value) -> std::result::Result<(), HandlerError> + 'static,
    ) {
        self.inner.batch.set_update_handler(handler);
    }

    pub(crate) fn notify_change(&self, path: &Path, value: &Value) {
        trace!(path = %path, value = ?value, "change");
        self.inner.subscribers.notify(path, value);
        self.inner.batch.schedule(path.clone(), value.clone());
    }

    fn next_id(&self) -> u64 {
        let id = self.inner.next_id.get() + 1;
        self.inner.next_id.set(id);
        id
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("tracking_depth", &self.inner.tracker.depth())
            .field("subscribed_paths", &self.inner.subscribers.path_count())
            .field("roots", &self.inner.roots.borrow().len())
            .field("batch", &self.inner.batch)
            .finish()
    }
}
