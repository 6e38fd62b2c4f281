#![forbid(unsafe_code)]

//! Frame-coalesced batch scheduler.
//!
//! Writes made during one tick are collected into a path-keyed map and
//! delivered together on the next frame.
//!
//! # Invariants
//!
//! 1. Last write wins: scheduling a path that is already pending replaces its
//!    value; only the final value of a tick is delivered.
//! 2. Entries are delivered in insertion order of the first schedule of each
//!    path within the batch.
//! 3. At most one frame callback is armed at a time. The first schedule into
//!    an empty queue arms it, later schedules do not.
//! 4. A forced [`flush`](BatchScheduler::flush) cancels the armed frame, so
//!    already delivered work is never delivered twice.
//! 5. A failing entry does not stop the rest of its flush.
//!
//! # Failure Modes
//!
//! - **Handler error**: logged with the offending path at `ERROR` and
//!   reported in [`FlushReport::failures`]; iteration continues.
//! - **Writes during flush**: land in a fresh batch and arm a new frame.

use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::{debug_span, error, trace};

use crate::host::{FrameHandle, Host};
use crate::path::Path;
use crate::value::Value;

/// Error type update handlers may return.
pub type HandlerError = Box<dyn std::error::Error>;

/// Callback invoked once per flushed entry.
pub type UpdateHandler = Rc<dyn Fn(&Path, &Value) -> Result<(), HandlerError>>;

/// One entry that failed during a flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushFailure {
    pub path: Path,
    pub message: String,
}

/// Outcome of one flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Entries the handler accepted.
    pub delivered: usize,
    /// Entries whose handler returned an error.
    pub failures: Vec<FlushFailure>,
}

impl FlushReport {
    /// Entries taken out of the queue, delivered or not.
    #[must_use]
    pub fn total(&self) -> usize {
        self.delivered + self.failures.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

#[derive(Default)]
struct BatchState {
    pending: IndexMap<Path, Value>,
    armed: bool,
    frame: Option<FrameHandle>,
    /// Bumped by every flush; lets `schedule` detect that the frame it just
    /// requested already ran (synchronous hosts).
    epoch: u64,
    handler: Option<UpdateHandler>,
}

struct BatchInner {
    state: RefCell<BatchState>,
    host: Rc<dyn Host>,
}

/// Coalesces path writes into one delivery per frame. Cheap to clone.
#[derive(Clone)]
pub struct BatchScheduler {
    inner: Rc<BatchInner>,
}

impl BatchScheduler {
    #[must_use]
    pub fn new(host: Rc<dyn Host>) -> Self {
        Self {
            inner: Rc::new(BatchInner {
                state: RefCell::new(BatchState::default()),
                host,
            }),
        }
    }

    /// Install the callback that receives flushed entries, replacing any
    /// previous one. Without a handler flushed entries are dropped.
    pub fn set_update_handler(
        &self,
        handler: impl Fn(&Path, &Value) -> Result<(), HandlerError> + 'static,
    ) {
        self.inner.state.borrow_mut().handler = Some(Rc::new(handler));
    }

    pub fn clear_update_handler(&self) {
        self.inner.state.borrow_mut().handler = None;
    }

    /// Queue `value` for `path`, replacing any pending value for that path.
    pub fn schedule(&self, path: Path, value: Value) {
        let arm_epoch = {
            let mut state = self.inner.state.borrow_mut();
            state.pending.insert(path, value);
            if state.armed {
                return;
            }
            state.armed = true;
            state.epoch
        };

        let weak: Weak<BatchInner> = Rc::downgrade(&self.inner);
        let handle = self.inner.host.request_frame(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                BatchScheduler { inner }.run(false);
            }
        }));

        let mut state = self.inner.state.borrow_mut();
        if state.armed && state.epoch == arm_epoch {
            state.frame = Some(handle);
        }
    }

    /// Deliver everything pending now, cancelling the armed frame.
    ///
    /// A no-op when nothing is pending.
    pub fn flush(&self) -> FlushReport {
        self.run(true)
    }

    fn run(&self, forced: bool) -> FlushReport {
        let (entries, handler, frame) = {
            let mut state = self.inner.state.borrow_mut();
            if !state.armed && state.pending.is_empty() {
                return FlushReport::default();
            }
            state.armed = false;
            state.epoch += 1;
            let frame = state.frame.take();
            (mem::take(&mut state.pending), state.handler.clone(), frame)
        };
        if let Some(frame) = frame.filter(|_| forced) {
            self.inner.host.cancel_frame(frame);
        }

        let _span = debug_span!("batch_flush", entries = entries.len(), forced).entered();
        let mut report = FlushReport::default();
        let Some(handler) = handler else {
            trace!(dropped = entries.len(), "no update handler installed");
            return report;
        };
        for (path, value) in entries {
            match handler(&path, &value) {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    error!(path = %path, error = %err, "update handler failed");
                    report.failures.push(FlushFailure {
                        path,
                        message: err.to_string(),
                    });
                }
            }
        }
        report
    }

    /// Whether a frame callback is armed.
    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.inner.state.borrow().armed
    }

    /// Snapshot of pending entries in delivery order.
    #[must_use]
    pub fn pending(&self) -> Vec<(Path, Value)> {
        self.inner
            .state
            .borrow()
            .pending
            .iter()
            .map(|(p, v)| (p.clone(), v.clone()))
            .collect()
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.inner.state.borrow().pending.len()
    }

    #[must_use]
    pub fn host(&self) -> &Rc<dyn Host> {
        &self.inner.host
    }
}

impl fmt::Debug for BatchScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("BatchScheduler")
            .field("pending", &state.pending.len())
            .field("armed", &state.armed)
            .field("has_handler", &state.handler.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
