#![forbid(unsafe_code)]

//! Reactive core for Tether.
//!
//! This crate provides the change-tracking primitives behind Tether's DOM
//! bindings:
//!
//! - [`Runtime`]: the explicit context object owning tracking, subscribers,
//!   wrapped roots and the batch scheduler.
//! - [`Reactive`]: an observable wrapper around an object or array
//!   [`Node`]. Reads are recorded by path; effective writes notify path
//!   subscribers and queue a batch entry.
//! - [`Computed`]: a lazily evaluated, memoized value that is invalidated by
//!   writes to the paths it read.
//! - [`BatchScheduler`]: coalesces writes into one delivery per frame through
//!   an injected [`Host`].
//!
//! # Architecture
//!
//! Everything is single threaded and `Rc` based. No internal borrow is held
//! while user code runs (compute functions, subscribers, update handlers,
//! host callbacks), so user code may freely re-enter the runtime.
//!
//! # Invariants
//!
//! 1. A write of a value strictly equal to the current one is silent.
//! 2. Subscribers are notified synchronously, in registration order, for the
//!    exact path written.
//! 3. Only the last value written to a path within one frame is delivered.
//! 4. `Computed::get()` never returns a value computed before the latest
//!    write to one of its dependencies.

pub mod batch;
pub mod computed;
pub mod error;
pub mod host;
pub mod path;
pub mod reactive;
pub mod runtime;
pub mod subscription;
pub mod tracking;
pub mod value;

pub use batch::{BatchScheduler, FlushFailure, FlushReport, HandlerError, UpdateHandler};
pub use computed::Computed;
pub use error::{ReactiveError, Result};
pub use host::{Callback, FrameHandle, Host, ImmediateHost, ManualHost, TimerHandle};
#[cfg(all(target_arch = "wasm32", feature = "web"))]
pub use host::WebHost;
pub use path::{Path, PathPattern, Segment};
pub use reactive::{Accessor, ChangeCallback, Field, Reactive, Source, WrapOptions};
pub use runtime::Runtime;
pub use subscription::Subscription;
pub use tracking::{DependencySet, Tracked};
pub use value::{Container, Node, NodeId, Value, WeakNode};
