#![forbid(unsafe_code)]

//! Host environment abstraction: frame callbacks and timers.
//!
//! The batch scheduler arms one frame callback per batch and model bindings
//! debounce input through timers. Both go through [`Host`] so the core runs
//! unchanged against a browser, a deterministic test clock, or a host with no
//! frame primitive at all.
//!
//! - [`ManualHost`]: nothing runs until the test calls
//!   [`run_frame`](ManualHost::run_frame) or [`advance`](ManualHost::advance).
//! - [`ImmediateHost`]: callbacks run synchronously when requested.
//! - `WebHost` (`web` feature, wasm32): `requestAnimationFrame` and
//!   `setTimeout` on the browser window.

mod manual;
#[cfg(all(target_arch = "wasm32", feature = "web"))]
mod web;

pub use manual::ManualHost;
#[cfg(all(target_arch = "wasm32", feature = "web"))]
pub use web::WebHost;

use std::cell::Cell;

use web_time::Duration;

/// A one-shot host callback.
pub type Callback = Box<dyn FnOnce()>;

/// Handle of a requested frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// Handle of a pending timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

/// Frame and timer primitives of the embedding environment.
///
/// Implementations must not hold internal borrows while running callbacks:
/// callbacks re-enter the runtime and may request further frames or timers.
pub trait Host {
    /// Run `callback` before the next frame is painted.
    fn request_frame(&self, callback: Callback) -> FrameHandle;

    /// Cancel a frame callback. Unknown or already-run handles are ignored.
    fn cancel_frame(&self, handle: FrameHandle);

    /// Run `callback` once `delay` has elapsed.
    fn set_timeout(&self, delay: Duration, callback: Callback) -> TimerHandle;

    /// Cancel a timer. Unknown or already-fired handles are ignored.
    fn clear_timeout(&self, handle: TimerHandle);
}

/// Runs every callback synchronously, for hosts without a frame primitive.
///
/// Batches still coalesce writes made *inside* a running flush, but every
/// top-level write flushes on its own and debounce delays are ignored.
#[derive(Debug, Default)]
pub struct ImmediateHost {
    next_id: Cell<u64>,
}

impl ImmediateHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self) -> u64 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id
    }
}

impl Host for ImmediateHost {
    fn request_frame(&self, callback: Callback) -> FrameHandle {
        let handle = FrameHandle(self.next());
        callback();
        handle
    }

    fn cancel_frame(&self, _handle: FrameHandle) {}

    fn set_timeout(&self, _delay: Duration, callback: Callback) -> TimerHandle {
        let handle = TimerHandle(self.next());
        callback();
        handle
    }

    fn clear_timeout(&self, _handle: TimerHandle) {}
}
