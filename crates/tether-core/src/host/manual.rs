#![forbid(unsafe_code)]

//! Deterministic host driven by the caller.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use web_time::Duration;

use super::{Callback, FrameHandle, Host, TimerHandle};

#[derive(Default)]
struct ManualState {
    next_id: u64,
    /// Virtual time since the host was created.
    now: Duration,
    frames: Vec<(FrameHandle, Callback)>,
    /// Pending timers with their due time, in registration order.
    timers: Vec<(TimerHandle, Duration, Callback)>,
}

impl ManualState {
    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// A host whose frames and clock only move when told to.
///
/// Cloning shares the same queue and clock, so a test can hand one clone to
/// the runtime and keep another to drive it.
///
/// ```
/// use tether_core::host::{Host, ManualHost};
/// use web_time::Duration;
///
/// let host = ManualHost::new();
/// host.set_timeout(Duration::from_millis(50), Box::new(|| println!("fired")));
/// assert_eq!(host.advance(Duration::from_millis(49)), 0);
/// assert_eq!(host.advance(Duration::from_millis(1)), 1);
/// ```
#[derive(Clone, Default)]
pub struct ManualHost {
    state: Rc<RefCell<ManualState>>,
}

impl ManualHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every frame callback requested so far and return how many ran.
    ///
    /// Callbacks requested while these run wait for the next call.
    pub fn run_frame(&self) -> usize {
        let frames = std::mem::take(&mut self.state.borrow_mut().frames);
        let count = frames.len();
        for (_, callback) in frames {
            callback();
        }
        count
    }

    /// Advance the virtual clock by `delta`, firing due timers in due-time
    /// order, and return how many fired.
    pub fn advance(&self, delta: Duration) -> usize {
        let target = self.state.borrow().now + delta;
        let mut fired = 0;
        loop {
            let next = {
                let mut state = self.state.borrow_mut();
                let due = state
                    .timers
                    .iter()
                    .enumerate()
                    .filter(|(_, (_, at, _))| *at <= target)
                    .min_by_key(|(_, (_, at, _))| *at)
                    .map(|(index, _)| index);
                match due {
                    Some(index) => {
                        let (_, at, callback) = state.timers.remove(index);
                        state.now = state.now.max(at);
                        Some(callback)
                    }
                    None => {
                        state.now = target;
                        None
                    }
                }
            };
            match next {
                Some(callback) => {
                    callback();
                    fired += 1;
                }
                None => return fired,
            }
        }
    }

    /// Virtual time elapsed since creation.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    #[must_use]
    pub fn pending_frames(&self) -> usize {
        self.state.borrow().frames.len()
    }

    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.state.borrow().timers.len()
    }
}

impl Host for ManualHost {
    fn request_frame(&self, callback: Callback) -> FrameHandle {
        let mut state = self.state.borrow_mut();
        let handle = FrameHandle(state.next());
        state.frames.push((handle, callback));
        handle
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        self.state.borrow_mut().frames.retain(|(h, _)| *h != handle);
    }

    fn set_timeout(&self, delay: Duration, callback: Callback) -> TimerHandle {
        let mut state = self.state.borrow_mut();
        let handle = TimerHandle(state.next());
        let due = state.now + delay;
        state.timers.push((handle, due, callback));
        handle
    }

    fn clear_timeout(&self, handle: TimerHandle) {
        self.state.borrow_mut().timers.retain(|(h, _, _)| *h != handle);
    }
}

impl fmt::Debug for ManualHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("ManualHost")
            .field("now", &state.now)
            .field("pending_frames", &state.frames.len())
            .field("pending_timers", &state.timers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[test]
    fn frames_wait_for_run_frame() {
        let host = ManualHost::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        host.request_frame(Box::new(move || h.set(h.get() + 1)));

        assert_eq!(hits.get(), 0);
        assert_eq!(host.pending_frames(), 1);
        assert_eq!(host.run_frame(), 1);
        assert_eq!(hits.get(), 1);
        assert_eq!(host.run_frame(), 0);
    }

    #[test]
    fn cancelled_frame_never_runs() {
        let host = ManualHost::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let handle = host.request_frame(Box::new(move || h.set(h.get() + 1)));
        host.cancel_frame(handle);
        assert_eq!(host.run_frame(), 0);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn frame_requested_during_frame_runs_next_time() {
        let host = ManualHost::new();
        let hits = Rc::new(Cell::new(0));
        let inner_host = host.clone();
        let h = Rc::clone(&hits);
        host.request_frame(Box::new(move || {
            let h2 = Rc::clone(&h);
            inner_host.request_frame(Box::new(move || h2.set(h2.get() + 1)));
        }));
        assert_eq!(host.run_frame(), 1);
        assert_eq!(hits.get(), 0);
        assert_eq!(host.run_frame(), 1);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn timers_fire_in_due_order() {
        let host = ManualHost::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for (label, ms) in [("late", 30u64), ("early", 10), ("mid", 20)] {
            let o = Rc::clone(&order);
            host.set_timeout(Duration::from_millis(ms), Box::new(move || o.borrow_mut().push(label)));
        }
        assert_eq!(host.advance(Duration::from_millis(25)), 2);
        assert_eq!(*order.borrow(), vec!["early", "mid"]);
        assert_eq!(host.now(), Duration::from_millis(25));
        assert_eq!(host.advance(Duration::from_millis(5)), 1);
        assert_eq!(*order.borrow(), vec!["early", "mid", "late"]);
    }

    #[test]
    fn cleared_timer_never_fires() {
        let host = ManualHost::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let handle = host.set_timeout(Duration::from_millis(5), Box::new(move || h.set(1)));
        host.clear_timeout(handle);
        assert_eq!(host.advance(Duration::from_secs(1)), 0);
        assert_eq!(hits.get(), 0);
        assert_eq!(host.pending_timers(), 0);
    }

    #[test]
    fn timer_scheduled_by_timer_fires_within_same_advance() {
        let host = ManualHost::new();
        let hits = Rc::new(Cell::new(0));
        let inner = host.clone();
        let h = Rc::clone(&hits);
        host.set_timeout(
            Duration::from_millis(10),
            Box::new(move || {
                let h2 = Rc::clone(&h);
                inner.set_timeout(Duration::from_millis(10), Box::new(move || h2.set(1)));
            }),
        );
        assert_eq!(host.advance(Duration::from_millis(20)), 2);
        assert_eq!(hits.get(), 1);
    }
}
