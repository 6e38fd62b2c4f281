#![forbid(unsafe_code)]

//! Browser host on `requestAnimationFrame` and `setTimeout`.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::warn;
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_time::Duration;

use super::{Callback, FrameHandle, Host, TimerHandle};

/// [`Host`] backed by the browser window.
#[derive(Debug, Clone)]
pub struct WebHost {
    window: web_sys::Window,
}

impl WebHost {
    /// `None` outside a window context (e.g. in a worker).
    #[must_use]
    pub fn new() -> Option<Self> {
        web_sys::window().map(|window| Self { window })
    }
}

/// Shares a callback between the JS closure and the failure path, so a
/// callback the browser refused to schedule still runs.
fn shared(callback: Callback) -> (Rc<RefCell<Option<Callback>>>, js_sys::Function) {
    let slot = Rc::new(RefCell::new(Some(callback)));
    let js_slot = Rc::clone(&slot);
    let function = Closure::once_into_js(move || {
        let callback = js_slot.borrow_mut().take();
        if let Some(callback) = callback {
            callback();
        }
    });
    (slot, function.unchecked_into())
}

fn run_now(slot: &Rc<RefCell<Option<Callback>>>) {
    let callback = slot.borrow_mut().take();
    if let Some(callback) = callback {
        callback();
    }
}

impl Host for WebHost {
    fn request_frame(&self, callback: Callback) -> FrameHandle {
        let (slot, function) = shared(callback);
        match self.window.request_animation_frame(&function) {
            Ok(id) => FrameHandle(id as u64),
            Err(err) => {
                warn!(?err, "requestAnimationFrame failed; running frame callback now");
                run_now(&slot);
                FrameHandle(0)
            }
        }
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        if let Err(err) = self.window.cancel_animation_frame(handle.0 as i32) {
            warn!(?err, "cancelAnimationFrame failed");
        }
    }

    fn set_timeout(&self, delay: Duration, callback: Callback) -> TimerHandle {
        let (slot, function) = shared(callback);
        let millis = delay.as_millis().min(i32::MAX as u128) as i32;
        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(&function, millis)
        {
            Ok(id) => TimerHandle(id as u64),
            Err(err) => {
                warn!(?err, "setTimeout failed; running timer callback now");
                run_now(&slot);
                TimerHandle(0)
            }
        }
    }

    fn clear_timeout(&self, handle: TimerHandle) {
        self.window.clear_timeout_with_handle(handle.0 as i32);
    }
}
