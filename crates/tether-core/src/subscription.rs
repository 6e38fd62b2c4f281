#![forbid(unsafe_code)]

//! Per-path change subscribers.
//!
//! Subscribers register for one exact path string. A write to `user.name`
//! notifies `user.name` subscribers only; it does not notify `user` or
//! `user.name.first`.
//!
//! # Invariants
//!
//! 1. Subscribers of a path are notified in registration order.
//! 2. No internal borrow is held while a callback runs, so callbacks may
//!    subscribe, unsubscribe or write.
//! 3. Dropping a [`Subscription`] removes its callback before the next
//!    notification, and removes the path key once it has no subscribers.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;

use crate::path::Path;
use crate::value::Value;

type Callback = Rc<dyn Fn(&Path, &Value)>;

#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: Cell<u64>,
    by_path: RefCell<AHashMap<Path, Vec<(u64, Callback)>>>,
}

impl Subscribers {
    pub(crate) fn subscribe(
        self: &Rc<Self>,
        path: Path,
        callback: impl Fn(&Path, &Value) + 'static,
    ) -> Subscription {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.by_path
            .borrow_mut()
            .entry(path.clone())
            .or_default()
            .push((id, Rc::new(callback)));
        Subscription {
            owner: Rc::downgrade(self),
            path,
            id,
        }
    }

    fn unsubscribe(&self, path: &Path, id: u64) {
        let mut by_path = self.by_path.borrow_mut();
        if let Some(list) = by_path.get_mut(path) {
            list.retain(|(sid, _)| *sid != id);
            if list.is_empty() {
                by_path.remove(path);
            }
        }
    }

    pub(crate) fn notify(&self, path: &Path, value: &Value) {
        let callbacks: Vec<Callback> = match self.by_path.borrow().get(path) {
            Some(list) => list.iter().map(|(_, cb)| Rc::clone(cb)).collect(),
            None => return,
        };
        for callback in callbacks {
            callback(path, value);
        }
    }

    pub(crate) fn count(&self, path: &str) -> usize {
        self.by_path.borrow().get(path).map_or(0, Vec::len)
    }

    pub(crate) fn path_count(&self) -> usize {
        self.by_path.borrow().len()
    }
}

/// RAII guard for a path subscription.
///
/// Dropping it (or calling [`unsubscribe`](Self::unsubscribe)) removes the
/// callback. Outliving the runtime is harmless.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    owner: Weak<Subscribers>,
    path: Path,
    id: u64,
}

impl Subscription {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the callback now.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(owner) = self.owner.upgrade() {
            owner.unsubscribe(&self.path, self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("path", &self.path)
            .field("id", &self.id)
            .finish()
    }
}
