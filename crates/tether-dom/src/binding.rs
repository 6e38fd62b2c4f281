#![forbid(unsafe_code)]

//! Binding handles.
//!
//! A [`Binding`] ties one element to one data path. It owns the adapter's
//! `update_dom` function and teardown, and remembers the registry it was
//! registered with so [`destroy`](Binding::destroy) can remove it.
//!
//! # Invariants
//!
//! 1. `destroy` is idempotent: teardown runs once, later calls do nothing.
//! 2. A destroyed binding never touches its element again, even if a flush
//!    already collected it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tether_core::Path;
use tracing::debug;

use crate::element::ElementId;
use crate::registry::WeakRegistry;

/// Stable handle identifying one binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u64);

static NEXT_BINDING_ID: AtomicU64 = AtomicU64::new(1);

impl BindingId {
    fn next() -> Self {
        Self(NEXT_BINDING_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "binding#{}", self.0)
    }
}

/// Direction of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    /// Two-way: data to control and user edits back to data.
    Model,
    /// One-way: data to element.
    Bind,
}

type Teardown = Box<dyn FnOnce()>;

struct BindingInner {
    id: BindingId,
    element: ElementId,
    path: Path,
    kind: BindingKind,
    update: Box<dyn Fn()>,
    teardown: RefCell<Option<Teardown>>,
    registry: RefCell<Option<WeakRegistry>>,
    destroyed: Cell<bool>,
}

/// Handle to a live binding. Clones are the same binding.
#[derive(Clone)]
pub struct Binding {
    inner: Rc<BindingInner>,
}

impl Binding {
    /// Assemble a binding from an update function and a teardown.
    ///
    /// `path` is the absolute path the registry indexes the binding under.
    pub fn new(
        element: ElementId,
        path: Path,
        kind: BindingKind,
        update: impl Fn() + 'static,
        teardown: impl FnOnce() + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(BindingInner {
                id: BindingId::next(),
                element,
                path,
                kind,
                update: Box::new(update),
                teardown: RefCell::new(Some(Box::new(teardown))),
                registry: RefCell::new(None),
                destroyed: Cell::new(false),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> BindingId {
        self.inner.id
    }

    #[must_use]
    pub fn element(&self) -> ElementId {
        self.inner.element
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    #[must_use]
    pub fn kind(&self) -> BindingKind {
        self.inner.kind
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    /// Bring the element in line with the data.
    pub fn update_dom(&self) {
        if !self.inner.destroyed.get() {
            (self.inner.update)();
        }
    }

    /// Run the adapter teardown and unregister.
    pub fn destroy(&self) {
        if self.inner.destroyed.replace(true) {
            return;
        }
        let teardown = self.inner.teardown.borrow_mut().take();
        if let Some(teardown) = teardown {
            teardown();
        }
        let registry = self.inner.registry.borrow_mut().take();
        if let Some(registry) = registry.and_then(|weak| weak.upgrade()) {
            registry.unregister(self.inner.id);
        }
        debug!(binding = %self.inner.id, path = %self.inner.path, "binding destroyed");
    }

    pub(crate) fn attach(&self, registry: WeakRegistry) {
        *self.inner.registry.borrow_mut() = Some(registry);
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.inner.id)
            .field("element", &self.inner.element)
            .field("path", &self.inner.path)
            .field("kind", &self.inner.kind)
            .field("destroyed", &self.inner.destroyed.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destroy_runs_teardown_once_and_stops_updates() {
        let updates = Rc::new(Cell::new(0));
        let teardowns = Rc::new(Cell::new(0));
        let u = Rc::clone(&updates);
        let t = Rc::clone(&teardowns);
        let binding = Binding::new(
            ElementId::next(),
            Path::parse("a"),
            BindingKind::Bind,
            move || u.set(u.get() + 1),
            move || t.set(t.get() + 1),
        );
        binding.update_dom();
        binding.destroy();
        binding.destroy();
        binding.update_dom();

        assert_eq!(updates.get(), 1);
        assert_eq!(teardowns.get(), 1);
        assert!(binding.is_destroyed());
    }
}
