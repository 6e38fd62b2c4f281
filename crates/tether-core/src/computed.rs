#![forbid(unsafe_code)]

//! Lazy computed values that re-derive from the paths they read.
//!
//! # Design
//!
//! [`Computed<T>`] wraps a compute function and its cached result in shared,
//! reference-counted storage. Each recomputation runs inside a tracking
//! context; the captured paths become the node's dependency set and one path
//! subscription per dependency marks the node dirty when that path is
//! written. The next call to [`get()`](Computed::get) recomputes and caches
//! the result.
//!
//! Reading a computed inside another tracked call adds the computed's cached
//! dependency set to that call, so an outer computed is invalidated by the
//! same writes that invalidate the inner one.
//!
//! # Invariants
//!
//! 1. If no dependency has changed, `get()` returns the cached value without
//!    calling the compute function.
//! 2. The compute function runs at most once per read after any number of
//!    dependency writes.
//! 3. The subscription set always matches the dependency set of the last
//!    successful computation.
//! 4. Version increments by exactly 1 per successful recomputation.
//!
//! # Failure Modes
//!
//! - **Computed reads itself** (directly or through other computeds): the
//!   inner read fails with [`ReactiveError::CircularDependency`] instead of
//!   recursing.
//! - **Compute function fails or panics**: the cached value and
//!   subscriptions remain from the last successful computation. The dirty
//!   flag stays set so the next `get()` will retry.
//! - **Runtime dropped**: subscriptions become inert; the computed keeps its
//!   last cached value.

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::error::{ReactiveError, Result};
use crate::path::Path;
use crate::runtime::Runtime;
use crate::subscription::Subscription;
use crate::tracking::DependencySet;

type ComputeFn<T> = Box<dyn Fn() -> Result<T>>;

/// Shared interior for [`Computed<T>`].
struct ComputedInner<T> {
    id: u64,
    runtime: Runtime,
    compute: ComputeFn<T>,
    /// `None` only before the first successful computation.
    cached: RefCell<Option<T>>,
    dependencies: RefCell<DependencySet>,
    dirty: Cell<bool>,
    computing: Cell<bool>,
    version: Cell<u64>,
    subscriptions: RefCell<Vec<Subscription>>,
}

/// A lazily evaluated, memoized value derived from reactive reads.
///
/// Cloning a `Computed` creates a new handle to the **same** node.
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.id)
            .field("cached", &self.inner.cached.borrow())
            .field("dirty", &self.inner.dirty.get())
            .field("version", &self.inner.version.get())
            .finish()
    }
}

/// Clears the computing flag, also when the compute function unwinds.
struct ComputingGuard<'a>(&'a Cell<bool>);

impl Drop for ComputingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl<T: Clone + 'static> Computed<T> {
    pub(crate) fn new(runtime: Runtime, id: u64, compute: ComputeFn<T>) -> Self {
        Self {
            inner: Rc::new(ComputedInner {
                id,
                runtime,
                compute,
                cached: RefCell::new(None),
                dependencies: RefCell::new(DependencySet::default()),
                // Dirty initially: computes on first get().
                dirty: Cell::new(true),
                computing: Cell::new(false),
                version: Cell::new(0),
                subscriptions: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Current value, recomputing first if a dependency changed.
    ///
    /// # Errors
    ///
    /// [`ReactiveError::CircularDependency`] when read during its own
    /// recomputation, or whatever the compute function returns.
    pub fn get(&self) -> Result<T> {
        self.refresh()?;
        self.cached().ok_or(ReactiveError::CircularDependency {
            id: self.inner.id,
        })
    }

    /// Run `f` on the current value, recomputing first if needed.
    ///
    /// `f` sees a snapshot, so it may write dependencies and read this
    /// computed again.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        self.refresh()?;
        match self.cached() {
            Some(value) => Ok(f(&value)),
            None => Err(ReactiveError::CircularDependency { id: self.inner.id }),
        }
    }

    fn cached(&self) -> Option<T> {
        self.inner.cached.borrow().clone()
    }

    fn refresh(&self) -> Result<()> {
        let inner = &self.inner;
        if inner.dirty.get() {
            if inner.computing.get() {
                return Err(ReactiveError::CircularDependency { id: inner.id });
            }
            self.recompute()?;
        }
        inner
            .runtime
            .record_all(inner.dependencies.borrow().iter());
        Ok(())
    }

    fn recompute(&self) -> Result<()> {
        let inner = &self.inner;
        inner.computing.set(true);
        let guard = ComputingGuard(&inner.computing);
        let tracked = inner.runtime.track(|| (inner.compute)());
        drop(guard);
        let value = tracked.result?;

        let subscriptions = tracked
            .dependencies
            .iter()
            .map(|path| {
                let weak = Rc::downgrade(&self.inner);
                inner.runtime.subscribe(path.clone(), move |_, _| {
                    if let Some(strong) = weak.upgrade() {
                        strong.dirty.set(true);
                    }
                })
            })
            .collect();
        let previous = inner.subscriptions.replace(subscriptions);
        drop(previous);

        *inner.cached.borrow_mut() = Some(value);
        *inner.dependencies.borrow_mut() = tracked.dependencies;
        inner.dirty.set(false);
        inner.version.set(inner.version.get() + 1);
        trace!(
            id = inner.id,
            version = inner.version.get(),
            dependencies = inner.dependencies.borrow().len(),
            "computed recomputed"
        );
        Ok(())
    }

    /// Whether the next read will recompute.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Force the next read to recompute.
    pub fn invalidate(&self) {
        self.inner.dirty.set(true);
    }

    /// Number of successful recomputations so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Paths read by the last successful computation.
    #[must_use]
    pub fn dependencies(&self) -> Ref<'_, DependencySet> {
        self.inner.dependencies.borrow()
    }

    /// Sorted dependency paths, mostly for assertions and debugging.
    #[must_use]
    pub fn dependency_paths(&self) -> Vec<Path> {
        let mut paths: Vec<Path> = self.inner.dependencies.borrow().iter().cloned().collect();
        paths.sort();
        paths
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Reactive;
    use serde_json::json;

    fn setup(data: serde_json::Value) -> (Runtime, Reactive) {
        let (rt, _) = Runtime::manual();
        let state = rt.wrap(data).unwrap();
        (rt, state)
    }

    fn counter() -> (Rc<Cell<u32>>, Rc<Cell<u32>>) {
        let count = Rc::new(Cell::new(0));
        (Rc::clone(&count), count)
    }

    fn names(c: &Computed<f64>) -> Vec<String> {
        c.dependency_paths().iter().map(ToString::to_string).collect()
    }

    #[test]
    fn cache_hit_does_not_recompute() {
        let (rt, state) = setup(json!({"a": 2}));
        let (calls, c) = counter();
        let doubled = rt.computed(move || {
            c.set(c.get() + 1);
            state.get("a").as_f64().unwrap_or(0.0) * 2.0
        });

        for _ in 0..100 {
            assert_eq!(doubled.get().unwrap(), 4.0);
        }
        assert_eq!(calls.get(), 1);
        assert_eq!(doubled.version(), 1);
    }

    #[test]
    fn several_writes_recompute_once() {
        let (rt, state) = setup(json!({"a": 1, "b": 1}));
        let (calls, c) = counter();
        let s = state.clone();
        let sum = rt.computed(move || {
            c.set(c.get() + 1);
            s.get("a").as_f64().unwrap_or(0.0) + s.get("b").as_f64().unwrap_or(0.0)
        });
        assert_eq!(sum.get().unwrap(), 2.0);

        state.set("a", 10).unwrap();
        state.set("b", 20).unwrap();
        state.set("a", 30).unwrap();
        assert!(sum.is_dirty());
        assert_eq!(sum.get().unwrap(), 50.0);
        assert_eq!(sum.get().unwrap(), 50.0);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn unrelated_write_keeps_cache() {
        let (rt, state) = setup(json!({"a": 1, "other": 1}));
        let s = state.clone();
        let a = rt.computed(move || s.get("a").as_f64().unwrap_or(0.0));
        a.get().unwrap();
        state.set("other", 2).unwrap();
        assert!(!a.is_dirty());
        assert_eq!(names(&a), vec!["a"]);
    }

    #[test]
    fn dependencies_follow_branches() {
        let (rt, state) = setup(json!({"flag": true, "x": 1, "y": 2}));
        let s = state.clone();
        let pick = rt.computed(move || {
            let key = if s.get("flag").as_bool().unwrap_or(false) { "x" } else { "y" };
            s.get(key).as_f64().unwrap_or(0.0)
        });
        assert_eq!(pick.get().unwrap(), 1.0);
        assert_eq!(names(&pick), vec!["flag", "x"]);
        assert_eq!(rt.subscriber_count("x"), 1);

        state.set("flag", false).unwrap();
        assert_eq!(pick.get().unwrap(), 2.0);
        assert_eq!(names(&pick), vec!["flag", "y"]);
        assert_eq!(rt.subscriber_count("x"), 0);
        assert_eq!(rt.subscriber_count("y"), 1);
    }

    #[test]
    fn nested_computed_propagates_dependencies() {
        let (rt, state) = setup(json!({"a": 1}));
        let s = state.clone();
        let inner = rt.computed(move || s.get("a").as_f64().unwrap_or(0.0));
        let i = inner.clone();
        let outer = rt.try_computed(move || Ok(i.get()? + 1.0));

        assert_eq!(outer.get().unwrap(), 2.0);
        assert_eq!(names(&outer), vec!["a"]);

        state.set("a", 5).unwrap();
        assert!(outer.is_dirty());
        assert_eq!(outer.get().unwrap(), 6.0);
    }

    #[test]
    fn direct_cycle_is_detected() {
        let (rt, _state) = setup(json!({}));
        let slot: Rc<RefCell<Option<Computed<f64>>>> = Rc::new(RefCell::new(None));
        let s = Rc::clone(&slot);
        let me = rt.try_computed(move || {
            let this = s.borrow().clone();
            match this {
                Some(this) => this.get(),
                None => Ok(0.0),
            }
        });
        *slot.borrow_mut() = Some(me.clone());

        let err = me.get().unwrap_err();
        assert!(err.is_circular());
        assert_eq!(err, ReactiveError::CircularDependency { id: me.id() });
        assert!(me.is_dirty());
        slot.borrow_mut().take();
    }

    #[test]
    fn mutual_cycle_is_detected() {
        let (rt, _state) = setup(json!({}));
        let slot: Rc<RefCell<Option<Computed<f64>>>> = Rc::new(RefCell::new(None));
        let s = Rc::clone(&slot);
        let b = rt.try_computed(move || {
            let a = s.borrow().clone();
            a.map_or(Ok(0.0), |a| a.get())
        });
        let bc = b.clone();
        let a = rt.try_computed(move || bc.get());
        *slot.borrow_mut() = Some(a.clone());

        assert!(a.get().unwrap_err().is_circular());
        assert!(b.get().unwrap_err().is_circular());
        slot.borrow_mut().take();
    }

    #[test]
    fn failure_keeps_previous_cache() {
        let (rt, state) = setup(json!({"n": 1}));
        let s = state.clone();
        let checked = rt.try_computed(move || {
            let n = s.get("n").as_f64().unwrap_or(0.0);
            if n < 0.0 {
                Err(ReactiveError::InvalidKey { key: "n".into() })
            } else {
                Ok(n)
            }
        });
        assert_eq!(checked.get().unwrap(), 1.0);

        state.set("n", -1).unwrap();
        assert!(checked.get().is_err());
        assert!(checked.is_dirty());
        assert_eq!(checked.version(), 1);
        assert_eq!(names(&checked), vec!["n"]);

        state.set("n", 3).unwrap();
        assert_eq!(checked.get().unwrap(), 3.0);
        assert_eq!(checked.version(), 2);
    }

    #[test]
    fn invalidate_forces_recompute() {
        let (rt, _state) = setup(json!({}));
        let (calls, c) = counter();
        let k = rt.computed(move || {
            c.set(c.get() + 1);
            1.0
        });
        k.get().unwrap();
        k.invalidate();
        k.get().unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn with_reads_cached_value() {
        let (rt, state) = setup(json!({"name": "Ada"}));
        let s = state.clone();
        let upper = rt.computed(move || s.get("name").as_str().unwrap_or("").to_uppercase());
        assert_eq!(upper.with(String::len).unwrap(), 3);
        assert_eq!(upper.get().unwrap(), "ADA");
    }

    #[test]
    fn with_closure_may_write_and_read_again() {
        let (rt, state) = setup(json!({"name": "Ada"}));
        let s = state.clone();
        let upper = rt.computed(move || s.get("name").as_str().unwrap_or("").to_uppercase());
        let (seen, fresh) = upper
            .with(|value| {
                state.set("name", "Grace").unwrap();
                (value.clone(), upper.get().unwrap())
            })
            .unwrap();
        assert_eq!(seen, "ADA");
        assert_eq!(fresh, "GRACE");
        assert_eq!(upper.version(), 2);
    }

    #[test]
    fn dropped_computed_releases_subscriptions() {
        let (rt, state) = setup(json!({"a": 1}));
        let s = state.clone();
        let c = rt.computed(move || s.get("a").as_f64());
        c.get().unwrap();
        assert_eq!(rt.subscriber_count("a"), 1);
        drop(c);
        assert_eq!(rt.subscriber_count("a"), 0);
    }
}
