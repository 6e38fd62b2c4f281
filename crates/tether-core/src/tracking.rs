#![forbid(unsafe_code)]

//! Dependency tracking contexts.
//!
//! A tracked call pushes a fresh dependency set, runs, and pops it. Every path
//! read through a wrapped object while a set is on top of the stack lands in
//! that set, however deep in the call graph the read happens.
//!
//! # Nesting
//!
//! Nested tracked calls get **disjoint** sets: a path read only inside the
//! inner call is not visible to the outer one. Callers merge explicitly with
//! [`Tracker::record_all`]; computed values do exactly that when read, so an
//! outer computation still depends on whatever its inner computeds read.
//!
//! # Invariants
//!
//! 1. The stack depth after a tracked call equals the depth before it, on the
//!    normal path and when the tracked function unwinds.
//! 2. Reads outside any tracked call are not recorded anywhere.

use std::cell::RefCell;

use ahash::AHashSet;

use crate::path::Path;

/// Set of paths read by one tracked call.
pub type DependencySet = AHashSet<Path>;

/// Result of [`Runtime::track`](crate::Runtime::track).
#[derive(Debug, Clone)]
pub struct Tracked<R> {
    pub result: R,
    pub dependencies: DependencySet,
}

/// Stack of active dependency sets.
#[derive(Debug, Default)]
pub(crate) struct Tracker {
    stack: RefCell<Vec<DependencySet>>,
}

impl Tracker {
    pub(crate) fn is_active(&self) -> bool {
        !self.stack.borrow().is_empty()
    }

    pub(crate) fn depth(&self) -> usize {
        self.stack.borrow().len()
    }

    pub(crate) fn record(&self, path: &Path) {
        if let Some(top) = self.stack.borrow_mut().last_mut() {
            top.insert(path.clone());
        }
    }

    pub(crate) fn record_all<'a>(&self, paths: impl IntoIterator<Item = &'a Path>) {
        if let Some(top) = self.stack.borrow_mut().last_mut() {
            top.extend(paths.into_iter().cloned());
        }
    }

    pub(crate) fn track<R>(&self, f: impl FnOnce() -> R) -> Tracked<R> {
        let depth = {
            let mut stack = self.stack.borrow_mut();
            stack.push(DependencySet::default());
            stack.len()
        };
        let guard = ContextGuard {
            tracker: self,
            depth,
            finished: false,
        };
        let result = f();
        let dependencies = guard.finish();
        Tracked {
            result,
            dependencies,
        }
    }
}

/// Pops the context pushed by [`Tracker::track`], also during unwinding.
struct ContextGuard<'a> {
    tracker: &'a Tracker,
    depth: usize,
    finished: bool,
}

impl ContextGuard<'_> {
    fn finish(mut self) -> DependencySet {
        self.finished = true;
        let mut stack = self.tracker.stack.borrow_mut();
        let captured = stack.drain(self.depth - 1..).next();
        captured.unwrap_or_default()
    }
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.tracker.stack.borrow_mut().truncate(self.depth - 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    fn paths(set: &DependencySet) -> Vec<String> {
        let mut out: Vec<String> = set.iter().map(|p| p.to_string()).collect();
        out.sort();
        out
    }

    #[test]
    fn records_only_while_active() {
        let tracker = Tracker::default();
        tracker.record(&Path::parse("outside"));
        let tracked = tracker.track(|| {
            tracker.record(&Path::parse("a"));
            tracker.record(&Path::parse("b"));
            tracker.record(&Path::parse("a"));
            7
        });
        assert_eq!(tracked.result, 7);
        assert_eq!(paths(&tracked.dependencies), vec!["a", "b"]);
        assert!(!tracker.is_active());
    }

    #[test]
    fn nested_contexts_are_disjoint() {
        let tracker = Tracker::default();
        let outer = tracker.track(|| {
            tracker.record(&Path::parse("outer"));
            let inner = tracker.track(|| tracker.record(&Path::parse("inner")));
            assert_eq!(paths(&inner.dependencies), vec!["inner"]);
            tracker.record(&Path::parse("after"));
        });
        assert_eq!(paths(&outer.dependencies), vec!["after", "outer"]);
    }

    #[test]
    fn explicit_merge_into_parent() {
        let tracker = Tracker::default();
        let outer = tracker.track(|| {
            let inner = tracker.track(|| tracker.record(&Path::parse("x")));
            tracker.record_all(&inner.dependencies);
        });
        assert_eq!(paths(&outer.dependencies), vec!["x"]);
    }

    #[test]
    fn context_restored_on_panic() {
        let tracker = Tracker::default();
        let outer = tracker.track(|| {
            let result = catch_unwind(AssertUnwindSafe(|| {
                tracker.track(|| {
                    tracker.record(&Path::parse("lost"));
                    panic!("boom");
                })
            }));
            assert!(result.is_err());
            assert_eq!(tracker.depth(), 1);
            tracker.record(&Path::parse("kept"));
        });
        assert_eq!(paths(&outer.dependencies), vec!["kept"]);
        assert_eq!(tracker.depth(), 0);
    }
}
