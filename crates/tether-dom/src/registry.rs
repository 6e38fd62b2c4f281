#![forbid(unsafe_code)]

//! Binding registry: an arena of bindings indexed by element and by path.
//!
//! # Invariants
//!
//! 1. Every registered binding appears in exactly one element list and one
//!    path set.
//! 2. Removing the last binding of an element or a path removes that key, so
//!    the indexes never hold empty entries.
//! 3. Lookups return bindings ordered by [`BindingId`] (creation order).
//! 4. No internal borrow is held while a binding's teardown runs.

use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use indexmap::IndexSet;
use tether_core::{Path, PathPattern};
use tracing::{trace, warn};

use crate::binding::{Binding, BindingId};
use crate::element::ElementId;

#[derive(Default)]
struct RegistryState {
    bindings: AHashMap<BindingId, Binding>,
    by_element: AHashMap<ElementId, Vec<BindingId>>,
    by_path: AHashMap<Path, IndexSet<BindingId>>,
}

impl RegistryState {
    fn collect(&self, ids: impl IntoIterator<Item = BindingId>) -> Vec<Binding> {
        let mut ids: Vec<BindingId> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        ids.iter()
            .filter_map(|id| self.bindings.get(id).cloned())
            .collect()
    }
}

/// Shared handle to a binding registry. Clones are the same registry.
#[derive(Clone, Default)]
pub struct BindingRegistry {
    state: Rc<RefCell<RegistryState>>,
}

#[derive(Clone)]
pub(crate) struct WeakRegistry(Weak<RefCell<RegistryState>>);

impl WeakRegistry {
    pub(crate) fn upgrade(&self) -> Option<BindingRegistry> {
        self.0.upgrade().map(|state| BindingRegistry { state })
    }
}

impl BindingRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn downgrade(&self) -> WeakRegistry {
        WeakRegistry(Rc::downgrade(&self.state))
    }

    /// Index `binding` under its element and path.
    pub fn register(&self, binding: &Binding) {
        let id = binding.id();
        {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            if state.bindings.insert(id, binding.clone()).is_some() {
                return;
            }
            state.by_element.entry(binding.element()).or_default().push(id);
            state
                .by_path
                .entry(binding.path().clone())
                .or_default()
                .insert(id);
        }
        binding.attach(self.downgrade());
        trace!(binding = %id, path = %binding.path(), element = %binding.element(), "registered");
    }

    /// Remove a binding from every index without tearing it down.
    pub fn unregister(&self, id: BindingId) -> Option<Binding> {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        let binding = state.bindings.remove(&id)?;

        let element = binding.element();
        if let Some(list) = state.by_element.get_mut(&element) {
            list.retain(|other| *other != id);
            if list.is_empty() {
                state.by_element.remove(&element);
            }
        }
        if let Some(set) = state.by_path.get_mut(binding.path()) {
            set.shift_remove(&id);
            if set.is_empty() {
                state.by_path.remove(binding.path());
            }
        }
        trace!(binding = %id, path = %binding.path(), "unregistered");
        Some(binding)
    }

    #[must_use]
    pub fn get(&self, id: BindingId) -> Option<Binding> {
        self.state.borrow().bindings.get(&id).cloned()
    }

    #[must_use]
    pub fn get_by_element(&self, element: ElementId) -> Vec<Binding> {
        let state = self.state.borrow();
        let ids = state.by_element.get(&element).into_iter().flatten().copied();
        state.collect(ids)
    }

    #[must_use]
    pub fn get_by_path(&self, path: &str) -> Vec<Binding> {
        let state = self.state.borrow();
        let ids = state.by_path.get(path).into_iter().flatten().copied();
        state.collect(ids)
    }

    /// Union of the bindings on every path the glob matches. `.` is literal
    /// and `*` matches any run of characters, dots included.
    ///
    /// A pattern that fails to compile matches nothing and logs a warning.
    #[must_use]
    pub fn get_by_path_pattern(&self, pattern: &str) -> Vec<Binding> {
        let pattern = match PathPattern::new(pattern) {
            Ok(pattern) => pattern,
            Err(err) => {
                warn!(pattern, error = %err, "path pattern rejected");
                return Vec::new();
            }
        };
        let state = self.state.borrow();
        let ids = state
            .by_path
            .iter()
            .filter(|(path, _)| pattern.matches(path.as_str()))
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect::<Vec<_>>();
        state.collect(ids)
    }

    /// Bindings on `path` and on every path below it.
    #[must_use]
    pub fn get_by_subtree(&self, path: &Path) -> Vec<Binding> {
        let state = self.state.borrow();
        let ids = state
            .by_path
            .iter()
            .filter(|(bound, _)| *bound == path || bound.is_descendant_of(path))
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect::<Vec<_>>();
        state.collect(ids)
    }

    /// Destroy every binding of `element`. Returns how many were destroyed.
    pub fn dispose_element(&self, element: ElementId) -> usize {
        let bindings = self.get_by_element(element);
        for binding in &bindings {
            binding.destroy();
        }
        bindings.len()
    }

    /// Destroy every binding and empty all indexes.
    pub fn clear(&self) {
        let state = mem::take(&mut *self.state.borrow_mut());
        let mut bindings: Vec<Binding> = state.bindings.into_values().collect();
        bindings.sort_unstable_by_key(Binding::id);
        for binding in bindings {
            binding.destroy();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.borrow().bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.borrow().bindings.is_empty()
    }

    /// Number of distinct paths in the path index.
    #[must_use]
    pub fn path_count(&self) -> usize {
        self.state.borrow().by_path.len()
    }

    #[must_use]
    pub fn element_count(&self) -> usize {
        self.state.borrow().by_element.len()
    }
}

impl fmt::Debug for BindingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("BindingRegistry")
            .field("bindings", &state.bindings.len())
            .field("paths", &state.by_path.len())
            .field("elements", &state.by_element.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::BindingKind;
    use std::cell::Cell;

    fn binding(element: ElementId, path: &str) -> Binding {
        Binding::new(element, Path::parse(path), BindingKind::Bind, || {}, || {})
    }

    fn ids(bindings: &[Binding]) -> Vec<BindingId> {
        bindings.iter().map(Binding::id).collect()
    }

    #[test]
    fn unregister_drops_empty_path_keys() {
        let registry = BindingRegistry::new();
        let bindings: Vec<Binding> = (0..3).map(|_| binding(ElementId::next(), "count")).collect();
        for b in &bindings {
            registry.register(b);
        }
        assert_eq!(registry.path_count(), 1);

        registry.unregister(bindings[0].id());
        assert_eq!(registry.get_by_path("count").len(), 2);

        registry.unregister(bindings[1].id());
        registry.unregister(bindings[2].id());
        assert!(registry.get_by_path("count").is_empty());
        assert_eq!(registry.path_count(), 0);
        assert_eq!(registry.element_count(), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn pattern_lookup() {
        let registry = BindingRegistry::new();
        let el = ElementId::next();
        let name = binding(el, "user.name");
        let age = binding(el, "user.age");
        let product = binding(el, "product.name");
        for b in [&name, &age, &product] {
            registry.register(b);
        }
        assert_eq!(
            ids(&registry.get_by_path_pattern("user.*")),
            vec![name.id(), age.id()]
        );
        assert_eq!(ids(&registry.get_by_path_pattern("*.name")), vec![name.id(), product.id()]);
        assert!(registry.get_by_path_pattern("user").is_empty());
        assert_eq!(registry.get_by_element(el).len(), 3);
    }

    #[test]
    fn subtree_lookup_is_segment_wise() {
        let registry = BindingRegistry::new();
        let el = ElementId::next();
        let user = binding(el, "user");
        let name = binding(el, "user.name");
        let other = binding(el, "username");
        for b in [&user, &name, &other] {
            registry.register(b);
        }
        assert_eq!(
            ids(&registry.get_by_subtree(&Path::parse("user"))),
            vec![user.id(), name.id()]
        );
    }

    #[test]
    fn destroy_unregisters() {
        let registry = BindingRegistry::new();
        let b = binding(ElementId::next(), "a");
        registry.register(&b);
        b.destroy();
        assert!(registry.is_empty());
        assert!(registry.get(b.id()).is_none());
    }

    #[test]
    fn dispose_element_tears_down_only_that_element() {
        let registry = BindingRegistry::new();
        let torn = Rc::new(Cell::new(0));
        let el = ElementId::next();
        for path in ["a", "b"] {
            let t = Rc::clone(&torn);
            let b = Binding::new(el, Path::parse(path), BindingKind::Bind, || {}, move || {
                t.set(t.get() + 1);
            });
            registry.register(&b);
        }
        let keep = binding(ElementId::next(), "a");
        registry.register(&keep);

        assert_eq!(registry.dispose_element(el), 2);
        assert_eq!(torn.get(), 2);
        assert_eq!(ids(&registry.get_by_path("a")), vec![keep.id()]);
        assert_eq!(registry.path_count(), 1);
    }

    #[test]
    fn clear_destroys_everything() {
        let registry = BindingRegistry::new();
        let b = binding(ElementId::next(), "a");
        registry.register(&b);
        registry.clear();
        assert!(b.is_destroyed());
        assert!(registry.is_empty());
        assert_eq!(registry.path_count(), 0);
    }
}
