#![forbid(unsafe_code)]

//! Object interception layer.
//!
//! A [`Reactive`] wraps one object or array [`Node`] so that every read is
//! recorded by the current tracking context and every effective write
//! notifies path subscribers and schedules a batch entry.
//!
//! # Design
//!
//! Wrappers are created lazily. Only the root is wrapped by
//! [`Runtime::wrap`]; a nested container is wrapped the first time it is read
//! and the child wrapper is cached by field name, so wrapping cost follows
//! access rather than data size. All wrappers created under one root share a
//! visited set of nodes: meeting a node that is already wrapped in the same
//! tree (a cycle, or the same object reachable twice) returns it unwrapped
//! with a warning instead of recursing.
//!
//! # Invariants
//!
//! 1. Wrapping a [`Reactive`] returns it unchanged; wrapping a node that is
//!    already a root of the runtime returns the existing root.
//! 2. A write whose value is strictly equal to the current one is accepted
//!    but produces no notification and no batch entry.
//! 3. Reads record the resolved child path (`user.name`), not the bare key.
//! 4. Repeated reads of an unchanged nested container return the same child
//!    wrapper.
//!
//! # Failure Modes
//!
//! - **Non-container root**: [`ReactiveError::InvalidRoot`].
//! - **Non-index key on an array**: [`ReactiveError::InvalidKey`].
//! - **Writing below a primitive**: [`ReactiveError::NotAContainer`].

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use tracing::warn;

use crate::error::{ReactiveError, Result};
use crate::path::{Path, parse_index};
use crate::runtime::Runtime;
use crate::value::{Node, NodeId, Value, WeakNode};

/// Callback receiving `(path, new, old)` after each effective write.
pub type ChangeCallback = Rc<dyn Fn(&Path, &Value, &Value)>;

// ---------------------------------------------------------------------------
// Options and inputs
// ---------------------------------------------------------------------------

/// Options for [`Runtime::wrap_with`].
#[derive(Clone)]
pub struct WrapOptions {
    pub(crate) deep: bool,
    pub(crate) path: Path,
    pub(crate) on_change: Option<ChangeCallback>,
}

impl Default for WrapOptions {
    fn default() -> Self {
        Self {
            deep: true,
            path: Path::root(),
            on_change: None,
        }
    }
}

impl WrapOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap nested containers on read (default) or hand them out raw.
    #[must_use]
    pub fn with_deep(mut self, deep: bool) -> Self {
        self.deep = deep;
        self
    }

    /// Prefix every path produced by this tree.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<Path>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_on_change(mut self, on_change: impl Fn(&Path, &Value, &Value) + 'static) -> Self {
        self.on_change = Some(Rc::new(on_change));
        self
    }
}

impl fmt::Debug for WrapOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrapOptions")
            .field("deep", &self.deep)
            .field("path", &self.path)
            .field("on_change", &self.on_change.is_some())
            .finish()
    }
}

/// Input to [`Runtime::wrap`]: plain data or an existing wrapper.
#[derive(Debug, Clone)]
pub enum Source {
    Plain(Value),
    Wrapped(Reactive),
}

impl From<Value> for Source {
    fn from(value: Value) -> Self {
        Self::Plain(value)
    }
}

impl From<Node> for Source {
    fn from(node: Node) -> Self {
        Self::Plain(Value::Node(node))
    }
}

impl From<serde_json::Value> for Source {
    fn from(json: serde_json::Value) -> Self {
        Self::Plain(Value::from_json(&json))
    }
}

impl From<Reactive> for Source {
    fn from(reactive: Reactive) -> Self {
        Self::Wrapped(reactive)
    }
}

impl From<&Reactive> for Source {
    fn from(reactive: &Reactive) -> Self {
        Self::Wrapped(reactive.clone())
    }
}

// ---------------------------------------------------------------------------
// Field
// ---------------------------------------------------------------------------

/// Result of reading through a wrapper.
#[derive(Debug, Clone)]
pub enum Field {
    /// A primitive, or a container handed out raw (shallow mode, cycles).
    Value(Value),
    /// A nested container, wrapped.
    Wrapped(Reactive),
}

impl Field {
    /// The plain value, unwrapping a wrapped container to its node.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Value(value) => value,
            Self::Wrapped(reactive) => Value::Node(reactive.node().clone()),
        }
    }

    #[must_use]
    pub fn as_reactive(&self) -> Option<&Reactive> {
        match self {
            Self::Wrapped(reactive) => Some(reactive),
            Self::Value(_) => None,
        }
    }

    #[must_use]
    pub fn into_reactive(self) -> Option<Reactive> {
        match self {
            Self::Wrapped(reactive) => Some(reactive),
            Self::Value(_) => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Value(value) => value.as_f64(),
            Self::Wrapped(_) => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Value(value) => value.as_bool(),
            Self::Wrapped(_) => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Value(value) => value.as_str(),
            Self::Wrapped(_) => None,
        }
    }

    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Value(Value::Undefined))
    }
}

// ---------------------------------------------------------------------------
// Accessor
// ---------------------------------------------------------------------------

/// Key-level interception seam implemented by [`Reactive`].
pub trait Accessor {
    /// Path of the wrapped container from the tree root.
    fn path(&self) -> &Path;

    /// Read a field, recording `path.key` in the current tracking context.
    fn get(&self, key: &str) -> Field;

    /// Write a field, notifying only if the value changed.
    fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Remove a field, notifying with `Undefined` if it existed.
    fn delete(&self, key: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Reactive
// ---------------------------------------------------------------------------

/// Nodes wrapped anywhere in one tree. Entries are weak so a node freed and
/// reallocated at the same address is not mistaken for a visited one.
#[derive(Default)]
struct WrapScope {
    visited: RefCell<AHashMap<NodeId, WeakNode>>,
}

impl WrapScope {
    fn contains(&self, node: &Node) -> bool {
        self.visited
            .borrow()
            .get(&node.id())
            .and_then(WeakNode::upgrade)
            .is_some_and(|seen| seen.ptr_eq(node))
    }

    fn insert(&self, node: &Node) {
        self.visited.borrow_mut().insert(node.id(), node.downgrade());
    }

    fn remove(&self, node: &Node) {
        self.visited.borrow_mut().remove(&node.id());
    }
}

pub(crate) struct ReactiveInner {
    runtime: Runtime,
    target: Node,
    path: Path,
    deep: bool,
    on_change: Option<ChangeCallback>,
    scope: Rc<WrapScope>,
    children: RefCell<AHashMap<String, Reactive>>,
}

pub(crate) type WeakReactive = Weak<ReactiveInner>;

/// An observable wrapper around an object or array node. Cheap to clone;
/// clones are the same wrapper.
#[derive(Clone)]
pub struct Reactive {
    inner: Rc<ReactiveInner>,
}

impl Reactive {
    pub(crate) fn root(runtime: Runtime, target: Node, options: WrapOptions) -> Self {
        let scope = Rc::new(WrapScope::default());
        scope.insert(&target);
        Self {
            inner: Rc::new(ReactiveInner {
                runtime,
                target,
                path: options.path,
                deep: options.deep,
                on_change: options.on_change,
                scope,
                children: RefCell::new(AHashMap::new()),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakReactive {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &WeakReactive) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// Whether both handles are the same wrapper.
    #[must_use]
    pub fn ptr_eq(&self, other: &Reactive) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    #[must_use]
    pub fn is_deep(&self) -> bool {
        self.inner.deep
    }

    /// The wrapped node. Mutating it directly bypasses notification.
    #[must_use]
    pub fn node(&self) -> &Node {
        &self.inner.target
    }

    #[must_use]
    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    #[must_use]
    pub fn is_array(&self) -> bool {
        self.inner.target.is_array()
    }

    /// Read a field. See [`Accessor::get`].
    pub fn get(&self, key: &str) -> Field {
        let path = self.inner.path.child(key);
        self.inner.runtime.record(&path);
        match self.inner.target.get(key) {
            Value::Node(node) if self.inner.deep => self.wrap_child(key, node, path),
            value => Field::Value(value),
        }
    }

    fn wrap_child(&self, key: &str, node: Node, path: Path) -> Field {
        let cached = self
            .inner
            .children
            .borrow()
            .get(key)
            .filter(|child| child.inner.target.ptr_eq(&node))
            .cloned();
        if let Some(child) = cached {
            return Field::Wrapped(child);
        }
        self.evict_child(key);

        if self.inner.scope.contains(&node) {
            warn!(
                path = %path,
                "object is already wrapped in this tree (cyclic or shared reference); returning it unwrapped"
            );
            return Field::Value(Value::Node(node));
        }
        self.inner.scope.insert(&node);

        let child = Self {
            inner: Rc::new(ReactiveInner {
                runtime: self.inner.runtime.clone(),
                target: node,
                path,
                deep: true,
                on_change: self.inner.on_change.clone(),
                scope: Rc::clone(&self.inner.scope),
                children: RefCell::new(AHashMap::new()),
            }),
        };
        self.inner
            .children
            .borrow_mut()
            .insert(key.to_owned(), child.clone());
        Field::Wrapped(child)
    }

    fn evict_child(&self, key: &str) {
        let evicted = self.inner.children.borrow_mut().remove(key);
        if let Some(child) = evicted {
            child.release();
        }
    }

    /// Drop cached children at array indices `len` and above.
    fn evict_from_index(&self, len: usize) {
        let mut evicted = Vec::new();
        self.inner.children.borrow_mut().retain(|key, child| {
            if parse_index(key).is_some_and(|index| index >= len) {
                evicted.push(child.clone());
                false
            } else {
                true
            }
        });
        for child in evicted {
            child.release();
        }
    }

    /// Forget this wrapper's subtree in the shared visited set.
    fn release(&self) {
        self.inner.scope.remove(&self.inner.target);
        let children: Vec<Reactive> = self
            .inner
            .children
            .borrow_mut()
            .drain()
            .map(|(_, child)| child)
            .collect();
        for child in children {
            child.release();
        }
    }

    /// Write a field. See [`Accessor::set`].
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let target = &self.inner.target;
        let old = target.get(key);
        if old.strict_eq(&value) {
            return Ok(());
        }
        let old_len = target.is_array().then(|| target.len());
        target.insert(key, value.clone())?;
        self.evict_child(key);

        let path = self.inner.path.child(key);
        self.inner.runtime.notify_change(&path, &value);
        if let Some(old_len) = old_len {
            let len = target.len();
            if len < old_len {
                self.evict_from_index(len);
            }
            if len != old_len && key != "length" {
                self.inner
                    .runtime
                    .notify_change(&self.inner.path.child("length"), &Value::from(len));
            }
        }
        if let Some(on_change) = &self.inner.on_change {
            on_change(&path, &value, &old);
        }
        Ok(())
    }

    /// Remove a field. See [`Accessor::delete`].
    pub fn delete(&self, key: &str) -> Result<()> {
        if !self.inner.target.contains_key(key) {
            return Ok(());
        }
        let old = self.inner.target.remove(key).unwrap_or_default();
        self.evict_child(key);

        let path = self.inner.path.child(key);
        self.inner.runtime.notify_change(&path, &Value::Undefined);
        if let Some(on_change) = &self.inner.on_change {
            on_change(&path, &Value::Undefined, &old);
        }
        Ok(())
    }

    /// Append to a wrapped array.
    pub fn push(&self, value: impl Into<Value>) -> Result<()> {
        if !self.is_array() {
            return Err(ReactiveError::InvalidKey {
                key: "push".to_owned(),
            });
        }
        let index = self.inner.target.len().to_string();
        self.set(&index, value)
    }

    /// Read a nested field relative to this wrapper, recording every
    /// intermediate path. Raw containers (shallow mode, cycles) are walked
    /// without recording.
    pub fn field_at(&self, path: impl Into<Path>) -> Field {
        let path = path.into();
        let Some((last, parents)) = path.segments().split_last() else {
            return Field::Wrapped(self.clone());
        };
        let mut cursor = Field::Wrapped(self.clone());
        for segment in parents {
            cursor = match cursor {
                Field::Wrapped(reactive) => reactive.get(segment.as_str()),
                Field::Value(Value::Node(node)) => Field::Value(node.get(segment.as_str())),
                Field::Value(_) => return Field::Value(Value::Undefined),
            };
        }
        match cursor {
            Field::Wrapped(reactive) => reactive.get(last.as_str()),
            Field::Value(Value::Node(node)) => Field::Value(node.get(last.as_str())),
            Field::Value(_) => Field::Value(Value::Undefined),
        }
    }

    /// Plain value at a nested path (`Undefined` if any step is missing).
    pub fn get_path(&self, path: impl Into<Path>) -> Value {
        self.field_at(path).into_value()
    }

    /// Write a nested field relative to this wrapper.
    ///
    /// Writes into raw containers (shallow mode) are applied but not
    /// observed.
    pub fn set_path(&self, path: impl Into<Path>, value: impl Into<Value>) -> Result<()> {
        let path = path.into();
        let (parent, last) = self.split_target(&path)?;
        match self.field_at(&parent) {
            Field::Wrapped(reactive) => reactive.set(&last, value),
            Field::Value(Value::Node(node)) => node.insert(&last, value.into()).map(drop),
            Field::Value(_) => Err(ReactiveError::NotAContainer {
                path: self.inner.path.join(&parent).to_string(),
            }),
        }
    }

    /// Remove a nested field relative to this wrapper.
    pub fn delete_path(&self, path: impl Into<Path>) -> Result<()> {
        let path = path.into();
        let (parent, last) = self.split_target(&path)?;
        match self.field_at(&parent) {
            Field::Wrapped(reactive) => reactive.delete(&last),
            Field::Value(Value::Node(node)) => {
                node.remove(&last);
                Ok(())
            }
            Field::Value(_) => Err(ReactiveError::NotAContainer {
                path: self.inner.path.join(&parent).to_string(),
            }),
        }
    }

    fn split_target(&self, path: &Path) -> Result<(Path, String)> {
        let last = path.last().ok_or_else(|| ReactiveError::InvalidKey {
            key: String::new(),
        })?;
        Ok((path.parent().unwrap_or_default(), last.as_str().to_owned()))
    }

    /// Keys of the wrapped container (not recorded).
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.target.keys()
    }

    /// Number of fields (object) or slots (array), not recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.target.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.target.is_empty()
    }

    /// JSON snapshot of the wrapped data (not recorded).
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Value::Node(self.inner.target.clone()).to_json()
    }

    #[cfg(test)]
    pub(crate) fn cached_children(&self) -> usize {
        self.inner.children.borrow().len()
    }
}

impl Accessor for Reactive {
    fn path(&self) -> &Path {
        Reactive::path(self)
    }

    fn get(&self, key: &str) -> Field {
        Reactive::get(self, key)
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        Reactive::set(self, key, value)
    }

    fn delete(&self, key: &str) -> Result<()> {
        Reactive::delete(self, key)
    }
}

impl From<&Reactive> for Value {
    fn from(reactive: &Reactive) -> Self {
        Value::Node(reactive.node().clone())
    }
}

impl From<Reactive> for Value {
    fn from(reactive: Reactive) -> Self {
        Value::Node(reactive.node().clone())
    }
}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactive")
            .field("path", &self.inner.path)
            .field("deep", &self.inner.deep)
            .field("node", &self.inner.target)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
