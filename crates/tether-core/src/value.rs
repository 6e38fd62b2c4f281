#![forbid(unsafe_code)]

//! Plain data wrapped by the runtime.
//!
//! [`Value`] is a dynamic value with reference semantics for containers:
//! objects and arrays live in a shared [`Node`], so two values can point at
//! the same container, a container can contain itself, and "did this write
//! change anything" is answered by identity for containers and by value for
//! primitives ([`Value::strict_eq`]).
//!
//! `serde_json::Value` is the interchange format at the boundary
//! ([`Value::from_json`], [`Value::to_json`]).

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashSet;
use indexmap::IndexMap;

use crate::error::{ReactiveError, Result};
use crate::path::{Path, parse_index};

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// Contents of a [`Node`].
#[derive(Debug, Clone)]
pub enum Container {
    Object(IndexMap<String, Value>),
    Array(Vec<Value>),
}

/// Identity of a [`Node`], stable while the node is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// A shared, interior-mutable object or array. Cloning shares the container.
#[derive(Clone)]
pub struct Node {
    inner: Rc<RefCell<Container>>,
}

/// Non-owning handle to a [`Node`].
#[derive(Clone)]
pub struct WeakNode {
    inner: Weak<RefCell<Container>>,
}

impl WeakNode {
    #[must_use]
    pub fn upgrade(&self) -> Option<Node> {
        self.inner.upgrade().map(|inner| Node { inner })
    }
}

impl Node {
    #[must_use]
    pub fn object() -> Self {
        Self::from_container(Container::Object(IndexMap::new()))
    }

    #[must_use]
    pub fn array() -> Self {
        Self::from_container(Container::Array(Vec::new()))
    }

    #[must_use]
    pub fn from_container(container: Container) -> Self {
        Self {
            inner: Rc::new(RefCell::new(container)),
        }
    }

    #[must_use]
    pub fn from_entries<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::from_container(Container::Object(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    #[must_use]
    pub fn from_items(items: impl IntoIterator<Item = Value>) -> Self {
        Self::from_container(Container::Array(items.into_iter().collect()))
    }

    #[must_use]
    pub fn id(&self) -> NodeId {
        NodeId(Rc::as_ptr(&self.inner) as *const () as usize)
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakNode {
        WeakNode {
            inner: Rc::downgrade(&self.inner),
        }
    }

    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(*self.inner.borrow(), Container::Array(_))
    }

    /// Borrow the container for inspection.
    ///
    /// # Panics
    ///
    /// Panics if the node is being mutated through the same handle.
    #[must_use]
    pub fn borrow(&self) -> Ref<'_, Container> {
        self.inner.borrow()
    }

    /// Number of entries (object) or slots (array).
    #[must_use]
    pub fn len(&self) -> usize {
        match &*self.inner.borrow() {
            Container::Object(map) => map.len(),
            Container::Array(items) => items.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        match &*self.inner.borrow() {
            Container::Object(map) => map.keys().cloned().collect(),
            Container::Array(items) => (0..items.len()).map(|i| i.to_string()).collect(),
        }
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        match &*self.inner.borrow() {
            Container::Object(map) => map.contains_key(key),
            Container::Array(items) => parse_index(key).is_some_and(|i| i < items.len()),
        }
    }

    /// Read a field. Absent keys read as [`Value::Undefined`]; arrays also
    /// answer `length`.
    #[must_use]
    pub fn get(&self, key: &str) -> Value {
        match &*self.inner.borrow() {
            Container::Object(map) => map.get(key).cloned().unwrap_or_default(),
            Container::Array(items) => {
                if key == "length" {
                    return Value::Number(items.len() as f64);
                }
                parse_index(key)
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or_default()
            }
        }
    }

    /// Write a field and return the previous value.
    ///
    /// Arrays grow when written past the end, padding with `Undefined`.
    pub fn insert(&self, key: &str, value: Value) -> Result<Value> {
        match &mut *self.inner.borrow_mut() {
            Container::Object(map) => Ok(map.insert(key.to_owned(), value).unwrap_or_default()),
            Container::Array(items) => {
                let invalid = || ReactiveError::InvalidKey {
                    key: key.to_owned(),
                };
                if key == "length" {
                    let len = value
                        .as_f64()
                        .filter(|n| n.fract() == 0.0 && *n >= 0.0 && *n <= MAX_ARRAY_LENGTH as f64)
                        .ok_or_else(invalid)? as usize;
                    let old = items.len();
                    resize_array(items, len).ok_or_else(invalid)?;
                    return Ok(Value::Number(old as f64));
                }
                let index = parse_index(key)
                    .filter(|index| *index < MAX_ARRAY_LENGTH)
                    .ok_or_else(invalid)?;
                if index >= items.len() {
                    resize_array(items, index + 1).ok_or_else(invalid)?;
                }
                Ok(std::mem::replace(&mut items[index], value))
            }
        }
    }

    /// Remove a field and return it. Array slots become holes (`Undefined`)
    /// so later indices keep their positions.
    pub fn remove(&self, key: &str) -> Option<Value> {
        match &mut *self.inner.borrow_mut() {
            Container::Object(map) => map.shift_remove(key),
            Container::Array(items) => {
                let slot = items.get_mut(parse_index(key)?)?;
                Some(std::mem::take(slot))
            }
        }
    }

    /// Append to an array node. No-op on objects.
    pub fn push(&self, value: Value) {
        if let Container::Array(items) = &mut *self.inner.borrow_mut() {
            items.push(value);
        }
    }
}

impl fmt::Debug for Node {
    // Shallow on purpose: nodes may contain themselves.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_array() { "array" } else { "object" };
        write!(f, "Node({kind}, len={}, {:#x})", self.len(), self.id().0)
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A dynamic value: a primitive or a shared container.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Node(Node),
}

impl Value {
    /// A fresh, empty object.
    #[must_use]
    pub fn object() -> Self {
        Self::Node(Node::object())
    }

    /// A fresh, empty array.
    #[must_use]
    pub fn array() -> Self {
        Self::Node(Node::array())
    }

    /// Identity for containers, value equality for primitives. `NaN` is not
    /// equal to itself.
    #[must_use]
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Node(a), Self::Node(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// `Undefined` or `Null`.
    #[must_use]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Node(_) => true,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Self::Node(node) => Some(node),
            _ => None,
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Node(node) if node.is_array() => "array",
            Self::Node(_) => "object",
        }
    }

    /// Render the value for display in a UI.
    ///
    /// Integral numbers print without a fractional part, arrays are
    /// comma-joined with nullish items left empty, objects print as JSON.
    #[must_use]
    pub fn display_string(&self) -> String {
        let mut seen = AHashSet::new();
        self.display_into(&mut seen)
    }

    fn display_into(&self, seen: &mut AHashSet<NodeId>) -> String {
        match self {
            Self::Undefined => "undefined".to_owned(),
            Self::Null => "null".to_owned(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::String(s) => s.clone(),
            Self::Node(node) if node.is_array() => {
                if !seen.insert(node.id()) {
                    return String::new();
                }
                let items: Vec<Value> = match &*node.borrow() {
                    Container::Array(items) => items.clone(),
                    Container::Object(_) => Vec::new(),
                };
                let out = items
                    .iter()
                    .map(|item| {
                        if item.is_nullish() {
                            String::new()
                        } else {
                            item.display_into(seen)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(",");
                seen.remove(&node.id());
                out
            }
            Self::Node(_) => self
                .to_json()
                .map(|json| json.to_string())
                .unwrap_or_else(|_| "[object Object]".to_owned()),
        }
    }

    /// Deep conversion from JSON. Every object and array becomes a new node.
    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::String(s.clone()),
            serde_json::Value::Array(items) => {
                Self::Node(Node::from_items(items.iter().map(Self::from_json)))
            }
            serde_json::Value::Object(map) => Self::Node(Node::from_entries(
                map.iter().map(|(k, v)| (k.clone(), Self::from_json(v))),
            )),
        }
    }

    /// Deep conversion to JSON. `Undefined` object fields are omitted,
    /// `Undefined` array slots and non-finite numbers become `null`.
    ///
    /// Fails with [`ReactiveError::CyclicData`] if a node contains itself.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut ancestors = Vec::new();
        self.to_json_at(&Path::root(), &mut ancestors)
    }

    fn to_json_at(&self, at: &Path, ancestors: &mut Vec<NodeId>) -> Result<serde_json::Value> {
        Ok(match self {
            Self::Undefined | Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => json_number(*n),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Node(node) => {
                if ancestors.contains(&node.id()) {
                    return Err(ReactiveError::CyclicData {
                        path: at.to_string(),
                    });
                }
                ancestors.push(node.id());
                let container = node.borrow().clone();
                let json = match container {
                    Container::Array(items) => serde_json::Value::Array(
                        items
                            .iter()
                            .enumerate()
                            .map(|(i, item)| item.to_json_at(&at.child(&i.to_string()), ancestors))
                            .collect::<Result<_>>()?,
                    ),
                    Container::Object(map) => {
                        let mut out = serde_json::Map::with_capacity(map.len());
                        for (key, item) in &map {
                            if item.is_undefined() {
                                continue;
                            }
                            out.insert(key.clone(), item.to_json_at(&at.child(key), ancestors)?);
                        }
                        serde_json::Value::Object(out)
                    }
                };
                ancestors.pop();
                json
            }
        })
    }
}

/// Largest array length a browser accepts (2^32 - 1). The highest index is
/// one less.
const MAX_ARRAY_LENGTH: usize = u32::MAX as usize;

/// Most slots one write may add. Arrays are dense, so a far index would
/// otherwise allocate every hole before it.
const MAX_ARRAY_GROWTH: usize = 1 << 20;

/// Grow or shrink `items` to `len`. Returns `None` past [`MAX_ARRAY_LENGTH`],
/// for growth beyond [`MAX_ARRAY_GROWTH`], or when the allocator refuses.
fn resize_array(items: &mut Vec<Value>, len: usize) -> Option<()> {
    if len > MAX_ARRAY_LENGTH || len.saturating_sub(items.len()) > MAX_ARRAY_GROWTH {
        return None;
    }
    if let Some(additional) = len.checked_sub(items.len()) {
        items.try_reserve_exact(additional).ok()?;
    }
    items.resize(len, Value::Undefined);
    Some(())
}

/// Largest integer an f64 represents exactly (2^53 - 1).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

fn json_number(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return serde_json::Value::Number((n as i64).into());
    }
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned()
    } else if n == 0.0 {
        // Covers -0.
        "0".to_owned()
    } else if n.abs() >= 1e21 || n.abs() < 1e-6 {
        // Exponent form with an explicit sign, as browsers print it: `1e+21`.
        let formatted = format!("{n:e}");
        match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{mantissa}e+{exponent}")
            }
            _ => formatted,
        }
    } else {
        n.to_string()
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Node> for Value {
    fn from(value: Node) -> Self {
        Self::Node(value)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Self::from_json(&value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
