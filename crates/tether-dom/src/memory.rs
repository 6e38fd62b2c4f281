#![forbid(unsafe_code)]

//! In-memory [`Element`] for tests and hosts without a browser DOM.
//!
//! A [`MemoryElement`] models just enough of an HTML element for bindings:
//! a tag, an input type, a value, a checked flag, child nodes (elements or
//! text) and input listeners. Writes through the [`Element`] trait are
//! counted so tests can assert that an equality-guarded update did not touch
//! the element.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::element::{Element, ElementId, InputListener, ListenerId};

/// A child of a [`MemoryElement`].
#[derive(Clone)]
pub enum MemoryNode {
    Element(MemoryElement),
    Text(String),
}

struct MemoryInner {
    id: ElementId,
    tag: String,
    input_type: Option<String>,
    value: RefCell<String>,
    checked: Cell<bool>,
    children: RefCell<Vec<MemoryNode>>,
    listeners: RefCell<Vec<(ListenerId, InputListener)>>,
    next_listener: Cell<u64>,
    mutations: Cell<usize>,
}

/// Shared handle to an in-memory element. Clones are the same element.
#[derive(Clone)]
pub struct MemoryElement {
    inner: Rc<MemoryInner>,
}

impl MemoryElement {
    #[must_use]
    pub fn new(tag: &str) -> Self {
        Self::build(tag, None)
    }

    /// An `<input>` with the given `type`.
    #[must_use]
    pub fn input(input_type: &str) -> Self {
        Self::build("input", Some(input_type.to_ascii_lowercase()))
    }

    fn build(tag: &str, input_type: Option<String>) -> Self {
        Self {
            inner: Rc::new(MemoryInner {
                id: ElementId::next(),
                tag: tag.to_ascii_lowercase(),
                input_type,
                value: RefCell::new(String::new()),
                checked: Cell::new(false),
                children: RefCell::new(Vec::new()),
                listeners: RefCell::new(Vec::new()),
                next_listener: Cell::new(0),
                mutations: Cell::new(0),
            }),
        }
    }

    #[must_use]
    pub fn with_value(self, value: &str) -> Self {
        *self.inner.value.borrow_mut() = value.to_owned();
        self
    }

    /// Append an element child. Not counted as a binding mutation.
    pub fn append_child(&self, child: &MemoryElement) {
        self.inner
            .children
            .borrow_mut()
            .push(MemoryNode::Element(child.clone()));
    }

    pub fn append_text(&self, text: &str) {
        self.inner
            .children
            .borrow_mut()
            .push(MemoryNode::Text(text.to_owned()));
    }

    #[must_use]
    pub fn children(&self) -> Vec<MemoryNode> {
        self.inner.children.borrow().clone()
    }

    /// Descendant elements (not including `self`) with tag `tag`.
    #[must_use]
    pub fn descendants_by_tag(&self, tag: &str) -> Vec<MemoryElement> {
        let tag = tag.to_ascii_lowercase();
        let mut found = Vec::new();
        self.collect_by_tag(&tag, &mut found);
        found
    }

    fn collect_by_tag(&self, tag: &str, found: &mut Vec<MemoryElement>) {
        for child in self.inner.children.borrow().iter() {
            if let MemoryNode::Element(element) = child {
                if element.inner.tag == tag {
                    found.push(element.clone());
                }
                element.collect_by_tag(tag, found);
            }
        }
    }

    /// Set the value as a user would, then fire input listeners.
    pub fn simulate_input(&self, value: &str) {
        *self.inner.value.borrow_mut() = value.to_owned();
        self.fire_input();
    }

    /// Toggle the checked flag as a user would, then fire input listeners.
    pub fn simulate_toggle(&self, checked: bool) {
        self.inner.checked.set(checked);
        self.fire_input();
    }

    fn fire_input(&self) {
        let listeners: Vec<InputListener> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in listeners {
            listener();
        }
    }

    /// Writes made through [`Element`] setters so far.
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.inner.mutations.get()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    fn mutated(&self) {
        self.inner.mutations.set(self.inner.mutations.get() + 1);
    }

    fn text_into(&self, out: &mut String) {
        for child in self.inner.children.borrow().iter() {
            match child {
                MemoryNode::Text(text) => out.push_str(text),
                MemoryNode::Element(element) => element.text_into(out),
            }
        }
    }
}

impl Element for MemoryElement {
    fn id(&self) -> ElementId {
        self.inner.id
    }

    fn tag_name(&self) -> String {
        self.inner.tag.clone()
    }

    fn input_type(&self) -> Option<String> {
        self.inner.input_type.clone()
    }

    fn value(&self) -> String {
        self.inner.value.borrow().clone()
    }

    fn set_value(&self, value: &str) {
        *self.inner.value.borrow_mut() = value.to_owned();
        self.mutated();
    }

    fn checked(&self) -> bool {
        self.inner.checked.get()
    }

    fn set_checked(&self, checked: bool) {
        self.inner.checked.set(checked);
        self.mutated();
    }

    fn text_content(&self) -> String {
        let mut out = String::new();
        self.text_into(&mut out);
        out
    }

    fn set_text_content(&self, text: &str) {
        let mut children = self.inner.children.borrow_mut();
        children.clear();
        if !text.is_empty() {
            children.push(MemoryNode::Text(text.to_owned()));
        }
        drop(children);
        self.mutated();
    }

    fn add_input_listener(&self, listener: InputListener) -> ListenerId {
        let id = ListenerId(self.inner.next_listener.get() + 1);
        self.inner.next_listener.set(id.0);
        self.inner.listeners.borrow_mut().push((id, listener));
        id
    }

    fn remove_input_listener(&self, id: ListenerId) {
        self.inner
            .listeners
            .borrow_mut()
            .retain(|(listener, _)| *listener != id);
    }
}

impl fmt::Debug for MemoryElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryElement")
            .field("id", &self.inner.id)
            .field("tag", &self.inner.tag)
            .field("input_type", &self.inner.input_type)
            .field("value", &self.inner.value.borrow())
            .field("checked", &self.inner.checked.get())
            .field("children", &self.inner.children.borrow().len())
            .finish()
    }
}

impl fmt::Debug for MemoryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Element(element) => write!(f, "<{}>", element.inner.tag),
            Self::Text(text) => write!(f, "{text:?}"),
        }
    }
}
