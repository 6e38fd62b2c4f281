#![forbid(unsafe_code)]

//! The element seam between bindings and a concrete DOM.
//!
//! Bindings only ever touch an element through [`Element`]. The trait
//! deliberately has no operation that parses markup: text always goes
//! through [`Element::set_text_content`] or [`Element::set_value`], so bound
//! data can never inject nodes.
//!
//! [`MemoryElement`](crate::MemoryElement) implements the trait in memory for
//! tests and non-browser hosts; `WebElement` (`web` feature, wasm32) wraps a
//! `web_sys::HtmlElement`.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Stable handle identifying one element for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(1);

impl ElementId {
    /// Allocate a fresh id. Element implementations call this once per
    /// element.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "el#{}", self.0)
    }
}

/// Handle returned by [`Element::add_input_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Callback fired when the user edits an element.
pub type InputListener = Rc<dyn Fn()>;

/// Operations bindings need from a DOM element.
pub trait Element {
    fn id(&self) -> ElementId;

    /// Lower-case tag name (`input`, `div`, ...).
    fn tag_name(&self) -> String;

    /// Lower-case `type` attribute of an `<input>`, if any.
    fn input_type(&self) -> Option<String>;

    fn value(&self) -> String;

    fn set_value(&self, value: &str);

    fn checked(&self) -> bool;

    fn set_checked(&self, checked: bool);

    /// Concatenated text of the element's subtree.
    fn text_content(&self) -> String;

    /// Replace the element's children with a single text node.
    fn set_text_content(&self, text: &str);

    /// Call `listener` after every user edit.
    fn add_input_listener(&self, listener: InputListener) -> ListenerId;

    /// Unknown ids are ignored.
    fn remove_input_listener(&self, id: ListenerId);
}

/// Shared handle to any element.
pub type ElementRef = Rc<dyn Element>;

/// How a form control's value maps to data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// `<input type="checkbox">`: boolean.
    Checkbox,
    /// `<input type="number">` and `<input type="range">`: number.
    Numeric,
    /// Everything else: string.
    Text,
}

impl ControlKind {
    #[must_use]
    pub fn of(element: &dyn Element) -> Self {
        if element.tag_name() != "input" {
            return Self::Text;
        }
        match element.input_type().as_deref() {
            Some("checkbox") => Self::Checkbox,
            Some("number" | "range") => Self::Numeric,
            _ => Self::Text,
        }
    }
}

/// Elements a two-way binding accepts, and whose displayed text is their
/// `value` rather than their content.
#[must_use]
pub fn is_form_control(element: &dyn Element) -> bool {
    matches!(element.tag_name().as_str(), "input" | "textarea" | "select")
}
