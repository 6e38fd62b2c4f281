#![forbid(unsafe_code)]

//! [`Element`] backed by a browser `HtmlElement`.

use std::cell::{Cell, RefCell};

use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::{HtmlElement, HtmlInputElement, HtmlSelectElement, HtmlTextAreaElement};

use crate::element::{Element, ElementId, InputListener, ListenerId};

/// Browser element handle. Keep one `WebElement` per DOM node: the
/// [`ElementId`] belongs to the handle.
pub struct WebElement {
    id: ElementId,
    element: HtmlElement,
    listeners: RefCell<Vec<(ListenerId, Closure<dyn FnMut()>)>>,
    next_listener: Cell<u64>,
}

impl WebElement {
    #[must_use]
    pub fn new(element: HtmlElement) -> Self {
        Self {
            id: ElementId::next(),
            element,
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(0),
        }
    }

    #[must_use]
    pub fn element(&self) -> &HtmlElement {
        &self.element
    }
}

impl Element for WebElement {
    fn id(&self) -> ElementId {
        self.id
    }

    fn tag_name(&self) -> String {
        self.element.tag_name().to_ascii_lowercase()
    }

    fn input_type(&self) -> Option<String> {
        self.element
            .dyn_ref::<HtmlInputElement>()
            .map(|input| input.type_().to_ascii_lowercase())
    }

    fn value(&self) -> String {
        if let Some(input) = self.element.dyn_ref::<HtmlInputElement>() {
            input.value()
        } else if let Some(area) = self.element.dyn_ref::<HtmlTextAreaElement>() {
            area.value()
        } else if let Some(select) = self.element.dyn_ref::<HtmlSelectElement>() {
            select.value()
        } else {
            String::new()
        }
    }

    fn set_value(&self, value: &str) {
        if let Some(input) = self.element.dyn_ref::<HtmlInputElement>() {
            input.set_value(value);
        } else if let Some(area) = self.element.dyn_ref::<HtmlTextAreaElement>() {
            area.set_value(value);
        } else if let Some(select) = self.element.dyn_ref::<HtmlSelectElement>() {
            select.set_value(value);
        }
    }

    fn checked(&self) -> bool {
        self.element
            .dyn_ref::<HtmlInputElement>()
            .is_some_and(HtmlInputElement::checked)
    }

    fn set_checked(&self, checked: bool) {
        if let Some(input) = self.element.dyn_ref::<HtmlInputElement>() {
            input.set_checked(checked);
        }
    }

    fn text_content(&self) -> String {
        self.element.text_content().unwrap_or_default()
    }

    fn set_text_content(&self, text: &str) {
        self.element.set_text_content(Some(text));
    }

    fn add_input_listener(&self, listener: InputListener) -> ListenerId {
        let id = ListenerId(self.next_listener.get() + 1);
        self.next_listener.set(id.0);
        let closure = Closure::<dyn FnMut()>::new(move || listener());
        if let Err(err) = self
            .element
            .add_event_listener_with_callback("input", closure.as_ref().unchecked_ref())
        {
            tracing::warn!(?err, element = %self.id, "addEventListener failed");
        }
        self.listeners.borrow_mut().push((id, closure));
        id
    }

    fn remove_input_listener(&self, id: ListenerId) {
        let mut listeners = self.listeners.borrow_mut();
        let Some(index) = listeners.iter().position(|(other, _)| *other == id) else {
            return;
        };
        let (_, closure) = listeners.remove(index);
        drop(listeners);
        if let Err(err) = self
            .element
            .remove_event_listener_with_callback("input", closure.as_ref().unchecked_ref())
        {
            tracing::warn!(?err, element = %self.id, "removeEventListener failed");
        }
    }
}
