#![forbid(unsafe_code)]

//! One-way ("bind") binding adapter.
//!
//! Renders the data at the bound path into any element: absent and null
//! values render as an empty string, everything else through
//! [`Value::display_string`], optionally piped through a named formatter.
//! Form controls receive the text as their value, every other element as its
//! text content. Markup in the data is therefore always shown literally.

use std::rc::Rc;

use tether_core::{Path, Reactive};
use tracing::{debug, warn};

use crate::binding::{Binding, BindingKind};
use crate::config::BindingOptions;
use crate::dom::FormatterSlot;
use crate::element::{ElementRef, is_form_control};
use crate::model::display_text;

/// Build, initially sync and return a one-way binding. The caller registers
/// it.
pub(crate) fn bind_binding(
    element: ElementRef,
    data: &Reactive,
    path: Path,
    options: &BindingOptions,
    formatter: FormatterSlot,
) -> Binding {
    let absolute = data.path().join(&path);
    let as_value = is_form_control(&*element);
    let formatter_name = options.formatter().map(str::to_owned);

    let update = {
        let element = Rc::clone(&element);
        let data = data.clone();
        let absolute = absolute.clone();
        move || {
            let raw = display_text(&data.get_path(&path));
            let text = match &formatter_name {
                Some(name) => apply_formatter(&formatter, name, raw, &absolute),
                None => raw,
            };
            if as_value {
                if element.value() != text {
                    element.set_value(&text);
                }
            } else if element.text_content() != text {
                element.set_text_content(&text);
            }
        }
    };

    debug!(path = %absolute, element = %element.id(), "one-way binding created");
    let binding = Binding::new(element.id(), absolute, BindingKind::Bind, update, || {});
    binding.update_dom();
    binding
}

fn apply_formatter(slot: &FormatterSlot, name: &str, raw: String, path: &Path) -> String {
    let formatter = slot.borrow().clone();
    let Some(formatter) = formatter else {
        warn!(path = %path, formatter = name, "no formatter installed; showing raw value");
        return raw;
    };
    match formatter.format(name, &raw) {
        Ok(text) => text,
        Err(err) => {
            warn!(path = %path, formatter = name, error = %err, "formatter failed; showing raw value");
            raw
        }
    }
}
