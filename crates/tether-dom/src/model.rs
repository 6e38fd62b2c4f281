#![forbid(unsafe_code)]

//! Two-way ("model") binding adapter.
//!
//! The adapter listens for user edits on a form control and writes the
//! control's value into the data at the bound path, optionally debounced
//! through a host timer. In the other direction its `update_dom` writes the
//! data into the control, but only when the displayed value differs, so an
//! edit that round-trips through the batch flush does not touch the control
//! again.
//!
//! # Failure Modes
//!
//! - **Element is not a form control**: [`DomError::NotFormControl`].
//! - **Write-back fails** (the bound path runs through a primitive): logged
//!   at `WARN`; the data is left unchanged.

use std::cell::Cell;
use std::rc::Rc;

use tether_core::{Host, Path, Reactive, TimerHandle, Value};
use tracing::{debug, warn};

use crate::binding::{Binding, BindingKind};
use crate::config::BindingOptions;
use crate::element::{ControlKind, Element, ElementRef, is_form_control};
use crate::error::{DomError, Result};

/// Read a control's current value as data.
///
/// Numeric controls that do not hold a finite number read as `0`.
#[must_use]
pub fn read_control(element: &dyn Element, kind: ControlKind) -> Value {
    match kind {
        ControlKind::Checkbox => Value::Bool(element.checked()),
        ControlKind::Numeric => {
            let parsed = element.value().trim().parse::<f64>().ok();
            Value::Number(parsed.filter(|n| n.is_finite()).unwrap_or(0.0))
        }
        ControlKind::Text => Value::String(element.value()),
    }
}

/// Text a control displays for `value`.
pub(crate) fn display_text(value: &Value) -> String {
    if value.is_nullish() {
        String::new()
    } else {
        value.display_string()
    }
}

fn write_back(data: &Reactive, path: &Path, value: Value) {
    if let Err(err) = data.set_path(path, value) {
        warn!(path = %data.path().join(path), error = %err, "model write-back failed");
    }
}

/// Build, initially sync and return a two-way binding. The caller registers
/// it.
pub(crate) fn model_binding(
    element: ElementRef,
    data: &Reactive,
    path: Path,
    options: &BindingOptions,
) -> Result<Binding> {
    if !is_form_control(&*element) {
        return Err(DomError::NotFormControl {
            tag: element.tag_name(),
        });
    }
    let kind = ControlKind::of(&*element);
    let host: Rc<dyn Host> = Rc::clone(data.runtime().host());
    let timer: Rc<Cell<Option<TimerHandle>>> = Rc::new(Cell::new(None));

    let listener = {
        let weak_element = Rc::downgrade(&element);
        let data = data.clone();
        let path = path.clone();
        let host = Rc::clone(&host);
        let timer = Rc::clone(&timer);
        let debounce = options.debounce();
        Rc::new(move || {
            let Some(element) = weak_element.upgrade() else {
                return;
            };
            let value = read_control(&*element, kind);
            let Some(delay) = debounce else {
                write_back(&data, &path, value);
                return;
            };
            if let Some(pending) = timer.take() {
                host.clear_timeout(pending);
            }
            let data = data.clone();
            let path = path.clone();
            let slot = Rc::clone(&timer);
            let handle = host.set_timeout(
                delay,
                Box::new(move || {
                    slot.set(None);
                    write_back(&data, &path, value);
                }),
            );
            timer.set(Some(handle));
        })
    };
    let listener_id = element.add_input_listener(listener);

    let update = {
        let element = Rc::clone(&element);
        let data = data.clone();
        let path = path.clone();
        move || {
            let current = data.get_path(&path);
            match kind {
                ControlKind::Checkbox => {
                    let checked = current.is_truthy();
                    if element.checked() != checked {
                        element.set_checked(checked);
                    }
                }
                ControlKind::Numeric | ControlKind::Text => {
                    let text = display_text(&current);
                    if element.value() != text {
                        element.set_value(&text);
                    }
                }
            }
        }
    };

    let teardown = {
        let element = Rc::clone(&element);
        move || {
            if let Some(pending) = timer.take() {
                host.clear_timeout(pending);
            }
            element.remove_input_listener(listener_id);
        }
    };

    let absolute = data.path().join(&path);
    debug!(path = %absolute, element = %element.id(), ?kind, "model binding created");
    let binding = Binding::new(element.id(), absolute, BindingKind::Model, update, teardown);
    binding.update_dom();
    Ok(binding)
}
