#![forbid(unsafe_code)]

//! Element bindings for Tether.
//!
//! - [`Dom`]: per-runtime binding context; installs the update handler that
//!   re-renders bindings when the batch scheduler flushes.
//! - [`Dom::model`]: two-way binding of a form control to a data path.
//! - [`Dom::bind`]: one-way binding of any element to a data path.
//! - [`BindingRegistry`]: bindings indexed by element and by path.
//! - [`Element`]: the seam to a concrete DOM; [`MemoryElement`] implements it
//!   in memory, `WebElement` (`web` feature, wasm32) on `web-sys`.
//!
//! # Invariants
//!
//! 1. Bound data is only ever written to an element's value or text content,
//!    never parsed as markup.
//! 2. A binding whose element already shows the data leaves the element
//!    untouched.
//! 3. Destroying a binding removes its listener, cancels its debounce timer
//!    and unregisters it.

mod bind;
pub mod binding;
pub mod config;
pub mod dom;
pub mod element;
pub mod error;
pub mod format;
pub mod memory;
pub mod model;
pub mod registry;
#[cfg(all(target_arch = "wasm32", feature = "web"))]
pub mod web;

pub use binding::{Binding, BindingId, BindingKind};
pub use config::{BindingConfig, BindingOptions, DomConfig};
pub use dom::Dom;
pub use element::{
    ControlKind, Element, ElementId, ElementRef, InputListener, ListenerId, is_form_control,
};
pub use error::{DomError, Result};
pub use format::{FormatError, Formatter, FormatterRegistry};
pub use memory::{MemoryElement, MemoryNode};
pub use model::read_control;
pub use registry::BindingRegistry;
#[cfg(all(target_arch = "wasm32", feature = "web"))]
pub use web::WebElement;
