#![forbid(unsafe_code)]

//! Tether: a reactive state container for browser UIs.
//!
//! Wrap plain data in a [`Runtime`], derive values with
//! [`Runtime::computed`], and bind elements to data paths with a
//! [`Dom`](tether_dom::Dom) context. Writes are coalesced and delivered to
//! the bindings once per frame.
//!
//! # Crates
//!
//! | Crate | Purpose |
//! |-------|---------|
//! | [`tether_core`] | Wrapping, tracking, computed values, batching, hosts |
//! | `tether_dom` | Element seam, bindings, registry, formatters (`dom` feature) |
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use tether::prelude::*;
//!
//! let (runtime, host) = Runtime::manual();
//! let dom = Dom::new(runtime.clone());
//! let state = runtime.wrap(serde_json::json!({"count": 0})).unwrap();
//!
//! let input = MemoryElement::input("number");
//! dom.model(Rc::new(input.clone()), &state, "count", &BindingOptions::new()).unwrap();
//!
//! input.simulate_input("42");
//! assert_eq!(state.get("count").as_f64(), Some(42.0));
//!
//! state.set("count", 7).unwrap();
//! host.run_frame();
//! assert_eq!(input.value(), "7");
//! ```

pub use tether_core;
#[cfg(feature = "dom")]
pub use tether_dom;

pub use tether_core::{
    Computed, Field, Path, PathPattern, Reactive, ReactiveError, Runtime, Value, WrapOptions,
};
#[cfg(feature = "dom")]
pub use tether_dom::{Binding, BindingOptions, Dom, DomError, Element};

/// Everything an application usually needs.
pub mod prelude {
    pub use tether_core::{
        Accessor, Computed, Field, FlushReport, Host, ImmediateHost, ManualHost, Node, Path,
        PathPattern, Reactive, ReactiveError, Runtime, Subscription, Tracked, Value, WrapOptions,
    };
    #[cfg(all(target_arch = "wasm32", feature = "web"))]
    pub use tether_core::WebHost;

    #[cfg(feature = "dom")]
    pub use tether_dom::{
        Binding, BindingConfig, BindingKind, BindingOptions, BindingRegistry, Dom, DomConfig,
        DomError, Element, ElementId, Formatter, FormatterRegistry, MemoryElement,
    };
    #[cfg(all(target_arch = "wasm32", feature = "web"))]
    pub use tether_dom::WebElement;
}
