#![forbid(unsafe_code)]

//! The DOM binding context.
//!
//! A [`Dom`] owns a binding registry and a formatter slot for one
//! [`Runtime`], and installs the runtime's update handler: every flushed path
//! re-renders the bindings registered on it (and, by default, on the paths
//! below it).
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use serde_json::json;
//! use tether_core::Runtime;
//! use tether_dom::{BindingOptions, Dom, Element, MemoryElement};
//!
//! let (runtime, host) = Runtime::manual();
//! let dom = Dom::new(runtime.clone());
//! let state = runtime.wrap(json!({"greeting": "hello"})).unwrap();
//!
//! let label = MemoryElement::new("span");
//! dom.bind(Rc::new(label.clone()), &state, "greeting", &BindingOptions::new()).unwrap();
//! assert_eq!(label.text_content(), "hello");
//!
//! state.set("greeting", "bonjour").unwrap();
//! host.run_frame();
//! assert_eq!(label.text_content(), "bonjour");
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tether_core::{FlushReport, Path, Reactive, Runtime};
use tracing::trace;

use crate::bind::bind_binding;
use crate::binding::{Binding, BindingKind};
use crate::config::{BindingConfig, BindingOptions, DomConfig};
use crate::element::{ElementId, ElementRef};
use crate::error::Result;
use crate::format::Formatter;
use crate::model::model_binding;
use crate::registry::BindingRegistry;

/// Formatter shared by every one-way binding of a context; replaceable at any
/// time.
pub(crate) type FormatterSlot = Rc<RefCell<Option<Rc<dyn Formatter>>>>;

/// Binding context for one runtime.
#[derive(Clone)]
pub struct Dom {
    runtime: Runtime,
    registry: BindingRegistry,
    formatter: FormatterSlot,
    config: DomConfig,
}

impl Dom {
    #[must_use]
    pub fn new(runtime: Runtime) -> Self {
        Self::with_config(runtime, DomConfig::default())
    }

    /// Create a context and install its update handler on `runtime`,
    /// replacing any handler installed before.
    #[must_use]
    pub fn with_config(runtime: Runtime, config: DomConfig) -> Self {
        let dom = Self {
            runtime,
            registry: BindingRegistry::new(),
            formatter: Rc::new(RefCell::new(None)),
            config,
        };
        dom.install_update_handler();
        dom
    }

    fn install_update_handler(&self) {
        let registry = self.registry.downgrade();
        let descendants = self.config.notify_descendants;
        self.runtime.set_update_handler(move |path, _value| {
            let Some(registry) = registry.upgrade() else {
                return Ok(());
            };
            let bindings = if descendants {
                registry.get_by_subtree(path)
            } else {
                registry.get_by_path(path.as_str())
            };
            trace!(path = %path, bindings = bindings.len(), "re-rendering");
            for binding in bindings {
                binding.update_dom();
            }
            Ok(())
        });
    }

    #[must_use]
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    #[must_use]
    pub fn registry(&self) -> &BindingRegistry {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &DomConfig {
        &self.config
    }

    /// Install the formatter used by one-way bindings with a formatter name.
    pub fn set_formatter(&self, formatter: impl Formatter + 'static) {
        *self.formatter.borrow_mut() = Some(Rc::new(formatter));
    }

    pub fn clear_formatter(&self) {
        self.formatter.borrow_mut().take();
    }

    /// Two-way bind a form control to `path` relative to `data`.
    pub fn model(
        &self,
        element: ElementRef,
        data: &Reactive,
        path: impl Into<Path>,
        options: &BindingOptions,
    ) -> Result<Binding> {
        let binding = model_binding(element, data, path.into(), options)?;
        self.registry.register(&binding);
        Ok(binding)
    }

    /// One-way bind any element to `path` relative to `data`.
    pub fn bind(
        &self,
        element: ElementRef,
        data: &Reactive,
        path: impl Into<Path>,
        options: &BindingOptions,
    ) -> Result<Binding> {
        let binding = bind_binding(
            element,
            data,
            path.into(),
            options,
            Rc::clone(&self.formatter),
        );
        self.registry.register(&binding);
        Ok(binding)
    }

    /// Create a binding from a resolved attribute configuration.
    pub fn bind_config(
        &self,
        element: ElementRef,
        data: &Reactive,
        config: &BindingConfig,
        kind: BindingKind,
    ) -> Result<Binding> {
        let options = config.to_options();
        let path = Path::parse(&config.path);
        match kind {
            BindingKind::Model => self.model(element, data, path, &options),
            BindingKind::Bind => self.bind(element, data, path, &options),
        }
    }

    /// Destroy every binding of an element that is leaving the document.
    pub fn dispose_element(&self, element: ElementId) -> usize {
        self.registry.dispose_element(element)
    }

    /// Force the pending batch through the bindings now.
    pub fn flush(&self) -> FlushReport {
        self.runtime.flush()
    }
}

impl fmt::Debug for Dom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dom")
            .field("registry", &self.registry)
            .field("formatter", &self.formatter.borrow().is_some())
            .field("config", &self.config)
            .finish()
    }
}
