#![forbid(unsafe_code)]

//! Binding and context configuration.
//!
//! [`BindingConfig`] is the serialisable form produced by whatever parses
//! binding attributes; [`BindingOptions`] is what the adapters consume.

use serde::{Deserialize, Serialize};
use web_time::Duration;

/// Options for one binding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingOptions {
    pub(crate) debounce: Option<Duration>,
    pub(crate) formatter: Option<String>,
    pub(crate) extras: serde_json::Map<String, serde_json::Value>,
}

impl BindingOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay model write-back until input has been idle for `delay`.
    #[must_use]
    pub fn with_debounce(mut self, delay: Duration) -> Self {
        self.debounce = Some(delay);
        self
    }

    /// Pipe one-way output through the named formatter.
    #[must_use]
    pub fn with_formatter(mut self, name: impl Into<String>) -> Self {
        self.formatter = Some(name.into());
        self
    }

    /// Attach a free-form option for custom adapters.
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extras.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn debounce(&self) -> Option<Duration> {
        self.debounce
    }

    #[must_use]
    pub fn formatter(&self) -> Option<&str> {
        self.formatter.as_deref()
    }

    #[must_use]
    pub fn option(&self, key: &str) -> Option<&serde_json::Value> {
        self.extras.get(key)
    }
}

/// Resolved binding configuration for one element.
///
/// ```
/// use tether_dom::BindingConfig;
///
/// let config: BindingConfig =
///     serde_json::from_str(r#"{"path": "user.name", "debounce": 300}"#).unwrap();
/// assert_eq!(config.path, "user.name");
/// assert_eq!(config.to_options().debounce().map(|d| d.as_millis()), Some(300));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BindingConfig {
    pub path: String,
    /// Debounce in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatter: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl BindingConfig {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn to_options(&self) -> BindingOptions {
        BindingOptions {
            debounce: self.debounce.filter(|ms| *ms > 0).map(Duration::from_millis),
            formatter: self.formatter.clone().filter(|name| !name.is_empty()),
            extras: self.options.clone(),
        }
    }
}

/// Options for a [`Dom`](crate::Dom) context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomConfig {
    pub(crate) notify_descendants: bool,
}

impl Default for DomConfig {
    fn default() -> Self {
        Self {
            notify_descendants: true,
        }
    }
}

impl DomConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also re-render bindings below a flushed path, so replacing `user`
    /// refreshes a binding on `user.name`. On by default.
    #[must_use]
    pub fn with_notify_descendants(mut self, notify: bool) -> Self {
        self.notify_descendants = notify;
        self
    }

    #[must_use]
    pub fn notify_descendants(&self) -> bool {
        self.notify_descendants
    }
}
