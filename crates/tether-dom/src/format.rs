#![forbid(unsafe_code)]

//! Named value formatters used by one-way bindings.
//!
//! A formatter failure never aborts rendering: the binding logs a warning
//! and shows the unformatted text.

use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("no formatter named `{name}`")]
    Unknown { name: String },

    #[error("formatter `{name}` failed: {message}")]
    Failed { name: String, message: String },
}

/// Formats display strings by formatter name.
pub trait Formatter {
    fn format(&self, name: &str, input: &str) -> Result<String, FormatError>;
}

type FormatFn = Rc<dyn Fn(&str) -> Result<String, String>>;

/// A [`Formatter`] backed by a table of named functions.
#[derive(Clone, Default)]
pub struct FormatterRegistry {
    formatters: AHashMap<String, FormatFn>,
}

impl FormatterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `uppercase`, `lowercase` and `trim`.
    #[must_use]
    pub fn with_builtins() -> Self {
        Self::new()
            .with("uppercase", |s| Ok(s.to_uppercase()))
            .with("lowercase", |s| Ok(s.to_lowercase()))
            .with("trim", |s| Ok(s.trim().to_owned()))
    }

    #[must_use]
    pub fn with(
        mut self,
        name: impl Into<String>,
        format: impl Fn(&str) -> Result<String, String> + 'static,
    ) -> Self {
        self.register(name, format);
        self
    }

    /// Add or replace a formatter.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        format: impl Fn(&str) -> Result<String, String> + 'static,
    ) {
        self.formatters.insert(name.into(), Rc::new(format));
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.formatters.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.formatters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.formatters.is_empty()
    }
}

impl Formatter for FormatterRegistry {
    fn format(&self, name: &str, input: &str) -> Result<String, FormatError> {
        let format = self.formatters.get(name).ok_or_else(|| FormatError::Unknown {
            name: name.to_owned(),
        })?;
        format(input).map_err(|message| FormatError::Failed {
            name: name.to_owned(),
            message,
        })
    }
}

impl fmt::Debug for FormatterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.formatters.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("FormatterRegistry")
            .field("formatters", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins() {
        let registry = FormatterRegistry::with_builtins();
        assert_eq!(registry.format("uppercase", "ada").unwrap(), "ADA");
        assert_eq!(registry.format("trim", "  x ").unwrap(), "x");
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn unknown_and_failing() {
        let registry = FormatterRegistry::new().with("strict", |s| {
            s.parse::<f64>()
                .map(|n| format!("{n:.2}"))
                .map_err(|err| err.to_string())
        });
        assert_eq!(registry.format("strict", "1.5").unwrap(), "1.50");
        assert!(matches!(
            registry.format("strict", "abc"),
            Err(FormatError::Failed { .. })
        ));
        assert_eq!(
            registry.format("nope", "x"),
            Err(FormatError::Unknown { name: "nope".into() })
        );
    }
}
