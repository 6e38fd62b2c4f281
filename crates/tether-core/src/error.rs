#![forbid(unsafe_code)]

//! Error types surfaced by the reactive core.
//!
//! Only [`ReactiveError::InvalidRoot`] and [`ReactiveError::CircularDependency`]
//! abort an operation the caller cannot recover from locally. Cyclic data met
//! while lazily wrapping, formatter failures and per-entry flush failures are
//! logged and degraded instead of returned.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReactiveError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    #[error("cannot wrap {kind}: the root of a reactive tree must be an object or array")]
    InvalidRoot { kind: &'static str },

    #[error("circular dependency: computed #{id} was read during its own recomputation")]
    CircularDependency { id: u64 },

    #[error("`{key}` is not a valid array index")]
    InvalidKey { key: String },

    #[error("cannot write below `{path}`: not an object or array")]
    NotAContainer { path: String },

    #[error("cyclic data at `{path}` cannot be converted to JSON")]
    CyclicData { path: String },

    #[error("path pattern `{pattern}` cannot be compiled: {message}")]
    InvalidPattern { pattern: String, message: String },
}

impl ReactiveError {
    /// Whether this is the circular-dependency failure of a computed value.
    #[must_use]
    pub fn is_circular(&self) -> bool {
        matches!(self, Self::CircularDependency { .. })
    }
}
