#![forbid(unsafe_code)]

//! Error types surfaced when creating bindings.

use thiserror::Error;

use tether_core::ReactiveError;

pub type Result<T> = std::result::Result<T, DomError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    /// Two-way bindings need an element the user can edit.
    #[error("two-way binding requires <input>, <textarea> or <select>, got <{tag}>")]
    NotFormControl { tag: String },

    #[error(transparent)]
    Reactive(#[from] ReactiveError),
}
