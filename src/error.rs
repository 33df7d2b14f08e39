//! Hard failures of the reactive surface and unit setup.
//!
//! Expression failures are not represented here: they never cross the
//! evaluator boundary (see [`crate::expr::ExprError`]).

use thiserror::Error;

use crate::types::Path;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Top-level model key is not an identifier, or a name is declared both as
    /// data and as a method. Fatal to the unit's setup.
    #[error("invalid model declaration `{name}`: {reason}")]
    InvalidModelDeclaration { name: String, reason: String },

    /// A write or erase went through a missing (or non-container) intermediate.
    #[error("invalid path `{path}`: no container at `{segment}`")]
    InvalidPath { path: Path, segment: String },

    /// Registry lookup for a component that was never defined.
    #[error("unknown component: {name}")]
    UnknownComponent { name: String },

    #[error("invalid config: {message}")]
    InvalidConfig { message: String },
}

impl Error {
    #[must_use]
    pub fn invalid_declaration(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidModelDeclaration {
            name: name.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn invalid_path(path: &Path, segment: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.clone(),
            segment: segment.into(),
        }
    }
}
