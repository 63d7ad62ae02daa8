//! Error types for selectors, templates and grant names

use thiserror::Error;

/// Errors raised while parsing or evaluating a selector expression
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    /// The expression is not well formed
    #[error("Selector parse error at offset {position}: {message}")]
    Parse { position: usize, message: String },

    /// The expression references a field the provider does not declare
    #[error("Selector references unknown field: {0}")]
    UnknownField(String),
}

impl SelectorError {
    pub(crate) fn parse(position: usize, message: impl Into<String>) -> Self {
        SelectorError::Parse {
            position,
            message: message.into(),
        }
    }
}

/// Errors raised while parsing or rendering a bind-name template
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// A `{{` was opened and never closed
    #[error("Unterminated placeholder starting at offset {position}")]
    Unterminated { position: usize },

    /// `{{}}` or `{{   }}`
    #[error("Empty placeholder at offset {position}")]
    EmptyPlaceholder { position: usize },

    /// A placeholder names a field missing from the verified field map
    #[error("Unresolved placeholder: {0}")]
    UnresolvedField(String),
}

/// A computed grant name violates the naming rules of its bind type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("Invalid service identity name: {0:?}")]
    InvalidServiceName(String),

    #[error("Invalid role name: {0:?}")]
    InvalidRoleName(String),
}
