use std::fmt;

use serde::Serialize;

/// Form field a [`FieldError`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    FaydaId,
    Host,
    Reason,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FaydaId => "fayda_id",
            Self::Host => "host",
            Self::Reason => "reason",
        })
    }
}

/// Inline, field-level validation failure. Never leaves the current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

impl FieldError {
    #[must_use]
    pub fn new(field: Field, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Validation failed: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    Network(String),

    #[error("{0}")]
    Server(String),

    /// Only produced by the active-visit lookup on a 404.
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    AuthorizationDenied(String),

    #[error("Verification session does not match this callback")]
    StateMismatch,

    #[error("Verification session expired")]
    SessionExpired,

    #[error("Invalid response from server: {0}")]
    Decode(String),

    #[error("Another request is already in progress")]
    Busy,

    #[error("Request result discarded after reset")]
    Superseded,

    #[error("Cannot {action} while in {state}")]
    InvalidTransition {
        state: &'static str,
        action: &'static str,
    },

    #[error("Session storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn field(field: Field, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    /// Errors that abort an OIDC resume and must wipe the stored session.
    #[must_use]
    pub fn clears_session(&self) -> bool {
        matches!(
            self,
            Self::AuthorizationDenied(_) | Self::StateMismatch | Self::SessionExpired
        )
    }

    /// Failures of the backend round trip itself, as opposed to local refusals.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server(_) | Self::Decode(_))
    }

    /// Field errors, if this is a validation failure.
    #[must_use]
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::Validation(errors) => errors,
            _ => &[],
        }
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
