use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BannerKind {
    Info,
    Error,
}

/// Dismissible message shown above the workflow. Never changes workflow state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Banner {
    pub kind: BannerKind,
    pub message: String,
    /// The renderer hides the banner after this long.
    #[serde(rename = "dismiss_after_ms", serialize_with = "as_millis")]
    pub dismiss_after: Duration,
}

impl Banner {
    #[must_use]
    pub fn info(message: impl Into<String>, dismiss_after: Duration) -> Self {
        Self {
            kind: BannerKind::Info,
            message: message.into(),
            dismiss_after,
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>, dismiss_after: Duration) -> Self {
        Self {
            kind: BannerKind::Error,
            message: message.into(),
            dismiss_after,
        }
    }
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
