use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::Error;
use crate::types::FaydaId;

/// Pending identity verification that has to outlive the redirect to the identity
/// provider and back.
///
/// Written once by [`initiate`](crate::verification::IdentityVerification::initiate),
/// consumed once by [`resume_from_callback`](crate::verification::IdentityVerification::resume_from_callback).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidcSession {
    /// Anti-forgery nonce issued by the backend.
    pub state: String,
    /// The Fayda ID the flow was started for.
    pub pending_fayda_id: FaydaId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl OidcSession {
    #[must_use]
    pub fn new(state: impl Into<String>, pending_fayda_id: FaydaId) -> Self {
        Self {
            state: state.into(),
            pending_fayda_id,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[must_use]
    pub fn is_expired(&self, ttl: Duration, now: OffsetDateTime) -> bool {
        now - self.created_at > ttl
    }
}

/// Storage scoped to one operator tab, holding at most one [`OidcSession`].
///
/// The only writer is the identity verification flow; the check-in controller
/// clears it on reset.
pub trait SessionStorage: Send + Sync + 'static {
    /// Read the stored record without consuming it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the backing store is unusable.
    fn load(&self) -> Result<Option<OidcSession>, Error>;

    /// Replace the stored record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the backing store is unusable.
    fn save(&self, session: &OidcSession) -> Result<(), Error>;

    /// Remove the stored record. Clearing an empty store is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the backing store is unusable.
    fn clear(&self) -> Result<(), Error>;
}

/// In-process [`SessionStorage`]; one instance per tab.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slot: Mutex<Option<OidcSession>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_slot<T>(&self, f: impl FnOnce(&mut Option<OidcSession>) -> T) -> Result<T, Error> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| Error::Storage("session slot poisoned".into()))?;
        Ok(f(&mut slot))
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self) -> Result<Option<OidcSession>, Error> {
        self.with_slot(|slot| slot.clone())
    }

    fn save(&self, session: &OidcSession) -> Result<(), Error> {
        self.with_slot(|slot| *slot = Some(session.clone()))
    }

    fn clear(&self) -> Result<(), Error> {
        self.with_slot(|slot| *slot = None)
    }
}
