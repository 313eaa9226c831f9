//! Identity verification through the national identity provider.
//!
//! The backend runs the OIDC authorization-code exchange; this side only has to
//! start it, survive the full-page redirect, and accept the callback that comes
//! back, provided it carries the nonce stored at initiation.

use std::sync::Arc;
use std::time::Duration;

use subtle::ConstantTimeEq;
use time::OffsetDateTime;
use url::Url;

use crate::config::Config;
use crate::error::Error;
use crate::gateway::{ApiGateway, AuthorizationRedirect};
use crate::session::{OidcSession, SessionStorage};
use crate::types::{FaydaId, VisitorIdentity};

/// Query parameters the identity provider appends to the redirect URI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackQuery {
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        let mut query = Self::default();
        for (key, value) in url.query_pairs() {
            let slot = match key.as_ref() {
                "code" => &mut query.code,
                "state" => &mut query.state,
                "error" => &mut query.error,
                "error_description" => &mut query.error_description,
                _ => continue,
            };
            *slot = Some(value.into_owned()).filter(|v| !v.is_empty());
        }
        query
    }

    /// A page load is a return from the provider when it carries a `code` or an `error`.
    #[must_use]
    pub fn is_callback(&self) -> bool {
        self.code.is_some() || self.error.is_some()
    }
}

/// The address to show once a callback has been handled: same page, no query, so
/// reloading cannot replay an already-consumed code.
#[must_use]
pub fn strip_callback_params(url: &Url) -> Url {
    let mut clean = url.clone();
    clean.set_query(None);
    clean.set_fragment(None);
    clean
}

/// Drives initiate → redirect → callback → code exchange for one tab.
pub struct IdentityVerification<G, S> {
    gateway: Arc<G>,
    storage: Arc<S>,
    session_ttl: Duration,
}

impl<G: ApiGateway, S: SessionStorage> IdentityVerification<G, S> {
    #[must_use]
    pub fn new(gateway: Arc<G>, storage: Arc<S>, config: &Config) -> Self {
        Self {
            gateway,
            storage,
            session_ttl: config.oidc_session_ttl(),
        }
    }

    /// Ask the backend for an authorization URL and remember the nonce.
    ///
    /// The caller must navigate the whole page to the returned `auth_url`.
    ///
    /// # Errors
    ///
    /// [`Error::Network`] or [`Error::Server`] from the backend, or
    /// [`Error::Storage`] if the pending session cannot be persisted.
    pub async fn initiate(&self, fayda_id: &FaydaId) -> Result<AuthorizationRedirect, Error> {
        let redirect = self.authorize(fayda_id).await?;
        self.remember(fayda_id, &redirect)?;
        Ok(redirect)
    }

    /// Backend half of [`initiate`](Self::initiate): nothing is stored.
    pub(crate) async fn authorize(&self, fayda_id: &FaydaId) -> Result<AuthorizationRedirect, Error> {
        tracing::debug!(fayda_id = %fayda_id.masked(), "initiating OIDC flow");
        self.gateway.initiate_oidc(fayda_id).await
    }

    /// Storage half of [`initiate`](Self::initiate).
    pub(crate) fn remember(
        &self,
        fayda_id: &FaydaId,
        redirect: &AuthorizationRedirect,
    ) -> Result<(), Error> {
        self.storage
            .save(&OidcSession::new(&redirect.state, fayda_id.clone()))?;
        tracing::info!(
            fayda_id = %fayda_id.masked(),
            auth_host = redirect.auth_url.host_str().unwrap_or_default(),
            "OIDC flow initiated"
        );
        Ok(())
    }

    /// Handle the provider's return.
    ///
    /// `Ok(None)` means the query is not a callback and nothing happened.
    ///
    /// # Errors
    ///
    /// - [`Error::AuthorizationDenied`] if the provider reported an error.
    /// - [`Error::StateMismatch`] if no session is stored or its nonce differs.
    /// - [`Error::SessionExpired`] if the stored session outlived its TTL.
    /// - [`Error::Network`] / [`Error::Server`] / [`Error::Decode`] from the exchange.
    ///
    /// The stored session is cleared on the first three and on success.
    pub async fn resume_from_callback(
        &self,
        query: &CallbackQuery,
    ) -> Result<Option<VisitorIdentity>, Error> {
        let identity = self.verify_callback(query).await?;
        if identity.is_some() {
            self.complete()?;
        }
        Ok(identity)
    }

    /// [`resume_from_callback`](Self::resume_from_callback) without the final
    /// [`complete`](Self::complete) after a successful exchange. Refusals found
    /// before the exchange still clear the session.
    pub(crate) async fn verify_callback(
        &self,
        query: &CallbackQuery,
    ) -> Result<Option<VisitorIdentity>, Error> {
        if let Some(error) = &query.error {
            tracing::warn!(
                error = %error,
                description = query.error_description.as_deref().unwrap_or_default(),
                "identity provider returned an error"
            );
            self.storage.clear()?;
            return Err(Error::AuthorizationDenied(error.clone()));
        }

        let (Some(code), Some(state)) = (&query.code, &query.state) else {
            return Ok(None);
        };

        let Some(stored) = self.storage.load()? else {
            tracing::warn!("OIDC callback without a pending session");
            return Err(Error::StateMismatch);
        };

        if stored.is_expired(self.session_ttl, OffsetDateTime::now_utc()) {
            tracing::warn!(fayda_id = %stored.pending_fayda_id.masked(), "OIDC session expired");
            self.storage.clear()?;
            return Err(Error::SessionExpired);
        }

        if !bool::from(state.as_bytes().ct_eq(stored.state.as_bytes())) {
            tracing::warn!(fayda_id = %stored.pending_fayda_id.masked(), "OIDC state mismatch");
            self.storage.clear()?;
            return Err(Error::StateMismatch);
        }

        tracing::debug!(code = %truncate(code, 10), "exchanging authorization code");
        let identity = self.gateway.exchange_code(code, state).await?;
        tracing::info!(
            pending = %stored.pending_fayda_id.masked(),
            "visitor identity verified"
        );
        Ok(Some(identity))
    }

    /// Consume the pending session once its code has been exchanged.
    pub(crate) fn complete(&self) -> Result<(), Error> {
        self.storage.clear()
    }

    /// Drop any pending verification.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the backing store is unusable.
    pub fn abandon(&self) -> Result<(), Error> {
        self.storage.clear()
    }
}

fn truncate(s: &str, max: usize) -> String {
    let head: String = s.chars().take(max).collect();
    if head.len() < s.len() {
        format!("{head}...")
    } else {
        head
    }
}
