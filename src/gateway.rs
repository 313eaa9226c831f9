use std::future::Future;

use serde::Deserialize;
use url::Url;

use crate::error::Error;
use crate::types::{
    CheckinReceipt, CheckoutReceipt, FaydaId, Host, NewCheckin, VisitId, VisitRecord,
    VisitorIdentity,
};

/// Where to send the browser to authenticate, plus the anti-forgery nonce bound to it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[non_exhaustive]
pub struct AuthorizationRedirect {
    pub state: String,
    pub auth_url: Url,
}

impl AuthorizationRedirect {
    #[must_use]
    pub fn new(state: impl Into<String>, auth_url: Url) -> Self {
        Self {
            state: state.into(),
            auth_url,
        }
    }
}

/// The backend REST service, one method per endpoint.
///
/// Implementations classify failures uniformly: transport failures are
/// [`Error::Network`], non-2xx answers are [`Error::Server`] carrying the backend's
/// `{"error": ...}` message (or the HTTP status line). Only
/// [`find_active_visit`](ApiGateway::find_active_visit) maps 404 to [`Error::NotFound`].
/// Nothing is retried.
///
/// [`ApiClient`](crate::client::ApiClient) is the HTTP implementation.
pub trait ApiGateway: Send + Sync + 'static {
    /// `GET hosts/` used as a reachability check. `Ok(false)` means the backend
    /// answered with a non-2xx status.
    fn test_connection(&self) -> impl Future<Output = Result<bool, Error>> + Send;

    /// `GET hosts/`
    fn list_hosts(&self) -> impl Future<Output = Result<Vec<Host>, Error>> + Send;

    /// `POST oidc/initiate/` with `{fayda_id, auth_type: "full"}`.
    fn initiate_oidc(
        &self,
        fayda_id: &FaydaId,
    ) -> impl Future<Output = Result<AuthorizationRedirect, Error>> + Send;

    /// `POST oidc/callback/` with `{code, state}`. The code is single-use.
    fn exchange_code(
        &self,
        code: &str,
        state: &str,
    ) -> impl Future<Output = Result<VisitorIdentity, Error>> + Send;

    /// `POST checkin/`
    fn create_checkin(
        &self,
        checkin: &NewCheckin,
    ) -> impl Future<Output = Result<CheckinReceipt, Error>> + Send;

    /// `POST checkout/find-active/` with `{fayda_id}`.
    fn find_active_visit(
        &self,
        fayda_id: &FaydaId,
    ) -> impl Future<Output = Result<VisitRecord, Error>> + Send;

    /// `POST checkout/` with `{visit_id, fayda_id}`.
    fn checkout(
        &self,
        visit_id: VisitId,
        fayda_id: &str,
    ) -> impl Future<Output = Result<CheckoutReceipt, Error>> + Send;
}

// Lets a caller keep a handle on the gateway it hands to the kiosk.
impl<G: ApiGateway> ApiGateway for std::sync::Arc<G> {
    fn test_connection(&self) -> impl Future<Output = Result<bool, Error>> + Send {
        (**self).test_connection()
    }

    fn list_hosts(&self) -> impl Future<Output = Result<Vec<Host>, Error>> + Send {
        (**self).list_hosts()
    }

    fn initiate_oidc(
        &self,
        fayda_id: &FaydaId,
    ) -> impl Future<Output = Result<AuthorizationRedirect, Error>> + Send {
        (**self).initiate_oidc(fayda_id)
    }

    fn exchange_code(
        &self,
        code: &str,
        state: &str,
    ) -> impl Future<Output = Result<VisitorIdentity, Error>> + Send {
        (**self).exchange_code(code, state)
    }

    fn create_checkin(
        &self,
        checkin: &NewCheckin,
    ) -> impl Future<Output = Result<CheckinReceipt, Error>> + Send {
        (**self).create_checkin(checkin)
    }

    fn find_active_visit(
        &self,
        fayda_id: &FaydaId,
    ) -> impl Future<Output = Result<VisitRecord, Error>> + Send {
        (**self).find_active_visit(fayda_id)
    }

    fn checkout(
        &self,
        visit_id: VisitId,
        fayda_id: &str,
    ) -> impl Future<Output = Result<CheckoutReceipt, Error>> + Send {
        (**self).checkout(visit_id, fayda_id)
    }
}
