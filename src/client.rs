use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::config::Config;
use crate::error::Error;
use crate::gateway::{ApiGateway, AuthorizationRedirect};
use crate::types::{
    CheckinReceipt, CheckoutReceipt, FaydaId, Host, NewCheckin, VisitId, VisitRecord,
    VisitorIdentity,
};

pub(crate) const NO_ACTIVE_VISIT: &str = "No active visit found for this Fayda ID";

/// HTTP client for the visitor-access backend.
pub struct ApiClient {
    config: Config,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

impl ApiClient {
    /// Create a client with the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the TLS backend cannot be initialised.
    pub fn new(config: Config) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Config(format!("http client: {e}")))?;
        Ok(Self { config, http })
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &'static str) -> Result<T, Error> {
        let url = self.config.api_url(endpoint)?;
        tracing::debug!(%url, "GET");
        let response = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let response = Self::ensure_success(response, endpoint).await?;
        response.json::<T>().await.map_err(Into::into)
    }

    async fn post(
        &self,
        endpoint: &'static str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, Error> {
        let url = self.config.api_url(endpoint)?;
        tracing::debug!(%url, "POST");
        self.http
            .post(url)
            .header(ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(Into::into)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        body: &serde_json::Value,
    ) -> Result<T, Error> {
        let response = self.post(endpoint, body).await?;
        let response = Self::ensure_success(response, endpoint).await?;
        response.json::<T>().await.map_err(Into::into)
    }

    /// Returns the response on 2xx, otherwise [`Error::Server`] with the backend's
    /// `error` message or the HTTP status line.
    async fn ensure_success(
        response: reqwest::Response,
        endpoint: &'static str,
    ) -> Result<reqwest::Response, Error> {
        let status = response.status();
        tracing::debug!(endpoint, status = status.as_u16(), "backend response");
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = server_message(status, &body);
        tracing::warn!(endpoint, status = status.as_u16(), error = %message, "backend request failed");
        Err(Error::Server(message))
    }
}

fn server_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| status_line(status))
}

fn status_line(status: StatusCode) -> String {
    format!(
        "HTTP {}: {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown Status")
    )
}

impl ApiGateway for ApiClient {
    async fn test_connection(&self) -> Result<bool, Error> {
        let url = self.config.api_url("hosts/")?;
        let response = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let status = response.status();
        tracing::debug!(status = status.as_u16(), "API connection test");
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "API connection test failed");
        }
        Ok(status.is_success())
    }

    async fn list_hosts(&self) -> Result<Vec<Host>, Error> {
        let hosts: Vec<Host> = self.get("hosts/").await?;
        tracing::debug!(count = hosts.len(), "hosts loaded");
        Ok(hosts)
    }

    async fn initiate_oidc(&self, fayda_id: &FaydaId) -> Result<AuthorizationRedirect, Error> {
        let body = json!({ "fayda_id": fayda_id.as_str(), "auth_type": "full" });
        self.post_json("oidc/initiate/", &body).await
    }

    async fn exchange_code(&self, code: &str, state: &str) -> Result<VisitorIdentity, Error> {
        let body = json!({ "code": code, "state": state });
        self.post_json("oidc/callback/", &body).await
    }

    async fn create_checkin(&self, checkin: &NewCheckin) -> Result<CheckinReceipt, Error> {
        let body = serde_json::to_value(checkin).map_err(|e| Error::Decode(e.to_string()))?;
        self.post_json("checkin/", &body).await
    }

    async fn find_active_visit(&self, fayda_id: &FaydaId) -> Result<VisitRecord, Error> {
        let body = json!({ "fayda_id": fayda_id.as_str() });
        let response = self.post("checkout/find-active/", &body).await?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(fayda_id = %fayda_id.masked(), "no active visit");
            return Err(Error::NotFound(NO_ACTIVE_VISIT.into()));
        }
        let response = Self::ensure_success(response, "checkout/find-active/").await?;
        response.json::<VisitRecord>().await.map_err(Into::into)
    }

    async fn checkout(&self, visit_id: VisitId, fayda_id: &str) -> Result<CheckoutReceipt, Error> {
        let body = json!({ "visit_id": visit_id, "fayda_id": fayda_id });
        self.post_json("checkout/", &body).await
    }
}
