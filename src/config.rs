use std::time::Duration;

use url::Url;

use crate::error::Error;

const DEFAULT_OIDC_SESSION_TTL: Duration = Duration::from_secs(600);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_TEST_FAN: &str = "123456789012";

/// How long each kind of banner stays up before it dismisses itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BannerTimings {
    pub checkin_error: Duration,
    pub checkout_error: Duration,
    pub info: Duration,
}

impl Default for BannerTimings {
    fn default() -> Self {
        Self {
            checkin_error: Duration::from_secs(8),
            checkout_error: Duration::from_secs(5),
            info: Duration::from_secs(5),
        }
    }
}

/// Visitor-access configuration, passed explicitly to the API client and the
/// workflow controllers.
///
/// The backend base URL is a constructor parameter; everything else has a default
/// that can be overridden with the `with_*` methods.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    pub(crate) api_base_url: Url,
    pub(crate) debug: bool,
    pub(crate) oidc_session_ttl: Duration,
    pub(crate) request_timeout: Duration,
    pub(crate) banners: BannerTimings,
    pub(crate) test_fan: String,
}

impl Config {
    #[must_use]
    pub fn new(api_base_url: Url) -> Self {
        Self {
            api_base_url,
            debug: false,
            oidc_session_ttl: DEFAULT_OIDC_SESSION_TTL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            banners: BannerTimings::default(),
            test_fan: DEFAULT_TEST_FAN.into(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `FAYDA_API_BASE_URL`: backend REST base, e.g. `http://localhost:8000/api`
    ///
    /// # Optional env vars
    /// - `FAYDA_DEBUG`: `"1"` or `"true"` enables verbose logging
    /// - `FAYDA_OIDC_SESSION_TTL_SECS`: lifetime of a pending verification (default 600)
    /// - `FAYDA_REQUEST_TIMEOUT_SECS`: backend request timeout (default 30)
    /// - `FAYDA_TEST_FAN`: test credential shown by the QR scan placeholder
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base URL is missing or malformed, or a
    /// numeric variable does not parse.
    pub fn from_env() -> Result<Self, Error> {
        let base = std::env::var("FAYDA_API_BASE_URL")
            .map_err(|_| Error::Config("FAYDA_API_BASE_URL is required".into()))?;
        let base: Url = base
            .parse()
            .map_err(|e| Error::Config(format!("FAYDA_API_BASE_URL: {e}")))?;

        let mut config = Self::new(base).with_debug(matches!(
            std::env::var("FAYDA_DEBUG").as_deref(),
            Ok("1") | Ok("true"),
        ));

        if let Some(ttl) = env_secs("FAYDA_OIDC_SESSION_TTL_SECS")? {
            config = config.with_oidc_session_ttl(ttl);
        }
        if let Some(timeout) = env_secs("FAYDA_REQUEST_TIMEOUT_SECS")? {
            config = config.with_request_timeout(timeout);
        }
        if let Ok(fan) = std::env::var("FAYDA_TEST_FAN") {
            config = config.with_test_fan(fan);
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub fn with_oidc_session_ttl(mut self, ttl: Duration) -> Self {
        self.oidc_session_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_banner_timings(mut self, banners: BannerTimings) -> Self {
        self.banners = banners;
        self
    }

    #[must_use]
    pub fn with_test_fan(mut self, fan: impl Into<String>) -> Self {
        self.test_fan = fan.into();
        self
    }

    #[must_use]
    pub fn api_base_url(&self) -> &Url {
        &self.api_base_url
    }

    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug
    }

    #[must_use]
    pub fn oidc_session_ttl(&self) -> Duration {
        self.oidc_session_ttl
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    #[must_use]
    pub fn banners(&self) -> BannerTimings {
        self.banners
    }

    #[must_use]
    pub fn test_fan(&self) -> &str {
        &self.test_fan
    }

    /// Full URL of a backend endpoint such as `"oidc/initiate/"`.
    ///
    /// One slash joins the two halves no matter how either side is written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the joined string is not a URL.
    pub fn api_url(&self, endpoint: &str) -> Result<Url, Error> {
        let base = self.api_base_url.as_str().trim_end_matches('/');
        let endpoint = endpoint.trim_start_matches('/');
        format!("{base}/{endpoint}")
            .parse()
            .map_err(|e| Error::Config(format!("endpoint {endpoint}: {e}")))
    }
}

fn env_secs(name: &str) -> Result<Option<Duration>, Error> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|e| Error::Config(format!("{name}: {e}"))),
        Err(_) => Ok(None),
    }
}
