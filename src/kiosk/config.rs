use std::net::SocketAddr;
use std::time::Duration;

use axum_extra::extract::cookie::Key;

use crate::config::Config;
use crate::error::Error;

/// Kiosk settings shared by the config and the runtime state.
#[derive(Clone)]
pub(crate) struct KioskSettings {
    pub(crate) cookie_key: Key,
    pub(crate) tab_cookie_name: String,
    pub(crate) secure_cookies: bool,
    pub(crate) tab_idle: Duration,
    pub(crate) max_tabs: usize,
    pub(crate) bind: SocketAddr,
}

impl KioskSettings {
    fn defaults() -> Self {
        Self {
            cookie_key: Key::generate(),
            tab_cookie_name: "__fayda_tab".into(),
            secure_cookies: true,
            tab_idle: Duration::from_secs(30 * 60),
            max_tabs: 256,
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

/// Front-desk kiosk configuration.
///
/// Required field (`core`) is a constructor parameter.
/// Use [`from_env()`](KioskConfig::from_env) for convention-based setup,
/// or [`new()`](KioskConfig::new) with `with_*` methods for full control.
pub struct KioskConfig {
    pub(super) core: Config,
    pub(super) settings: KioskSettings,
}

impl KioskConfig {
    #[must_use]
    pub fn new(core: Config) -> Self {
        Self {
            core,
            settings: KioskSettings::defaults(),
        }
    }

    /// Create config from environment variables.
    ///
    /// Reads everything [`Config::from_env`] reads, plus:
    /// - `KIOSK_BIND`: listen address (default `127.0.0.1:8080`)
    /// - `KIOSK_COOKIE_KEY`: cookie encryption key bytes (at least 64)
    /// - `KIOSK_SECURE_COOKIES`: `"0"` or `"false"` to allow plain-HTTP cookies
    /// - `KIOSK_TAB_IDLE_SECS`: idle time after which a tab is forgotten (default 1800)
    /// - `KIOSK_MAX_TABS`: open tabs kept at once (default 256)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable is present but invalid.
    pub fn from_env() -> Result<Self, Error> {
        let mut config = Self::new(Config::from_env()?);

        if let Ok(bind) = std::env::var("KIOSK_BIND") {
            let bind: SocketAddr = bind
                .parse()
                .map_err(|e| Error::Config(format!("KIOSK_BIND: {e}")))?;
            config = config.with_bind(bind);
        }

        if let Ok(k) = std::env::var("KIOSK_COOKIE_KEY") {
            let key = Key::try_from(k.as_bytes()).map_err(|_| {
                Error::Config(
                    "KIOSK_COOKIE_KEY is set but invalid (must be at least 64 bytes). \
                     Remove the env var to use an ephemeral key, or provide a valid key."
                        .into(),
                )
            })?;
            config = config.with_cookie_key(key);
        }

        if matches!(
            std::env::var("KIOSK_SECURE_COOKIES").as_deref(),
            Ok("0") | Ok("false"),
        ) {
            config = config.with_secure_cookies(false);
        }

        if let Ok(raw) = std::env::var("KIOSK_TAB_IDLE_SECS") {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("KIOSK_TAB_IDLE_SECS: {e}")))?;
            config = config.with_tab_idle(Duration::from_secs(secs));
        }

        if let Ok(raw) = std::env::var("KIOSK_MAX_TABS") {
            let max: usize = raw
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("KIOSK_MAX_TABS: {e}")))?;
            config = config.with_max_tabs(max);
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_cookie_key(mut self, key: Key) -> Self {
        self.settings.cookie_key = key;
        self
    }

    #[must_use]
    pub fn with_tab_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.settings.tab_cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    #[must_use]
    pub fn with_tab_idle(mut self, idle: Duration) -> Self {
        self.settings.tab_idle = idle;
        self
    }

    /// Least recently used tabs are forgotten beyond this many.
    #[must_use]
    pub fn with_max_tabs(mut self, max: usize) -> Self {
        self.settings.max_tabs = max;
        self
    }

    #[must_use]
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.settings.bind = bind;
        self
    }

    #[must_use]
    pub fn core(&self) -> &Config {
        &self.core
    }

    #[must_use]
    pub fn bind(&self) -> SocketAddr {
        self.settings.bind
    }
}
