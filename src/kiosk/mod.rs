//! Front-desk kiosk for Axum.
//!
//! Serves the check-in and check-out workflows to operator browsers. Each
//! browser tab is identified by a private cookie and owns its own pair of
//! controllers, so two tabs never share a pending OIDC session.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use fayda_visitor::ApiClient;
//! use fayda_visitor::kiosk::{KioskConfig, kiosk_routes};
//!
//! // 1. Configure from environment
//! let config = KioskConfig::from_env()?;
//!
//! // 2. Build the gateway client
//! let gateway = ApiClient::new(config.core().clone())?;
//!
//! // 3. Mount kiosk routes
//! let app = axum::Router::new().merge(kiosk_routes(config, gateway));
//! ```

mod config;
mod cookies;
mod error;
mod routes;
mod state;
mod tabs;
mod types;

pub use config::KioskConfig;
pub use error::KioskError;
pub use routes::kiosk_routes;
pub use types::{HostOption, TabId};

/// Re-export cookie key type for builder API.
pub use axum_extra::extract::cookie::Key as CookieKey;
