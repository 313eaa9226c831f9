#![doc = include_str!("../README.md")]

pub mod banner;
#[cfg(feature = "http")]
pub mod client;
pub mod config;
pub mod error;
pub mod fayda_id;
pub mod gateway;
#[cfg(feature = "kiosk")]
pub mod kiosk;
pub mod session;
pub mod types;
pub mod verification;
pub mod workflow;

// Re-exports for convenient access
pub use banner::{Banner, BannerKind};
#[cfg(feature = "http")]
pub use client::ApiClient;
pub use config::{BannerTimings, Config};
pub use error::{Error, Field, FieldError};
pub use fayda_id::{FAYDA_ID_LEN, is_valid_fayda_id, live_feedback, strip_non_digits};
pub use gateway::{ApiGateway, AuthorizationRedirect};
pub use session::{MemoryStorage, OidcSession, SessionStorage};
pub use types::{
    CheckinReceipt, CheckoutReceipt, FaydaId, Host, HostId, NewCheckin, VisitId, VisitRecord,
    VisitorIdentity,
};
pub use verification::{CallbackQuery, IdentityVerification, strip_callback_params};
pub use workflow::{
    CheckInController, CheckInState, CheckOutController, CheckOutState, WorkflowError,
    format_duration,
};
