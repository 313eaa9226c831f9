use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use url::Url;

use super::{Machine, Transition, WorkflowError};
use crate::banner::Banner;
use crate::config::{BannerTimings, Config};
use crate::error::{Error, Field, FieldError};
use crate::gateway::ApiGateway;
use crate::session::SessionStorage;
use crate::types::{CheckinReceipt, FaydaId, Host, HostId, NewCheckin, VisitorIdentity};
use crate::verification::{CallbackQuery, IdentityVerification};

pub const MIN_REASON_CHARS: usize = 5;

const REJECTED: &str = "Identity verification failed. Please try again with correct information.";
const REDIRECTING: &str = "Redirecting to VeriFayda for authentication...";
const UNREACHABLE: &str = "Unable to connect to server. Please check your internet connection.";

/// Where the check-in workflow currently is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum CheckInState {
    IdInput,
    IdentityVerification {
        identity: VisitorIdentity,
    },
    VisitDetails {
        identity: VisitorIdentity,
    },
    Success {
        identity: VisitorIdentity,
        receipt: CheckinReceipt,
        message: String,
    },
}

impl CheckInState {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::IdInput => "id_input",
            Self::IdentityVerification { .. } => "identity_verification",
            Self::VisitDetails { .. } => "visit_details",
            Self::Success { .. } => "success",
        }
    }

    /// The verified visitor, if this state carries one.
    #[must_use]
    pub fn identity(&self) -> Option<&VisitorIdentity> {
        match self {
            Self::IdInput => None,
            Self::IdentityVerification { identity }
            | Self::VisitDetails { identity }
            | Self::Success { identity, .. } => Some(identity),
        }
    }

    /// Feed one event to the state machine.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for bad form input (state unchanged), or
    /// [`Error::InvalidTransition`] if `event` is not accepted in this state.
    pub fn apply(&self, event: CheckInEvent) -> Result<Transition<Self, CheckInCommand>, Error> {
        match (self, event) {
            (Self::IdInput, CheckInEvent::SubmitFaydaId(raw)) => {
                let fayda_id = FaydaId::from_input(&raw)?;
                Ok(Transition::with(
                    Self::IdInput,
                    CheckInCommand::InitiateVerification(fayda_id),
                ))
            }
            (Self::IdInput, CheckInEvent::IdentityVerified(identity)) => {
                Ok(Transition::to(Self::IdentityVerification { identity }))
            }
            (Self::IdentityVerification { identity }, CheckInEvent::Confirm) => {
                Ok(Transition::to(Self::VisitDetails {
                    identity: identity.clone(),
                }))
            }
            (Self::IdentityVerification { .. }, CheckInEvent::Reject) => Ok(Transition::with(
                Self::IdInput,
                CheckInCommand::AbandonVerification,
            )),
            (Self::VisitDetails { identity }, CheckInEvent::Back) => {
                Ok(Transition::to(Self::IdentityVerification {
                    identity: identity.clone(),
                }))
            }
            (Self::VisitDetails { identity }, CheckInEvent::SubmitVisit { host_id, reason }) => {
                let (host_id, reason) = validate_visit(host_id, &reason)?;
                Ok(Transition::with(
                    self.clone(),
                    CheckInCommand::CreateCheckin(NewCheckin::new(identity, host_id, reason)),
                ))
            }
            (
                Self::VisitDetails { identity },
                CheckInEvent::CheckinRecorded {
                    receipt,
                    host_label,
                },
            ) => Ok(Transition::to(Self::Success {
                message: format!(
                    "{} has been successfully checked in to visit {host_label}.",
                    identity.name
                ),
                identity: identity.clone(),
                receipt,
            })),
            (Self::Success { .. }, CheckInEvent::NewCheckin) => Ok(Transition::with(
                Self::IdInput,
                CheckInCommand::AbandonVerification,
            )),
            (state, event) => Err(Error::InvalidTransition {
                state: state.name(),
                action: event.name(),
            }),
        }
    }
}

/// Something that happened to the check-in workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckInEvent {
    /// The operator submitted the Fayda ID input (raw text).
    SubmitFaydaId(String),
    /// The identity provider round trip produced a verified identity.
    IdentityVerified(VisitorIdentity),
    /// The operator attests that the photo and name match the visitor.
    Confirm,
    Reject,
    Back,
    SubmitVisit {
        host_id: Option<HostId>,
        reason: String,
    },
    CheckinRecorded {
        receipt: CheckinReceipt,
        host_label: String,
    },
    NewCheckin,
}

impl CheckInEvent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SubmitFaydaId(_) => "submit Fayda ID",
            Self::IdentityVerified(_) => "accept verified identity",
            Self::Confirm => "confirm identity",
            Self::Reject => "reject identity",
            Self::Back => "go back",
            Self::SubmitVisit { .. } => "submit visit details",
            Self::CheckinRecorded { .. } => "record check-in",
            Self::NewCheckin => "start a new check-in",
        }
    }
}

/// Side effect requested by a check-in transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckInCommand {
    InitiateVerification(FaydaId),
    CreateCheckin(NewCheckin),
    /// Drop the verified identity and any pending OIDC session.
    AbandonVerification,
}

/// Host must be chosen and the trimmed reason must have at least
/// [`MIN_REASON_CHARS`] characters. Both problems are reported together.
///
/// # Errors
///
/// Returns [`Error::Validation`] listing every offending field.
pub fn validate_visit(host_id: Option<HostId>, reason: &str) -> Result<(HostId, String), Error> {
    let reason = reason.trim();
    let mut errors = Vec::new();

    if host_id.is_none() {
        errors.push(FieldError::new(Field::Host, "Please select a person to visit"));
    }
    if reason.is_empty() {
        errors.push(FieldError::new(
            Field::Reason,
            "Please enter a reason for the visit",
        ));
    } else if reason.chars().count() < MIN_REASON_CHARS {
        errors.push(FieldError::new(
            Field::Reason,
            "Please provide a more detailed reason",
        ));
    }

    match host_id {
        Some(host_id) if errors.is_empty() => Ok((host_id, reason.to_owned())),
        _ => Err(Error::Validation(errors)),
    }
}

/// Where the operator's browser has to go next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub url: Url,
    pub banner: Banner,
}

/// Drives one check-in workflow instance (one operator tab).
pub struct CheckInController<G, S> {
    gateway: Arc<G>,
    verification: IdentityVerification<G, S>,
    banners: BannerTimings,
    test_fan: String,
    hosts: Mutex<Vec<Host>>,
    machine: Machine<CheckInState>,
}

impl<G: ApiGateway, S: SessionStorage> CheckInController<G, S> {
    #[must_use]
    pub fn new(gateway: Arc<G>, storage: Arc<S>, config: &Config) -> Self {
        Self {
            verification: IdentityVerification::new(gateway.clone(), storage, config),
            gateway,
            banners: config.banners(),
            test_fan: config.test_fan().to_owned(),
            hosts: Mutex::new(Vec::new()),
            machine: Machine::new(CheckInState::IdInput),
        }
    }

    #[must_use]
    pub fn state(&self) -> CheckInState {
        self.machine.snapshot()
    }

    /// Whether an action is awaiting the backend; the UI disables its controls.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.machine.is_busy()
    }

    #[must_use]
    pub fn hosts(&self) -> Vec<Host> {
        self.hosts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Page-load work: reachability check and host directory.
    ///
    /// Returns the banners to show; an empty list means all went well.
    pub async fn start(&self) -> Vec<Banner> {
        let mut banners = Vec::new();
        match self.gateway.test_connection().await {
            Ok(true) => tracing::debug!("API connection test passed"),
            Ok(false) => tracing::warn!("API connection test returned a non-success status"),
            Err(e) => {
                tracing::error!(error = %e, "API connection test error");
                banners.push(self.error_banner(UNREACHABLE));
            }
        }
        if let Err(failure) = self.load_hosts().await {
            banners.extend(failure.banner);
        }
        banners
    }

    /// Refresh the host directory.
    ///
    /// # Errors
    ///
    /// Backend failures, with a banner asking the operator to refresh.
    pub async fn load_hosts(&self) -> Result<Vec<Host>, WorkflowError> {
        match self.gateway.list_hosts().await {
            Ok(hosts) => {
                *self.hosts.lock().unwrap_or_else(PoisonError::into_inner) = hosts.clone();
                Ok(hosts)
            }
            Err(e) => {
                tracing::error!(error = %e, "loading hosts failed");
                let banner = self.error_banner(format!(
                    "Failed to load host list: {e}. Please refresh the page."
                ));
                Err(WorkflowError::with_banner(e, banner))
            }
        }
    }

    /// Placeholder until camera scanning exists.
    #[must_use]
    pub fn scan_qr(&self) -> Banner {
        Banner::info(
            format!(
                "QR Code scanning will be implemented with camera integration. \
                 For now, please enter the 12-digit Fayda ID manually. Test ID: {}",
                self.test_fan
            ),
            self.banners.info,
        )
    }

    /// Validate the Fayda ID and start identity verification.
    ///
    /// On success the caller must navigate the whole page to `Navigation::url`.
    ///
    /// # Errors
    ///
    /// Validation errors (no network call made), [`Error::Busy`], or backend
    /// failures with a banner. The workflow stays in [`CheckInState::IdInput`].
    pub async fn submit_fayda_id(&self, raw: &str) -> Result<Navigation, WorkflowError> {
        let flight = self.machine.begin()?;
        let transition = flight
            .state()
            .apply(CheckInEvent::SubmitFaydaId(raw.to_owned()))?;
        let Some(CheckInCommand::InitiateVerification(fayda_id)) = transition.command else {
            return Err(Error::InvalidTransition {
                state: flight.state().name(),
                action: "submit Fayda ID",
            }
            .into());
        };

        match self.verification.authorize(&fayda_id).await {
            Ok(redirect) => {
                // Store the nonce only if no reset happened while waiting.
                flight.land_with(Some(transition.state), || {
                    self.verification.remember(&fayda_id, &redirect)
                })?;
                Ok(Navigation {
                    url: redirect.auth_url,
                    banner: Banner::info(REDIRECTING, self.banners.info),
                })
            }
            Err(e) => {
                flight.land(None)?;
                tracing::error!(error = %e, "initiating OIDC failed");
                let banner = self.error_banner(format!(
                    "Failed to initiate visitor verification: {e}. Please try again."
                ));
                Err(WorkflowError::with_banner(e, banner))
            }
        }
    }

    /// Handle a page load that may be the identity provider's redirect back.
    ///
    /// `Ok(None)` when `query` is not a callback. Either way the caller should
    /// replace the address with [`strip_callback_params`](crate::verification::strip_callback_params).
    ///
    /// # Errors
    ///
    /// Everything [`IdentityVerification::resume_from_callback`] can fail with, each
    /// with a banner; the workflow stays in [`CheckInState::IdInput`].
    pub async fn resume(
        &self,
        query: &CallbackQuery,
    ) -> Result<Option<VisitorIdentity>, WorkflowError> {
        if !query.is_callback() {
            return Ok(None);
        }
        let flight = self.machine.begin()?;
        if !matches!(flight.state(), CheckInState::IdInput) {
            return Err(Error::InvalidTransition {
                state: flight.state().name(),
                action: "accept verified identity",
            }
            .into());
        }

        match self.verification.verify_callback(query).await {
            Ok(Some(identity)) => {
                let next = flight
                    .state()
                    .apply(CheckInEvent::IdentityVerified(identity.clone()))?
                    .state;
                // After a reset the session may belong to a newer verification.
                flight.land_with(Some(next), || self.verification.complete())?;
                tracing::debug!(name = %identity.name, "displaying visitor info");
                Ok(Some(identity))
            }
            Ok(None) => {
                flight.land(None)?;
                Ok(None)
            }
            Err(e) => {
                flight.land(None)?;
                tracing::error!(error = %e, "resuming OIDC callback failed");
                let message = match &e {
                    Error::AuthorizationDenied(reason) => {
                        format!("Authentication failed: {reason}. Please try again.")
                    }
                    other => {
                        format!("Failed to verify visitor identity: {other}. Please try again.")
                    }
                };
                let banner = self.error_banner(message);
                Err(WorkflowError::with_banner(e, banner))
            }
        }
    }

    /// # Errors
    ///
    /// [`Error::InvalidTransition`] outside identity verification, or [`Error::Busy`].
    pub fn confirm(&self) -> Result<(), WorkflowError> {
        self.step(CheckInEvent::Confirm)?;
        tracing::debug!("identity confirmed");
        Ok(())
    }

    /// Reject the displayed identity: full reset, returning the banner to show.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidTransition`] outside identity verification, [`Error::Busy`],
    /// or a storage failure while clearing the pending session.
    pub fn reject(&self) -> Result<Banner, WorkflowError> {
        self.step(CheckInEvent::Reject)?;
        tracing::info!("identity rejected");
        self.reset()?;
        Ok(self.error_banner(REJECTED))
    }

    /// # Errors
    ///
    /// [`Error::InvalidTransition`] outside visit details, or [`Error::Busy`].
    pub fn back(&self) -> Result<(), WorkflowError> {
        self.step(CheckInEvent::Back).map_err(Into::into)
    }

    /// Validate the visit form and record the check-in.
    ///
    /// # Errors
    ///
    /// Validation errors (no network call made), [`Error::Busy`] while a previous
    /// submission is pending, [`Error::Superseded`] if the workflow was reset while
    /// waiting, or backend failures with a banner. Failures keep the workflow in
    /// [`CheckInState::VisitDetails`].
    pub async fn submit_visit(
        &self,
        host_id: Option<HostId>,
        reason: &str,
    ) -> Result<CheckinReceipt, WorkflowError> {
        let flight = self.machine.begin()?;
        let transition = flight.state().apply(CheckInEvent::SubmitVisit {
            host_id,
            reason: reason.to_owned(),
        })?;
        let Some(CheckInCommand::CreateCheckin(checkin)) = transition.command else {
            return Err(Error::InvalidTransition {
                state: flight.state().name(),
                action: "submit visit details",
            }
            .into());
        };

        tracing::debug!(host_id = %checkin.host_id, "submitting visit form");
        match self.gateway.create_checkin(&checkin).await {
            Ok(receipt) => {
                let next = flight
                    .state()
                    .apply(CheckInEvent::CheckinRecorded {
                        receipt: receipt.clone(),
                        host_label: self.host_label(checkin.host_id),
                    })?
                    .state;
                flight.land(Some(next))?;
                tracing::info!(visit_id = %receipt.id, "check-in successful");
                Ok(receipt)
            }
            Err(e) => {
                flight.land(None)?;
                tracing::error!(error = %e, "completing check-in failed");
                let banner = self.error_banner(format!(
                    "Failed to complete check-in: {e}. Please try again."
                ));
                Err(WorkflowError::with_banner(e, banner))
            }
        }
    }

    /// Leave the success screen for a fresh check-in.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidTransition`] outside the success state, or a storage failure.
    pub fn new_checkin(&self) -> Result<(), WorkflowError> {
        self.step(CheckInEvent::NewCheckin)?;
        self.reset()
    }

    /// Back to the Fayda ID input from anywhere: discards the visitor, clears the
    /// pending verification, and invalidates any request still in flight.
    ///
    /// # Errors
    ///
    /// Returns a storage failure from clearing the pending session; the workflow
    /// has been reset regardless.
    pub fn reset(&self) -> Result<(), WorkflowError> {
        tracing::debug!("resetting check-in");
        self.machine.reset(CheckInState::IdInput);
        self.verification.abandon().map_err(WorkflowError::from)
    }

    fn step(&self, event: CheckInEvent) -> Result<(), Error> {
        self.machine.update(|state| {
            let transition = state.apply(event)?;
            Ok((transition.state, ()))
        })
    }

    fn host_label(&self, host_id: HostId) -> String {
        self.hosts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|h| h.id == host_id)
            .map_or_else(|| format!("host #{host_id}"), Host::label)
    }

    fn error_banner(&self, message: impl Into<String>) -> Banner {
        Banner::error(message, self.banners.checkin_error)
    }
}
