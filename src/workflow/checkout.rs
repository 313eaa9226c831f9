use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;

use super::{Machine, Transition, WorkflowError};
use crate::banner::Banner;
use crate::config::{BannerTimings, Config};
use crate::error::Error;
use crate::gateway::ApiGateway;
use crate::types::{CheckoutReceipt, FaydaId, VisitId, VisitRecord};

/// Where the checkout workflow currently is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum CheckOutState {
    IdInput,
    Confirmation {
        visit: VisitRecord,
    },
    Success {
        visit: VisitRecord,
        receipt: CheckoutReceipt,
        duration: String,
        message: String,
    },
}

impl CheckOutState {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::IdInput => "id_input",
            Self::Confirmation { .. } => "confirmation",
            Self::Success { .. } => "success",
        }
    }

    /// Feed one event to the state machine.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for a malformed Fayda ID, or
    /// [`Error::InvalidTransition`] if `event` is not accepted in this state.
    pub fn apply(&self, event: CheckOutEvent) -> Result<Transition<Self, CheckOutCommand>, Error> {
        match (self, event) {
            (Self::IdInput, CheckOutEvent::Lookup(raw)) => {
                let fayda_id = FaydaId::from_input(&raw)?;
                Ok(Transition::with(
                    Self::IdInput,
                    CheckOutCommand::FindActiveVisit(fayda_id),
                ))
            }
            (Self::IdInput, CheckOutEvent::VisitFound(visit)) => {
                Ok(Transition::to(Self::Confirmation { visit }))
            }
            (Self::Confirmation { visit }, CheckOutEvent::Confirm) => Ok(Transition::with(
                self.clone(),
                CheckOutCommand::Checkout {
                    visit_id: visit.id,
                    fayda_id: visit.fayda_id.clone(),
                },
            )),
            (Self::Confirmation { visit }, CheckOutEvent::CheckedOut(receipt)) => {
                let duration = format_duration(visit.checkin_time, receipt.checkout_time);
                Ok(Transition::to(Self::Success {
                    message: format!("{} has been successfully checked out.", visit.name),
                    visit: visit.clone(),
                    receipt,
                    duration,
                }))
            }
            (Self::Confirmation { .. }, CheckOutEvent::Cancel)
            | (Self::Success { .. }, CheckOutEvent::NewCheckout) => {
                Ok(Transition::to(Self::IdInput))
            }
            (state, event) => Err(Error::InvalidTransition {
                state: state.name(),
                action: event.name(),
            }),
        }
    }
}

/// Something that happened to the checkout workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutEvent {
    /// The operator submitted the Fayda ID input (raw text).
    Lookup(String),
    VisitFound(VisitRecord),
    Confirm,
    CheckedOut(CheckoutReceipt),
    Cancel,
    NewCheckout,
}

impl CheckOutEvent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Lookup(_) => "look up active visit",
            Self::VisitFound(_) => "show active visit",
            Self::Confirm => "confirm checkout",
            Self::CheckedOut(_) => "record checkout",
            Self::Cancel => "cancel checkout",
            Self::NewCheckout => "start a new checkout",
        }
    }
}

/// Side effect requested by a checkout transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutCommand {
    FindActiveVisit(FaydaId),
    Checkout { visit_id: VisitId, fayda_id: String },
}

/// Visit length in whole minutes: `"2h 15m"`, or `"45m"` under an hour.
///
/// A checkout stamped before the check-in (clock skew) reads `"0m"`.
#[must_use]
pub fn format_duration(checkin: OffsetDateTime, checkout: OffsetDateTime) -> String {
    let minutes = (checkout - checkin).whole_minutes().max(0);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Drives one checkout workflow instance (one operator tab).
///
/// Checkout never involves the identity provider: the visitor is matched by
/// Fayda ID against a visit the backend already verified at check-in.
pub struct CheckOutController<G> {
    gateway: Arc<G>,
    banners: BannerTimings,
    machine: Machine<CheckOutState>,
}

impl<G: ApiGateway> CheckOutController<G> {
    #[must_use]
    pub fn new(gateway: Arc<G>, config: &Config) -> Self {
        Self {
            gateway,
            banners: config.banners(),
            machine: Machine::new(CheckOutState::IdInput),
        }
    }

    #[must_use]
    pub fn state(&self) -> CheckOutState {
        self.machine.snapshot()
    }

    /// Whether an action is awaiting the backend; the UI disables its controls.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.machine.is_busy()
    }

    /// Find the visitor's active visit and show it for confirmation.
    ///
    /// # Errors
    ///
    /// Validation errors (no network call made), [`Error::Busy`],
    /// [`Error::NotFound`] when the visitor has no active visit, or other backend
    /// failures. Failures keep the workflow in [`CheckOutState::IdInput`].
    pub async fn lookup(&self, raw: &str) -> Result<VisitRecord, WorkflowError> {
        let flight = self.machine.begin()?;
        let transition = flight.state().apply(CheckOutEvent::Lookup(raw.to_owned()))?;
        let Some(CheckOutCommand::FindActiveVisit(fayda_id)) = transition.command else {
            return Err(Error::InvalidTransition {
                state: flight.state().name(),
                action: "look up active visit",
            }
            .into());
        };

        tracing::debug!(fayda_id = %fayda_id.masked(), "finding active visit");
        match self.gateway.find_active_visit(&fayda_id).await {
            Ok(visit) => {
                let next = flight
                    .state()
                    .apply(CheckOutEvent::VisitFound(visit.clone()))?
                    .state;
                flight.land(Some(next))?;
                tracing::debug!(visit_id = %visit.id, "active visit found");
                Ok(visit)
            }
            Err(e) => {
                flight.land(None)?;
                tracing::warn!(error = %e, "finding active visit failed");
                let banner =
                    self.error_banner(format!("{e}. Please verify the Fayda ID and try again."));
                Err(WorkflowError::with_banner(e, banner))
            }
        }
    }

    /// Check the visitor out and compute how long they stayed.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidTransition`] outside confirmation, [`Error::Busy`],
    /// [`Error::Superseded`] if cancelled while waiting, or backend failures with a
    /// banner. Failures keep the workflow in [`CheckOutState::Confirmation`].
    pub async fn confirm(&self) -> Result<CheckoutReceipt, WorkflowError> {
        let flight = self.machine.begin()?;
        let transition = flight.state().apply(CheckOutEvent::Confirm)?;
        let Some(CheckOutCommand::Checkout { visit_id, fayda_id }) = transition.command else {
            return Err(Error::InvalidTransition {
                state: flight.state().name(),
                action: "confirm checkout",
            }
            .into());
        };

        tracing::debug!(%visit_id, "confirming checkout");
        match self.gateway.checkout(visit_id, &fayda_id).await {
            Ok(receipt) => {
                let next = flight
                    .state()
                    .apply(CheckOutEvent::CheckedOut(receipt.clone()))?
                    .state;
                flight.land(Some(next))?;
                tracing::info!(%visit_id, "checkout successful");
                Ok(receipt)
            }
            Err(e) => {
                flight.land(None)?;
                tracing::error!(error = %e, "completing checkout failed");
                let banner = self.error_banner(format!(
                    "Failed to complete checkout: {e}. Please try again."
                ));
                Err(WorkflowError::with_banner(e, banner))
            }
        }
    }

    /// Drop the looked-up visit without telling the backend.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidTransition`] outside confirmation, or [`Error::Busy`].
    pub fn cancel(&self) -> Result<(), WorkflowError> {
        self.step(CheckOutEvent::Cancel)?;
        tracing::debug!("checkout cancelled");
        Ok(())
    }

    /// # Errors
    ///
    /// [`Error::InvalidTransition`] outside the success state.
    pub fn new_checkout(&self) -> Result<(), WorkflowError> {
        self.step(CheckOutEvent::NewCheckout).map_err(Into::into)
    }

    /// Back to the Fayda ID input from anywhere, invalidating any request in flight.
    pub fn reset(&self) {
        tracing::debug!("resetting checkout");
        self.machine.reset(CheckOutState::IdInput);
    }

    fn step(&self, event: CheckOutEvent) -> Result<(), Error> {
        self.machine.update(|state| {
            let transition = state.apply(event)?;
            Ok((transition.state, ()))
        })
    }

    fn error_banner(&self, message: impl Into<String>) -> Banner {
        Banner::error(message, self.banners.checkout_error)
    }
}
