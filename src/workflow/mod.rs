//! Check-in and check-out workflows.
//!
//! Each workflow is split in two:
//! - a pure state machine (`apply(&state, event) -> Transition`) that validates
//!   input and names the backend call a transition needs, and
//! - a controller that runs that call, holds the current state, and guarantees a
//!   single in-flight action per workflow instance.

pub mod checkin;
pub mod checkout;

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::banner::Banner;
use crate::error::Error;

pub use checkin::{CheckInCommand, CheckInController, CheckInEvent, CheckInState};
pub use checkout::{
    CheckOutCommand, CheckOutController, CheckOutEvent, CheckOutState, format_duration,
};

/// Result of feeding an event to a state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition<S, C> {
    pub state: S,
    /// Side effect the controller has to perform before the transition completes.
    pub command: Option<C>,
}

impl<S, C> Transition<S, C> {
    pub(crate) fn to(state: S) -> Self {
        Self {
            state,
            command: None,
        }
    }

    pub(crate) fn with(state: S, command: C) -> Self {
        Self {
            state,
            command: Some(command),
        }
    }
}

/// A refused or failed workflow action.
///
/// `banner` is what the operator should see; it is `None` for validation errors
/// (shown inline) and for refusals that need no message.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct WorkflowError {
    #[source]
    pub error: Error,
    pub banner: Option<Banner>,
}

impl WorkflowError {
    pub(crate) fn silent(error: Error) -> Self {
        Self {
            error,
            banner: None,
        }
    }

    pub(crate) fn with_banner(error: Error, banner: Banner) -> Self {
        Self {
            error,
            banner: Some(banner),
        }
    }
}

impl From<Error> for WorkflowError {
    fn from(error: Error) -> Self {
        Self::silent(error)
    }
}

struct Slot<S> {
    state: S,
    epoch: u64,
    in_flight: bool,
}

/// Current state of one workflow instance plus its in-flight bookkeeping.
///
/// The lock is only ever held for synchronous bookkeeping, never across an await.
pub(crate) struct Machine<S> {
    slot: Mutex<Slot<S>>,
}

impl<S: Clone> Machine<S> {
    pub(crate) fn new(initial: S) -> Self {
        Self {
            slot: Mutex::new(Slot {
                state: initial,
                epoch: 0,
                in_flight: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<S>> {
        // Every write replaces whole values, so a poisoned slot is still consistent.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn snapshot(&self) -> S {
        self.lock().state.clone()
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.lock().in_flight
    }

    /// Mark an action as in flight. Fails with [`Error::Busy`] if one already is.
    pub(crate) fn begin(&self) -> Result<Flight<'_, S>, Error> {
        let mut slot = self.lock();
        if slot.in_flight {
            return Err(Error::Busy);
        }
        slot.in_flight = true;
        Ok(Flight {
            machine: self,
            epoch: slot.epoch,
            state: slot.state.clone(),
            landed: false,
        })
    }

    /// Apply a synchronous transition unless an action is in flight.
    pub(crate) fn update<T>(&self, f: impl FnOnce(&S) -> Result<(S, T), Error>) -> Result<T, Error> {
        let mut slot = self.lock();
        if slot.in_flight {
            return Err(Error::Busy);
        }
        let (next, out) = f(&slot.state)?;
        slot.state = next;
        Ok(out)
    }

    /// Force the initial state and invalidate anything still in flight.
    pub(crate) fn reset(&self, initial: S) {
        let mut slot = self.lock();
        slot.state = initial;
        slot.epoch = slot.epoch.wrapping_add(1);
        slot.in_flight = false;
    }
}

/// An action in flight. Dropping it without landing releases the machine.
pub(crate) struct Flight<'a, S> {
    machine: &'a Machine<S>,
    epoch: u64,
    state: S,
    landed: bool,
}

impl<S: Clone> Flight<'_, S> {
    /// State as it was when the action started.
    pub(crate) fn state(&self) -> &S {
        &self.state
    }

    /// Finish the action. If the instance was reset meanwhile, the result is
    /// discarded with [`Error::Superseded`] and the state is left alone.
    pub(crate) fn land(self, next: Option<S>) -> Result<(), Error> {
        self.land_with(next, || Ok(()))
    }

    /// Like [`land`](Self::land), but runs `commit` first while the instance is
    /// still locked, so a concurrent reset either precedes it (and `commit` never
    /// runs) or follows it (and undoes it).
    ///
    /// If `commit` fails the action is released and the state is left alone.
    pub(crate) fn land_with(
        mut self,
        next: Option<S>,
        commit: impl FnOnce() -> Result<(), Error>,
    ) -> Result<(), Error> {
        self.landed = true;
        let mut slot = self.machine.lock();
        if slot.epoch != self.epoch {
            return Err(Error::Superseded);
        }
        slot.in_flight = false;
        commit()?;
        if let Some(next) = next {
            slot.state = next;
        }
        Ok(())
    }
}

impl<S> Drop for Flight<'_, S> {
    fn drop(&mut self) {
        if self.landed {
            return;
        }
        let mut slot = self
            .machine
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.epoch == self.epoch {
            slot.in_flight = false;
        }
    }
}
