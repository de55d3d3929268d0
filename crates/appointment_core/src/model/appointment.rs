//! Appointment record and reservation state.
//!
//! # Invariants
//! - `provider_id` is set when the appointment is stored and never changes.
//! - `customer_email` is the only field the reservation protocol mutates.

use super::provider::ProviderId;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Storage-assigned appointment identifier.
pub type AppointmentId = i64;

/// Reservation state derived from the customer reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationState {
    /// No customer holds the appointment.
    Unreserved,
    /// Exactly one customer holds the appointment.
    Reserved,
}

/// A bookable slot offered by one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Option<AppointmentId>,
    /// `None` means the slot has not been scheduled yet.
    pub time: Option<NaiveDateTime>,
    /// Owning provider. Filled in by the repository when the provider is created.
    pub provider_id: Option<ProviderId>,
    /// Email of the customer holding the reservation.
    pub customer_email: Option<String>,
}

impl Appointment {
    /// Creates an unreserved appointment at `time`.
    pub fn new(time: NaiveDateTime) -> Self {
        Self {
            time: Some(time),
            ..Self::unscheduled()
        }
    }

    /// Creates an unreserved appointment without a time.
    pub fn unscheduled() -> Self {
        Self {
            id: None,
            time: None,
            provider_id: None,
            customer_email: None,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    pub fn is_reserved(&self) -> bool {
        self.customer_email.is_some()
    }

    pub fn reservation_state(&self) -> ReservationState {
        if self.is_reserved() {
            ReservationState::Reserved
        } else {
            ReservationState::Unreserved
        }
    }
}
