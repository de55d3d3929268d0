//! Scheduling domain model.
//!
//! # Responsibility
//! - Define the plain records stored by the appointment repository.
//! - Express relationships as key fields on the owned side only.
//!
//! # Invariants
//! - `Appointment` references its provider and customer by key, never by value.
//! - Invariant enforcement lives in the repository, not in these types.

pub mod appointment;
pub mod customer;
pub mod provider;
