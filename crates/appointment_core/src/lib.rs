//! Persistence core for appointment scheduling.
//! This crate owns the relationship and reservation invariants of the domain.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod store;

pub use config::{ConfigError, StoreConfig};
pub use logging::{default_log_level, init_logging, init_logging_from, logging_status};
pub use model::appointment::{Appointment, AppointmentId, ReservationState};
pub use model::customer::Customer;
pub use model::provider::{Provider, ProviderId, ProviderType};
pub use repo::appointment_repo::{
    AppointmentRepository, RepoError, RepoResult, FAR_FUTURE_MICROS, FAR_PAST_MICROS,
};
pub use store::{SqliteStorage, Storage, StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
