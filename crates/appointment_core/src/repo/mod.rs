//! Repository layer for the scheduling domain.
//!
//! # Responsibility
//! - Expose use-case level CRUD, query and reservation APIs.
//! - Keep storage details behind the `Storage` port.
//!
//! # Invariants
//! - Every mutating call runs in exactly one atomic scope.
//! - Business-rule rejections are `Ok(false)`; missing targets and invalid
//!   arguments are errors raised before any write.

pub mod appointment_repo;
