//! Appointment repository: CRUD, relationship upkeep and reservations.
//!
//! # Responsibility
//! - Guard every write with its pre-conditions before touching storage.
//! - Keep appointments consistent with their provider and customer across
//!   deletes (cascade for providers, detach for customers).
//! - Drive the `Unreserved <-> Reserved` reservation transitions.
//!
//! # Invariants
//! - One logical operation is one atomic scope; a failure anywhere inside it
//!   rolls back every write of that operation.
//! - Reservation guards are evaluated against the stored row inside the same
//!   scope as the write, never against the caller's copy.
//! - Log events carry ids and counts only, never emails or names.

use crate::config::StoreConfig;
use crate::model::appointment::{Appointment, AppointmentId};
use crate::model::customer::Customer;
use crate::model::provider::{Provider, ProviderId, ProviderType};
use crate::store::mapping::{
    is_storable_time, time_value, APPOINTMENT_CUSTOMER, APPOINTMENT_PROVIDER, APPOINTMENT_TIME,
    CUSTOMER_FIRSTNAME, CUSTOMER_LASTNAME, PROVIDER_ADDRESS, PROVIDER_TYPE,
};
use crate::store::{
    Direction, Entity, FieldValue, Predicate, Query, SqliteStorage, Storage, StoreError,
};
use chrono::NaiveDateTime;
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Lower bound in epoch microseconds used by `find_appointments` when `from`
/// is absent (2000-01-01T00:00).
pub const FAR_PAST_MICROS: i64 = 946_684_800_000_000;
/// Upper bound in epoch microseconds used by `find_appointments` when `to` is
/// absent (3000-01-01T00:00).
pub const FAR_FUTURE_MICROS: i64 = 32_503_680_000_000_000;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for scheduling operations.
#[derive(Debug)]
pub enum RepoError {
    /// A required argument is missing or empty. Raised before storage access.
    InvalidArgument(String),
    /// Update/delete target does not exist.
    NotFound { kind: &'static str, key: String },
    /// Storage failure; the surrounding scope was rolled back.
    Store(StoreError),
}

impl RepoError {
    fn not_found<E: Entity>(key: impl Display) -> Self {
        Self::NotFound {
            kind: E::KIND.name,
            key: key.to_string(),
        }
    }

    /// Stable machine-readable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotFound { .. } => "not_found",
            Self::Store(StoreError::Closed) => "store_closed",
            Self::Store(_) => "store_failed",
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::NotFound { kind, key } => write!(f, "{kind} not found: {key}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidArgument(_) => None,
            Self::NotFound { .. } => None,
            Self::Store(err) => Some(err),
        }
    }
}

impl From<StoreError> for RepoError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Outcome of a guarded reservation transition.
enum Transition {
    Applied(Appointment),
    Rejected(&'static str),
}

/// Facade over one storage handle.
///
/// Not internally synchronized: every call takes the handle for its whole
/// duration, and mutating calls require `&mut self`.
pub struct AppointmentRepository<S: Storage> {
    store: S,
}

impl AppointmentRepository<SqliteStorage> {
    /// Opens a SQLite-backed repository described by `config`.
    pub fn open(config: &StoreConfig) -> RepoResult<Self> {
        Ok(Self::new(SqliteStorage::open(config)?))
    }

    /// Opens a repository over a private in-memory database.
    pub fn open_in_memory() -> RepoResult<Self> {
        Ok(Self::new(SqliteStorage::open_in_memory()?))
    }
}

impl<S: Storage> AppointmentRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Borrows the underlying storage.
    pub fn storage(&self) -> &S {
        &self.store
    }

    // ----- customers -------------------------------------------------------

    /// Stores a new customer.
    ///
    /// Returns `Ok(false)` when the email is blank or already taken.
    pub fn create_customer(&mut self, customer: &Customer) -> RepoResult<bool> {
        let Some(email) = customer.key() else {
            info!("event=customer_create module=repo status=rejected reason=missing_key");
            return Ok(false);
        };

        self.in_scope("customer_create", |store| {
            if store.contains::<Customer>(&email)? {
                info!("event=customer_create module=repo status=rejected reason=duplicate_key");
                return Ok(false);
            }
            store.insert(customer)?;
            Ok(true)
        })
    }

    /// Loads a customer by email. Blank emails never match.
    pub fn read_customer(&self, email: &str) -> RepoResult<Option<Customer>> {
        if email.trim().is_empty() {
            return Ok(None);
        }
        Ok(self.store.find::<Customer>(&email.to_string())?)
    }

    /// Overwrites the name attributes of an existing customer.
    ///
    /// # Errors
    /// - `RepoError::NotFound` when no customer with this email exists.
    pub fn update_customer(&mut self, customer: &Customer) -> RepoResult<Customer> {
        self.in_scope("customer_update", |store| {
            existing_key(store, customer)?;
            Ok(store.update(customer)?)
        })
    }

    /// Removes a customer after detaching every appointment they hold.
    ///
    /// Detaching and removal happen in one scope: either the customer is gone
    /// and all their appointments are unreserved, or nothing changed.
    ///
    /// # Errors
    /// - `RepoError::NotFound` when no customer with this email exists.
    pub fn delete_customer(&mut self, customer: &Customer) -> RepoResult<()> {
        let detached = self.in_scope("customer_delete", |store| {
            let email = existing_key(store, customer)?;

            let held = store.query::<Appointment>(&held_by(&email))?;
            for mut appointment in held.iter().cloned() {
                appointment.customer_email = None;
                store.update(&appointment)?;
            }

            store.delete::<Customer>(&email)?;
            Ok(held.len())
        })?;

        info!("event=customer_delete module=repo status=ok detached={detached}");
        Ok(())
    }

    // ----- providers -------------------------------------------------------

    /// Stores a new provider together with its initial appointments.
    ///
    /// Each appointment in `appointments` is bound to the new provider and
    /// stored in the same scope. On success `provider` and every element of
    /// `appointments` are replaced by their stored copies (ids assigned).
    ///
    /// Returns `Ok(false)`, without writing, when `provider` or any of the
    /// appointments already carries an id.
    ///
    /// # Errors
    /// - `RepoError::InvalidArgument` when an appointment time is finer than
    ///   one microsecond.
    pub fn create_provider(
        &mut self,
        provider: &mut Provider,
        appointments: &mut [Appointment],
    ) -> RepoResult<bool> {
        if provider.is_persisted() {
            info!("event=provider_create module=repo status=rejected reason=id_assigned");
            return Ok(false);
        }
        if appointments.iter().any(Appointment::is_persisted) {
            info!(
                "event=provider_create module=repo status=rejected reason=appointment_id_assigned"
            );
            return Ok(false);
        }
        for appointment in appointments.iter() {
            check_precision(appointment.time)?;
        }

        let pending: &Provider = provider;
        let drafts: &[Appointment] = appointments;
        let (stored, stored_appointments) = self.in_scope("provider_create", |store| {
            let stored = store.insert(pending)?;
            let mut saved = Vec::with_capacity(drafts.len());
            for draft in drafts {
                let mut owned = draft.clone();
                owned.provider_id = stored.id;
                saved.push(store.insert(&owned)?);
            }
            Ok((stored, saved))
        })?;

        info!(
            "event=provider_create module=repo status=ok provider_id={} appointments={}",
            stored.id.unwrap_or_default(),
            stored_appointments.len()
        );
        *provider = stored;
        for (target, saved) in appointments.iter_mut().zip(stored_appointments) {
            *target = saved;
        }
        Ok(true)
    }

    pub fn read_provider(&self, id: ProviderId) -> RepoResult<Option<Provider>> {
        Ok(self.store.find::<Provider>(&id)?)
    }

    /// Overwrites type and address of an existing provider.
    ///
    /// # Errors
    /// - `RepoError::NotFound` when the id is unset or unknown.
    pub fn update_provider(&mut self, provider: &Provider) -> RepoResult<Provider> {
        self.in_scope("provider_update", |store| {
            existing_key(store, provider)?;
            Ok(store.update(provider)?)
        })
    }

    /// Removes a provider and, in the same scope, every appointment it owns.
    ///
    /// # Errors
    /// - `RepoError::NotFound` when the id is unset or unknown.
    pub fn delete_provider(&mut self, provider: &Provider) -> RepoResult<()> {
        let (id, removed) = self.in_scope("provider_delete", |store| {
            let id = existing_key(store, provider)?;

            let owned = store.query::<Appointment>(&owned_by(id))?;
            for appointment in &owned {
                if let Some(appointment_id) = appointment.id {
                    store.delete::<Appointment>(&appointment_id)?;
                }
            }

            store.delete::<Provider>(&id)?;
            Ok((id, owned.len()))
        })?;

        info!("event=provider_delete module=repo status=ok provider_id={id} cascaded={removed}");
        Ok(())
    }

    // ----- queries ---------------------------------------------------------

    /// Finds customers by case-insensitive substring of lastname and,
    /// optionally, firstname.
    ///
    /// Without a firstname the result is ordered by lastname ascending.
    ///
    /// # Errors
    /// - `RepoError::InvalidArgument` when `lastname` is blank.
    pub fn find_customers_by(
        &self,
        lastname: &str,
        firstname: Option<&str>,
    ) -> RepoResult<Vec<Customer>> {
        if lastname.trim().is_empty() {
            return Err(RepoError::InvalidArgument(
                "lastname must not be empty".to_string(),
            ));
        }

        let by_lastname = Predicate::contains_ignore_case(CUSTOMER_LASTNAME, lastname);
        let query = match firstname.filter(|value| !value.trim().is_empty()) {
            None => Query::filter(by_lastname).order_by(CUSTOMER_LASTNAME, Direction::Asc),
            Some(firstname) => Query::filter(
                by_lastname.and(Predicate::contains_ignore_case(CUSTOMER_FIRSTNAME, firstname)),
            ),
        };
        Ok(self.store.query(&query)?)
    }

    /// Finds providers of `kind` whose address contains `address_part`.
    ///
    /// Either argument missing yields an empty result.
    pub fn find_providers_by(
        &self,
        kind: Option<ProviderType>,
        address_part: Option<&str>,
    ) -> RepoResult<Vec<Provider>> {
        let (Some(kind), Some(address_part)) = (kind, address_part) else {
            return Ok(Vec::new());
        };

        let query = Query::filter(
            Predicate::eq(PROVIDER_TYPE, kind.as_str())
                .and(Predicate::contains_ignore_case(PROVIDER_ADDRESS, address_part)),
        );
        Ok(self.store.query(&query)?)
    }

    /// Finds appointments whose provider's address contains `address_part`.
    pub fn find_appointments_at(&self, address_part: Option<&str>) -> RepoResult<Vec<Appointment>> {
        let Some(address_part) = address_part else {
            return Ok(Vec::new());
        };

        let query = Query::filter(Predicate::related::<Provider>(
            APPOINTMENT_PROVIDER,
            Predicate::contains_ignore_case(PROVIDER_ADDRESS, address_part),
        ))
        .order_by(APPOINTMENT_TIME, Direction::Asc);
        Ok(self.store.query(&query)?)
    }

    /// Finds scheduled appointments with `from <= time <= to`.
    ///
    /// Missing bounds default to [`FAR_PAST_MICROS`] and [`FAR_FUTURE_MICROS`].
    /// Unscheduled appointments have no time and never fall inside a window.
    ///
    /// # Errors
    /// - `RepoError::InvalidArgument` when a bound is finer than one microsecond.
    pub fn find_appointments(
        &self,
        from: Option<NaiveDateTime>,
        to: Option<NaiveDateTime>,
    ) -> RepoResult<Vec<Appointment>> {
        check_precision(from)?;
        check_precision(to)?;
        let low = from.map_or(FieldValue::Integer(FAR_PAST_MICROS), time_value);
        let high = to.map_or(FieldValue::Integer(FAR_FUTURE_MICROS), time_value);

        let query = Query::filter(Predicate::between(APPOINTMENT_TIME, low, high))
            .order_by(APPOINTMENT_TIME, Direction::Asc);
        Ok(self.store.query(&query)?)
    }

    /// Lists appointments currently reserved by `customer`.
    pub fn get_appointments_for(&self, customer: &Customer) -> RepoResult<Vec<Appointment>> {
        match customer.key() {
            Some(email) => Ok(self.store.query(&held_by(&email))?),
            None => Ok(Vec::new()),
        }
    }

    pub fn read_appointment(&self, id: AppointmentId) -> RepoResult<Option<Appointment>> {
        Ok(self.store.find::<Appointment>(&id)?)
    }

    /// Lists the appointments owned by `provider`.
    pub fn appointments_of(&self, provider: &Provider) -> RepoResult<Vec<Appointment>> {
        match provider.id {
            Some(id) => Ok(self.store.query(&owned_by(id))?),
            None => Ok(Vec::new()),
        }
    }

    // ----- reservations ----------------------------------------------------

    /// Reserves `appointment` for `customer` (Unreserved -> Reserved).
    ///
    /// Returns `Ok(false)` when the customer has no key or is unknown, the
    /// appointment is not stored, has no provider, or is already held.
    /// On success `appointment` is replaced by the stored copy.
    pub fn reserve(&mut self, appointment: &mut Appointment, customer: &Customer) -> RepoResult<bool> {
        let (Some(id), Some(email)) = (appointment.id, customer.key()) else {
            info!("event=appointment_reserve module=repo status=rejected reason=missing_key");
            return Ok(false);
        };

        let transition = self.in_scope("appointment_reserve", |store| {
            if !store.contains::<Customer>(&email)? {
                return Ok(Transition::Rejected("unknown_customer"));
            }
            let Some(mut stored) = store.find::<Appointment>(&id)? else {
                return Ok(Transition::Rejected("unknown_appointment"));
            };
            if stored.provider_id.is_none() {
                return Ok(Transition::Rejected("missing_provider"));
            }
            if stored.is_reserved() {
                return Ok(Transition::Rejected("already_reserved"));
            }

            stored.customer_email = Some(email.clone());
            Ok(Transition::Applied(store.update(&stored)?))
        })?;

        Ok(apply_transition("appointment_reserve", id, transition, appointment))
    }

    /// Cancels `customer`'s reservation of `appointment` (Reserved -> Unreserved).
    ///
    /// Returns `Ok(false)` when the appointment is not stored, is unreserved,
    /// or is held by someone else. On success `appointment` is replaced by the
    /// stored copy.
    pub fn cancel(&mut self, appointment: &mut Appointment, customer: &Customer) -> RepoResult<bool> {
        let (Some(id), Some(email)) = (appointment.id, customer.key()) else {
            info!("event=appointment_cancel module=repo status=rejected reason=missing_key");
            return Ok(false);
        };

        let transition = self.in_scope("appointment_cancel", |store| {
            let Some(mut stored) = store.find::<Appointment>(&id)? else {
                return Ok(Transition::Rejected("unknown_appointment"));
            };
            match stored.customer_email.as_deref() {
                None => return Ok(Transition::Rejected("not_reserved")),
                Some(holder) if holder != email => {
                    return Ok(Transition::Rejected("held_by_other"));
                }
                Some(_) => {}
            }

            stored.customer_email = None;
            Ok(Transition::Applied(store.update(&stored)?))
        })?;

        Ok(apply_transition("appointment_cancel", id, transition, appointment))
    }

    // ----- lifecycle -------------------------------------------------------

    /// Releases the storage handle. Further calls are no-ops.
    pub fn close(&mut self) {
        self.store.close();
    }

    pub fn is_open(&self) -> bool {
        self.store.is_open()
    }

    /// Runs `work` inside one atomic scope.
    ///
    /// Commits when `work` succeeds; otherwise, or when the commit itself
    /// fails, rolls the scope back and returns the first error.
    fn in_scope<T>(
        &mut self,
        event: &'static str,
        work: impl FnOnce(&mut S) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let started_at = Instant::now();
        self.store.begin()?;

        let outcome = work(&mut self.store)
            .and_then(|value| self.store.commit().map(|()| value).map_err(RepoError::from));

        if let Err(err) = &outcome {
            if let Err(rollback_err) = self.store.rollback() {
                warn!(
                    "event={event} module=repo status=error error_code=rollback_failed error={rollback_err}"
                );
            }
            warn!(
                "event={event} module=repo status=error duration_ms={} error_code={}",
                started_at.elapsed().as_millis(),
                err.code()
            );
        } else {
            debug!(
                "event={event} module=repo status=committed duration_ms={}",
                started_at.elapsed().as_millis()
            );
        }
        outcome
    }
}

/// Returns the key of `entity` if it names a stored row, else `NotFound`.
fn existing_key<S: Storage, E: Entity>(store: &S, entity: &E) -> RepoResult<E::Key> {
    match entity.key() {
        Some(key) if store.contains::<E>(&key)? => Ok(key),
        Some(key) => Err(RepoError::not_found::<E>(E::key_value(&key))),
        None => Err(RepoError::not_found::<E>("<unassigned>")),
    }
}

/// Rejects times that storage would truncate.
fn check_precision(time: Option<NaiveDateTime>) -> RepoResult<()> {
    match time {
        Some(time) if !is_storable_time(time) => Err(RepoError::InvalidArgument(format!(
            "time {time} is finer than one microsecond"
        ))),
        _ => Ok(()),
    }
}

fn held_by(email: &str) -> Query {
    Query::filter(Predicate::eq(APPOINTMENT_CUSTOMER, email))
}

fn owned_by(provider_id: ProviderId) -> Query {
    Query::filter(Predicate::eq(APPOINTMENT_PROVIDER, provider_id))
}

fn apply_transition(
    event: &'static str,
    id: AppointmentId,
    transition: Transition,
    appointment: &mut Appointment,
) -> bool {
    match transition {
        Transition::Applied(stored) => {
            info!("event={event} module=repo status=ok appointment_id={id}");
            *appointment = stored;
            true
        }
        Transition::Rejected(reason) => {
            info!("event={event} module=repo status=rejected appointment_id={id} reason={reason}");
            false
        }
    }
}
