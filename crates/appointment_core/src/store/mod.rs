//! Storage port used by the appointment repository.
//!
//! # Responsibility
//! - Define the minimal capability set the repository needs from a store.
//! - Describe entities to storage as named cells, independent of the engine.
//!
//! # Invariants
//! - Filters reach storage only as `Query` values; values are always bound,
//!   never spliced into statement text.
//! - After `close()` every operation fails with `StoreError::Closed`.
//! - Writes issued between `begin()` and `commit()` become visible together.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod mapping;
pub mod query;
mod sqlite;

pub use query::{Direction, Predicate, Query};
pub use sqlite::SqliteStorage;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by storage implementations.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite or bootstrap failure.
    Db(DbError),
    /// The storage handle was already released by `close()`.
    Closed,
    /// An update targeted a row that does not exist.
    RowNotFound { table: &'static str, key: String },
    /// Persisted or requested data cannot be mapped.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Closed => write!(f, "storage handle is closed"),
            Self::RowNotFound { table, key } => write!(f, "no row in `{table}` with key {key}"),
            Self::InvalidData(message) => write!(f, "invalid store data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Closed => None,
            Self::RowNotFound { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One stored cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Text(String),
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Static description of how one entity type is laid out in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityKind {
    /// Singular name used in logs and errors.
    pub name: &'static str,
    pub table: &'static str,
    pub key_column: &'static str,
    /// Non-key columns, in the order of `Entity::values`.
    pub columns: &'static [&'static str],
}

impl EntityKind {
    /// Returns whether `column` is the key or one of the data columns.
    pub fn has_column(&self, column: &str) -> bool {
        self.key_column == column || self.columns.contains(&column)
    }
}

/// One fetched row: the key cell plus the data cells in `EntityKind` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    table: &'static str,
    columns: &'static [&'static str],
    key: FieldValue,
    values: Vec<FieldValue>,
}

impl Record {
    pub fn new(kind: &EntityKind, key: FieldValue, values: Vec<FieldValue>) -> Self {
        Self {
            table: kind.table,
            columns: kind.columns,
            key,
            values,
        }
    }

    pub fn key_integer(&self) -> StoreResult<i64> {
        match &self.key {
            FieldValue::Integer(value) => Ok(*value),
            other => Err(self.mismatch("key", "integer", other)),
        }
    }

    pub fn key_text(&self) -> StoreResult<String> {
        match &self.key {
            FieldValue::Text(value) => Ok(value.clone()),
            other => Err(self.mismatch("key", "text", other)),
        }
    }

    pub fn text(&self, column: &str) -> StoreResult<String> {
        match self.field(column)? {
            FieldValue::Text(value) => Ok(value.clone()),
            other => Err(self.mismatch(column, "text", other)),
        }
    }

    pub fn opt_text(&self, column: &str) -> StoreResult<Option<String>> {
        match self.field(column)? {
            FieldValue::Null => Ok(None),
            FieldValue::Text(value) => Ok(Some(value.clone())),
            other => Err(self.mismatch(column, "text", other)),
        }
    }

    pub fn integer(&self, column: &str) -> StoreResult<i64> {
        match self.field(column)? {
            FieldValue::Integer(value) => Ok(*value),
            other => Err(self.mismatch(column, "integer", other)),
        }
    }

    pub fn opt_integer(&self, column: &str) -> StoreResult<Option<i64>> {
        match self.field(column)? {
            FieldValue::Null => Ok(None),
            FieldValue::Integer(value) => Ok(Some(*value)),
            other => Err(self.mismatch(column, "integer", other)),
        }
    }

    fn field(&self, column: &str) -> StoreResult<&FieldValue> {
        self.columns
            .iter()
            .position(|candidate| *candidate == column)
            .and_then(|index| self.values.get(index))
            .ok_or_else(|| {
                StoreError::InvalidData(format!("column `{column}` missing from `{}` row", self.table))
            })
    }

    fn mismatch(&self, column: &str, expected: &str, found: &FieldValue) -> StoreError {
        StoreError::InvalidData(format!(
            "expected {expected} in {}.{column}, found {found}",
            self.table
        ))
    }
}

/// Mapping between a domain record and its stored row.
pub trait Entity: Sized {
    type Key: Clone;

    const KIND: EntityKind;

    /// Key of this value, or `None` when it has not been assigned yet.
    fn key(&self) -> Option<Self::Key>;
    fn key_value(key: &Self::Key) -> FieldValue;
    /// Data cells in `KIND.columns` order.
    fn values(&self) -> Vec<FieldValue>;
    fn from_record(record: &Record) -> StoreResult<Self>;
}

/// Capabilities the repository requires from a backing store.
///
/// `insert` and `update` return the stored copy, so generated keys and
/// storage-side defaults are visible to the caller.
pub trait Storage {
    /// Opens an atomic write scope.
    fn begin(&mut self) -> StoreResult<()>;
    /// Publishes every write made since `begin`.
    fn commit(&mut self) -> StoreResult<()>;
    /// Discards every write made since `begin`. A no-op without an open scope.
    fn rollback(&mut self) -> StoreResult<()>;

    fn find<E: Entity>(&self, key: &E::Key) -> StoreResult<Option<E>>;
    fn query<E: Entity>(&self, query: &Query) -> StoreResult<Vec<E>>;
    fn insert<E: Entity>(&mut self, entity: &E) -> StoreResult<E>;
    fn update<E: Entity>(&mut self, entity: &E) -> StoreResult<E>;
    /// Returns whether a row was removed.
    fn delete<E: Entity>(&mut self, key: &E::Key) -> StoreResult<bool>;
    fn contains<E: Entity>(&self, key: &E::Key) -> StoreResult<bool>;

    /// Releases the handle. Safe to call more than once.
    fn close(&mut self);
    fn is_open(&self) -> bool;
}
