//! SQLite implementation of the storage port.
//!
//! # Responsibility
//! - Translate `Entity` descriptions and `Query` filters into parameterized SQL.
//! - Map SQLite cells to `FieldValue` and back.
//!
//! # Invariants
//! - Every value is bound positionally; only static column and table names are
//!   written into statement text, and query columns are checked against the
//!   entity layout first.
//! - Atomic scopes use `BEGIN IMMEDIATE` so the write lock is taken up front.
//! - Result order is deterministic: requested ordering, then key ascending.

use super::query::{Direction, Predicate, Query};
use super::{Entity, EntityKind, FieldValue, Record, Storage, StoreError, StoreResult};
use crate::config::StoreConfig;
use crate::db::{open_configured, open_db_in_memory, CASEFOLD_FUNCTION};
use log::{debug, info, warn};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};

/// Storage backed by one owned SQLite connection.
pub struct SqliteStorage {
    conn: Option<Connection>,
}

impl SqliteStorage {
    /// Wraps a connection that already has the schema applied.
    pub fn new(conn: Connection) -> Self {
        Self { conn: Some(conn) }
    }

    /// Opens the store described by `config`.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        Ok(Self::new(open_configured(config)?))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    /// Borrows the live connection.
    pub fn connection(&self) -> StoreResult<&Connection> {
        self.conn.as_ref().ok_or(StoreError::Closed)
    }

    fn select_sql(kind: &EntityKind) -> String {
        let mut columns = vec![kind.key_column];
        columns.extend_from_slice(kind.columns);
        format!("SELECT {} FROM {}", columns.join(", "), kind.table)
    }

    fn fetch_one<E: Entity>(&self, where_sql: &str, bind: Value) -> StoreResult<Option<E>> {
        let conn = self.connection()?;
        let sql = format!("{} WHERE {where_sql};", Self::select_sql(&E::KIND));
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([bind])?;
        match rows.next()? {
            Some(row) => Ok(Some(E::from_record(&read_record(&E::KIND, row)?)?)),
            None => Ok(None),
        }
    }
}

impl Storage for SqliteStorage {
    fn begin(&mut self) -> StoreResult<()> {
        self.connection()?.execute_batch("BEGIN IMMEDIATE;")?;
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        self.connection()?.execute_batch("COMMIT;")?;
        Ok(())
    }

    fn rollback(&mut self) -> StoreResult<()> {
        let conn = self.connection()?;
        // SQLite may already have rolled back on its own after some errors.
        if !conn.is_autocommit() {
            conn.execute_batch("ROLLBACK;")?;
        }
        Ok(())
    }

    fn find<E: Entity>(&self, key: &E::Key) -> StoreResult<Option<E>> {
        let where_sql = format!("{} = ?1", E::KIND.key_column);
        self.fetch_one(&where_sql, to_sql_value(&E::key_value(key)))
    }

    fn query<E: Entity>(&self, query: &Query) -> StoreResult<Vec<E>> {
        let conn = self.connection()?;
        let (sql, binds) = render_select(&E::KIND, query)?;

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next()? {
            entities.push(E::from_record(&read_record(&E::KIND, row)?)?);
        }

        debug!(
            "event=store_query module=store status=ok table={} rows={}",
            E::KIND.table,
            entities.len()
        );
        Ok(entities)
    }

    fn insert<E: Entity>(&mut self, entity: &E) -> StoreResult<E> {
        let kind = E::KIND;
        let mut columns: Vec<&str> = Vec::with_capacity(kind.columns.len() + 1);
        let mut binds: Vec<Value> = Vec::with_capacity(kind.columns.len() + 1);
        if let Some(key) = entity.key() {
            columns.push(kind.key_column);
            binds.push(to_sql_value(&E::key_value(&key)));
        }
        columns.extend_from_slice(kind.columns);
        binds.extend(entity.values().iter().map(to_sql_value));

        let placeholders = (1..=binds.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders});",
            kind.table,
            columns.join(", ")
        );

        let conn = self.connection()?;
        conn.execute(&sql, params_from_iter(binds))?;
        let rowid = conn.last_insert_rowid();

        self.fetch_one("rowid = ?1", Value::Integer(rowid))?
            .ok_or_else(|| StoreError::RowNotFound {
                table: kind.table,
                key: format!("rowid {rowid}"),
            })
    }

    fn update<E: Entity>(&mut self, entity: &E) -> StoreResult<E> {
        let kind = E::KIND;
        let key = entity.key().ok_or_else(|| StoreError::RowNotFound {
            table: kind.table,
            key: "<unassigned>".to_string(),
        })?;
        let key_value = E::key_value(&key);

        let assignments = kind
            .columns
            .iter()
            .enumerate()
            .map(|(index, column)| format!("{column} = ?{}", index + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {assignments} WHERE {} = ?{};",
            kind.table,
            kind.key_column,
            kind.columns.len() + 1
        );
        let mut binds: Vec<Value> = entity.values().iter().map(to_sql_value).collect();
        binds.push(to_sql_value(&key_value));

        let changed = self.connection()?.execute(&sql, params_from_iter(binds))?;
        if changed == 0 {
            return Err(StoreError::RowNotFound {
                table: kind.table,
                key: key_value.to_string(),
            });
        }

        self.find::<E>(&key)?.ok_or_else(|| StoreError::RowNotFound {
            table: kind.table,
            key: key_value.to_string(),
        })
    }

    fn delete<E: Entity>(&mut self, key: &E::Key) -> StoreResult<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1;",
            E::KIND.table,
            E::KIND.key_column
        );
        let changed = self
            .connection()?
            .execute(&sql, [to_sql_value(&E::key_value(key))])?;
        Ok(changed > 0)
    }

    fn contains<E: Entity>(&self, key: &E::Key) -> StoreResult<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1);",
            E::KIND.table,
            E::KIND.key_column
        );
        let exists: i64 = self.connection()?.query_row(
            &sql,
            [to_sql_value(&E::key_value(key))],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn close(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        match conn.close() {
            Ok(()) => info!("event=store_close module=store status=ok"),
            Err((_, err)) => {
                warn!("event=store_close module=store status=error error={err}");
            }
        }
    }

    fn is_open(&self) -> bool {
        self.conn.is_some()
    }
}

/// Renders a full `SELECT` for `query` against `kind`.
fn render_select(kind: &EntityKind, query: &Query) -> StoreResult<(String, Vec<Value>)> {
    let mut sql = SqliteStorage::select_sql(kind);
    let mut binds = Vec::new();

    if let Some(predicate) = query.predicate() {
        let clause = render_predicate(kind, predicate, &mut binds)?;
        sql.push_str(" WHERE ");
        sql.push_str(&clause);
    }

    let mut terms = Vec::with_capacity(query.ordering().len() + 1);
    for (column, direction) in query.ordering() {
        checked_column(kind, column)?;
        let direction = match direction {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        };
        terms.push(format!("{column} {direction}"));
    }
    terms.push(format!("{} ASC", kind.key_column));
    sql.push_str(" ORDER BY ");
    sql.push_str(&terms.join(", "));
    sql.push(';');

    Ok((sql, binds))
}

fn render_predicate(
    kind: &EntityKind,
    predicate: &Predicate,
    binds: &mut Vec<Value>,
) -> StoreResult<String> {
    let clause = match predicate {
        Predicate::Eq { column, value } => {
            checked_column(kind, column)?;
            binds.push(to_sql_value(value));
            format!("{column} = ?{}", binds.len())
        }
        Predicate::Contains { column, needle } => {
            checked_column(kind, column)?;
            binds.push(Value::Text(contains_pattern(needle)));
            format!(
                "{CASEFOLD_FUNCTION}({column}) LIKE {CASEFOLD_FUNCTION}(?{}) ESCAPE '\\'",
                binds.len()
            )
        }
        Predicate::Between { column, low, high } => {
            checked_column(kind, column)?;
            binds.push(to_sql_value(low));
            let low_index = binds.len();
            binds.push(to_sql_value(high));
            format!("{column} BETWEEN ?{low_index} AND ?{}", binds.len())
        }
        Predicate::Related {
            column,
            target,
            predicate,
        } => {
            checked_column(kind, column)?;
            let inner = render_predicate(target, predicate, binds)?;
            format!(
                "{column} IN (SELECT {} FROM {} WHERE {inner})",
                target.key_column, target.table
            )
        }
        Predicate::All(terms) => {
            if terms.is_empty() {
                return Ok("1 = 1".to_string());
            }
            let rendered = terms
                .iter()
                .map(|term| render_predicate(kind, term, binds).map(|sql| format!("({sql})")))
                .collect::<StoreResult<Vec<_>>>()?;
            rendered.join(" AND ")
        }
    };
    Ok(clause)
}

fn checked_column(kind: &EntityKind, column: &str) -> StoreResult<()> {
    if kind.has_column(column) {
        Ok(())
    } else {
        Err(StoreError::InvalidData(format!(
            "unknown column `{column}` for table `{}`",
            kind.table
        )))
    }
}

/// Wraps `needle` in `%` wildcards, escaping LIKE metacharacters inside it.
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

fn read_record(kind: &EntityKind, row: &Row<'_>) -> StoreResult<Record> {
    let key = from_sql_value(row.get::<_, Value>(0)?, kind.table, kind.key_column)?;
    let mut values = Vec::with_capacity(kind.columns.len());
    for (index, column) in kind.columns.iter().enumerate() {
        values.push(from_sql_value(row.get::<_, Value>(index + 1)?, kind.table, column)?);
    }
    Ok(Record::new(kind, key, values))
}

fn to_sql_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Integer(value) => Value::Integer(*value),
        FieldValue::Text(value) => Value::Text(value.clone()),
    }
}

fn from_sql_value(value: Value, table: &str, column: &str) -> StoreResult<FieldValue> {
    match value {
        Value::Null => Ok(FieldValue::Null),
        Value::Integer(value) => Ok(FieldValue::Integer(value)),
        Value::Text(value) => Ok(FieldValue::Text(value)),
        Value::Real(_) | Value::Blob(_) => Err(StoreError::InvalidData(format!(
            "unsupported cell type in {table}.{column}"
        ))),
    }
}
