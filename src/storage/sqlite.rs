//! SQLite connection manager
//!
//! Owns the single live connection. Every write runs in its own transaction
//! (commit on success, rollback on failure) unless it is issued inside
//! `transaction`, in which case it joins the enclosing one.

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use bigdecimal::BigDecimal;
use rusqlite::types::{Type, ValueRef};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Transaction, TransactionBehavior};
use crate::entity::{Column, ColumnKind, EntitySpec, Entity};
use crate::query::Statement;
use crate::value::{self, Row, Value};
use crate::{Error, Result};
use super::schema;

/// Where the store lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTarget {
    File(PathBuf),
    Memory,
}

impl std::fmt::Display for StoreTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreTarget::File(path) => write!(f, "{}", path.display()),
            StoreTarget::Memory => write!(f, ":memory:"),
        }
    }
}

/// SQLite-backed connection manager
pub struct SqliteStore {
    target: StoreTarget,
    conn: Option<Connection>,
    statements: Cell<u64>,
}

impl SqliteStore {
    /// Create an unconnected manager
    pub fn new(target: StoreTarget) -> Self {
        Self {
            target,
            conn: None,
            statements: Cell::new(0),
        }
    }

    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let mut store = Self::new(StoreTarget::File(path.to_path_buf()));
        store.connect()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let mut store = Self::new(StoreTarget::Memory);
        store.connect()?;
        Ok(store)
    }

    /// Establish the session, enable foreign keys and install the schema.
    ///
    /// Failure here is fatal for the caller's session.
    pub fn connect(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }

        let target = self.target.to_string();
        let fail = |source| Error::Connection {
            target: target.clone(),
            source,
        };

        let conn = match &self.target {
            StoreTarget::File(path) => Connection::open(path),
            StoreTarget::Memory => Connection::open_in_memory(),
        }
        .map_err(fail)?;

        conn.pragma_update(None, "foreign_keys", true).map_err(fail)?;
        for stmt in schema::all_schema_statements() {
            conn.execute(stmt, []).map_err(fail)?;
        }

        tracing::debug!("Connected to {}", self.target);
        self.conn = Some(conn);
        Ok(())
    }

    /// Release the session. Safe to call when never connected.
    pub fn disconnect(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_, e)) = conn.close() {
                tracing::warn!("Error while closing {}: {}", self.target, e);
            }
            tracing::debug!("Disconnected from {}", self.target);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    pub fn target(&self) -> &StoreTarget {
        &self.target
    }

    /// Number of statements sent to the store since creation
    pub fn statements_issued(&self) -> u64 {
        self.statements.get()
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(Error::NotConnected)
    }

    fn track(&self, stmt: &Statement) {
        self.statements.set(self.statements.get() + 1);
        tracing::debug!(sql = %stmt.sql, params = stmt.params.len(), "statement");
    }

    // ========== Write Operations ==========

    /// Run one write statement atomically and return the affected row count
    pub fn execute(&self, stmt: &Statement) -> Result<usize> {
        self.write(stmt).map(|(changed, _)| changed)
    }

    /// Run one INSERT atomically and return the store-assigned row id
    pub fn insert(&self, stmt: &Statement) -> Result<i64> {
        self.write(stmt).map(|(_, id)| id)
    }

    fn write(&self, stmt: &Statement) -> Result<(usize, i64)> {
        let conn = self.conn()?;
        self.track(stmt);

        if !conn.is_autocommit() {
            let changed = conn.execute(&stmt.sql, params_from_iter(stmt.params.iter()))?;
            return Ok((changed, conn.last_insert_rowid()));
        }

        let tx = conn.unchecked_transaction()?;
        match tx.execute(&stmt.sql, params_from_iter(stmt.params.iter())) {
            Ok(changed) => {
                let id = tx.last_insert_rowid();
                tx.commit()?;
                Ok((changed, id))
            }
            Err(e) => {
                tracing::debug!("Rolling back: {}", e);
                if let Err(rollback) = tx.rollback() {
                    tracing::warn!("Rollback after '{}' failed: {}", e, rollback);
                }
                Err(e.into())
            }
        }
    }

    /// Run `f` inside one immediate transaction.
    ///
    /// Statements issued through this store while `f` runs join the
    /// transaction; it commits when `f` returns `Ok` and rolls back otherwise.
    pub fn transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let conn = self.conn()?;
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
        let out = f(self)?;
        tx.commit()?;
        Ok(out)
    }

    // ========== Read Operations ==========

    /// Run a read statement and decode every row
    pub fn fetch_all(&self, stmt: &Statement) -> Result<Vec<Row>> {
        let spec = projection(stmt)?;
        let conn = self.conn()?;
        self.track(stmt);

        let mut prepared = conn.prepare(&stmt.sql)?;
        let rows = prepared
            .query_map(params_from_iter(stmt.params.iter()), |row| decode_row(spec, row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Run a read statement and decode every row on its own.
    ///
    /// A row the projection cannot decode comes back as its error; the
    /// read itself only fails when the statement does.
    pub fn fetch_each(&self, stmt: &Statement) -> Result<Vec<Result<Row>>> {
        let spec = projection(stmt)?;
        let conn = self.conn()?;
        self.track(stmt);

        let mut prepared = conn.prepare(&stmt.sql)?;
        let mut rows = prepared.query(params_from_iter(stmt.params.iter()))?;
        let mut decoded = Vec::new();
        while let Some(row) = rows.next()? {
            decoded.push(decode_row(spec, row).map_err(Error::from));
        }
        Ok(decoded)
    }

    /// Run a read statement and decode the first row, if any
    pub fn fetch_one(&self, stmt: &Statement) -> Result<Option<Row>> {
        let spec = projection(stmt)?;
        let conn = self.conn()?;
        self.track(stmt);

        conn.query_row(&stmt.sql, params_from_iter(stmt.params.iter()), |row| decode_row(spec, row))
            .optional()
            .map_err(Into::into)
    }

    /// Run a read statement returning a single integer (counts)
    pub fn fetch_scalar(&self, stmt: &Statement) -> Result<i64> {
        let conn = self.conn()?;
        self.track(stmt);

        let value: i64 = conn.query_row(&stmt.sql, params_from_iter(stmt.params.iter()), |row| row.get(0))?;
        Ok(value)
    }

    /// Count rows of a table
    pub fn count(&self, entity: Entity) -> Result<usize> {
        let stmt = Statement::new(format!("SELECT COUNT(*) FROM {}", entity.table()), vec![]);
        Ok(self.fetch_scalar(&stmt)? as usize)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        Ok(DbStats {
            accounts: self.count(Entity::Account)?,
            teams: self.count(Entity::Team)?,
            players: self.count(Entity::Player)?,
            tournaments: self.count(Entity::Tournament)?,
            matches: self.count(Entity::Match)?,
        })
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn projection(stmt: &Statement) -> Result<&'static EntitySpec> {
    stmt.projection.ok_or_else(|| {
        Error::Validation(format!("statement has no row projection: {}", stmt.sql))
    })
}

fn conversion_failure(idx: usize, ty: Type, column: &Column, reason: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        ty,
        Box::new(Error::serialization(column.name, reason)),
    )
}

/// Helper to convert a row to typed values using the entity's column kinds
fn decode_row(spec: &EntitySpec, row: &rusqlite::Row) -> rusqlite::Result<Row> {
    let mut out = Row::new();
    for (idx, column) in spec.columns.iter().enumerate() {
        let value = decode_cell(idx, column, row.get_ref(idx)?)?;
        out.insert(column.name, value);
    }
    Ok(out)
}

fn decode_cell(idx: usize, column: &Column, raw: ValueRef<'_>) -> rusqlite::Result<Value> {
    let value = match (column.kind, raw) {
        (_, ValueRef::Null) => Value::Null,

        (ColumnKind::Integer, ValueRef::Integer(i)) => Value::Integer(i),
        (ColumnKind::Bool, ValueRef::Integer(i)) => Value::Bool(i != 0),

        (ColumnKind::Date, ValueRef::Text(bytes)) => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| conversion_failure(idx, Type::Text, column, e.to_string()))?;
            value::parse_date(text)
                .map(Value::Date)
                .ok_or_else(|| conversion_failure(idx, Type::Text, column, format!("bad date '{}'", text)))?
        }
        (ColumnKind::DateTime, ValueRef::Text(bytes)) => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| conversion_failure(idx, Type::Text, column, e.to_string()))?;
            value::parse_datetime(text)
                .map(Value::DateTime)
                .ok_or_else(|| conversion_failure(idx, Type::Text, column, format!("bad date-time '{}'", text)))?
        }

        (ColumnKind::Decimal, ValueRef::Text(bytes)) => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| conversion_failure(idx, Type::Text, column, e.to_string()))?;
            BigDecimal::from_str(text.trim())
                .map(Value::Decimal)
                .map_err(|e| conversion_failure(idx, Type::Text, column, e.to_string()))?
        }
        (ColumnKind::Decimal, ValueRef::Integer(i)) => Value::Decimal(BigDecimal::from(i)),
        (ColumnKind::Decimal, ValueRef::Real(r)) => BigDecimal::from_str(&r.to_string())
            .map(Value::Decimal)
            .map_err(|e| conversion_failure(idx, Type::Real, column, e.to_string()))?,

        // Text that is not valid UTF-8 surfaces as raw bytes; the serializer
        // refuses to export it rather than guessing.
        (ColumnKind::Text | ColumnKind::Choice(_), ValueRef::Text(bytes)) => {
            match std::str::from_utf8(bytes) {
                Ok(text) => Value::Text(text.to_string()),
                Err(_) => Value::Blob(bytes.to_vec()),
            }
        }
        (ColumnKind::Text | ColumnKind::Choice(_), ValueRef::Integer(i)) => Value::Text(i.to_string()),
        (ColumnKind::Text | ColumnKind::Choice(_), ValueRef::Real(r)) => Value::Text(r.to_string()),

        (_, ValueRef::Blob(bytes)) => Value::Blob(bytes.to_vec()),

        (kind, other) => {
            return Err(conversion_failure(
                idx,
                other.data_type(),
                column,
                format!("unexpected {} for {:?} column", other.data_type(), kind),
            ));
        }
    };
    Ok(value)
}

/// Database statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DbStats {
    pub accounts: usize,
    pub teams: usize,
    pub players: usize,
    pub tournaments: usize,
    pub matches: usize,
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Accounts: {}", self.accounts)?;
        writeln!(f, "  Teams: {}", self.teams)?;
        writeln!(f, "  Players: {}", self.players)?;
        writeln!(f, "  Tournaments: {}", self.tournaments)?;
        writeln!(f, "  Matches: {}", self.matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryBuilder;
    use crate::value::FieldMap;

    fn team_insert(name: &str) -> Statement {
        QueryBuilder::for_entity(Entity::Team)
            .insert(&FieldMap::new().with("team_name", name))
            .unwrap()
    }

    #[test]
    fn test_insert_and_fetch() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store.insert(&team_insert("Natus Vincere")).unwrap();

        let row = store
            .fetch_one(&QueryBuilder::for_entity(Entity::Team).select_by_id(id))
            .unwrap()
            .unwrap();
        assert_eq!(row.get_i64("team_id"), Some(id));
        assert_eq!(row.get_str("team_name"), Some("Natus Vincere"));
        assert_eq!(row.get("is_active"), Some(&Value::Bool(true)));
        assert_eq!(row.get("founded_date"), Some(&Value::Null));
    }

    #[test]
    fn test_failed_write_rolls_back_and_store_stays_usable() {
        let store = SqliteStore::open_in_memory().unwrap();
        let bad = Statement::new("INSERT INTO teams (team_name) VALUES (?)", vec![Value::Null]);

        let err = store.execute(&bad).unwrap_err();
        assert!(matches!(err, Error::Query(_)));
        assert!(err.to_string().contains("NOT NULL"), "{}", err);
        assert!(!err.is_fatal());

        store.insert(&team_insert("G2")).unwrap();
        assert_eq!(store.count(Entity::Team).unwrap(), 1);
    }

    #[test]
    fn test_fetch_each_keeps_decodable_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert(&team_insert("Astralis")).unwrap();
        store
            .execute(&Statement::new(
                "INSERT INTO teams (team_name, founded_date) VALUES (?, ?)",
                vec![Value::Text("Broken".into()), Value::Text("someday".into())],
            ))
            .unwrap();
        let select = QueryBuilder::for_entity(Entity::Team).select(None, Some("team_id"));

        assert!(store.fetch_all(&select).is_err());

        let rows = store.fetch_each(&select).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].as_ref().unwrap().get_str("team_name"), Some("Astralis"));
        assert!(matches!(rows[1], Err(Error::Query(_))));
    }

    #[test]
    fn test_transaction_rolls_back_all_statements_on_error() {
        let store = SqliteStore::open_in_memory().unwrap();

        let result: Result<()> = store.transaction(|s| {
            s.insert(&team_insert("MOUZ"))?;
            Err(Error::Validation("abort".into()))
        });
        assert!(result.is_err());
        assert_eq!(store.count(Entity::Team).unwrap(), 0);

        store
            .transaction(|s| {
                s.insert(&team_insert("Heroic"))?;
                s.insert(&team_insert("Liquid"))
            })
            .unwrap();
        assert_eq!(store.count(Entity::Team).unwrap(), 2);
    }

    #[test]
    fn test_disconnect_is_safe_when_never_connected() {
        let mut store = SqliteStore::new(StoreTarget::Memory);
        store.disconnect();
        assert!(!store.is_connected());
        assert!(matches!(store.count(Entity::Team), Err(Error::NotConnected)));

        store.connect().unwrap();
        assert!(store.is_connected());
        store.disconnect();
        store.disconnect();
    }

    #[test]
    fn test_connection_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("nested").join("db.sqlite");

        let err = SqliteStore::open(&path).err().unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("esport.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert(&team_insert("Cloud9")).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.stats().unwrap().teams, 1);
    }

    #[test]
    fn test_non_utf8_text_decodes_as_blob() {
        let store = SqliteStore::open_in_memory().unwrap();
        let stmt = Statement::new(
            "INSERT INTO teams (team_name, coach) VALUES (?, CAST(? AS TEXT))",
            vec![Value::Text("BIG".into()), Value::Blob(vec![0xff, 0xfe, 0x41])],
        );
        let id = store.insert(&stmt).unwrap();

        let row = store
            .fetch_one(&QueryBuilder::for_entity(Entity::Team).select_by_id(id))
            .unwrap()
            .unwrap();
        assert_eq!(row.get("coach"), Some(&Value::Blob(vec![0xff, 0xfe, 0x41])));
    }

    #[test]
    fn test_statement_counter() {
        let store = SqliteStore::open_in_memory().unwrap();
        let before = store.statements_issued();
        store.insert(&team_insert("FURIA")).unwrap();
        store.count(Entity::Team).unwrap();
        assert_eq!(store.statements_issued(), before + 2);
    }
}
