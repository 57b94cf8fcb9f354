//! # esportdb - E-sport organisation records
//!
//! Data-access core for accounts, teams, players, tournaments and matches.
//!
//! esportdb provides:
//! - A static entity table (columns, insert/update whitelists, keys)
//! - Whitelist-driven INSERT/UPDATE composition with bound parameters
//! - Composable search filters (multi-field LIKE, optional structured filters)
//! - A referential integrity guard (soft deletes, match invariants)
//! - A generic repository over a single SQLite connection
//! - JSON/CSV export and import with per-row failure handling

pub mod entity;
pub mod value;
pub mod storage;
pub mod query;
pub mod guard;
pub mod repository;
pub mod serializer;
pub mod transfer;
pub mod cache;
pub mod output;
pub mod config;
pub mod ui;


// Re-exports for convenient access
pub use entity::{Entity, EntitySpec};
pub use value::{FieldMap, Row, Value};
pub use storage::SqliteStore;
pub use query::{FilterSet, QueryBuilder, Statement};
pub use guard::{IntegrityGuard, Deletion, MatchOutcome};
pub use repository::Repository;

/// Result type alias for esportdb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for esportdb operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Connection to {target} failed: {source}")]
    Connection {
        target: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Not connected to the store")]
    NotConnected,

    #[error("Query failed: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("Invalid match: {0}")]
    InvalidMatch(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("No updatable fields for {0}")]
    NoUpdatableFields(Entity),

    #[error("Cannot serialize '{column}': {reason}")]
    Serialization { column: String, reason: String },

    #[error("Import row {row} failed: {source}")]
    ImportRow {
        row: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("{entity} #{id} not found")]
    NotFound { entity: Entity, id: i64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Serialization failure helper
    pub fn serialization(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Serialization {
            column: column.into(),
            reason: reason.into(),
        }
    }

    /// Whether the caller must abort the session.
    ///
    /// Only connection failures are fatal; everything else is reported
    /// and the caller carries on.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Connection { .. })
    }

    /// True for failures detected before any statement reached the store
    pub fn is_rejected_early(&self) -> bool {
        matches!(
            self,
            Error::InvalidMatch(_) | Error::Validation(_) | Error::NoUpdatableFields(_)
        )
    }
}
