//! Query composition
//!
//! - `builder`: whitelist-driven INSERT/UPDATE/SELECT/DELETE text
//! - `filter`: OR/AND predicate fragments for search

pub mod builder;
pub mod filter;

pub use builder::QueryBuilder;
pub use filter::{FilterSet, Predicate};

use crate::entity::EntitySpec;
use crate::value::Value;

/// A parameterized statement ready for the connection manager.
///
/// `sql` only ever contains column and table names from the static entity
/// tables; every caller-supplied value sits in `params`, bound positionally
/// to the `?` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
    /// Entity whose full column list is selected, used to decode result rows
    pub projection: Option<&'static EntitySpec>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
            projection: None,
        }
    }

    /// A read statement whose rows decode as `spec` rows
    pub fn select(sql: impl Into<String>, params: Vec<Value>, spec: &'static EntitySpec) -> Self {
        Self {
            sql: sql.into(),
            params,
            projection: Some(spec),
        }
    }

    /// Number of `?` placeholders in the text
    pub fn placeholder_count(&self) -> usize {
        self.sql.matches('?').count()
    }
}
