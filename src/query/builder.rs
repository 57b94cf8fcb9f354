//! Whitelist-driven statement composition
//!
//! Caller-supplied field maps are intersected with the entity's insert or
//! update whitelist. Unknown keys are dropped silently (optional-update
//! callers rely on this), and only column names from the static entity table
//! are ever written into statement text. Values are always bound, after
//! being normalized to the kind of their column.

use crate::entity::{Column, Entity, EntitySpec};
use crate::query::filter::Predicate;
use crate::query::Statement;
use crate::serializer;
use crate::value::{FieldMap, Value};
use crate::{Error, Result};

/// Statement builder for one entity
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder {
    spec: &'static EntitySpec,
}

impl QueryBuilder {
    pub fn new(spec: &'static EntitySpec) -> Self {
        Self { spec }
    }

    pub fn for_entity(entity: Entity) -> Self {
        Self::new(entity.spec())
    }

    pub fn spec(&self) -> &'static EntitySpec {
        self.spec
    }

    /// Intersect `fields` with the columns accepted by `lookup`, keeping the
    /// order of `fields`; a value that does not fit its column fails the
    /// whole projection
    fn project(
        &self,
        fields: &FieldMap,
        lookup: fn(&EntitySpec, &str) -> Option<&'static Column>,
    ) -> Result<Vec<(&'static Column, Value)>> {
        let mut kept = Vec::with_capacity(fields.len());
        for (key, value) in fields.iter() {
            match lookup(self.spec, key) {
                Some(column) => kept.push((column, serializer::normalize(column, value)?)),
                None => tracing::debug!("{}: dropping non-whitelisted field '{}'", self.spec.table, key),
            }
        }
        Ok(kept)
    }

    /// `INSERT INTO t (c1, c2) VALUES (?, ?)` over the insertable subset of
    /// `fields`, in the order they were supplied
    pub fn insert(&self, fields: &FieldMap) -> Result<Statement> {
        let kept = self.project(fields, EntitySpec::insertable)?;
        if kept.is_empty() {
            return Err(Error::NoUpdatableFields(self.spec.entity));
        }

        let columns = kept.iter().map(|(c, _)| c.name).collect::<Vec<_>>().join(", ");
        let placeholders = vec!["?"; kept.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.spec.table, columns, placeholders
        );
        let params = kept.into_iter().map(|(_, v)| v).collect();

        Ok(Statement::new(sql, params))
    }

    /// `UPDATE t SET c1 = ?, c2 = ? WHERE pk = ?` over the updatable subset
    /// of `fields`; the key is bound last
    pub fn update(&self, id: i64, fields: &FieldMap) -> Result<Statement> {
        let kept = self.project(fields, EntitySpec::updatable)?;
        if kept.is_empty() {
            return Err(Error::NoUpdatableFields(self.spec.entity));
        }

        let assignments = kept
            .iter()
            .map(|(c, _)| format!("{} = ?", c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            self.spec.table, assignments, self.spec.primary_key
        );
        let mut params: Vec<Value> = kept.into_iter().map(|(_, v)| v).collect();
        params.push(Value::Integer(id));

        Ok(Statement::new(sql, params))
    }

    /// Full-projection SELECT with an optional predicate.
    ///
    /// `order` defaults to the entity's listing order.
    pub fn select(&self, predicate: Option<Predicate>, order: Option<&'static str>) -> Statement {
        let mut sql = format!("SELECT {} FROM {}", self.spec.select_list(), self.spec.table);
        let mut params = Vec::new();
        if let Some(pred) = predicate {
            sql.push_str(" WHERE ");
            sql.push_str(&pred.clause);
            params = pred.params;
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(order.unwrap_or(self.spec.default_order));

        Statement::select(sql, params, self.spec)
    }

    pub fn select_by_id(&self, id: i64) -> Statement {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?",
            self.spec.select_list(),
            self.spec.table,
            self.spec.primary_key
        );
        Statement::select(sql, vec![Value::Integer(id)], self.spec)
    }

    /// `SELECT COUNT(*)` with an optional predicate
    pub fn count(&self, predicate: Option<Predicate>) -> Statement {
        match predicate {
            Some(pred) => Statement::new(
                format!("SELECT COUNT(*) FROM {} WHERE {}", self.spec.table, pred.clause),
                pred.params,
            ),
            None => Statement::new(format!("SELECT COUNT(*) FROM {}", self.spec.table), vec![]),
        }
    }

    /// Hard removal by key
    pub fn delete(&self, id: i64) -> Statement {
        Statement::new(
            format!("DELETE FROM {} WHERE {} = ?", self.spec.table, self.spec.primary_key),
            vec![Value::Integer(id)],
        )
    }

    /// Soft removal: clear the active flag.
    ///
    /// Fails with `Validation` for entities without an active flag.
    pub fn deactivate(&self, id: i64) -> Result<Statement> {
        let flag = self.spec.active_flag.ok_or_else(|| {
            Error::Validation(format!("{} does not support soft deletion", self.spec.entity))
        })?;
        Ok(Statement::new(
            format!(
                "UPDATE {} SET {} = ? WHERE {} = ?",
                self.spec.table, flag, self.spec.primary_key
            ),
            vec![Value::Bool(false), Value::Integer(id)],
        ))
    }
}
