//! Search filter builder
//!
//! Two shapes are supported:
//! - unstructured multi-field search: `(c1 LIKE ?) OR (c2 LIKE ?) ...` with
//!   the same `%term%` bound to every placeholder
//! - structured optional filters: each present filter contributes one
//!   clause, clauses are ANDed, absent filters contribute nothing
//!
//! A `FilterSet` with no present filters builds to `None`, which the query
//! builder turns into an unconditioned SELECT.

use crate::entity::EntitySpec;
use crate::value::Value;
use crate::{Error, Result};

/// A WHERE fragment with its bound parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub clause: String,
    pub params: Vec<Value>,
}

/// Wrap a search term in LIKE wildcards
pub fn like_pattern(term: &str) -> String {
    format!("%{}%", term)
}

/// Build the unstructured multi-field shape for `columns`
pub fn any_like(columns: &[&'static str], term: &str) -> Predicate {
    let pattern = like_pattern(term);
    Predicate {
        clause: columns
            .iter()
            .map(|c| format!("({} LIKE ?)", c))
            .collect::<Vec<_>>()
            .join(" OR "),
        params: columns.iter().map(|_| Value::Text(pattern.clone())).collect(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Clause {
    Eq(&'static str, Value),
    Like(&'static str, String),
    AnyEq(Vec<&'static str>, Value),
    AnyLike(Vec<&'static str>, String),
}

impl Clause {
    fn columns(&self) -> Vec<&'static str> {
        match self {
            Clause::Eq(c, _) | Clause::Like(c, _) => vec![*c],
            Clause::AnyEq(cs, _) | Clause::AnyLike(cs, _) => cs.clone(),
        }
    }

    fn render(&self) -> Predicate {
        match self {
            Clause::Eq(col, Value::Null) => Predicate {
                clause: format!("{} IS NULL", col),
                params: vec![],
            },
            Clause::Eq(col, value) => Predicate {
                clause: format!("{} = ?", col),
                params: vec![value.clone()],
            },
            Clause::Like(col, term) => Predicate {
                clause: format!("{} LIKE ?", col),
                params: vec![Value::Text(like_pattern(term))],
            },
            Clause::AnyEq(cols, value) => Predicate {
                clause: cols
                    .iter()
                    .map(|c| format!("({} = ?)", c))
                    .collect::<Vec<_>>()
                    .join(" OR "),
                params: cols.iter().map(|_| value.clone()).collect(),
            },
            Clause::AnyLike(cols, term) => any_like(cols, term),
        }
    }

    fn is_disjunction(&self) -> bool {
        matches!(self, Clause::AnyEq(cols, _) | Clause::AnyLike(cols, _) if cols.len() > 1)
    }
}

/// Composable set of optional filters.
///
/// Columns are given as static names and checked against the entity table
/// when the set is built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    clauses: Vec<Clause>,
    include_inactive: bool,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// `column = value` when a value is present; `IS NULL` for an explicit null
    pub fn eq<V: Into<Value>>(mut self, column: &'static str, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.clauses.push(Clause::Eq(column, v.into()));
        }
        self
    }

    /// `column LIKE %term%` when a non-blank term is present
    pub fn like(mut self, column: &'static str, term: Option<&str>) -> Self {
        if let Some(t) = non_blank(term) {
            self.clauses.push(Clause::Like(column, t.to_string()));
        }
        self
    }

    /// `(c1 = ?) OR (c2 = ?) ...` with the same value bound to each
    pub fn any_eq<V: Into<Value>>(mut self, columns: &[&'static str], value: Option<V>) -> Self {
        if let Some(v) = value {
            if !columns.is_empty() {
                self.clauses.push(Clause::AnyEq(columns.to_vec(), v.into()));
            }
        }
        self
    }

    /// `(c1 LIKE ?) OR (c2 LIKE ?) ...` with the same `%term%` bound to each
    pub fn any_like(mut self, columns: &[&'static str], term: Option<&str>) -> Self {
        if let Some(t) = non_blank(term) {
            if !columns.is_empty() {
                self.clauses.push(Clause::AnyLike(columns.to_vec(), t.to_string()));
            }
        }
        self
    }

    /// Include soft-deleted rows in listings
    pub fn include_inactive(mut self, include: bool) -> Self {
        self.include_inactive = include;
        self
    }

    pub fn includes_inactive(&self) -> bool {
        self.include_inactive
    }

    /// Number of present filters
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Render the present filters for `spec`.
    ///
    /// Returns `Ok(None)` when no filter is present.
    pub fn build(&self, spec: &EntitySpec) -> Result<Option<Predicate>> {
        for clause in &self.clauses {
            for col in clause.columns() {
                if spec.column(col).is_none() {
                    return Err(Error::Validation(format!(
                        "unknown filter column '{}' for {}",
                        col, spec.table
                    )));
                }
            }
        }

        if self.clauses.is_empty() {
            return Ok(None);
        }

        let wrap = self.clauses.len() > 1;
        let mut parts = Vec::with_capacity(self.clauses.len());
        let mut params = Vec::new();
        for clause in &self.clauses {
            let rendered = clause.render();
            if wrap && clause.is_disjunction() {
                parts.push(format!("({})", rendered.clause));
            } else {
                parts.push(rendered.clause);
            }
            params.extend(rendered.params);
        }

        Ok(Some(Predicate {
            clause: parts.join(" AND "),
            params,
        }))
    }
}

fn non_blank(term: Option<&str>) -> Option<&str> {
    term.map(str::trim).filter(|t| !t.is_empty())
}
