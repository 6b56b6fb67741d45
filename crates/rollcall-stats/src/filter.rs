//! Composable WHERE clauses.
//!
//! A [`SqlFilter`] is an ordered list of predicates, each paired with the
//! values it binds. Column names are `&'static str` so only values ever come
//! from callers, and they always travel as bound parameters.

use rusqlite::types::Value;
use rusqlite::{params_from_iter, ParamsFromIter};

/// Ids bound per `IN` list, well below SQLite's variable limit.
pub(crate) const MAX_IDS_PER_QUERY: usize = 500;

/// Ordered predicate/parameter pairs joined with AND.
#[derive(Debug, Clone, Default)]
pub struct SqlFilter {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl SqlFilter {
    /// Create an empty filter (matches everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// `column = ?`
    pub fn eq(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.clauses.push(format!("{column} = ?"));
        self.params.push(value.into());
        self
    }

    /// `column = ?` when `value` is present, nothing otherwise.
    pub fn eq_opt(self, column: &'static str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.eq(column, v.to_string()),
            None => self,
        }
    }

    /// `column IN (?, ?, ...)`. An empty list matches no rows.
    pub fn is_in<I>(mut self, column: &'static str, ids: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        let start = self.params.len();
        self.params.extend(ids.into_iter().map(Value::from));
        let count = self.params.len() - start;

        if count == 0 {
            self.clauses.push("0".to_string());
        } else {
            let placeholders = vec!["?"; count].join(", ");
            self.clauses.push(format!("{column} IN ({placeholders})"));
        }
        self
    }

    /// `column = 0` on a soft-delete flag.
    pub fn not_deleted(mut self, column: &'static str) -> Self {
        self.clauses.push(format!("{column} = 0"));
        self
    }

    /// `column = 1` on a boolean flag.
    pub fn is_set(mut self, column: &'static str) -> Self {
        self.clauses.push(format!("{column} = 1"));
        self
    }

    /// Number of bound parameters.
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// True when no predicate has been added.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// `" WHERE a AND b"`, or an empty string for an empty filter.
    pub fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    /// Bound values in placeholder order.
    pub fn params(&self) -> ParamsFromIter<std::slice::Iter<'_, Value>> {
        params_from_iter(self.params.iter())
    }
}
