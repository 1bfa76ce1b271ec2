//! SELECT query builder.

use crate::clause::{Limit, Offset, Where};
use crate::expr::Expr;

/// A SELECT over one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    table: String,
    /// Columns to select (empty = all)
    columns: Vec<String>,
    where_clause: Where,
    limit: Limit,
    offset: Offset,
}

impl Select {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            where_clause: Where::default(),
            limit: Limit(0),
            offset: Offset(0),
        }
    }

    /// Select specific columns.
    pub fn columns(mut self, cols: &[&str]) -> Self {
        self.columns = cols.iter().map(|&c| c.to_string()).collect();
        self
    }

    /// Add a WHERE condition, ANDed with any existing ones.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause.push(expr);
        self
    }

    pub fn limit(mut self, n: i64) -> Self {
        self.limit = Limit(n);
        self
    }

    pub fn offset(mut self, n: i64) -> Self {
        self.offset = Offset(n);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn build(&self) -> String {
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };
        format!(
            "SELECT {} FROM {}{}{}{}",
            columns,
            self.table,
            self.where_clause.to_clause(),
            self.limit.to_clause(),
            self.offset.to_clause()
        )
    }
}

/// `SELECT * FROM <table> [WHERE p1 AND p2 ...] [LIMIT n] [OFFSET m]`.
pub fn create_select(table: &str, predicates: &[Expr], limit: i64, offset: i64) -> String {
    predicates
        .iter()
        .cloned()
        .fold(Select::new(table), Select::filter)
        .limit(limit)
        .offset(offset)
        .build()
}
