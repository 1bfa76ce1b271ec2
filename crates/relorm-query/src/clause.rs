//! SQL clause types (WHERE, LIMIT, OFFSET).

use crate::expr::Expr;

/// WHERE clause: predicates joined with AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Where {
    predicates: Vec<Expr>,
}

impl Where {
    pub fn new(expr: Expr) -> Self {
        Self {
            predicates: vec![expr],
        }
    }

    /// Add an AND condition.
    pub fn and(mut self, expr: Expr) -> Self {
        self.predicates.push(expr);
        self
    }

    pub fn push(&mut self, expr: Expr) {
        self.predicates.push(expr);
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn predicates(&self) -> &[Expr] {
        &self.predicates
    }

    /// The condition text without the `WHERE` keyword.
    pub fn to_sql(&self) -> String {
        self.predicates
            .iter()
            .map(Expr::to_sql)
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// ` WHERE <condition>`, or nothing when there are no predicates.
    pub fn to_clause(&self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.to_sql())
        }
    }
}

impl From<Vec<Expr>> for Where {
    fn from(predicates: Vec<Expr>) -> Self {
        Self { predicates }
    }
}

/// LIMIT clause. Values of zero or less mean no limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit(pub i64);

/// OFFSET clause. Values of zero or less mean no offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offset(pub i64);

impl Limit {
    pub fn to_clause(self) -> String {
        if self.0 > 0 {
            format!(" LIMIT {}", self.0)
        } else {
            String::new()
        }
    }
}

impl Offset {
    pub fn to_clause(self) -> String {
        if self.0 > 0 {
            format!(" OFFSET {}", self.0)
        } else {
            String::new()
        }
    }
}
