//! Predicate expressions for WHERE clauses.

use relorm_core::Value;

use crate::literal::{literal_list, sql_literal};

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Like,
}

impl BinaryOp {
    pub const fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Like => "LIKE",
        }
    }
}

/// One predicate of a WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `column <op> literal`
    Compare {
        column: String,
        op: BinaryOp,
        value: Value,
    },
    /// `column IS [NOT] NULL`
    IsNull { column: String, negated: bool },
    /// `column [NOT] IN (literals)`
    In {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    /// SQL text used as-is.
    Raw(String),
}

impl Expr {
    /// Start a predicate on `name`.
    pub fn col(name: impl Into<String>) -> Column {
        Column(name.into())
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Expr::Raw(sql.into())
    }

    /// Render the predicate.
    pub fn to_sql(&self) -> String {
        match self {
            // `= NULL` never matches, so NULL comparisons become null tests.
            Expr::Compare {
                column,
                op: BinaryOp::Eq,
                value: Value::Null,
            } => format!("{column} IS NULL"),
            Expr::Compare {
                column,
                op: BinaryOp::Ne,
                value: Value::Null,
            } => format!("{column} IS NOT NULL"),
            Expr::Compare { column, op, value } => {
                format!("{} {} {}", column, op.as_str(), sql_literal(value))
            }
            Expr::IsNull { column, negated } => {
                if *negated {
                    format!("{column} IS NOT NULL")
                } else {
                    format!("{column} IS NULL")
                }
            }
            // An empty list is not valid SQL; substitute the constant outcome.
            Expr::In { values, negated, .. } if values.is_empty() => {
                String::from(if *negated { "1 = 1" } else { "1 = 0" })
            }
            Expr::In {
                column,
                values,
                negated,
            } => {
                let not = if *negated { "NOT " } else { "" };
                format!("{column} {not}IN ({})", literal_list(values))
            }
            Expr::Raw(sql) => sql.clone(),
        }
    }
}

/// A column awaiting its comparison.
#[derive(Debug, Clone)]
pub struct Column(String);

impl Column {
    fn compare(self, op: BinaryOp, value: impl Into<Value>) -> Expr {
        Expr::Compare {
            column: self.0,
            op,
            value: value.into(),
        }
    }

    pub fn eq(self, value: impl Into<Value>) -> Expr {
        self.compare(BinaryOp::Eq, value)
    }

    pub fn ne(self, value: impl Into<Value>) -> Expr {
        self.compare(BinaryOp::Ne, value)
    }

    pub fn gt(self, value: impl Into<Value>) -> Expr {
        self.compare(BinaryOp::Gt, value)
    }

    pub fn ge(self, value: impl Into<Value>) -> Expr {
        self.compare(BinaryOp::Ge, value)
    }

    pub fn lt(self, value: impl Into<Value>) -> Expr {
        self.compare(BinaryOp::Lt, value)
    }

    pub fn le(self, value: impl Into<Value>) -> Expr {
        self.compare(BinaryOp::Le, value)
    }

    pub fn like(self, pattern: impl Into<String>) -> Expr {
        self.compare(BinaryOp::Like, Value::Text(pattern.into()))
    }

    pub fn is_null(self) -> Expr {
        Expr::IsNull {
            column: self.0,
            negated: false,
        }
    }

    pub fn is_not_null(self) -> Expr {
        Expr::IsNull {
            column: self.0,
            negated: true,
        }
    }

    pub fn in_list(self, values: Vec<Value>) -> Expr {
        Expr::In {
            column: self.0,
            values,
            negated: false,
        }
    }

    pub fn not_in(self, values: Vec<Value>) -> Expr {
        Expr::In {
            column: self.0,
            values,
            negated: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparisons_embed_literals() {
        assert_eq!(Expr::col("age").gt(18).to_sql(), "age > 18");
        assert_eq!(Expr::col("name").eq("Ann").to_sql(), "name = 'Ann'");
        assert_eq!(Expr::col("name").ne("Ann").to_sql(), "name <> 'Ann'");
        assert_eq!(Expr::col("title").like("%Rust%").to_sql(), "title LIKE '%Rust%'");
    }

    #[test]
    fn null_comparisons_become_null_tests() {
        assert_eq!(Expr::col("a").eq(Value::Null).to_sql(), "a IS NULL");
        assert_eq!(Expr::col("a").ne(Value::Null).to_sql(), "a IS NOT NULL");
        assert_eq!(Expr::col("a").is_null().to_sql(), "a IS NULL");
    }

    #[test]
    fn in_lists() {
        let expr = Expr::col("id").not_in(vec![Value::BigInt(1), Value::BigInt(2)]);
        assert_eq!(expr.to_sql(), "id NOT IN (1, 2)");
        assert_eq!(Expr::col("id").not_in(Vec::new()).to_sql(), "1 = 1");
        assert_eq!(Expr::col("id").in_list(Vec::new()).to_sql(), "1 = 0");
    }
}
