//! Statement builders for INSERT, UPDATE and DELETE, plus the row-level
//! statements the session issues for an entity.

use relorm_core::{EntityDescriptor, JoinSide, ManyToMany, Result, Value};

use crate::clause::Where;
use crate::expr::Expr;
use crate::literal::sql_literal;
use crate::select::Select;

/// INSERT statement builder.
#[derive(Debug, Clone, Default)]
pub struct InsertBuilder {
    table: String,
    columns: Vec<(String, Value)>,
}

impl InsertBuilder {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
        }
    }

    pub fn value(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.columns.push((column.into(), value.into()));
        self
    }

    /// `INSERT INTO t (c..) VALUES (v..)`, or `DEFAULT VALUES` with no columns.
    pub fn build(&self) -> String {
        if self.columns.is_empty() {
            return format!("INSERT INTO {} DEFAULT VALUES", self.table);
        }
        let (columns, values): (Vec<_>, Vec<_>) = self
            .columns
            .iter()
            .map(|(c, v)| (c.as_str(), sql_literal(v)))
            .unzip();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            columns.join(", "),
            values.join(", ")
        )
    }
}

/// UPDATE statement builder.
#[derive(Debug, Clone, Default)]
pub struct UpdateBuilder {
    table: String,
    set: Vec<(String, Value)>,
    where_clause: Where,
}

impl UpdateBuilder {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            set: Vec::new(),
            where_clause: Where::default(),
        }
    }

    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.push((column.into(), value.into()));
        self
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause.push(expr);
        self
    }

    pub fn has_assignments(&self) -> bool {
        !self.set.is_empty()
    }

    pub fn build(&self) -> String {
        let assignments: Vec<_> = self
            .set
            .iter()
            .map(|(c, v)| format!("{} = {}", c, sql_literal(v)))
            .collect();
        format!(
            "UPDATE {} SET {}{}",
            self.table,
            assignments.join(", "),
            self.where_clause.to_clause()
        )
    }
}

/// DELETE statement builder.
#[derive(Debug, Clone, Default)]
pub struct DeleteBuilder {
    table: String,
    where_clause: Where,
}

impl DeleteBuilder {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            where_clause: Where::default(),
        }
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause.push(expr);
        self
    }

    pub fn build(&self) -> String {
        format!("DELETE FROM {}{}", self.table, self.where_clause.to_clause())
    }
}

/// INSERT of an entity's mapped columns.
pub fn insert_row(entity: &EntityDescriptor, columns: &[(&str, Value)]) -> String {
    columns
        .iter()
        .fold(InsertBuilder::new(entity.table()), |b, (c, v)| {
            b.value(*c, v.clone())
        })
        .build()
}

/// UPDATE of an entity's mapped columns, by primary key. `None` when there
/// is nothing to assign.
pub fn update_row(
    entity: &EntityDescriptor,
    columns: &[(&str, Value)],
    key: &Value,
) -> Result<Option<String>> {
    let builder = columns
        .iter()
        .fold(UpdateBuilder::new(entity.table()), |b, (c, v)| {
            b.set(*c, v.clone())
        })
        .filter(Expr::col(entity.key_column()?).eq(key.clone()));
    Ok(builder.has_assignments().then(|| builder.build()))
}

/// `DELETE FROM t WHERE pk = key`.
pub fn delete_row(entity: &EntityDescriptor, key: &Value) -> Result<String> {
    Ok(DeleteBuilder::new(entity.table())
        .filter(Expr::col(entity.key_column()?).eq(key.clone()))
        .build())
}

/// `SELECT * FROM t WHERE pk = key LIMIT 1`.
pub fn select_by_key(entity: &EntityDescriptor, key: &Value) -> Result<String> {
    Ok(Select::new(entity.table())
        .filter(Expr::col(entity.key_column()?).eq(key.clone()))
        .limit(1)
        .build())
}

/// `SELECT column FROM t WHERE pk = key LIMIT 1`.
pub fn select_column_by_key(
    entity: &EntityDescriptor,
    column: &str,
    key: &Value,
) -> Result<String> {
    Ok(Select::new(entity.table())
        .columns(&[column])
        .filter(Expr::col(entity.key_column()?).eq(key.clone()))
        .limit(1)
        .build())
}

/// Row existence probe: `SELECT pk FROM t WHERE pk = key LIMIT 1`.
pub fn exists_by_key(entity: &EntityDescriptor, key: &Value) -> Result<String> {
    select_column_by_key(entity, entity.key_column()?, key)
}

/// Rows of `entity` whose `column` equals `value`, optionally capped.
pub fn select_by_column(entity: &EntityDescriptor, column: &str, value: &Value, limit: i64) -> String {
    Select::new(entity.table())
        .filter(Expr::col(column).eq(value.clone()))
        .limit(limit)
        .build()
}

/// Point a foreign-key column of the row `key` at `target`.
pub fn link_foreign_key(
    entity: &EntityDescriptor,
    column: &str,
    target: &Value,
    key: &Value,
) -> Result<String> {
    Ok(UpdateBuilder::new(entity.table())
        .set(column, target.clone())
        .filter(Expr::col(entity.key_column()?).eq(key.clone()))
        .build())
}

/// Join-table row linking `first_key` and `second_key`.
pub fn insert_join_row(relation: &ManyToMany, first_key: &Value, second_key: &Value) -> String {
    InsertBuilder::new(relation.join_table)
        .value(relation.join_column(JoinSide::First), first_key.clone())
        .value(relation.join_column(JoinSide::Second), second_key.clone())
        .build()
}

/// All join-table rows referencing `key` on `side`.
pub fn delete_join_rows(relation: &ManyToMany, side: JoinSide, key: &Value) -> String {
    DeleteBuilder::new(relation.join_table)
        .filter(Expr::col(relation.join_column(side)).eq(key.clone()))
        .build()
}
