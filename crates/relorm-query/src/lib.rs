//! SQL text builder for relorm.
//!
//! `relorm-query` is the **statement layer**. Every function here is a pure
//! function of entity metadata and values; nothing touches a store.
//!
//! # Role In The Architecture
//!
//! - **Literals**: values are embedded inline, text and blobs quoted with
//!   embedded quotes doubled.
//! - **Row statements**: INSERT/UPDATE/DELETE/SELECT by primary key, foreign
//!   key links and join-table rows issued by the session's cascade.
//! - **Relationship queries**: the many-to-many three-way join and stale
//!   relationship cleanup.
//! - **Criteria**: predicate lists rendered as `SELECT * FROM t WHERE ...`.
//!
//! Table DDL lives in `relorm-schema`.

pub mod builder;
pub mod cleanup;
pub mod clause;
pub mod criteria;
pub mod expr;
pub mod join;
pub mod literal;
pub mod select;

pub use builder::{
    DeleteBuilder, InsertBuilder, UpdateBuilder, delete_join_rows, delete_row, exists_by_key,
    insert_join_row, insert_row, link_foreign_key, select_by_column, select_by_key,
    select_column_by_key, update_row,
};
pub use cleanup::stale_relationship_cleanup;
pub use clause::{Limit, Offset, Where};
pub use criteria::Criteria;
pub use expr::{BinaryOp, Column, Expr};
pub use join::many_to_many_join;
pub use literal::{literal_list, quote_text, sql_literal};
pub use select::{Select, create_select};

#[cfg(test)]
pub(crate) mod fixtures;
