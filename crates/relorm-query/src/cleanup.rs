//! Stale relationship cleanup.
//!
//! After a collection is written, links to objects that are no longer in it
//! are removed: join rows are deleted for many-to-many, foreign keys are
//! cleared for one-to-many. When nothing survives, every link of the owner
//! is removed.

use relorm_core::{
    ConfigErrorKind, EntityDescriptor, Error, RelationshipDescriptor, Result, Value,
};

use crate::builder::{DeleteBuilder, UpdateBuilder};
use crate::expr::Expr;

/// Statement removing links from the owner row `owner_key` to anything not
/// in `surviving`.
///
/// - many-to-many: `DELETE FROM j WHERE <owner col> = k AND <other col> NOT IN (...)`
/// - one-to-many: `UPDATE many SET fk = NULL WHERE fk = k AND <many pk> NOT IN (...)`
///
/// The `NOT IN` predicate is left out when `surviving` is empty.
pub fn stale_relationship_cleanup(
    relationship: &RelationshipDescriptor,
    owner: &EntityDescriptor,
    owner_key: &Value,
    surviving: &[Value],
) -> Result<String> {
    match relationship {
        RelationshipDescriptor::ManyToMany(relation) => {
            let side = relation.side_of(owner)?;
            let mut delete = DeleteBuilder::new(relation.join_table)
                .filter(Expr::col(relation.join_column(side)).eq(owner_key.clone()));
            if !surviving.is_empty() {
                delete = delete
                    .filter(Expr::col(relation.join_column(side.other())).not_in(surviving.to_vec()));
            }
            Ok(delete.build())
        }
        RelationshipDescriptor::OneToMany {
            many, foreign_key, ..
        } => {
            let many = many();
            let mut update = UpdateBuilder::new(many.table())
                .set(*foreign_key, Value::Null)
                .filter(Expr::col(*foreign_key).eq(owner_key.clone()));
            if !surviving.is_empty() {
                update = update.filter(Expr::col(many.key_column()?).not_in(surviving.to_vec()));
            }
            Ok(update.build())
        }
        other => Err(Error::config(
            ConfigErrorKind::InvalidRelationship,
            format!(
                "{:?} relationship of {} has no stale links to clean up",
                other.kind(),
                owner.table()
            ),
        )),
    }
}
