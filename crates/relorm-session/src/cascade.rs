//! Cascading writes.
//!
//! One top-level save/update walks the object graph once. Every object is
//! registered in a [`Visitation`] before its relationships are followed, so
//! cycles stop at the second visit. Links that need a key the walk has not
//! produced yet (an insert still further up the stack) are queued as
//! [`Deferred`] writes and flushed as soon as both ends have keys.
//!
//! Order for one object:
//!
//! 1. one-to-one targets, so an owning foreign key can go into the row
//! 2. the object's own row
//! 3. many-to-many, then many-to-one, then one-to-many links, each followed
//!    by removal of links the object no longer holds

use std::collections::HashMap;

use relorm_core::{
    Error, JoinSide, ManyToMany, ObjectIdentity, ObjectRef, RelationshipDescriptor, Result, Value,
};
use relorm_query::{
    delete_join_rows, delete_row, exists_by_key, insert_join_row, insert_row, link_foreign_key,
    stale_relationship_cleanup, update_row,
};

use crate::SessionCore;
use crate::mapper::{ModelMap, ModelMapper, ToManyLink, ToOneLink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteMode {
    Insert,
    Update,
    /// Update, falling back to insert when no row has the key.
    Upsert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteOutcome {
    Written,
    /// Already written earlier in this walk.
    Skipped,
    /// Visited earlier in this walk and still waiting for its key.
    Pending,
    /// The store rejected the row or no row matched.
    Failed,
}

/// A link write waiting for keys.
enum Deferred {
    /// `UPDATE row.table SET column = referenced.key WHERE pk = row.key`
    ForeignKey {
        row: ObjectRef,
        column: &'static str,
        referenced: ObjectRef,
    },
    JoinRow {
        relation: &'static ManyToMany,
        first: ObjectRef,
        second: ObjectRef,
    },
}

impl Deferred {
    fn same_as(&self, other: &Deferred) -> bool {
        match (self, other) {
            (
                Deferred::ForeignKey { row, column, referenced },
                Deferred::ForeignKey {
                    row: r,
                    column: c,
                    referenced: t,
                },
            ) => column == c && row.ptr_eq(r) && referenced.ptr_eq(t),
            (
                Deferred::JoinRow { relation, first, second },
                Deferred::JoinRow {
                    relation: j,
                    first: f,
                    second: s,
                },
            ) => relation.join_table == j.join_table && first.ptr_eq(f) && second.ptr_eq(s),
            _ => false,
        }
    }

    /// Write the link. `Ok(false)` while either end still lacks a key.
    fn apply(&self, core: &SessionCore) -> Result<bool> {
        match self {
            Deferred::ForeignKey { row, column, referenced } => {
                let (key, target) = (row.key()?, referenced.key()?);
                if key.is_null() || target.is_null() {
                    return Ok(false);
                }
                core.execute_checked(&link_foreign_key(row.descriptor(), column, &target, &key)?)?;
            }
            Deferred::JoinRow { relation, first, second } => {
                let (first_key, second_key) = (first.key()?, second.key()?);
                if first_key.is_null() || second_key.is_null() {
                    return Ok(false);
                }
                let sql = insert_join_row(relation, &first_key, &second_key);
                match core.execute(&sql) {
                    Err(e) if e.is_constraint_violation() => {
                        tracing::debug!(join_table = relation.join_table, "Already linked");
                    }
                    other => {
                        other?;
                    }
                }
            }
        }
        Ok(true)
    }

    fn describe(&self) -> String {
        match self {
            Deferred::ForeignKey { row, column, .. } => {
                format!("{}.{}", row.descriptor().table(), column)
            }
            Deferred::JoinRow { relation, .. } => relation.join_table.to_string(),
        }
    }
}

/// Bookkeeping for one top-level write.
#[derive(Default)]
pub(crate) struct Visitation {
    seen: HashMap<ObjectIdentity, ObjectRef>,
    deferred: Vec<Deferred>,
    applied: Vec<Deferred>,
}

impl Visitation {
    fn contains(&self, object: &ObjectRef) -> Result<bool> {
        if self.seen.contains_key(&ObjectIdentity::transient(object)) {
            return Ok(true);
        }
        Ok(ObjectIdentity::keyed(object.descriptor(), &object.key()?)
            .is_some_and(|identity| self.seen.contains_key(&identity)))
    }

    fn register(&mut self, object: &ObjectRef) -> Result<()> {
        self.seen
            .insert(ObjectIdentity::transient(object), object.clone());
        self.register_key(object)
    }

    fn register_key(&mut self, object: &ObjectRef) -> Result<()> {
        if let Some(identity) = ObjectIdentity::keyed(object.descriptor(), &object.key()?) {
            self.seen.insert(identity, object.clone());
        }
        Ok(())
    }

    /// Queue `link` unless the same link is queued or was written already.
    fn defer(&mut self, link: Deferred) {
        let known = self
            .deferred
            .iter()
            .chain(&self.applied)
            .any(|queued| queued.same_as(&link));
        if !known {
            self.deferred.push(link);
        }
    }

    /// Apply every queued link whose ends now have keys.
    fn flush(&mut self, core: &SessionCore) -> Result<()> {
        let queued = std::mem::take(&mut self.deferred);
        for link in queued {
            if link.apply(core)? {
                self.applied.push(link);
            } else {
                self.deferred.push(link);
            }
        }
        Ok(())
    }

    fn finish(mut self, core: &SessionCore) -> Result<()> {
        self.flush(core)?;
        for link in &self.deferred {
            tracing::warn!(link = %link.describe(), "Link dropped: an end was never written");
        }
        Ok(())
    }
}

/// Insert a new object, or update one whose generated key is already set.
pub(crate) fn save(core: &SessionCore, object: &ObjectRef) -> Result<bool> {
    let mode = if object.descriptor().has_auto_increment_key() && object.has_key()? {
        WriteMode::Upsert
    } else {
        WriteMode::Insert
    };
    run(core, object, mode)
}

pub(crate) fn update(core: &SessionCore, object: &ObjectRef) -> Result<bool> {
    run(core, object, WriteMode::Update)
}

pub(crate) fn save_or_update(core: &SessionCore, object: &ObjectRef) -> Result<bool> {
    if update(core, object)? {
        return Ok(true);
    }
    tracing::debug!(table = object.descriptor().table(), "No row updated; saving");
    save(core, object)
}

fn run(core: &SessionCore, object: &ObjectRef, mode: WriteMode) -> Result<bool> {
    let mut visit = Visitation::default();
    let outcome = persist(core, object, mode, &mut visit)?;
    visit.finish(core)?;
    Ok(outcome == WriteOutcome::Written)
}

/// Delete the object's row. Join-table rows go with it; nothing else
/// cascades. The object leaves the identity cache.
pub(crate) fn delete(core: &SessionCore, object: &ObjectRef) -> Result<bool> {
    let descriptor = object.descriptor();
    let key = object.key()?;
    if key.is_null() {
        tracing::debug!(table = descriptor.table(), "Delete of an unsaved object");
        return Ok(false);
    }
    if core.execute_checked(&delete_row(descriptor, &key)?)? != 1 {
        return Ok(false);
    }
    for relation in descriptor.many_to_many() {
        let side = relation.side_of(descriptor)?;
        core.execute(&delete_join_rows(relation, side, &key))?;
    }
    if let Some(identity) = ObjectIdentity::keyed(descriptor, &key) {
        core.cache_remove(&identity);
    }
    Ok(true)
}

fn persist(
    core: &SessionCore,
    object: &ObjectRef,
    mode: WriteMode,
    visit: &mut Visitation,
) -> Result<WriteOutcome> {
    if visit.contains(object)? {
        return Ok(if object.has_key()? {
            WriteOutcome::Skipped
        } else {
            WriteOutcome::Pending
        });
    }
    visit.register(object)?;

    let descriptor = object.descriptor();
    let cascade = descriptor.cascade();
    let ModelMap {
        mut columns,
        one_to_one,
        many_to_one,
        one_to_many,
        many_to_many,
    } = ModelMapper::new(&core.adapters()).map(object)?;

    for link in &one_to_one {
        persist_one_to_one(core, object, link, &mut columns, visit)?;
    }

    let key = object.key()?;
    let (written, inserted) = match mode {
        WriteMode::Insert => (insert(core, object, &columns)?, true),
        WriteMode::Update => (update_row_of(core, object, &columns, &key)?, false),
        WriteMode::Upsert => {
            if update_row_of(core, object, &columns, &key)? {
                (true, false)
            } else {
                (insert(core, object, &columns)?, true)
            }
        }
    };
    if !written {
        tracing::debug!(table = descriptor.table(), ?mode, "No row written");
        return Ok(WriteOutcome::Failed);
    }
    visit.register_key(object)?;
    visit.flush(core)?;

    if cascade.links_related() {
        let key = object.key()?;
        for link in &many_to_many {
            link_many_to_many(core, object, &key, link, inserted, visit)?;
        }
        for link in &many_to_one {
            link_many_to_one(core, object, &key, link, inserted, visit)?;
        }
        for link in &one_to_many {
            link_one_to_many(core, object, &key, link, inserted, visit)?;
        }
    }
    visit.flush(core)?;
    Ok(WriteOutcome::Written)
}

fn persist_one_to_one(
    core: &SessionCore,
    object: &ObjectRef,
    link: &ToOneLink,
    columns: &mut Vec<(&'static str, Value)>,
    visit: &mut Visitation,
) -> Result<()> {
    let Some(RelationshipDescriptor::OneToOne {
        foreign_key,
        owning_side,
        ..
    }) = link.property.relationship()
    else {
        return Ok(());
    };
    let cascade = object.descriptor().cascade();
    let Some(related) = &link.target else {
        if *owning_side {
            columns.push((*foreign_key, Value::Null));
        }
        return Ok(());
    };

    if cascade.persists_related() {
        persist(core, related, WriteMode::Upsert, visit)?;
    }
    if *owning_side {
        let target = related.key()?;
        if target.is_null() && cascade.links_related() {
            visit.defer(Deferred::ForeignKey {
                row: object.clone(),
                column: *foreign_key,
                referenced: related.clone(),
            });
        }
        columns.push((*foreign_key, target));
    } else if cascade.links_related() {
        visit.defer(Deferred::ForeignKey {
            row: related.clone(),
            column: *foreign_key,
            referenced: object.clone(),
        });
    }
    Ok(())
}

fn link_many_to_many(
    core: &SessionCore,
    object: &ObjectRef,
    key: &Value,
    link: &ToManyLink,
    inserted: bool,
    visit: &mut Visitation,
) -> Result<()> {
    let Some(relationship) = link.property.relationship() else {
        return Ok(());
    };
    let Some(relation) = relationship.as_many_to_many() else {
        return Ok(());
    };
    let side = relation.side_of(object.descriptor())?;
    let persists = object.descriptor().cascade().persists_related();

    for partner in &link.targets {
        if persists {
            persist(core, partner, WriteMode::Upsert, visit)?;
        }
        let (first, second) = match side {
            JoinSide::First => (object.clone(), partner.clone()),
            JoinSide::Second => (partner.clone(), object.clone()),
        };
        visit.defer(Deferred::JoinRow {
            relation,
            first,
            second,
        });
    }
    visit.flush(core)?;
    if !inserted {
        remove_stale_links(core, object, key, relationship, &link.targets)?;
    }
    Ok(())
}

fn link_many_to_one(
    core: &SessionCore,
    object: &ObjectRef,
    key: &Value,
    link: &ToOneLink,
    inserted: bool,
    visit: &mut Visitation,
) -> Result<()> {
    let Some(column) = link
        .property
        .relationship()
        .and_then(RelationshipDescriptor::owner_column)
    else {
        return Ok(());
    };
    match &link.target {
        Some(related) => {
            if object.descriptor().cascade().persists_related() {
                persist(core, related, WriteMode::Upsert, visit)?;
            }
            visit.defer(Deferred::ForeignKey {
                row: object.clone(),
                column,
                referenced: related.clone(),
            });
        }
        None if !inserted => {
            core.execute_checked(&link_foreign_key(
                object.descriptor(),
                column,
                &Value::Null,
                key,
            )?)?;
        }
        None => {}
    }
    Ok(())
}

fn link_one_to_many(
    core: &SessionCore,
    object: &ObjectRef,
    key: &Value,
    link: &ToManyLink,
    inserted: bool,
    visit: &mut Visitation,
) -> Result<()> {
    let Some(relationship) = link.property.relationship() else {
        return Ok(());
    };
    let RelationshipDescriptor::OneToMany { foreign_key, .. } = relationship else {
        return Ok(());
    };
    let persists = object.descriptor().cascade().persists_related();

    for child in &link.targets {
        if persists {
            persist(core, child, WriteMode::Upsert, visit)?;
        }
        visit.defer(Deferred::ForeignKey {
            row: child.clone(),
            column: *foreign_key,
            referenced: object.clone(),
        });
    }
    visit.flush(core)?;
    if !inserted {
        remove_stale_links(core, object, key, relationship, &link.targets)?;
    }
    Ok(())
}

/// Unlink rows that reference the object but are no longer in `current`.
fn remove_stale_links(
    core: &SessionCore,
    object: &ObjectRef,
    key: &Value,
    relationship: &RelationshipDescriptor,
    current: &[ObjectRef],
) -> Result<()> {
    let mut surviving = Vec::with_capacity(current.len());
    for target in current {
        let target_key = target.key()?;
        if !target_key.is_null() {
            surviving.push(target_key);
        }
    }
    let sql = stale_relationship_cleanup(relationship, object.descriptor(), key, &surviving)?;
    core.execute_checked(&sql)?;
    Ok(())
}

fn insert(core: &SessionCore, object: &ObjectRef, columns: &[(&'static str, Value)]) -> Result<bool> {
    let descriptor = object.descriptor();
    if core.execute_checked(&insert_row(descriptor, columns))? == 0 {
        return Ok(false);
    }
    if descriptor.has_auto_increment_key() {
        let id = core.last_insert_id()?.ok_or_else(|| {
            Error::Custom(format!("store returned no generated key for {}", descriptor.table()))
        })?;
        descriptor.assign_key(&mut *object.borrow_mut()?, Value::BigInt(id))?;
    }
    Ok(true)
}

fn update_row_of(
    core: &SessionCore,
    object: &ObjectRef,
    columns: &[(&'static str, Value)],
    key: &Value,
) -> Result<bool> {
    if key.is_null() {
        return Ok(false);
    }
    let descriptor = object.descriptor();
    let key_column = descriptor.key_column()?;
    let assignments: Vec<(&'static str, Value)> = columns
        .iter()
        .filter(|(column, _)| *column != key_column)
        .cloned()
        .collect();
    match update_row(descriptor, &assignments, key)? {
        Some(sql) => Ok(core.execute_checked(&sql)? > 0),
        None => Ok(!core.query(&exists_by_key(descriptor, key)?)?.is_empty()),
    }
}
