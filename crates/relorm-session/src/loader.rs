//! Relationship loading for reconstructed instances.
//!
//! Each relationship gets a [`Fetch`] plan computed from the owner's row.
//! Eager entities run the plan immediately inside the current load; lazy
//! entities store it in a deferred [`Lazy`](relorm_core::Lazy) that runs on
//! first access, against the session that loaded the owner.

use std::rc::{Rc, Weak};

use relorm_core::{
    EntityDescriptor, Error, Fetched, ObjectRef, RelationshipDescriptor, RelationshipKind, Result,
    Row, Value,
};
use relorm_query::{many_to_many_join, select_by_column, select_column_by_key};

use crate::SessionCore;
use crate::factory::{self, LoadContext};

/// How to produce the value of one relationship.
#[derive(Debug, Clone)]
enum Fetch {
    /// The `target` row with primary key `key`.
    ByKey {
        target: &'static EntityDescriptor,
        key: Value,
    },
    /// Every `target` row returned by `sql`.
    Rows {
        target: &'static EntityDescriptor,
        sql: String,
    },
    /// Nothing is linked.
    Empty,
}

impl Fetch {
    fn one(&self, core: &Rc<SessionCore>, context: &mut LoadContext) -> Result<Option<ObjectRef>> {
        match self {
            Fetch::ByKey { target, key } => factory::fetch_by_key(core, target, key, context),
            Fetch::Rows { target, sql } => {
                Ok(factory::query_all(core, sql, target, context)?.into_iter().next())
            }
            Fetch::Empty => Ok(None),
        }
    }

    fn many(&self, core: &Rc<SessionCore>, context: &mut LoadContext) -> Result<Vec<ObjectRef>> {
        match self {
            Fetch::Rows { target, sql } => factory::query_all(core, sql, target, context),
            Fetch::ByKey { .. } | Fetch::Empty => Ok(self.one(core, context)?.into_iter().collect()),
        }
    }
}

/// Assign every relationship of a freshly reconstructed `object`.
pub(crate) fn load_relationships(
    core: &Rc<SessionCore>,
    object: &ObjectRef,
    row: &Row,
    context: &mut LoadContext,
) -> Result<()> {
    let descriptor = object.descriptor();
    let key = object.key()?;
    let lazy = descriptor.is_lazy();

    for (property, relationship) in descriptor.relationships() {
        let fetch = plan(core, descriptor, relationship, row, &key)?;
        tracing::trace!(
            table = descriptor.table(),
            property = property.name(),
            lazy,
            "Loading relationship"
        );
        match relationship.kind() {
            RelationshipKind::OneToOne | RelationshipKind::ManyToOne => {
                let value = if lazy {
                    Fetched::Deferred(deferred(core, fetch, Fetch::one))
                } else {
                    Fetched::Ready(fetch.one(core, context)?)
                };
                property.assign_one(&mut *object.borrow_mut()?, value)?;
            }
            RelationshipKind::OneToMany | RelationshipKind::ManyToMany => {
                let value = if lazy {
                    Fetched::Deferred(deferred(core, fetch, Fetch::many))
                } else {
                    Fetched::Ready(fetch.many(core, context)?)
                };
                property.assign_many(&mut *object.borrow_mut()?, value)?;
            }
        }
    }
    Ok(())
}

type Runner<V> = fn(&Fetch, &Rc<SessionCore>, &mut LoadContext) -> Result<V>;

/// A loader bound weakly to the session; it fails once the session is
/// dropped or closed.
fn deferred<V: 'static>(
    core: &Rc<SessionCore>,
    fetch: Fetch,
    run: Runner<V>,
) -> Rc<dyn Fn() -> Result<V>> {
    let session: Weak<SessionCore> = Rc::downgrade(core);
    Rc::new(move || {
        let core = session
            .upgrade()
            .ok_or_else(|| Error::closed("session dropped before a lazy relationship loaded"))?;
        core.ensure_open()?;
        let mut context = LoadContext::default();
        run(&fetch, &core, &mut context)
    })
}

fn plan(
    core: &SessionCore,
    owner: &'static EntityDescriptor,
    relationship: &RelationshipDescriptor,
    row: &Row,
    key: &Value,
) -> Result<Fetch> {
    let fetch = match relationship {
        RelationshipDescriptor::OneToOne {
            related,
            foreign_key,
            owning_side: true,
            ..
        }
        | RelationshipDescriptor::ManyToOne {
            related,
            foreign_key,
            ..
        } => {
            let target_key = match row.get_by_name(foreign_key) {
                Some(value) => value.clone(),
                None => stored_foreign_key(core, owner, foreign_key, key)?,
            };
            if target_key.is_null() {
                Fetch::Empty
            } else {
                Fetch::ByKey {
                    target: related(),
                    key: target_key,
                }
            }
        }
        _ if key.is_null() => Fetch::Empty,
        RelationshipDescriptor::OneToOne {
            related,
            foreign_key,
            ..
        } => {
            let target = related();
            Fetch::Rows {
                target,
                sql: select_by_column(target, foreign_key, key, 1),
            }
        }
        RelationshipDescriptor::OneToMany {
            many, foreign_key, ..
        } => {
            let target = many();
            Fetch::Rows {
                target,
                sql: select_by_column(target, foreign_key, key, 0),
            }
        }
        RelationshipDescriptor::ManyToMany(relation) => {
            let target = relation.entity(relation.side_of(owner)?.other());
            Fetch::Rows {
                target,
                sql: many_to_many_join(relation, key, target)?,
            }
        }
    };
    Ok(fetch)
}

/// Foreign-key column value of the owner row, for rows that did not carry it.
fn stored_foreign_key(
    core: &SessionCore,
    owner: &EntityDescriptor,
    column: &str,
    key: &Value,
) -> Result<Value> {
    if key.is_null() {
        return Ok(Value::Null);
    }
    let result = core.query(&select_column_by_key(owner, column, key)?)?;
    Ok(result
        .rows()
        .first()
        .and_then(|row| row.get(0))
        .cloned()
        .unwrap_or(Value::Null))
}
