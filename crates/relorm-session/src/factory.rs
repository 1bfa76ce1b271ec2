//! Row to instance reconstruction.
//!
//! Every instance read from the store goes through [`reconstruct`]: a fresh
//! instance is populated from the row, and if the identity cache (or the
//! current load) already holds that row's instance, the cached one wins.
//! New instances are cached *before* their relationships load, so a cycle
//! back to them resolves to the same instance.

use std::collections::HashMap;
use std::rc::Rc;

use relorm_core::{
    EntityDescriptor, Error, ObjectIdentity, ObjectRef, Result, Row, TypeError, Value,
};
use relorm_query::select_by_key;

use crate::SessionCore;
use crate::loader;

/// Instances materialized during one top-level load.
#[derive(Debug, Default)]
pub(crate) struct LoadContext {
    loaded: HashMap<ObjectIdentity, ObjectRef>,
}

impl LoadContext {
    pub(crate) fn get(&self, identity: &ObjectIdentity) -> Option<ObjectRef> {
        self.loaded.get(identity).cloned()
    }

    fn insert(&mut self, identity: ObjectIdentity, object: ObjectRef) {
        self.loaded.insert(identity, object);
    }
}

/// The instance for `row`, reusing an already loaded one.
pub(crate) fn reconstruct(
    core: &Rc<SessionCore>,
    row: &Row,
    descriptor: &'static EntityDescriptor,
    context: &mut LoadContext,
) -> Result<ObjectRef> {
    let object = descriptor.allocate();
    populate(core, row, &object)?;

    let Some(identity) = ObjectIdentity::keyed(descriptor, &object.key()?) else {
        tracing::debug!(table = descriptor.table(), "Row without a key; not cached");
        loader::load_relationships(core, &object, row, context)?;
        return Ok(object);
    };
    if let Some(existing) = context.get(&identity).or_else(|| core.cached(&identity)) {
        return Ok(existing);
    }

    core.cache_insert(identity.clone(), object.clone());
    context.insert(identity, object.clone());
    loader::load_relationships(core, &object, row, context)?;
    Ok(object)
}

/// Reconstruct every row returned by `sql`.
pub(crate) fn query_all(
    core: &Rc<SessionCore>,
    sql: &str,
    descriptor: &'static EntityDescriptor,
    context: &mut LoadContext,
) -> Result<Vec<ObjectRef>> {
    let rows = core.query(sql)?.into_rows();
    rows.iter()
        .map(|row| reconstruct(core, row, descriptor, context))
        .collect()
}

/// The instance of `descriptor` with primary key `key`: from the current
/// load, then the identity cache, then the store.
pub(crate) fn fetch_by_key(
    core: &Rc<SessionCore>,
    descriptor: &'static EntityDescriptor,
    key: &Value,
    context: &mut LoadContext,
) -> Result<Option<ObjectRef>> {
    let Some(identity) = ObjectIdentity::keyed(descriptor, key) else {
        return Ok(None);
    };
    if let Some(existing) = context.get(&identity).or_else(|| core.cached(&identity)) {
        return Ok(Some(existing));
    }
    let sql = select_by_key(descriptor, key)?;
    Ok(query_all(core, &sql, descriptor, context)?.into_iter().next())
}

fn populate(core: &SessionCore, row: &Row, object: &ObjectRef) -> Result<()> {
    let descriptor = object.descriptor();
    let adapters = core.adapters();
    let mut entity = object.borrow_mut()?;

    for property in descriptor.properties().iter().filter(|p| p.is_scalar()) {
        let (Some(column), Some(field_type)) = (property.column(), property.field_type()) else {
            continue;
        };
        let Some(index) = row.index_of(column) else {
            continue;
        };
        let adapter = adapters.resolve_id(field_type.id, field_type.name)?;
        let value = adapter
            .from_row(row, index)
            .map_err(|e| in_column(e, descriptor, column))?;
        property.write(&mut *entity, value)?;
    }
    Ok(())
}

fn in_column(error: Error, descriptor: &EntityDescriptor, column: &str) -> Error {
    match error {
        Error::Type(TypeError {
            expected,
            actual,
            column: None,
            rust_type,
        }) => Error::Type(TypeError {
            expected,
            actual,
            column: Some(format!("{}.{}", descriptor.table(), column)),
            rust_type,
        }),
        other => other,
    }
}
