//! Session and persistence engine for relorm.
//!
//! `relorm-session` is the **persistence layer**. A [`Session`] writes object
//! graphs to a store and reads them back, resolving relationships in both
//! directions and keeping one in-memory instance per row.
//!
//! # Role In The Architecture
//!
//! - **Identity cache**: a row read twice in one session is the same instance.
//! - **Cascading writes**: save/update/delete walk the object graph once per
//!   call, following the entity's cascade mode, and terminate on cycles.
//! - **Relationship loading**: eager or lazy per entity type.
//! - **Transactions**: a nesting depth counter over the store's single scope.
//!
//! # Example
//!
//! ```ignore
//! let session = Session::new(driver, SessionConfig::default());
//! session.open()?;
//!
//! let author = Author { name: "Le Guin".into(), ..Author::default() }.into_handle();
//! session.save(&author)?;
//!
//! let again = session.load::<Author>(author.borrow().id)?.unwrap();
//! assert!(Rc::ptr_eq(&author, &again));
//! ```

pub mod cascade;
pub mod factory;
pub mod identity_map;
pub mod loader;
pub mod mapper;

pub use identity_map::IdentityCache;
pub use mapper::{ModelMap, ModelMapper, ToManyLink, ToOneLink};

use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;

use relorm_core::{
    Entity, Error, Handle, ObjectIdentity, ObjectRef, ResultSet, Result, StoreDriver,
    TransactionErrorKind, TypeAdapter, TypeAdapterRegistry, Value,
};
use relorm_query::Criteria;
use relorm_schema::Schema;
use serde::{Deserialize, Serialize};

use crate::factory::LoadContext;

/// Configuration for a [`Session`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Writes are allowed outside `begin_transaction`, and no store
    /// transaction scope is opened.
    pub autocommit: bool,
    /// Identity cache capacity.
    pub cache_size: usize,
    /// Whether a full identity cache is dropped and restarted. When false the
    /// cache grows without bound.
    pub cache_recyclable: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            autocommit: true,
            cache_size: 1000,
            cache_recyclable: true,
        }
    }
}

impl SessionConfig {
    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    #[must_use]
    pub fn autocommit(mut self, value: bool) -> Self {
        self.autocommit = value;
        self
    }

    #[must_use]
    pub fn cache_size(mut self, value: usize) -> Self {
        self.cache_size = value;
        self
    }

    #[must_use]
    pub fn cache_recyclable(mut self, value: bool) -> Self {
        self.cache_recyclable = value;
        self
    }
}

/// State shared by a session and the lazy relationships it hands out.
pub(crate) struct SessionCore {
    driver: RefCell<Box<dyn StoreDriver>>,
    open: Cell<bool>,
    cache: RefCell<IdentityCache>,
    adapters: RefCell<TypeAdapterRegistry>,
    tx_depth: Cell<u32>,
    scope_open: Cell<bool>,
    autocommit: Cell<bool>,
}

impl SessionCore {
    pub(crate) fn is_open(&self) -> bool {
        self.open.get()
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(Error::closed("session is not open"))
        }
    }

    /// Run a statement and return the affected row count.
    pub(crate) fn execute(&self, sql: &str) -> Result<u64> {
        self.ensure_open()?;
        tracing::trace!(sql = %sql, "Executing statement");
        self.driver.borrow_mut().execute(sql)
    }

    /// Like [`execute`](Self::execute), with a constraint violation reported
    /// as zero affected rows.
    pub(crate) fn execute_checked(&self, sql: &str) -> Result<u64> {
        match self.execute(sql) {
            Err(e) if e.is_constraint_violation() => {
                tracing::warn!(sql = %sql, error = %e, "Constraint violation; no row written");
                Ok(0)
            }
            other => other,
        }
    }

    pub(crate) fn query(&self, sql: &str) -> Result<ResultSet> {
        self.ensure_open()?;
        tracing::trace!(sql = %sql, "Running query");
        self.driver.borrow_mut().query(sql)
    }

    pub(crate) fn last_insert_id(&self) -> Result<Option<i64>> {
        self.driver.borrow_mut().last_insert_id()
    }

    pub(crate) fn adapters(&self) -> Ref<'_, TypeAdapterRegistry> {
        self.adapters.borrow()
    }

    pub(crate) fn cached(&self, identity: &ObjectIdentity) -> Option<ObjectRef> {
        self.cache.borrow().get(identity)
    }

    /// Cache a freshly read instance, recycling a full cache.
    pub(crate) fn cache_insert(&self, identity: ObjectIdentity, object: ObjectRef) {
        self.cache.borrow_mut().put_or_recycle(identity, object);
    }

    pub(crate) fn cache_remove(&self, identity: &ObjectIdentity) {
        self.cache.borrow_mut().remove(identity);
    }

    fn require_transaction(&self) -> Result<()> {
        if self.autocommit.get() || self.tx_depth.get() > 0 {
            Ok(())
        } else {
            Err(Error::transaction(
                TransactionErrorKind::NoActiveTransaction,
                "autocommit is disabled and no transaction is open",
            ))
        }
    }
}

/// A unit of work against one store.
///
/// A session is single-threaded. Lazy relationships of instances it loads
/// keep a weak reference to it and fail with a connection error once it is
/// dropped or closed.
pub struct Session {
    core: Rc<SessionCore>,
    config: SessionConfig,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("open", &self.core.is_open())
            .field("cached", &self.cached_len())
            .field("tx_depth", &self.core.tx_depth.get())
            .field("autocommit", &self.core.autocommit.get())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a closed session over `driver`.
    pub fn new(driver: impl StoreDriver + 'static, config: SessionConfig) -> Self {
        let core = SessionCore {
            driver: RefCell::new(Box::new(driver)),
            open: Cell::new(false),
            cache: RefCell::new(IdentityCache::new(
                config.cache_size,
                config.cache_recyclable,
            )),
            adapters: RefCell::new(TypeAdapterRegistry::new()),
            tx_depth: Cell::new(0),
            scope_open: Cell::new(false),
            autocommit: Cell::new(config.autocommit),
        };
        Self {
            core: Rc::new(core),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Acquire the store handle.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn open(&self) -> Result<()> {
        self.core.driver.borrow_mut().open()?;
        self.core.open.set(true);
        Ok(())
    }

    /// Release the store handle and clear the identity cache. Closing a
    /// closed session is a no-op.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn close(&self) -> Result<()> {
        if !self.core.is_open() {
            return Ok(());
        }
        self.core.open.set(false);
        self.core.cache.borrow_mut().clear();
        self.core.tx_depth.set(0);
        self.core.scope_open.set(false);
        self.core.driver.borrow_mut().close()
    }

    pub fn is_open(&self) -> bool {
        self.core.is_open()
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Insert `entity` and cascade to its relationships. Returns `false`
    /// when the store rejected the row.
    #[tracing::instrument(level = "debug", skip(self, entity), fields(table = T::descriptor().table()))]
    pub fn save<T: Entity>(&self, entity: &Handle<T>) -> Result<bool> {
        self.core.require_transaction()?;
        cascade::save(&self.core, &ObjectRef::new(entity))
    }

    /// Update `entity` by primary key and cascade. Returns `false` when no
    /// row has that key.
    #[tracing::instrument(level = "debug", skip(self, entity), fields(table = T::descriptor().table()))]
    pub fn update<T: Entity>(&self, entity: &Handle<T>) -> Result<bool> {
        self.core.require_transaction()?;
        cascade::update(&self.core, &ObjectRef::new(entity))
    }

    /// Update `entity`, falling back to a save when no row was affected.
    #[tracing::instrument(level = "debug", skip(self, entity), fields(table = T::descriptor().table()))]
    pub fn save_or_update<T: Entity>(&self, entity: &Handle<T>) -> Result<bool> {
        self.core.require_transaction()?;
        cascade::save_or_update(&self.core, &ObjectRef::new(entity))
    }

    /// Delete `entity`'s row and its join-table rows. Related rows are left
    /// in place.
    #[tracing::instrument(level = "debug", skip(self, entity), fields(table = T::descriptor().table()))]
    pub fn delete<T: Entity>(&self, entity: &Handle<T>) -> Result<bool> {
        self.core.require_transaction()?;
        cascade::delete(&self.core, &ObjectRef::new(entity))
    }

    /// Save each entity in its own cascading call; returns how many succeeded.
    pub fn save_all<T: Entity>(&self, entities: &[Handle<T>]) -> Result<usize> {
        self.count_successes(entities, |e| self.save(e))
    }

    pub fn update_all<T: Entity>(&self, entities: &[Handle<T>]) -> Result<usize> {
        self.count_successes(entities, |e| self.update(e))
    }

    pub fn save_or_update_all<T: Entity>(&self, entities: &[Handle<T>]) -> Result<usize> {
        self.count_successes(entities, |e| self.save_or_update(e))
    }

    pub fn delete_all<T: Entity>(&self, entities: &[Handle<T>]) -> Result<usize> {
        self.count_successes(entities, |e| self.delete(e))
    }

    fn count_successes<T: Entity>(
        &self,
        entities: &[Handle<T>],
        mut op: impl FnMut(&Handle<T>) -> Result<bool>,
    ) -> Result<usize> {
        self.core.require_transaction()?;
        let mut count = 0;
        for entity in entities {
            if op(entity)? {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Execute raw SQL, returning the affected row count.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn execute(&self, sql: &str) -> Result<u64> {
        self.core.require_transaction()?;
        self.core.execute(sql)
    }

    /// Create every table of `schema` that does not exist yet.
    #[tracing::instrument(level = "debug", skip(self, schema))]
    pub fn create_schema(&self, schema: &Schema) -> Result<()> {
        self.core.require_transaction()?;
        let statements = schema.create_statements(&self.core.adapters())?;
        for sql in &statements {
            self.core.execute(sql)?;
        }
        Ok(())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// The instance with primary key `key`, from the identity cache when
    /// present.
    #[tracing::instrument(level = "debug", skip(self, key), fields(table = T::descriptor().table()))]
    pub fn load<T: Entity>(&self, key: impl Into<Value>) -> Result<Option<Handle<T>>> {
        self.core.ensure_open()?;
        let mut context = LoadContext::default();
        factory::fetch_by_key(&self.core, T::descriptor(), &key.into(), &mut context)?
            .map(|object| object.downcast::<T>())
            .transpose()
    }

    /// An empty criteria query over `T`'s table.
    pub fn create_criteria_query<T: Entity>(&self) -> Criteria<T> {
        Criteria::new()
    }

    /// Every instance matching `criteria`.
    #[tracing::instrument(level = "debug", skip(self, criteria), fields(table = T::descriptor().table()))]
    pub fn list<T: Entity>(&self, criteria: &Criteria<T>) -> Result<Vec<Handle<T>>> {
        let mut context = LoadContext::default();
        factory::query_all(&self.core, &criteria.to_sql(), T::descriptor(), &mut context)?
            .iter()
            .map(ObjectRef::downcast::<T>)
            .collect()
    }

    /// The first instance matching `criteria`, if any.
    pub fn unique<T: Entity>(&self, criteria: &Criteria<T>) -> Result<Option<Handle<T>>> {
        Ok(self.list(&criteria.clone().limit(1))?.into_iter().next())
    }

    /// Run a raw query.
    pub fn query(&self, sql: &str) -> Result<ResultSet> {
        self.core.query(sql)
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Enter a transaction. Nested calls only deepen the counter; the store
    /// scope is opened once, and only when autocommit is disabled.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn begin_transaction(&self) -> Result<()> {
        self.core.ensure_open()?;
        if !self.core.autocommit.get() && !self.core.scope_open.get() {
            self.core.driver.borrow_mut().begin_transaction()?;
            self.core.scope_open.set(true);
        }
        self.core.tx_depth.set(self.core.tx_depth.get() + 1);
        Ok(())
    }

    /// Leave a transaction, committing the store scope when the outermost
    /// one ends. If the store refuses the commit, depth and scope are left
    /// as they were so the caller can retry or roll back.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn commit(&self) -> Result<()> {
        let depth = self.current_depth("commit")?;
        if depth == 1 && self.core.scope_open.get() {
            self.core.driver.borrow_mut().commit()?;
            self.core.scope_open.set(false);
        }
        self.core.tx_depth.set(depth - 1);
        Ok(())
    }

    /// Leave a transaction, rolling back the store scope at any depth. A
    /// failed store rollback leaves depth and scope unchanged.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn rollback(&self) -> Result<()> {
        let depth = self.current_depth("rollback")?;
        if self.core.scope_open.get() {
            self.core.driver.borrow_mut().rollback()?;
            self.core.scope_open.set(false);
            if depth > 1 {
                tracing::warn!(depth = depth - 1, "Inner rollback discarded the enclosing transaction");
            }
        }
        self.core.tx_depth.set(depth - 1);
        Ok(())
    }

    fn current_depth(&self, action: &str) -> Result<u32> {
        let depth = self.core.tx_depth.get();
        if depth == 0 {
            return Err(Error::transaction(
                TransactionErrorKind::NotInTransaction,
                format!("{action} without an open transaction"),
            ));
        }
        Ok(depth)
    }

    pub fn is_transaction_open(&self) -> bool {
        self.core.tx_depth.get() > 0
    }

    pub fn transaction_depth(&self) -> u32 {
        self.core.tx_depth.get()
    }

    pub fn set_autocommit(&self, autocommit: bool) {
        self.core.autocommit.set(autocommit);
    }

    pub fn is_autocommit(&self) -> bool {
        self.core.autocommit.get()
    }

    // ========================================================================
    // Types and cache
    // ========================================================================

    /// Use `adapter` for fields of type `F`, replacing any earlier adapter.
    pub fn register_type_adapter<F: 'static>(&self, adapter: impl TypeAdapter + 'static) {
        self.core.adapters.borrow_mut().register::<F>(adapter);
    }

    pub fn set_cache_size(&self, size: usize) {
        self.core.cache.borrow_mut().set_capacity(size);
    }

    pub fn set_cache_recyclable(&self, recyclable: bool) {
        self.core.cache.borrow_mut().set_recyclable(recyclable);
    }

    /// Drop every cached instance.
    pub fn recycle_cache(&self) {
        self.core.cache.borrow_mut().recycle();
    }

    pub fn cached_len(&self) -> usize {
        self.core.cache.borrow().len()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "Failed to close session on drop");
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures;
