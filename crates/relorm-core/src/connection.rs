//! Store driver trait.
//!
//! The engine talks to the relational store only through [`StoreDriver`]:
//! open/close, statement execution, materialized queries and transaction
//! scope control. All calls are synchronous.

use crate::error::Result;
use crate::row::ResultSet;

/// A blocking handle to a relational store.
///
/// Statements arrive as complete SQL text with literals already embedded.
pub trait StoreDriver {
    /// Acquire the underlying store handle. Opening an open driver is a no-op.
    fn open(&mut self) -> Result<()>;

    /// Release the underlying store handle.
    fn close(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;

    /// Execute a statement and return the number of rows it affected.
    fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Run a query and collect its rows.
    fn query(&mut self, sql: &str) -> Result<ResultSet>;

    /// Key generated by the most recent INSERT into an auto-increment table,
    /// or `None` when the store cannot report one.
    fn last_insert_id(&mut self) -> Result<Option<i64>>;

    fn begin_transaction(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;
}

impl<D: StoreDriver + ?Sized> StoreDriver for Box<D> {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn execute(&mut self, sql: &str) -> Result<u64> {
        (**self).execute(sql)
    }

    fn query(&mut self, sql: &str) -> Result<ResultSet> {
        (**self).query(sql)
    }

    fn last_insert_id(&mut self) -> Result<Option<i64>> {
        (**self).last_insert_id()
    }

    fn begin_transaction(&mut self) -> Result<()> {
        (**self).begin_transaction()
    }

    fn commit(&mut self) -> Result<()> {
        (**self).commit()
    }

    fn rollback(&mut self) -> Result<()> {
        (**self).rollback()
    }
}
