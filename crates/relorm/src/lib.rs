//! relorm - object graph persistence over relational stores.
//!
//! relorm maps plain Rust structs to tables and persists whole object graphs
//! through a [`Session`]:
//!
//! - Cascading save, update and delete across one-to-one, many-to-one,
//!   one-to-many and many-to-many relationships, cycles included
//! - An identity cache so one stored row is one in-memory instance
//! - Eager or lazy relationship loading
//! - Criteria queries and schema creation
//! - A bundled SQLite driver
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::OnceLock;
//! use relorm::prelude::*;
//!
//! #[derive(Debug, Default)]
//! struct Author {
//!     id: Option<i64>,
//!     name: String,
//!     books: RelatedMany<Book>,
//! }
//!
//! impl Entity for Author {
//!     fn descriptor() -> &'static EntityDescriptor {
//!         static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
//!         DESCRIPTOR.get_or_init(|| {
//!             EntityDescriptor::builder::<Author>("author")
//!                 .primary_key("id", |a| a.id, |a, v| a.id = v)
//!                 .auto_increment()
//!                 .column("name", |a| a.name.clone(), |a, v| a.name = v)
//!                 .one_to_many("books", "authorId", |a| &a.books, |a| &mut a.books)
//!                 .build()
//!         })
//!     }
//! }
//!
//! fn main_example() -> Result<()> {
//!     let session = Session::new(SqliteDriver::memory(), SessionConfig::default());
//!     session.open()?;
//!     session.create_schema(&Schema::new().entity::<Author>().entity::<Book>())?;
//!
//!     let author = Author { name: "Ursula".into(), ..Default::default() }.into_handle();
//!     session.begin_transaction()?;
//!     session.save(&author)?;
//!     session.commit()?;
//!
//!     let id = author.borrow().id;
//!     let first = session.load::<Author>(id)?.expect("saved above");
//!     let second = session.load::<Author>(id)?.expect("saved above");
//!     assert!(std::rc::Rc::ptr_eq(&first, &second));
//!     Ok(())
//! }
//! ```

pub use relorm_core::{
    CascadeMode, ColumnInfo, ConfigError, ConfigErrorKind, ConnectionError, ConnectionErrorKind,
    Entity, EntityBuilder, EntityDescriptor, Error, Fetched, FieldType, Handle, JoinSide,
    KeyValue, Lazy, ManyToMany, ObjectIdentity, ObjectRef, PropertyDescriptor, QueryError,
    QueryErrorKind, Related, RelatedMany, RelationshipDescriptor, RelationshipKind, Result,
    ResultSet, Row, Scalar, ScalarAdapter, SqlType, StoreDriver, TransactionError,
    TransactionErrorKind, TypeAdapter, TypeAdapterRegistry, TypeError, Value, validate_inverse,
};
pub use relorm_query::{Criteria, Expr, Select, sql_literal};
pub use relorm_schema::{CreateTable, Schema, create_join_table_ddl, create_table_ddl};
pub use relorm_session::{IdentityCache, ModelMap, ModelMapper, Session, SessionConfig};
pub use relorm_sqlite::{MEMORY, OpenFlags, SqliteConfig, SqliteDriver};

/// Lower-level building blocks, re-exported by crate.
pub mod query {
    pub use relorm_query::*;
}

pub mod schema {
    pub use relorm_schema::*;
}

pub mod session {
    pub use relorm_session::*;
}

pub mod sqlite {
    pub use relorm_sqlite::*;
}

/// Everything needed to map entities and work with a session.
pub mod prelude {
    pub use crate::{
        CascadeMode,
        Criteria,
        // Mapping
        Entity,
        EntityDescriptor,
        Error,
        Handle,
        ManyToMany,
        Related,
        RelatedMany,
        Result,
        Schema,
        // Session
        Session,
        SessionConfig,
        // Driver
        SqliteConfig,
        SqliteDriver,
        StoreDriver,
        Value,
    };
}
