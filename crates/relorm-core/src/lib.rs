//! Core types and traits for relorm.
//!
//! This crate provides the foundations shared by the query builder, schema
//! generator, session engine and drivers:
//!
//! - `Value`, `Row` and `ResultSet` for data crossing the store boundary
//! - `TypeAdapterRegistry` for field type to column conversion
//! - `EntityDescriptor` and the `Entity` trait for mapping metadata
//! - `ObjectRef`/`Handle` and `ObjectIdentity` for object graphs
//! - `Lazy` for deferred relationship values
//! - `StoreDriver` for the store itself

pub mod adapter;
pub mod connection;
pub mod descriptor;
pub mod error;
pub mod identity;
pub mod model;
pub mod relationship;
pub mod row;
pub mod types;
pub mod value;

pub use adapter::{Scalar, ScalarAdapter, TypeAdapter, TypeAdapterRegistry};
pub use connection::StoreDriver;
pub use descriptor::{CascadeMode, EntityBuilder, EntityDescriptor, FieldType, PropertyDescriptor};
pub use error::{
    ConfigError, ConfigErrorKind, ConnectionError, ConnectionErrorKind, Error, QueryError,
    QueryErrorKind, Result, TransactionError, TransactionErrorKind, TypeError,
};
pub use identity::{KeyValue, ObjectIdentity};
pub use model::{Entity, Handle, ObjectRef};
pub use relationship::{
    EntityFn, Fetched, JoinSide, Lazy, ManyToMany, Related, RelatedMany, RelationshipDescriptor,
    RelationshipKind, validate_inverse,
};
pub use row::{ColumnInfo, ResultSet, Row};
pub use types::SqlType;
pub use value::Value;

#[cfg(test)]
pub(crate) mod fixtures;
