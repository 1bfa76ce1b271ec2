//! Type adapters: scalar field types to storage columns and back.
//!
//! A [`TypeAdapterRegistry`] maps a Rust field type (by `TypeId`) to a
//! [`TypeAdapter`] that knows the column type to declare and how to convert
//! one value in each direction. The registry starts with adapters for the
//! primitive families, text, bytes and dates; applications register their
//! own newtypes with [`TypeAdapterRegistry::register`].

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::Result;
use crate::error::{ConfigErrorKind, Error, TypeError};
use crate::row::Row;
use crate::types::SqlType;
use crate::value::Value;

/// Timestamp encoding: ISO-8601, UTC, millisecond precision.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Date encoding: ISO-8601 calendar date.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Converts values of one field type to and from column values.
pub trait TypeAdapter: Send + Sync {
    /// Column type declared in DDL for this field type.
    fn column_type(&self) -> SqlType;

    /// Convert a field value into its column value.
    fn to_column_value(&self, value: &dyn Any) -> Result<Value>;

    /// Convert a non-NULL column value into a boxed field value.
    fn decode(&self, value: &Value) -> Result<Box<dyn Any>>;

    /// Read column `index` of `row`. NULL columns yield `None`.
    fn from_row(&self, row: &Row, index: usize) -> Result<Option<Box<dyn Any>>> {
        match row.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => self.decode(value).map(Some),
        }
    }
}

/// A field type with a fixed column mapping.
///
/// Implementing this is the shortest way to give a newtype an adapter:
/// `registry.register::<Email>(ScalarAdapter::<Email>::new())`.
pub trait Scalar: Clone + 'static {
    /// Column type declared in DDL.
    const SQL_TYPE: SqlType;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self>;
}

/// [`TypeAdapter`] for any [`Scalar`] type.
pub struct ScalarAdapter<T>(PhantomData<fn() -> T>);

impl<T> ScalarAdapter<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for ScalarAdapter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar> TypeAdapter for ScalarAdapter<T> {
    fn column_type(&self) -> SqlType {
        T::SQL_TYPE
    }

    fn to_column_value(&self, value: &dyn Any) -> Result<Value> {
        value
            .downcast_ref::<T>()
            .map(Scalar::to_value)
            .ok_or_else(|| {
                Error::Type(TypeError {
                    expected: std::any::type_name::<T>(),
                    actual: "value of another type".to_string(),
                    column: None,
                    rust_type: Some(std::any::type_name::<T>()),
                })
            })
    }

    fn decode(&self, value: &Value) -> Result<Box<dyn Any>> {
        T::from_value(value.clone()).map(|v| Box::new(v) as Box<dyn Any>)
    }
}

macro_rules! scalar_via_value {
    ($($ty:ty => $sql:expr),* $(,)?) => {
        $(
            impl Scalar for $ty {
                const SQL_TYPE: SqlType = $sql;

                fn to_value(&self) -> Value {
                    Value::from(self.clone())
                }

                fn from_value(value: Value) -> Result<Self> {
                    <$ty>::try_from(value)
                }
            }
        )*
    };
}

scalar_via_value! {
    bool => SqlType::Boolean,
    i8 => SqlType::TinyInt,
    u8 => SqlType::SmallInt,
    i16 => SqlType::SmallInt,
    u16 => SqlType::Integer,
    i32 => SqlType::Integer,
    u32 => SqlType::Integer,
    i64 => SqlType::Integer,
    f32 => SqlType::Real,
    f64 => SqlType::Double,
    String => SqlType::Text,
    Vec<u8> => SqlType::Blob,
}

fn text_mismatch(expected: &'static str, value: &Value, detail: impl fmt::Display) -> Error {
    Error::Type(TypeError {
        expected,
        actual: format!("{} ({})", value.type_name(), detail),
        column: None,
        rust_type: Some(expected),
    })
}

impl Scalar for char {
    const SQL_TYPE: SqlType = SqlType::Char(1);

    fn to_value(&self) -> Value {
        Value::Text(self.to_string())
    }

    fn from_value(value: Value) -> Result<Self> {
        let mut chars = value.as_str().map(str::chars);
        match chars.as_mut().map(|c| (c.next(), c.next())) {
            Some((Some(c), None)) => Ok(c),
            _ => Err(text_mismatch("char", &value, "expected exactly one character")),
        }
    }
}

/// Encode a timestamp the way the built-in adapter stores it.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Decode a stored ISO-8601 timestamp.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| text_mismatch("DateTime<Utc>", &Value::Text(text.to_string()), e))
}

impl Scalar for DateTime<Utc> {
    const SQL_TYPE: SqlType = SqlType::Timestamp;

    fn to_value(&self) -> Value {
        Value::Text(format_timestamp(self))
    }

    fn from_value(value: Value) -> Result<Self> {
        match &value {
            Value::Text(text) => parse_timestamp(text),
            other => Err(text_mismatch("DateTime<Utc>", other, "not text")),
        }
    }
}

impl Scalar for NaiveDate {
    const SQL_TYPE: SqlType = SqlType::Date;

    fn to_value(&self) -> Value {
        Value::Text(self.format(DATE_FORMAT).to_string())
    }

    fn from_value(value: Value) -> Result<Self> {
        match &value {
            Value::Text(text) => NaiveDate::parse_from_str(text, DATE_FORMAT)
                .map_err(|e| text_mismatch("NaiveDate", &value, e)),
            other => Err(text_mismatch("NaiveDate", other, "not text")),
        }
    }
}

struct Registered {
    type_name: &'static str,
    adapter: Arc<dyn TypeAdapter>,
}

/// Field type to adapter lookup.
pub struct TypeAdapterRegistry {
    adapters: HashMap<TypeId, Registered>,
}

impl TypeAdapterRegistry {
    /// An empty registry with no adapters.
    pub fn empty() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// A registry holding the built-in adapters.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_scalar::<bool>();
        registry.register_scalar::<i8>();
        registry.register_scalar::<u8>();
        registry.register_scalar::<i16>();
        registry.register_scalar::<u16>();
        registry.register_scalar::<i32>();
        registry.register_scalar::<u32>();
        registry.register_scalar::<i64>();
        registry.register_scalar::<f32>();
        registry.register_scalar::<f64>();
        registry.register_scalar::<char>();
        registry.register_scalar::<String>();
        registry.register_scalar::<Vec<u8>>();
        registry.register_scalar::<DateTime<Utc>>();
        registry.register_scalar::<NaiveDate>();
        registry
    }

    /// Register `adapter` for field type `T`. Any prior adapter for `T` is
    /// replaced and returned.
    pub fn register<T: 'static>(
        &mut self,
        adapter: impl TypeAdapter + 'static,
    ) -> Option<Arc<dyn TypeAdapter>> {
        self.adapters
            .insert(
                TypeId::of::<T>(),
                Registered {
                    type_name: std::any::type_name::<T>(),
                    adapter: Arc::new(adapter),
                },
            )
            .map(|previous| {
                tracing::debug!(
                    field_type = previous.type_name,
                    "replacing registered type adapter"
                );
                previous.adapter
            })
    }

    /// Register the [`ScalarAdapter`] for `T`.
    pub fn register_scalar<T: Scalar>(&mut self) {
        self.register::<T>(ScalarAdapter::<T>::new());
    }

    /// Adapter for `T`.
    pub fn resolve<T: 'static>(&self) -> Result<Arc<dyn TypeAdapter>> {
        self.resolve_id(TypeId::of::<T>(), std::any::type_name::<T>())
    }

    /// Adapter for the type identified by `type_id`. `type_name` is only used
    /// in the error message.
    pub fn resolve_id(&self, type_id: TypeId, type_name: &str) -> Result<Arc<dyn TypeAdapter>> {
        self.adapters
            .get(&type_id)
            .map(|r| Arc::clone(&r.adapter))
            .ok_or_else(|| {
                Error::config(
                    ConfigErrorKind::UnmappedType,
                    format!("no type adapter registered for {type_name}"),
                )
            })
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.adapters.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl Default for TypeAdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeAdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.adapters.values().map(|r| r.type_name).collect();
        names.sort_unstable();
        f.debug_struct("TypeAdapterRegistry")
            .field("types", &names)
            .finish()
    }
}
