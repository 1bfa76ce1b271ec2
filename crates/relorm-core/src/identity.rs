//! Object identity: which persisted row (or which unsaved instance) an
//! in-memory object stands for.

use std::any::TypeId;

use crate::Result;
use crate::descriptor::EntityDescriptor;
use crate::model::ObjectRef;
use crate::value::Value;

/// Hashable form of a primary-key value.
///
/// Integer widths are normalized so a key read back from the store as a
/// 64-bit integer matches the same key held in memory as a narrower type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyValue {
    Int(i64),
    /// Floating-point keys compare by bit pattern.
    Real(u64),
    Text(String),
    Bytes(Vec<u8>),
}

impl KeyValue {
    /// `None` for NULL, which is an unset key.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(v) => Some(KeyValue::Int(i64::from(*v))),
            Value::TinyInt(_) | Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_) => {
                value.as_i64().map(KeyValue::Int)
            }
            Value::Float(v) => Some(KeyValue::Real(f64::from(*v).to_bits())),
            Value::Double(v) => Some(KeyValue::Real(v.to_bits())),
            Value::Text(v) => Some(KeyValue::Text(v.clone())),
            Value::Bytes(v) => Some(KeyValue::Bytes(v.clone())),
        }
    }
}

/// Identity of an object within a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectIdentity {
    /// A row: entity type plus primary key.
    Persisted { entity: TypeId, key: KeyValue },
    /// An instance without a key, identified by its address.
    Transient { entity: TypeId, address: usize },
}

impl ObjectIdentity {
    /// Identity of the row `key` of `entity`. `None` for a NULL key.
    pub fn keyed(entity: &EntityDescriptor, key: &Value) -> Option<Self> {
        KeyValue::from_value(key).map(|key| ObjectIdentity::Persisted {
            entity: entity.type_id(),
            key,
        })
    }

    /// Address-based identity of `object`, whether or not it has a key.
    pub fn transient(object: &ObjectRef) -> Self {
        ObjectIdentity::Transient {
            entity: object.descriptor().type_id(),
            address: object.address(),
        }
    }

    /// Keyed identity when `object` has a key, address-based otherwise.
    pub fn of(object: &ObjectRef) -> Result<Self> {
        let key = object.key()?;
        Ok(Self::keyed(object.descriptor(), &key).unwrap_or_else(|| Self::transient(object)))
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, ObjectIdentity::Persisted { .. })
    }
}
