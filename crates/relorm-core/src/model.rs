//! Entity trait and shared entity handles.
//!
//! Entities live behind [`Handle`]s (`Rc<RefCell<T>>`) so a graph of related
//! objects can share and point back at the same instance. The engine walks a
//! graph through [`ObjectRef`], a type-erased handle that remembers its
//! entity's descriptor.

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::Result;
use crate::descriptor::EntityDescriptor;
use crate::error::{Error, TypeError};
use crate::value::Value;

/// Shared, mutable handle to an entity instance.
pub type Handle<T> = Rc<RefCell<T>>;

/// A type mapped to a table.
///
/// `Default` provides the zero-value instance populated when a row is read.
///
/// ```ignore
/// impl Entity for Author {
///     fn descriptor() -> &'static EntityDescriptor {
///         static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
///         DESCRIPTOR.get_or_init(|| {
///             EntityDescriptor::builder::<Author>("author")
///                 .primary_key("id", |a| a.id, |a, v| a.id = v)
///                 .auto_increment()
///                 .column("name", |a| a.name.clone(), |a, v| a.name = v)
///                 .build()
///         })
///     }
/// }
/// ```
pub trait Entity: Any + Default {
    /// Mapping metadata, built once per type.
    fn descriptor() -> &'static EntityDescriptor;

    /// Wrap this instance in a new [`Handle`].
    fn into_handle(self) -> Handle<Self>
    where
        Self: Sized,
    {
        Rc::new(RefCell::new(self))
    }
}

/// Type-erased entity handle.
///
/// Two `ObjectRef`s are the same object when [`ObjectRef::ptr_eq`] holds;
/// this is the in-memory identity of instances that have no key yet.
#[derive(Clone)]
pub struct ObjectRef {
    cell: Rc<RefCell<dyn Any>>,
    handle: Rc<dyn Any>,
    descriptor: &'static EntityDescriptor,
}

impl ObjectRef {
    pub fn new<T: Entity>(handle: &Handle<T>) -> Self {
        let cell: Rc<RefCell<dyn Any>> = handle.clone();
        let erased: Rc<dyn Any> = handle.clone();
        Self {
            cell,
            handle: erased,
            descriptor: T::descriptor(),
        }
    }

    pub fn descriptor(&self) -> &'static EntityDescriptor {
        self.descriptor
    }

    /// Recover the typed handle.
    pub fn downcast<T: Entity>(&self) -> Result<Handle<T>> {
        Rc::clone(&self.handle)
            .downcast::<RefCell<T>>()
            .map_err(|_| {
                Error::Type(TypeError {
                    expected: std::any::type_name::<T>(),
                    actual: self.descriptor.type_name().to_string(),
                    column: None,
                    rust_type: Some(std::any::type_name::<T>()),
                })
            })
    }

    pub fn borrow(&self) -> Result<Ref<'_, dyn Any>> {
        self.cell.try_borrow().map_err(|_| self.busy())
    }

    pub fn borrow_mut(&self) -> Result<RefMut<'_, dyn Any>> {
        self.cell.try_borrow_mut().map_err(|_| self.busy())
    }

    /// Current primary-key value, `Value::Null` when unset.
    pub fn key(&self) -> Result<Value> {
        self.descriptor.read_key(&*self.borrow()?)
    }

    /// Whether this instance has a primary-key value.
    pub fn has_key(&self) -> Result<bool> {
        Ok(!self.key()?.is_null())
    }

    /// Same in-memory instance.
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        self.address() == other.address()
    }

    /// Address of the shared instance.
    pub fn address(&self) -> usize {
        Rc::as_ptr(&self.handle).cast::<()>() as usize
    }

    fn busy(&self) -> Error {
        Error::Custom(format!(
            "{} instance is already mutably borrowed",
            self.descriptor.table()
        ))
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("table", &self.descriptor.table())
            .field("address", &format_args!("{:#x}", self.address()))
            .finish()
    }
}

/// Downcast a type-erased entity reference.
pub(crate) fn entity_ref<T: Entity>(value: &dyn Any) -> Result<&T> {
    value.downcast_ref::<T>().ok_or_else(|| mismatch::<T>())
}

/// Downcast a type-erased mutable entity reference.
pub(crate) fn entity_mut<T: Entity>(value: &mut dyn Any) -> Result<&mut T> {
    value.downcast_mut::<T>().ok_or_else(|| mismatch::<T>())
}

fn mismatch<T>() -> Error {
    Error::Type(TypeError {
        expected: std::any::type_name::<T>(),
        actual: "instance of another entity type".to_string(),
        column: None,
        rust_type: Some(std::any::type_name::<T>()),
    })
}
