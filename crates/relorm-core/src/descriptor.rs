//! Entity and property descriptors.
//!
//! An [`EntityDescriptor`] is the static mapping table for one entity type:
//! table name, ordered properties with typed accessors, primary key, cascade
//! mode and laziness. Descriptors are built once with [`EntityBuilder`] and
//! live for the whole program, so the engine never inspects types at runtime
//! beyond `TypeId` comparisons.

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;

use crate::Result;
use crate::adapter::Scalar;
use crate::error::{ConfigErrorKind, Error, TypeError};
use crate::model::{Entity, ObjectRef, entity_mut, entity_ref};
use crate::relationship::{
    EntityFn, Fetched, Lazy, ManyToMany, Related, RelatedMany, RelationshipDescriptor,
    RelationshipKind,
};
use crate::value::Value;

/// Whether persisting an entity also persists what it refers to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CascadeMode {
    /// Only the entity's own row is written.
    None,
    /// Foreign keys and join rows are written for related objects that
    /// already have keys; related rows themselves are not written.
    Keys,
    /// Related objects are persisted recursively, then linked.
    #[default]
    All,
}

impl CascadeMode {
    /// Related objects are written before linking.
    pub const fn persists_related(self) -> bool {
        matches!(self, CascadeMode::All)
    }

    /// Relationship links beyond one-to-one are written.
    pub const fn links_related(self) -> bool {
        !matches!(self, CascadeMode::None)
    }
}

/// Field type of a column, used to resolve its type adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldType {
    pub id: TypeId,
    pub name: &'static str,
}

impl FieldType {
    pub fn of<F: 'static>() -> Self {
        Self {
            id: TypeId::of::<F>(),
            name: std::any::type_name::<F>(),
        }
    }
}

type ReadFn = Box<dyn Fn(&dyn Any) -> Result<Option<Box<dyn Any>>> + Send + Sync>;
type WriteFn = Box<dyn Fn(&mut dyn Any, Option<Box<dyn Any>>) -> Result<()> + Send + Sync>;
type PeekOneFn = Box<dyn Fn(&dyn Any) -> Result<Option<Option<ObjectRef>>> + Send + Sync>;
type AssignOneFn = Box<dyn Fn(&mut dyn Any, Fetched<Option<ObjectRef>>) -> Result<()> + Send + Sync>;
type PeekManyFn = Box<dyn Fn(&dyn Any) -> Result<Option<Vec<ObjectRef>>> + Send + Sync>;
type AssignManyFn = Box<dyn Fn(&mut dyn Any, Fetched<Vec<ObjectRef>>) -> Result<()> + Send + Sync>;
type KeyReadFn = Box<dyn Fn(&dyn Any) -> Result<Value> + Send + Sync>;
type KeyWriteFn = Box<dyn Fn(&mut dyn Any, Value) -> Result<()> + Send + Sync>;

enum Access {
    Column { read: ReadFn, write: WriteFn },
    /// A foreign-key column with no field behind it; written only through
    /// the relationship on the other entity.
    ForeignKey { references: EntityFn },
    ToOne { peek: PeekOneFn, assign: AssignOneFn },
    ToMany { peek: PeekManyFn, assign: AssignManyFn },
}

/// One mapped property of an entity.
pub struct PropertyDescriptor {
    name: &'static str,
    column: Option<&'static str>,
    field_type: Option<FieldType>,
    nullable: bool,
    unique: bool,
    primary_key: bool,
    auto_increment: bool,
    relationship: Option<RelationshipDescriptor>,
    access: Access,
}

impl PropertyDescriptor {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Column in the owner's table, if this property has one.
    pub fn column(&self) -> Option<&'static str> {
        self.column
    }

    /// Declared field type of a scalar column.
    pub fn field_type(&self) -> Option<FieldType> {
        self.field_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_auto_increment(&self) -> bool {
        self.auto_increment
    }

    pub fn is_relationship(&self) -> bool {
        self.relationship.is_some()
    }

    pub fn relationship(&self) -> Option<&RelationshipDescriptor> {
        self.relationship.as_ref()
    }

    /// A scalar column backed by a field.
    pub fn is_scalar(&self) -> bool {
        matches!(self.access, Access::Column { .. })
    }

    /// Field type whose adapter decides this column's storage type. Foreign
    /// keys take the type of the referenced primary key.
    pub fn storage_type(&self) -> Result<Option<FieldType>> {
        let references = match (&self.access, &self.relationship) {
            (Access::Column { .. }, _) => return Ok(self.field_type),
            (Access::ForeignKey { references }, _) => *references,
            (_, Some(RelationshipDescriptor::OneToOne {
                related,
                owning_side: true,
                ..
            }))
            | (_, Some(RelationshipDescriptor::ManyToOne { related, .. })) => *related,
            _ => return Ok(None),
        };
        let key = references().primary_key()?;
        Ok(key.field_type)
    }

    /// Read a scalar column's field value. `None` is NULL.
    pub fn read(&self, entity: &dyn Any) -> Result<Option<Box<dyn Any>>> {
        match &self.access {
            Access::Column { read, .. } => read(entity),
            _ => Err(self.wrong_access("a scalar column")),
        }
    }

    /// Store a decoded column value into the field.
    pub fn write(&self, entity: &mut dyn Any, value: Option<Box<dyn Any>>) -> Result<()> {
        match &self.access {
            Access::Column { write, .. } => write(entity, value),
            _ => Err(self.wrong_access("a scalar column")),
        }
    }

    /// Current to-one value; `None` when it has not been loaded.
    pub fn peek_one(&self, entity: &dyn Any) -> Result<Option<Option<ObjectRef>>> {
        match &self.access {
            Access::ToOne { peek, .. } => peek(entity),
            _ => Err(self.wrong_access("a to-one relationship")),
        }
    }

    pub fn assign_one(&self, entity: &mut dyn Any, value: Fetched<Option<ObjectRef>>) -> Result<()> {
        match &self.access {
            Access::ToOne { assign, .. } => assign(entity, value),
            _ => Err(self.wrong_access("a to-one relationship")),
        }
    }

    /// Current to-many value; `None` when it has not been loaded.
    pub fn peek_many(&self, entity: &dyn Any) -> Result<Option<Vec<ObjectRef>>> {
        match &self.access {
            Access::ToMany { peek, .. } => peek(entity),
            _ => Err(self.wrong_access("a to-many relationship")),
        }
    }

    pub fn assign_many(&self, entity: &mut dyn Any, value: Fetched<Vec<ObjectRef>>) -> Result<()> {
        match &self.access {
            Access::ToMany { assign, .. } => assign(entity, value),
            _ => Err(self.wrong_access("a to-many relationship")),
        }
    }

    fn wrong_access(&self, expected: &str) -> Error {
        Error::Custom(format!("property '{}' is not {}", self.name, expected))
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("column", &self.column)
            .field("nullable", &self.nullable)
            .field("unique", &self.unique)
            .field("primary_key", &self.primary_key)
            .field("auto_increment", &self.auto_increment)
            .field("relationship", &self.relationship.as_ref().map(|r| r.kind()))
            .finish_non_exhaustive()
    }
}

struct KeyAccess {
    read: KeyReadFn,
    write: KeyWriteFn,
}

/// Mapping metadata for one entity type.
pub struct EntityDescriptor {
    type_id: TypeId,
    type_name: &'static str,
    table: &'static str,
    properties: Vec<PropertyDescriptor>,
    primary_key: Option<usize>,
    key: Option<KeyAccess>,
    cascade: CascadeMode,
    lazy: bool,
    many_to_many: Vec<usize>,
    allocate: fn() -> ObjectRef,
}

impl EntityDescriptor {
    /// Start describing entity `T` stored in `table`.
    pub fn builder<T: Entity>(table: &'static str) -> EntityBuilder<T> {
        EntityBuilder {
            table,
            properties: Vec::new(),
            primary_key: None,
            key: None,
            cascade: CascadeMode::default(),
            lazy: false,
            _entity: PhantomData,
        }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether both descriptors describe the same Rust type.
    pub fn same_type(&self, other: &EntityDescriptor) -> bool {
        self.type_id == other.type_id
    }

    /// Properties in declaration order.
    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn primary_key(&self) -> Result<&PropertyDescriptor> {
        self.primary_key
            .map(|i| &self.properties[i])
            .ok_or_else(|| {
                Error::config(
                    ConfigErrorKind::MissingPrimaryKey,
                    format!("{} ({}) declares no primary key", self.table, self.type_name),
                )
            })
    }

    /// Primary-key column name.
    pub fn key_column(&self) -> Result<&'static str> {
        let key = self.primary_key()?;
        key.column.ok_or_else(|| {
            Error::config(
                ConfigErrorKind::MissingPrimaryKey,
                format!("{} primary key has no column", self.table),
            )
        })
    }

    pub fn has_auto_increment_key(&self) -> bool {
        self.primary_key
            .is_some_and(|i| self.properties[i].auto_increment)
    }

    pub fn cascade(&self) -> CascadeMode {
        self.cascade
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    /// Relationship properties in declaration order.
    pub fn relationships(
        &self,
    ) -> impl Iterator<Item = (&PropertyDescriptor, &RelationshipDescriptor)> {
        self.properties
            .iter()
            .filter_map(|p| p.relationship.as_ref().map(|r| (p, r)))
    }

    /// Many-to-many relationships of this entity.
    pub fn many_to_many(&self) -> impl Iterator<Item = &ManyToMany> {
        self.many_to_many.iter().filter_map(|&i| {
            self.properties[i]
                .relationship
                .as_ref()
                .and_then(RelationshipDescriptor::as_many_to_many)
        })
    }

    /// A new zero-value instance.
    pub fn allocate(&self) -> ObjectRef {
        (self.allocate)()
    }

    /// Primary-key value of `entity`, `Value::Null` when unset.
    pub fn read_key(&self, entity: &dyn Any) -> Result<Value> {
        match &self.key {
            Some(key) => (key.read)(entity),
            None => Err(self.primary_key().err().unwrap_or_else(|| {
                Error::Custom(format!("{} has no key accessor", self.table))
            })),
        }
    }

    /// Store a primary-key value (e.g. a generated id) into `entity`.
    pub fn assign_key(&self, entity: &mut dyn Any, value: Value) -> Result<()> {
        match &self.key {
            Some(key) => (key.write)(entity, value),
            None => Err(self.primary_key().err().unwrap_or_else(|| {
                Error::Custom(format!("{} has no key accessor", self.table))
            })),
        }
    }
}

impl fmt::Debug for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("table", &self.table)
            .field("type_name", &self.type_name)
            .field("properties", &self.properties)
            .field("cascade", &self.cascade)
            .field("lazy", &self.lazy)
            .finish_non_exhaustive()
    }
}

fn allocate<T: Entity>() -> ObjectRef {
    ObjectRef::new(&T::default().into_handle())
}

fn unexpected_null<F>(column: &'static str) -> Error {
    Error::Type(TypeError {
        expected: std::any::type_name::<F>(),
        actual: "NULL".to_string(),
        column: Some(column.to_string()),
        rust_type: Some(std::any::type_name::<F>()),
    })
}

fn unbox<F: 'static>(column: &'static str, value: Box<dyn Any>) -> Result<F> {
    value.downcast::<F>().map(|v| *v).map_err(|_| {
        Error::Type(TypeError {
            expected: std::any::type_name::<F>(),
            actual: "value of another type".to_string(),
            column: Some(column.to_string()),
            rust_type: Some(std::any::type_name::<F>()),
        })
    })
}

fn typed_one<R: Entity>(value: Option<ObjectRef>) -> Result<Option<crate::Handle<R>>> {
    value.map(|o| o.downcast::<R>()).transpose()
}

fn typed_many<R: Entity>(values: Vec<ObjectRef>) -> Result<Vec<crate::Handle<R>>> {
    values.iter().map(ObjectRef::downcast::<R>).collect()
}

/// Builder for an [`EntityDescriptor`].
///
/// Modifiers such as [`unique`](Self::unique) apply to the most recently
/// added property.
pub struct EntityBuilder<T> {
    table: &'static str,
    properties: Vec<PropertyDescriptor>,
    primary_key: Option<usize>,
    key: Option<KeyAccess>,
    cascade: CascadeMode,
    lazy: bool,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> EntityBuilder<T> {
    /// Declare the primary key. An unset key is `None`.
    pub fn primary_key<F: Scalar>(
        mut self,
        column: &'static str,
        get: fn(&T) -> Option<F>,
        set: fn(&mut T, Option<F>),
    ) -> Self {
        self.key = Some(KeyAccess {
            read: Box::new(move |entity| {
                Ok(get(entity_ref::<T>(entity)?)
                    .map_or(Value::Null, |key| key.to_value()))
            }),
            write: Box::new(move |entity, value| {
                let key = if value.is_null() {
                    None
                } else {
                    Some(F::from_value(value)?)
                };
                set(entity_mut::<T>(entity)?, key);
                Ok(())
            }),
        });
        self.primary_key = Some(self.properties.len());
        self.push_nullable(column, get, set, false);
        if let Some(key) = self.properties.last_mut() {
            key.primary_key = true;
        }
        self
    }

    /// Mark the primary key as generated by the store.
    pub fn auto_increment(mut self) -> Self {
        if let Some(i) = self.primary_key {
            self.properties[i].auto_increment = true;
        }
        self
    }

    /// A NOT NULL column.
    pub fn column<F: 'static>(
        mut self,
        column: &'static str,
        get: fn(&T) -> F,
        set: fn(&mut T, F),
    ) -> Self {
        self.properties.push(PropertyDescriptor {
            name: column,
            column: Some(column),
            field_type: Some(FieldType::of::<F>()),
            nullable: false,
            unique: false,
            primary_key: false,
            auto_increment: false,
            relationship: None,
            access: Access::Column {
                read: Box::new(move |entity| {
                    Ok(Some(Box::new(get(entity_ref::<T>(entity)?)) as Box<dyn Any>))
                }),
                write: Box::new(move |entity, value| {
                    let value = value.ok_or_else(|| unexpected_null::<F>(column))?;
                    set(entity_mut::<T>(entity)?, unbox::<F>(column, value)?);
                    Ok(())
                }),
            },
        });
        self
    }

    /// A nullable column backed by an `Option` field.
    pub fn nullable<F: 'static>(
        mut self,
        column: &'static str,
        get: fn(&T) -> Option<F>,
        set: fn(&mut T, Option<F>),
    ) -> Self {
        self.push_nullable(column, get, set, true);
        self
    }

    fn push_nullable<F: 'static>(
        &mut self,
        column: &'static str,
        get: fn(&T) -> Option<F>,
        set: fn(&mut T, Option<F>),
        nullable: bool,
    ) {
        self.properties.push(PropertyDescriptor {
            name: column,
            column: Some(column),
            field_type: Some(FieldType::of::<F>()),
            nullable,
            unique: false,
            primary_key: false,
            auto_increment: false,
            relationship: None,
            access: Access::Column {
                read: Box::new(move |entity| {
                    Ok(get(entity_ref::<T>(entity)?).map(|v| Box::new(v) as Box<dyn Any>))
                }),
                write: Box::new(move |entity, value| {
                    let value = value.map(|v| unbox::<F>(column, v)).transpose()?;
                    set(entity_mut::<T>(entity)?, value);
                    Ok(())
                }),
            },
        });
    }

    /// Add the last column to the table's UNIQUE constraint.
    pub fn unique(mut self) -> Self {
        if let Some(last) = self.properties.last_mut() {
            last.unique = true;
        }
        self
    }

    /// A foreign-key column referencing `R` that has no field on this entity,
    /// such as the many side of a one-to-many mapped only on the owner.
    pub fn foreign_key<R: Entity>(mut self, column: &'static str) -> Self {
        self.properties.push(PropertyDescriptor {
            name: column,
            column: Some(column),
            field_type: None,
            nullable: true,
            unique: false,
            primary_key: false,
            auto_increment: false,
            relationship: None,
            access: Access::ForeignKey {
                references: R::descriptor,
            },
        });
        self
    }

    /// One-to-one. With `owning_side` the foreign key is a column of this
    /// entity's table, otherwise it lives in `R`'s table.
    pub fn one_to_one<R: Entity>(
        self,
        name: &'static str,
        foreign_key: &'static str,
        owning_side: bool,
        get: fn(&T) -> &Related<R>,
        get_mut: fn(&mut T) -> &mut Related<R>,
    ) -> Self {
        let relationship = RelationshipDescriptor::OneToOne {
            owner: T::descriptor,
            related: R::descriptor,
            foreign_key,
            owning_side,
        };
        let column = owning_side.then_some(foreign_key);
        self.to_one(name, column, relationship, get, get_mut)
    }

    /// Many-to-one; the foreign key is a column of this entity's table.
    pub fn many_to_one<R: Entity>(
        self,
        name: &'static str,
        foreign_key: &'static str,
        get: fn(&T) -> &Related<R>,
        get_mut: fn(&mut T) -> &mut Related<R>,
    ) -> Self {
        let relationship = RelationshipDescriptor::ManyToOne {
            owner: T::descriptor,
            related: R::descriptor,
            foreign_key,
        };
        self.to_one(name, Some(foreign_key), relationship, get, get_mut)
    }

    /// One-to-many; `foreign_key` is a column of `R`'s table.
    pub fn one_to_many<R: Entity>(
        self,
        name: &'static str,
        foreign_key: &'static str,
        get: fn(&T) -> &RelatedMany<R>,
        get_mut: fn(&mut T) -> &mut RelatedMany<R>,
    ) -> Self {
        let relationship = RelationshipDescriptor::OneToMany {
            owner: T::descriptor,
            many: R::descriptor,
            foreign_key,
        };
        self.to_many(name, relationship, get, get_mut)
    }

    /// Many-to-many through `relation`'s join table.
    pub fn many_to_many<R: Entity>(
        mut self,
        name: &'static str,
        relation: ManyToMany,
        get: fn(&T) -> &RelatedMany<R>,
        get_mut: fn(&mut T) -> &mut RelatedMany<R>,
    ) -> Self {
        self = self.to_many(name, RelationshipDescriptor::ManyToMany(relation), get, get_mut);
        self
    }

    fn to_one<R: Entity>(
        mut self,
        name: &'static str,
        column: Option<&'static str>,
        relationship: RelationshipDescriptor,
        get: fn(&T) -> &Related<R>,
        get_mut: fn(&mut T) -> &mut Related<R>,
    ) -> Self {
        self.properties.push(PropertyDescriptor {
            name,
            column,
            field_type: None,
            nullable: true,
            unique: false,
            primary_key: false,
            auto_increment: false,
            relationship: Some(relationship),
            access: Access::ToOne {
                peek: Box::new(move |entity| {
                    let related = get(entity_ref::<T>(entity)?);
                    Ok(related
                        .get()
                        .map(|value| value.as_ref().map(ObjectRef::new)))
                }),
                assign: Box::new(move |entity, value| {
                    let lazy = match value {
                        Fetched::Ready(value) => Lazy::loaded(typed_one::<R>(value)?),
                        Fetched::Deferred(load) => {
                            Lazy::deferred(move || load().and_then(typed_one::<R>))
                        }
                    };
                    *get_mut(entity_mut::<T>(entity)?) = lazy;
                    Ok(())
                }),
            },
        });
        self
    }

    fn to_many<R: Entity>(
        mut self,
        name: &'static str,
        relationship: RelationshipDescriptor,
        get: fn(&T) -> &RelatedMany<R>,
        get_mut: fn(&mut T) -> &mut RelatedMany<R>,
    ) -> Self {
        self.properties.push(PropertyDescriptor {
            name,
            column: None,
            field_type: None,
            nullable: true,
            unique: false,
            primary_key: false,
            auto_increment: false,
            relationship: Some(relationship),
            access: Access::ToMany {
                peek: Box::new(move |entity| {
                    let related = get(entity_ref::<T>(entity)?);
                    Ok(related
                        .get()
                        .map(|items| items.iter().map(ObjectRef::new).collect()))
                }),
                assign: Box::new(move |entity, value| {
                    let lazy = match value {
                        Fetched::Ready(values) => Lazy::loaded(typed_many::<R>(values)?),
                        Fetched::Deferred(load) => {
                            Lazy::deferred(move || load().and_then(typed_many::<R>))
                        }
                    };
                    *get_mut(entity_mut::<T>(entity)?) = lazy;
                    Ok(())
                }),
            },
        });
        self
    }

    pub fn cascade(mut self, mode: CascadeMode) -> Self {
        self.cascade = mode;
        self
    }

    /// Load this entity's relationships on first access instead of eagerly.
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn build(self) -> EntityDescriptor {
        let many_to_many = self
            .properties
            .iter()
            .enumerate()
            .filter(|(_, p)| {
                p.relationship
                    .as_ref()
                    .is_some_and(|r| r.kind() == RelationshipKind::ManyToMany)
            })
            .map(|(i, _)| i)
            .collect();
        EntityDescriptor {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            table: self.table,
            properties: self.properties,
            primary_key: self.primary_key,
            key: self.key,
            cascade: self.cascade,
            lazy: self.lazy,
            many_to_many,
            allocate: allocate::<T>,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Club, MEMBERSHIP, Passport, Person};
    use crate::identity::ObjectIdentity;
    use crate::relationship::{JoinSide, validate_inverse};
    use std::rc::Rc;

    #[test]
    fn properties_keep_declaration_order() {
        let person = Person::descriptor();
        let names: Vec<_> = person.properties().iter().map(|p| p.name()).collect();
        assert_eq!(names, ["id", "name", "nickname", "passport", "clubs"]);
        assert_eq!(person.key_column().unwrap(), "id");
        assert!(person.has_auto_increment_key());
        assert!(person.property("name").unwrap().is_unique());
        assert!(person.property("nickname").unwrap().is_nullable());
        assert!(!person.property("name").unwrap().is_nullable());
        assert_eq!(person.many_to_many().count(), 1);
        assert_eq!(person.cascade(), CascadeMode::All);
        assert!(Club::descriptor().is_lazy());
    }

    #[test]
    fn foreign_key_columns_take_referenced_key_type() {
        let passport = Person::descriptor().property("passport").unwrap();
        assert_eq!(passport.column(), Some("passport_number"));
        assert_eq!(
            passport.storage_type().unwrap(),
            Some(FieldType::of::<String>())
        );

        let holder = Passport::descriptor().property("holder").unwrap();
        assert_eq!(holder.column(), None);
        assert_eq!(holder.storage_type().unwrap(), None);
    }

    #[test]
    fn columns_read_and_write_through_erased_access() {
        let person = Person::descriptor();
        let handle = Person {
            name: "Ada".to_string(),
            ..Person::default()
        }
        .into_handle();
        let object = ObjectRef::new(&handle);

        let name = person.property("name").unwrap();
        let value = name.read(&*object.borrow().unwrap()).unwrap().unwrap();
        assert_eq!(value.downcast_ref::<String>().unwrap(), "Ada");

        let nickname = person.property("nickname").unwrap();
        assert!(nickname.read(&*object.borrow().unwrap()).unwrap().is_none());
        nickname
            .write(
                &mut *object.borrow_mut().unwrap(),
                Some(Box::new("Countess".to_string())),
            )
            .unwrap();
        assert_eq!(handle.borrow().nickname.as_deref(), Some("Countess"));

        let err = name.write(&mut *object.borrow_mut().unwrap(), None).unwrap_err();
        assert!(matches!(err, Error::Type(_)));
        assert!(name.peek_one(&*object.borrow().unwrap()).is_err());
    }

    #[test]
    fn key_assignment_changes_identity() {
        let handle = Person::default().into_handle();
        let object = ObjectRef::new(&handle);
        assert!(!object.has_key().unwrap());
        assert!(!ObjectIdentity::of(&object).unwrap().is_persisted());

        Person::descriptor()
            .assign_key(&mut *object.borrow_mut().unwrap(), Value::BigInt(9))
            .unwrap();
        assert_eq!(handle.borrow().id, Some(9));
        assert_eq!(
            ObjectIdentity::of(&object).unwrap(),
            ObjectIdentity::keyed(Person::descriptor(), &Value::Int(9)).unwrap()
        );
    }

    #[test]
    fn relationships_assign_and_peek() {
        let club = Club {
            title: "Chess".to_string(),
            ..Club::default()
        }
        .into_handle();
        let person = Person::default().into_handle();
        let object = ObjectRef::new(&person);
        let clubs = Person::descriptor().property("clubs").unwrap();

        clubs
            .assign_many(
                &mut *object.borrow_mut().unwrap(),
                Fetched::Ready(vec![ObjectRef::new(&club)]),
            )
            .unwrap();
        let peeked = clubs.peek_many(&*object.borrow().unwrap()).unwrap().unwrap();
        assert_eq!(peeked.len(), 1);
        assert!(Rc::ptr_eq(&peeked[0].downcast::<Club>().unwrap(), &club));

        let pending = Rc::clone(&club);
        clubs
            .assign_many(
                &mut *object.borrow_mut().unwrap(),
                Fetched::Deferred(Rc::new(move || Ok(vec![ObjectRef::new(&pending)]))),
            )
            .unwrap();
        assert!(clubs.peek_many(&*object.borrow().unwrap()).unwrap().is_none());
        let loaded = person.borrow().clubs.force().unwrap().len();
        assert_eq!(loaded, 1);
    }

    #[test]
    fn assigning_wrong_entity_type_fails() {
        let person = Person::default().into_handle();
        let object = ObjectRef::new(&person);
        let other = ObjectRef::new(&Person::default().into_handle());
        let passport = Person::descriptor().property("passport").unwrap();
        let err = passport
            .assign_one(&mut *object.borrow_mut().unwrap(), Fetched::Ready(Some(other)))
            .unwrap_err();
        assert!(matches!(err, Error::Type(_)));
    }

    #[test]
    fn inverse_sides_validate() {
        let person = Person::descriptor();
        let passport = Passport::descriptor();
        let club = Club::descriptor();

        validate_inverse(
            person.property("passport").unwrap(),
            passport.property("holder").unwrap(),
        )
        .unwrap();
        validate_inverse(
            person.property("clubs").unwrap(),
            club.property("members").unwrap(),
        )
        .unwrap();

        let err = validate_inverse(
            person.property("passport").unwrap(),
            club.property("members").unwrap(),
        )
        .unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::InvalidRelationship));
        assert!(validate_inverse(person.property("name").unwrap(), passport.property("holder").unwrap()).is_err());
    }

    #[test]
    fn many_to_many_sides() {
        assert_eq!(MEMBERSHIP.side_of(Person::descriptor()).unwrap(), JoinSide::First);
        assert_eq!(MEMBERSHIP.side_of(Club::descriptor()).unwrap(), JoinSide::Second);
        assert_eq!(MEMBERSHIP.join_column(JoinSide::First), "person_id");
        assert_eq!(MEMBERSHIP.join_column(JoinSide::Second), "club_id");
        let err = MEMBERSHIP.side_of(Passport::descriptor()).unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::InvalidDirection));
    }

    #[test]
    fn many_to_many_must_join_on_primary_keys() {
        const BY_NAME: ManyToMany =
            ManyToMany::new("person_club", Person::descriptor, "name", Club::descriptor, "id");
        let err = BY_NAME.side_of(Person::descriptor()).unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::InvalidRelationship));
        assert!(BY_NAME.validate().is_err());
        MEMBERSHIP.validate().unwrap();
    }

    #[test]
    fn self_referencing_many_to_many_is_rejected() {
        const TWINNED: ManyToMany =
            ManyToMany::new("twinning", Club::descriptor, "id", Club::descriptor, "id");
        let err = TWINNED.validate().unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::InvalidRelationship));
        let err = TWINNED.side_of(Club::descriptor()).unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::InvalidRelationship));
    }

    #[test]
    fn missing_primary_key_is_configuration_error() {
        #[derive(Default)]
        struct Keyless {
            note: String,
        }
        impl Entity for Keyless {
            fn descriptor() -> &'static EntityDescriptor {
                static DESCRIPTOR: std::sync::OnceLock<EntityDescriptor> =
                    std::sync::OnceLock::new();
                DESCRIPTOR.get_or_init(|| {
                    EntityDescriptor::builder::<Keyless>("keyless")
                        .column("note", |k| k.note.clone(), |k, v| k.note = v)
                        .build()
                })
            }
        }

        let object = ObjectRef::new(&Keyless::default().into_handle());
        let err = object.key().unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::MissingPrimaryKey));
    }
}
