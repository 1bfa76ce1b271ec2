//! Relationship metadata and deferred relationship values.
//!
//! Each relationship property carries a [`RelationshipDescriptor`] describing
//! how the two entity types are linked in the store. The in-memory value of a
//! relationship property is a [`Lazy`]: either already loaded, or a thunk that
//! runs exactly one query the first time it is forced.

use std::cell::{OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::Result;
use crate::descriptor::{EntityDescriptor, PropertyDescriptor};
use crate::error::{ConfigErrorKind, Error};
use crate::model::Handle;

/// Deferred reference to an entity's descriptor.
///
/// Relationships point at each other's descriptors, so descriptors refer to
/// related types through a function rather than a value.
pub type EntityFn = fn() -> &'static EntityDescriptor;

/// The type of relationship between two entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipKind {
    /// One-to-one: `Person` has one `Passport`.
    OneToOne,
    /// Many-to-one: many `Book`s belong to one `Author`.
    ManyToOne,
    /// One-to-many: one `Author` has many `Book`s.
    OneToMany,
    /// Many-to-many: `Post`s have many `Tag`s via a join table.
    ManyToMany,
}

/// Which end of a many-to-many relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinSide {
    First,
    Second,
}

impl JoinSide {
    pub const fn other(self) -> Self {
        match self {
            JoinSide::First => JoinSide::Second,
            JoinSide::Second => JoinSide::First,
        }
    }
}

/// A many-to-many relationship through a join table.
///
/// Both entity types declare the same value (typically a shared `const`), so
/// traversal from either side resolves to one logical relationship. Join
/// table columns are named `<table>_<key column>` for each side.
#[derive(Debug, Clone, Copy)]
pub struct ManyToMany {
    pub join_table: &'static str,
    pub first: EntityFn,
    pub first_key: &'static str,
    pub second: EntityFn,
    pub second_key: &'static str,
}

impl ManyToMany {
    #[must_use]
    pub const fn new(
        join_table: &'static str,
        first: EntityFn,
        first_key: &'static str,
        second: EntityFn,
        second_key: &'static str,
    ) -> Self {
        Self {
            join_table,
            first,
            first_key,
            second,
            second_key,
        }
    }

    /// Descriptor of one side.
    pub fn entity(&self, side: JoinSide) -> &'static EntityDescriptor {
        match side {
            JoinSide::First => (self.first)(),
            JoinSide::Second => (self.second)(),
        }
    }

    /// Key column (in the entity's own table) of one side.
    pub fn key(&self, side: JoinSide) -> &'static str {
        match side {
            JoinSide::First => self.first_key,
            JoinSide::Second => self.second_key,
        }
    }

    /// Join-table column referencing one side.
    pub fn join_column(&self, side: JoinSide) -> String {
        format!("{}_{}", self.entity(side).table(), self.key(side))
    }

    /// Check that each declared key is its side's primary-key column and that
    /// the two join columns are distinct.
    ///
    /// Join rows store primary-key values, so a key naming any other column
    /// could never be matched by the join query. A relationship from an entity
    /// to itself would name both join columns alike.
    pub fn validate(&self) -> Result<()> {
        for side in [JoinSide::First, JoinSide::Second] {
            let entity = self.entity(side);
            let key_column = entity.key_column()?;
            if key_column != self.key(side) {
                return Err(Error::config(
                    ConfigErrorKind::InvalidRelationship,
                    format!(
                        "{} joins {} on '{}', which is not its primary key '{}'",
                        self.join_table,
                        entity.table(),
                        self.key(side),
                        key_column
                    ),
                ));
            }
        }
        if self.join_column(JoinSide::First) == self.join_column(JoinSide::Second) {
            return Err(Error::config(
                ConfigErrorKind::InvalidRelationship,
                format!(
                    "{} would name both join columns '{}'",
                    self.join_table,
                    self.join_column(JoinSide::First)
                ),
            ));
        }
        Ok(())
    }

    /// Which side `entity` is on. Fails for a relationship that does not
    /// [`validate`](Self::validate).
    pub fn side_of(&self, entity: &EntityDescriptor) -> Result<JoinSide> {
        self.validate()?;
        if self.entity(JoinSide::First).same_type(entity) {
            Ok(JoinSide::First)
        } else if self.entity(JoinSide::Second).same_type(entity) {
            Ok(JoinSide::Second)
        } else {
            Err(Error::config(
                ConfigErrorKind::InvalidDirection,
                format!(
                    "{} is neither side of the {} relationship",
                    entity.table(),
                    self.join_table
                ),
            ))
        }
    }

    fn same_mapping(&self, other: &ManyToMany) -> bool {
        self.join_table == other.join_table
            && self.first_key == other.first_key
            && self.second_key == other.second_key
            && self.entity(JoinSide::First).same_type(other.entity(JoinSide::First))
            && self.entity(JoinSide::Second).same_type(other.entity(JoinSide::Second))
    }
}

/// How a relationship property links its owner to the related entity.
#[derive(Debug, Clone, Copy)]
pub enum RelationshipDescriptor {
    /// `foreign_key` lives in the owner's table when `owning_side` is set,
    /// otherwise in the related table and points back at the owner.
    OneToOne {
        owner: EntityFn,
        related: EntityFn,
        foreign_key: &'static str,
        owning_side: bool,
    },
    /// `foreign_key` lives in the many side's table.
    OneToMany {
        owner: EntityFn,
        many: EntityFn,
        foreign_key: &'static str,
    },
    /// `foreign_key` lives in the owner's table.
    ManyToOne {
        owner: EntityFn,
        related: EntityFn,
        foreign_key: &'static str,
    },
    ManyToMany(ManyToMany),
}

impl RelationshipDescriptor {
    pub fn kind(&self) -> RelationshipKind {
        match self {
            RelationshipDescriptor::OneToOne { .. } => RelationshipKind::OneToOne,
            RelationshipDescriptor::OneToMany { .. } => RelationshipKind::OneToMany,
            RelationshipDescriptor::ManyToOne { .. } => RelationshipKind::ManyToOne,
            RelationshipDescriptor::ManyToMany(_) => RelationshipKind::ManyToMany,
        }
    }

    /// Descriptor of the entity on the other end, seen from `owner`.
    pub fn target(&self, owner: &EntityDescriptor) -> Result<&'static EntityDescriptor> {
        match self {
            RelationshipDescriptor::OneToOne { related, .. }
            | RelationshipDescriptor::ManyToOne { related, .. } => Ok(related()),
            RelationshipDescriptor::OneToMany { many, .. } => Ok(many()),
            RelationshipDescriptor::ManyToMany(rel) => {
                Ok(rel.entity(rel.side_of(owner)?.other()))
            }
        }
    }

    /// Foreign-key column stored in the owner's own table, if any.
    pub fn owner_column(&self) -> Option<&'static str> {
        match self {
            RelationshipDescriptor::OneToOne {
                foreign_key,
                owning_side: true,
                ..
            }
            | RelationshipDescriptor::ManyToOne { foreign_key, .. } => Some(*foreign_key),
            _ => None,
        }
    }

    pub fn as_many_to_many(&self) -> Option<&ManyToMany> {
        match self {
            RelationshipDescriptor::ManyToMany(rel) => Some(rel),
            _ => None,
        }
    }
}

/// Check that two relationship properties, one mapped on each entity,
/// describe the same logical relationship.
pub fn validate_inverse(a: &PropertyDescriptor, b: &PropertyDescriptor) -> Result<()> {
    let (Some(left), Some(right)) = (a.relationship(), b.relationship()) else {
        return Err(invalid(a, b, "both properties must be relationships"));
    };

    let consistent = match (left, right) {
        (
            RelationshipDescriptor::OneToOne {
                owner: lo,
                related: lr,
                foreign_key: lf,
                owning_side: ls,
            },
            RelationshipDescriptor::OneToOne {
                owner: ro,
                related: rr,
                foreign_key: rf,
                owning_side: rs,
            },
        ) => lf == rf && ls != rs && lo().same_type(rr()) && lr().same_type(ro()),
        (
            RelationshipDescriptor::OneToMany {
                owner: one,
                many,
                foreign_key: lf,
            },
            RelationshipDescriptor::ManyToOne {
                owner: m,
                related: o,
                foreign_key: rf,
            },
        )
        | (
            RelationshipDescriptor::ManyToOne {
                owner: m,
                related: o,
                foreign_key: rf,
            },
            RelationshipDescriptor::OneToMany {
                owner: one,
                many,
                foreign_key: lf,
            },
        ) => lf == rf && one().same_type(o()) && many().same_type(m()),
        (RelationshipDescriptor::ManyToMany(l), RelationshipDescriptor::ManyToMany(r)) => {
            l.same_mapping(r)
        }
        _ => false,
    };

    if consistent {
        Ok(())
    } else {
        Err(invalid(a, b, "the two sides map different relationships"))
    }
}

fn invalid(a: &PropertyDescriptor, b: &PropertyDescriptor, detail: &str) -> Error {
    Error::config(
        ConfigErrorKind::InvalidRelationship,
        format!("'{}' and '{}' are not inverses: {}", a.name(), b.name(), detail),
    )
}

type Loader<V> = Rc<dyn Fn() -> Result<V>>;

/// A relationship value that is either loaded or loads on first access.
///
/// Forcing runs the loader once and memoizes the result. A failed load keeps
/// the loader so a later access can retry.
pub struct Lazy<V> {
    slot: OnceCell<V>,
    loader: RefCell<Option<Loader<V>>>,
}

/// A to-one relationship value.
pub type Related<T> = Lazy<Option<Handle<T>>>;

/// A to-many relationship value.
pub type RelatedMany<T> = Lazy<Vec<Handle<T>>>;

impl<V> Lazy<V> {
    /// An already-loaded value.
    #[must_use]
    pub fn loaded(value: V) -> Self {
        Self {
            slot: OnceCell::from(value),
            loader: RefCell::new(None),
        }
    }

    /// A value produced by `loader` on first access.
    #[must_use]
    pub fn deferred(loader: impl Fn() -> Result<V> + 'static) -> Self {
        Self {
            slot: OnceCell::new(),
            loader: RefCell::new(Some(Rc::new(loader))),
        }
    }

    /// Whether the value is available without running a query.
    pub fn is_loaded(&self) -> bool {
        self.slot.get().is_some()
    }

    /// The value if it is already loaded. Never triggers a load.
    pub fn get(&self) -> Option<&V> {
        self.slot.get()
    }

    /// Mutable access to the value if it is already loaded.
    pub fn get_mut(&mut self) -> Option<&mut V> {
        self.slot.get_mut()
    }

    /// The value, loading it first if needed.
    pub fn force(&self) -> Result<&V> {
        if let Some(value) = self.slot.get() {
            return Ok(value);
        }
        let loader = self
            .loader
            .borrow()
            .clone()
            .ok_or_else(|| Error::Custom("lazy relationship has no loader".to_string()))?;
        let value = loader()?;
        self.loader.borrow_mut().take();
        Ok(self.slot.get_or_init(|| value))
    }

    /// Mutable access to the value, loading it first if needed.
    pub fn force_mut(&mut self) -> Result<&mut V> {
        self.force()?;
        self.slot
            .get_mut()
            .ok_or_else(|| Error::Custom("lazy relationship failed to load".to_string()))
    }

    /// Replace the value, discarding any pending load.
    pub fn set(&mut self, value: V) {
        self.loader.get_mut().take();
        self.slot = OnceCell::from(value);
    }
}

impl<V: Default> Default for Lazy<V> {
    fn default() -> Self {
        Self::loaded(V::default())
    }
}

impl<V> fmt::Debug for Lazy<V> {
    // Entity graphs are often cyclic, so the value itself is not printed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_loaded() { "loaded" } else { "deferred" };
        f.debug_struct("Lazy").field("state", &state).finish()
    }
}

/// A relationship value handed to a descriptor without its static type.
pub enum Fetched<V> {
    Ready(V),
    Deferred(Rc<dyn Fn() -> Result<V>>),
}
