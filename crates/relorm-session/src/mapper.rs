//! Entity to column-map conversion.

use relorm_core::{
    ConfigErrorKind, Error, ObjectRef, PropertyDescriptor, RelationshipKind, Result,
    TypeAdapterRegistry, Value,
};

/// A to-one relationship value found on an instance.
#[derive(Debug, Clone)]
pub struct ToOneLink {
    pub property: &'static PropertyDescriptor,
    pub target: Option<ObjectRef>,
}

/// A to-many relationship value found on an instance.
#[derive(Debug, Clone)]
pub struct ToManyLink {
    pub property: &'static PropertyDescriptor,
    pub targets: Vec<ObjectRef>,
}

/// Column values of an instance plus its loaded relationships, bucketed by
/// kind.
#[derive(Debug, Clone, Default)]
pub struct ModelMap {
    pub columns: Vec<(&'static str, Value)>,
    pub one_to_one: Vec<ToOneLink>,
    pub many_to_one: Vec<ToOneLink>,
    pub one_to_many: Vec<ToManyLink>,
    pub many_to_many: Vec<ToManyLink>,
}

impl ModelMap {
    /// Value mapped for `column`, if any.
    pub fn column(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }
}

/// Converts instances into [`ModelMap`]s using a type adapter registry.
pub struct ModelMapper<'a> {
    adapters: &'a TypeAdapterRegistry,
}

impl<'a> ModelMapper<'a> {
    pub fn new(adapters: &'a TypeAdapterRegistry) -> Self {
        Self { adapters }
    }

    /// Map `object`.
    ///
    /// Auto-increment keys are never written and so are left out. Unloaded
    /// lazy relationships are left out too; they are treated as unchanged.
    /// Foreign-key columns are not mapped here: the cascade decides them.
    pub fn map(&self, object: &ObjectRef) -> Result<ModelMap> {
        let descriptor = object.descriptor();
        let entity = object.borrow()?;
        let mut map = ModelMap::default();

        for property in descriptor.properties() {
            if property.is_primary_key() && property.is_auto_increment() {
                continue;
            }
            if let Some(relationship) = property.relationship() {
                match relationship.kind() {
                    RelationshipKind::OneToOne | RelationshipKind::ManyToOne => {
                        let Some(target) = property.peek_one(&*entity)? else {
                            continue;
                        };
                        let link = ToOneLink { property, target };
                        if relationship.kind() == RelationshipKind::OneToOne {
                            map.one_to_one.push(link);
                        } else {
                            map.many_to_one.push(link);
                        }
                    }
                    RelationshipKind::OneToMany | RelationshipKind::ManyToMany => {
                        let Some(targets) = property.peek_many(&*entity)? else {
                            continue;
                        };
                        let link = ToManyLink { property, targets };
                        if relationship.kind() == RelationshipKind::OneToMany {
                            map.one_to_many.push(link);
                        } else {
                            map.many_to_many.push(link);
                        }
                    }
                }
                continue;
            }
            if !property.is_scalar() {
                continue;
            }

            let (Some(column), Some(field_type)) = (property.column(), property.field_type())
            else {
                continue;
            };
            let value = match property.read(&*entity)? {
                None => Value::Null,
                Some(field) => {
                    let adapter = self
                        .adapters
                        .resolve_id(field_type.id, field_type.name)
                        .map_err(|e| unmappable(property, &e))?;
                    adapter.to_column_value(&*field)?
                }
            };
            map.columns.push((column, value));
        }

        Ok(map)
    }
}

fn unmappable(property: &PropertyDescriptor, cause: &Error) -> Error {
    Error::config(
        ConfigErrorKind::UnmappableValue,
        format!("cannot map property '{}': {}", property.name(), cause),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Author, Book, Profile, Tag, User};
    use relorm_core::{Entity, Lazy};

    #[test]
    fn skips_auto_increment_key_and_maps_scalars() {
        let author = Author {
            id: Some(4),
            name: "Ann".into(),
            ..Author::default()
        }
        .into_handle();
        let adapters = TypeAdapterRegistry::new();
        let map = ModelMapper::new(&adapters).map(&ObjectRef::new(&author)).unwrap();
        assert_eq!(map.columns, vec![("name", Value::Text("Ann".into()))]);
        assert_eq!(map.one_to_many.len(), 1);
        assert!(map.one_to_many[0].targets.is_empty());
    }

    #[test]
    fn natural_keys_are_mapped() {
        let tag = Tag {
            label: Some("rust".into()),
            ..Tag::default()
        }
        .into_handle();
        let adapters = TypeAdapterRegistry::new();
        let map = ModelMapper::new(&adapters).map(&ObjectRef::new(&tag)).unwrap();
        assert_eq!(map.column("label"), Some(&Value::Text("rust".into())));
    }

    #[test]
    fn relationships_are_bucketed_by_kind() {
        let user = User::default().into_handle();
        let profile = Profile {
            user: Lazy::loaded(Some(user)),
            ..Profile::default()
        }
        .into_handle();
        let adapters = TypeAdapterRegistry::new();
        let map = ModelMapper::new(&adapters).map(&ObjectRef::new(&profile)).unwrap();
        assert_eq!(map.one_to_one.len(), 1);
        assert!(map.one_to_one[0].target.is_some());
        assert_eq!(map.column("bio"), Some(&Value::Null));

        let book = Book::default().into_handle();
        let map = ModelMapper::new(&adapters).map(&ObjectRef::new(&book)).unwrap();
        assert_eq!(map.many_to_one.len(), 1);
        assert!(map.many_to_one[0].target.is_none());
        assert_eq!(map.many_to_many.len(), 1);
    }

    #[test]
    fn unloaded_relationships_are_left_out() {
        let book = Book {
            tags: Lazy::deferred(|| Ok(Vec::new())),
            author: Lazy::deferred(|| Ok(None)),
            ..Book::default()
        }
        .into_handle();
        let adapters = TypeAdapterRegistry::new();
        let map = ModelMapper::new(&adapters).map(&ObjectRef::new(&book)).unwrap();
        assert!(map.many_to_many.is_empty());
        assert!(map.many_to_one.is_empty());
    }

    #[test]
    fn missing_adapter_is_unmappable_value() {
        let author = Author::default().into_handle();
        let adapters = TypeAdapterRegistry::empty();
        let err = ModelMapper::new(&adapters).map(&ObjectRef::new(&author)).unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::UnmappableValue));
        assert_eq!(Author::descriptor().table(), "author");
    }
}
