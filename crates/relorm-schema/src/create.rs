//! CREATE TABLE statement builders.

use relorm_core::{
    ConfigErrorKind, EntityDescriptor, Error, FieldType, JoinSide, ManyToMany,
    PropertyDescriptor, Result, SqlType, TypeAdapterRegistry,
};

/// Builder for an entity's CREATE TABLE statement.
///
/// One column per scalar property and per foreign-key column held in the
/// entity's table, in declaration order. Relationships whose key lives
/// elsewhere (one-to-many, the inverse one-to-one, many-to-many) add nothing.
#[derive(Debug)]
pub struct CreateTable<'a> {
    entity: &'a EntityDescriptor,
    adapters: &'a TypeAdapterRegistry,
    if_not_exists: bool,
}

impl<'a> CreateTable<'a> {
    pub fn new(entity: &'a EntityDescriptor, adapters: &'a TypeAdapterRegistry) -> Self {
        Self {
            entity,
            adapters,
            if_not_exists: false,
        }
    }

    /// Add IF NOT EXISTS clause.
    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }

    /// Build the CREATE TABLE SQL. Fails with `UnmappableEntity` when the
    /// entity has no columns and `UnmappedType` when a column type has no
    /// adapter.
    pub fn build(&self) -> Result<String> {
        let mut columns = Vec::new();
        let mut unique = Vec::new();

        for property in self.entity.properties() {
            let Some(column) = property.column() else {
                continue;
            };
            columns.push(self.column_definition(property, column)?);
            if property.is_unique() && !property.is_primary_key() {
                unique.push(column);
            }
        }

        if columns.is_empty() {
            return Err(Error::config(
                ConfigErrorKind::UnmappableEntity,
                format!(
                    "{} ({}) has no persistable columns",
                    self.entity.table(),
                    self.entity.type_name()
                ),
            ));
        }
        if !unique.is_empty() {
            columns.push(format!("UNIQUE({})", unique.join(", ")));
        }

        Ok(format!(
            "CREATE TABLE {}{} ({})",
            if self.if_not_exists { "IF NOT EXISTS " } else { "" },
            self.entity.table(),
            columns.join(", ")
        ))
    }

    fn column_definition(&self, property: &PropertyDescriptor, column: &str) -> Result<String> {
        let sql_type = storage_sql_type(self.adapters, property)?;
        let mut def = format!("{} {}", column, sql_type.sql_name());

        if property.is_primary_key() {
            def.push_str(" PRIMARY KEY");
            if property.is_auto_increment() {
                def.push_str(" AUTOINCREMENT");
            }
        } else if !property.is_nullable() {
            def.push_str(" NOT NULL");
        }

        Ok(def)
    }
}

/// `CREATE TABLE IF NOT EXISTS` for `entity`.
pub fn create_table_ddl(entity: &EntityDescriptor, adapters: &TypeAdapterRegistry) -> Result<String> {
    CreateTable::new(entity, adapters).if_not_exists().build()
}

/// `CREATE TABLE IF NOT EXISTS` for the join table of `relation`: one
/// `<table>_<key>` column per side typed like that side's key, and a
/// composite primary key over both.
pub fn create_join_table_ddl(relation: &ManyToMany, adapters: &TypeAdapterRegistry) -> Result<String> {
    relation.validate()?;
    let mut columns = Vec::with_capacity(2);
    for side in [JoinSide::First, JoinSide::Second] {
        let key = relation.entity(side).primary_key()?;
        let sql_type = storage_sql_type(adapters, key)?;
        columns.push((relation.join_column(side), sql_type.sql_name()));
    }

    let definitions: Vec<_> = columns
        .iter()
        .map(|(name, sql_type)| format!("{name} {sql_type} NOT NULL"))
        .collect();
    let names: Vec<_> = columns.iter().map(|(name, _)| name.as_str()).collect();
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} ({}, PRIMARY KEY ({}))",
        relation.join_table,
        definitions.join(", "),
        names.join(", ")
    ))
}

fn storage_sql_type(adapters: &TypeAdapterRegistry, property: &PropertyDescriptor) -> Result<SqlType> {
    let FieldType { id, name } = property.storage_type()?.ok_or_else(|| {
        Error::config(
            ConfigErrorKind::UnmappableValue,
            format!("property '{}' has no storage type", property.name()),
        )
    })?;
    Ok(adapters.resolve_id(id, name)?.column_type())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Author, Book, Empty, Note, Profile, TAGGING, Tag, User};
    use relorm_core::Entity;

    fn ddl<T: Entity>() -> String {
        create_table_ddl(T::descriptor(), &TypeAdapterRegistry::new()).unwrap()
    }

    #[test]
    fn auto_increment_key_and_not_null_columns() {
        assert_eq!(
            ddl::<Author>(),
            "CREATE TABLE IF NOT EXISTS author (id INTEGER PRIMARY KEY AUTOINCREMENT, \
             name TEXT NOT NULL, email TEXT, UNIQUE(name, email))"
        );
    }

    #[test]
    fn foreign_key_columns_are_nullable_and_typed_by_target_key() {
        assert_eq!(
            ddl::<Book>(),
            "CREATE TABLE IF NOT EXISTS book (id INTEGER PRIMARY KEY AUTOINCREMENT, \
             title TEXT NOT NULL, published DATE, authorId INTEGER)"
        );
    }

    #[test]
    fn declared_inverse_foreign_key_gets_a_column() {
        assert_eq!(
            ddl::<Note>(),
            "CREATE TABLE IF NOT EXISTS note (id INTEGER PRIMARY KEY AUTOINCREMENT, \
             body TEXT NOT NULL, userName TEXT)"
        );
    }

    #[test]
    fn inverse_one_to_one_has_no_column() {
        assert_eq!(
            ddl::<User>(),
            "CREATE TABLE IF NOT EXISTS user_account (name TEXT PRIMARY KEY, active BOOLEAN NOT NULL)"
        );
        assert_eq!(
            ddl::<Profile>(),
            "CREATE TABLE IF NOT EXISTS profile (id INTEGER PRIMARY KEY AUTOINCREMENT, \
             bio TEXT, userName TEXT)"
        );
    }

    #[test]
    fn without_if_not_exists() {
        let sql = CreateTable::new(User::descriptor(), &TypeAdapterRegistry::new())
            .build()
            .unwrap();
        assert!(sql.starts_with("CREATE TABLE user_account ("));
    }

    #[test]
    fn join_table_has_composite_key() {
        let sql = create_join_table_ddl(&TAGGING, &TypeAdapterRegistry::new()).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS book_tag (book_id INTEGER NOT NULL, \
             tag_label TEXT NOT NULL, PRIMARY KEY (book_id, tag_label))"
        );
    }

    #[test]
    fn join_table_on_a_non_key_column_is_rejected() {
        const BY_TITLE: ManyToMany =
            ManyToMany::new("book_tag", Book::descriptor, "title", Tag::descriptor, "label");
        let err = create_join_table_ddl(&BY_TITLE, &TypeAdapterRegistry::new()).unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::InvalidRelationship));
    }

    #[test]
    fn entity_without_columns_is_unmappable() {
        let err = create_table_ddl(Empty::descriptor(), &TypeAdapterRegistry::new()).unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::UnmappableEntity));
    }

    #[test]
    fn missing_adapter_is_unmapped_type() {
        let err = create_table_ddl(Book::descriptor(), &TypeAdapterRegistry::empty()).unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::UnmappedType));
    }
}
