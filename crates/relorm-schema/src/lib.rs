//! Schema creation for relorm.
//!
//! This crate provides:
//! - CREATE TABLE generation from entity descriptors
//! - join table generation for many-to-many relationships
//! - a [`Schema`] registry producing create-if-absent DDL for a set of
//!   entities, each join table exactly once
//!
//! Migrations are out of scope; every statement is `CREATE TABLE IF NOT EXISTS`.

pub mod create;

pub use create::{CreateTable, create_join_table_ddl, create_table_ddl};

use relorm_core::{Entity, EntityDescriptor, ManyToMany, Result, TypeAdapterRegistry};

/// A set of entity types whose tables should exist.
#[derive(Debug, Default, Clone)]
pub struct Schema {
    entities: Vec<&'static EntityDescriptor>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register entity `T`. Registering a type twice has no effect.
    pub fn entity<T: Entity>(self) -> Self {
        self.with_descriptor(T::descriptor())
    }

    pub fn with_descriptor(mut self, descriptor: &'static EntityDescriptor) -> Self {
        if !self.entities.iter().any(|e| e.same_type(descriptor)) {
            self.entities.push(descriptor);
        }
        self
    }

    pub fn entities(&self) -> &[&'static EntityDescriptor] {
        &self.entities
    }

    /// Join tables of the registered entities, de-duplicated by name.
    pub fn join_tables(&self) -> Vec<&'static ManyToMany> {
        let mut seen: Vec<&'static ManyToMany> = Vec::new();
        for relation in self.entities.iter().copied().flat_map(EntityDescriptor::many_to_many) {
            if !seen.iter().any(|r| r.join_table == relation.join_table) {
                seen.push(relation);
            }
        }
        seen
    }

    /// DDL for every entity table in registration order, then every join table.
    pub fn create_statements(&self, adapters: &TypeAdapterRegistry) -> Result<Vec<String>> {
        let mut statements = Vec::with_capacity(self.entities.len());
        for entity in &self.entities {
            statements.push(create_table_ddl(entity, adapters)?);
        }
        for relation in self.join_tables() {
            statements.push(create_join_table_ddl(relation, adapters)?);
        }
        tracing::debug!(
            tables = self.entities.len(),
            statements = statements.len(),
            "Generated schema DDL"
        );
        Ok(statements)
    }
}

#[cfg(test)]
pub(crate) mod fixtures;
