//! Criteria queries: a predicate list over one entity's table.

use std::fmt;
use std::marker::PhantomData;

use relorm_core::{Entity, EntityDescriptor, Value};

use crate::expr::Expr;
use crate::select::create_select;

/// Predicates, limit and offset for listing entities of type `T`.
///
/// ```ignore
/// let adults = session.list(
///     &session.create_criteria_query::<Person>().gt("age", 17).limit(10),
/// )?;
/// ```
pub struct Criteria<T> {
    predicates: Vec<Expr>,
    limit: i64,
    offset: i64,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Criteria<T> {
    pub fn new() -> Self {
        Self {
            predicates: Vec::new(),
            limit: 0,
            offset: 0,
            _entity: PhantomData,
        }
    }

    pub fn descriptor(&self) -> &'static EntityDescriptor {
        T::descriptor()
    }

    /// Add a prebuilt predicate.
    pub fn add(mut self, expr: Expr) -> Self {
        self.predicates.push(expr);
        self
    }

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.add(Expr::col(column).eq(value))
    }

    pub fn ne(self, column: &str, value: impl Into<Value>) -> Self {
        self.add(Expr::col(column).ne(value))
    }

    pub fn gt(self, column: &str, value: impl Into<Value>) -> Self {
        self.add(Expr::col(column).gt(value))
    }

    pub fn lt(self, column: &str, value: impl Into<Value>) -> Self {
        self.add(Expr::col(column).lt(value))
    }

    pub fn like(self, column: &str, pattern: impl Into<String>) -> Self {
        self.add(Expr::col(column).like(pattern))
    }

    pub fn is_null(self, column: &str) -> Self {
        self.add(Expr::col(column).is_null())
    }

    pub fn limit(mut self, n: i64) -> Self {
        self.limit = n;
        self
    }

    pub fn offset(mut self, n: i64) -> Self {
        self.offset = n;
        self
    }

    pub fn predicates(&self) -> &[Expr] {
        &self.predicates
    }

    pub fn to_sql(&self) -> String {
        create_select(T::descriptor().table(), &self.predicates, self.limit, self.offset)
    }
}

impl<T: Entity> Default for Criteria<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Criteria<T> {
    fn clone(&self) -> Self {
        Self {
            predicates: self.predicates.clone(),
            limit: self.limit,
            offset: self.offset,
            _entity: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Criteria<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Criteria")
            .field("entity", &std::any::type_name::<T>())
            .field("predicates", &self.predicates)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .finish()
    }
}
