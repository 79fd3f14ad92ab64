//! Mapper handles.
//!
//! A [`Mapper`] calls the operations of one namespace by their short names.
//! Names are looked up in the namespace's flattened [`MapperTable`], so an
//! operation inherited from a parent namespace dispatches exactly like a
//! local one.

use crate::entity::Entity;
use crate::pagination::Pagination;
use crate::session::Session;
use serde::de::DeserializeOwned;
use sqlmapper_core::Result;
use sqlmapper_registry::{MapperTable, Params};
use std::sync::Arc;

/// Operations of one mapper namespace, bound to a session.
#[derive(Debug)]
pub struct Mapper<'s> {
    session: &'s Session,
    table: Arc<MapperTable>,
}

impl<'s> Mapper<'s> {
    pub(crate) fn new(session: &'s Session, table: Arc<MapperTable>) -> Self {
        Self { session, table }
    }

    pub fn namespace(&self) -> &str {
        self.table.namespace()
    }

    /// Qualified statement id behind `operation`.
    pub fn qualified(&self, operation: &str) -> Result<&str> {
        self.table.qualified(operation)
    }

    /// Whether the namespace (or one of its ancestors) declares `operation`.
    pub fn has_operation(&self, operation: &str) -> bool {
        self.table.qualified(operation).is_ok()
    }

    pub fn select_one(&self, operation: &str, params: impl Into<Params>) -> Result<Option<Entity>> {
        self.session.select_one(self.qualified(operation)?, params)
    }

    pub fn select_list(&self, operation: &str, params: impl Into<Params>) -> Result<Vec<Entity>> {
        self.session.select_list(self.qualified(operation)?, params)
    }

    pub fn select_page(
        &self,
        operation: &str,
        params: impl Into<Params>,
        pagination: Pagination,
    ) -> Result<Vec<Entity>> {
        self.session
            .select_list_with(self.qualified(operation)?, params, pagination)
    }

    pub fn select_one_as<T: DeserializeOwned>(
        &self,
        operation: &str,
        params: impl Into<Params>,
    ) -> Result<Option<T>> {
        self.session
            .select_one_as(self.qualified(operation)?, params)
    }

    pub fn select_list_as<T: DeserializeOwned>(
        &self,
        operation: &str,
        params: impl Into<Params>,
    ) -> Result<Vec<T>> {
        self.session
            .select_list_as(self.qualified(operation)?, params)
    }

    pub fn insert(&self, operation: &str, params: impl Into<Params>) -> Result<u64> {
        self.session.insert(self.qualified(operation)?, params)
    }

    pub fn update(&self, operation: &str, params: impl Into<Params>) -> Result<u64> {
        self.session.update(self.qualified(operation)?, params)
    }

    pub fn delete(&self, operation: &str, params: impl Into<Params>) -> Result<u64> {
        self.session.delete(self.qualified(operation)?, params)
    }
}
