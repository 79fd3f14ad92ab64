//! The unit of work.
//!
//! A [`Session`] owns one store connection from [`Session::open`] until
//! [`Session::close`] (or drop). It is `Send` but not `Sync`: one thread of
//! control drives it at a time. Entities it returns may cross threads freely;
//! their lazy associations call back into the session's shared core, which
//! serializes access to the connection.
//!
//! ```text
//! select_*  --> registry.resolve --> executor.query --> ResultMapper --> entities
//!                                                           |
//!            LazyAssociation::resolve / eager association --+--> SessionCore::load
//! ```

use crate::config::{Configuration, LocalCacheScope};
use crate::entity::Entity;
use crate::executor::Executor;
use crate::lazy::{AssociationLoader, LoadRequest, Loaded};
use crate::mapper::Mapper;
use crate::n1_detection::{N1QueryTracker, N1Stats};
use crate::pagination::Pagination;
use crate::result_mapper::ResultMapper;
use serde::de::DeserializeOwned;
use sqlmapper_core::{Connection, Error, NonUniqueError, Result};
use sqlmapper_registry::{Cardinality, ExecutableStatement, Params, StatementKind};
use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Statements sent to the store, secondary fetches included.
    pub statements_executed: u64,
    /// Selects answered from the local cache.
    pub cache_hits: u64,
    /// Nested-query associations fetched, lazily or eagerly.
    pub association_loads: u64,
}

/// State shared between a session and the lazy associations it hands out.
struct SessionCore {
    config: Arc<Configuration>,
    executor: Executor,
    n1: Mutex<N1QueryTracker>,
    association_loads: AtomicU64,
    this: Weak<SessionCore>,
}

impl SessionCore {
    fn lock_n1(&self) -> MutexGuard<'_, N1QueryTracker> {
        self.n1.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn loader(&self) -> Result<Arc<dyn AssociationLoader>> {
        let core: Arc<dyn AssociationLoader> = self.this.upgrade().ok_or(Error::SessionClosed)?;
        Ok(core)
    }

    fn resolve(&self, id: &str, params: &Params) -> Result<ExecutableStatement> {
        if !self.executor.is_open() {
            return Err(Error::SessionClosed);
        }
        self.config.registry().resolve(id, params)
    }

    fn select(&self, id: &str, params: &Params, depth: usize) -> Result<Vec<Entity>> {
        let stmt = self.resolve(id, params)?;
        if stmt.kind() != StatementKind::Select {
            return Err(Error::config(format!(
                "statement '{}' is not a select",
                stmt.id()
            )));
        }
        let rows = self.executor.query(&stmt)?;
        let loader = self.loader()?;
        ResultMapper::new(&self.config, &loader, depth).map_rows(stmt.result(), &rows)
    }

    fn write(&self, id: &str, params: &Params) -> Result<u64> {
        let stmt = self.resolve(id, params)?;
        if !stmt.kind().is_write() {
            return Err(Error::config(format!(
                "statement '{}' is a select and cannot be used for writes",
                stmt.id()
            )));
        }
        self.executor.update(&stmt)
    }
}

impl AssociationLoader for SessionCore {
    fn load(&self, request: &LoadRequest) -> Result<Loaded> {
        if !self.executor.is_open() {
            return Err(Error::SessionClosed);
        }
        self.association_loads.fetch_add(1, Ordering::Relaxed);
        self.lock_n1()
            .record_load(&request.owner_type, &request.property, &request.statement);

        let mut entities = self.select(&request.statement, &request.params, request.depth)?;
        match request.cardinality {
            Cardinality::Many => Ok(Loaded::Many(entities)),
            Cardinality::One if entities.len() > 1 => Err(Error::NonUniqueResult(NonUniqueError {
                statement: request.statement.clone(),
                found: entities.len(),
            })),
            Cardinality::One => Ok(Loaded::One(entities.pop())),
        }
    }
}

/// One unit of work over one connection; see the module docs.
pub struct Session {
    core: Arc<SessionCore>,
    _not_sync: PhantomData<Cell<()>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("executor", &self.core.executor)
            .field("association_loads", &self.core.association_loads)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Start a session on `connection`.
    ///
    /// Without auto-commit, the first write opens a transaction that lasts
    /// until [`commit`](Self::commit) or [`rollback`](Self::rollback).
    pub fn open(
        config: Arc<Configuration>,
        connection: Box<dyn Connection>,
        auto_commit: bool,
    ) -> Self {
        let settings = config.settings();
        let cache_enabled = settings.local_cache_scope == LocalCacheScope::Session;
        let n1 = N1QueryTracker::from_threshold(settings.n1_threshold);
        tracing::debug!(
            target: "sqlmapper::session",
            auto_commit,
            cache_enabled,
            "Opening session"
        );
        let core = Arc::new_cyclic(|this| SessionCore {
            executor: Executor::new(connection, auto_commit, cache_enabled),
            n1: Mutex::new(n1),
            association_loads: AtomicU64::new(0),
            this: this.clone(),
            config,
        });
        Self {
            core,
            _not_sync: PhantomData,
        }
    }

    pub fn configuration(&self) -> &Arc<Configuration> {
        &self.core.config
    }

    /// Select at most one entity.
    ///
    /// Fails with [`Error::NonUniqueResult`] when the mapped result (after
    /// grouping joined rows) holds more than one entity.
    #[tracing::instrument(level = "debug", skip(self, params))]
    pub fn select_one(&self, statement: &str, params: impl Into<Params>) -> Result<Option<Entity>> {
        let mut entities = self.core.select(statement, &params.into(), 0)?;
        if entities.len() > 1 {
            return Err(Error::NonUniqueResult(NonUniqueError {
                statement: statement.to_string(),
                found: entities.len(),
            }));
        }
        Ok(entities.pop())
    }

    /// Select every entity.
    #[tracing::instrument(level = "debug", skip(self, params))]
    pub fn select_list(&self, statement: &str, params: impl Into<Params>) -> Result<Vec<Entity>> {
        self.core.select(statement, &params.into(), 0)
    }

    /// Select one window of entities.
    ///
    /// A logical window is cut from the mapped entities, so joined rows of
    /// one owner never count more than once. A physical window is bound into
    /// the statement's `#{offset}` / `#{limit}` placeholders.
    #[tracing::instrument(level = "debug", skip(self, params))]
    pub fn select_list_with(
        &self,
        statement: &str,
        params: impl Into<Params>,
        pagination: Pagination,
    ) -> Result<Vec<Entity>> {
        let params = params.into();
        match pagination {
            Pagination::Logical(bounds) => {
                let entities = self.core.select(statement, &params, 0)?;
                Ok(bounds.apply(entities))
            }
            Pagination::Physical(bounds) => {
                let stmt = self.core.config.registry().statement(statement)?;
                let params = Pagination::bind_physical(bounds, stmt, params)?;
                self.core.select(statement, &params, 0)
            }
        }
    }

    /// [`select_one`](Self::select_one) deserialized into `T`.
    pub fn select_one_as<T: DeserializeOwned>(
        &self,
        statement: &str,
        params: impl Into<Params>,
    ) -> Result<Option<T>> {
        self.select_one(statement, params)?
            .map(|entity| entity.deserialize())
            .transpose()
    }

    /// [`select_list`](Self::select_list) deserialized into `T`.
    pub fn select_list_as<T: DeserializeOwned>(
        &self,
        statement: &str,
        params: impl Into<Params>,
    ) -> Result<Vec<T>> {
        self.select_list(statement, params)?
            .iter()
            .map(Entity::deserialize)
            .collect()
    }

    #[tracing::instrument(level = "debug", skip(self, params))]
    pub fn insert(&self, statement: &str, params: impl Into<Params>) -> Result<u64> {
        self.core.write(statement, &params.into())
    }

    #[tracing::instrument(level = "debug", skip(self, params))]
    pub fn update(&self, statement: &str, params: impl Into<Params>) -> Result<u64> {
        self.core.write(statement, &params.into())
    }

    #[tracing::instrument(level = "debug", skip(self, params))]
    pub fn delete(&self, statement: &str, params: impl Into<Params>) -> Result<u64> {
        self.core.write(statement, &params.into())
    }

    /// Make this session's writes visible to other sessions.
    pub fn commit(&self) -> Result<()> {
        let dirty = self.core.executor.is_dirty();
        self.core.executor.commit()?;
        tracing::debug!(target: "sqlmapper::session", dirty, "Committed");
        Ok(())
    }

    /// Discard this session's uncommitted writes.
    pub fn rollback(&self) -> Result<()> {
        let dirty = self.core.executor.is_dirty();
        self.core.executor.rollback()?;
        tracing::debug!(target: "sqlmapper::session", dirty, "Rolled back");
        Ok(())
    }

    /// Whether uncommitted writes are pending.
    pub fn is_dirty(&self) -> bool {
        self.core.executor.is_dirty()
    }

    /// Roll back pending writes and release the connection.
    ///
    /// Every later operation, including lazy loads of entities this session
    /// returned, fails with [`Error::SessionClosed`]. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        if !self.core.executor.is_open() {
            return Ok(());
        }
        self.core.executor.close()?;
        tracing::debug!(
            target: "sqlmapper::session",
            stats = ?self.stats(),
            "Closed session"
        );
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        !self.core.executor.is_open()
    }

    /// Handle for the operations of a mapper namespace.
    pub fn mapper(&self, namespace: &str) -> Result<Mapper<'_>> {
        if self.is_closed() {
            return Err(Error::SessionClosed);
        }
        let table = self.core.config.mapper_table(namespace)?;
        Ok(Mapper::new(self, Arc::clone(table)))
    }

    pub fn stats(&self) -> SessionStats {
        let executor = self.core.executor.stats();
        SessionStats {
            statements_executed: executor.statements_executed,
            cache_hits: executor.cache_hits,
            association_loads: self.core.association_loads.load(Ordering::Relaxed),
        }
    }

    pub fn n1_stats(&self) -> N1Stats {
        self.core.lock_n1().stats()
    }

    /// Drop every cached select result.
    pub fn clear_cache(&self) {
        self.core.executor.clear_cache();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(
                target: "sqlmapper::session",
                error = %e,
                "Failed to close session cleanly"
            );
        }
    }
}
