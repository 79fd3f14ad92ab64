//! Statement execution against the session's connection.
//!
//! The executor owns the one store connection of a session and is the only
//! code that talks to it. Besides running statements it keeps:
//!
//! - the **local cache**: rows of selects already run in this session, keyed
//!   by statement id, SQL text and bound values, cleared by any write, commit,
//!   rollback or close
//! - the **transaction boundary**: unless the session auto-commits, the first
//!   write opens a transaction that stays open until commit or rollback, so
//!   the session sees its own writes immediately while other sessions do not
//!
//! Store faults are returned unchanged; nothing is retried here.

use sqlmapper_core::{Connection, Error, Result, Row, ValueKey};
use sqlmapper_registry::ExecutableStatement;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    statement: String,
    sql: String,
    params: Vec<ValueKey>,
}

impl CacheKey {
    fn of(stmt: &ExecutableStatement) -> Self {
        Self {
            statement: stmt.id().to_string(),
            sql: stmt.sql.clone(),
            params: stmt.params.iter().map(|v| v.key()).collect(),
        }
    }
}

/// Counters exposed through `Session::stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutorStats {
    /// Statements sent to the store.
    pub statements_executed: u64,
    /// Selects answered from the local cache.
    pub cache_hits: u64,
}

/// Runs resolved statements on one connection.
pub struct Executor {
    connection: Mutex<Option<Box<dyn Connection>>>,
    cache: Mutex<HashMap<CacheKey, Vec<Row>>>,
    cache_enabled: bool,
    auto_commit: bool,
    statements: AtomicU64,
    cache_hits: AtomicU64,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("open", &self.is_open())
            .field("auto_commit", &self.auto_commit)
            .field("cache_enabled", &self.cache_enabled)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Executor {
    pub fn new(connection: Box<dyn Connection>, auto_commit: bool, cache_enabled: bool) -> Self {
        Self {
            connection: Mutex::new(Some(connection)),
            cache: Mutex::new(HashMap::new()),
            cache_enabled,
            auto_commit,
            statements: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
        }
    }

    pub fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    pub fn is_open(&self) -> bool {
        self.lock_connection().is_some()
    }

    pub fn stats(&self) -> ExecutorStats {
        ExecutorStats {
            statements_executed: self.statements.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
        }
    }

    fn lock_connection(&self) -> MutexGuard<'_, Option<Box<dyn Connection>>> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_cache(&self) -> MutexGuard<'_, HashMap<CacheKey, Vec<Row>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_connection<T>(&self, f: impl FnOnce(&dyn Connection) -> Result<T>) -> Result<T> {
        let guard = self.lock_connection();
        let conn = guard.as_deref().ok_or(Error::SessionClosed)?;
        f(conn)
    }

    /// Run a select and return its rows.
    pub fn query(&self, stmt: &ExecutableStatement) -> Result<Vec<Row>> {
        let cacheable = self.cache_enabled && stmt.statement.uses_cache();
        let key = cacheable.then(|| CacheKey::of(stmt));

        if let Some(key) = &key {
            if let Some(rows) = self.lock_cache().get(key) {
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(
                    target: "sqlmapper::executor",
                    statement = stmt.id(),
                    rows = rows.len(),
                    "Local cache hit"
                );
                return Ok(rows.clone());
            }
        }
        if stmt.statement.flushes_cache() {
            self.clear_cache();
        }

        log_statement(stmt);
        let rows = self.with_connection(|conn| conn.query(&stmt.sql, &stmt.params))?;
        self.statements.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(
            target: "sqlmapper::executor",
            statement = stmt.id(),
            "<==      Total: {}",
            rows.len()
        );

        if let Some(key) = key {
            self.lock_cache().insert(key, rows.clone());
        }
        Ok(rows)
    }

    /// Run an insert, update or delete and return the affected row count.
    pub fn update(&self, stmt: &ExecutableStatement) -> Result<u64> {
        if stmt.statement.flushes_cache() {
            self.clear_cache();
        }

        log_statement(stmt);
        let affected = self.with_connection(|conn| {
            if !self.auto_commit && !conn.in_transaction() {
                conn.begin()?;
                tracing::trace!(target: "sqlmapper::executor", "Opened transaction");
            }
            conn.execute(&stmt.sql, &stmt.params)
        })?;
        self.statements.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(
            target: "sqlmapper::executor",
            statement = stmt.id(),
            "<==    Updates: {}",
            affected
        );
        Ok(affected)
    }

    /// Whether writes are pending in an open transaction.
    pub fn is_dirty(&self) -> bool {
        self.lock_connection()
            .as_deref()
            .is_some_and(|conn| conn.in_transaction())
    }

    /// Commit pending writes, if any.
    pub fn commit(&self) -> Result<()> {
        self.clear_cache();
        self.with_connection(|conn| {
            if conn.in_transaction() {
                conn.commit()?;
            }
            Ok(())
        })
    }

    /// Discard pending writes, if any.
    pub fn rollback(&self) -> Result<()> {
        self.clear_cache();
        self.with_connection(|conn| {
            if conn.in_transaction() {
                conn.rollback()?;
            }
            Ok(())
        })
    }

    /// Release the connection, rolling back pending writes first.
    ///
    /// Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        self.clear_cache();
        let Some(conn) = self.lock_connection().take() else {
            return Ok(());
        };
        if conn.in_transaction() {
            tracing::info!(
                target: "sqlmapper::session",
                "Rolling back uncommitted changes on close"
            );
            conn.rollback()?;
        }
        Ok(())
    }

    pub fn clear_cache(&self) {
        self.lock_cache().clear();
    }
}

fn log_statement(stmt: &ExecutableStatement) {
    tracing::debug!(
        target: "sqlmapper::executor",
        statement = stmt.id(),
        "==>  Preparing: {}",
        stmt.sql
    );
    if tracing::enabled!(target: "sqlmapper::executor", tracing::Level::TRACE) {
        let rendered: Vec<String> = stmt
            .params
            .iter()
            .map(|v| format!("{}({})", v, v.type_name()))
            .collect();
        tracing::trace!(
            target: "sqlmapper::executor",
            statement = stmt.id(),
            "==> Parameters: {}",
            rendered.join(", ")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlmapper_core::Value;
    use sqlmapper_registry::{Params, Statement, StatementRegistry};
    use sqlmapper_sqlite::SqliteConnection;

    fn setup(auto_commit: bool, cache: bool) -> (StatementRegistry, Executor) {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw(
            "CREATE TABLE blog (bid INTEGER PRIMARY KEY, name TEXT, author_id INTEGER);
             INSERT INTO blog VALUES (1, 'RabbitMQ', 1001);",
        )
        .unwrap();

        let mut registry = StatementRegistry::new();
        registry
            .register(Statement::select("selectBlogById", "SELECT * FROM blog WHERE bid = #{bid}").unwrap())
            .unwrap();
        registry
            .register(
                Statement::insert("insertBlog", "INSERT INTO blog (bid, name) VALUES (#{bid}, #{name})")
                    .unwrap(),
            )
            .unwrap();
        (registry, Executor::new(Box::new(conn), auto_commit, cache))
    }

    #[test]
    fn repeated_selects_hit_the_cache() {
        let (registry, executor) = setup(false, true);
        let stmt = registry.resolve("selectBlogById", &Params::from(1)).unwrap();

        let first = executor.query(&stmt).unwrap();
        let second = executor.query(&stmt).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(
            executor.stats(),
            ExecutorStats {
                statements_executed: 1,
                cache_hits: 1,
            }
        );

        let other = registry.resolve("selectBlogById", &Params::from(2)).unwrap();
        assert!(executor.query(&other).unwrap().is_empty());
        assert_eq!(executor.stats().statements_executed, 2);
    }

    #[test]
    fn writes_flush_the_cache_and_open_a_transaction() {
        let (registry, executor) = setup(false, true);
        let select = registry.resolve("selectBlogById", &Params::from(2)).unwrap();
        assert!(executor.query(&select).unwrap().is_empty());

        let insert = registry
            .resolve("insertBlog", &Params::none().with("bid", 2).with("name", "Kafka"))
            .unwrap();
        assert_eq!(executor.update(&insert).unwrap(), 1);
        assert!(executor.is_dirty());

        let rows = executor.query(&select).unwrap();
        assert_eq!(rows[0].get_by_name("name"), Some(&Value::Text("Kafka".into())));
        assert_eq!(executor.stats().cache_hits, 0);

        executor.rollback().unwrap();
        assert!(!executor.is_dirty());
        assert!(executor.query(&select).unwrap().is_empty());
    }

    #[test]
    fn statement_scope_disables_cache() {
        let (registry, executor) = setup(false, false);
        let stmt = registry.resolve("selectBlogById", &Params::from(1)).unwrap();
        executor.query(&stmt).unwrap();
        executor.query(&stmt).unwrap();
        assert_eq!(executor.stats().statements_executed, 2);
        assert_eq!(executor.stats().cache_hits, 0);
    }

    #[test]
    fn auto_commit_never_opens_a_transaction() {
        let (registry, executor) = setup(true, true);
        let insert = registry
            .resolve("insertBlog", &Params::none().with("bid", 3).with("name", "Redis"))
            .unwrap();
        executor.update(&insert).unwrap();
        assert!(!executor.is_dirty());
    }

    #[test]
    fn close_rolls_back_and_rejects_further_use() {
        let (registry, executor) = setup(false, true);
        let insert = registry
            .resolve("insertBlog", &Params::none().with("bid", 4).with("name", "Nacos"))
            .unwrap();
        executor.update(&insert).unwrap();
        executor.close().unwrap();
        executor.close().unwrap();
        assert!(!executor.is_open());

        let select = registry.resolve("selectBlogById", &Params::from(4)).unwrap();
        assert!(matches!(executor.query(&select), Err(Error::SessionClosed)));
        assert!(matches!(executor.commit(), Err(Error::SessionClosed)));
    }
}
