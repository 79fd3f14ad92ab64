//! Store connection traits.
//!
//! This module defines the boundary between the mapping engine and the
//! relational store:
//!
//! - [`Connection`] - executes SQL with positional parameters and manages the
//!   store-level transaction
//! - [`DataSource`] - opens new connections, one per session
//! - [`IsolationLevel`] - SQL transaction isolation levels
//!
//! Connections are synchronous. A session owns exactly one connection for its
//! lifetime; the `Send + Sync` bound exists so that lazy associations resolved
//! on another thread can reach the owning session's connection.

use crate::error::Result;
use crate::row::Row;
use crate::value::Value;

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Read uncommitted: dirty reads possible.
    ReadUncommitted,

    /// Read committed: only committed changes from others are visible.
    #[default]
    ReadCommitted,

    /// Repeatable read: a consistent snapshot for the whole transaction.
    RepeatableRead,

    /// Serializable: transactions appear to execute sequentially.
    Serializable,
}

impl IsolationLevel {
    /// Get the SQL syntax for this isolation level.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// A store connection capable of executing parameterized statements.
///
/// Parameters are positional: the n-th `?` in `sql` binds `params[n]`.
/// Rows must report their column names.
///
/// # Example
///
/// ```rust,ignore
/// let rows = conn.query("SELECT * FROM blog WHERE bid = ?", &[Value::Int(1)])?;
///
/// conn.begin()?;
/// conn.execute("INSERT INTO blog (bid, name) VALUES (?, ?)", &[1688.into(), "draft".into()])?;
/// conn.commit()?;
/// ```
pub trait Connection: Send + Sync {
    /// Execute a query and return all rows.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Execute a statement (INSERT, UPDATE, DELETE) and return rows affected.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Execute an INSERT and return the last inserted ID.
    fn insert(&self, sql: &str, params: &[Value]) -> Result<i64>;

    /// Begin a transaction with the default isolation level.
    fn begin(&self) -> Result<()> {
        self.begin_with(IsolationLevel::default())
    }

    /// Begin a transaction with a specific isolation level.
    fn begin_with(&self, isolation: IsolationLevel) -> Result<()>;

    /// Commit the open transaction.
    fn commit(&self) -> Result<()>;

    /// Roll back the open transaction.
    fn rollback(&self) -> Result<()>;

    /// Whether a transaction is currently open.
    fn in_transaction(&self) -> bool;

    /// Check that the connection is still usable.
    fn ping(&self) -> Result<()> {
        self.query("SELECT 1", &[]).map(|_| ())
    }
}

/// Something that can open store connections.
///
/// Any `Fn() -> Result<Box<dyn Connection>>` closure is a data source.
pub trait DataSource: Send + Sync {
    /// Open a new connection.
    fn connect(&self) -> Result<Box<dyn Connection>>;
}

impl<F> DataSource for F
where
    F: Fn() -> Result<Box<dyn Connection>> + Send + Sync,
{
    fn connect(&self) -> Result<Box<dyn Connection>> {
        self()
    }
}
