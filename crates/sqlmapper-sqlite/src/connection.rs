//! SQLite connection implementation.
//!
//! This module provides safe wrappers around SQLite's C API and implements
//! the [`Connection`] trait from sqlmapper-core.

#![allow(unsafe_code)]
// Allow casts in FFI code where we need to match C types exactly
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::borrow_as_ptr)]

use crate::ffi;
use crate::types;
use sqlmapper_core::{
    ColumnInfo, Connection, ConnectionError, ConnectionErrorKind, DataSource, Error,
    ExecutionError, ExecutionErrorKind, IsolationLevel, Result, Row, TransactionError,
    TransactionErrorKind, Value,
};
use std::ffi::{CStr, CString, c_int};
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard};

/// Configuration for opening SQLite connections.
///
/// A `SqliteConfig` is also a [`DataSource`]: every `connect()` opens a fresh
/// handle on the configured path. Note that each `:memory:` connection is its
/// own private database.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Path to the database file, or ":memory:" for an in-memory database.
    pub path: String,
    /// Open flags (read-only, read-write, create)
    pub flags: OpenFlags,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

/// Flags controlling how the database is opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenFlags {
    /// Open for reading only.
    pub read_only: bool,
    /// Open for reading and writing.
    pub read_write: bool,
    /// Create the database if it doesn't exist.
    pub create: bool,
    /// Enable URI filename interpretation.
    pub uri: bool,
}

impl OpenFlags {
    /// Create flags for read-only access.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access with creation if needed.
    pub fn create_read_write() -> Self {
        Self {
            read_write: true,
            create: true,
            ..Default::default()
        }
    }

    fn to_sqlite_flags(self) -> c_int {
        let mut flags = 0;

        if self.read_only {
            flags |= ffi::SQLITE_OPEN_READONLY;
        }
        if self.read_write {
            flags |= ffi::SQLITE_OPEN_READWRITE;
        }
        if self.create {
            flags |= ffi::SQLITE_OPEN_CREATE;
        }
        if self.uri {
            flags |= ffi::SQLITE_OPEN_URI;
        }

        // Default to read-write if no mode specified
        if flags & (ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_READWRITE) == 0 {
            flags |= ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
        }

        // Access is serialized by our own mutex.
        flags | ffi::SQLITE_OPEN_FULLMUTEX
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            flags: OpenFlags::create_read_write(),
            busy_timeout_ms: 5000,
        }
    }
}

impl SqliteConfig {
    /// Create a new config for a file-based database.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Create a new config for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Set open flags.
    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set busy timeout.
    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }
}

impl DataSource for SqliteConfig {
    fn connect(&self) -> Result<Box<dyn Connection>> {
        Ok(Box::new(SqliteConnection::open(self)?))
    }
}

/// Inner state of the SQLite connection, protected by a mutex.
struct SqliteInner {
    db: *mut ffi::sqlite3,
    in_transaction: bool,
}

// SAFETY: the handle is opened with SQLITE_OPEN_FULLMUTEX and every access
// goes through the Mutex wrapping this struct.
unsafe impl Send for SqliteInner {}

/// Finalizes a prepared statement when dropped.
struct PreparedStmt(*mut ffi::sqlite3_stmt);

impl Drop for PreparedStmt {
    fn drop(&mut self) {
        // SAFETY: the pointer came from a successful sqlite3_prepare_v2
        unsafe {
            ffi::sqlite3_finalize(self.0);
        }
    }
}

/// A connection to a SQLite database.
pub struct SqliteConnection {
    inner: Mutex<SqliteInner>,
    path: String,
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.path)
            .field("in_transaction", &self.in_transaction())
            .finish_non_exhaustive()
    }
}

impl SqliteConnection {
    /// Open a new SQLite connection with the given configuration.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        let c_path = CString::new(config.path.as_str()).map_err(|_| {
            Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Connect,
                message: "Invalid path: contains null byte".to_string(),
                source: None,
            })
        })?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        let flags = config.flags.to_sqlite_flags();

        // SAFETY: We pass valid pointers and check the return value
        let rc = unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };

        if rc != ffi::SQLITE_OK {
            let msg = if db.is_null() {
                ffi::error_string(rc).to_string()
            } else {
                // SAFETY: db is a valid (failed) handle that must still be closed
                unsafe {
                    let msg = ffi::last_error_message(db);
                    ffi::sqlite3_close(db);
                    msg
                }
            };

            return Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Connect,
                message: format!("Failed to open database: {}", msg),
                source: None,
            }));
        }

        if config.busy_timeout_ms > 0 {
            // SAFETY: db is valid
            unsafe {
                ffi::sqlite3_busy_timeout(db, config.busy_timeout_ms as c_int);
            }
        }

        tracing::debug!(target: "sqlmapper::sqlite", path = %config.path, "Opened SQLite connection");

        Ok(Self {
            inner: Mutex::new(SqliteInner {
                db,
                in_transaction: false,
            }),
            path: config.path.clone(),
        })
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::open(&SqliteConfig::memory())
    }

    /// Open a file-based database.
    pub fn open_file(path: impl Into<String>) -> Result<Self> {
        Self::open(&SqliteConfig::file(path))
    }

    /// Get the database path.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, SqliteInner> {
        // A poisoned lock only means another thread panicked mid-call; the
        // handle itself is still consistent.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Execute SQL directly without preparing (DDL, multi-statement scripts).
    pub fn execute_raw(&self, sql: &str) -> Result<()> {
        let inner = self.lock();
        exec_raw(inner.db, sql)
    }

    /// Get the last insert rowid.
    pub fn last_insert_rowid(&self) -> i64 {
        let inner = self.lock();
        // SAFETY: db is valid
        unsafe { ffi::sqlite3_last_insert_rowid(inner.db) }
    }

    fn transition(&self, sql: &str, opening: bool) -> Result<()> {
        let mut inner = self.lock();
        if inner.in_transaction == opening {
            return Err(Error::Transaction(TransactionError {
                kind: if opening {
                    TransactionErrorKind::AlreadyActive
                } else {
                    TransactionErrorKind::NotActive
                },
                message: if opening {
                    "Already in a transaction".to_string()
                } else {
                    "Not in a transaction".to_string()
                },
            }));
        }
        exec_raw(inner.db, sql)?;
        inner.in_transaction = opening;
        tracing::trace!(target: "sqlmapper::sqlite", statement = sql, "Transaction state changed");
        Ok(())
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        let inner = self
            .inner
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if !inner.db.is_null() {
            // SAFETY: db is valid and no statements outlive their call
            unsafe {
                ffi::sqlite3_close_v2(inner.db);
            }
            inner.db = ptr::null_mut();
        }
    }
}

impl Connection for SqliteConnection {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let inner = self.lock();
        let stmt = prepare_bound(inner.db, sql, params)?;

        // SAFETY: stmt is valid
        let col_count = unsafe { ffi::sqlite3_column_count(stmt.0) };
        let col_names = (0..col_count)
            // SAFETY: stmt is valid and i < col_count
            .map(|i| unsafe { types::column_name(stmt.0, i) }.unwrap_or_else(|| format!("col{}", i)))
            .collect();
        let columns = Arc::new(ColumnInfo::new(col_names));

        let mut rows = Vec::new();
        loop {
            // SAFETY: stmt is valid
            let rc = unsafe { ffi::sqlite3_step(stmt.0) };
            match rc {
                ffi::SQLITE_ROW => {
                    let values = (0..col_count)
                        // SAFETY: we just got SQLITE_ROW and i < col_count
                        .map(|i| unsafe { types::read_column(stmt.0, i) })
                        .collect();
                    rows.push(Row::with_columns(Arc::clone(&columns), values));
                }
                ffi::SQLITE_DONE => break,
                _ => return Err(step_error(inner.db, sql)),
            }
        }

        Ok(rows)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let inner = self.lock();
        let stmt = prepare_bound(inner.db, sql, params)?;

        // SAFETY: stmt is valid
        let rc = unsafe { ffi::sqlite3_step(stmt.0) };
        drop(stmt);

        match rc {
            ffi::SQLITE_DONE | ffi::SQLITE_ROW => {
                // SAFETY: db is valid
                let changes = unsafe { ffi::sqlite3_changes(inner.db) };
                Ok(changes.max(0) as u64)
            }
            _ => Err(step_error(inner.db, sql)),
        }
    }

    fn insert(&self, sql: &str, params: &[Value]) -> Result<i64> {
        self.execute(sql, params)?;
        Ok(self.last_insert_rowid())
    }

    fn begin_with(&self, isolation: IsolationLevel) -> Result<()> {
        // SQLite has no isolation levels; approximate with locking modes.
        let begin_sql = match isolation {
            IsolationLevel::Serializable => "BEGIN EXCLUSIVE",
            IsolationLevel::RepeatableRead | IsolationLevel::ReadCommitted => "BEGIN IMMEDIATE",
            IsolationLevel::ReadUncommitted => "BEGIN DEFERRED",
        };
        self.transition(begin_sql, true)
    }

    fn commit(&self) -> Result<()> {
        self.transition("COMMIT", false)
    }

    fn rollback(&self) -> Result<()> {
        self.transition("ROLLBACK", false)
    }

    fn in_transaction(&self) -> bool {
        self.lock().in_transaction
    }
}

fn exec_raw(db: *mut ffi::sqlite3, sql: &str) -> Result<()> {
    let c_sql = CString::new(sql).map_err(|_| null_byte_error(sql))?;
    let mut errmsg: *mut std::ffi::c_char = ptr::null_mut();

    // SAFETY: All pointers are valid
    let rc = unsafe { ffi::sqlite3_exec(db, c_sql.as_ptr(), None, ptr::null_mut(), &mut errmsg) };

    if rc != ffi::SQLITE_OK {
        let msg = if errmsg.is_null() {
            ffi::error_string(rc).to_string()
        } else {
            // SAFETY: errmsg was allocated by sqlite and must be freed by it
            unsafe {
                let msg = CStr::from_ptr(errmsg).to_string_lossy().into_owned();
                ffi::sqlite3_free(errmsg.cast());
                msg
            }
        };

        return Err(Error::Execution(ExecutionError {
            kind: error_code_to_kind(rc),
            sql: Some(sql.to_string()),
            message: msg,
            source: None,
        }));
    }

    Ok(())
}

fn prepare_bound(db: *mut ffi::sqlite3, sql: &str, params: &[Value]) -> Result<PreparedStmt> {
    let c_sql = CString::new(sql).map_err(|_| null_byte_error(sql))?;
    let mut raw: *mut ffi::sqlite3_stmt = ptr::null_mut();

    // SAFETY: All pointers are valid
    let rc = unsafe {
        ffi::sqlite3_prepare_v2(
            db,
            c_sql.as_ptr(),
            c_sql.as_bytes().len() as c_int,
            &mut raw,
            ptr::null_mut(),
        )
    };

    if rc != ffi::SQLITE_OK || raw.is_null() {
        return Err(step_error(db, sql));
    }
    let stmt = PreparedStmt(raw);

    // SAFETY: stmt is valid
    let expected = unsafe { ffi::sqlite3_bind_parameter_count(stmt.0) } as usize;
    if expected != params.len() {
        return Err(Error::Execution(ExecutionError {
            kind: ExecutionErrorKind::Bind,
            sql: Some(sql.to_string()),
            message: format!(
                "Statement expects {} parameters, {} supplied",
                expected,
                params.len()
            ),
            source: None,
        }));
    }

    for (i, param) in params.iter().enumerate() {
        // SAFETY: stmt is valid, index is 1-based and within bounds
        let rc = unsafe { types::bind_value(stmt.0, (i + 1) as c_int, param) };
        if rc != ffi::SQLITE_OK {
            return Err(Error::Execution(ExecutionError {
                kind: ExecutionErrorKind::Bind,
                sql: Some(sql.to_string()),
                // SAFETY: db is valid
                message: format!("Failed to bind parameter {}: {}", i + 1, unsafe {
                    ffi::last_error_message(db)
                }),
                source: None,
            }));
        }
    }

    Ok(stmt)
}

fn null_byte_error(sql: &str) -> Error {
    Error::Execution(ExecutionError {
        kind: ExecutionErrorKind::Syntax,
        sql: Some(sql.to_string()),
        message: "SQL contains null byte".to_string(),
        source: None,
    })
}

fn step_error(db: *mut ffi::sqlite3, sql: &str) -> Error {
    // SAFETY: db is valid
    let (msg, code) = unsafe { (ffi::last_error_message(db), ffi::sqlite3_errcode(db)) };

    Error::Execution(ExecutionError {
        kind: error_code_to_kind(code),
        sql: Some(sql.to_string()),
        message: msg,
        source: None,
    })
}

fn error_code_to_kind(code: c_int) -> ExecutionErrorKind {
    match code & 0xff {
        ffi::SQLITE_CONSTRAINT => ExecutionErrorKind::Constraint,
        ffi::SQLITE_BUSY | ffi::SQLITE_LOCKED => ExecutionErrorKind::Busy,
        ffi::SQLITE_PERM | ffi::SQLITE_AUTH | ffi::SQLITE_READONLY => {
            ExecutionErrorKind::Permission
        }
        ffi::SQLITE_NOTFOUND => ExecutionErrorKind::NotFound,
        ffi::SQLITE_TOOBIG => ExecutionErrorKind::DataTruncation,
        ffi::SQLITE_INTERRUPT => ExecutionErrorKind::Interrupted,
        ffi::SQLITE_RANGE | ffi::SQLITE_MISMATCH => ExecutionErrorKind::Bind,
        _ => ExecutionErrorKind::Database,
    }
}
