//! SQLite store for SQLMapper Rust.
//!
// FFI bindings require unsafe code - this is expected for database drivers
#![allow(unsafe_code)]
//!
//! This crate implements the `Connection` trait from sqlmapper-core on top of
//! the `libsqlite3-sys` bindings. `SqliteConfig` doubles as a `DataSource`, so
//! it can be handed straight to a session factory.
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlmapper_sqlite::{SqliteConnection, SqliteConfig};
//! use sqlmapper_core::{Connection, Value};
//!
//! let conn = SqliteConnection::open_memory()?;
//! conn.execute_raw("CREATE TABLE blog (bid INTEGER PRIMARY KEY, name TEXT)")?;
//! let id = conn.insert("INSERT INTO blog (name) VALUES (?)", &[Value::Text("RabbitMQ".into())])?;
//! ```
//!
//! # Type Mapping
//!
//! | Value variant | SQLite Type |
//! |---------------|-------------|
//! | `Bool` | INTEGER (0/1) |
//! | `Int`, `BigInt` | INTEGER |
//! | `Double` | REAL |
//! | `Text` | TEXT |
//! | `Bytes` | BLOB |
//! | `Json` | TEXT |
//! | `Null` | NULL |
//!
//! # Thread Safety
//!
//! `SqliteConnection` is both `Send` and `Sync`; the raw handle lives behind a
//! mutex so a lazy association resolving on another thread can share it.

pub mod connection;
pub mod ffi;
pub mod types;

pub use connection::{OpenFlags, SqliteConfig, SqliteConnection};

/// Re-export the SQLite library version.
pub fn sqlite_version() -> &'static str {
    ffi::version()
}

/// Re-export the SQLite library version number.
pub fn sqlite_version_number() -> i32 {
    ffi::version_number()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_version() {
        let version = sqlite_version();
        assert!(version.starts_with('3'));
        assert!(sqlite_version_number() >= 3_000_000);
    }
}
