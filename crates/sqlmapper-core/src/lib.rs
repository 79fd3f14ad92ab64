//! Core types and traits for SQLMapper Rust.
//!
//! This crate provides the foundations shared by every other crate in the
//! workspace:
//!
//! - `Value` for parameters, row cells and entity scalars
//! - `Row` / `ColumnInfo` for raw tabular results
//! - `Connection` / `DataSource` for the store boundary
//! - `Error` for the whole error taxonomy

pub mod connection;
pub mod error;
pub mod row;
pub mod value;

pub use connection::{Connection, DataSource, IsolationLevel};
pub use error::{
    ConfigError, ConnectionError, ConnectionErrorKind, Error, ExecutionError, ExecutionErrorKind,
    LazyLoadError, MappingError, NonUniqueError, ParameterError, Result, TransactionError,
    TransactionErrorKind, TypeError,
};
pub use row::{ColumnInfo, FromValue, Row};
pub use value::{Value, ValueKey};
