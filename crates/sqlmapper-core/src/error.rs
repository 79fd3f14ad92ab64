//! Error types for SQLMapper operations.

use std::fmt;
use std::sync::Arc;

/// The primary error type for all SQLMapper operations.
#[derive(Debug)]
pub enum Error {
    /// Connection-related errors (open, disconnect)
    Connection(ConnectionError),
    /// A statement failed inside the store
    Execution(ExecutionError),
    /// Type conversion errors
    Type(TypeError),
    /// Transaction bookkeeping errors
    Transaction(TransactionError),
    /// Configuration errors (bad templates, dangling result-map references)
    Config(ConfigError),
    /// No statement is registered under this identifier
    UnknownStatement(String),
    /// No mapper namespace is declared under this name
    UnknownMapper(String),
    /// A placeholder referenced a parameter the parameter object lacks
    ParameterMismatch(ParameterError),
    /// A single-result selection resolved to more than one entity
    NonUniqueResult(NonUniqueError),
    /// Rows could not be mapped onto the declared result map
    Mapping(MappingError),
    /// The session was used after `close()`
    SessionClosed,
    /// A lazy association failed to resolve; re-raised on every access
    LazyLoad(LazyLoadError),
    /// Serialization/deserialization errors
    Serde(String),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to establish connection
    Connect,
    /// Connection lost during operation
    Disconnected,
}

/// A fault reported by the underlying store while running a statement.
#[derive(Debug)]
pub struct ExecutionError {
    pub kind: ExecutionErrorKind,
    pub sql: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// Constraint violation (unique, foreign key, etc.)
    Constraint,
    /// Table or column not found
    NotFound,
    /// Permission denied
    Permission,
    /// Data too large for column
    DataTruncation,
    /// Lock contention (busy / locked)
    Busy,
    /// Parameter could not be bound
    Bind,
    /// Interrupted
    Interrupted,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

#[derive(Debug)]
pub struct TransactionError {
    pub kind: TransactionErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    /// BEGIN issued while a transaction is open
    AlreadyActive,
    /// COMMIT or ROLLBACK issued with no open transaction
    NotActive,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterError {
    /// Statement whose template referenced the parameter
    pub statement: String,
    /// Parameter name or property path
    pub parameter: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonUniqueError {
    pub statement: String,
    pub found: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingError {
    /// Result map being applied
    pub result_map: String,
    /// Column involved, when the failure is about a specific column
    pub column: Option<String>,
    pub message: String,
}

/// Failure of a lazy association, shared by every re-raise.
#[derive(Debug, Clone)]
pub struct LazyLoadError {
    /// Association property on the owning entity
    pub property: String,
    pub cause: Arc<Error>,
}

impl Error {
    /// Is this a store-side statement failure (the ExecutionError category)?
    pub fn is_execution_error(&self) -> bool {
        matches!(self, Error::Execution(_) | Error::Connection(_))
    }

    /// Is this a retryable error (lock contention)?
    ///
    /// Nothing in this workspace retries on its own; callers decide.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Execution(e) => matches!(e.kind, ExecutionErrorKind::Busy),
            Error::LazyLoad(e) => e.cause.is_retryable(),
            _ => false,
        }
    }

    /// Is this a connection error that likely requires reconnection?
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Execution(e) => e.sql.as_deref(),
            _ => None,
        }
    }

    /// Shorthand for a mapping failure tied to a column.
    pub fn mapping(
        result_map: impl Into<String>,
        column: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Error::Mapping(MappingError {
            result_map: result_map.into(),
            column: column.map(str::to_string),
            message: message.into(),
        })
    }

    /// Shorthand for a configuration failure.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(ConfigError {
            message: message.into(),
            source: None,
        })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Execution(e) => write!(f, "Execution error: {}", e.message),
            Error::Type(e) => write!(f, "Type error: {}", e),
            Error::Transaction(e) => write!(f, "Transaction error: {}", e.message),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::UnknownStatement(id) => write!(f, "Unknown statement '{}'", id),
            Error::UnknownMapper(ns) => write!(f, "Unknown mapper namespace '{}'", ns),
            Error::ParameterMismatch(e) => write!(f, "Parameter mismatch: {}", e),
            Error::NonUniqueResult(e) => write!(f, "Non-unique result: {}", e),
            Error::Mapping(e) => write!(f, "Mapping error: {}", e),
            Error::SessionClosed => write!(f, "Session is closed"),
            Error::LazyLoad(e) => write!(f, "Lazy load failed: {}", e),
            Error::Serde(msg) => write!(f, "Serialization error: {}", msg),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Execution(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::LazyLoad(e) => Some(e.cause.as_ref()),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for ParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "statement '{}' references parameter '{}' which was not supplied",
            self.statement, self.parameter
        )
    }
}

impl fmt::Display for NonUniqueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "statement '{}' expected one result, found {}",
            self.statement, self.found
        )
    }
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.column {
            Some(col) => write!(
                f,
                "result map '{}', column '{}': {}",
                self.result_map, col, self.message
            ),
            None => write!(f, "result map '{}': {}", self.result_map, self.message),
        }
    }
}

impl fmt::Display for LazyLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "association '{}': {}", self.property, self.cause)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<ExecutionError> for Error {
    fn from(err: ExecutionError) -> Self {
        Error::Execution(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        Error::Transaction(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err.to_string())
    }
}

/// Result type alias for SQLMapper operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_error_helpers() {
        let err = Error::Execution(ExecutionError {
            kind: ExecutionErrorKind::Constraint,
            sql: Some("INSERT INTO blog VALUES (?)".to_string()),
            message: "UNIQUE constraint failed: blog.bid".to_string(),
            source: None,
        });

        assert!(err.is_execution_error());
        assert!(!err.is_retryable());
        assert_eq!(err.sql(), Some("INSERT INTO blog VALUES (?)"));
        assert_eq!(
            err.to_string(),
            "Execution error: UNIQUE constraint failed: blog.bid"
        );
    }

    #[test]
    fn busy_is_retryable_through_lazy_wrapper() {
        let busy = Error::Execution(ExecutionError {
            kind: ExecutionErrorKind::Busy,
            sql: None,
            message: "database is locked".to_string(),
            source: None,
        });
        let wrapped = Error::LazyLoad(LazyLoadError {
            property: "author".to_string(),
            cause: Arc::new(busy),
        });
        assert!(wrapped.is_retryable());
        assert!(std::error::Error::source(&wrapped).is_some());
    }

    #[test]
    fn structural_error_messages() {
        let err = Error::ParameterMismatch(ParameterError {
            statement: "BlogMapper.selectBlogById".to_string(),
            parameter: "bid".to_string(),
        });
        assert!(err.to_string().contains("'bid'"));

        let err = Error::NonUniqueResult(NonUniqueError {
            statement: "BlogMapper.selectBlogList".to_string(),
            found: 2,
        });
        assert!(err.to_string().contains("found 2"));

        let err = Error::mapping("BlogResultMap", Some("author_id"), "column missing");
        assert_eq!(
            err.to_string(),
            "Mapping error: result map 'BlogResultMap', column 'author_id': column missing"
        );
        assert!(!err.is_execution_error());
    }
}
