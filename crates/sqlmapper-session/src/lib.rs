//! Sessions, execution and result mapping for SQLMapper Rust.
//!
//! `sqlmapper-session` is the **runtime layer**. It turns the declarations of
//! `sqlmapper-registry` into work against a store connection.
//!
//! # Role In The Architecture
//!
//! - **Configuration**: [`Settings`] plus the validated registry and mapper
//!   tables, shared read-only by every session.
//! - **Executor**: runs resolved statements, keeps the session-level cache and
//!   opens the write transaction.
//! - **Result mapping**: groups joined rows into entity graphs and installs
//!   nested-query associations, lazily or eagerly.
//! - **Lazy associations**: single-flight deferred fetches.
//! - **Session**: the caller-facing unit of work.
//!
//! # Example
//!
//! ```ignore
//! let session = Session::open(config, Box::new(conn), false);
//!
//! let blog = session.select_one("BlogMapper.selectBlogById", 1)?;
//! session.insert("BlogMapper.insertBlog", Params::bean(&new_blog)?)?;
//! session.commit()?;
//!
//! let page = session.select_list_with(
//!     "BlogMapper.selectBlogList",
//!     (),
//!     Pagination::Logical(RowBounds::new(0, 5)),
//! )?;
//! ```

pub mod config;
pub mod entity;
pub mod executor;
pub mod lazy;
pub mod mapper;
pub mod n1_detection;
pub mod pagination;
pub mod result_mapper;
pub mod session;

pub use config::{AutoMappingBehavior, Configuration, ConfigurationBuilder, LocalCacheScope, Settings};
pub use entity::{Entity, Property};
pub use executor::{Executor, ExecutorStats};
pub use lazy::{AssociationLoader, LazyAssociation, LazyState, LoadRequest, Loaded};
pub use mapper::Mapper;
pub use n1_detection::{N1QueryTracker, N1Stats};
pub use pagination::{Pagination, RowBounds, window};
pub use result_mapper::ResultMapper;
pub use session::{Session, SessionStats};
