//! SQLMapper Rust - statement-centric data mapping.
//!
//! SQL stays SQL. Statements are declared once under an id, with `#{...}`
//! placeholders bound as driver parameters and `${...}` placeholders pasted
//! in as text. Rows come back as entity graphs shaped by result maps:
//!
//! - one-to-one and one-to-many associations built from joined columns in a
//!   single pass (nested results)
//! - associations fetched by a secondary statement (nested queries), either
//!   while mapping or lazily on first access
//! - logical or physical pagination
//! - mapper namespaces with inheritance
//!
//! # Quick Start
//!
//! ```ignore
//! use sqlmapper::prelude::*;
//!
//! let config = Configuration::builder()
//!     .namespace(
//!         Namespace::new("BlogMapper")
//!             .result_map(
//!                 ResultMap::new("BlogWithAuthor", "Blog")
//!                     .id("bid", "bid")
//!                     .result("name", "name")
//!                     .association(Association::query_one("author", "selectAuthor", "author_id")),
//!             )
//!             .statement(
//!                 Statement::select("selectBlogById", "SELECT * FROM blog WHERE bid = #{bid}")?
//!                     .result_map("BlogWithAuthor"),
//!             )
//!             .statement(Statement::select(
//!                 "selectAuthor",
//!                 "SELECT * FROM author WHERE author_id = #{author_id}",
//!             )?),
//!     )
//!     .settings(Settings::default().lazy_loading(true))
//!     .build()?;
//!
//! let factory = SessionFactory::new(config, SqliteConfig::file("blog.db"));
//! let session = factory.open_session()?;
//! let mapper = session.mapper("BlogMapper")?;
//!
//! let blog = mapper.select_one("selectBlogById", 1)?.expect("blog 1");
//! let author = blog.one("author")?; // secondary select runs here
//!
//! session.commit()?;
//! ```

mod factory;

pub use factory::SessionFactory;

pub use sqlmapper_core::{
    ColumnInfo, Connection, DataSource, Error, FromValue, IsolationLevel, Result, Row, Value,
};

pub use sqlmapper_registry::{
    Association, AssociationSource, BindingMode, Cardinality, ExecutableStatement, FetchType,
    KeyColumn, MapperCatalog, MapperTable, Namespace, Params, ResultMap, ResultSpec, Statement,
    StatementKind, StatementRegistry, Template,
};

pub use sqlmapper_session::{
    AssociationLoader, AutoMappingBehavior, Configuration, ConfigurationBuilder, Entity,
    LazyAssociation, LazyState, LocalCacheScope, Loaded, Mapper, N1Stats, Pagination, Property,
    RowBounds, Session, SessionStats, Settings, window,
};

#[cfg(feature = "sqlite")]
pub use sqlmapper_sqlite::{SqliteConfig, SqliteConnection};

/// Error payload types, for matching on [`Error`] variants.
pub mod error {
    pub use sqlmapper_core::error::*;
}

/// Common imports.
///
/// ```ignore
/// use sqlmapper::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Association, AutoMappingBehavior, Configuration, Entity, Error, FetchType, Mapper,
        Namespace, Pagination, Params, Result, ResultMap, RowBounds, Session, SessionFactory,
        Settings, Statement, Value,
    };

    #[cfg(feature = "sqlite")]
    pub use crate::SqliteConfig;
}
