//! Statement registry for SQLMapper Rust.
//!
//! `sqlmapper-registry` is the **declaration layer**. Everything here is built
//! once, validated, and then only read:
//!
//! - [`Template`] parses `#{...}` (bound) and `${...}` (literal) placeholders
//! - [`Params`] is the parameter object placeholders are resolved against
//! - [`Statement`] is one registered SQL statement with its result spec
//! - [`ResultMap`] / [`Association`] describe how rows become entities
//! - [`StatementRegistry`] stores both, resolves `id + params` into
//!   executable SQL, and can fall back to a base registry
//! - [`Namespace`] / [`MapperCatalog`] group statements into mapper
//!   namespaces with inheritance flattened into lookup tables
//!
//! Execution and mapping live in `sqlmapper-session`.

pub mod namespace;
pub mod params;
pub mod registry;
pub mod result_map;
pub mod statement;
pub mod template;

pub use namespace::{MapperCatalog, MapperTable, Namespace};
pub use params::Params;
pub use registry::StatementRegistry;
pub use result_map::{
    Association, AssociationSource, Cardinality, FetchType, KeyColumn, PropertyMapping, ResultMap,
};
pub use statement::{ExecutableStatement, ResultSpec, Statement, StatementKind};
pub use template::{BindingMode, BoundSql, Placeholder, Template};
