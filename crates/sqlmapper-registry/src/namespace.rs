//! Mapper namespaces and their operation tables.
//!
//! A [`Namespace`] groups statements and result maps under a name such as
//! `BlogMapper`. Its statements are registered as `BlogMapper.selectBlogById`,
//! and a mapper handle later calls them by the short operation name.
//!
//! A namespace may extend another. The derived namespace inherits every
//! operation of its ancestors and may override any of them by declaring a
//! statement with the same short name. Inheritance is flattened into a
//! [`MapperTable`] once, at build time, so dispatch is a single map lookup.

use crate::registry::StatementRegistry;
use crate::result_map::{AssociationSource, ResultMap};
use crate::statement::{ResultSpec, Statement};
use sqlmapper_core::{Error, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// A mapper namespace declaration.
#[derive(Debug, Clone)]
pub struct Namespace {
    name: String,
    extends: Option<String>,
    statements: Vec<Statement>,
    result_maps: Vec<ResultMap>,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extends: None,
            statements: Vec::new(),
            result_maps: Vec::new(),
        }
    }

    /// Inherit the operations of `parent`.
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }

    /// Declare a statement; its id is the operation name.
    pub fn statement(mut self, statement: Statement) -> Self {
        self.statements.push(statement);
        self
    }

    /// Declare a result map local to this namespace.
    pub fn result_map(mut self, result_map: ResultMap) -> Self {
        self.result_maps.push(result_map);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&str> {
        self.extends.as_deref()
    }

    fn qualify(&self, local: &str) -> String {
        format!("{}.{}", self.name, local)
    }
}

/// Flattened operation table of one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapperTable {
    namespace: String,
    operations: BTreeMap<String, String>,
}

impl MapperTable {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Qualified statement id behind an operation name.
    pub fn qualified(&self, operation: &str) -> Result<&str> {
        self.operations
            .get(operation)
            .map(String::as_str)
            .ok_or_else(|| Error::UnknownStatement(format!("{}.{}", self.namespace, operation)))
    }

    /// Operation names with their qualified statement ids.
    pub fn operations(&self) -> impl Iterator<Item = (&str, &str)> {
        self.operations
            .iter()
            .map(|(op, id)| (op.as_str(), id.as_str()))
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Every namespace's flattened table, keyed by namespace name.
#[derive(Debug, Clone, Default)]
pub struct MapperCatalog {
    tables: HashMap<String, Arc<MapperTable>>,
}

impl MapperCatalog {
    /// Register each namespace's statements and result maps into `registry`
    /// and flatten the inheritance chains.
    ///
    /// Unqualified references (a statement's result map, an association's
    /// nested map or secondary statement) resolve to the namespace's own
    /// declaration when it has one, and are left as written otherwise.
    pub fn build(namespaces: Vec<Namespace>, registry: &mut StatementRegistry) -> Result<Self> {
        let mut declared: HashMap<String, Namespace> = HashMap::new();
        for ns in namespaces {
            if declared.contains_key(&ns.name) {
                return Err(Error::config(format!(
                    "mapper namespace '{}' is declared twice",
                    ns.name
                )));
            }
            declared.insert(ns.name.clone(), ns);
        }

        let mut own_ops: HashMap<&str, BTreeMap<String, String>> = HashMap::new();
        for ns in declared.values() {
            let local_maps: HashSet<&str> = ns
                .result_maps
                .iter()
                .map(ResultMap::result_map_id)
                .collect();
            let local_stmts: HashSet<&str> = ns.statements.iter().map(Statement::id).collect();
            let resolve = |reference: &str, local: &HashSet<&str>| {
                if local.contains(reference) {
                    ns.qualify(reference)
                } else {
                    reference.to_string()
                }
            };

            for map in &ns.result_maps {
                let mut map = map.clone().rename(ns.qualify(map.result_map_id()));
                for association in map.associations_mut() {
                    match &mut association.source {
                        AssociationSource::Nested { result_map, .. } => {
                            *result_map = resolve(result_map, &local_maps);
                        }
                        AssociationSource::Query { statement, .. } => {
                            *statement = resolve(statement, &local_stmts);
                        }
                    }
                }
                registry.add_result_map(map)?;
            }

            let mut ops = BTreeMap::new();
            for statement in &ns.statements {
                let local = statement.id().to_string();
                let qualified = ns.qualify(&local);
                let mut statement = statement.clone().rename(qualified.clone());
                if let ResultSpec::Map(map) = statement.result() {
                    let map = resolve(map, &local_maps);
                    statement.set_result(ResultSpec::Map(map));
                }
                registry.register(statement)?;
                ops.insert(local, qualified);
            }
            own_ops.insert(ns.name.as_str(), ops);
        }

        let mut tables = HashMap::new();
        for ns in declared.values() {
            let mut chain = vec![ns];
            let mut seen = HashSet::from([ns.name.as_str()]);
            let mut current = ns;
            while let Some(parent) = current.parent() {
                let parent_ns = declared.get(parent).ok_or_else(|| {
                    Error::config(format!(
                        "mapper namespace '{}' extends unknown namespace '{}'",
                        current.name, parent
                    ))
                })?;
                if !seen.insert(parent_ns.name.as_str()) {
                    return Err(Error::config(format!(
                        "mapper namespace '{}' has an inheritance cycle through '{}'",
                        ns.name, parent
                    )));
                }
                chain.push(parent_ns);
                current = parent_ns;
            }

            // Root ancestor first so that descendants override.
            let mut operations = BTreeMap::new();
            for link in chain.iter().rev() {
                if let Some(ops) = own_ops.get(link.name.as_str()) {
                    operations.extend(ops.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }

            tracing::debug!(
                namespace = %ns.name,
                operations = operations.len(),
                depth = chain.len(),
                "Built mapper table"
            );
            tables.insert(
                ns.name.clone(),
                Arc::new(MapperTable {
                    namespace: ns.name.clone(),
                    operations,
                }),
            );
        }

        Ok(Self { tables })
    }

    /// Table for a namespace.
    pub fn table(&self, namespace: &str) -> Result<&Arc<MapperTable>> {
        self.tables
            .get(namespace)
            .ok_or_else(|| Error::UnknownMapper(namespace.to_string()))
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Params;
    use crate::result_map::Association;

    fn blog_mapper() -> Namespace {
        Namespace::new("BlogMapper")
            .result_map(
                ResultMap::new("BlogWithAuthor", "BlogAndAuthor")
                    .id("bid", "bid")
                    .association(Association::query_one("author", "selectAuthor", "author_id")),
            )
            .statement(
                Statement::select("selectBlogById", "SELECT * FROM blog WHERE bid = #{bid}")
                    .unwrap()
                    .result_map("BlogWithAuthor"),
            )
            .statement(
                Statement::select("selectAuthor", "SELECT * FROM author WHERE author_id = #{id}")
                    .unwrap(),
            )
    }

    fn blog_mapper_ext() -> Namespace {
        Namespace::new("BlogMapperExt").extends("BlogMapper").statement(
            Statement::select("selectBlogByName", "SELECT * FROM blog WHERE name = #{name}")
                .unwrap(),
        )
    }

    #[test]
    fn statements_are_qualified() {
        let mut registry = StatementRegistry::new();
        let catalog = MapperCatalog::build(vec![blog_mapper()], &mut registry).unwrap();
        registry.validate().unwrap();

        let table = catalog.table("BlogMapper").unwrap();
        assert_eq!(
            table.qualified("selectBlogById").unwrap(),
            "BlogMapper.selectBlogById"
        );
        let stmt = registry.statement("BlogMapper.selectBlogById").unwrap();
        assert_eq!(
            stmt.result(),
            &ResultSpec::Map("BlogMapper.BlogWithAuthor".into())
        );
        let map = registry.result_map("BlogMapper.BlogWithAuthor").unwrap();
        assert!(matches!(
            &map.associations()[0].source,
            AssociationSource::Query { statement, .. } if statement == "BlogMapper.selectAuthor"
        ));
    }

    #[test]
    fn derived_namespace_inherits_operations() {
        let mut registry = StatementRegistry::new();
        let catalog =
            MapperCatalog::build(vec![blog_mapper_ext(), blog_mapper()], &mut registry).unwrap();

        let ext = catalog.table("BlogMapperExt").unwrap();
        assert_eq!(
            ext.qualified("selectBlogByName").unwrap(),
            "BlogMapperExt.selectBlogByName"
        );
        assert_eq!(
            ext.qualified("selectBlogById").unwrap(),
            "BlogMapper.selectBlogById"
        );
        assert_eq!(ext.len(), 3);

        let base = catalog.table("BlogMapper").unwrap();
        assert!(base.qualified("selectBlogByName").is_err());

        let exec = registry
            .resolve(ext.qualified("selectBlogById").unwrap(), &Params::from(1))
            .unwrap();
        assert_eq!(exec.sql, "SELECT * FROM blog WHERE bid = ?");
    }

    #[test]
    fn derived_namespace_overrides() {
        let ext = blog_mapper_ext().statement(
            Statement::select("selectBlogById", "SELECT bid FROM blog WHERE bid = #{bid}").unwrap(),
        );
        let mut registry = StatementRegistry::new();
        let catalog = MapperCatalog::build(vec![blog_mapper(), ext], &mut registry).unwrap();
        assert_eq!(
            catalog
                .table("BlogMapperExt")
                .unwrap()
                .qualified("selectBlogById")
                .unwrap(),
            "BlogMapperExt.selectBlogById"
        );
    }

    #[test]
    fn inheritance_errors() {
        let mut registry = StatementRegistry::new();
        assert!(MapperCatalog::build(vec![blog_mapper_ext()], &mut registry).is_err());

        let mut registry = StatementRegistry::new();
        let a = Namespace::new("A").extends("B");
        let b = Namespace::new("B").extends("A");
        let err = MapperCatalog::build(vec![a, b], &mut registry).unwrap_err();
        assert!(err.to_string().contains("cycle"));

        let mut registry = StatementRegistry::new();
        assert!(
            MapperCatalog::build(vec![Namespace::new("A"), Namespace::new("A")], &mut registry)
                .is_err()
        );
    }

    #[test]
    fn unknown_namespace_and_operation() {
        let mut registry = StatementRegistry::new();
        let catalog = MapperCatalog::build(vec![blog_mapper()], &mut registry).unwrap();
        assert!(matches!(
            catalog.table("AuthorMapper"),
            Err(Error::UnknownMapper(name)) if name == "AuthorMapper"
        ));
        assert!(matches!(
            catalog.table("BlogMapper").unwrap().qualified("deleteAll"),
            Err(Error::UnknownStatement(id)) if id == "BlogMapper.deleteAll"
        ));
    }
}
