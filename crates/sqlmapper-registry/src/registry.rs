//! The statement registry.
//!
//! Statements and result maps are registered once while a configuration is
//! being built, validated, and then shared read-only behind an `Arc`. A
//! registry may be derived from a base registry: lookups that miss locally
//! fall back to the base, and local registrations shadow base entries with the
//! same id.

use crate::params::Params;
use crate::result_map::{AssociationSource, ResultMap};
use crate::statement::{ExecutableStatement, ResultSpec, Statement, StatementKind};
use crate::template::BindingMode;
use sqlmapper_core::{Error, Result};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Registry of statements and result maps keyed by id.
#[derive(Debug, Default, Clone)]
pub struct StatementRegistry {
    statements: HashMap<String, Arc<Statement>>,
    result_maps: HashMap<String, Arc<ResultMap>>,
    base: Option<Arc<StatementRegistry>>,
}

impl StatementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry that falls back to `base` for unknown ids.
    pub fn derive(base: Arc<StatementRegistry>) -> Self {
        Self {
            base: Some(base),
            ..Self::default()
        }
    }

    /// The registry this one falls back to, if any.
    pub fn base(&self) -> Option<&Arc<StatementRegistry>> {
        self.base.as_ref()
    }

    /// Register a statement. Ids must be unique within this registry.
    pub fn register(&mut self, statement: Statement) -> Result<()> {
        if self.statements.contains_key(statement.id()) {
            return Err(Error::config(format!(
                "statement '{}' is already registered",
                statement.id()
            )));
        }
        tracing::trace!(
            statement = statement.id(),
            kind = ?statement.kind(),
            "Registered statement"
        );
        self.statements
            .insert(statement.id().to_string(), Arc::new(statement));
        Ok(())
    }

    /// Register a statement from its raw parts.
    ///
    /// The statement kind is inferred from the leading SQL keyword.
    pub fn register_template(
        &mut self,
        id: &str,
        template: &str,
        binding: BindingMode,
        result_map: Option<&str>,
    ) -> Result<()> {
        let kind = StatementKind::infer(template).ok_or_else(|| {
            Error::config(format!(
                "statement '{}': cannot infer statement kind from template",
                id
            ))
        })?;
        let mut statement = Statement::new(id, kind, template)?.binding(binding)?;
        if let Some(map) = result_map {
            statement = statement.result_map(map);
        }
        self.register(statement)
    }

    /// Register a result map. Ids must be unique within this registry.
    pub fn add_result_map(&mut self, result_map: ResultMap) -> Result<()> {
        let id = result_map.result_map_id().to_string();
        if self.result_maps.contains_key(&id) {
            return Err(Error::config(format!(
                "result map '{}' is already registered",
                id
            )));
        }
        self.result_maps.insert(id, Arc::new(result_map));
        Ok(())
    }

    /// Look up a statement, falling back to the base registry.
    pub fn statement(&self, id: &str) -> Result<&Arc<Statement>> {
        self.find_statement(id)
            .ok_or_else(|| Error::UnknownStatement(id.to_string()))
    }

    fn find_statement(&self, id: &str) -> Option<&Arc<Statement>> {
        self.statements
            .get(id)
            .or_else(|| self.base.as_ref()?.find_statement(id))
    }

    /// Look up a result map, falling back to the base registry.
    pub fn result_map(&self, id: &str) -> Option<&Arc<ResultMap>> {
        self.result_maps
            .get(id)
            .or_else(|| self.base.as_ref()?.result_map(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find_statement(id).is_some()
    }

    /// Every visible statement id, local and inherited.
    pub fn statement_ids(&self) -> BTreeSet<&str> {
        let mut ids: BTreeSet<&str> = self
            .base
            .as_ref()
            .map(|base| base.statement_ids())
            .unwrap_or_default();
        ids.extend(self.statements.keys().map(String::as_str));
        ids
    }

    /// Number of visible statements.
    pub fn len(&self) -> usize {
        self.statement_ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty() && self.base.as_ref().is_none_or(|base| base.is_empty())
    }

    /// Resolve a statement id and parameter object into executable SQL.
    pub fn resolve(&self, id: &str, params: &Params) -> Result<ExecutableStatement> {
        let statement = Arc::clone(self.statement(id)?);
        let bound = statement.bind(params)?;
        Ok(ExecutableStatement::new(statement, bound))
    }

    /// Check every cross reference.
    ///
    /// Statement result maps, nested result maps and secondary statements must
    /// exist, query associations need at least one key column, and nested
    /// result maps must not form a cycle.
    pub fn validate(&self) -> Result<()> {
        for statement in self.statements.values() {
            if let ResultSpec::Map(map) = statement.result() {
                if self.result_map(map).is_none() {
                    return Err(Error::config(format!(
                        "statement '{}' references unknown result map '{}'",
                        statement.id(),
                        map
                    )));
                }
            }
        }

        for map in self.result_maps.values() {
            for association in map.associations() {
                match &association.source {
                    AssociationSource::Nested { result_map, .. } => {
                        if self.result_map(result_map).is_none() {
                            return Err(Error::config(format!(
                                "result map '{}' property '{}' references unknown result map '{}'",
                                map.result_map_id(),
                                association.property,
                                result_map
                            )));
                        }
                    }
                    AssociationSource::Query {
                        statement, keys, ..
                    } => {
                        let target = self.find_statement(statement).ok_or_else(|| {
                            Error::config(format!(
                                "result map '{}' property '{}' references unknown statement '{}'",
                                map.result_map_id(),
                                association.property,
                                statement
                            ))
                        })?;
                        if target.kind() != StatementKind::Select {
                            return Err(Error::config(format!(
                                "result map '{}' property '{}' must reference a select, '{}' is not one",
                                map.result_map_id(),
                                association.property,
                                statement
                            )));
                        }
                        if keys.is_empty() {
                            return Err(Error::config(format!(
                                "result map '{}' property '{}' has no key column",
                                map.result_map_id(),
                                association.property
                            )));
                        }
                    }
                }
            }
        }

        let mut finished = HashSet::new();
        for id in self.result_maps.keys() {
            self.check_nesting(id, &mut Vec::new(), &mut finished)?;
        }
        Ok(())
    }

    fn check_nesting<'a>(
        &'a self,
        id: &'a str,
        path: &mut Vec<&'a str>,
        finished: &mut HashSet<&'a str>,
    ) -> Result<()> {
        if finished.contains(id) {
            return Ok(());
        }
        if path.contains(&id) {
            path.push(id);
            return Err(Error::config(format!(
                "nested result maps form a cycle: {}",
                path.join(" -> ")
            )));
        }
        let Some(map) = self.result_map(id) else {
            return Ok(());
        };
        path.push(id);
        for association in map.associations() {
            if let AssociationSource::Nested { result_map, .. } = &association.source {
                self.check_nesting(result_map, path, finished)?;
            }
        }
        path.pop();
        finished.insert(id);
        Ok(())
    }
}
