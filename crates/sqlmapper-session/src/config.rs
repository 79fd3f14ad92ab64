//! Engine settings and the immutable configuration sessions share.

use serde::{Deserialize, Serialize};
use sqlmapper_core::{ConfigError, Error, Result};
use sqlmapper_registry::{
    MapperCatalog, MapperTable, Namespace, ResultMap, Statement, StatementRegistry,
};
use std::sync::Arc;

/// Which unmapped columns are copied onto entities automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoMappingBehavior {
    /// Only explicitly mapped columns.
    None,
    /// Unmapped columns, unless the result involves nested result maps.
    #[default]
    Partial,
    /// Unmapped columns everywhere, nested entities included.
    Full,
}

/// Lifetime of the session-level result cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalCacheScope {
    /// Identical selects within a session reuse the first result.
    #[default]
    Session,
    /// Nothing is cached across statements.
    Statement,
}

/// Engine-wide behavior switches.
///
/// Every field has a default, so a JSON document only needs the keys it
/// changes:
///
/// ```rust,ignore
/// let settings = Settings::from_json(r#"{ "lazy_loading_enabled": true }"#)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Defer query associations until first access.
    pub lazy_loading_enabled: bool,
    /// The first association access on an entity loads all of its lazy
    /// associations.
    pub aggressive_lazy_loading: bool,
    pub auto_mapping: AutoMappingBehavior,
    /// Auto-mapped `author_id` becomes property `authorId`.
    pub map_underscore_to_camel_case: bool,
    pub local_cache_scope: LocalCacheScope,
    /// Nested-query loads per (entity type, property) before an N+1 warning;
    /// `None` disables detection.
    pub n1_threshold: Option<usize>,
    /// Whether `SessionFactory::open_session` commits every write on its own.
    pub default_auto_commit: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            lazy_loading_enabled: false,
            aggressive_lazy_loading: false,
            auto_mapping: AutoMappingBehavior::Partial,
            map_underscore_to_camel_case: false,
            local_cache_scope: LocalCacheScope::Session,
            n1_threshold: Some(3),
            default_auto_commit: false,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse settings from a JSON object.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            Error::Config(ConfigError {
                message: format!("invalid settings: {e}"),
                source: Some(Box::new(e)),
            })
        })
    }

    pub fn lazy_loading(mut self, enabled: bool) -> Self {
        self.lazy_loading_enabled = enabled;
        self
    }

    pub fn aggressive_lazy_loading(mut self, enabled: bool) -> Self {
        self.aggressive_lazy_loading = enabled;
        self
    }

    pub fn auto_mapping(mut self, behavior: AutoMappingBehavior) -> Self {
        self.auto_mapping = behavior;
        self
    }

    pub fn map_underscore_to_camel_case(mut self, enabled: bool) -> Self {
        self.map_underscore_to_camel_case = enabled;
        self
    }

    pub fn local_cache_scope(mut self, scope: LocalCacheScope) -> Self {
        self.local_cache_scope = scope;
        self
    }

    pub fn n1_threshold(mut self, threshold: Option<usize>) -> Self {
        self.n1_threshold = threshold;
        self
    }

    pub fn default_auto_commit(mut self, enabled: bool) -> Self {
        self.default_auto_commit = enabled;
        self
    }
}

/// Validated, read-only configuration shared by every session.
#[derive(Debug)]
pub struct Configuration {
    settings: Settings,
    registry: StatementRegistry,
    mappers: MapperCatalog,
}

impl Configuration {
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::default()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &StatementRegistry {
        &self.registry
    }

    /// Flattened operation table of a mapper namespace.
    pub fn mapper_table(&self, namespace: &str) -> Result<&Arc<MapperTable>> {
        self.mappers.table(namespace)
    }

    pub fn mappers(&self) -> &MapperCatalog {
        &self.mappers
    }
}

/// Collects declarations, then validates them into a [`Configuration`].
#[derive(Debug, Default)]
pub struct ConfigurationBuilder {
    settings: Settings,
    base: Option<Arc<StatementRegistry>>,
    statements: Vec<Statement>,
    result_maps: Vec<ResultMap>,
    namespaces: Vec<Namespace>,
}

impl ConfigurationBuilder {
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Fall back to `base` for statements and result maps not declared here.
    pub fn base_registry(mut self, base: Arc<StatementRegistry>) -> Self {
        self.base = Some(base);
        self
    }

    /// Declare a statement outside any namespace.
    pub fn statement(mut self, statement: Statement) -> Self {
        self.statements.push(statement);
        self
    }

    /// Declare a result map outside any namespace.
    pub fn result_map(mut self, result_map: ResultMap) -> Self {
        self.result_maps.push(result_map);
        self
    }

    pub fn namespace(mut self, namespace: Namespace) -> Self {
        self.namespaces.push(namespace);
        self
    }

    pub fn build(self) -> Result<Configuration> {
        let mut registry = match self.base {
            Some(base) => StatementRegistry::derive(base),
            None => StatementRegistry::new(),
        };
        for map in self.result_maps {
            registry.add_result_map(map)?;
        }
        for statement in self.statements {
            registry.register(statement)?;
        }
        let mappers = MapperCatalog::build(self.namespaces, &mut registry)?;
        registry.validate()?;

        tracing::debug!(
            statements = registry.len(),
            lazy_loading = self.settings.lazy_loading_enabled,
            "Configuration built"
        );

        Ok(Configuration {
            settings: self.settings,
            registry,
            mappers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_defaults() {
        let settings = Settings::default();
        assert!(!settings.lazy_loading_enabled);
        assert!(!settings.aggressive_lazy_loading);
        assert_eq!(settings.auto_mapping, AutoMappingBehavior::Partial);
        assert_eq!(settings.local_cache_scope, LocalCacheScope::Session);
        assert_eq!(settings.n1_threshold, Some(3));
        assert!(!settings.default_auto_commit);
    }

    #[test]
    fn settings_from_partial_json() {
        let settings = Settings::from_json(
            r#"{ "lazy_loading_enabled": true, "auto_mapping": "full", "local_cache_scope": "statement" }"#,
        )
        .unwrap();
        assert!(settings.lazy_loading_enabled);
        assert_eq!(settings.auto_mapping, AutoMappingBehavior::Full);
        assert_eq!(settings.local_cache_scope, LocalCacheScope::Statement);
        assert_eq!(settings.n1_threshold, Some(3));
    }

    #[test]
    fn settings_from_bad_json() {
        let err = Settings::from_json(r#"{ "auto_mapping": "sometimes" }"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn builder_validates_references() {
        let err = Configuration::builder()
            .statement(Statement::select("s", "SELECT 1").unwrap().result_map("Missing"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn builder_registers_namespaces() {
        let config = Configuration::builder()
            .namespace(
                Namespace::new("BlogMapper")
                    .statement(Statement::select("selectAll", "SELECT * FROM blog").unwrap()),
            )
            .build()
            .unwrap();
        assert!(config.registry().contains("BlogMapper.selectAll"));
        assert!(config.mapper_table("BlogMapper").is_ok());
        assert!(matches!(
            config.mapper_table("Nope"),
            Err(Error::UnknownMapper(_))
        ));
    }

    #[test]
    fn builder_falls_back_to_base_registry() {
        let mut base = StatementRegistry::new();
        base.register(Statement::select("shared.ping", "SELECT 1").unwrap())
            .unwrap();
        let config = Configuration::builder()
            .base_registry(Arc::new(base))
            .build()
            .unwrap();
        assert!(config.registry().contains("shared.ping"));
    }
}
