//! Registered statements.

use crate::params::Params;
use crate::template::{BindingMode, BoundSql, Template};
use sqlmapper_core::{Error, Result, Value};
use std::sync::Arc;

/// What a statement does to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl StatementKind {
    /// Does running this statement modify the store?
    pub const fn is_write(self) -> bool {
        !matches!(self, StatementKind::Select)
    }

    /// Infer the kind from the leading SQL keyword.
    pub fn infer(sql: &str) -> Option<Self> {
        let keyword = sql
            .split_whitespace()
            .next()?
            .trim_start_matches('(')
            .to_ascii_lowercase();
        match keyword.as_str() {
            "select" | "with" | "values" | "pragma" | "explain" => Some(StatementKind::Select),
            "insert" | "replace" => Some(StatementKind::Insert),
            "update" => Some(StatementKind::Update),
            "delete" => Some(StatementKind::Delete),
            _ => None,
        }
    }
}

/// How the rows of a select become entities.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResultSpec {
    /// Nothing to map (writes).
    #[default]
    None,
    /// Apply the named result map.
    Map(String),
    /// Auto-map every column onto an entity of this type name.
    Type(String),
}

/// An immutable, registered statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    id: String,
    kind: StatementKind,
    template: Template,
    binding: BindingMode,
    result: ResultSpec,
    use_cache: bool,
    flush_cache: bool,
}

impl Statement {
    /// Create a statement, deriving its binding mode from the template.
    pub fn new(id: impl Into<String>, kind: StatementKind, sql: &str) -> Result<Self> {
        let id = id.into();
        let template = Template::parse(sql)
            .map_err(|e| Error::config(format!("statement '{}': {}", id, e)))?;
        Ok(Self {
            binding: template.binding_mode(),
            id,
            kind,
            template,
            result: ResultSpec::None,
            use_cache: kind == StatementKind::Select,
            flush_cache: kind.is_write(),
        })
    }

    pub fn select(id: impl Into<String>, sql: &str) -> Result<Self> {
        Self::new(id, StatementKind::Select, sql)
    }

    pub fn insert(id: impl Into<String>, sql: &str) -> Result<Self> {
        Self::new(id, StatementKind::Insert, sql)
    }

    pub fn update(id: impl Into<String>, sql: &str) -> Result<Self> {
        Self::new(id, StatementKind::Update, sql)
    }

    pub fn delete(id: impl Into<String>, sql: &str) -> Result<Self> {
        Self::new(id, StatementKind::Delete, sql)
    }

    /// Declare the binding mode explicitly.
    ///
    /// A `Positional` statement may not contain `${...}` placeholders;
    /// declaring `Literal` permits them.
    pub fn binding(mut self, mode: BindingMode) -> Result<Self> {
        if mode == BindingMode::Positional && self.template.binding_mode() == BindingMode::Literal
        {
            return Err(Error::config(format!(
                "statement '{}' declares positional binding but its template substitutes literal text",
                self.id
            )));
        }
        self.binding = mode;
        Ok(self)
    }

    /// Map results through the named result map.
    pub fn result_map(mut self, id: impl Into<String>) -> Self {
        self.result = ResultSpec::Map(id.into());
        self
    }

    /// Auto-map results onto the named entity type.
    pub fn result_type(mut self, type_name: impl Into<String>) -> Self {
        self.result = ResultSpec::Type(type_name.into());
        self
    }

    /// Whether results may be served from the session's local cache.
    pub fn use_cache(mut self, enabled: bool) -> Self {
        self.use_cache = enabled;
        self
    }

    /// Whether executing this statement clears the session's local cache.
    pub fn flush_cache(mut self, enabled: bool) -> Self {
        self.flush_cache = enabled;
        self
    }

    pub(crate) fn rename(mut self, id: String) -> Self {
        self.id = id;
        self
    }

    pub(crate) fn set_result(&mut self, result: ResultSpec) {
        self.result = result;
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn binding_mode(&self) -> BindingMode {
        self.binding
    }

    pub fn result(&self) -> &ResultSpec {
        &self.result
    }

    pub fn uses_cache(&self) -> bool {
        self.use_cache
    }

    pub fn flushes_cache(&self) -> bool {
        self.flush_cache
    }

    /// Render the template against `params`.
    pub fn bind(&self, params: &Params) -> Result<BoundSql> {
        self.template.render(&self.id, params)
    }
}

/// A statement resolved against its parameters, ready for the executor.
#[derive(Debug, Clone)]
pub struct ExecutableStatement {
    pub statement: Arc<Statement>,
    pub sql: String,
    pub params: Vec<Value>,
}

impl ExecutableStatement {
    pub(crate) fn new(statement: Arc<Statement>, bound: BoundSql) -> Self {
        Self {
            statement,
            sql: bound.sql,
            params: bound.params,
        }
    }

    pub fn id(&self) -> &str {
        self.statement.id()
    }

    pub fn kind(&self) -> StatementKind {
        self.statement.kind()
    }

    pub fn result(&self) -> &ResultSpec {
        self.statement.result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_inference() {
        assert_eq!(
            StatementKind::infer("  select * from blog"),
            Some(StatementKind::Select)
        );
        assert_eq!(
            StatementKind::infer("WITH x AS (SELECT 1) SELECT * FROM x"),
            Some(StatementKind::Select)
        );
        assert_eq!(
            StatementKind::infer("INSERT INTO blog VALUES (1)"),
            Some(StatementKind::Insert)
        );
        assert_eq!(StatementKind::infer("DROP TABLE blog"), None);
        assert_eq!(StatementKind::infer(""), None);
    }

    #[test]
    fn writes_flush_and_selects_cache() {
        let select = Statement::select("s", "SELECT 1").unwrap();
        assert!(select.uses_cache());
        assert!(!select.flushes_cache());

        let insert = Statement::insert("i", "INSERT INTO blog (bid) VALUES (#{bid})").unwrap();
        assert!(!insert.uses_cache());
        assert!(insert.flushes_cache());
        assert!(insert.kind().is_write());
    }

    #[test]
    fn declared_positional_rejects_literal_text() {
        let stmt = Statement::select("s", "SELECT * FROM blog ORDER BY ${col}").unwrap();
        assert_eq!(stmt.binding_mode(), BindingMode::Literal);
        assert!(stmt.clone().binding(BindingMode::Positional).is_err());
        assert!(stmt.binding(BindingMode::Literal).is_ok());

        let stmt = Statement::select("s", "SELECT * FROM blog WHERE bid = #{bid}")
            .unwrap()
            .binding(BindingMode::Literal)
            .unwrap();
        assert_eq!(stmt.binding_mode(), BindingMode::Literal);
    }

    #[test]
    fn template_errors_name_the_statement() {
        let err = Statement::select("BlogMapper.broken", "SELECT #{").unwrap_err();
        assert!(err.to_string().contains("BlogMapper.broken"));
    }
}
