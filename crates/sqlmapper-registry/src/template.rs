//! SQL templates with `#{...}` and `${...}` placeholders.
//!
//! `#{name}` becomes a positional `?` bound through the driver, so the value
//! keeps its type and cannot alter the statement. `${name}` pastes the value's
//! text into the SQL before it reaches the store; it is meant for identifiers
//! such as column names in `ORDER BY` and performs no escaping.
//!
//! Anything after a comma inside the braces (`#{bid, jdbcType=INTEGER}`) is
//! accepted and ignored.

use crate::params::Params;
use regex::Regex;
use sqlmapper_core::{Error, ParameterError, Result, Value};
use std::sync::OnceLock;

/// How a placeholder's value reaches the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindingMode {
    /// Driver-level bound parameter (`#{...}`).
    #[default]
    Positional,
    /// Textual substitution before compilation (`${...}`).
    Literal,
}

/// One `#{...}` or `${...}` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub mode: BindingMode,
    /// Parameter name or dotted property path.
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Placeholder(Placeholder),
}

/// A parsed SQL template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

/// SQL ready for the store: text with `?` markers plus the values to bind.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundSql {
    pub sql: String,
    pub params: Vec<Value>,
}

fn placeholder_regex() -> Result<&'static Regex> {
    static PATTERN: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"([#$])\{([^}]*)\}"))
        .as_ref()
        .map_err(|e| Error::config(format!("placeholder pattern failed to compile: {e}")))
}

fn is_valid_path(path: &str) -> bool {
    !path.is_empty()
        && path.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

impl Template {
    /// Parse a template, rejecting empty, malformed or unterminated placeholders.
    pub fn parse(source: &str) -> Result<Self> {
        let regex = placeholder_regex()?;
        let mut segments = Vec::new();
        let mut last = 0;

        for caps in regex.captures_iter(source) {
            let (Some(whole), Some(marker), Some(body)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };

            if whole.start() > last {
                segments.push(Segment::Text(source[last..whole.start()].to_string()));
            }
            last = whole.end();

            let path = body.as_str().split(',').next().unwrap_or_default().trim();
            if !is_valid_path(path) {
                return Err(Error::config(format!(
                    "invalid placeholder '{}' in template: {}",
                    whole.as_str(),
                    source
                )));
            }

            segments.push(Segment::Placeholder(Placeholder {
                mode: if marker.as_str() == "$" {
                    BindingMode::Literal
                } else {
                    BindingMode::Positional
                },
                path: path.to_string(),
            }));
        }

        if last < source.len() {
            segments.push(Segment::Text(source[last..].to_string()));
        }

        let unterminated = segments.iter().any(|segment| {
            matches!(segment, Segment::Text(text) if text.contains("#{") || text.contains("${"))
        });
        if unterminated {
            return Err(Error::config(format!(
                "unterminated placeholder in template: {}",
                source
            )));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// The template text as written.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// All placeholders in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &Placeholder> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(p) => Some(p),
            Segment::Text(_) => None,
        })
    }

    /// Names referenced by the template, in order, with repeats.
    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.placeholders().map(|p| p.path.as_str())
    }

    /// `Literal` if any placeholder substitutes text, else `Positional`.
    pub fn binding_mode(&self) -> BindingMode {
        if self
            .placeholders()
            .any(|p| p.mode == BindingMode::Literal)
        {
            BindingMode::Literal
        } else {
            BindingMode::Positional
        }
    }

    /// Substitute `params` into the template.
    ///
    /// `statement` names the owning statement in `ParameterMismatch` errors.
    pub fn render(&self, statement: &str, params: &Params) -> Result<BoundSql> {
        let mut sql = String::with_capacity(self.source.len());
        let mut bound = Vec::new();

        for segment in &self.segments {
            match segment {
                Segment::Text(text) => sql.push_str(text),
                Segment::Placeholder(p) => {
                    let value = params.lookup(&p.path).ok_or_else(|| {
                        Error::ParameterMismatch(ParameterError {
                            statement: statement.to_string(),
                            parameter: p.path.clone(),
                        })
                    })?;
                    match p.mode {
                        BindingMode::Positional => {
                            sql.push('?');
                            bound.push(value);
                        }
                        BindingMode::Literal => sql.push_str(&value.to_literal()),
                    }
                }
            }
        }

        Ok(BoundSql { sql, params: bound })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_placeholders_become_markers() {
        let t = Template::parse("SELECT * FROM blog WHERE bid = #{bid} AND name = #{name}")
            .unwrap();
        assert_eq!(t.binding_mode(), BindingMode::Positional);
        assert_eq!(t.parameter_names().collect::<Vec<_>>(), ["bid", "name"]);

        let params = Params::none().with("bid", 1).with("name", "RabbitMQ");
        let bound = t.render("selectBlog", &params).unwrap();
        assert_eq!(bound.sql, "SELECT * FROM blog WHERE bid = ? AND name = ?");
        assert_eq!(
            bound.params,
            vec![Value::Int(1), Value::Text("RabbitMQ".into())]
        );
    }

    #[test]
    fn literal_placeholders_paste_text() {
        let t = Template::parse("SELECT * FROM blog WHERE name = '${name}' ORDER BY ${col}")
            .unwrap();
        assert_eq!(t.binding_mode(), BindingMode::Literal);

        let params = Params::none().with("name", "RabbitMQ").with("col", "bid");
        let bound = t.render("selectBlog", &params).unwrap();
        assert_eq!(
            bound.sql,
            "SELECT * FROM blog WHERE name = 'RabbitMQ' ORDER BY bid"
        );
        assert!(bound.params.is_empty());
    }

    #[test]
    fn literal_null_renders_keyword() {
        let t = Template::parse("SELECT ${v}").unwrap();
        let bound = t.render("s", &Params::none().with("v", Value::Null)).unwrap();
        assert_eq!(bound.sql, "SELECT NULL");
    }

    #[test]
    fn options_after_comma_are_ignored() {
        let t = Template::parse("SELECT * FROM blog WHERE bid = #{ bid , jdbcType=INTEGER }")
            .unwrap();
        assert_eq!(t.parameter_names().collect::<Vec<_>>(), ["bid"]);
    }

    #[test]
    fn missing_parameter_is_a_mismatch() {
        let t = Template::parse("SELECT * FROM blog WHERE bid = #{bid}").unwrap();
        match t.render("BlogMapper.selectBlogById", &Params::none()) {
            Err(Error::ParameterMismatch(e)) => {
                assert_eq!(e.statement, "BlogMapper.selectBlogById");
                assert_eq!(e.parameter, "bid");
            }
            other => panic!("expected parameter mismatch, got {other:?}"),
        }
    }

    #[test]
    fn malformed_templates_are_rejected() {
        assert!(Template::parse("SELECT #{}").is_err());
        assert!(Template::parse("SELECT #{a b}").is_err());
        assert!(Template::parse("SELECT #{bid").is_err());
        assert!(Template::parse("SELECT ${a..b}").is_err());
    }

    #[test]
    fn plain_sql_has_no_placeholders() {
        let t = Template::parse("SELECT 1").unwrap();
        assert_eq!(t.placeholders().count(), 0);
        let bound = t.render("s", &Params::none()).unwrap();
        assert_eq!(bound.sql, "SELECT 1");
    }
}
