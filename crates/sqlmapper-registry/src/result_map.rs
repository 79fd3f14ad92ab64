//! Result map declarations.
//!
//! A [`ResultMap`] says how the columns of a row become the properties of an
//! entity: which columns identify it (used to group joined rows), which are
//! plain properties, and which properties are associations to other entities.
//!
//! Associations come in two cardinalities (one-to-one and one-to-many) and
//! two sources:
//!
//! - **Nested**: the association's columns are already in the row, produced by
//!   a join, and are mapped through another result map (optionally with a
//!   column prefix).
//! - **Query**: the association is fetched by a secondary statement, keyed by
//!   column values of the owning row. Whether that fetch happens while mapping
//!   or on first access depends on the lazy-loading settings and the
//!   association's [`FetchType`].

/// One property ← column pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyMapping {
    pub property: String,
    pub column: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// A single nested entity (`association`).
    One,
    /// An ordered collection of nested entities (`collection`).
    Many,
}

/// Per-association override of the global lazy-loading switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchType {
    Lazy,
    Eager,
}

/// Binds one parameter of a secondary statement to a column of the owning row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyColumn {
    pub parameter: String,
    pub column: String,
}

/// Where an association's data comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssociationSource {
    Nested {
        result_map: String,
        column_prefix: Option<String>,
    },
    Query {
        statement: String,
        keys: Vec<KeyColumn>,
        fetch: Option<FetchType>,
    },
}

/// An association (or collection) property of a result map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    pub property: String,
    pub cardinality: Cardinality,
    pub source: AssociationSource,
}

impl Association {
    fn nested(property: &str, cardinality: Cardinality, result_map: &str) -> Self {
        Self {
            property: property.to_string(),
            cardinality,
            source: AssociationSource::Nested {
                result_map: result_map.to_string(),
                column_prefix: None,
            },
        }
    }

    fn query(property: &str, cardinality: Cardinality, statement: &str, column: &str) -> Self {
        Self {
            property: property.to_string(),
            cardinality,
            source: AssociationSource::Query {
                statement: statement.to_string(),
                keys: vec![KeyColumn {
                    parameter: column.to_string(),
                    column: column.to_string(),
                }],
                fetch: None,
            },
        }
    }

    /// One-to-one, built from joined columns through `result_map`.
    pub fn nested_one(property: &str, result_map: &str) -> Self {
        Self::nested(property, Cardinality::One, result_map)
    }

    /// One-to-many, built from joined columns through `result_map`.
    pub fn nested_many(property: &str, result_map: &str) -> Self {
        Self::nested(property, Cardinality::Many, result_map)
    }

    /// One-to-one, fetched by `statement` with the value of `column`.
    pub fn query_one(property: &str, statement: &str, column: &str) -> Self {
        Self::query(property, Cardinality::One, statement, column)
    }

    /// One-to-many, fetched by `statement` with the value of `column`.
    pub fn query_many(property: &str, statement: &str, column: &str) -> Self {
        Self::query(property, Cardinality::Many, statement, column)
    }

    /// Prefix prepended to the nested result map's column names.
    ///
    /// Has no effect on query associations.
    pub fn column_prefix(mut self, prefix: &str) -> Self {
        if let AssociationSource::Nested { column_prefix, .. } = &mut self.source {
            *column_prefix = Some(prefix.to_string());
        }
        self
    }

    /// Bind another secondary-statement parameter to a column.
    ///
    /// With more than one key the secondary statement receives a named map
    /// instead of a single scalar. Has no effect on nested associations.
    pub fn key(mut self, parameter: &str, column: &str) -> Self {
        if let AssociationSource::Query { keys, .. } = &mut self.source {
            keys.push(KeyColumn {
                parameter: parameter.to_string(),
                column: column.to_string(),
            });
        }
        self
    }

    /// Override the global lazy-loading switch for this association.
    pub fn fetch(mut self, fetch_type: FetchType) -> Self {
        if let AssociationSource::Query { fetch, .. } = &mut self.source {
            *fetch = Some(fetch_type);
        }
        self
    }

    pub fn is_nested(&self) -> bool {
        matches!(self.source, AssociationSource::Nested { .. })
    }
}

/// How rows map onto one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultMap {
    id: String,
    type_name: String,
    ids: Vec<PropertyMapping>,
    results: Vec<PropertyMapping>,
    associations: Vec<Association>,
    auto_mapping: Option<bool>,
}

impl ResultMap {
    pub fn new(id: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            ids: Vec::new(),
            results: Vec::new(),
            associations: Vec::new(),
            auto_mapping: None,
        }
    }

    /// Declare an identifying property.
    pub fn id(mut self, property: &str, column: &str) -> Self {
        self.ids.push(PropertyMapping {
            property: property.to_string(),
            column: column.to_string(),
        });
        self
    }

    /// Declare a plain property.
    pub fn result(mut self, property: &str, column: &str) -> Self {
        self.results.push(PropertyMapping {
            property: property.to_string(),
            column: column.to_string(),
        });
        self
    }

    /// Declare an association or collection property.
    pub fn association(mut self, association: Association) -> Self {
        self.associations.push(association);
        self
    }

    /// Force auto-mapping of unmapped columns on or off for this map.
    pub fn auto_mapping(mut self, enabled: bool) -> Self {
        self.auto_mapping = Some(enabled);
        self
    }

    pub(crate) fn rename(mut self, id: String) -> Self {
        self.id = id;
        self
    }

    pub(crate) fn associations_mut(&mut self) -> &mut [Association] {
        &mut self.associations
    }

    pub fn result_map_id(&self) -> &str {
        &self.id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn id_mappings(&self) -> &[PropertyMapping] {
        &self.ids
    }

    pub fn result_mappings(&self) -> &[PropertyMapping] {
        &self.results
    }

    pub fn associations(&self) -> &[Association] {
        &self.associations
    }

    pub fn auto_mapping_override(&self) -> Option<bool> {
        self.auto_mapping
    }

    /// Whether this map builds anything from joined columns.
    pub fn has_nested(&self) -> bool {
        self.associations.iter().any(Association::is_nested)
    }

    /// Id and result mappings, ids first.
    pub fn property_mappings(&self) -> impl Iterator<Item = &PropertyMapping> {
        self.ids.iter().chain(self.results.iter())
    }

    /// Columns whose values identify an entity when grouping rows.
    ///
    /// Declared ids when there are any, otherwise every mapped column.
    pub fn key_columns(&self) -> Vec<&str> {
        let source = if self.ids.is_empty() {
            &self.results
        } else {
            &self.ids
        };
        source.iter().map(|m| m.column.as_str()).collect()
    }

    /// Whether `column` is claimed by an explicit property mapping.
    pub fn maps_column(&self, column: &str) -> bool {
        self.property_mappings()
            .any(|m| m.column.eq_ignore_ascii_case(column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blog_map() -> ResultMap {
        ResultMap::new("BlogWithAuthor", "BlogAndAuthor")
            .id("bid", "bid")
            .result("name", "name")
            .association(Association::nested_one("author", "AuthorMap").column_prefix("author_"))
            .association(Association::query_many("comments", "selectComments", "bid"))
    }

    #[test]
    fn key_columns_prefer_ids() {
        let map = blog_map();
        assert_eq!(map.key_columns(), ["bid"]);

        let no_ids = ResultMap::new("Plain", "Blog")
            .result("name", "name")
            .result("author", "author_id");
        assert_eq!(no_ids.key_columns(), ["name", "author_id"]);
    }

    #[test]
    fn association_builders() {
        let map = blog_map();
        assert!(map.has_nested());
        let author = &map.associations()[0];
        assert_eq!(
            author.source,
            AssociationSource::Nested {
                result_map: "AuthorMap".into(),
                column_prefix: Some("author_".into()),
            }
        );

        let comments = Association::query_one("author", "selectAuthor", "author_id")
            .key("blog", "bid")
            .fetch(FetchType::Eager)
            .column_prefix("ignored_");
        match comments.source {
            AssociationSource::Query { keys, fetch, .. } => {
                assert_eq!(keys.len(), 2);
                assert_eq!(keys[1].parameter, "blog");
                assert_eq!(fetch, Some(FetchType::Eager));
            }
            AssociationSource::Nested { .. } => panic!("expected query association"),
        }
    }

    #[test]
    fn mapped_columns_ignore_case() {
        let map = blog_map();
        assert!(map.maps_column("BID"));
        assert!(!map.maps_column("author_id"));
    }
}
