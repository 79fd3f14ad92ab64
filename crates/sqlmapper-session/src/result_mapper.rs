//! Rows to entities.
//!
//! # Nested results
//!
//! When a result map (or any map nested under it) builds associations from
//! joined columns, rows are grouped by the map's key columns in order of
//! first appearance, and each group becomes one entity:
//!
//! ```text
//! bid | name     | comment_id | content        Blog { bid: 1, comments: [
//! 1   | RabbitMQ | 1          | "c1"      =>     Comment { comment_id: 1, .. },
//! 1   | RabbitMQ | 2          | "c2"             Comment { comment_id: 2, .. } ] }
//! ```
//!
//! Scalar properties come from the first row of the group. A one-to-one
//! association is built from the group's first nested key; a one-to-many
//! association regroups the group's rows by the nested map's keys, so a key
//! repeated by fan-out from other joins yields one element. Nested entities
//! whose key columns are all NULL (outer-join misses) are left out.
//!
//! Without nested associations every row is its own entity.
//!
//! # Nested queries
//!
//! An association backed by a secondary statement takes its parameters from
//! the owning row's key columns. It is installed as a [`LazyAssociation`]
//! when lazy loading applies, and fetched right away otherwise. All-NULL keys
//! yield an empty association without any fetch.

use crate::config::{AutoMappingBehavior, Configuration};
use crate::entity::{Entity, Property};
use crate::lazy::{AssociationLoader, LazyAssociation, LoadRequest, Loaded};
use sqlmapper_core::{Error, Result, Row, Value, ValueKey};
use sqlmapper_registry::{
    Association, AssociationSource, Cardinality, FetchType, KeyColumn, Params, ResultMap,
    ResultSpec,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Eager nested-query loads may chain this deep before mapping fails.
pub const MAX_EAGER_DEPTH: usize = 16;

/// Type name given to entities of selects without a result spec.
pub const ROW_TYPE: &str = "Row";

/// Maps the rows of one statement; see the module docs.
pub struct ResultMapper<'a> {
    config: &'a Configuration,
    loader: &'a Arc<dyn AssociationLoader>,
    depth: usize,
}

impl<'a> ResultMapper<'a> {
    /// `depth` is the eager nested-query depth of the statement being mapped.
    pub fn new(
        config: &'a Configuration,
        loader: &'a Arc<dyn AssociationLoader>,
        depth: usize,
    ) -> Self {
        Self {
            config,
            loader,
            depth,
        }
    }

    /// Map rows according to a statement's result spec.
    pub fn map_rows(&self, spec: &ResultSpec, rows: &[Row]) -> Result<Vec<Entity>> {
        match spec {
            ResultSpec::Map(id) => {
                let map = self.config.registry().result_map(id).ok_or_else(|| {
                    Error::mapping(id.as_str(), None, "result map is not registered")
                })?;
                self.map_with(map, rows)
            }
            ResultSpec::Type(type_name) => Ok(self.map_auto(type_name, rows)),
            ResultSpec::None => Ok(self.map_auto(ROW_TYPE, rows)),
        }
    }

    /// Map rows through a result map.
    pub fn map_with(&self, map: &ResultMap, rows: &[Row]) -> Result<Vec<Entity>> {
        let rows: Vec<&Row> = rows.iter().collect();
        if self.is_nested(map) {
            self.build_groups(map, "", &rows, true, false)
        } else {
            rows.iter()
                .map(|row| self.build_entity(map, "", std::slice::from_ref(row), false))
                .collect()
        }
    }

    /// Auto-map every column of each row onto an entity of `type_name`.
    pub fn map_auto(&self, type_name: &str, rows: &[Row]) -> Vec<Entity> {
        rows.iter()
            .map(|row| {
                let mut entity = Entity::new(type_name);
                self.auto_map(&mut entity, None, "", row);
                entity
            })
            .collect()
    }

    fn is_nested(&self, map: &ResultMap) -> bool {
        map.has_nested()
    }

    fn resolve_map(&self, owner: &ResultMap, id: &str) -> Result<&'a Arc<ResultMap>> {
        self.config.registry().result_map(id).ok_or_else(|| {
            Error::mapping(
                owner.result_map_id(),
                None,
                format!("nested result map '{}' is not registered", id),
            )
        })
    }

    fn build_groups(
        &self,
        map: &ResultMap,
        prefix: &str,
        rows: &[&Row],
        nested: bool,
        skip_null_keys: bool,
    ) -> Result<Vec<Entity>> {
        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        let key_columns = group_columns(map, prefix, first);
        for column in &key_columns {
            if !first.contains_column(column) {
                return Err(Error::mapping(
                    map.result_map_id(),
                    Some(column.as_str()),
                    "key column is absent from the result set",
                ));
            }
        }

        let mut order: Vec<Vec<ValueKey>> = Vec::new();
        let mut groups: HashMap<Vec<ValueKey>, Vec<&Row>> = HashMap::new();
        for row in rows {
            let key: Vec<ValueKey> = key_columns
                .iter()
                .map(|c| row.get_by_name(c).map_or(ValueKey::Null, Value::key))
                .collect();
            if skip_null_keys && key.iter().all(|k| *k == ValueKey::Null) {
                continue;
            }
            groups
                .entry(key.clone())
                .or_insert_with(|| {
                    order.push(key);
                    Vec::new()
                })
                .push(*row);
        }

        order
            .iter()
            .filter_map(|key| groups.get(key))
            .map(|group| self.build_entity(map, prefix, group, nested))
            .collect()
    }

    fn build_entity(
        &self,
        map: &ResultMap,
        prefix: &str,
        group: &[&Row],
        nested: bool,
    ) -> Result<Entity> {
        let mut entity = Entity::new(map.type_name());
        entity.set_aggressive(self.config.settings().aggressive_lazy_loading);
        let Some(first) = group.first() else {
            return Ok(entity);
        };

        for mapping in map.property_mappings() {
            let column = format!("{}{}", prefix, mapping.column);
            if let Some(value) = first.get_by_name(&column) {
                entity.set(mapping.property.as_str(), value.clone());
            }
        }
        if self.should_auto_map(map, nested) {
            self.auto_map(&mut entity, Some(map), prefix, first);
        }

        // Scalars are complete; associations may now read them.
        for association in map.associations() {
            let property = match &association.source {
                AssociationSource::Nested {
                    result_map,
                    column_prefix,
                } => {
                    let target = self.resolve_map(map, result_map)?;
                    let child_prefix =
                        format!("{}{}", prefix, column_prefix.as_deref().unwrap_or_default());
                    let children = self.build_groups(target, &child_prefix, group, true, true)?;
                    match association.cardinality {
                        Cardinality::One => Property::One(children.into_iter().next()),
                        Cardinality::Many => Property::Many(children),
                    }
                }
                AssociationSource::Query {
                    statement,
                    keys,
                    fetch,
                } => self.query_association(
                    map,
                    association,
                    statement,
                    keys,
                    *fetch,
                    prefix,
                    first,
                )?,
            };
            entity.set_property(association.property.clone(), property);
        }

        Ok(entity)
    }

    #[allow(clippy::too_many_arguments)]
    fn query_association(
        &self,
        map: &ResultMap,
        association: &Association,
        statement: &str,
        keys: &[KeyColumn],
        fetch: Option<FetchType>,
        prefix: &str,
        row: &Row,
    ) -> Result<Property> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            let column = format!("{}{}", prefix, key.column);
            let value = row.get_by_name(&column).ok_or_else(|| {
                Error::mapping(
                    map.result_map_id(),
                    Some(column.as_str()),
                    format!(
                        "key column of association '{}' is absent from the result set",
                        association.property
                    ),
                )
            })?;
            values.push((key.parameter.as_str(), value.clone()));
        }

        if values.iter().all(|(_, v)| v.is_null()) {
            return Ok(empty_association(association.cardinality));
        }

        let params = match values.as_slice() {
            [(name, value)] => Params::scalar(value.clone()).with(*name, value.clone()),
            _ => values
                .into_iter()
                .fold(Params::none(), |params, (name, value)| params.with(name, value)),
        };
        let lazy = match fetch {
            Some(FetchType::Lazy) => true,
            Some(FetchType::Eager) => false,
            None => self.config.settings().lazy_loading_enabled,
        };
        // A lazy fetch is started by the caller, not by this mapping pass,
        // so its chain of eager loads starts over.
        let request = LoadRequest {
            owner_type: map.type_name().to_string(),
            property: association.property.clone(),
            statement: statement.to_string(),
            params,
            cardinality: association.cardinality,
            depth: if lazy { 0 } else { self.depth + 1 },
        };

        if lazy {
            return Ok(Property::Lazy(LazyAssociation::new(
                request,
                Arc::clone(self.loader),
            )));
        }

        if request.depth > MAX_EAGER_DEPTH {
            return Err(Error::mapping(
                map.result_map_id(),
                None,
                format!(
                    "eager association '{}' nests deeper than {} levels; make it lazy",
                    association.property, MAX_EAGER_DEPTH
                ),
            ));
        }
        Ok(match self.loader.load(&request)? {
            Loaded::One(entity) => Property::One(entity),
            Loaded::Many(entities) => Property::Many(entities),
        })
    }

    fn should_auto_map(&self, map: &ResultMap, nested: bool) -> bool {
        if let Some(enabled) = map.auto_mapping_override() {
            return enabled;
        }
        match self.config.settings().auto_mapping {
            AutoMappingBehavior::None => false,
            AutoMappingBehavior::Partial => !nested,
            AutoMappingBehavior::Full => true,
        }
    }

    fn auto_map(&self, entity: &mut Entity, map: Option<&ResultMap>, prefix: &str, row: &Row) {
        let camel = self.config.settings().map_underscore_to_camel_case;
        for (column, value) in row.iter() {
            let Some(stripped) = strip_prefix_ignore_case(column, prefix) else {
                continue;
            };
            if stripped.is_empty() || map.is_some_and(|m| m.maps_column(stripped)) {
                continue;
            }
            let property = if camel {
                underscore_to_camel(stripped)
            } else {
                stripped.to_string()
            };
            if !entity.has(&property) {
                entity.set(property, value.clone());
            }
        }
    }
}

fn empty_association(cardinality: Cardinality) -> Property {
    match cardinality {
        Cardinality::One => Property::One(None),
        Cardinality::Many => Property::Many(Vec::new()),
    }
}

/// Columns identifying an entity of `map` under `prefix`.
///
/// Falls back to every column carrying the prefix when the map declares no
/// property mappings at all.
fn group_columns(map: &ResultMap, prefix: &str, sample: &Row) -> Vec<String> {
    let declared = map.key_columns();
    if declared.is_empty() {
        return sample
            .column_names()
            .filter(|c| strip_prefix_ignore_case(c, prefix).is_some_and(|s| !s.is_empty()))
            .map(str::to_string)
            .collect();
    }
    declared
        .into_iter()
        .map(|c| format!("{}{}", prefix, c))
        .collect()
}

fn strip_prefix_ignore_case<'c>(column: &'c str, prefix: &str) -> Option<&'c str> {
    if prefix.is_empty() {
        return Some(column);
    }
    let head = column.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        column.get(prefix.len()..)
    } else {
        None
    }
}

fn underscore_to_camel(column: &str) -> String {
    let mut out = String::with_capacity(column.len());
    let mut upper = false;
    for c in column.chars() {
        if c == '_' {
            upper = !out.is_empty();
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}
