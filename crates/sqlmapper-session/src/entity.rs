//! Mapped entities.
//!
//! An [`Entity`] is one node of a mapped object graph: a type name plus an
//! ordered list of properties. Scalar properties hold a [`Value`];
//! association properties hold a nested entity, a collection, or a
//! [`LazyAssociation`] that fetches on first access.
//!
//! Lazy associations are only ever resolved by the explicit accessors
//! ([`Entity::one`], [`Entity::many`], [`Entity::resolve_all`],
//! [`Entity::to_json`]). `Debug` renders an unresolved association as such
//! instead of loading it. The one exception is aggressive lazy loading, where
//! any property access on the entity resolves all of its lazy associations.

use crate::lazy::{LazyAssociation, Loaded};
use serde::de::DeserializeOwned;
use sqlmapper_core::{Error, FromValue, Result, TypeError, Value};
use std::fmt;

/// One property of an entity.
#[derive(Debug, Clone)]
pub enum Property {
    Scalar(Value),
    /// One-to-one association; `None` when the related row is absent.
    One(Option<Entity>),
    /// One-to-many association, in row order.
    Many(Vec<Entity>),
    /// Association that has not been fetched yet.
    Lazy(LazyAssociation),
}

/// A mapped entity; see the module docs.
#[derive(Clone)]
pub struct Entity {
    type_name: String,
    properties: Vec<(String, Property)>,
    aggressive: bool,
}

impl Entity {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            properties: Vec::new(),
            aggressive: false,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Set a scalar property, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.set_property(name.into(), Property::Scalar(value.into()));
    }

    /// Set any kind of property, replacing any previous one.
    pub fn set_property(&mut self, name: String, property: Property) {
        match self.properties.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = property,
            None => self.properties.push((name, property)),
        }
    }

    pub(crate) fn set_aggressive(&mut self, aggressive: bool) {
        self.aggressive = aggressive;
    }

    /// Raw property access; never triggers a fetch.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p)
    }

    pub fn has(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    /// Property names in mapping order.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|(n, _)| n.as_str())
    }

    /// Scalar property value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.touch();
        match self.property(name)? {
            Property::Scalar(v) => Some(v),
            _ => None,
        }
    }

    /// Typed scalar property value.
    pub fn get_as<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self.get(name).ok_or_else(|| {
            Error::Type(TypeError {
                expected: std::any::type_name::<T>(),
                actual: format!("no scalar property '{}' on {}", name, self.type_name),
                column: Some(name.to_string()),
            })
        })?;
        T::from_value(value).map_err(|e| match e {
            Error::Type(mut te) => {
                te.column = Some(name.to_string());
                Error::Type(te)
            }
            e => e,
        })
    }

    /// The lazy association behind `name`, if that property is one.
    pub fn lazy(&self, name: &str) -> Option<&LazyAssociation> {
        match self.property(name)? {
            Property::Lazy(lazy) => Some(lazy),
            _ => None,
        }
    }

    /// One-to-one association, resolving it if lazy.
    pub fn one(&self, name: &str) -> Result<Option<&Entity>> {
        self.touch();
        match self.association(name)? {
            Some(Loaded::One(entity)) => Ok(entity.as_ref()),
            Some(Loaded::Many(_)) => Err(self.wrong_kind(name, "one-to-one")),
            None => match self.property(name) {
                Some(Property::One(entity)) => Ok(entity.as_ref()),
                _ => Err(self.wrong_kind(name, "one-to-one")),
            },
        }
    }

    /// One-to-many association, resolving it if lazy.
    pub fn many(&self, name: &str) -> Result<&[Entity]> {
        self.touch();
        match self.association(name)? {
            Some(Loaded::Many(entities)) => Ok(entities),
            Some(Loaded::One(_)) => Err(self.wrong_kind(name, "one-to-many")),
            None => match self.property(name) {
                Some(Property::Many(entities)) => Ok(entities),
                _ => Err(self.wrong_kind(name, "one-to-many")),
            },
        }
    }

    /// Resolve `name` if it is a lazy association.
    fn association(&self, name: &str) -> Result<Option<&Loaded>> {
        match self.property(name) {
            Some(Property::Lazy(lazy)) => lazy.resolve().map(Some),
            Some(_) => Ok(None),
            None => Err(Error::mapping(
                self.type_name.as_str(),
                None,
                format!("entity has no property '{}'", name),
            )),
        }
    }

    fn wrong_kind(&self, name: &str, expected: &str) -> Error {
        Error::mapping(
            self.type_name.as_str(),
            None,
            format!("property '{}' is not a {} association", name, expected),
        )
    }

    fn touch(&self) {
        if self.aggressive {
            for (_, property) in &self.properties {
                if let Property::Lazy(lazy) = property {
                    // A failure is stored in the association and surfaces on
                    // its own access.
                    let _ = lazy.resolve();
                }
            }
        }
    }

    /// Resolve every lazy association of this entity (not of nested ones).
    pub fn resolve_all(&self) -> Result<()> {
        for (_, property) in &self.properties {
            if let Property::Lazy(lazy) = property {
                lazy.resolve()?;
            }
        }
        Ok(())
    }

    /// Convert the whole graph to JSON, resolving lazy associations.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut map = serde_json::Map::with_capacity(self.properties.len());
        for (name, property) in &self.properties {
            let json = match property {
                Property::Scalar(v) => v.to_json(),
                Property::One(entity) => one_to_json(entity.as_ref())?,
                Property::Many(entities) => many_to_json(entities)?,
                Property::Lazy(lazy) => match lazy.resolve()? {
                    Loaded::One(entity) => one_to_json(entity.as_ref())?,
                    Loaded::Many(entities) => many_to_json(entities)?,
                },
            };
            map.insert(name.clone(), json);
        }
        Ok(serde_json::Value::Object(map))
    }

    /// Deserialize the graph into a typed value.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.to_json()?)?)
    }
}

fn one_to_json(entity: Option<&Entity>) -> Result<serde_json::Value> {
    entity.map_or(Ok(serde_json::Value::Null), Entity::to_json)
}

fn many_to_json(entities: &[Entity]) -> Result<serde_json::Value> {
    entities
        .iter()
        .map(Entity::to_json)
        .collect::<Result<Vec<_>>>()
        .map(serde_json::Value::Array)
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(&self.type_name);
        for (name, property) in &self.properties {
            match property {
                Property::Scalar(v) => s.field(name, v),
                Property::One(Some(e)) => s.field(name, e),
                Property::One(None) => s.field(name, &Option::<()>::None),
                Property::Many(es) => s.field(name, es),
                Property::Lazy(lazy) => s.field(name, lazy),
            };
        }
        s.finish()
    }
}
