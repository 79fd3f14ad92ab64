//! Parameter objects supplied to statements.
//!
//! A [`Params`] value is what a caller hands to `select_one`, `insert` and
//! friends. Placeholders in a template look their names up here:
//!
//! - a single scalar answers to every name (`selectBlogById(1)` style)
//! - a serialized bean answers to its field names, with dotted paths walking
//!   into nested objects (`#{author.name}`)
//! - named extras added with [`Params::with`] shadow the root object

use serde::Serialize;
use sqlmapper_core::{Result, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
enum Root {
    #[default]
    None,
    Scalar(Value),
    Object(serde_json::Map<String, serde_json::Value>),
}

/// The parameter object of one statement invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    root: Root,
    named: BTreeMap<String, Value>,
}

impl Params {
    /// No parameters at all.
    pub fn none() -> Self {
        Self::default()
    }

    /// A single scalar parameter, bound to every placeholder.
    pub fn scalar(value: impl Into<Value>) -> Self {
        Self {
            root: Root::Scalar(value.into()),
            named: BTreeMap::new(),
        }
    }

    /// Use any serializable value as the parameter object.
    ///
    /// Structs and maps expose their fields by name; anything else becomes a
    /// scalar. A bean field that serializes to `null` is present (and binds
    /// NULL); a field skipped by serde is absent.
    pub fn bean<T: Serialize + ?Sized>(bean: &T) -> Result<Self> {
        let root = match serde_json::to_value(bean)? {
            serde_json::Value::Null => Root::None,
            serde_json::Value::Object(map) => Root::Object(map),
            other => Root::Scalar(Value::from_json(&other)),
        };
        Ok(Self {
            root,
            named: BTreeMap::new(),
        })
    }

    /// Add a named value, consulted before the root object.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    /// Add a named value in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.named.insert(name.into(), value.into());
    }

    /// Check whether no parameter of any kind was supplied.
    pub fn is_empty(&self) -> bool {
        matches!(self.root, Root::None) && self.named.is_empty()
    }

    /// Look up a placeholder name or dotted property path.
    ///
    /// Returns `None` when the path cannot be resolved; a resolved path whose
    /// value is null yields `Some(Value::Null)`.
    pub fn lookup(&self, path: &str) -> Option<Value> {
        if let Some(value) = self.named.get(path) {
            return Some(value.clone());
        }

        let mut segments = path.split('.');
        let head = segments.next()?;

        if let Some(value) = self.named.get(head) {
            return match value {
                Value::Json(json) => walk(json, segments),
                _ => None,
            };
        }

        match &self.root {
            Root::None => None,
            Root::Scalar(value) => Some(value.clone()),
            Root::Object(map) => walk(map.get(head)?, segments),
        }
    }
}

fn walk<'a>(
    start: &serde_json::Value,
    segments: impl Iterator<Item = &'a str>,
) -> Option<Value> {
    let mut current = start;
    for segment in segments {
        current = current.get(segment)?;
    }
    Some(Value::from_json(current))
}

macro_rules! scalar_params {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Params {
                fn from(value: $ty) -> Self {
                    Params::scalar(value)
                }
            }
        )*
    };
}

scalar_params!(Value, bool, i32, i64, u32, f64, String, &str);

impl From<()> for Params {
    fn from((): ()) -> Self {
        Params::none()
    }
}

impl From<BTreeMap<String, Value>> for Params {
    fn from(named: BTreeMap<String, Value>) -> Self {
        Self {
            root: Root::None,
            named,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Author {
        name: String,
    }

    #[derive(Serialize)]
    struct Blog {
        bid: i32,
        name: Option<String>,
        author: Author,
        #[serde(skip_serializing_if = "Option::is_none")]
        author_id: Option<i32>,
    }

    fn blog() -> Blog {
        Blog {
            bid: 1688,
            name: None,
            author: Author {
                name: "qingshan".into(),
            },
            author_id: None,
        }
    }

    #[test]
    fn scalar_answers_every_name() {
        let params = Params::from(1);
        assert_eq!(params.lookup("bid"), Some(Value::Int(1)));
        assert_eq!(params.lookup("anything"), Some(Value::Int(1)));
    }

    #[test]
    fn bean_fields_and_paths() {
        let params = Params::bean(&blog()).unwrap();
        assert_eq!(params.lookup("bid"), Some(Value::BigInt(1688)));
        assert_eq!(params.lookup("name"), Some(Value::Null));
        assert_eq!(
            params.lookup("author.name"),
            Some(Value::Text("qingshan".into()))
        );
        assert_eq!(params.lookup("author_id"), None);
        assert_eq!(params.lookup("author.age"), None);
    }

    #[test]
    fn named_values_shadow_the_root() {
        let params = Params::bean(&blog()).unwrap().with("bid", 7);
        assert_eq!(params.lookup("bid"), Some(Value::Int(7)));
        assert_eq!(params.lookup("offset"), None);

        let params = params.with("offset", 10);
        assert_eq!(params.lookup("offset"), Some(Value::Int(10)));
    }

    #[test]
    fn empty_params_resolve_nothing() {
        let params = Params::none();
        assert!(params.is_empty());
        assert_eq!(params.lookup("bid"), None);
        assert!(Params::from(()).is_empty());
    }
}
