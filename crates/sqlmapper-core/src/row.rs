//! Raw result-set rows, before any result map shapes them.

use crate::Result;
use crate::error::{Error, TypeError};
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Column labels of one result set, shared by every row in it.
///
/// Lookup ignores ASCII case. When a join yields the same label twice
/// the leftmost column answers.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    labels: Vec<String>,
    lookup: HashMap<String, usize>,
}

impl ColumnInfo {
    pub fn new(labels: Vec<String>) -> Self {
        let mut lookup = HashMap::with_capacity(labels.len());
        for (position, label) in labels.iter().enumerate() {
            lookup.entry(label.to_ascii_lowercase()).or_insert(position);
        }
        Self { labels, lookup }
    }

    pub fn position(&self, label: &str) -> Option<usize> {
        self.lookup.get(&label.to_ascii_lowercase()).copied()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// One row of a result set.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<ColumnInfo>,
    cells: Vec<Value>,
}

impl Row {
    /// Build a standalone row. Drivers reading a whole result set should
    /// use [`Row::with_columns`] so the labels are allocated once.
    pub fn new(labels: Vec<String>, cells: Vec<Value>) -> Self {
        Self::with_columns(Arc::new(ColumnInfo::new(labels)), cells)
    }

    pub fn with_columns(columns: Arc<ColumnInfo>, cells: Vec<Value>) -> Self {
        Self { columns, cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell under `label`, case-insensitively.
    pub fn get_by_name(&self, label: &str) -> Option<&Value> {
        self.columns.position(label).and_then(|i| self.cells.get(i))
    }

    pub fn contains_column(&self, label: &str) -> bool {
        self.columns.position(label).is_some()
    }

    /// Cell under `label`, converted. Conversion failures name the column.
    pub fn get_named<T: FromValue>(&self, label: &str) -> Result<T> {
        let Some(value) = self.get_by_name(label) else {
            return Err(Error::Type(TypeError {
                expected: std::any::type_name::<T>(),
                actual: format!("no column '{label}'"),
                column: Some(label.to_string()),
            }));
        };
        T::from_value(value).map_err(|err| match err {
            Error::Type(mut te) => {
                te.column = Some(label.to_string());
                Error::Type(te)
            }
            other => other,
        })
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.labels().iter().map(String::as_str)
    }

    /// `(label, cell)` pairs in select-list order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.column_names().zip(self.cells.iter())
    }
}

/// Conversion out of a [`Value`] into a Rust type.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

fn mismatch(expected: &'static str, actual: String) -> Error {
    Error::Type(TypeError {
        expected,
        actual,
        column: None,
    })
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

macro_rules! from_value_via {
    ($ty:ty, $accessor:ident, $convert:expr) => {
        impl FromValue for $ty {
            fn from_value(value: &Value) -> Result<Self> {
                let raw = value
                    .$accessor()
                    .ok_or_else(|| mismatch(stringify!($ty), value.type_name().to_string()))?;
                $convert(raw)
            }
        }
    };
}

from_value_via!(bool, as_bool, Ok);
from_value_via!(i64, as_i64, Ok);
from_value_via!(f64, as_f64, Ok);
from_value_via!(String, as_str, |s: &str| Ok(s.to_string()));
from_value_via!(Vec<u8>, as_bytes, |b: &[u8]| Ok(b.to_vec()));
from_value_via!(i32, as_i64, |n: i64| {
    i32::try_from(n).map_err(|_| mismatch("i32", format!("{n} (out of range)")))
});
from_value_via!(u64, as_i64, |n: i64| {
    u64::try_from(n).map_err(|_| mismatch("u64", format!("{n} (negative)")))
});

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        if value.is_null() {
            return Ok(None);
        }
        T::from_value(value).map(Some)
    }
}
