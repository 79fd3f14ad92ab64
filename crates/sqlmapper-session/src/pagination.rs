//! Result windows.
//!
//! Two ways to page through a select:
//!
//! - [`Pagination::Logical`] fetches and maps the whole result, then keeps
//!   only the window. Works with any statement; costs the full fetch.
//! - [`Pagination::Physical`] passes `offset` and `limit` to the statement as
//!   parameters, so a template written as
//!   `... LIMIT #{limit} OFFSET #{offset}` fetches only the window.

use sqlmapper_core::{Error, Result};
use sqlmapper_registry::{Params, Statement};

/// Offset and limit of a window. A limit of 0 means "no limit".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowBounds {
    pub offset: usize,
    pub limit: usize,
}

impl RowBounds {
    /// No offset, no limit.
    pub const NONE: RowBounds = RowBounds {
        offset: 0,
        limit: 0,
    };

    pub const fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    pub const fn is_unbounded(&self) -> bool {
        self.offset == 0 && self.limit == 0
    }

    /// View of `items` inside this window, truncated to what exists.
    pub fn window<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        window(items, self.offset, self.limit)
    }

    /// Keep only the items inside this window.
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        if self.is_unbounded() {
            return items;
        }
        let take = if self.limit == 0 {
            usize::MAX
        } else {
            self.limit
        };
        items.into_iter().skip(self.offset).take(take).collect()
    }
}

/// `rows[offset .. offset + limit]`, truncated to the available length.
///
/// A limit of 0 means "to the end". Never fails and never copies.
pub fn window<T>(rows: &[T], offset: usize, limit: usize) -> &[T] {
    let start = offset.min(rows.len());
    let end = if limit == 0 {
        rows.len()
    } else {
        start.saturating_add(limit).min(rows.len())
    };
    &rows[start..end]
}

/// How a paged select is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// Truncate the mapped result client-side.
    Logical(RowBounds),
    /// Bind `offset` and `limit` into the statement.
    Physical(RowBounds),
}

impl Pagination {
    pub const fn bounds(&self) -> RowBounds {
        match self {
            Pagination::Logical(b) | Pagination::Physical(b) => *b,
        }
    }

    /// Add `offset`/`limit` parameters for a physical window.
    ///
    /// Fails when the statement has no `limit` placeholder, since the window
    /// would otherwise be silently ignored. An unbounded limit is bound as
    /// `i64::MAX`.
    pub(crate) fn bind_physical(
        bounds: RowBounds,
        statement: &Statement,
        params: Params,
    ) -> Result<Params> {
        if !statement
            .template()
            .parameter_names()
            .any(|name| name == "limit")
        {
            return Err(Error::config(format!(
                "statement '{}' has no #{{limit}} placeholder and cannot be paged physically",
                statement.id()
            )));
        }
        let limit = if bounds.limit == 0 {
            i64::MAX
        } else {
            i64::try_from(bounds.limit).unwrap_or(i64::MAX)
        };
        let offset = i64::try_from(bounds.offset).unwrap_or(i64::MAX);
        Ok(params.with("offset", offset).with("limit", limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlmapper_core::Value;

    #[test]
    fn window_inside_range() {
        let rows: Vec<u32> = (0..10).collect();
        assert_eq!(window(&rows, 2, 5), &[2, 3, 4, 5, 6]);
    }

    #[test]
    fn window_truncates() {
        let rows: Vec<u32> = (0..4).collect();
        assert_eq!(window(&rows, 2, 5), &[2, 3]);
        assert!(window(&rows, 9, 5).is_empty());
        assert_eq!(window(&rows, 0, 0), &[0, 1, 2, 3]);
        assert_eq!(window(&rows, 3, 0), &[3]);
        assert_eq!(window(&rows, 1, usize::MAX), &[1, 2, 3]);
    }

    #[test]
    fn window_leaves_source_untouched() {
        let rows = vec!["r0", "r1", "r2"];
        let view = RowBounds::new(1, 1).window(&rows);
        assert_eq!(view, ["r1"]);
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn apply_owns_the_window() {
        let rows: Vec<u32> = (0..10).collect();
        assert_eq!(RowBounds::new(0, 5).apply(rows.clone()), vec![0, 1, 2, 3, 4]);
        assert_eq!(RowBounds::new(8, 0).apply(rows.clone()), vec![8, 9]);
        assert_eq!(RowBounds::NONE.apply(rows.clone()), rows);
    }

    #[test]
    fn physical_binding() {
        let stmt = Statement::select(
            "selectBlogPage",
            "SELECT * FROM blog ORDER BY bid LIMIT #{limit} OFFSET #{offset}",
        )
        .unwrap();
        let params = Pagination::bind_physical(RowBounds::new(5, 5), &stmt, Params::none()).unwrap();
        let bound = stmt.bind(&params).unwrap();
        assert_eq!(bound.params, vec![Value::BigInt(5), Value::BigInt(5)]);

        let params = Pagination::bind_physical(RowBounds::NONE, &stmt, Params::none()).unwrap();
        assert_eq!(params.lookup("limit"), Some(Value::BigInt(i64::MAX)));

        let plain = Statement::select("selectBlogList", "SELECT * FROM blog").unwrap();
        assert!(Pagination::bind_physical(RowBounds::new(0, 5), &plain, Params::none()).is_err());
    }
}
