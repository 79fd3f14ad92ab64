//! Moving [`Value`]s in and out of SQLite statements.
//!
//! Bound values map onto SQLite's storage classes. Read cells come back as
//! `Int` when they fit in 32 bits and `BigInt` otherwise, so key columns
//! compare equal whichever width the caller bound.

#![allow(unsafe_code)]
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use crate::ffi;
use sqlmapper_core::Value;
use std::ffi::{CStr, c_int};

/// Copy `len` bytes starting at `ptr`. A null pointer reads as empty.
///
/// # Safety
/// `ptr` must be null or valid for `len` bytes.
unsafe fn copy_bytes(ptr: *const u8, len: c_int) -> Vec<u8> {
    if ptr.is_null() || len <= 0 {
        return Vec::new();
    }
    // SAFETY: caller guarantees the buffer
    unsafe { std::slice::from_raw_parts(ptr, len as usize) }.to_vec()
}

/// Bind `value` to the 1-based parameter `index`.
///
/// Text and blobs are bound with `SQLITE_TRANSIENT`, so SQLite keeps its own
/// copy. JSON is bound as its text rendering.
///
/// # Safety
/// `stmt` must be a live prepared statement and `index` within its
/// parameter count.
pub unsafe fn bind_value(stmt: *mut ffi::sqlite3_stmt, index: c_int, value: &Value) -> c_int {
    let blob = |bytes: &[u8]| {
        // SAFETY: forwarded caller guarantees; SQLite copies the buffer
        unsafe {
            ffi::sqlite3_bind_blob(
                stmt,
                index,
                bytes.as_ptr().cast(),
                bytes.len() as c_int,
                ffi::SQLITE_TRANSIENT(),
            )
        }
    };
    let text = |s: &str| {
        // SAFETY: as above
        unsafe {
            ffi::sqlite3_bind_text(
                stmt,
                index,
                s.as_ptr().cast(),
                s.len() as c_int,
                ffi::SQLITE_TRANSIENT(),
            )
        }
    };

    // SAFETY: forwarded caller guarantees
    match value {
        Value::Null => unsafe { ffi::sqlite3_bind_null(stmt, index) },
        Value::Bool(b) => unsafe { ffi::sqlite3_bind_int(stmt, index, c_int::from(*b)) },
        Value::Int(n) => unsafe { ffi::sqlite3_bind_int(stmt, index, *n) },
        Value::BigInt(n) => unsafe { ffi::sqlite3_bind_int64(stmt, index, *n) },
        Value::Double(x) => unsafe { ffi::sqlite3_bind_double(stmt, index, *x) },
        Value::Text(s) => text(s),
        Value::Bytes(b) => blob(b),
        Value::Json(json) => text(&json.to_string()),
    }
}

/// Read the cell at 0-based `index` of the current row.
///
/// # Safety
/// `stmt` must have just returned `SQLITE_ROW` and `index` must be below
/// its column count.
pub unsafe fn read_column(stmt: *mut ffi::sqlite3_stmt, index: c_int) -> Value {
    // SAFETY: forwarded caller guarantees. Column pointers stay valid until
    // the next step, and every buffer is copied before returning.
    unsafe {
        match ffi::sqlite3_column_type(stmt, index) {
            ffi::SQLITE_INTEGER => {
                let n = ffi::sqlite3_column_int64(stmt, index);
                i32::try_from(n).map_or(Value::BigInt(n), Value::Int)
            }
            ffi::SQLITE_FLOAT => Value::Double(ffi::sqlite3_column_double(stmt, index)),
            ffi::SQLITE_TEXT => {
                let ptr = ffi::sqlite3_column_text(stmt, index);
                if ptr.is_null() {
                    return Value::Null;
                }
                let bytes = copy_bytes(ptr.cast(), ffi::sqlite3_column_bytes(stmt, index));
                Value::Text(String::from_utf8(bytes).unwrap_or_else(|e| {
                    String::from_utf8_lossy(e.as_bytes()).into_owned()
                }))
            }
            ffi::SQLITE_BLOB => {
                let ptr = ffi::sqlite3_column_blob(stmt, index);
                Value::Bytes(copy_bytes(ptr.cast(), ffi::sqlite3_column_bytes(stmt, index)))
            }
            _ => Value::Null,
        }
    }
}

/// Label of the 0-based result column `index`, as written in the select
/// list (`AS` aliases included).
///
/// # Safety
/// `stmt` must be a live prepared statement and `index` below its column
/// count.
pub unsafe fn column_name(stmt: *mut ffi::sqlite3_stmt, index: c_int) -> Option<String> {
    // SAFETY: forwarded caller guarantees
    let ptr = unsafe { ffi::sqlite3_column_name(stmt, index) };
    if ptr.is_null() {
        return None;
    }
    // SAFETY: non-null column names are NUL-terminated and live until finalize
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .ok()
        .map(str::to_string)
}
