//! Thin helpers over the `libsqlite3-sys` bindings.
//!
//! The raw bindings are re-exported unchanged; this module only adds the
//! string conversions the driver needs for diagnostics.

#![allow(unsafe_code)]

pub use libsqlite3_sys::*;

// `libsqlite3-sys` 0.37 omits `sqlite3_close_v2` from its generated bindings;
// the symbol is still provided by the bundled SQLite library.
unsafe extern "C" {
    pub fn sqlite3_close_v2(db: *mut sqlite3) -> c_int;
}

use std::ffi::{CStr, c_int};

/// Get the SQLite library version as a string.
pub fn version() -> &'static str {
    // SAFETY: sqlite3_libversion returns a pointer to a static string
    unsafe {
        let ptr = sqlite3_libversion();
        CStr::from_ptr(ptr).to_str().unwrap_or("unknown")
    }
}

/// Get the SQLite library version as a number.
pub fn version_number() -> i32 {
    // SAFETY: sqlite3_libversion_number is always safe to call
    unsafe { sqlite3_libversion_number() }
}

/// Convert an SQLite result code to a human-readable string.
pub fn error_string(code: c_int) -> &'static str {
    // SAFETY: sqlite3_errstr returns a pointer to a static string
    unsafe {
        let ptr = sqlite3_errstr(code);
        if ptr.is_null() {
            return "unknown error";
        }
        CStr::from_ptr(ptr).to_str().unwrap_or("unknown error")
    }
}

/// Read the most recent error message recorded on a connection handle.
///
/// # Safety
/// `db` must be a valid, open connection handle.
pub unsafe fn last_error_message(db: *mut sqlite3) -> String {
    // SAFETY: caller guarantees db is valid; errmsg never returns dangling memory
    unsafe {
        let ptr = sqlite3_errmsg(db);
        if ptr.is_null() {
            return String::from("unknown error");
        }
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}
