//! The subset of the libsqlite3 C API the driver uses.
//!
//! Bindings come from `libsqlite3-sys`, which also builds and links the
//! bundled SQLite. This module narrows them to what the driver calls and adds
//! a few safe helpers.

use std::ffi::{CStr, c_int};

pub use libsqlite3_sys::{
    SQLITE_BLOB, SQLITE_BUSY, SQLITE_CONSTRAINT, SQLITE_DONE, SQLITE_FLOAT, SQLITE_INTEGER,
    SQLITE_LOCKED, SQLITE_NOTFOUND, SQLITE_NULL, SQLITE_OK, SQLITE_OPEN_CREATE,
    SQLITE_OPEN_FULLMUTEX, SQLITE_OPEN_NOMUTEX, SQLITE_OPEN_PRIVATECACHE, SQLITE_OPEN_READONLY,
    SQLITE_OPEN_READWRITE, SQLITE_OPEN_SHAREDCACHE, SQLITE_OPEN_URI, SQLITE_ROW, SQLITE_TEXT,
    sqlite3, sqlite3_busy_timeout, sqlite3_column_blob, sqlite3_column_bytes,
    sqlite3_column_count, sqlite3_column_double, sqlite3_column_int64, sqlite3_column_name,
    sqlite3_column_text, sqlite3_column_type, sqlite3_errmsg, sqlite3_errstr, sqlite3_exec,
    sqlite3_extended_errcode, sqlite3_finalize, sqlite3_free, sqlite3_last_insert_rowid,
    sqlite3_libversion, sqlite3_libversion_number, sqlite3_open_v2, sqlite3_prepare_v2,
    sqlite3_step, sqlite3_stmt, sqlite3_total_changes64,
};

// `libsqlite3-sys` 0.37 omits this binding; the bundled library still exports it.
unsafe extern "C" {
    pub fn sqlite3_close_v2(db: *mut sqlite3) -> c_int;
}

/// SQLite library version, e.g. `"3.46.0"`.
pub fn version() -> &'static str {
    // SAFETY: sqlite3_libversion returns a pointer to a static NUL-terminated string.
    let version = unsafe { CStr::from_ptr(sqlite3_libversion()) };
    version.to_str().unwrap_or("unknown")
}

/// SQLite version as `3XXXYYY`.
pub fn version_number() -> i32 {
    // SAFETY: no preconditions.
    unsafe { sqlite3_libversion_number() }
}

/// English description of a result code.
pub fn error_string(code: c_int) -> &'static str {
    // SAFETY: sqlite3_errstr returns a pointer to a static NUL-terminated string.
    let message = unsafe { CStr::from_ptr(sqlite3_errstr(code)) };
    message.to_str().unwrap_or("unknown error")
}

/// Primary result code of an extended code.
pub fn primary_code(code: c_int) -> c_int {
    code & 0xff
}
