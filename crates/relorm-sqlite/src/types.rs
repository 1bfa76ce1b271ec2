//! Column values read from SQLite result rows.
//!
//! SQLite has five storage classes, mapped onto [`Value`]:
//!
//! | Storage class | Value |
//! |---------------|-------|
//! | NULL | `Null` |
//! | INTEGER | `Int` when it fits 32 bits, else `BigInt` |
//! | REAL | `Double` |
//! | TEXT | `Text` |
//! | BLOB | `Bytes` |
//!
//! Statements arrive with literals embedded, so nothing is bound.

use std::ffi::{CStr, c_int};

use relorm_core::Value;

use crate::ffi;

/// Read column `index` of the current row.
///
/// # Safety
/// - `stmt` must be a valid prepared statement that just returned `SQLITE_ROW`
/// - `index` must be a valid 0-based column index
pub unsafe fn read_column(stmt: *mut ffi::sqlite3_stmt, index: c_int) -> Value {
    // SAFETY: guaranteed by the caller.
    unsafe {
        match ffi::sqlite3_column_type(stmt, index) {
            ffi::SQLITE_INTEGER => integer(ffi::sqlite3_column_int64(stmt, index)),
            ffi::SQLITE_FLOAT => Value::Double(ffi::sqlite3_column_double(stmt, index)),
            ffi::SQLITE_TEXT => {
                let ptr = ffi::sqlite3_column_text(stmt, index);
                let len = ffi::sqlite3_column_bytes(stmt, index);
                if ptr.is_null() {
                    Value::Null
                } else {
                    let bytes = std::slice::from_raw_parts(ptr.cast::<u8>(), len as usize);
                    Value::Text(String::from_utf8_lossy(bytes).into_owned())
                }
            }
            ffi::SQLITE_BLOB => {
                let ptr = ffi::sqlite3_column_blob(stmt, index);
                let len = ffi::sqlite3_column_bytes(stmt, index);
                if ptr.is_null() || len == 0 {
                    Value::Bytes(Vec::new())
                } else {
                    Value::Bytes(std::slice::from_raw_parts(ptr.cast::<u8>(), len as usize).to_vec())
                }
            }
            _ => Value::Null,
        }
    }
}

/// Name of result column `index`.
///
/// # Safety
/// - `stmt` must be a valid prepared statement
/// - `index` must be a valid 0-based column index
pub unsafe fn column_name(stmt: *mut ffi::sqlite3_stmt, index: c_int) -> Option<String> {
    // SAFETY: guaranteed by the caller; the name stays valid until the next
    // call on this statement, and is copied out here.
    unsafe {
        let ptr = ffi::sqlite3_column_name(stmt, index);
        if ptr.is_null() {
            None
        } else {
            CStr::from_ptr(ptr).to_str().ok().map(String::from)
        }
    }
}

/// Smallest integer variant holding `v`.
pub fn integer(v: i64) -> Value {
    i32::try_from(v).map_or(Value::BigInt(v), Value::Int)
}
