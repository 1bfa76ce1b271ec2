//! SQLite store driver for relorm.
//!
//! [`SqliteDriver`] implements `relorm_core::StoreDriver` over the bundled
//! libsqlite3. Statements arrive as complete SQL text; rows are collected
//! into a `ResultSet` before each call returns.
//!
//! ```rust,ignore
//! use relorm_sqlite::{SqliteConfig, SqliteDriver};
//! use relorm_session::{Session, SessionConfig};
//!
//! let session = Session::new(SqliteDriver::new(SqliteConfig::file("app.db")), SessionConfig::default());
//! session.open()?;
//! ```
//!
//! # Type Mapping
//!
//! | Field type | Column |
//! |------------|--------|
//! | `bool` | INTEGER (0/1) |
//! | integers | INTEGER |
//! | `f32`, `f64` | REAL |
//! | `String`, `char` | TEXT |
//! | `Vec<u8>` | BLOB |
//! | `DateTime<Utc>`, `NaiveDate` | TEXT (ISO-8601) |

// FFI bindings require unsafe code.
#![allow(unsafe_code)]

pub mod connection;
pub mod ffi;
pub mod types;

pub use connection::{MEMORY, OpenFlags, SqliteConfig, SqliteDriver};

/// Version of the linked SQLite library.
pub fn sqlite_version() -> &'static str {
    ffi::version()
}

pub fn sqlite_version_number() -> i32 {
    ffi::version_number()
}
