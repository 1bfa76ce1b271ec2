//! SQLite store driver.
//!
//! [`SqliteDriver`] wraps one `sqlite3` handle and implements
//! [`StoreDriver`]. Queries are stepped to completion and collected before
//! returning; no statement outlives the call that prepared it.

// FFI calls take C integer types.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::borrow_as_ptr)]

use std::ffi::{CStr, CString, c_char, c_int};
use std::ptr;
use std::sync::Arc;

use relorm_core::{
    ColumnInfo, ConnectionError, ConnectionErrorKind, Error, QueryError, QueryErrorKind,
    ResultSet, Result, Row, StoreDriver,
};
use serde::{Deserialize, Serialize};

use crate::ffi;
use crate::types;

/// Path naming a private in-memory database.
pub const MEMORY: &str = ":memory:";

/// Configuration for opening a SQLite database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Database file, or `:memory:`.
    pub path: String,
    pub flags: OpenFlags,
    /// How long a statement waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u32,
    /// Enforce `FOREIGN KEY` constraints.
    pub foreign_keys: bool,
}

/// Flags controlling how the database is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenFlags {
    pub read_only: bool,
    pub read_write: bool,
    /// Create the database file if missing.
    pub create: bool,
    /// Interpret the path as a URI.
    pub uri: bool,
    pub no_mutex: bool,
    pub full_mutex: bool,
    pub shared_cache: bool,
    pub private_cache: bool,
}

impl OpenFlags {
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    /// Read-write; the database must exist.
    pub fn read_write() -> Self {
        Self {
            read_write: true,
            ..Default::default()
        }
    }

    pub fn create_read_write() -> Self {
        Self {
            read_write: true,
            create: true,
            ..Default::default()
        }
    }

    fn to_sqlite_flags(self) -> c_int {
        let mut flags = 0;
        for (set, flag) in [
            (self.read_only, ffi::SQLITE_OPEN_READONLY),
            (self.read_write, ffi::SQLITE_OPEN_READWRITE),
            (self.create, ffi::SQLITE_OPEN_CREATE),
            (self.uri, ffi::SQLITE_OPEN_URI),
            (self.no_mutex, ffi::SQLITE_OPEN_NOMUTEX),
            (self.full_mutex, ffi::SQLITE_OPEN_FULLMUTEX),
            (self.shared_cache, ffi::SQLITE_OPEN_SHAREDCACHE),
            (self.private_cache, ffi::SQLITE_OPEN_PRIVATECACHE),
        ] {
            if set {
                flags |= flag;
            }
        }

        // Default to read-write-create if no access mode was chosen.
        if flags & (ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_READWRITE) == 0 {
            flags |= ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
        }
        flags
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: MEMORY.to_string(),
            flags: OpenFlags::create_read_write(),
            busy_timeout_ms: 5000,
            foreign_keys: false,
        }
    }
}

impl SqliteConfig {
    /// A file-backed database, created if missing.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// A private in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }

    pub fn foreign_keys(mut self, enforce: bool) -> Self {
        self.foreign_keys = enforce;
        self
    }
}

/// A [`StoreDriver`] over one SQLite connection.
///
/// Not `Send`: a driver belongs to the session that owns it.
pub struct SqliteDriver {
    config: SqliteConfig,
    db: *mut ffi::sqlite3,
    in_transaction: bool,
}

impl std::fmt::Debug for SqliteDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDriver")
            .field("path", &self.config.path)
            .field("open", &self.is_open())
            .field("in_transaction", &self.in_transaction)
            .finish()
    }
}

impl SqliteDriver {
    /// A closed driver; [`StoreDriver::open`] connects.
    pub fn new(config: SqliteConfig) -> Self {
        Self {
            config,
            db: ptr::null_mut(),
            in_transaction: false,
        }
    }

    /// A closed driver over a private in-memory database.
    pub fn memory() -> Self {
        Self::new(SqliteConfig::memory())
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    pub fn path(&self) -> &str {
        &self.config.path
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Run one or more `;`-separated statements, discarding any rows.
    pub fn execute_batch(&mut self, sql: &str) -> Result<()> {
        let db = self.handle()?;
        let c_sql = to_c_string(sql)?;
        let mut errmsg: *mut c_char = ptr::null_mut();

        // SAFETY: db is open, c_sql is NUL-terminated and errmsg is a valid
        // out-pointer.
        let rc = unsafe { ffi::sqlite3_exec(db, c_sql.as_ptr(), None, ptr::null_mut(), &mut errmsg) };
        if rc == ffi::SQLITE_OK {
            return Ok(());
        }

        let message = if errmsg.is_null() {
            ffi::error_string(rc).to_string()
        } else {
            // SAFETY: errmsg was allocated by sqlite3_exec and is released
            // with sqlite3_free after copying.
            unsafe {
                let message = CStr::from_ptr(errmsg).to_string_lossy().into_owned();
                ffi::sqlite3_free(errmsg.cast());
                message
            }
        };
        Err(query_error(error_kind(rc, &message), sql, message))
    }

    fn handle(&self) -> Result<*mut ffi::sqlite3> {
        if self.db.is_null() {
            Err(Error::closed(format!("SQLite database {} is not open", self.config.path)))
        } else {
            Ok(self.db)
        }
    }

    fn total_changes(&self) -> Result<u64> {
        let db = self.handle()?;
        // SAFETY: db is open.
        Ok(unsafe { ffi::sqlite3_total_changes64(db) } as u64)
    }

    /// Prepare `sql`, step it to completion and collect its rows.
    fn run(&mut self, sql: &str) -> Result<ResultSet> {
        let db = self.handle()?;
        let statement = Statement::prepare(db, sql)?;

        // SAFETY: the statement is valid until dropped.
        let count = unsafe { ffi::sqlite3_column_count(statement.raw) };
        let names = (0..count)
            // SAFETY: 0 <= i < count.
            .map(|i| unsafe { types::column_name(statement.raw, i) }.unwrap_or_else(|| format!("col{i}")))
            .collect();
        let columns = Arc::new(ColumnInfo::new(names));

        let mut rows = Vec::new();
        loop {
            // SAFETY: the statement is valid until dropped.
            match unsafe { ffi::sqlite3_step(statement.raw) } {
                ffi::SQLITE_ROW => {
                    let values = (0..count)
                        // SAFETY: the step just returned a row and 0 <= i < count.
                        .map(|i| unsafe { types::read_column(statement.raw, i) })
                        .collect();
                    rows.push(Row::with_columns(Arc::clone(&columns), values));
                }
                ffi::SQLITE_DONE => break,
                _ => return Err(last_error(db, sql)),
            }
        }
        Ok(ResultSet::new(rows))
    }
}

impl StoreDriver for SqliteDriver {
    #[tracing::instrument(level = "debug", skip(self), fields(path = %self.config.path))]
    fn open(&mut self) -> Result<()> {
        if self.is_open() {
            return Ok(());
        }
        let path = CString::new(self.config.path.as_str()).map_err(|_| {
            connect_error("Invalid path: contains null byte".to_string())
        })?;
        let mut db: *mut ffi::sqlite3 = ptr::null_mut();

        // SAFETY: path is NUL-terminated and db is a valid out-pointer.
        let rc = unsafe {
            ffi::sqlite3_open_v2(path.as_ptr(), &mut db, self.config.flags.to_sqlite_flags(), ptr::null())
        };
        if rc != ffi::SQLITE_OK {
            let message = if db.is_null() {
                ffi::error_string(rc).to_string()
            } else {
                // SAFETY: a handle is returned even on failure and must be closed.
                unsafe {
                    let message = errmsg(db);
                    ffi::sqlite3_close_v2(db);
                    message
                }
            };
            return Err(connect_error(format!("Failed to open database: {message}")));
        }

        if self.config.busy_timeout_ms > 0 {
            let timeout = c_int::try_from(self.config.busy_timeout_ms).unwrap_or(c_int::MAX);
            // SAFETY: db is open.
            unsafe { ffi::sqlite3_busy_timeout(db, timeout) };
        }
        self.db = db;

        if self.config.foreign_keys {
            if let Err(e) = self.execute_batch("PRAGMA foreign_keys = ON") {
                let _ = self.close();
                return Err(e);
            }
        }
        tracing::debug!(version = ffi::version(), "SQLite database opened");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.db.is_null() {
            return Ok(());
        }
        // SAFETY: db is open and every statement has been finalized.
        let rc = unsafe { ffi::sqlite3_close_v2(self.db) };
        self.db = ptr::null_mut();
        self.in_transaction = false;
        if rc == ffi::SQLITE_OK {
            Ok(())
        } else {
            Err(connect_error(format!("Failed to close database: {}", ffi::error_string(rc))))
        }
    }

    fn is_open(&self) -> bool {
        !self.db.is_null()
    }

    fn execute(&mut self, sql: &str) -> Result<u64> {
        let before = self.total_changes()?;
        self.run(sql)?;
        Ok(self.total_changes()?.saturating_sub(before))
    }

    fn query(&mut self, sql: &str) -> Result<ResultSet> {
        self.run(sql)
    }

    /// Rowid of the most recent successful INSERT on this connection. Zero
    /// is a valid rowid, so the answer is only meaningful right after an
    /// INSERT that changed a row.
    fn last_insert_id(&mut self) -> Result<Option<i64>> {
        let db = self.handle()?;
        // SAFETY: db is open.
        Ok(Some(unsafe { ffi::sqlite3_last_insert_rowid(db) }))
    }

    fn begin_transaction(&mut self) -> Result<()> {
        self.execute_batch("BEGIN")?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.execute_batch("COMMIT")?;
        self.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.execute_batch("ROLLBACK")?;
        self.in_transaction = false;
        Ok(())
    }
}

impl Drop for SqliteDriver {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "Failed to close SQLite database");
        }
    }
}

/// A prepared statement, finalized on drop.
struct Statement {
    raw: *mut ffi::sqlite3_stmt,
}

impl Statement {
    fn prepare(db: *mut ffi::sqlite3, sql: &str) -> Result<Self> {
        let c_sql = to_c_string(sql)?;
        let mut raw: *mut ffi::sqlite3_stmt = ptr::null_mut();

        // SAFETY: db is open, c_sql is NUL-terminated with the given length,
        // and raw is a valid out-pointer.
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(
                db,
                c_sql.as_ptr(),
                c_sql.as_bytes().len() as c_int,
                &mut raw,
                ptr::null_mut(),
            )
        };
        if rc != ffi::SQLITE_OK {
            return Err(last_error(db, sql));
        }
        if raw.is_null() {
            return Err(query_error(
                QueryErrorKind::Syntax,
                sql,
                "statement is empty".to_string(),
            ));
        }
        Ok(Self { raw })
    }
}

impl Drop for Statement {
    fn drop(&mut self) {
        // SAFETY: raw came from sqlite3_prepare_v2 and is finalized once.
        unsafe { ffi::sqlite3_finalize(self.raw) };
    }
}

fn to_c_string(sql: &str) -> Result<CString> {
    CString::new(sql).map_err(|_| {
        query_error(QueryErrorKind::Syntax, sql, "SQL contains null byte".to_string())
    })
}

/// Message of the most recent error on `db`.
///
/// # Safety
/// `db` must be a valid handle.
unsafe fn errmsg(db: *mut ffi::sqlite3) -> String {
    // SAFETY: guaranteed by the caller.
    let message = unsafe { CStr::from_ptr(ffi::sqlite3_errmsg(db)) };
    message.to_string_lossy().into_owned()
}

fn last_error(db: *mut ffi::sqlite3, sql: &str) -> Error {
    // SAFETY: callers pass an open handle.
    let (code, message) = unsafe { (ffi::sqlite3_extended_errcode(db), errmsg(db)) };
    let kind = error_kind(code, &message);
    tracing::debug!(code, kind = ?kind, message = %message, "SQLite error");
    query_error(kind, sql, message)
}

fn error_kind(code: c_int, message: &str) -> QueryErrorKind {
    match ffi::primary_code(code) {
        ffi::SQLITE_CONSTRAINT => QueryErrorKind::Constraint,
        ffi::SQLITE_BUSY | ffi::SQLITE_LOCKED => QueryErrorKind::Busy,
        ffi::SQLITE_NOTFOUND => QueryErrorKind::NotFound,
        _ if message.starts_with("no such") => QueryErrorKind::NotFound,
        _ if message.contains("syntax error") => QueryErrorKind::Syntax,
        _ => QueryErrorKind::Database,
    }
}

fn query_error(kind: QueryErrorKind, sql: &str, message: String) -> Error {
    Error::Query(QueryError {
        kind,
        sql: Some(sql.to_string()),
        message,
        source: None,
    })
}

fn connect_error(message: String) -> Error {
    Error::Connection(ConnectionError {
        kind: ConnectionErrorKind::Connect,
        message,
    })
}
