//! Entities and a statement-recording SQLite driver shared by the
//! integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, Utc};
use relorm::prelude::*;

/// Statements seen by a [`RecordingDriver`], shared with the test.
#[derive(Debug, Clone, Default)]
pub struct StatementLog(Rc<RefCell<Vec<String>>>);

impl StatementLog {
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    fn push(&self, sql: &str) {
        self.0.borrow_mut().push(sql.to_string());
    }
}

/// In-memory SQLite driver that logs every executed statement and query.
pub struct RecordingDriver {
    inner: SqliteDriver,
    log: StatementLog,
}

impl RecordingDriver {
    pub fn new() -> (Self, StatementLog) {
        let log = StatementLog::default();
        let driver = Self {
            inner: SqliteDriver::memory(),
            log: log.clone(),
        };
        (driver, log)
    }
}

impl StoreDriver for RecordingDriver {
    fn open(&mut self) -> Result<()> {
        self.inner.open()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    fn execute(&mut self, sql: &str) -> Result<u64> {
        self.log.push(sql);
        self.inner.execute(sql)
    }

    fn query(&mut self, sql: &str) -> Result<relorm::ResultSet> {
        self.log.push(sql);
        self.inner.query(sql)
    }

    fn last_insert_id(&mut self) -> Result<Option<i64>> {
        self.inner.last_insert_id()
    }

    fn begin_transaction(&mut self) -> Result<()> {
        self.inner.begin_transaction()
    }

    fn commit(&mut self) -> Result<()> {
        self.inner.commit()
    }

    fn rollback(&mut self) -> Result<()> {
        self.inner.rollback()
    }
}

pub fn schema() -> Schema {
    Schema::new()
        .entity::<Author>()
        .entity::<Book>()
        .entity::<Pilot>()
        .entity::<Plane>()
        .entity::<Student>()
        .entity::<Course>()
        .entity::<Reading>()
        .entity::<Country>()
}

/// An open session over a fresh in-memory database with every test table
/// created. The log starts empty.
pub fn open_session(config: SessionConfig) -> (Session, StatementLog) {
    let (driver, log) = RecordingDriver::new();
    let session = Session::new(driver, config);
    session.open().unwrap();
    session.create_schema(&schema()).unwrap();
    log.clear();
    (session, log)
}

pub fn session() -> (Session, StatementLog) {
    open_session(SessionConfig::default())
}

/// Run `f` inside a transaction scope and commit.
pub fn in_transaction<R>(session: &Session, f: impl FnOnce() -> Result<R>) -> R {
    session.begin_transaction().unwrap();
    let result = f().unwrap();
    session.commit().unwrap();
    result
}

/// Row count of `table`.
pub fn count_rows(session: &Session, table: &str) -> i64 {
    let result = session
        .query(&format!("SELECT COUNT(*) FROM {table}"))
        .unwrap();
    result.rows()[0].get(0).and_then(Value::as_i64).unwrap()
}

/// First column of every row `sql` returns, as integers.
pub fn integers(session: &Session, sql: &str) -> Vec<i64> {
    session
        .query(sql)
        .unwrap()
        .rows()
        .iter()
        .map(|row| row.get(0).and_then(Value::as_i64).unwrap())
        .collect()
}

/// Loads its books lazily. Books carry the foreign key without mapping the
/// inverse.
#[derive(Debug, Default)]
pub struct Author {
    pub id: Option<i64>,
    pub name: String,
    pub books: RelatedMany<Book>,
}

#[derive(Debug, Default)]
pub struct Book {
    pub id: Option<i64>,
    pub title: String,
    pub published: Option<DateTime<Utc>>,
}

impl Entity for Author {
    fn descriptor() -> &'static EntityDescriptor {
        static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::builder::<Author>("author")
                .primary_key("id", |a| a.id, |a, v| a.id = v)
                .auto_increment()
                .column("name", |a| a.name.clone(), |a, v| a.name = v)
                .one_to_many("books", "authorId", |a| &a.books, |a| &mut a.books)
                .lazy(true)
                .build()
        })
    }
}

impl Entity for Book {
    fn descriptor() -> &'static EntityDescriptor {
        static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::builder::<Book>("book")
                .primary_key("id", |b| b.id, |b, v| b.id = v)
                .auto_increment()
                .column("title", |b| b.title.clone(), |b, v| b.title = v)
                .nullable("published", |b| b.published, |b, v| b.published = v)
                .foreign_key::<Author>("authorId")
                .build()
        })
    }
}

/// Both sides of this one-to-one own a foreign key to the other.
#[derive(Debug, Default)]
pub struct Pilot {
    pub id: Option<i64>,
    pub name: String,
    pub plane: Related<Plane>,
}

#[derive(Debug, Default)]
pub struct Plane {
    pub id: Option<i64>,
    pub model: String,
    pub pilot: Related<Pilot>,
}

impl Entity for Pilot {
    fn descriptor() -> &'static EntityDescriptor {
        static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::builder::<Pilot>("pilot")
                .primary_key("id", |p| p.id, |p, v| p.id = v)
                .auto_increment()
                .column("name", |p| p.name.clone(), |p, v| p.name = v)
                .one_to_one("plane", "planeId", true, |p| &p.plane, |p| &mut p.plane)
                .build()
        })
    }
}

impl Entity for Plane {
    fn descriptor() -> &'static EntityDescriptor {
        static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::builder::<Plane>("plane")
                .primary_key("id", |p| p.id, |p, v| p.id = v)
                .auto_increment()
                .column("model", |p| p.model.clone(), |p, v| p.model = v)
                .one_to_one("pilot", "pilotId", true, |p| &p.pilot, |p| &mut p.pilot)
                .build()
        })
    }
}

pub const ENROLLMENT: ManyToMany =
    ManyToMany::new("enrollment", Student::descriptor, "id", Course::descriptor, "id");

#[derive(Debug, Default)]
pub struct Student {
    pub id: Option<i64>,
    pub name: String,
    pub courses: RelatedMany<Course>,
}

#[derive(Debug, Default)]
pub struct Course {
    pub id: Option<i64>,
    pub title: String,
    pub students: RelatedMany<Student>,
}

impl Entity for Student {
    fn descriptor() -> &'static EntityDescriptor {
        static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::builder::<Student>("student")
                .primary_key("id", |s| s.id, |s, v| s.id = v)
                .auto_increment()
                .column("name", |s| s.name.clone(), |s, v| s.name = v)
                .many_to_many("courses", ENROLLMENT, |s| &s.courses, |s| &mut s.courses)
                .build()
        })
    }
}

impl Entity for Course {
    fn descriptor() -> &'static EntityDescriptor {
        static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::builder::<Course>("course")
                .primary_key("id", |c| c.id, |c, v| c.id = v)
                .auto_increment()
                .column("title", |c| c.title.clone(), |c, v| c.title = v)
                .many_to_many("students", ENROLLMENT, |c| &c.students, |c| &mut c.students)
                .build()
        })
    }
}

/// One column of every built-in scalar family.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Reading {
    pub id: Option<i64>,
    pub sensor: String,
    pub taken_at: DateTime<Utc>,
    pub day: NaiveDate,
    pub celsius: f64,
    pub calibrated: bool,
    pub raw: Vec<u8>,
    pub note: Option<String>,
}

impl Entity for Reading {
    fn descriptor() -> &'static EntityDescriptor {
        static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::builder::<Reading>("reading")
                .primary_key("id", |r| r.id, |r, v| r.id = v)
                .auto_increment()
                .column("sensor", |r| r.sensor.clone(), |r, v| r.sensor = v)
                .column("takenAt", |r| r.taken_at, |r, v| r.taken_at = v)
                .column("day", |r| r.day, |r, v| r.day = v)
                .column("celsius", |r| r.celsius, |r, v| r.celsius = v)
                .column("calibrated", |r| r.calibrated, |r, v| r.calibrated = v)
                .column("raw", |r| r.raw.clone(), |r, v| r.raw = v)
                .nullable("note", |r| r.note.clone(), |r, v| r.note = v)
                .build()
        })
    }
}

/// Keyed by a natural key the application assigns.
#[derive(Debug, Default)]
pub struct Country {
    pub code: Option<String>,
    pub name: String,
}

impl Entity for Country {
    fn descriptor() -> &'static EntityDescriptor {
        static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::builder::<Country>("country")
                .primary_key("code", |c| c.code.clone(), |c, v| c.code = v)
                .column("name", |c| c.name.clone(), |c, v| c.name = v)
                .unique()
                .build()
        })
    }
}
