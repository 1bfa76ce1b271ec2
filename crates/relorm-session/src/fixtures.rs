//! Entities and a scripted driver shared by this crate's unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::OnceLock;

use relorm_core::{
    Entity, EntityDescriptor, Error, ManyToMany, QueryError, QueryErrorKind, Related, RelatedMany,
    ResultSet, Result, StoreDriver,
};

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
    pub author: Related<Author>,
    pub tags: RelatedMany<Tag>,
}

#[derive(Debug, Default)]
pub struct Tag {
    pub label: Option<String>,
    pub books: RelatedMany<Book>,
}

#[derive(Debug, Default)]
pub struct User {
    pub name: Option<String>,
    pub profile: Related<Profile>,
}

#[derive(Debug, Default)]
pub struct Profile {
    pub id: Option<i64>,
    pub bio: Option<String>,
    pub user: Related<User>,
}

pub const TAGGING: ManyToMany =
    ManyToMany::new("book_tag", Book::descriptor, "id", Tag::descriptor, "label");

impl Entity for Author {
    fn descriptor() -> &'static EntityDescriptor {
        static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::builder::<Author>("author")
                .primary_key("id", |a| a.id, |a, v| a.id = v)
                .auto_increment()
                .column("name", |a| a.name.clone(), |a, v| a.name = v)
                .one_to_many("books", "authorId", |a| &a.books, |a| &mut a.books)
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
                .many_to_one("author", "authorId", |b| &b.author, |b| &mut b.author)
                .many_to_many("tags", TAGGING, |b| &b.tags, |b| &mut b.tags)
                .build()
        })
    }
}

impl Entity for Tag {
    fn descriptor() -> &'static EntityDescriptor {
        static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::builder::<Tag>("tag")
                .primary_key("label", |t| t.label.clone(), |t, v| t.label = v)
                .many_to_many("books", TAGGING, |t| &t.books, |t| &mut t.books)
                .build()
        })
    }
}

impl Entity for User {
    fn descriptor() -> &'static EntityDescriptor {
        static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::builder::<User>("user_account")
                .primary_key("name", |u| u.name.clone(), |u, v| u.name = v)
                .one_to_one("profile", "userName", false, |u| &u.profile, |u| &mut u.profile)
                .build()
        })
    }
}

impl Entity for Profile {
    fn descriptor() -> &'static EntityDescriptor {
        static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::builder::<Profile>("profile")
                .primary_key("id", |p| p.id, |p, v| p.id = v)
                .auto_increment()
                .nullable("bio", |p| p.bio.clone(), |p, v| p.bio = v)
                .one_to_one("user", "userName", true, |p| &p.user, |p| &mut p.user)
                .build()
        })
    }
}

#[derive(Debug, Default)]
struct Script {
    open: bool,
    statements: Vec<String>,
    results: VecDeque<ResultSet>,
    next_id: i64,
    refuse_commit: bool,
}

/// In-memory driver that records every statement. Writes affect one row,
/// inserts hand out increasing ids, and queries return queued result sets
/// (empty once the queue runs out).
#[derive(Debug, Clone, Default)]
pub struct ScriptedDriver {
    script: Rc<RefCell<Script>>,
}

impl ScriptedDriver {
    pub fn statements(&self) -> Vec<String> {
        self.script.borrow().statements.clone()
    }

    pub fn push_result(&self, result: ResultSet) {
        self.script.borrow_mut().results.push_back(result);
    }

    /// Make the next `COMMIT` fail as a locked database would.
    pub fn refuse_next_commit(&self) {
        self.script.borrow_mut().refuse_commit = true;
    }

    fn record(&self, sql: &str) {
        self.script.borrow_mut().statements.push(sql.to_string());
    }
}

impl StoreDriver for ScriptedDriver {
    fn open(&mut self) -> Result<()> {
        self.script.borrow_mut().open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.script.borrow_mut().open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.script.borrow().open
    }

    fn execute(&mut self, sql: &str) -> Result<u64> {
        self.record(sql);
        if sql.starts_with("INSERT") {
            self.script.borrow_mut().next_id += 1;
        }
        Ok(1)
    }

    fn query(&mut self, sql: &str) -> Result<ResultSet> {
        self.record(sql);
        Ok(self
            .script
            .borrow_mut()
            .results
            .pop_front()
            .unwrap_or_else(|| ResultSet::new(Vec::new())))
    }

    fn last_insert_id(&mut self) -> Result<Option<i64>> {
        Ok(Some(self.script.borrow().next_id))
    }

    fn begin_transaction(&mut self) -> Result<()> {
        self.record("BEGIN");
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if std::mem::take(&mut self.script.borrow_mut().refuse_commit) {
            return Err(Error::Query(QueryError {
                kind: QueryErrorKind::Busy,
                sql: Some("COMMIT".to_string()),
                message: "database is locked".to_string(),
                source: None,
            }));
        }
        self.record("COMMIT");
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.record("ROLLBACK");
        Ok(())
    }
}
