//! Entities shared by this crate's unit tests.

use std::sync::OnceLock;

use chrono::NaiveDate;
use relorm_core::{Entity, EntityDescriptor, ManyToMany, Related, RelatedMany};

#[derive(Debug, Default)]
pub struct Author {
    pub id: Option<i64>,
    pub name: String,
    pub email: Option<String>,
    pub books: RelatedMany<Book>,
}

#[derive(Debug, Default)]
pub struct Book {
    pub id: Option<i64>,
    pub title: String,
    pub published: Option<NaiveDate>,
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
    pub active: bool,
    pub profile: Related<Profile>,
    pub notes: RelatedMany<Note>,
}

#[derive(Debug, Default)]
pub struct Profile {
    pub id: Option<i64>,
    pub bio: Option<String>,
    pub user: Related<User>,
}

#[derive(Debug, Default)]
pub struct Note {
    pub id: Option<i64>,
    pub body: String,
}

#[derive(Debug, Default)]
pub struct Empty {
    pub notes: RelatedMany<Note>,
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
                .unique()
                .nullable("email", |a| a.email.clone(), |a, v| a.email = v)
                .unique()
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
                .nullable("published", |b| b.published, |b, v| b.published = v)
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
                .column("active", |u| u.active, |u, v| u.active = v)
                .one_to_one("profile", "userName", false, |u| &u.profile, |u| &mut u.profile)
                .one_to_many("notes", "userName", |u| &u.notes, |u| &mut u.notes)
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

impl Entity for Note {
    fn descriptor() -> &'static EntityDescriptor {
        static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::builder::<Note>("note")
                .primary_key("id", |n| n.id, |n, v| n.id = v)
                .auto_increment()
                .column("body", |n| n.body.clone(), |n, v| n.body = v)
                .foreign_key::<User>("userName")
                .build()
        })
    }
}

impl Entity for Empty {
    fn descriptor() -> &'static EntityDescriptor {
        static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::builder::<Empty>("empty")
                .one_to_many("notes", "emptyId", |e| &e.notes, |e| &mut e.notes)
                .build()
        })
    }
}
