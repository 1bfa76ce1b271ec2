//! Entities shared by this crate's unit tests.

use std::sync::OnceLock;

use relorm_core::{Entity, EntityDescriptor, ManyToMany, Related, RelatedMany};

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
