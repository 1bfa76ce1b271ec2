//! Entities shared by this crate's unit tests.

use std::sync::OnceLock;

use crate::descriptor::{CascadeMode, EntityDescriptor};
use crate::model::Entity;
use crate::relationship::{ManyToMany, Related, RelatedMany};

#[derive(Debug, Default)]
pub struct Person {
    pub id: Option<i64>,
    pub name: String,
    pub nickname: Option<String>,
    pub passport: Related<Passport>,
    pub clubs: RelatedMany<Club>,
}

#[derive(Debug, Default)]
pub struct Passport {
    pub number: Option<String>,
    pub holder: Related<Person>,
}

#[derive(Debug, Default)]
pub struct Club {
    pub id: Option<i64>,
    pub title: String,
    pub members: RelatedMany<Person>,
}

pub const MEMBERSHIP: ManyToMany =
    ManyToMany::new("membership", Person::descriptor, "id", Club::descriptor, "id");

impl Entity for Person {
    fn descriptor() -> &'static EntityDescriptor {
        static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::builder::<Person>("person")
                .primary_key("id", |p| p.id, |p, v| p.id = v)
                .auto_increment()
                .column("name", |p| p.name.clone(), |p, v| p.name = v)
                .unique()
                .nullable("nickname", |p| p.nickname.clone(), |p, v| p.nickname = v)
                .one_to_one(
                    "passport",
                    "passport_number",
                    true,
                    |p| &p.passport,
                    |p| &mut p.passport,
                )
                .many_to_many("clubs", MEMBERSHIP, |p| &p.clubs, |p| &mut p.clubs)
                .build()
        })
    }
}

impl Entity for Passport {
    fn descriptor() -> &'static EntityDescriptor {
        static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::builder::<Passport>("passport")
                .primary_key("number", |p| p.number.clone(), |p, v| p.number = v)
                .one_to_one(
                    "holder",
                    "passport_number",
                    false,
                    |p| &p.holder,
                    |p| &mut p.holder,
                )
                .cascade(CascadeMode::Keys)
                .build()
        })
    }
}

impl Entity for Club {
    fn descriptor() -> &'static EntityDescriptor {
        static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::builder::<Club>("club")
                .primary_key("id", |c| c.id, |c, v| c.id = v)
                .auto_increment()
                .column("title", |c| c.title.clone(), |c, v| c.title = v)
                .many_to_many("members", MEMBERSHIP, |c| &c.members, |c| &mut c.members)
                .lazy(true)
                .build()
        })
    }
}
