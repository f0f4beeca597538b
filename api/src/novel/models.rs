use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

#[derive(Queryable, Selectable, Debug, Serialize, Clone)]
#[diesel(table_name = crate::schema::novels)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Novel {
    pub id: i32,
    pub slug: String,
    pub title: String,
    pub author_name: Option<String>,
    pub synopsis: Option<String>,
    pub cover_url: Option<String>,
    pub published: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::novels)]
pub struct NewNovel {
    pub slug: String,
    pub title: String,
    pub author_name: Option<String>,
    pub synopsis: Option<String>,
    pub cover_url: Option<String>,
    pub published: bool,
}

#[derive(AsChangeset, Debug, Default)]
#[diesel(table_name = crate::schema::novels)]
pub struct UpdateNovel {
    pub title: Option<String>,
    pub author_name: Option<Option<String>>,
    pub synopsis: Option<Option<String>>,
    pub cover_url: Option<Option<String>>,
    pub published: Option<bool>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Queryable, Selectable, Debug, Serialize, Clone)]
#[diesel(table_name = crate::schema::chapters)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Chapter {
    pub id: i32,
    pub novel_id: i32,
    pub number: i32,
    pub title: String,
    pub content: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// A chapter without its text, for indexes
#[derive(Queryable, Selectable, Debug, Serialize, Clone)]
#[diesel(table_name = crate::schema::chapters)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ChapterEntry {
    pub id: i32,
    pub number: i32,
    pub title: String,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::chapters)]
pub struct NewChapter {
    pub novel_id: i32,
    pub number: i32,
    pub title: String,
    pub content: String,
}

#[derive(AsChangeset, Debug, Default)]
#[diesel(table_name = crate::schema::chapters)]
pub struct UpdateChapter {
    pub number: Option<i32>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub updated_at: Option<NaiveDateTime>,
}
