use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

#[derive(Queryable, Selectable, Debug, Serialize, Clone, PartialEq)]
#[diesel(table_name = crate::schema::comments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Comment {
    pub id: i32,
    pub novel_id: i32,
    pub chapter_id: Option<i32>,
    pub identity_id: i32,
    pub content: String,
    pub parent_id: Option<i32>,
    pub created_at: NaiveDateTime,
    pub edited_at: Option<NaiveDateTime>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::comments)]
pub struct NewComment {
    pub novel_id: i32,
    pub chapter_id: Option<i32>,
    pub identity_id: i32,
    pub content: String,
    pub parent_id: Option<i32>,
}

#[derive(Queryable, Selectable, Debug, Serialize, Clone)]
#[diesel(table_name = crate::schema::comment_votes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CommentVote {
    pub id: i32,
    pub comment_id: i32,
    pub identity_id: i32,
    pub value: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::comment_votes)]
pub struct NewCommentVote {
    pub comment_id: i32,
    pub identity_id: i32,
    pub value: i32,
}

#[derive(Queryable, Selectable, Debug, Serialize, Clone)]
#[diesel(table_name = crate::schema::comment_reports)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CommentReport {
    pub id: i32,
    pub comment_id: i32,
    pub identity_id: i32,
    pub reason: String,
    pub resolved: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::comment_reports)]
pub struct NewCommentReport {
    pub comment_id: i32,
    pub identity_id: i32,
    pub reason: String,
}
