use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Serialize;

use crate::{
    novel::models::Novel,
    schema::{bookmarks, novels},
};

#[derive(Insertable)]
#[diesel(table_name = bookmarks)]
pub struct NewBookmark {
    pub identity_id: i32,
    pub novel_id: i32,
}

#[derive(Serialize, Debug)]
pub struct BookmarkedNovel {
    #[serde(flatten)]
    pub novel: Novel,
    pub bookmarked_at: NaiveDateTime,
}

/// Bookmarks a novel. Returns whether a new bookmark was created, an
/// existing one is left untouched.
pub async fn add(
    conn: &mut AsyncPgConnection,
    identity_id: i32,
    novel_id: i32,
) -> Result<bool, diesel::result::Error> {
    let inserted = diesel::insert_into(bookmarks::table)
        .values(&NewBookmark {
            identity_id,
            novel_id,
        })
        .on_conflict((bookmarks::identity_id, bookmarks::novel_id))
        .do_nothing()
        .execute(conn)
        .await?;

    Ok(inserted > 0)
}

/// Returns whether there was a bookmark to remove.
pub async fn remove(
    conn: &mut AsyncPgConnection,
    identity_id: i32,
    novel_id: i32,
) -> Result<bool, diesel::result::Error> {
    let deleted = diesel::delete(
        bookmarks::table
            .filter(bookmarks::identity_id.eq(identity_id))
            .filter(bookmarks::novel_id.eq(novel_id)),
    )
    .execute(conn)
    .await?;

    Ok(deleted > 0)
}

/// Bookmarked novels that are still published, newest bookmark first.
pub async fn list(
    conn: &mut AsyncPgConnection,
    identity_id: i32,
) -> Result<Vec<BookmarkedNovel>, diesel::result::Error> {
    let rows: Vec<(Novel, NaiveDateTime)> = bookmarks::table
        .inner_join(novels::table)
        .filter(bookmarks::identity_id.eq(identity_id))
        .filter(novels::published.eq(true))
        .order((bookmarks::created_at.desc(), bookmarks::id.desc()))
        .select((Novel::as_select(), bookmarks::created_at))
        .load(conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(novel, bookmarked_at)| BookmarkedNovel {
            novel,
            bookmarked_at,
        })
        .collect())
}
