use std::collections::HashMap;

use chrono::NaiveDateTime;
use diesel::{
    dsl::{count_star, now},
    prelude::*,
};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Serialize;

use crate::{
    badge::{self, BadgeTier},
    schema::{chapters, novels, reading_history},
};

#[derive(Insertable)]
#[diesel(table_name = reading_history)]
struct NewReadingHistory {
    identity_id: i32,
    novel_id: i32,
    chapter_id: i32,
}

/// Marks a chapter as read, refreshing `read_at` when it was read before.
pub async fn record_read(
    conn: &mut AsyncPgConnection,
    identity_id: i32,
    novel_id: i32,
    chapter_id: i32,
) -> Result<(), diesel::result::Error> {
    diesel::insert_into(reading_history::table)
        .values(&NewReadingHistory {
            identity_id,
            novel_id,
            chapter_id,
        })
        .on_conflict((reading_history::identity_id, reading_history::chapter_id))
        .do_update()
        .set(reading_history::read_at.eq(now))
        .execute(conn)
        .await?;

    Ok(())
}

/// Number of distinct chapters each identity has read. Identities that never
/// read anything are absent from the map.
pub async fn read_counts(
    conn: &mut AsyncPgConnection,
    identity_ids: Vec<i32>,
) -> Result<HashMap<i32, i64>, diesel::result::Error> {
    if identity_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(i32, i64)> = reading_history::table
        .filter(reading_history::identity_id.eq_any(identity_ids))
        .group_by(reading_history::identity_id)
        .select((reading_history::identity_id, count_star()))
        .load(conn)
        .await?;

    Ok(rows.into_iter().collect())
}

#[derive(Serialize, Debug, PartialEq)]
pub struct ReadingProgress {
    pub read_count: i64,
    pub tier: &'static BadgeTier,
    pub next_tier: Option<&'static BadgeTier>,
    /// Chapters left until `next_tier`
    pub remaining: Option<i64>,
}

impl ReadingProgress {
    pub fn new(read_count: i64) -> Self {
        let count = read_count.max(0) as u64;
        let next_tier = badge::next_tier(count);

        ReadingProgress {
            read_count,
            tier: badge::tier_for(count),
            next_tier,
            remaining: next_tier.map(|t| i64::from(t.threshold) - read_count.max(0)),
        }
    }
}

#[derive(Queryable, Serialize, Debug)]
pub struct HistoryEntry {
    pub novel_slug: String,
    pub novel_title: String,
    pub chapter_number: i32,
    pub chapter_title: String,
    pub read_at: NaiveDateTime,
}

pub const HISTORY_LIMIT: i64 = 50;

pub async fn recent_history(
    conn: &mut AsyncPgConnection,
    identity_id: i32,
) -> Result<Vec<HistoryEntry>, diesel::result::Error> {
    reading_history::table
        .inner_join(chapters::table.inner_join(novels::table))
        .filter(reading_history::identity_id.eq(identity_id))
        .order((reading_history::read_at.desc(), reading_history::id.desc()))
        .limit(HISTORY_LIMIT)
        .select((
            novels::slug,
            novels::title,
            chapters::number,
            chapters::title,
            reading_history::read_at,
        ))
        .load(conn)
        .await
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_progress_below_first_unlock() {
        let progress = ReadingProgress::new(7);
        assert_eq!(progress.tier.key(), "0");
        assert_eq!(progress.next_tier.map(|t| t.key()), Some("10".into()));
        assert_eq!(progress.remaining, Some(3));
    }

    #[test]
    fn test_progress_on_threshold() {
        let progress = ReadingProgress::new(40);
        assert_eq!(progress.tier.key(), "40");
        assert_eq!(progress.remaining, Some(10));
    }

    #[test]
    fn test_progress_at_top_tier() {
        let progress = ReadingProgress::new(1000);
        assert_eq!(progress.tier.key(), "100");
        assert!(progress.next_tier.is_none());
        assert!(progress.remaining.is_none());
    }
}
