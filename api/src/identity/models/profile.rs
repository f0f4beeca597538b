use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

use crate::badge::{self, BadgeTier};

#[derive(Queryable, Selectable, Debug, Serialize, Clone)]
#[diesel(table_name = crate::schema::profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Profile {
    pub identity_id: i32,
    pub username: String,
    pub avatar_url: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Public author card shown next to comments. `read_count` is the size of
/// the author's reading history and only drives the badge.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct AuthorProfile {
    pub id: i32,
    pub username: String,
    pub avatar_url: Option<String>,
    pub read_count: i64,
    pub badge: &'static BadgeTier,
}

impl AuthorProfile {
    pub fn new(profile: Profile, read_count: i64) -> Self {
        AuthorProfile {
            id: profile.identity_id,
            username: profile.username,
            avatar_url: profile.avatar_url,
            read_count,
            badge: badge::tier_for(read_count.max(0) as u64),
        }
    }
}
