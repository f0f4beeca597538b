pub mod routes;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Serialize;

use crate::schema::notifications;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// Someone replied to one of the recipient's comments
    Reply,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Reply => "reply",
        }
    }
}

#[derive(Queryable, Selectable, Debug, Serialize, Clone)]
#[diesel(table_name = notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Notification {
    pub id: i32,
    pub identity_id: i32,
    pub kind: String,
    pub message: String,
    pub link: Option<String>,
    pub read: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = notifications)]
pub struct NewNotification<'a> {
    pub identity_id: i32,
    pub kind: &'a str,
    pub message: String,
    pub link: Option<String>,
}

pub async fn notify(
    conn: &mut AsyncPgConnection,
    identity_id: i32,
    kind: NotificationKind,
    message: String,
    link: Option<String>,
) -> Result<Notification, diesel::result::Error> {
    let notification = diesel::insert_into(notifications::table)
        .values(&NewNotification {
            identity_id,
            kind: kind.as_str(),
            message,
            link,
        })
        .returning(Notification::as_returning())
        .get_result(conn)
        .await?;

    tracing::debug!(
        notification_id = notification.id,
        identity_id,
        kind = kind.as_str(),
        "Notification created"
    );

    Ok(notification)
}
