use axum::{
    Json, debug_handler,
    extract::{Path, State},
    http::StatusCode,
};
use diesel::{dsl, prelude::*};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

use crate::{
    App,
    error::AppError,
    identity::AuthUser,
    schema::{comment_votes, comments},
};

use super::{
    models::NewCommentVote,
    tally::{VoteDirection, VoteState, VoteWrite},
};

type OwnVote = dsl::Filter<
    dsl::Filter<comment_votes::table, dsl::Eq<comment_votes::comment_id, i32>>,
    dsl::Eq<comment_votes::identity_id, i32>,
>;

/// The single vote row `identity_id` may hold on a comment.
fn own_vote(comment_id: i32, identity_id: i32) -> OwnVote {
    comment_votes::table
        .filter(comment_votes::comment_id.eq(comment_id))
        .filter(comment_votes::identity_id.eq(identity_id))
}

/// Applies one toggle step to the voter's own row.
async fn write_vote(
    conn: &mut AsyncPgConnection,
    comment_id: i32,
    identity_id: i32,
    write: VoteWrite,
) -> QueryResult<usize> {
    // No lock is taken: a racing request on the same row loses on the
    // (comment_id, identity_id) unique constraint and gets a conflict
    match write {
        VoteWrite::Insert(value) => {
            diesel::insert_into(comment_votes::table)
                .values(&NewCommentVote {
                    comment_id,
                    identity_id,
                    value,
                })
                .execute(conn)
                .await
        }
        VoteWrite::Update(value) => {
            diesel::update(own_vote(comment_id, identity_id))
                .set(comment_votes::value.eq(value))
                .execute(conn)
                .await
        }
        VoteWrite::Delete => diesel::delete(own_vote(comment_id, identity_id)).execute(conn).await,
    }
}

#[derive(Deserialize)]
pub struct VoteSubmission {
    direction: VoteDirection,
}

#[derive(Serialize)]
pub struct VoteResponse {
    comment_id: i32,
    vote: VoteState,
}

/// Toggles the viewer's vote. The response only carries the new state,
/// clients refetch the thread for updated counts.
#[debug_handler]
pub async fn vote_comment(
    State(ctx): State<App>,
    Path(id): Path<i32>,
    AuthUser(auth_user): AuthUser,
    crate::json::Json(submission): crate::json::Json<VoteSubmission>,
) -> Result<Json<VoteResponse>, AppError> {
    ctx.limiter.check(auth_user.id)?;

    let mut conn = ctx.diesel.get().await?;

    let exists = diesel::select(diesel::dsl::exists(comments::table.find(id)))
        .get_result::<bool>(&mut conn)
        .await?;

    if !exists {
        return Err(("Comment not found", StatusCode::NOT_FOUND))?;
    }

    let current = own_vote(id, auth_user.id)
        .select(comment_votes::value)
        .first::<i32>(&mut conn)
        .await
        .optional()?;

    let (next, write) = VoteState::from_value(current).toggle(submission.direction);

    write_vote(&mut conn, id, auth_user.id, write).await?;

    tracing::debug!(comment_id = id, identity_id = auth_user.id, ?next, "Vote toggled");

    Ok(Json(VoteResponse {
        comment_id: id,
        vote: next,
    }))
}

#[cfg(test)]
mod test {
    use super::*;
    use diesel::{debug_query, pg::Pg};

    #[test]
    fn test_update_targets_only_the_voters_row() {
        let sql = debug_query::<Pg, _>(
            &diesel::update(own_vote(10, 3)).set(comment_votes::value.eq(-1)),
        )
        .to_string();

        assert!(sql.starts_with(r#"UPDATE "comment_votes" SET "value" = $1"#), "{sql}");
        assert!(sql.contains(r#""comment_votes"."comment_id" = $2"#), "{sql}");
        assert!(sql.contains(r#""comment_votes"."identity_id" = $3"#), "{sql}");
        assert!(sql.contains("binds: [-1, 10, 3]"), "{sql}");
    }

    #[test]
    fn test_delete_targets_only_the_voters_row() {
        let sql = debug_query::<Pg, _>(&diesel::delete(own_vote(10, 3))).to_string();

        assert!(sql.starts_with(r#"DELETE FROM "comment_votes""#), "{sql}");
        assert!(sql.contains(r#""comment_votes"."comment_id" = $1"#), "{sql}");
        assert!(sql.contains(r#""comment_votes"."identity_id" = $2"#), "{sql}");
        assert!(sql.contains("binds: [10, 3]"), "{sql}");
    }

    #[test]
    fn test_submission_directions() {
        let up: VoteSubmission = serde_json::from_str(r#"{"direction": "up"}"#).unwrap();
        assert_eq!(up.direction, VoteDirection::Up);

        let down: VoteSubmission = serde_json::from_str(r#"{"direction": "down"}"#).unwrap();
        assert_eq!(VoteState::Down.toggle(down.direction).1, VoteWrite::Delete);

        assert!(serde_json::from_str::<VoteSubmission>(r#"{"direction": "sideways"}"#).is_err());
    }
}
