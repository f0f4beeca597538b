use axum::{
    Router,
    routing::{get, patch, post, put},
};

use crate::App;

use super::{
    create::create_comment, delete::delete_comment, get::get_comments, patch::patch_comment,
    report::report_comment, vote::vote_comment,
};

pub fn route() -> Router<App> {
    Router::<App>::new()
        .route(
            "/novels/{slug}/comments",
            get(get_comments).post(create_comment),
        )
        .route(
            "/comments/{id}",
            patch(patch_comment).delete(delete_comment),
        )
        .route("/comments/{id}/vote", put(vote_comment))
        .route("/comments/{id}/report", post(report_comment))
}
