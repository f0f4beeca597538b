use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
};

use crate::App;

use super::{chapters, import, novels, reports};

pub fn route() -> Router<App> {
    Router::<App>::new()
        .route("/novels", post(novels::create_novel))
        .route(
            "/novels/{slug}",
            patch(novels::patch_novel).delete(novels::delete_novel),
        )
        .route("/novels/{slug}/chapters", post(chapters::create_chapter))
        .route(
            "/novels/{slug}/import",
            post(import::import_epub).layer(DefaultBodyLimit::max(import::MAX_EPUB_BYTES)),
        )
        .route(
            "/novels/{slug}/chapters/{number}",
            patch(chapters::patch_chapter).delete(chapters::delete_chapter),
        )
        .route("/reports", get(reports::list_reports))
        .route("/reports/{id}/resolve", post(reports::resolve_report))
}
