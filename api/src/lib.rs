use std::sync::Arc;

use diesel_async::{AsyncPgConnection, pooled_connection::deadpool::Pool};

use comment::limit::MutationLimiter;
use config::ServerConfig;

pub mod admin;
pub mod badge;
pub mod comment;
pub mod config;
pub mod error;
pub mod identity;
pub mod json;
pub mod library;
pub mod notification;
pub mod novel;
pub mod schema;
pub mod sitemap;

#[derive(Clone)]
pub struct App {
    pub diesel: Pool<AsyncPgConnection>,
    pub config: Arc<ServerConfig>,
    pub sitemap_cache: Arc<retainer::Cache<String, String>>,
    pub limiter: Arc<MutationLimiter>,
}
