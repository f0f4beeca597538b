use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
};
use diesel_async::{
    AsyncPgConnection,
    pooled_connection::{AsyncDieselConnectionManager, deadpool::Pool},
};
use dotenv::dotenv;
use eyre::WrapErr;
use mimalloc::MiMalloc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use shelf_api::{
    App, admin,
    comment::{self, limit::MutationLimiter},
    config::{Env, ServerConfig},
    identity, library, notification, novel, sitemap,
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const LIMITER_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

fn init_tracing(env: Env) -> eyre::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(concat!("info,", env!("CARGO_CRATE_NAME"), "=debug")))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    // machine readable logs outside of local development
    match env {
        Env::Dev => registry.with(tracing_subscriber::fmt::layer()).try_init()?,
        Env::Staging | Env::Production => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?,
    }

    Ok(())
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv().ok();

    let env = Env::from_env();

    init_tracing(env)?;

    let config = ServerConfig::new_from_env(env);

    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&config.database_url);
    let diesel = Pool::builder(manager)
        .max_size(10)
        .wait_timeout(Some(Duration::from_secs(10)))
        .create_timeout(Some(Duration::from_secs(10)))
        .recycle_timeout(Some(Duration::from_secs(10)))
        .runtime(deadpool_runtime::Runtime::Tokio1)
        .build()
        .wrap_err("couldn't build the database pool")?;

    let app = App {
        diesel,
        sitemap_cache: Arc::new(retainer::Cache::new()),
        limiter: Arc::new(MutationLimiter::per_minute(
            config.comment_rate_limit_per_minute,
        )),
        config: Arc::new(config),
    };

    let limiter = app.limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(LIMITER_PRUNE_INTERVAL);
        loop {
            interval.tick().await;
            limiter.prune();
        }
    });

    let sitemap_cache = app.sitemap_cache.clone();
    tokio::spawn(async move {
        sitemap_cache.monitor(4, 0.25, Duration::from_secs(60)).await;
    });

    let router = Router::new()
        .merge(novel::routes::route())
        .merge(comment::routes::route())
        .merge(library::routes::route())
        .merge(identity::routes::route())
        .nest("/me/notifications", notification::routes::route())
        .nest("/admin", admin::routes::route())
        .merge(sitemap::route())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&app.config))
        .with_state(app.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], app.config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("couldn't bind to {addr}"))?;

    tracing::info!(%addr, env = ?app.config.env, "Listening");

    axum::serve(listener, router).await?;

    Ok(())
}
