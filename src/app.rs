use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    Router,
};
use sqlx::PgPool;
use tower_http::{cors::CorsLayer, services::ServeDir};

use crate::{
    config::AppConfig,
    database,
    error::Result,
    routes,
    services::{UploadStore, PUBLIC_PREFIX},
};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub uploads: UploadStore,
}

pub async fn build(config: &AppConfig) -> Result<Router> {
    let pool = database::create_pool(&config.database).await?;
    let uploads = UploadStore::open(&config.upload).await?;

    let state = AppState { db: pool, uploads };

    router(state, config)
}

pub fn router(state: AppState, config: &AppConfig) -> Result<Router> {
    let cors = if config.cors.allowed_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let allowed_origins: Vec<HeaderValue> = config
            .cors
            .allowed_origins
            .iter()
            .map(|origin| {
                origin.parse::<HeaderValue>().map_err(|_| {
                    crate::error::AppError::ConfigError(format!("Invalid CORS origin: {}", origin))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        CorsLayer::new()
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([http::header::CONTENT_TYPE])
            .allow_origin(allowed_origins)
    };

    let app = routes::create_router()
        .nest_service(PUBLIC_PREFIX, ServeDir::new(state.uploads.root()))
        .fallback_service(ServeDir::new(&config.server.static_dir))
        .layer(DefaultBodyLimit::max(config.server.max_body_size))
        .layer(cors)
        .with_state(state);

    Ok(app)
}
