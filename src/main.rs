use std::sync::Arc;

use aide::axum::ApiRouter;
use aide::openapi::OpenApi;
use axum::Extension;
use tower_http::cors::CorsLayer;

mod api;
mod barcode;
mod database;
mod demo_data;
mod docs;
mod env;
mod error;
mod loyalty;
mod models;
mod request_state;
mod telegram;

use crate::database::AppState;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let app_state = AppState::connect(env::DATABASE_URL.as_str()).await;

    if *env::DEMO_DATA {
        if let Err(error) = demo_data::seed(&app_state).await {
            log::warn!("Could not seed demo data: {error}");
        }
    }

    if !telegram::is_enabled() {
        log::info!("TELEGRAM_BOT_TOKEN is not set, Telegram delivery is disabled");
    }

    let mut openapi = OpenApi::default();
    let router = ApiRouter::new()
        .nest_api_service("/api/v1", api::router(app_state.clone()))
        .nest_api_service("/docs", docs::docs_routes())
        .finish_api_with(&mut openapi, docs::api_docs)
        .layer(Extension(Arc::new(openapi)))
        .layer(CorsLayer::permissive());

    let address = format!("{}:{}", env::API_HOST.as_str(), env::API_PORT.as_str());
    log::info!("Start http server at {address}");

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .expect("bind http address");
    axum::serve(listener, router.into_make_service())
        .await
        .expect("run http server");
}
