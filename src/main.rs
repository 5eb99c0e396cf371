use std::sync::Arc;

use aide::{axum::ApiRouter, openapi::OpenApi};
use axum::Extension;
use log::info;
use tower_http::cors::CorsLayer;

mod api;
mod database;
mod dcm;
mod docs;
mod env;
mod error;
mod models;
mod pagination;
mod permissions;
mod request_state;

use crate::database::AppState;

pub const SESSION_COOKIE_NAME: &str = "pickpack_session";

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let app_state = AppState::connect(env::DATABASE_URL.as_str()).await;

    aide::gen::extract_schemas(true);
    let mut open_api = OpenApi::default();

    let app = ApiRouter::new()
        .nest_api_service("/api/v1", api::router(app_state))
        .nest_api_service("/docs", docs::docs_routes())
        .finish_api_with(&mut open_api, docs::api_docs)
        .layer(Extension(Arc::new(open_api)))
        .layer(CorsLayer::permissive());

    let address = format!("{}:{}", env::API_HOST.as_str(), env::API_PORT.as_str());
    info!("Start http server at {}", address);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .expect("bind to address");
    axum::serve(listener, app).await.expect("start server");
}
