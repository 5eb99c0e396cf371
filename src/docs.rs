use std::sync::Arc;

use aide::{
    axum::{
        routing::{get, get_with},
        ApiRouter, IntoApiResponse,
    },
    openapi::{OpenApi, Tag},
    redoc::Redoc,
    transform::TransformOpenApi,
};
use axum::{response::IntoResponse, Extension, Json};

pub fn api_docs(api: TransformOpenApi) -> TransformOpenApi {
    api.title("PickPack admin API")
        .summary("Admin backend for the PickPack locker rental")
        .description(include_str!("../README.md"))
        .tag(Tag {
            name: "auth".into(),
            description: Some("Session management".into()),
            ..Default::default()
        })
        .tag(Tag {
            name: "cities".into(),
            description: Some("City management".into()),
            ..Default::default()
        })
        .tag(Tag {
            name: "coins".into(),
            description: Some("Pricing tier management".into()),
            ..Default::default()
        })
        .tag(Tag {
            name: "sizes".into(),
            description: Some("Locker size management".into()),
            ..Default::default()
        })
        .tag(Tag {
            name: "coupons".into(),
            description: Some("Coupon management".into()),
            ..Default::default()
        })
        .tag(Tag {
            name: "companies".into(),
            description: Some("Company management".into()),
            ..Default::default()
        })
        .tag(Tag {
            name: "roles".into(),
            description: Some("Role management".into()),
            ..Default::default()
        })
        .tag(Tag {
            name: "accounts".into(),
            description: Some("Admin account management".into()),
            ..Default::default()
        })
        .tag(Tag {
            name: "error-logs".into(),
            description: Some("Error log inspection".into()),
            ..Default::default()
        })
        .tag(Tag {
            name: "lockers".into(),
            description: Some("Live locker token management".into()),
            ..Default::default()
        })
        .security_scheme(
            "SessionToken",
            aide::openapi::SecurityScheme::Http {
                scheme: "bearer".into(),
                bearer_format: None,
                description: Some("Session token from /auth/password.".into()),
                extensions: Default::default(),
            },
        )
}

pub fn docs_routes() -> ApiRouter {
    // Response inference is only correct for these two routes,
    // it would pick wrong content types elsewhere.
    aide::gen::infer_responses(true);

    let router = ApiRouter::new()
        .api_route_with(
            "/",
            get_with(
                Redoc::new("/docs/api.json")
                    .with_title("pickpack")
                    .axum_handler(),
                |op| op.description("This documentation page."),
            ),
            |p| p.security_requirement("SessionToken"),
        )
        .route("/api.json", get(serve_docs));

    aide::gen::infer_responses(false);

    router
}

async fn serve_docs(Extension(api): Extension<Arc<OpenApi>>) -> impl IntoApiResponse {
    Json(api).into_response()
}
