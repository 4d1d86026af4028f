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
    api.title("cafe-office-server")
        .summary("Back office api for a small cafe")
        .description(include_str!("../README.md"))
        .tag(Tag {
            name: "menu".into(),
            description: Some("Ingredients, dishes and recipes".into()),
            ..Default::default()
        })
        .tag(Tag {
            name: "finance".into(),
            description: Some("Expenses and sales".into()),
            ..Default::default()
        })
        .tag(Tag {
            name: "reports".into(),
            description: Some("Profit reporting".into()),
            ..Default::default()
        })
        .tag(Tag {
            name: "clients".into(),
            description: Some("Clients, card codes and the public portal".into()),
            ..Default::default()
        })
        .tag(Tag {
            name: "loyalty".into(),
            description: Some("Breakfast and coffee visit tracking".into()),
            ..Default::default()
        })
}

pub fn docs_routes() -> ApiRouter {
    // Inference gives the redoc route its text/html content type; it is
    // switched off again because it would be wrong for the api routes.
    aide::gen::infer_responses(true);

    let router = ApiRouter::new()
        .api_route_with(
            "/",
            get_with(
                Redoc::new("/docs/api.json")
                    .with_title("cafe-office-server")
                    .axum_handler(),
                |op| op.description("This documentation page."),
            ),
            |p| p,
        )
        .route("/api.json", get(serve_docs));

    aide::gen::infer_responses(false);

    router
}

async fn serve_docs(Extension(api): Extension<Arc<OpenApi>>) -> impl IntoApiResponse {
    Json(api).into_response()
}
