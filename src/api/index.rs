//! API index

use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct IndexResponse {
    pub application: String,
    pub version: String,
    /// Main entry points, relative to the server root
    pub endpoints: Vec<String>,
}

const ENDPOINTS: &[&str] = &[
    "/api/authors",
    "/api/books",
    "/api/books/search",
    "/api/books/recent",
    "/api/categories",
    "/api/users",
    "/api/loans",
    "/api/book/loan",
    "/api/register",
    "/api/login_check",
    "/api/logout",
    "/api/me",
    "/api/health",
    "/api/ready",
    "/swagger-ui",
];

/// Describe the API
#[utoipa::path(
    get,
    path = "/",
    tag = "health",
    responses(
        (status = 200, description = "API description", body = IndexResponse)
    )
)]
pub async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        application: "Timeless Library API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: ENDPOINTS.iter().map(|e| e.to_string()).collect(),
    })
}
