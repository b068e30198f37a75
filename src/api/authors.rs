//! Author endpoints

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::author::{Author, AuthorQuery, CreateAuthor, UpdateAuthor},
};

use super::{AppPath, AppQuery, AuthenticatedUser, CreatedResponse, MessageResponse, ValidatedJson};

#[derive(Serialize, ToSchema)]
pub struct AuthorUpdatedResponse {
    pub message: String,
    pub author: Author,
}

/// List authors with their books
#[utoipa::path(
    get,
    path = "/authors",
    tag = "authors",
    responses(
        (status = 200, description = "List of authors", body = Vec<Author>)
    )
)]
pub async fn list_authors(State(state): State<crate::AppState>) -> AppResult<Json<Vec<Author>>> {
    let authors = state.services.catalog.list_authors().await?;
    Ok(Json(authors))
}

/// Get author by ID
#[utoipa::path(
    get,
    path = "/authors/{id}",
    tag = "authors",
    params(
        ("id" = i32, Path, description = "Author ID")
    ),
    responses(
        (status = 200, description = "Author details", body = Author),
        (status = 404, description = "Author not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_author(
    State(state): State<crate::AppState>,
    AppPath(id): AppPath<i32>,
) -> AppResult<Json<Author>> {
    let author = state.services.catalog.get_author(id).await?;
    Ok(Json(author))
}

/// Search authors by first and/or last name
#[utoipa::path(
    get,
    path = "/authors/search",
    tag = "authors",
    params(AuthorQuery),
    responses(
        (status = 200, description = "Matching authors", body = Vec<Author>)
    )
)]
pub async fn search_authors(
    State(state): State<crate::AppState>,
    AppQuery(query): AppQuery<AuthorQuery>,
) -> AppResult<Json<Vec<Author>>> {
    let authors = state.services.catalog.search_authors(&query).await?;
    Ok(Json(authors))
}

/// Create an author with their books
#[utoipa::path(
    post,
    path = "/authors/new",
    tag = "authors",
    security(("bearer_auth" = [])),
    request_body = CreateAuthor,
    responses(
        (status = 201, description = "Author created", body = CreatedResponse),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 403, description = "Administrator privileges required", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_author(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ValidatedJson(author): ValidatedJson<CreateAuthor>,
) -> AppResult<(StatusCode, Json<CreatedResponse>)> {
    claims.require_admin()?;

    let id = state.services.catalog.create_author(author).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            message: "Author created successfully".to_string(),
            id,
        }),
    ))
}

/// Update an author
#[utoipa::path(
    put,
    path = "/authors/{id}",
    tag = "authors",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Author ID")
    ),
    request_body = UpdateAuthor,
    responses(
        (status = 200, description = "Author updated", body = AuthorUpdatedResponse),
        (status = 404, description = "Author not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_author(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppPath(id): AppPath<i32>,
    ValidatedJson(author): ValidatedJson<UpdateAuthor>,
) -> AppResult<Json<AuthorUpdatedResponse>> {
    claims.require_admin()?;

    let author = state.services.catalog.update_author(id, author).await?;

    Ok(Json(AuthorUpdatedResponse {
        message: "Author updated successfully".to_string(),
        author,
    }))
}

/// Delete an author
#[utoipa::path(
    delete,
    path = "/authors/{id}",
    tag = "authors",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Author ID")
    ),
    responses(
        (status = 200, description = "Author deleted", body = MessageResponse),
        (status = 404, description = "Author not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_author(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppPath(id): AppPath<i32>,
) -> AppResult<Json<MessageResponse>> {
    claims.require_admin()?;

    state.services.catalog.delete_author(id).await?;
    Ok(Json(MessageResponse::new("Author deleted successfully")))
}
