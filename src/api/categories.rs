//! Category endpoints

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::category::{Category, CategoryBooks, CreateCategory, UpdateCategory},
};

use super::{AppPath, AuthenticatedUser, CreatedResponse, MessageResponse, ValidatedJson};

#[derive(Serialize, ToSchema)]
pub struct CategoryUpdatedResponse {
    pub category: Category,
    pub message: String,
}

/// List categories with their books
#[utoipa::path(
    get,
    path = "/categories",
    tag = "categories",
    responses(
        (status = 200, description = "List of categories", body = Vec<Category>)
    )
)]
pub async fn list_categories(
    State(state): State<crate::AppState>,
) -> AppResult<Json<Vec<Category>>> {
    let categories = state.services.catalog.list_categories().await?;
    Ok(Json(categories))
}

/// Get category by ID
#[utoipa::path(
    get,
    path = "/categories/{id}",
    tag = "categories",
    params(
        ("id" = i32, Path, description = "Category ID")
    ),
    responses(
        (status = 200, description = "Category details", body = Category),
        (status = 404, description = "Category not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_category(
    State(state): State<crate::AppState>,
    AppPath(id): AppPath<i32>,
) -> AppResult<Json<Category>> {
    let category = state.services.catalog.get_category(id).await?;
    Ok(Json(category))
}

/// Books of a category
#[utoipa::path(
    get,
    path = "/categories/{id}/books",
    tag = "categories",
    params(
        ("id" = i32, Path, description = "Category ID")
    ),
    responses(
        (status = 200, description = "Books of the category", body = CategoryBooks),
        (status = 404, description = "Category not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn category_books(
    State(state): State<crate::AppState>,
    AppPath(id): AppPath<i32>,
) -> AppResult<Json<CategoryBooks>> {
    let books = state.services.catalog.category_books(id).await?;
    Ok(Json(CategoryBooks { books }))
}

/// Create a category
#[utoipa::path(
    post,
    path = "/categories/new",
    tag = "categories",
    security(("bearer_auth" = [])),
    request_body = CreateCategory,
    responses(
        (status = 201, description = "Category created", body = CreatedResponse),
        (status = 409, description = "Name already used", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_category(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ValidatedJson(category): ValidatedJson<CreateCategory>,
) -> AppResult<(StatusCode, Json<CreatedResponse>)> {
    claims.require_admin()?;

    let id = state.services.catalog.create_category(category).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            message: "Category created successfully".to_string(),
            id,
        }),
    ))
}

/// Update a category (also served at `/categories/{id}/edit`)
#[utoipa::path(
    put,
    path = "/categories/{id}",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Category ID")
    ),
    request_body = UpdateCategory,
    responses(
        (status = 200, description = "Category updated", body = CategoryUpdatedResponse),
        (status = 404, description = "Category not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_category(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppPath(id): AppPath<i32>,
    ValidatedJson(category): ValidatedJson<UpdateCategory>,
) -> AppResult<Json<CategoryUpdatedResponse>> {
    claims.require_admin()?;

    let category = state.services.catalog.update_category(id, category).await?;

    Ok(Json(CategoryUpdatedResponse {
        category,
        message: "Category updated successfully".to_string(),
    }))
}

/// Delete a category without books
#[utoipa::path(
    delete,
    path = "/categories/{id}",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Category ID")
    ),
    responses(
        (status = 200, description = "Category deleted", body = MessageResponse),
        (status = 404, description = "Category not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Books still use the category", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_category(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppPath(id): AppPath<i32>,
) -> AppResult<Json<MessageResponse>> {
    claims.require_admin()?;

    state.services.catalog.delete_category(id).await?;
    Ok(Json(MessageResponse::new("Category deleted successfully")))
}
