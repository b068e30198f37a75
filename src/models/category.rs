//! Category model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::book::Book;

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub description: String,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub books: Option<Vec<Book>>,
}

/// Category referenced by name; created on the fly when unknown
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CategoryByName {
    #[validate(length(min = 1, max = 255, message = "Category name is required"))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCategory {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    pub description: String,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateCategory {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub description: Option<String>,
}

/// `{ "books": [...] }` wrapper for the books-of-category endpoint
#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryBooks {
    pub books: Vec<Book>,
}
