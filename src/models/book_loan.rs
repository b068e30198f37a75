//! Book-loan join records

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::book::Book;

/// Associates one book with one loan
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookLoan {
    pub id: i32,
    #[serde(skip_serializing)]
    pub book_id: i32,
    pub loan_id: i32,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book: Option<Book>,
}

/// Attach books to an existing loan
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookLoans {
    #[validate(length(min = 1, message = "At least one book id is required"))]
    pub book_ids: Vec<i32>,
    pub loan_id: i32,
}

/// Move a record to another book and/or loan
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookLoan {
    pub book_id: Option<i32>,
    pub loan_id: Option<i32>,
}
