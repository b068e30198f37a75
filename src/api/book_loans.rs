//! Book-loan record endpoints

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::book_loan::{BookLoan, CreateBookLoans, UpdateBookLoan},
};

use super::{AppPath, AuthenticatedUser, MessageResponse, ValidatedJson};

#[utoipa::path(
    get,
    path = "/book/loan",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All book-loan records", body = Vec<BookLoan>)
    )
)]
pub async fn list_book_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<BookLoan>>> {
    let records = state.services.loans.list_book_loans().await?;
    Ok(Json(records))
}

#[utoipa::path(
    get,
    path = "/book/loan/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book-loan ID")
    ),
    responses(
        (status = 200, description = "Book-loan record", body = BookLoan),
        (status = 404, description = "Record not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    AppPath(id): AppPath<i32>,
) -> AppResult<Json<BookLoan>> {
    let record = state.services.loans.get_book_loan(id).await?;
    Ok(Json(record))
}

/// Add books to an existing loan
#[utoipa::path(
    post,
    path = "/book/loan/create",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = CreateBookLoans,
    responses(
        (status = 201, description = "Books borrowed", body = MessageResponse),
        (status = 400, description = "Book not available", body = crate::error::ErrorResponse),
        (status = 404, description = "Loan or book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    ValidatedJson(request): ValidatedJson<CreateBookLoans>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    state.services.loans.create_book_loans(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Books successfully borrowed")),
    ))
}

#[utoipa::path(
    put,
    path = "/book/loan/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book-loan ID")
    ),
    request_body = UpdateBookLoan,
    responses(
        (status = 200, description = "Record updated", body = BookLoan),
        (status = 400, description = "Book not available", body = crate::error::ErrorResponse),
        (status = 404, description = "Record, loan or book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    AppPath(id): AppPath<i32>,
    ValidatedJson(changes): ValidatedJson<UpdateBookLoan>,
) -> AppResult<Json<BookLoan>> {
    let record = state.services.loans.update_book_loan(id, changes).await?;
    Ok(Json(record))
}

#[utoipa::path(
    delete,
    path = "/book/loan/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book-loan ID")
    ),
    responses(
        (status = 200, description = "Record deleted", body = MessageResponse),
        (status = 404, description = "Record not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    AppPath(id): AppPath<i32>,
) -> AppResult<Json<MessageResponse>> {
    state.services.loans.delete_book_loan(id).await?;
    Ok(Json(MessageResponse::new("Book loan deleted successfully")))
}
