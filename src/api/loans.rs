//! Loan management endpoints

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::loan::{CreateLoan, Loan, UpdateLoan},
};

use super::{AppPath, AuthenticatedUser, CreatedResponse, MessageResponse, ValidatedJson};

/// List loans with borrower and books
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "List of loans", body = Vec<Loan>),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Loan>>> {
    let loans = state.services.loans.list().await?;
    Ok(Json(loans))
}

/// Get loan by ID
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan details", body = Loan),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    AppPath(id): AppPath<i32>,
) -> AppResult<Json<Loan>> {
    let loan = state.services.loans.get(id).await?;
    Ok(Json(loan))
}

/// Create a new loan (borrow books)
#[utoipa::path(
    post,
    path = "/loans/new",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = CreateLoan,
    responses(
        (status = 201, description = "Loan created", body = CreatedResponse),
        (status = 400, description = "Invalid request or book not available", body = crate::error::ErrorResponse),
        (status = 404, description = "User or book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    ValidatedJson(loan): ValidatedJson<CreateLoan>,
) -> AppResult<(StatusCode, Json<CreatedResponse>)> {
    let id = state.services.loans.create(loan).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            message: "Loan created successfully".to_string(),
            id,
        }),
    ))
}

/// Update a loan (also served at `/loans/{id}/edit`)
#[utoipa::path(
    put,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    request_body = UpdateLoan,
    responses(
        (status = 200, description = "Loan updated", body = CreatedResponse),
        (status = 400, description = "Invalid request or book not available", body = crate::error::ErrorResponse),
        (status = 404, description = "Loan, user or book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    AppPath(id): AppPath<i32>,
    ValidatedJson(loan): ValidatedJson<UpdateLoan>,
) -> AppResult<Json<CreatedResponse>> {
    state.services.loans.update(id, loan).await?;

    Ok(Json(CreatedResponse {
        message: "Loan updated successfully".to_string(),
        id,
    }))
}

/// Return all books of a loan
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan returned", body = Loan),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Already returned", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    AppPath(id): AppPath<i32>,
) -> AppResult<Json<Loan>> {
    let loan = state.services.loans.return_loan(id).await?;
    Ok(Json(loan))
}

/// Delete a loan
#[utoipa::path(
    delete,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan deleted", body = MessageResponse),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    AppPath(id): AppPath<i32>,
) -> AppResult<Json<MessageResponse>> {
    state.services.loans.delete(id).await?;
    Ok(Json(MessageResponse::new("Loan deleted successfully")))
}
