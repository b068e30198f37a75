//! Registration, login and logout endpoints

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::AppResult,
    models::user::{LoginRequest, LoginResponse, RegisterUser, User},
};

use super::{AppJson, AuthenticatedUser, MessageResponse, ValidatedJson};

/// Create an account; new accounts always get `ROLE_USER` only
#[utoipa::path(
    post,
    path = "/register",
    tag = "auth",
    request_body = RegisterUser,
    responses(
        (status = 201, description = "Account created", body = User),
        (status = 400, description = "Missing or invalid fields", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already in use", body = crate::error::ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<crate::AppState>,
    ValidatedJson(user): ValidatedJson<RegisterUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = state.services.users.register(user).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Exchange credentials for a bearer token
#[utoipa::path(
    post,
    path = "/login_check",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<crate::AppState>,
    AppJson(request): AppJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let (token, expires_in) = state.services.users.login(&request).await?;

    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in,
    }))
}

/// Revoke the presented token
#[utoipa::path(
    post,
    path = "/logout",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Logout successful", body = MessageResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn logout(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<MessageResponse>> {
    state.services.users.logout(&claims).await?;
    Ok(Json(MessageResponse::new("Logout successful")))
}
