//! API handlers for the library REST endpoints

pub mod authors;
pub mod book_loans;
pub mod books;
pub mod categories;
pub mod health;
pub mod index;
pub mod loans;
pub mod openapi;
pub mod security;
pub mod users;

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    routing::{get, post, put},
    Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::{de::DeserializeOwned, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::ToSchema;
use validator::Validate;

use crate::{error::AppError, models::book::Book, models::user::UserClaims, AppState};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    AppError::Authentication("Missing or invalid authorization header".to_string())
                })?;

        let claims = state.services.users.authenticate(bearer.token()).await?;
        Ok(AuthenticatedUser(claims))
    }
}

/// JSON body extractor reporting empty and malformed bodies as 400
pub struct AppJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(AppError::BadRequest("No data provided".to_string()));
        }

        serde_json::from_slice(&bytes)
            .map(AppJson)
            .map_err(|e| AppError::BadRequest(format!("Invalid JSON: {}", e)))
    }
}

/// `AppJson` followed by `validator` checks
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let AppJson(value) = AppJson::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// Path parameters; malformed values get the JSON error body
pub struct AppPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for AppPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        Ok(AppPath(value))
    }
}

/// Query string parameters; malformed values get the JSON error body
pub struct AppQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for AppQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        Ok(AppQuery(value))
    }
}

/// Paginated response wrapper
#[derive(Serialize, ToSchema)]
#[aliases(PaginatedBooks = PaginatedResponse<Book>)]
pub struct PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    /// Items of the current page
    pub items: Vec<T>,
    /// Total number of items
    pub total: i64,
    /// Current page number
    pub page: i64,
    /// Items per page
    pub per_page: i64,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Returned by creation endpoints
#[derive(Serialize, ToSchema)]
pub struct CreatedResponse {
    pub message: String,
    pub id: i32,
}

/// Build the application router with all routes
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/", get(index::index))
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Security
        .route("/register", post(security::register))
        .route("/login_check", post(security::login))
        .route("/logout", get(security::logout).post(security::logout))
        .route("/me", get(users::me))
        // Authors
        .route("/authors", get(authors::list_authors))
        .route("/authors/", get(authors::list_authors))
        .route("/authors/search", get(authors::search_authors))
        .route("/authors/new", post(authors::create_author))
        .route(
            "/authors/:id",
            get(authors::get_author)
                .put(authors::update_author)
                .delete(authors::delete_author),
        )
        // Books
        .route("/books", get(books::list_books))
        .route("/books/", get(books::list_books))
        .route("/books/search", get(books::search_books))
        .route("/books/recent", get(books::recent_books))
        .route("/books/new", post(books::create_book))
        .route(
            "/books/:id",
            get(books::get_book)
                .put(books::update_book)
                .delete(books::delete_book),
        )
        // Categories
        .route("/categories", get(categories::list_categories))
        .route("/categories/", get(categories::list_categories))
        .route("/categories/new", post(categories::create_category))
        .route(
            "/categories/:id",
            get(categories::get_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        .route("/categories/:id/edit", put(categories::update_category))
        .route("/categories/:id/books", get(categories::category_books))
        // Users
        .route("/users", get(users::list_users))
        .route("/users/", get(users::list_users))
        .route("/users/findBy", post(users::find_user_by_email))
        .route("/users/new", post(users::create_user))
        .route(
            "/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/users/:id/loans", get(users::get_user_loans))
        // Loans
        .route("/loans", get(loans::list_loans))
        .route("/loans/", get(loans::list_loans))
        .route("/loans/new", post(loans::create_loan))
        .route(
            "/loans/:id",
            get(loans::get_loan)
                .put(loans::update_loan)
                .delete(loans::delete_loan),
        )
        .route("/loans/:id/edit", put(loans::update_loan))
        .route("/loans/:id/return", post(loans::return_loan))
        // Book-loan records
        .route("/book/loan", get(book_loans::list_book_loans))
        .route("/book/loan/", get(book_loans::list_book_loans))
        .route("/book/loan/create", post(book_loans::create_book_loans))
        .route(
            "/book/loan/:id",
            get(book_loans::get_book_loan)
                .put(book_loans::update_book_loan)
                .delete(book_loans::delete_book_loan),
        )
        .with_state(state);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", api)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Method, Request as HttpRequest, StatusCode},
    };
    use chrono::Utc;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        config::AppConfig,
        models::user::{UserClaims, ROLE_ADMIN, ROLE_USER},
        repository::Repository,
        services::{
            tokens::{MemoryRevokedTokens, MockRevokedTokens, RevokedTokens},
            Services,
        },
    };

    /// Router over a pool that never connects; only requests rejected
    /// before reaching the database are exercised here
    fn test_app(revoked: Arc<dyn RevokedTokens>) -> (Router, AppConfig) {
        let config = AppConfig::default();
        let pool = PgPoolOptions::new()
            .connect_lazy(&config.database.url)
            .unwrap();

        let services = Services::new(Repository::new(pool), config.auth.clone(), revoked);
        let state = AppState {
            config: Arc::new(config.clone()),
            services: Arc::new(services),
        };
        (router(state), config)
    }

    fn token(config: &AppConfig, user_id: i32, roles: &[&str]) -> (String, UserClaims) {
        let now = Utc::now().timestamp();
        let claims = UserClaims {
            sub: format!("user{}@example.org", user_id),
            user_id,
            roles: roles.iter().map(|r| r.to_string()).collect(),
            user_name: format!("user{}", user_id),
            first_name: "Test".into(),
            last_name: "User".into(),
            exp: now + 600,
            iat: now,
            jti: format!("jti-{}", user_id),
        };
        (claims.create_token(&config.auth.jwt_secret).unwrap(), claims)
    }

    fn request(method: Method, uri: &str, bearer: Option<&str>, body: &str) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_and_index() {
        let (app, _) = test_app(Arc::new(MemoryRevokedTokens::new()));

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/health", None, ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "healthy");

        let response = app
            .oneshot(request(Method::GET, "/api", None, ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert!(body["endpoints"].as_array().is_some_and(|e| !e.is_empty()));
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        let (app, _) = test_app(Arc::new(MemoryRevokedTokens::new()));

        for (method, uri) in [
            (Method::GET, "/api/loans"),
            (Method::GET, "/api/users"),
            (Method::GET, "/api/me"),
            (Method::POST, "/api/logout"),
            (Method::DELETE, "/api/books/1"),
        ] {
            let response = app
                .clone()
                .oneshot(request(method.clone(), uri, None, "{}"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        }
    }

    #[tokio::test]
    async fn test_garbage_token_is_rejected() {
        let (app, _) = test_app(Arc::new(MemoryRevokedTokens::new()));
        let response = app
            .oneshot(request(Method::GET, "/api/me", Some("not.a.jwt"), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_register_rejects_empty_and_malformed_bodies() {
        let (app, _) = test_app(Arc::new(MemoryRevokedTokens::new()));

        let response = app
            .clone()
            .oneshot(request(Method::POST, "/api/register", None, ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["message"], "No data provided");

        let response = app
            .clone()
            .oneshot(request(Method::POST, "/api/register", None, "{not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let invalid_email = r#"{
            "email": "nope", "firstName": "A", "lastName": "B", "userName": "ab",
            "phoneNumber": "1", "subStartDate": "2024-01-01", "subEndDate": "2025-01-01",
            "password": "secret123"
        }"#;
        let response = app
            .oneshot(request(Method::POST, "/api/register", None, invalid_email))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_catalog_writes_require_admin() {
        let (app, config) = test_app(Arc::new(MemoryRevokedTokens::new()));
        let (reader, _) = token(&config, 5, &[ROLE_USER]);

        let body = r#"{"title": "Dune", "ISBN": "9780441172719", "publishedYear": "1965-08-01",
                       "description": "", "image": "", "categoryId": 1, "authorIds": []}"#;
        let response = app
            .clone()
            .oneshot(request(Method::POST, "/api/books/new", Some(&reader), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .oneshot(request(Method::DELETE, "/api/categories/1", Some(&reader), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_users_cannot_touch_other_accounts() {
        let (app, config) = test_app(Arc::new(MemoryRevokedTokens::new()));
        let (reader, _) = token(&config, 5, &[ROLE_USER]);

        let response = app
            .clone()
            .oneshot(request(Method::PUT, "/api/users/6", Some(&reader), r#"{"firstName": "X"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .oneshot(request(Method::GET, "/api/users/6/loans", Some(&reader), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_passes_role_check_then_validation() {
        let (app, config) = test_app(Arc::new(MemoryRevokedTokens::new()));
        let (admin, _) = token(&config, 1, &[ROLE_USER, ROLE_ADMIN]);

        // invalid ISBN checksum fails validation before any database access
        let body = r#"{"title": "Dune", "ISBN": "9780441172710", "publishedYear": "1965-08-01",
                       "description": "", "image": "", "categoryId": 1, "authorIds": []}"#;
        let response = app
            .oneshot(request(Method::POST, "/api/books/new", Some(&admin), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_revoked_token_is_rejected() {
        let config = AppConfig::default();
        let (bearer, _) = token(&config, 5, &[ROLE_USER]);

        let mut store = MockRevokedTokens::new();
        store.expect_is_revoked().times(1).returning(|_| Ok(true));

        let (app, _) = test_app(Arc::new(store));
        let response = app
            .oneshot(request(Method::GET, "/api/me", Some(&bearer), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["message"], "Token has been revoked");
    }

    #[tokio::test]
    async fn test_logout_revokes_token() {
        let (app, config) = test_app(Arc::new(MemoryRevokedTokens::new()));
        let (bearer, _) = token(&config, 5, &[ROLE_USER]);

        let response = app
            .clone()
            .oneshot(request(Method::POST, "/api/logout", Some(&bearer), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(request(Method::GET, "/api/logout", Some(&bearer), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_malformed_path_and_query_use_json_errors() {
        let (app, _) = test_app(Arc::new(MemoryRevokedTokens::new()));

        for uri in ["/api/books/abc", "/api/books/recent?page=x", "/api/authors/1.5"] {
            let response = app
                .clone()
                .oneshot(request(Method::GET, uri, None, ""))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);

            let body = json_body(response).await;
            assert_eq!(body["code"], 5, "{}", uri);
            assert_eq!(body["error"], "BadValue");
            assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
        }
    }
}
