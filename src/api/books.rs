//! Book endpoints

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::book::{Book, BookSearchQuery, CreateBook, RecentBooksQuery, UpdateBook},
};

use super::{
    AppPath, AppQuery, AuthenticatedUser, CreatedResponse, MessageResponse, PaginatedBooks,
    PaginatedResponse, ValidatedJson,
};

/// List books with authors and category
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    responses(
        (status = 200, description = "List of books", body = Vec<Book>)
    )
)]
pub async fn list_books(State(state): State<crate::AppState>) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.list_books().await?;
    Ok(Json(books))
}

/// Get book by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    AppPath(id): AppPath<i32>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get_book(id).await?;
    Ok(Json(book))
}

/// Search books by title
///
/// Titles starting with the whole query come first, then titles starting
/// with one of its words, then by number of words matched.
#[utoipa::path(
    get,
    path = "/books/search",
    tag = "books",
    params(BookSearchQuery),
    responses(
        (status = 200, description = "Ranked matches", body = Vec<Book>),
        (status = 400, description = "Empty query", body = crate::error::ErrorResponse)
    )
)]
pub async fn search_books(
    State(state): State<crate::AppState>,
    AppQuery(query): AppQuery<BookSearchQuery>,
) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.search_books(&query).await?;
    Ok(Json(books))
}

/// Recently published books
#[utoipa::path(
    get,
    path = "/books/recent",
    tag = "books",
    params(RecentBooksQuery),
    responses(
        (status = 200, description = "Books published in the window, newest first", body = PaginatedBooks)
    )
)]
pub async fn recent_books(
    State(state): State<crate::AppState>,
    AppQuery(query): AppQuery<RecentBooksQuery>,
) -> AppResult<Json<PaginatedResponse<Book>>> {
    let (books, total, page, per_page) = state.services.catalog.recent_books(&query).await?;

    Ok(Json(PaginatedResponse {
        items: books,
        total,
        page,
        per_page,
    }))
}

/// Create a book
#[utoipa::path(
    post,
    path = "/books/new",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = CreatedResponse),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 404, description = "Category or author not found", body = crate::error::ErrorResponse),
        (status = 409, description = "ISBN already used", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ValidatedJson(book): ValidatedJson<CreateBook>,
) -> AppResult<(StatusCode, Json<CreatedResponse>)> {
    claims.require_admin()?;

    let id = state.services.catalog.create_book(book).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            message: "Book created successfully".to_string(),
            id,
        }),
    ))
}

/// Update a book
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = CreatedResponse),
        (status = 404, description = "Book, category or author not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppPath(id): AppPath<i32>,
    ValidatedJson(book): ValidatedJson<UpdateBook>,
) -> AppResult<Json<CreatedResponse>> {
    claims.require_admin()?;

    state.services.catalog.update_book(id, book).await?;

    Ok(Json(CreatedResponse {
        message: "Book updated successfully".to_string(),
        id,
    }))
}

/// Delete a book
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book deleted", body = MessageResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book is on an open loan", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppPath(id): AppPath<i32>,
) -> AppResult<Json<MessageResponse>> {
    claims.require_admin()?;

    state.services.catalog.delete_book(id).await?;
    Ok(Json(MessageResponse::new("Book deleted successfully")))
}
