//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{
    authors, book_loans, books, categories, health, index, loans, security, users,
};

/// Registers the JWT bearer scheme referenced by protected paths
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .description(Some("Token issued by POST /api/login_check"))
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Timeless Library API",
        version = "1.0.0",
        description = "Library management REST API: authors, books, categories, users and loans",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api", description = "API")
    ),
    paths(
        // Index & health
        index::index,
        health::health_check,
        health::readiness_check,
        // Security
        security::register,
        security::login,
        security::logout,
        // Authors
        authors::list_authors,
        authors::get_author,
        authors::search_authors,
        authors::create_author,
        authors::update_author,
        authors::delete_author,
        // Books
        books::list_books,
        books::get_book,
        books::search_books,
        books::recent_books,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Categories
        categories::list_categories,
        categories::get_category,
        categories::category_books,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        // Users
        users::me,
        users::list_users,
        users::get_user,
        users::find_user_by_email,
        users::create_user,
        users::update_user,
        users::delete_user,
        users::get_user_loans,
        // Loans
        loans::list_loans,
        loans::get_loan,
        loans::create_loan,
        loans::update_loan,
        loans::return_loan,
        loans::delete_loan,
        // Book-loan records
        book_loans::list_book_loans,
        book_loans::get_book_loan,
        book_loans::create_book_loans,
        book_loans::update_book_loan,
        book_loans::delete_book_loan,
    ),
    components(
        schemas(
            // Catalog
            crate::models::author::Author,
            crate::models::author::AuthorBook,
            crate::models::author::CreateAuthor,
            crate::models::author::UpdateAuthor,
            crate::models::book::Book,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            crate::models::category::Category,
            crate::models::category::CategoryByName,
            crate::models::category::CreateCategory,
            crate::models::category::UpdateCategory,
            crate::models::category::CategoryBooks,
            authors::AuthorUpdatedResponse,
            categories::CategoryUpdatedResponse,
            // Users
            crate::models::user::User,
            crate::models::user::UserLoan,
            crate::models::user::RegisterUser,
            crate::models::user::CreateUser,
            crate::models::user::UpdateUser,
            crate::models::user::FindUserByEmail,
            crate::models::user::LoginRequest,
            crate::models::user::LoginResponse,
            // Loans
            crate::models::loan::Loan,
            crate::models::loan::LoanUserRef,
            crate::models::loan::BookByIsbn,
            crate::models::loan::LoanBookRef,
            crate::models::loan::CreateLoan,
            crate::models::loan::UpdateLoan,
            crate::models::book_loan::BookLoan,
            crate::models::book_loan::CreateBookLoans,
            crate::models::book_loan::UpdateBookLoan,
            // Common
            super::PaginatedBooks,
            super::MessageResponse,
            super::CreatedResponse,
            health::HealthResponse,
            index::IndexResponse,
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Index and health check endpoints"),
        (name = "auth", description = "Registration, login and logout"),
        (name = "authors", description = "Author management"),
        (name = "books", description = "Book catalog"),
        (name = "categories", description = "Category management"),
        (name = "users", description = "User management"),
        (name = "loans", description = "Loans and book-loan records")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
