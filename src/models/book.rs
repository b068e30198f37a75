//! Book model and related types

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::{author::Author, category::Category, dates};

/// Book as stored.
///
/// `available` is maintained by the repository: it is true exactly when no
/// open loan (one without a return date) contains the book.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: i32,
    pub title: String,
    #[serde(rename = "ISBN")]
    pub isbn: String,
    pub published_year: NaiveDate,
    pub description: String,
    pub image: String,
    pub available: bool,
    #[serde(skip_serializing)]
    pub category_id: i32,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<Author>>,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
}

/// Columns written when inserting a book
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub isbn: String,
    pub published_year: NaiveDate,
    pub description: String,
    pub image: String,
    pub category_id: i32,
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBook {
    #[validate(length(min = 1, max = 255, message = "Title is required"))]
    pub title: String,
    #[serde(rename = "ISBN")]
    #[validate(custom(function = "crate::isbn::validate"))]
    pub isbn: String,
    #[serde(deserialize_with = "dates::date")]
    #[schema(value_type = String, example = "1965-08-01")]
    pub published_year: NaiveDate,
    pub description: String,
    #[validate(length(max = 255))]
    pub image: String,
    pub category_id: i32,
    pub author_ids: Vec<i32>,
}

/// Update book request; `authorIds`, when present, replaces the author set
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[serde(rename = "ISBN")]
    #[validate(custom(function = "crate::isbn::validate"))]
    pub isbn: Option<String>,
    #[serde(default, deserialize_with = "dates::option_date")]
    #[schema(value_type = Option<String>)]
    pub published_year: Option<NaiveDate>,
    pub description: Option<String>,
    #[validate(length(max = 255))]
    pub image: Option<String>,
    pub category_id: Option<i32>,
    pub author_ids: Option<Vec<i32>>,
}

/// Title search parameters
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BookSearchQuery {
    /// Words to look for in titles
    #[serde(default)]
    pub q: String,
    /// Maximum results (default 20, max 100)
    pub limit: Option<i64>,
}

impl BookSearchQuery {
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(20).clamp(1, 100) as usize
    }
}

/// Recent books parameters
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecentBooksQuery {
    /// Publication window in years, counted back from the current year (default 5)
    pub years: Option<i32>,
    /// Page number, from 1
    pub page: Option<i64>,
    /// Items per page (default 20, max 100)
    pub per_page: Option<i64>,
}

impl RecentBooksQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> i64 {
        self.per_page.unwrap_or(20).clamp(1, 100)
    }

    /// Rows to skip; saturates so far-off pages are simply empty
    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.per_page())
    }

    /// First day of the publication window relative to `today`
    pub fn window_start(&self, today: NaiveDate) -> NaiveDate {
        let years = self.years.unwrap_or(5).clamp(0, 500);
        NaiveDate::from_ymd_opt(today.year() - years, 1, 1).unwrap_or(NaiveDate::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_window() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let query = RecentBooksQuery::default();
        assert_eq!(query.window_start(today), NaiveDate::from_ymd_opt(2019, 1, 1).unwrap());

        let this_year = RecentBooksQuery {
            years: Some(0),
            ..Default::default()
        };
        assert_eq!(this_year.window_start(today), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn test_recent_pagination_bounds() {
        let query = RecentBooksQuery {
            years: None,
            page: Some(0),
            per_page: Some(1000),
        };
        assert_eq!(query.page(), 1);
        assert_eq!(query.per_page(), 100);
        assert_eq!(query.offset(), 0);
    }

    #[test]
    fn test_recent_offset_does_not_overflow() {
        let third = RecentBooksQuery {
            page: Some(3),
            per_page: Some(20),
            ..Default::default()
        };
        assert_eq!(third.offset(), 40);

        let huge = RecentBooksQuery {
            page: Some(i64::MAX),
            ..Default::default()
        };
        assert_eq!(huge.offset(), i64::MAX);
    }

    #[test]
    fn test_search_limit_bounds() {
        let query = BookSearchQuery { q: "x".into(), limit: None };
        assert_eq!(query.limit(), 20);
        let query = BookSearchQuery { q: "x".into(), limit: Some(-3) };
        assert_eq!(query.limit(), 1);
    }

    #[test]
    fn test_create_book_rejects_invalid_isbn() {
        let body = serde_json::json!({
            "title": "Dune",
            "ISBN": "9780441172710",
            "publishedYear": "1965-08-01",
            "description": "",
            "image": "",
            "categoryId": 1,
            "authorIds": [1]
        });
        let book: CreateBook = serde_json::from_value(body).unwrap();
        assert!(book.validate().is_err());
    }

    #[test]
    fn test_available_is_not_accepted_from_clients() {
        let body = serde_json::json!({ "available": false });
        let update: UpdateBook = serde_json::from_value(body).unwrap();
        assert!(update.title.is_none() && update.author_ids.is_none());
    }

    #[test]
    fn test_book_serializes_isbn_key() {
        let book = Book {
            id: 1,
            title: "Dune".into(),
            isbn: "9780441172719".into(),
            published_year: NaiveDate::from_ymd_opt(1965, 8, 1).unwrap(),
            description: String::new(),
            image: String::new(),
            available: true,
            category_id: 3,
            authors: None,
            category: None,
        };
        let json = serde_json::to_value(&book).unwrap();
        assert_eq!(json["ISBN"], "9780441172719");
        assert_eq!(json["publishedYear"], "1965-08-01");
        assert!(json.get("categoryId").is_none());
        assert!(json.get("authors").is_none());
    }
}
