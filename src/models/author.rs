//! Author model and related types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::{book::Book, category::CategoryByName, dates};

/// Author as stored, with its books when loaded
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub biography: String,
    pub birth_date: NaiveDate,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub books: Option<Vec<Book>>,
}

/// Author search criteria, both matched as case-insensitive substrings
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AuthorQuery {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl AuthorQuery {
    /// Non-blank criteria only
    pub fn normalized<'a>(&'a self) -> (Option<&'a str>, Option<&'a str>) {
        let clean = |s: &'a Option<String>| -> Option<&'a str> {
            s.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
        };
        (clean(&self.first_name), clean(&self.last_name))
    }
}

/// Book given inline when creating or editing an author.
///
/// Matched against existing books by exact title; the remaining fields are
/// only needed when the book does not exist yet.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthorBook {
    #[validate(length(min = 1, max = 255, message = "Book title is required"))]
    pub title: String,
    #[serde(rename = "ISBN")]
    #[validate(custom(function = "crate::isbn::validate"))]
    pub isbn: Option<String>,
    #[serde(default, deserialize_with = "dates::option_year")]
    #[schema(value_type = Option<String>, example = "1965")]
    pub published_year: Option<NaiveDate>,
    pub description: Option<String>,
    #[validate(length(max = 255))]
    pub image: Option<String>,
    #[validate(nested)]
    pub category: Option<CategoryByName>,
}

/// Create author request
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAuthor {
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,
    pub biography: String,
    #[serde(deserialize_with = "dates::date")]
    #[schema(value_type = String, example = "1920-10-08")]
    pub birth_date: NaiveDate,
    #[validate(nested)]
    pub books: Vec<AuthorBook>,
}

/// Update author request; `books`, when present, replaces the author's books
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAuthor {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    pub biography: Option<String>,
    #[serde(default, deserialize_with = "dates::option_date")]
    #[schema(value_type = Option<String>)]
    pub birth_date: Option<NaiveDate>,
    #[validate(nested)]
    pub books: Option<Vec<AuthorBook>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_ignores_blank_criteria() {
        let query = AuthorQuery {
            first_name: Some("  ".into()),
            last_name: Some(" Herbert ".into()),
        };
        assert_eq!(query.normalized(), (None, Some("Herbert")));
        assert_eq!(AuthorQuery::default().normalized(), (None, None));
    }

    #[test]
    fn test_create_author_validation() {
        let body = r#"{
            "firstName": "Frank",
            "lastName": "Herbert",
            "biography": "",
            "birthDate": "1920-10-08",
            "books": [{"title": "Dune", "ISBN": "978-0-441-17271-9", "publishedYear": "1965",
                       "category": {"name": "Science fiction"}}]
        }"#;
        let author: CreateAuthor = serde_json::from_str(body).unwrap();
        assert!(author.validate().is_ok());
        assert_eq!(author.books[0].published_year.unwrap().to_string(), "1965-01-01");

        let bad_isbn = body.replace("978-0-441-17271-9", "978-0-441-17271-0");
        let author: CreateAuthor = serde_json::from_str(&bad_isbn).unwrap();
        assert!(author.validate().is_err());
    }

    #[test]
    fn test_create_author_requires_books_field() {
        let body = r#"{"firstName": "A", "lastName": "B", "biography": "", "birthDate": "1900-01-01"}"#;
        assert!(serde_json::from_str::<CreateAuthor>(body).is_err());
    }
}
