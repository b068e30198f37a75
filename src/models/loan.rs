//! Loan model and related types

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::{book_loan::BookLoan, dates, user::User};

/// A borrowing transaction. It is open while `return_date` is null.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub id: i32,
    #[serde(skip_serializing)]
    pub user_id: i32,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_loans: Option<Vec<BookLoan>>,
}

impl Loan {
    pub fn is_open(&self) -> bool {
        self.return_date.is_none()
    }
}

/// Borrower referenced by email
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoanUserRef {
    #[validate(length(min = 1, message = "User email is required"))]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct BookByIsbn {
    #[serde(rename = "ISBN")]
    #[validate(length(min = 1, message = "Book ISBN is required"))]
    pub isbn: String,
}

/// One `{ "book": { "ISBN": ... } }` entry of a loan request
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoanBookRef {
    #[validate(nested)]
    pub book: BookByIsbn,
}

fn check_period(
    loan_date: Option<DateTime<Utc>>,
    due_date: Option<DateTime<Utc>>,
) -> Result<(), ValidationError> {
    match (loan_date, due_date) {
        (Some(loan), Some(due)) if due < loan => {
            let mut err = ValidationError::new("due_date");
            err.message = Some("Due date precedes the loan date".into());
            Err(err)
        }
        _ => Ok(()),
    }
}

/// ISBNs of the requested books, normalized, in request order.
/// Fails on the first ISBN listed twice.
pub fn requested_isbns(books: &[LoanBookRef]) -> Result<Vec<String>, String> {
    let mut seen = HashSet::new();
    let mut isbns = Vec::with_capacity(books.len());
    for entry in books {
        let isbn = crate::isbn::normalize(&entry.book.isbn);
        if !seen.insert(isbn.clone()) {
            return Err(format!("Book listed twice in the same loan: {}", isbn));
        }
        isbns.push(isbn);
    }
    Ok(isbns)
}

/// Create loan request
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_create_period"))]
pub struct CreateLoan {
    #[validate(nested)]
    pub user: LoanUserRef,
    #[serde(deserialize_with = "dates::datetime")]
    #[schema(value_type = String, example = "2024-03-01 10:00:00")]
    pub loan_date: DateTime<Utc>,
    #[serde(deserialize_with = "dates::datetime")]
    #[schema(value_type = String, example = "2024-03-15 10:00:00")]
    pub due_date: DateTime<Utc>,
    #[serde(default, deserialize_with = "dates::option_datetime")]
    #[schema(value_type = Option<String>)]
    pub return_date: Option<DateTime<Utc>>,
    #[validate(length(min = 1, message = "A loan needs at least one book"), nested)]
    pub book_loans: Vec<LoanBookRef>,
}

fn validate_create_period(loan: &CreateLoan) -> Result<(), ValidationError> {
    check_period(Some(loan.loan_date), Some(loan.due_date))
}

/// Partial loan update.
///
/// `returnDate: null` reopens the loan; an absent `returnDate` leaves it
/// untouched. `bookLoans`, when present, replaces the loan's books.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_update_period"))]
pub struct UpdateLoan {
    #[validate(nested)]
    pub user: Option<LoanUserRef>,
    #[serde(default, deserialize_with = "dates::option_datetime")]
    #[schema(value_type = Option<String>)]
    pub loan_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "dates::option_datetime")]
    #[schema(value_type = Option<String>)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "dates::double_option_datetime")]
    #[schema(value_type = Option<String>)]
    pub return_date: Option<Option<DateTime<Utc>>>,
    #[validate(length(min = 1, message = "A loan needs at least one book"), nested)]
    pub book_loans: Option<Vec<LoanBookRef>>,
}

fn validate_update_period(loan: &UpdateLoan) -> Result<(), ValidationError> {
    check_period(loan.loan_date, loan.due_date)
}
