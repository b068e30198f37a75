//! Loans repository for database operations.
//!
//! Every write runs in a transaction that locks the affected book rows and
//! recomputes their availability before committing.
//!
//! Row locks are always taken in the order user, loan, book-loan record,
//! book. Every writer touching these tables follows it so concurrent
//! transactions queue instead of deadlocking.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{book::Book, loan::Loan, user::User},
};

use super::{book_loans, book_loans::BookLoansRepository, books, users, users::USER_COLUMNS};

const LOAN_COLUMNS: &str = "id, user_id, loan_date, due_date, return_date";

/// Resolved loan changes; `None` leaves a field untouched
#[derive(Debug, Default)]
pub struct LoanChanges {
    pub user_id: Option<i32>,
    pub loan_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    /// `Some(None)` reopens the loan
    pub return_date: Option<Option<DateTime<Utc>>>,
    /// Normalized ISBNs replacing the loan's books
    pub isbns: Option<Vec<String>>,
}

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
    book_loans: BookLoansRepository,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            book_loans: BookLoansRepository::new(pool.clone()),
            pool,
        }
    }

    /// List loans with borrower and books
    pub async fn list(&self) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {} FROM loans ORDER BY loan_date DESC, id DESC",
            LOAN_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        self.with_relations(loans, true).await
    }

    /// Get loan by ID with borrower and books
    pub async fn get_by_id(&self, id: i32) -> AppResult<Loan> {
        let loan = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {} FROM loans WHERE id = $1",
            LOAN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Loan not found".to_string()))?;

        Ok(self.with_relations(vec![loan], true).await?.remove(0))
    }

    /// Loans grouped by borrower, with books
    pub async fn by_users(&self, user_ids: &[i32]) -> AppResult<HashMap<i32, Vec<Loan>>> {
        let loans = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {} FROM loans WHERE user_id = ANY($1) ORDER BY loan_date DESC, id DESC",
            LOAN_COLUMNS
        ))
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<i32, Vec<Loan>> = HashMap::new();
        for loan in self.with_relations(loans, false).await? {
            grouped.entry(loan.user_id).or_default().push(loan);
        }
        Ok(grouped)
    }

    /// Create a loan over the books with the given ISBNs.
    ///
    /// Books of an open loan must not be on any other open loan.
    pub async fn create(
        &self,
        user_id: i32,
        loan_date: DateTime<Utc>,
        due_date: DateTime<Utc>,
        return_date: Option<DateTime<Utc>>,
        isbns: &[String],
    ) -> AppResult<i32> {
        let mut tx = self.pool.begin().await?;

        users::lock_shared(&mut tx, user_id).await?;
        let book_ids = lock_books_by_isbn(&mut tx, isbns).await?;
        if return_date.is_none() {
            books::ensure_available(&mut tx, &book_ids, &[]).await?;
        }

        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO loans (user_id, loan_date, due_date, return_date)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(loan_date)
        .bind(due_date)
        .bind(return_date)
        .fetch_one(&mut *tx)
        .await?;

        book_loans::insert(&mut tx, id, &book_ids).await?;
        books::refresh_availability(&mut tx, &book_ids).await?;

        tx.commit().await?;
        Ok(id)
    }

    /// Apply partial changes, replacing the books when ISBNs are given
    pub async fn update(&self, id: i32, changes: &LoanChanges) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        if let Some(user_id) = changes.user_id {
            users::lock_shared(&mut tx, user_id).await?;
        }
        let loan = lock(&mut tx, id).await?;

        let loan_date = changes.loan_date.unwrap_or(loan.loan_date);
        let due_date = changes.due_date.unwrap_or(loan.due_date);
        if due_date < loan_date {
            return Err(AppError::BadRequest(
                "Due date precedes the loan date".to_string(),
            ));
        }
        let return_date = changes.return_date.unwrap_or(loan.return_date);

        let current: Vec<(i32, i32)> = sqlx::query_as(
            "SELECT id, book_id FROM book_loans WHERE loan_id = $1 ORDER BY id FOR UPDATE",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;
        let current_records: Vec<i32> = current.iter().map(|(record, _)| *record).collect();
        let mut affected: Vec<i32> = current.iter().map(|(_, book)| *book).collect();

        let book_ids = match changes.isbns {
            Some(ref isbns) => lock_books_by_isbn(&mut tx, isbns).await?,
            None => {
                books::lock(&mut tx, &affected).await?;
                affected.clone()
            }
        };

        if return_date.is_none() {
            books::ensure_available(&mut tx, &book_ids, &current_records).await?;
        }

        sqlx::query(
            r#"
            UPDATE loans SET
                user_id = COALESCE($2, user_id),
                loan_date = $3,
                due_date = $4,
                return_date = $5
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(changes.user_id)
        .bind(loan_date)
        .bind(due_date)
        .bind(return_date)
        .execute(&mut *tx)
        .await?;

        if changes.isbns.is_some() {
            sqlx::query("DELETE FROM book_loans WHERE loan_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            book_loans::insert(&mut tx, id, &book_ids).await?;
        }

        affected.extend(book_ids);
        books::refresh_availability(&mut tx, &affected).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Close an open loan now
    pub async fn return_loan(&self, id: i32) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        let loan = lock(&mut tx, id).await?;
        if !loan.is_open() {
            return Err(AppError::InvalidState(
                "Loan has already been returned".to_string(),
            ));
        }

        sqlx::query("UPDATE loans SET return_date = $2 WHERE id = $1")
            .bind(id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        let book_ids = loan_book_ids(&mut tx, id).await?;
        books::refresh_availability(&mut tx, &book_ids).await?;

        tx.commit().await?;
        self.get_by_id(id).await
    }

    /// Delete a loan and its book-loan records
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        lock(&mut tx, id).await?;
        let book_ids = loan_book_ids(&mut tx, id).await?;

        sqlx::query("DELETE FROM loans WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        books::refresh_availability(&mut tx, &book_ids).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn with_relations(&self, mut loans: Vec<Loan>, with_user: bool) -> AppResult<Vec<Loan>> {
        if loans.is_empty() {
            return Ok(loans);
        }

        let ids: Vec<i32> = loans.iter().map(|l| l.id).collect();
        let mut records = self.book_loans.by_loans(&ids).await?;

        let mut users: HashMap<i32, User> = HashMap::new();
        if with_user {
            let mut user_ids: Vec<i32> = loans.iter().map(|l| l.user_id).collect();
            user_ids.sort_unstable();
            user_ids.dedup();

            users = sqlx::query_as::<_, User>(&format!(
                "SELECT {} FROM users WHERE id = ANY($1)",
                USER_COLUMNS
            ))
            .bind(&user_ids)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();
        }

        for loan in &mut loans {
            loan.book_loans = Some(records.remove(&loan.id).unwrap_or_default());
            if with_user {
                loan.user = users.get(&loan.user_id).cloned();
            }
        }
        Ok(loans)
    }
}

/// Lock a loan row for the rest of the transaction
pub(crate) async fn lock(conn: &mut PgConnection, id: i32) -> AppResult<Loan> {
    sqlx::query_as::<_, Loan>(&format!(
        "SELECT {} FROM loans WHERE id = $1 FOR UPDATE",
        LOAN_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Loan not found".to_string()))
}

/// Lock several loans, in id order
pub(crate) async fn lock_many(conn: &mut PgConnection, ids: &[i32]) -> AppResult<Vec<Loan>> {
    let loans = sqlx::query_as::<_, Loan>(&format!(
        "SELECT {} FROM loans WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        LOAN_COLUMNS
    ))
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;

    Ok(loans)
}

async fn loan_book_ids(conn: &mut PgConnection, loan_id: i32) -> AppResult<Vec<i32>> {
    let ids = sqlx::query_scalar("SELECT book_id FROM book_loans WHERE loan_id = $1")
        .bind(loan_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(ids)
}

/// Lock the books with these ISBNs; every ISBN must exist
async fn lock_books_by_isbn(conn: &mut PgConnection, isbns: &[String]) -> AppResult<Vec<i32>> {
    let locked: Vec<Book> = books::lock_by_isbns(conn, isbns).await?;

    isbns
        .iter()
        .map(|isbn| {
            locked
                .iter()
                .find(|b| &b.isbn == isbn)
                .map(|b| b.id)
                .ok_or_else(|| AppError::NotFound(format!("Book not found: {}", isbn)))
        })
        .collect()
}
