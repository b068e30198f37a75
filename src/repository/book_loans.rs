//! Book-loan records: which book is part of which loan

use std::collections::{HashMap, HashSet};

use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::Book,
        book_loan::{BookLoan, UpdateBookLoan},
    },
};

use super::{books, books::BooksRepository, loans};

#[derive(Clone)]
pub struct BookLoansRepository {
    pool: Pool<Postgres>,
    books: BooksRepository,
}

impl BookLoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: BooksRepository::new(pool.clone()),
            pool,
        }
    }

    pub async fn list(&self) -> AppResult<Vec<BookLoan>> {
        let records = sqlx::query_as::<_, BookLoan>(
            "SELECT id, book_id, loan_id FROM book_loans ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        self.with_books(records).await
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<BookLoan> {
        let record = sqlx::query_as::<_, BookLoan>(
            "SELECT id, book_id, loan_id FROM book_loans WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Book loan not found".to_string()))?;

        Ok(self.with_books(vec![record]).await?.remove(0))
    }

    /// Records grouped by loan, each with its book
    pub async fn by_loans(&self, loan_ids: &[i32]) -> AppResult<HashMap<i32, Vec<BookLoan>>> {
        let records = sqlx::query_as::<_, BookLoan>(
            "SELECT id, book_id, loan_id FROM book_loans WHERE loan_id = ANY($1) ORDER BY id",
        )
        .bind(loan_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<i32, Vec<BookLoan>> = HashMap::new();
        for record in self.with_books(records).await? {
            grouped.entry(record.loan_id).or_default().push(record);
        }
        Ok(grouped)
    }

    /// Add books to an existing loan
    pub async fn create(&self, loan_id: i32, book_ids: &[i32]) -> AppResult<()> {
        let mut unique = HashSet::new();
        if let Some(dup) = book_ids.iter().find(|id| !unique.insert(**id)) {
            return Err(AppError::BadRequest(format!("Book with ID {} listed twice", dup)));
        }

        let mut tx = self.pool.begin().await?;

        let loan = loans::lock(&mut tx, loan_id).await?;
        let locked = books::lock(&mut tx, book_ids).await?;
        ensure_found(&locked, book_ids)?;

        if loan.is_open() {
            books::ensure_available(&mut tx, book_ids, &[]).await?;
        }

        insert(&mut tx, loan_id, book_ids).await?;
        books::refresh_availability(&mut tx, book_ids).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Point a record at another book and/or loan
    pub async fn update(&self, id: i32, changes: &UpdateBookLoan) -> AppResult<BookLoan> {
        let mut tx = self.pool.begin().await?;

        let current = find(&mut tx, id).await?;
        let loan_id = changes.loan_id.unwrap_or(current.loan_id);

        let mut loan_ids = vec![current.loan_id, loan_id];
        loan_ids.sort_unstable();
        loan_ids.dedup();
        let loan = loans::lock_many(&mut tx, &loan_ids)
            .await?
            .into_iter()
            .find(|l| l.id == loan_id)
            .ok_or_else(|| AppError::NotFound("Loan not found".to_string()))?;

        let record = lock_record(&mut tx, id, current.loan_id).await?;
        let book_id = changes.book_id.unwrap_or(record.book_id);

        let locked = books::lock(&mut tx, &[record.book_id, book_id]).await?;
        ensure_found(&locked, &[book_id])?;

        if loan.is_open() {
            books::ensure_available(&mut tx, &[book_id], &[record.id]).await?;
        }

        sqlx::query("UPDATE book_loans SET book_id = $2, loan_id = $3 WHERE id = $1")
            .bind(id)
            .bind(book_id)
            .bind(loan_id)
            .execute(&mut *tx)
            .await?;

        books::refresh_availability(&mut tx, &[record.book_id, book_id]).await?;

        tx.commit().await?;
        self.get_by_id(id).await
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let current = find(&mut tx, id).await?;
        loans::lock(&mut tx, current.loan_id).await?;
        let record = lock_record(&mut tx, id, current.loan_id).await?;

        sqlx::query("DELETE FROM book_loans WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        books::refresh_availability(&mut tx, &[record.book_id]).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn with_books(&self, mut records: Vec<BookLoan>) -> AppResult<Vec<BookLoan>> {
        if records.is_empty() {
            return Ok(records);
        }

        let mut ids: Vec<i32> = records.iter().map(|r| r.book_id).collect();
        ids.sort_unstable();
        ids.dedup();

        let books: HashMap<i32, Book> = self
            .books
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|b| (b.id, b))
            .collect();

        for record in &mut records {
            record.book = books.get(&record.book_id).cloned();
        }
        Ok(records)
    }
}

async fn find(conn: &mut PgConnection, id: i32) -> AppResult<BookLoan> {
    sqlx::query_as::<_, BookLoan>("SELECT id, book_id, loan_id FROM book_loans WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Book loan not found".to_string()))
}

/// Lock a record once its loan is locked; fails if it moved in between
async fn lock_record(conn: &mut PgConnection, id: i32, loan_id: i32) -> AppResult<BookLoan> {
    let record = sqlx::query_as::<_, BookLoan>(
        "SELECT id, book_id, loan_id FROM book_loans WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Book loan not found".to_string()))?;

    if record.loan_id != loan_id {
        return Err(AppError::InvalidState(
            "Book loan was moved to another loan, retry the request".to_string(),
        ));
    }
    Ok(record)
}

fn ensure_found(locked: &[Book], book_ids: &[i32]) -> AppResult<()> {
    match book_ids.iter().find(|id| !locked.iter().any(|b| b.id == **id)) {
        Some(missing) => Err(AppError::NotFound(format!("Book with ID {} not found", missing))),
        None => Ok(()),
    }
}

pub(crate) async fn insert(conn: &mut PgConnection, loan_id: i32, book_ids: &[i32]) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO book_loans (book_id, loan_id) SELECT UNNEST($1::int[]), $2",
    )
    .bind(book_ids)
    .bind(loan_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
