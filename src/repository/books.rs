//! Books repository for database operations.
//!
//! Besides plain CRUD this module owns the availability bookkeeping shared
//! by the loan repositories: locking book rows, checking for open loans and
//! recomputing the `available` flag.

use std::collections::HashMap;

use chrono::NaiveDate;
use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

use crate::{
    error::{AppError, AppResult},
    models::{
        author::Author,
        book::{Book, CreateBook, NewBook, UpdateBook},
        category::Category,
    },
    search::SearchTerms,
};

pub(crate) const BOOK_COLUMNS: &str =
    "b.id, b.title, b.isbn, b.published_year, b.description, b.image, b.available, b.category_id";

#[derive(sqlx::FromRow)]
struct BookAuthorRow {
    book_id: i32,
    #[sqlx(flatten)]
    author: Author,
}

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List all books with authors and category
    pub async fn list(&self) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books b ORDER BY b.title, b.id",
            BOOK_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        self.with_relations(books).await
    }

    /// Get book by ID with authors and category
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        let book = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books b WHERE b.id = $1",
            BOOK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

        Ok(self.with_relations(vec![book]).await?.remove(0))
    }

    /// Books of one category, with their authors
    pub async fn by_category(&self, category_id: i32) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books b WHERE b.category_id = $1 ORDER BY b.title, b.id",
            BOOK_COLUMNS
        ))
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;

        self.with_relations(books).await
    }

    /// Books grouped by category, authors attached, categories omitted
    pub async fn by_categories(&self, category_ids: &[i32]) -> AppResult<HashMap<i32, Vec<Book>>> {
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books b WHERE b.category_id = ANY($1) ORDER BY b.title, b.id",
            BOOK_COLUMNS
        ))
        .bind(category_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut books = self.with_authors(books).await?;
        let mut grouped: HashMap<i32, Vec<Book>> = HashMap::new();
        for book in books.drain(..) {
            grouped.entry(book.category_id).or_default().push(book);
        }
        Ok(grouped)
    }

    /// Books grouped by author, each with its category
    pub async fn by_authors(&self, author_ids: &[i32]) -> AppResult<HashMap<i32, Vec<Book>>> {
        #[derive(sqlx::FromRow)]
        struct AuthorBookRow {
            author_id: i32,
            #[sqlx(flatten)]
            book: Book,
        }

        let rows = sqlx::query_as::<_, AuthorBookRow>(&format!(
            r#"
            SELECT ab.author_id, {}
            FROM books b
            JOIN author_book ab ON ab.book_id = b.id
            WHERE ab.author_id = ANY($1)
            ORDER BY b.title, b.id
            "#,
            BOOK_COLUMNS
        ))
        .bind(author_ids)
        .fetch_all(&self.pool)
        .await?;

        let category_ids = unique(rows.iter().map(|r| r.book.category_id));
        let categories = self.categories_by_id(&category_ids).await?;

        let mut grouped: HashMap<i32, Vec<Book>> = HashMap::new();
        for row in rows {
            let mut book = row.book;
            book.category = categories.get(&book.category_id).cloned();
            grouped.entry(row.author_id).or_default().push(book);
        }
        Ok(grouped)
    }

    /// Books by ID, with relations, in ID order
    pub async fn get_many(&self, ids: &[i32]) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books b WHERE b.id = ANY($1) ORDER BY b.id",
            BOOK_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        self.with_relations(books).await
    }

    /// Title search: any token contained in the title, ranked.
    ///
    /// Ranking happens in SQL ahead of the `LIMIT` so the best matches are
    /// kept however many titles match.
    pub async fn search(&self, terms: &SearchTerms, limit: usize) -> AppResult<Vec<Book>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM books b WHERE ", BOOK_COLUMNS));
        push_title_likes(&mut builder, terms.like_patterns(), " OR ");

        // tier: whole query prefix, then any token prefix, then the rest
        builder.push(" ORDER BY CASE WHEN LOWER(b.title) LIKE ");
        builder.push_bind(terms.phrase_prefix_pattern());
        builder.push(" ESCAPE '\\' THEN 0 WHEN (");
        push_title_likes(&mut builder, terms.prefix_patterns(), " OR ");
        builder.push(") THEN 1 ELSE 2 END, (");

        // tokens matched, most first
        let mut matched = builder.separated(" + ");
        for pattern in terms.like_patterns() {
            matched.push("CASE WHEN LOWER(b.title) LIKE ");
            matched.push_bind_unseparated(pattern);
            matched.push_unseparated(" ESCAPE '\\' THEN 1 ELSE 0 END");
        }
        builder.push(") DESC, LOWER(b.title), b.id LIMIT ");
        builder.push_bind(limit as i64);

        let mut books = builder
            .build_query_as::<Book>()
            .fetch_all(&self.pool)
            .await?;

        terms.sort_by_rank(&mut books, |book| book.title.as_str());

        self.with_relations(books).await
    }

    /// Books published on or after `since`, newest first
    pub async fn recent(
        &self,
        since: NaiveDate,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Book>, i64)> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM books WHERE published_year >= $1")
                .bind(since)
                .fetch_one(&self.pool)
                .await?;

        let books = sqlx::query_as::<_, Book>(&format!(
            r#"
            SELECT {} FROM books b
            WHERE b.published_year >= $1
            ORDER BY b.published_year DESC, b.id DESC
            LIMIT $2 OFFSET $3
            "#,
            BOOK_COLUMNS
        ))
        .bind(since)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((self.with_relations(books).await?, total))
    }

    /// Create a book linked to existing category and authors
    pub async fn create(&self, book: &CreateBook) -> AppResult<i32> {
        let mut tx = self.pool.begin().await?;

        ensure_category(&mut tx, book.category_id).await?;
        ensure_authors(&mut tx, &book.author_ids).await?;

        let isbn = crate::isbn::normalize(&book.isbn);
        ensure_isbn_free(&mut tx, &isbn, None).await?;

        let id = insert(
            &mut tx,
            &NewBook {
                title: book.title.clone(),
                isbn,
                published_year: book.published_year,
                description: book.description.clone(),
                image: book.image.clone(),
                category_id: book.category_id,
            },
        )
        .await?;
        link_authors(&mut tx, id, &book.author_ids).await?;

        tx.commit().await?;
        Ok(id)
    }

    /// Partial update; `author_ids` replaces the author set when present
    pub async fn update(&self, id: i32, book: &UpdateBook) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let existing = lock(&mut tx, &[id]).await?;
        if existing.is_empty() {
            return Err(AppError::NotFound("Book not found".to_string()));
        }

        if let Some(category_id) = book.category_id {
            ensure_category(&mut tx, category_id).await?;
        }
        let isbn = book.isbn.as_deref().map(crate::isbn::normalize);
        if let Some(ref isbn) = isbn {
            ensure_isbn_free(&mut tx, isbn, Some(id)).await?;
        }

        sqlx::query(
            r#"
            UPDATE books SET
                title = COALESCE($2, title),
                isbn = COALESCE($3, isbn),
                published_year = COALESCE($4, published_year),
                description = COALESCE($5, description),
                image = COALESCE($6, image),
                category_id = COALESCE($7, category_id)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&book.title)
        .bind(&isbn)
        .bind(book.published_year)
        .bind(&book.description)
        .bind(&book.image)
        .bind(book.category_id)
        .execute(&mut *tx)
        .await?;

        if let Some(ref author_ids) = book.author_ids {
            ensure_authors(&mut tx, author_ids).await?;
            sqlx::query("DELETE FROM author_book WHERE book_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            link_authors(&mut tx, id, author_ids).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Delete a book that is not out on an open loan
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        // the cascade removes the book's records: lock loans and records first
        let loan_ids: Vec<i32> = sqlx::query_scalar(
            "SELECT DISTINCT loan_id FROM book_loans WHERE book_id = $1 ORDER BY loan_id",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;
        super::loans::lock_many(&mut tx, &loan_ids).await?;
        sqlx::query("SELECT id FROM book_loans WHERE book_id = $1 ORDER BY id FOR UPDATE")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let existing = lock(&mut tx, &[id]).await?;
        if existing.is_empty() {
            return Err(AppError::NotFound("Book not found".to_string()));
        }
        if first_unavailable(&mut tx, &[id], &[]).await?.is_some() {
            return Err(AppError::StillReferenced(
                "Book is on an open loan and cannot be deleted".to_string(),
            ));
        }

        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Attach authors and category to each book
    pub async fn with_relations(&self, books: Vec<Book>) -> AppResult<Vec<Book>> {
        if books.is_empty() {
            return Ok(books);
        }

        let category_ids = unique(books.iter().map(|b| b.category_id));
        let categories = self.categories_by_id(&category_ids).await?;

        let mut books = self.with_authors(books).await?;
        for book in &mut books {
            book.category = categories.get(&book.category_id).cloned();
        }
        Ok(books)
    }

    async fn with_authors(&self, mut books: Vec<Book>) -> AppResult<Vec<Book>> {
        if books.is_empty() {
            return Ok(books);
        }

        let ids: Vec<i32> = books.iter().map(|b| b.id).collect();
        let rows = sqlx::query_as::<_, BookAuthorRow>(
            r#"
            SELECT ab.book_id, a.id, a.first_name, a.last_name, a.biography, a.birth_date
            FROM authors a
            JOIN author_book ab ON ab.author_id = a.id
            WHERE ab.book_id = ANY($1)
            ORDER BY a.last_name, a.first_name, a.id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut authors: HashMap<i32, Vec<Author>> = HashMap::new();
        for row in rows {
            authors.entry(row.book_id).or_default().push(row.author);
        }
        for book in &mut books {
            book.authors = Some(authors.remove(&book.id).unwrap_or_default());
        }
        Ok(books)
    }

    async fn categories_by_id(&self, ids: &[i32]) -> AppResult<HashMap<i32, Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, description FROM categories WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(categories.into_iter().map(|c| (c.id, c)).collect())
    }
}

fn unique(ids: impl Iterator<Item = i32>) -> Vec<i32> {
    let mut ids: Vec<i32> = ids.collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

async fn ensure_category(conn: &mut PgConnection, category_id: i32) -> AppResult<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1)")
        .bind(category_id)
        .fetch_one(&mut *conn)
        .await?;

    if exists {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("Category with ID {} not found", category_id)))
    }
}

async fn ensure_authors(conn: &mut PgConnection, author_ids: &[i32]) -> AppResult<()> {
    let found: Vec<i32> = sqlx::query_scalar("SELECT id FROM authors WHERE id = ANY($1)")
        .bind(author_ids)
        .fetch_all(&mut *conn)
        .await?;

    match author_ids.iter().find(|id| !found.contains(id)) {
        Some(missing) => Err(AppError::NotFound(format!("Author with ID {} not found", missing))),
        None => Ok(()),
    }
}

pub(crate) async fn ensure_isbn_free(
    conn: &mut PgConnection,
    isbn: &str,
    exclude_id: Option<i32>,
) -> AppResult<()> {
    let taken: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1 AND id IS DISTINCT FROM $2)",
    )
    .bind(isbn)
    .bind(exclude_id)
    .fetch_one(&mut *conn)
    .await?;

    if taken {
        Err(AppError::Conflict(format!("A book with ISBN {} already exists", isbn)))
    } else {
        Ok(())
    }
}

pub(crate) async fn insert(conn: &mut PgConnection, book: &NewBook) -> AppResult<i32> {
    let id = sqlx::query_scalar::<_, i32>(
        r#"
        INSERT INTO books (title, isbn, published_year, description, image, category_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(&book.title)
    .bind(&book.isbn)
    .bind(book.published_year)
    .bind(&book.description)
    .bind(&book.image)
    .bind(book.category_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

async fn link_authors(conn: &mut PgConnection, book_id: i32, author_ids: &[i32]) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO author_book (author_id, book_id)
        SELECT UNNEST($1::int[]), $2
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(author_ids)
    .bind(book_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// `LOWER(b.title) LIKE <pattern>` for each pattern, joined by `separator`
fn push_title_likes(builder: &mut QueryBuilder<Postgres>, patterns: Vec<String>, separator: &str) {
    let mut likes = builder.separated(separator);
    for pattern in patterns {
        likes.push("LOWER(b.title) LIKE ");
        likes.push_bind_unseparated(pattern);
        likes.push_unseparated(" ESCAPE '\\'");
    }
}

/// Lock book rows for the rest of the transaction, in ID order
pub(crate) async fn lock(conn: &mut PgConnection, ids: &[i32]) -> AppResult<Vec<Book>> {
    let books = sqlx::query_as::<_, Book>(&format!(
        "SELECT {} FROM books b WHERE b.id = ANY($1) ORDER BY b.id FOR UPDATE",
        BOOK_COLUMNS
    ))
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;

    Ok(books)
}

/// Lock book rows by normalized ISBN
pub(crate) async fn lock_by_isbns(conn: &mut PgConnection, isbns: &[String]) -> AppResult<Vec<Book>> {
    let books = sqlx::query_as::<_, Book>(&format!(
        "SELECT {} FROM books b WHERE b.isbn = ANY($1) ORDER BY b.id FOR UPDATE",
        BOOK_COLUMNS
    ))
    .bind(isbns)
    .fetch_all(&mut *conn)
    .await?;

    Ok(books)
}

/// Title of the first book among `book_ids` held by an open loan, ignoring
/// the book-loan records in `exclude_records`
pub(crate) async fn first_unavailable(
    conn: &mut PgConnection,
    book_ids: &[i32],
    exclude_records: &[i32],
) -> AppResult<Option<String>> {
    let title = sqlx::query_scalar::<_, String>(
        r#"
        SELECT b.title FROM books b
        WHERE b.id = ANY($1)
          AND EXISTS (
              SELECT 1 FROM book_loans bl
              JOIN loans l ON l.id = bl.loan_id
              WHERE bl.book_id = b.id
                AND l.return_date IS NULL
                AND NOT (bl.id = ANY($2))
          )
        ORDER BY b.id
        LIMIT 1
        "#,
    )
    .bind(book_ids)
    .bind(exclude_records)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(title)
}

/// Fail with `BookNotAvailable` when one of `book_ids` is held by an open
/// loan outside `exclude_records`
pub(crate) async fn ensure_available(
    conn: &mut PgConnection,
    book_ids: &[i32],
    exclude_records: &[i32],
) -> AppResult<()> {
    match first_unavailable(conn, book_ids, exclude_records).await? {
        Some(title) => Err(AppError::BookNotAvailable(title)),
        None => Ok(()),
    }
}

/// Recompute `available` for the given books from their open loans
pub(crate) async fn refresh_availability(conn: &mut PgConnection, book_ids: &[i32]) -> AppResult<()> {
    if book_ids.is_empty() {
        return Ok(());
    }

    sqlx::query(
        r#"
        UPDATE books SET available = NOT EXISTS (
            SELECT 1 FROM book_loans bl
            JOIN loans l ON l.id = bl.loan_id
            WHERE bl.book_id = books.id AND l.return_date IS NULL
        )
        WHERE id = ANY($1)
        "#,
    )
    .bind(book_ids)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
