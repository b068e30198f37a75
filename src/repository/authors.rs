//! Authors repository for database operations

use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

use crate::{
    error::{AppError, AppResult},
    models::{
        author::{Author, AuthorBook, CreateAuthor, UpdateAuthor},
        book::NewBook,
    },
    search::escape_like,
};

use super::{books, books::BooksRepository, categories};

const AUTHOR_COLUMNS: &str = "id, first_name, last_name, biography, birth_date";

#[derive(Clone)]
pub struct AuthorsRepository {
    pool: Pool<Postgres>,
    books: BooksRepository,
}

impl AuthorsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: BooksRepository::new(pool.clone()),
            pool,
        }
    }

    /// List all authors with their books
    pub async fn list(&self) -> AppResult<Vec<Author>> {
        self.search(None, None).await
    }

    /// Get author by ID with books
    pub async fn get_by_id(&self, id: i32) -> AppResult<Author> {
        let author = sqlx::query_as::<_, Author>(&format!(
            "SELECT {} FROM authors WHERE id = $1",
            AUTHOR_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Author not found".to_string()))?;

        Ok(self.with_books(vec![author]).await?.remove(0))
    }

    /// Case-insensitive partial match on first and/or last name
    pub async fn search(
        &self,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> AppResult<Vec<Author>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM authors WHERE TRUE", AUTHOR_COLUMNS));

        if let Some(first_name) = first_name {
            builder.push(" AND LOWER(first_name) LIKE ");
            builder.push_bind(format!("%{}%", escape_like(&first_name.to_lowercase())));
            builder.push(" ESCAPE '\\'");
        }
        if let Some(last_name) = last_name {
            builder.push(" AND LOWER(last_name) LIKE ");
            builder.push_bind(format!("%{}%", escape_like(&last_name.to_lowercase())));
            builder.push(" ESCAPE '\\'");
        }
        builder.push(" ORDER BY last_name, first_name, id");

        let authors = builder
            .build_query_as::<Author>()
            .fetch_all(&self.pool)
            .await?;

        self.with_books(authors).await
    }

    /// Create an author, linking (and creating when missing) the given books
    pub async fn create(&self, author: &CreateAuthor) -> AppResult<i32> {
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO authors (first_name, last_name, biography, birth_date)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&author.first_name)
        .bind(&author.last_name)
        .bind(&author.biography)
        .bind(author.birth_date)
        .fetch_one(&mut *tx)
        .await?;

        link_books(&mut tx, id, &author.books).await?;

        tx.commit().await?;
        Ok(id)
    }

    /// Partial update; `books`, when present, replaces the author's books
    pub async fn update(&self, id: i32, author: &UpdateAuthor) -> AppResult<Author> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE authors SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                biography = COALESCE($4, biography),
                birth_date = COALESCE($5, birth_date)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&author.first_name)
        .bind(&author.last_name)
        .bind(&author.biography)
        .bind(author.birth_date)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound("Author not found".to_string()));
        }

        if let Some(ref books) = author.books {
            sqlx::query("DELETE FROM author_book WHERE author_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            link_books(&mut tx, id, books).await?;
        }

        tx.commit().await?;
        self.get_by_id(id).await
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM authors WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Author not found".to_string()));
        }
        Ok(())
    }

    async fn with_books(&self, mut authors: Vec<Author>) -> AppResult<Vec<Author>> {
        if authors.is_empty() {
            return Ok(authors);
        }

        let ids: Vec<i32> = authors.iter().map(|a| a.id).collect();
        let mut books = self.books.by_authors(&ids).await?;
        for author in &mut authors {
            author.books = Some(books.remove(&author.id).unwrap_or_default());
        }
        Ok(authors)
    }
}

async fn link_books(conn: &mut PgConnection, author_id: i32, books: &[AuthorBook]) -> AppResult<()> {
    for book in books {
        let book_id = find_or_create_book(conn, book).await?;
        sqlx::query(
            "INSERT INTO author_book (author_id, book_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(author_id)
        .bind(book_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Existing book with this exact title, or a new one built from the request
async fn find_or_create_book(conn: &mut PgConnection, book: &AuthorBook) -> AppResult<i32> {
    let existing: Option<i32> =
        sqlx::query_scalar("SELECT id FROM books WHERE title = $1 ORDER BY id LIMIT 1")
            .bind(&book.title)
            .fetch_optional(&mut *conn)
            .await?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let missing = |field: &str| {
        AppError::BadRequest(format!("{} is required to create book '{}'", field, book.title))
    };
    let isbn = book.isbn.as_deref().map(crate::isbn::normalize).ok_or_else(|| missing("ISBN"))?;
    let published_year = book.published_year.ok_or_else(|| missing("publishedYear"))?;
    let category = book.category.as_ref().ok_or_else(|| missing("category"))?;

    books::ensure_isbn_free(conn, &isbn, None).await?;
    let category_id =
        categories::find_or_create(conn, &category.name, category.description.as_deref()).await?;

    books::insert(
        conn,
        &NewBook {
            title: book.title.clone(),
            isbn,
            published_year,
            description: book.description.clone().unwrap_or_default(),
            image: book.image.clone().unwrap_or_default(),
            category_id,
        },
    )
    .await
}
