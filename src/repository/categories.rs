//! Categories repository

use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::Book,
        category::{Category, CreateCategory, UpdateCategory},
    },
};

use super::books::BooksRepository;

#[derive(Clone)]
pub struct CategoriesRepository {
    pool: Pool<Postgres>,
    books: BooksRepository,
}

impl CategoriesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: BooksRepository::new(pool.clone()),
            pool,
        }
    }

    /// List categories with their books (and the books' authors)
    pub async fn list(&self) -> AppResult<Vec<Category>> {
        let mut categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, description FROM categories ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<i32> = categories.iter().map(|c| c.id).collect();
        let mut books = self.books.by_categories(&ids).await?;
        for category in &mut categories {
            category.books = Some(books.remove(&category.id).unwrap_or_default());
        }

        Ok(categories)
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Category> {
        let mut category = self.find(id).await?;
        category.books = Some(self.books.by_category(id).await?);
        Ok(category)
    }

    /// Books of a category; 404 when the category does not exist
    pub async fn books(&self, id: i32) -> AppResult<Vec<Book>> {
        self.find(id).await?;
        self.books.by_category(id).await
    }

    pub async fn create(&self, category: &CreateCategory) -> AppResult<i32> {
        let mut conn = self.pool.acquire().await?;
        ensure_name_free(&mut conn, &category.name, None).await?;
        insert(&mut conn, &category.name, &category.description).await
    }

    pub async fn update(&self, id: i32, category: &UpdateCategory) -> AppResult<Category> {
        let mut tx = self.pool.begin().await?;

        if let Some(ref name) = category.name {
            ensure_name_free(&mut tx, name, Some(id)).await?;
        }

        let updated = sqlx::query(
            r#"
            UPDATE categories SET
                name = COALESCE($2, name),
                description = COALESCE($3, description)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&category.name)
        .bind(&category.description)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound("Category not found".to_string()));
        }

        tx.commit().await?;
        self.find(id).await
    }

    /// Delete a category no book refers to
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.find(id).await?;

        let books: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books WHERE category_id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        if books > 0 {
            return Err(AppError::StillReferenced(format!(
                "Category is still used by {} book(s)",
                books
            )));
        }

        sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find(&self, id: i32) -> AppResult<Category> {
        sqlx::query_as::<_, Category>("SELECT id, name, description FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Category not found".to_string()))
    }
}

async fn ensure_name_free(conn: &mut PgConnection, name: &str, exclude_id: Option<i32>) -> AppResult<()> {
    let taken: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM categories WHERE name = $1 AND id IS DISTINCT FROM $2)",
    )
    .bind(name)
    .bind(exclude_id)
    .fetch_one(&mut *conn)
    .await?;

    if taken {
        Err(AppError::Conflict(format!("Category '{}' already exists", name)))
    } else {
        Ok(())
    }
}

async fn insert(conn: &mut PgConnection, name: &str, description: &str) -> AppResult<i32> {
    let id = sqlx::query_scalar::<_, i32>(
        "INSERT INTO categories (name, description) VALUES ($1, $2) RETURNING id",
    )
    .bind(name)
    .bind(description)
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

/// Category ID for `name`, created with `description` when unknown
pub(crate) async fn find_or_create(
    conn: &mut PgConnection,
    name: &str,
    description: Option<&str>,
) -> AppResult<i32> {
    let existing: Option<i32> = sqlx::query_scalar("SELECT id FROM categories WHERE name = $1")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

    match existing {
        Some(id) => Ok(id),
        None => insert(conn, name, description.unwrap_or_default()).await,
    }
}
