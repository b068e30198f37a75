//! Catalog management service: authors, books and categories

use chrono::Utc;

use crate::{
    error::{AppError, AppResult},
    models::{
        author::{Author, AuthorQuery, CreateAuthor, UpdateAuthor},
        book::{Book, BookSearchQuery, CreateBook, RecentBooksQuery, UpdateBook},
        category::{Category, CreateCategory, UpdateCategory},
    },
    repository::Repository,
    search::SearchTerms,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    // Authors

    pub async fn list_authors(&self) -> AppResult<Vec<Author>> {
        self.repository.authors.list().await
    }

    pub async fn get_author(&self, id: i32) -> AppResult<Author> {
        self.repository.authors.get_by_id(id).await
    }

    pub async fn search_authors(&self, query: &AuthorQuery) -> AppResult<Vec<Author>> {
        let (first_name, last_name) = query.normalized();
        self.repository.authors.search(first_name, last_name).await
    }

    pub async fn create_author(&self, author: CreateAuthor) -> AppResult<i32> {
        let id = self.repository.authors.create(&author).await?;
        tracing::info!(
            "Author created: id={} ({} {}), {} book(s) linked",
            id,
            author.first_name,
            author.last_name,
            author.books.len()
        );
        Ok(id)
    }

    pub async fn update_author(&self, id: i32, author: UpdateAuthor) -> AppResult<Author> {
        let updated = self.repository.authors.update(id, &author).await?;
        tracing::info!("Author updated: id={}", id);
        Ok(updated)
    }

    pub async fn delete_author(&self, id: i32) -> AppResult<()> {
        self.repository.authors.delete(id).await?;
        tracing::info!("Author deleted: id={}", id);
        Ok(())
    }

    // Books

    pub async fn list_books(&self) -> AppResult<Vec<Book>> {
        self.repository.books.list().await
    }

    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    /// Ranked title search
    pub async fn search_books(&self, query: &BookSearchQuery) -> AppResult<Vec<Book>> {
        let terms = SearchTerms::parse(&query.q)
            .ok_or_else(|| AppError::BadRequest("Search query must not be empty".to_string()))?;

        self.repository.books.search(&terms, query.limit()).await
    }

    /// Recently published books, newest first: (books, total, page, per_page)
    pub async fn recent_books(&self, query: &RecentBooksQuery) -> AppResult<(Vec<Book>, i64, i64, i64)> {
        let since = query.window_start(Utc::now().date_naive());
        let (page, per_page) = (query.page(), query.per_page());

        let (books, total) = self
            .repository
            .books
            .recent(since, per_page, query.offset())
            .await?;
        Ok((books, total, page, per_page))
    }

    pub async fn create_book(&self, book: CreateBook) -> AppResult<i32> {
        let id = self.repository.books.create(&book).await?;
        tracing::info!("Book created: id={} '{}'", id, book.title);
        Ok(id)
    }

    pub async fn update_book(&self, id: i32, book: UpdateBook) -> AppResult<()> {
        self.repository.books.update(id, &book).await?;
        tracing::info!("Book updated: id={}", id);
        Ok(())
    }

    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        self.repository.books.delete(id).await?;
        tracing::info!("Book deleted: id={}", id);
        Ok(())
    }

    // Categories

    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        self.repository.categories.list().await
    }

    pub async fn get_category(&self, id: i32) -> AppResult<Category> {
        self.repository.categories.get_by_id(id).await
    }

    pub async fn category_books(&self, id: i32) -> AppResult<Vec<Book>> {
        self.repository.categories.books(id).await
    }

    pub async fn create_category(&self, category: CreateCategory) -> AppResult<i32> {
        let id = self.repository.categories.create(&category).await?;
        tracing::info!("Category created: id={} '{}'", id, category.name);
        Ok(id)
    }

    pub async fn update_category(&self, id: i32, category: UpdateCategory) -> AppResult<Category> {
        let updated = self.repository.categories.update(id, &category).await?;
        tracing::info!("Category updated: id={}", id);
        Ok(updated)
    }

    pub async fn delete_category(&self, id: i32) -> AppResult<()> {
        self.repository.categories.delete(id).await?;
        tracing::info!("Category deleted: id={}", id);
        Ok(())
    }
}
