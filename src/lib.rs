//! Timeless Library
//!
//! REST JSON backend for a small library: a catalog of authors, books and
//! categories, user accounts with JWT authentication, and loans whose books
//! are kept consistent with their availability.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod isbn;
pub mod models;
pub mod repository;
pub mod search;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
