//! Business logic services

pub mod catalog;
pub mod loans;
pub mod redis;
pub mod tokens;
pub mod users;

use std::sync::Arc;

use crate::{config::AuthConfig, error::AppResult, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub users: users::UsersService,
    pub loans: loans::LoansService,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository and revoked token store
    pub fn new(
        repository: Repository,
        auth_config: AuthConfig,
        revoked: Arc<dyn tokens::RevokedTokens>,
    ) -> Self {
        Self {
            catalog: catalog::CatalogService::new(repository.clone()),
            users: users::UsersService::new(repository.clone(), auth_config, revoked),
            loans: loans::LoansService::new(repository.clone()),
            repository,
        }
    }

    /// Check database connectivity
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.ping().await
    }
}
