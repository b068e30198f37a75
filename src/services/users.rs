//! Authentication and user management service

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};

use crate::{
    config::{AdminConfig, AuthConfig},
    error::{AppError, AppResult},
    models::user::{
        normalize_roles, CreateUser, LoginRequest, NewUser, RegisterUser, UpdateUser, User,
        UserClaims, ROLE_ADMIN, ROLE_USER,
    },
    repository::Repository,
};

use super::tokens::RevokedTokens;

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    config: AuthConfig,
    revoked: Arc<dyn RevokedTokens>,
}

impl UsersService {
    pub fn new(repository: Repository, config: AuthConfig, revoked: Arc<dyn RevokedTokens>) -> Self {
        Self {
            repository,
            config,
            revoked,
        }
    }

    /// Authenticate by email or user name and issue a JWT.
    /// Returns (token, lifetime in seconds).
    pub async fn login(&self, request: &LoginRequest) -> AppResult<(String, i64)> {
        let login = request
            .login()
            .ok_or_else(|| AppError::BadRequest("Email or username is required".to_string()))?;

        let user = self
            .repository
            .users
            .get_by_login(login)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid credentials".to_string()))?;

        if !verify_password(&user, &request.password)? {
            tracing::debug!("Failed login attempt for '{}'", login);
            return Err(AppError::Authentication("Invalid credentials".to_string()));
        }

        let ttl = self.token_ttl();
        let claims = UserClaims::for_user(&user, Utc::now().timestamp(), ttl);
        let token = claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;

        tracing::info!("User logged in: id={}", user.id);
        Ok((token, ttl))
    }

    /// Decode a bearer token and reject revoked ones
    pub async fn authenticate(&self, token: &str) -> AppResult<UserClaims> {
        let claims = UserClaims::from_token(token, &self.config.jwt_secret)
            .map_err(|e| AppError::Authentication(format!("Invalid token: {}", e)))?;

        if self.revoked.is_revoked(&claims.jti).await? {
            return Err(AppError::Authentication("Token has been revoked".to_string()));
        }

        Ok(claims)
    }

    /// Revoke the presented token
    pub async fn logout(&self, claims: &UserClaims) -> AppResult<()> {
        self.revoked.revoke(&claims.jti, claims.exp).await?;
        tracing::info!("User logged out: id={}", claims.user_id);
        Ok(())
    }

    /// Self-service account creation, always as a plain user
    pub async fn register(&self, user: RegisterUser) -> AppResult<User> {
        self.ensure_email_free(&user.email, None).await?;

        let new_user = NewUser {
            email: user.email.trim().to_string(),
            roles: vec![ROLE_USER.to_string()],
            password: Some(hash_password(&user.password)?),
            first_name: user.first_name,
            last_name: user.last_name,
            user_name: user.user_name,
            phone_number: user.phone_number,
            sub_start_date: user.sub_start_date,
            sub_end_date: user.sub_end_date,
        };

        let id = self.repository.users.create(&new_user, &[]).await?;
        tracing::info!("User registered: id={}", id);
        self.repository.users.get_by_id(id).await
    }

    pub async fn list(&self) -> AppResult<Vec<User>> {
        self.repository.users.list().await
    }

    pub async fn get(&self, id: i32) -> AppResult<User> {
        self.repository.users.get_with_loans(id).await
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<User> {
        let user = self
            .repository
            .users
            .get_by_email(email.trim())
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        self.repository.users.get_with_loans(user.id).await
    }

    /// Create a user (administrators)
    pub async fn create(&self, user: CreateUser) -> AppResult<User> {
        self.ensure_email_free(&user.email, None).await?;

        let password = user.password.as_deref().map(hash_password).transpose()?;
        let new_user = NewUser {
            email: user.email.trim().to_string(),
            roles: normalize_roles(user.roles.as_deref().unwrap_or_default()),
            password,
            first_name: user.first_name,
            last_name: user.last_name,
            user_name: user.user_name,
            phone_number: user.phone_number,
            sub_start_date: user.sub_start_date,
            sub_end_date: user.sub_end_date,
        };

        let id = self.repository.users.create(&new_user, &user.loans).await?;
        tracing::info!(
            "User created: id={} roles={:?} loans={}",
            id,
            new_user.roles,
            user.loans.len()
        );
        self.repository.users.get_with_loans(id).await
    }

    /// Update a user; roles may only be changed by administrators
    pub async fn update(&self, id: i32, user: UpdateUser, by_admin: bool) -> AppResult<User> {
        if user.roles.is_some() && !by_admin {
            return Err(AppError::Authorization(
                "Only administrators can change roles".to_string(),
            ));
        }
        if let Some(ref email) = user.email {
            self.ensure_email_free(email, Some(id)).await?;
        }

        let password = user.password.as_deref().map(hash_password).transpose()?;
        let roles = user.roles.as_deref().map(normalize_roles);

        let updated = self.repository.users.update(id, &user, password, roles).await?;
        tracing::info!("User updated: id={}", id);
        Ok(updated)
    }

    pub async fn delete(&self, id: i32, force: bool) -> AppResult<()> {
        self.repository.users.delete(id, force).await?;
        tracing::info!("User deleted: id={} (force={})", id, force);
        Ok(())
    }

    /// Create the configured administrator account when it is missing
    pub async fn ensure_admin(&self, admin: &AdminConfig) -> AppResult<()> {
        let (Some(email), Some(password)) = (admin.email.as_deref(), admin.password.as_deref())
        else {
            if self.repository.users.count_with_role(ROLE_ADMIN).await? == 0 {
                tracing::warn!("No administrator account exists and none is configured");
            }
            return Ok(());
        };

        if self.repository.users.get_by_email(email).await?.is_some() {
            return Ok(());
        }

        let now = Utc::now();
        let admin_user = NewUser {
            email: email.to_string(),
            roles: normalize_roles(&[ROLE_ADMIN.to_string()]),
            password: Some(hash_password(password)?),
            first_name: "Admin".to_string(),
            last_name: "Admin".to_string(),
            user_name: "admin".to_string(),
            phone_number: String::new(),
            sub_start_date: now,
            sub_end_date: now + Duration::days(365 * 100),
        };

        let id = self.repository.users.create(&admin_user, &[]).await?;
        tracing::info!("Administrator account created: id={} email={}", id, email);
        Ok(())
    }

    fn token_ttl(&self) -> i64 {
        self.config.jwt_expiration_hours as i64 * 3600
    }

    async fn ensure_email_free(&self, email: &str, exclude_id: Option<i32>) -> AppResult<()> {
        if self.repository.users.email_exists(email.trim(), exclude_id).await? {
            Err(AppError::Conflict(format!("Email '{}' is already in use", email.trim())))
        } else {
            Ok(())
        }
    }
}

/// Verify user password
fn verify_password(user: &User, password: &str) -> AppResult<bool> {
    // accounts without a password cannot log in
    let Some(ref hash) = user.password else {
        return Ok(false);
    };

    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}
