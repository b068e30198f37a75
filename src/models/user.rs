//! User model, JWT claims and role checks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::{dates, loan::Loan};
use crate::error::AppError;

pub const ROLE_USER: &str = "ROLE_USER";
pub const ROLE_ADMIN: &str = "ROLE_ADMIN";

/// Deduplicate roles and make sure every account holds `ROLE_USER`
pub fn normalize_roles(roles: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(roles.len() + 1);
    normalized.push(ROLE_USER.to_string());
    for role in roles {
        let role = role.trim().to_uppercase();
        if !role.is_empty() && !normalized.contains(&role) {
            normalized.push(role);
        }
    }
    normalized
}

fn validate_roles(roles: &[String]) -> Result<(), ValidationError> {
    if roles.iter().all(|r| r.trim().to_uppercase().starts_with("ROLE_")) {
        Ok(())
    } else {
        let mut err = ValidationError::new("roles");
        err.message = Some("Roles must start with ROLE_".into());
        Err(err)
    }
}

fn check_subscription(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<(), ValidationError> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => {
            let mut err = ValidationError::new("subscription");
            err.message = Some("Subscription end date precedes its start date".into());
            Err(err)
        }
        _ => Ok(()),
    }
}

/// Full user model from database
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i32,
    pub email: String,
    pub roles: Vec<String>,
    /// Hashed password (argon2)
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub user_name: String,
    pub phone_number: String,
    pub sub_start_date: DateTime<Utc>,
    pub sub_end_date: DateTime<Utc>,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loans: Option<Vec<Loan>>,
}

/// Columns written when inserting a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub roles: Vec<String>,
    pub password: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub user_name: String,
    pub phone_number: String,
    pub sub_start_date: DateTime<Utc>,
    pub sub_end_date: DateTime<Utc>,
}

/// Loan given inline when an administrator creates a user
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserLoan {
    #[serde(deserialize_with = "dates::datetime")]
    #[schema(value_type = String)]
    pub loan_date: DateTime<Utc>,
    #[serde(deserialize_with = "dates::datetime")]
    #[schema(value_type = String)]
    pub due_date: DateTime<Utc>,
    #[serde(default, deserialize_with = "dates::option_datetime")]
    #[schema(value_type = Option<String>)]
    pub return_date: Option<DateTime<Utc>>,
}

/// Self-service registration; accounts always start with `ROLE_USER` only
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_register_subscription"))]
pub struct RegisterUser {
    #[validate(email(message = "Invalid email format"), length(max = 180))]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(length(min = 1, max = 100))]
    pub user_name: String,
    #[validate(length(min = 1, max = 50))]
    pub phone_number: String,
    #[serde(deserialize_with = "dates::datetime")]
    #[schema(value_type = String)]
    pub sub_start_date: DateTime<Utc>,
    #[serde(deserialize_with = "dates::datetime")]
    #[schema(value_type = String)]
    pub sub_end_date: DateTime<Utc>,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

fn validate_register_subscription(user: &RegisterUser) -> Result<(), ValidationError> {
    check_subscription(Some(user.sub_start_date), Some(user.sub_end_date))
}

/// Create user request (administrators)
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_create_subscription"))]
pub struct CreateUser {
    #[validate(email(message = "Invalid email format"), length(max = 180))]
    pub email: String,
    #[validate(custom(function = "validate_roles"))]
    pub roles: Option<Vec<String>>,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(length(min = 1, max = 100))]
    pub user_name: String,
    #[validate(length(min = 1, max = 50))]
    pub phone_number: String,
    #[serde(deserialize_with = "dates::datetime")]
    #[schema(value_type = String)]
    pub sub_start_date: DateTime<Utc>,
    #[serde(deserialize_with = "dates::datetime")]
    #[schema(value_type = String)]
    pub sub_end_date: DateTime<Utc>,
    /// Accounts without a password cannot log in
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: Option<String>,
    #[serde(default)]
    pub loans: Vec<UserLoan>,
}

fn validate_create_subscription(user: &CreateUser) -> Result<(), ValidationError> {
    check_subscription(Some(user.sub_start_date), Some(user.sub_end_date))
}

/// Update user request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_update_subscription"))]
pub struct UpdateUser {
    #[validate(email(message = "Invalid email format"), length(max = 180))]
    pub email: Option<String>,
    #[validate(custom(function = "validate_roles"))]
    pub roles: Option<Vec<String>>,
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub user_name: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub phone_number: Option<String>,
    #[serde(default, deserialize_with = "dates::option_datetime")]
    #[schema(value_type = Option<String>)]
    pub sub_start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "dates::option_datetime")]
    #[schema(value_type = Option<String>)]
    pub sub_end_date: Option<DateTime<Utc>>,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: Option<String>,
}

fn validate_update_subscription(user: &UpdateUser) -> Result<(), ValidationError> {
    check_subscription(user.sub_start_date, user.sub_end_date)
}

/// Lookup by email
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct FindUserByEmail {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
}

/// Login request; either `email` or `username` identifies the account
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: String,
}

impl LoginRequest {
    pub fn login(&self) -> Option<&str> {
        self.email
            .as_deref()
            .or(self.username.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Login response
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    /// Token lifetime in seconds
    pub expires_in: i64,
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    /// Email address, the login identifier
    pub sub: String,
    pub user_id: i32,
    pub roles: Vec<String>,
    #[serde(rename = "userName")]
    pub user_name: String,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    pub exp: i64,
    pub iat: i64,
    /// Token id, used for revocation on logout
    pub jti: String,
}

impl UserClaims {
    pub fn for_user(user: &User, issued_at: i64, ttl_seconds: i64) -> Self {
        Self {
            sub: user.email.clone(),
            user_id: user.id,
            roles: normalize_roles(&user.roles),
            user_name: user.user_name.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            exp: issued_at + ttl_seconds,
            iat: issued_at,
            jti: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ROLE_ADMIN)
    }

    /// Require administrator privileges
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization("Administrator privileges required".to_string()))
        }
    }

    /// Users may act on their own account, administrators on any
    pub fn require_self_or_admin(&self, user_id: i32) -> Result<(), AppError> {
        if self.user_id == user_id || self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization("Access to another user's data denied".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_user(roles: &[&str]) -> User {
        User {
            id: 7,
            email: "ada@example.org".into(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            password: Some("$argon2id$secret".into()),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            user_name: "ada".into(),
            phone_number: "0102030405".into(),
            sub_start_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            sub_end_date: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            loans: None,
        }
    }

    #[test]
    fn test_normalize_roles() {
        let roles = vec!["role_admin".to_string(), "ROLE_USER".into(), "ROLE_ADMIN".into(), " ".into()];
        assert_eq!(normalize_roles(&roles), vec!["ROLE_USER", "ROLE_ADMIN"]);
        assert_eq!(normalize_roles(&[]), vec!["ROLE_USER"]);
    }

    #[test]
    fn test_password_is_never_serialized() {
        let json = serde_json::to_value(sample_user(&[ROLE_USER])).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["userName"], "ada");
        assert!(json.get("loans").is_none());
    }

    #[test]
    fn test_token_roundtrip_carries_profile() {
        let now = Utc::now().timestamp();
        let claims = UserClaims::for_user(&sample_user(&[ROLE_ADMIN]), now, 3600);
        let token = claims.create_token("secret").unwrap();

        let decoded = UserClaims::from_token(&token, "secret").unwrap();
        assert_eq!(decoded.sub, "ada@example.org");
        assert_eq!(decoded.user_name, "ada");
        assert_eq!(decoded.jti, claims.jti);
        assert!(decoded.is_admin());
        assert!(decoded.has_role(ROLE_USER));
    }

    #[test]
    fn test_token_rejected_with_wrong_secret_or_expired() {
        let now = Utc::now().timestamp();
        let claims = UserClaims::for_user(&sample_user(&[]), now, 3600);
        let token = claims.create_token("secret").unwrap();
        assert!(UserClaims::from_token(&token, "other").is_err());

        let expired = UserClaims::for_user(&sample_user(&[]), now - 7200, 3600);
        let token = expired.create_token("secret").unwrap();
        assert!(UserClaims::from_token(&token, "secret").is_err());
    }

    #[test]
    fn test_role_checks() {
        let now = Utc::now().timestamp();
        let reader = UserClaims::for_user(&sample_user(&[]), now, 60);
        assert!(reader.require_admin().is_err());
        assert!(reader.require_self_or_admin(7).is_ok());
        assert!(reader.require_self_or_admin(8).is_err());

        let admin = UserClaims::for_user(&sample_user(&[ROLE_ADMIN]), now, 60);
        assert!(admin.require_self_or_admin(8).is_ok());
    }

    #[test]
    fn test_register_validation() {
        let body = serde_json::json!({
            "email": "not-an-email",
            "firstName": "Ada",
            "lastName": "Lovelace",
            "userName": "ada",
            "phoneNumber": "0102",
            "subStartDate": "2024-01-01",
            "subEndDate": "2025-01-01",
            "password": "longenough"
        });
        let user: RegisterUser = serde_json::from_value(body.clone()).unwrap();
        assert!(user.validate().is_err());

        let mut ok = body.clone();
        ok["email"] = "ada@example.org".into();
        let user: RegisterUser = serde_json::from_value(ok.clone()).unwrap();
        assert!(user.validate().is_ok());

        let mut reversed = ok;
        reversed["subEndDate"] = "2023-01-01".into();
        let user: RegisterUser = serde_json::from_value(reversed).unwrap();
        assert!(user.validate().is_err());
    }

    #[test]
    fn test_login_accepts_email_or_username() {
        let by_email: LoginRequest =
            serde_json::from_str(r#"{"email": " ada@example.org ", "password": "x"}"#).unwrap();
        assert_eq!(by_email.login(), Some("ada@example.org"));

        let by_name: LoginRequest =
            serde_json::from_str(r#"{"username": "ada", "password": "x"}"#).unwrap();
        assert_eq!(by_name.login(), Some("ada"));

        let neither: LoginRequest = serde_json::from_str(r#"{"password": "x"}"#).unwrap();
        assert_eq!(neither.login(), None);
    }

    #[test]
    fn test_roles_must_be_prefixed() {
        let update = UpdateUser {
            roles: Some(vec!["ADMIN".into()]),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }
}
