//! Users repository for database operations

use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::user::{NewUser, UpdateUser, User, UserLoan},
};

use super::{books, loans::LoansRepository};

pub(crate) const USER_COLUMNS: &str = "id, email, roles, password, first_name, last_name, \
     user_name, phone_number, sub_start_date, sub_end_date";

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
    loans: LoansRepository,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            loans: LoansRepository::new(pool.clone()),
            pool,
        }
    }

    /// List users with their loans
    pub async fn list(&self) -> AppResult<Vec<User>> {
        let mut users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users ORDER BY last_name, first_name, id",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<i32> = users.iter().map(|u| u.id).collect();
        let mut loans = self.loans.by_users(&ids).await?;
        for user in &mut users {
            user.loans = Some(loans.remove(&user.id).unwrap_or_default());
        }

        Ok(users)
    }

    /// Get user by ID, without loans
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Get user by ID with loans
    pub async fn get_with_loans(&self, id: i32) -> AppResult<User> {
        let mut user = self.get_by_id(id).await?;
        user.loans = Some(self.loans.by_users(&[id]).await?.remove(&id).unwrap_or_default());
        Ok(user)
    }

    /// Get user by email (case-insensitive)
    pub async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Get user by email or user name, email taking precedence
    pub async fn get_by_login(&self, login: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {} FROM users
            WHERE LOWER(email) = LOWER($1) OR user_name = $1
            ORDER BY (LOWER(email) = LOWER($1)) DESC, id
            LIMIT 1
            "#,
            USER_COLUMNS
        ))
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Check if email already exists
    pub async fn email_exists(&self, email: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1) AND id IS DISTINCT FROM $2)",
        )
        .bind(email)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Create a user, with optional book-less loans
    pub async fn create(&self, user: &NewUser, loans: &[UserLoan]) -> AppResult<i32> {
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO users (
                email, roles, password, first_name, last_name,
                user_name, phone_number, sub_start_date, sub_end_date
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(&user.email)
        .bind(&user.roles)
        .bind(&user.password)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.user_name)
        .bind(&user.phone_number)
        .bind(user.sub_start_date)
        .bind(user.sub_end_date)
        .fetch_one(&mut *tx)
        .await?;

        for loan in loans {
            sqlx::query(
                "INSERT INTO loans (user_id, loan_date, due_date, return_date) VALUES ($1, $2, $3, $4)",
            )
            .bind(id)
            .bind(loan.loan_date)
            .bind(loan.due_date)
            .bind(loan.return_date)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(id)
    }

    /// Partial update; `password` is the already hashed value
    pub async fn update(
        &self,
        id: i32,
        user: &UpdateUser,
        password: Option<String>,
        roles: Option<Vec<String>>,
    ) -> AppResult<User> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                email = COALESCE($2, email),
                roles = COALESCE($3, roles),
                password = COALESCE($4, password),
                first_name = COALESCE($5, first_name),
                last_name = COALESCE($6, last_name),
                user_name = COALESCE($7, user_name),
                phone_number = COALESCE($8, phone_number),
                sub_start_date = COALESCE($9, sub_start_date),
                sub_end_date = COALESCE($10, sub_end_date)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&user.email)
        .bind(&roles)
        .bind(&password)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.user_name)
        .bind(&user.phone_number)
        .bind(user.sub_start_date)
        .bind(user.sub_end_date)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        self.get_by_id(id).await
    }

    /// Delete a user and their loans.
    ///
    /// Refused while the user has open loans unless `force` is set; books of
    /// removed loans become available again.
    pub async fn delete(&self, id: i32, force: bool) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<i32> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        let open_loans: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE user_id = $1 AND return_date IS NULL",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if open_loans > 0 && !force {
            return Err(AppError::StillReferenced(format!(
                "User has {} open loan(s). Use force=true to delete anyway.",
                open_loans
            )));
        }

        let loan_ids: Vec<i32> =
            sqlx::query_scalar("SELECT id FROM loans WHERE user_id = $1 ORDER BY id FOR UPDATE")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;

        let mut book_ids: Vec<i32> = sqlx::query_scalar(
            "SELECT book_id FROM book_loans WHERE loan_id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(&loan_ids)
        .fetch_all(&mut *tx)
        .await?;
        book_ids.sort_unstable();
        book_ids.dedup();
        books::lock(&mut tx, &book_ids).await?;

        // loans and their book_loans cascade
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        books::refresh_availability(&mut tx, &book_ids).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Number of accounts holding a role
    pub async fn count_with_role(&self, role: &str) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE $1 = ANY(roles)")
            .bind(role)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Keep a user from being deleted until the transaction ends
pub(crate) async fn lock_shared(conn: &mut PgConnection, id: i32) -> AppResult<()> {
    sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE id = $1 FOR KEY SHARE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}
