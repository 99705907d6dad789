use anyhow::Context;
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::{
    auth::repo_types::{NewSession, NewUser, User, UserSession},
    db::PgStore,
};

/// Credential store: owns user rows, including the cached balance.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_active_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_user_by_id(&self, user_id: i64) -> anyhow::Result<Option<User>>;
    /// Returns `None` when the email is already taken.
    async fn create_user(&self, new: NewUser) -> anyhow::Result<Option<User>>;
    /// Returns `false` when no such user exists.
    async fn set_balance(&self, user_id: i64, balance: Decimal) -> anyhow::Result<bool>;
}

/// Session store: one row per issued token.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, new: NewSession) -> anyhow::Result<UserSession>;
    async fn find_session(&self, user_id: i64, token: &str) -> anyhow::Result<Option<UserSession>>;
    async fn find_session_by_token(&self, token: &str) -> anyhow::Result<Option<UserSession>>;
    async fn update_session(&self, session: &UserSession) -> anyhow::Result<()>;
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, full_name, balance, is_active, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn find_active_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, full_name, balance, is_active, created_at, updated_at
            FROM users
            WHERE email = $1 AND is_active
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find active user by email")?;
        Ok(user)
    }

    async fn find_user_by_id(&self, user_id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, full_name, balance, is_active, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn create_user(&self, new: NewUser) -> anyhow::Result<Option<User>> {
        // The unique constraint settles concurrent registrations for one email.
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, full_name, balance, is_active)
            VALUES ($1, $2, $3, 0, TRUE)
            ON CONFLICT (email) DO NOTHING
            RETURNING id, email, password_hash, full_name, balance, is_active, created_at, updated_at
            "#,
        )
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.full_name)
        .fetch_optional(&self.db)
        .await
        .context("insert user")?;
        Ok(user)
    }

    async fn set_balance(&self, user_id: i64, balance: Decimal) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET balance = $2, updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(balance)
        .execute(&self.db)
        .await
        .context("update user balance")?;
        Ok(res.rows_affected() == 1)
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn create_session(&self, new: NewSession) -> anyhow::Result<UserSession> {
        let session = sqlx::query_as::<_, UserSession>(
            r#"
            INSERT INTO user_sessions (user_id, token, expires_at, is_valid)
            VALUES ($1, $2, $3, TRUE)
            RETURNING id, user_id, token, created_at, expires_at, is_valid
            "#,
        )
        .bind(new.user_id)
        .bind(&new.token)
        .bind(new.expires_at)
        .fetch_one(&self.db)
        .await
        .context("insert session")?;
        Ok(session)
    }

    async fn find_session(&self, user_id: i64, token: &str) -> anyhow::Result<Option<UserSession>> {
        let session = sqlx::query_as::<_, UserSession>(
            r#"
            SELECT id, user_id, token, created_at, expires_at, is_valid
            FROM user_sessions
            WHERE md5(token) = md5($2) AND token = $2 AND user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(token)
        .fetch_optional(&self.db)
        .await
        .context("find session")?;
        Ok(session)
    }

    async fn find_session_by_token(&self, token: &str) -> anyhow::Result<Option<UserSession>> {
        let session = sqlx::query_as::<_, UserSession>(
            r#"
            SELECT id, user_id, token, created_at, expires_at, is_valid
            FROM user_sessions
            WHERE md5(token) = md5($1) AND token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await
        .context("find session by token")?;
        Ok(session)
    }

    async fn update_session(&self, session: &UserSession) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE user_sessions
               SET is_valid = $3, expires_at = $4
             WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(session.is_valid)
        .bind(session.expires_at)
        .execute(&self.db)
        .await
        .context("update session")?;
        Ok(())
    }
}
