use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub full_name: String,
    pub balance: Decimal, // cached, recomputed after every ledger mutation
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields needed to insert a user; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
}

/// One row per issued bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserSession {
    pub id: i64,
    pub user_id: i64,
    #[serde(skip_serializing)]
    pub token: String,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    pub is_valid: bool,
}

impl UserSession {
    /// A session is usable only while it has not been revoked and has not expired.
    pub fn is_usable_at(&self, now: OffsetDateTime) -> bool {
        self.is_valid && now < self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: i64,
    pub token: String,
    pub expires_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn session(is_valid: bool, expires_at: OffsetDateTime) -> UserSession {
        UserSession {
            id: 1,
            user_id: 1,
            token: "t".into(),
            created_at: OffsetDateTime::now_utc(),
            expires_at,
            is_valid,
        }
    }

    #[test]
    fn usable_only_when_valid_and_unexpired() {
        let now = OffsetDateTime::now_utc();
        assert!(session(true, now + Duration::hours(1)).is_usable_at(now));
        assert!(!session(false, now + Duration::hours(1)).is_usable_at(now));
        assert!(!session(true, now).is_usable_at(now));
        assert!(!session(true, now - Duration::seconds(1)).is_usable_at(now));
    }
}
