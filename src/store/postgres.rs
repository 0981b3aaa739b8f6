use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{RevocationRecord, RevocationStore, UserStore};
use crate::error::{AppError, DatabaseError};
use crate::user::User;

type UserRow = (i64, String, String, String, String, bool, String, bool, String);

// A user counts as a manager when flagged as one or when they manage
// anyone through an active reporting line.
const USER_COLUMNS: &str = r#"
    SELECT u.id, u.username, u.email, u.first_name, u.last_name,
           (u.is_manager OR EXISTS (
               SELECT 1 FROM hierarchy_reporting_line r
               WHERE r.manager_id = u.id AND r.is_active
           )) AS is_manager,
           u.role, u.is_active, u.password_hash
    FROM users u
"#;

fn into_user(row: UserRow) -> Result<User, AppError> {
    let (id, username, email, first_name, last_name, is_manager, role, is_active, password_hash) = row;
    let role = role
        .parse()
        .map_err(|e: String| DatabaseError::CorruptRecord(format!("user {}: {}", id, e)))?;

    Ok(User {
        id,
        username,
        email,
        first_name,
        last_name,
        is_manager,
        role,
        is_active,
        password_hash,
    })
}

fn timestamp(seconds: i64) -> Result<DateTime<Utc>, AppError> {
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| AppError::Internal(format!("timestamp out of range: {}", seconds)))
}

/// Users table reader
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{} WHERE u.id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(into_user).transpose()
    }

    async fn find_by_login(&self, identifier: &str) -> Result<Vec<User>, AppError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "{} WHERE LOWER(u.username) = LOWER($1) OR LOWER(u.email) = LOWER($1) ORDER BY u.id",
            USER_COLUMNS
        ))
        .bind(identifier)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(into_user).collect()
    }
}

/// `token_blacklist` table
#[derive(Clone)]
pub struct PgRevocationStore {
    pool: PgPool,
}

impl PgRevocationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RevocationStore for PgRevocationStore {
    async fn record(&self, record: RevocationRecord) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO token_blacklist (jti, user_id, expires_at, blacklisted_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (jti) DO NOTHING
            "#,
        )
        .bind(&record.jti)
        .bind(record.user_id)
        .bind(timestamp(record.expires_at)?)
        .bind(timestamp(record.revoked_at)?)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool, AppError> {
        let revoked = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM token_blacklist WHERE jti = $1)",
        )
        .bind(jti)
        .fetch_one(&self.pool)
        .await?;

        Ok(revoked)
    }

    async fn purge_expired(&self, now: i64) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM token_blacklist WHERE expires_at < $1")
            .bind(timestamp(now)?)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::Role;

    fn row(role: &str) -> UserRow {
        (
            3,
            "ann".to_string(),
            "ann@example.com".to_string(),
            "Ann".to_string(),
            "Lee".to_string(),
            true,
            role.to_string(),
            true,
            "$2b$04$hash".to_string(),
        )
    }

    #[test]
    fn test_row_mapping() {
        let user = into_user(row("finance")).unwrap();
        assert_eq!(user.id, 3);
        assert_eq!(user.role, Role::Finance);
        assert!(user.is_manager);
    }

    #[test]
    fn test_unknown_role_is_a_corrupt_record() {
        match into_user(row("wizard")) {
            Err(AppError::Database(DatabaseError::CorruptRecord(msg))) => {
                assert!(msg.contains("wizard"))
            }
            other => panic!("Expected corrupt record, got {:?}", other),
        }
    }

    #[test]
    fn test_timestamp_conversion() {
        assert_eq!(timestamp(0).unwrap().timestamp(), 0);
        assert!(timestamp(i64::MAX).is_err());
    }
}
