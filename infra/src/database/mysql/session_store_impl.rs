//! MySQL implementation of the SessionRepository trait.
//!
//! Each refresh lineage is one row in `token_families`. Sequence advancement
//! is a single conditional `UPDATE`, so the database row lock is the only
//! serialization point and unrelated families never wait on each other.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::mysql::{MySqlDatabaseError, MySqlRow};
use sqlx::{MySqlPool, Row};
use std::sync::Arc;
use uuid::Uuid;

use tl_core::domain::entities::session::{SessionRecord, SessionStatus};
use tl_core::errors::SessionError;
use tl_core::repositories::SessionRepository;
use tl_core::services::clock::{Clock, SystemClock};

/// Deadlock found when trying to get lock
const ER_LOCK_DEADLOCK: u16 = 1213;
/// Lock wait timeout exceeded
const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS token_families (
        family_id CHAR(36) NOT NULL PRIMARY KEY,
        principal_id VARCHAR(255) NOT NULL,
        current_sequence BIGINT UNSIGNED NOT NULL DEFAULT 0,
        status VARCHAR(16) NOT NULL DEFAULT 'active',
        created_at DATETIME(6) NOT NULL,
        last_rotated_at DATETIME(6) NOT NULL,
        revoked_at DATETIME(6) NULL,
        INDEX idx_token_families_principal (principal_id, status),
        INDEX idx_token_families_last_rotated (last_rotated_at)
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
"#;

/// Whether a MySQL error number denotes a transient lock conflict
pub fn is_transient_error_number(number: u16) -> bool {
    matches!(number, ER_LOCK_DEADLOCK | ER_LOCK_WAIT_TIMEOUT)
}

/// Map a SQLx error to a session store error
///
/// Lock conflicts become `Contention` so the caller retries them; everything
/// else is a storage failure.
fn map_sqlx_error(context: &str, e: sqlx::Error) -> SessionError {
    if let sqlx::Error::Database(db) = &e {
        if let Some(mysql) = db.try_downcast_ref::<MySqlDatabaseError>() {
            if is_transient_error_number(mysql.number()) {
                tracing::debug!("{}: transient lock conflict ({})", context, mysql.number());
                return SessionError::Contention;
            }
        }
    }
    SessionError::Storage {
        message: format!("{}: {}", context, e),
    }
}

/// MySQL implementation of SessionRepository
pub struct MySqlSessionStore {
    /// Database connection pool
    pool: MySqlPool,
    /// Time source for row timestamps
    clock: Arc<dyn Clock>,
}

impl MySqlSessionStore {
    /// Create a new MySQL session store
    ///
    /// # Arguments
    /// * `pool` - MySQL connection pool from SQLx
    pub fn new(pool: MySqlPool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    /// Create a store stamping rows with `clock`
    pub fn with_clock(pool: MySqlPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Create the `token_families` table if it does not exist
    pub async fn ensure_schema(&self) -> Result<(), SessionError> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to create token_families table", e))?;
        Ok(())
    }

    /// Convert database row to SessionRecord entity
    fn row_to_record(row: &MySqlRow) -> Result<SessionRecord, SessionError> {
        let storage = |field: &str, e: &dyn std::fmt::Display| SessionError::Storage {
            message: format!("Failed to get {}: {}", field, e),
        };

        let family_id: String = row.try_get("family_id").map_err(|e| storage("family_id", &e))?;
        let status: String = row.try_get("status").map_err(|e| storage("status", &e))?;

        Ok(SessionRecord {
            family_id: Uuid::parse_str(&family_id).map_err(|e| storage("family_id", &e))?,
            principal_id: row
                .try_get("principal_id")
                .map_err(|e| storage("principal_id", &e))?,
            current_sequence: row
                .try_get::<u64, _>("current_sequence")
                .map_err(|e| storage("current_sequence", &e))?,
            status: status
                .parse::<SessionStatus>()
                .map_err(|e| storage("status", &e))?,
            created_at: row
                .try_get::<DateTime<Utc>, _>("created_at")
                .map_err(|e| storage("created_at", &e))?,
            last_rotated_at: row
                .try_get::<DateTime<Utc>, _>("last_rotated_at")
                .map_err(|e| storage("last_rotated_at", &e))?,
            revoked_at: row
                .try_get::<Option<DateTime<Utc>>, _>("revoked_at")
                .map_err(|e| storage("revoked_at", &e))?,
        })
    }
}

#[async_trait]
impl SessionRepository for MySqlSessionStore {
    async fn create_family(&self, principal_id: &str) -> Result<Uuid, SessionError> {
        let record = SessionRecord::new(Uuid::new_v4(), principal_id, self.clock.now());

        let query = r#"
            INSERT INTO token_families (
                family_id, principal_id, current_sequence, status, created_at, last_rotated_at
            ) VALUES (?, ?, ?, ?, ?, ?)
        "#;

        sqlx::query(query)
            .bind(record.family_id.to_string())
            .bind(&record.principal_id)
            .bind(record.current_sequence)
            .bind(record.status.as_str())
            .bind(record.created_at)
            .bind(record.last_rotated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to create token family", e))?;

        Ok(record.family_id)
    }

    async fn advance(&self, family_id: Uuid, expected_sequence: u64) -> Result<u64, SessionError> {
        let query = r#"
            UPDATE token_families
            SET current_sequence = current_sequence + 1, last_rotated_at = ?
            WHERE family_id = ? AND current_sequence = ? AND status = 'active'
        "#;

        let result = sqlx::query(query)
            .bind(self.clock.now())
            .bind(family_id.to_string())
            .bind(expected_sequence)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to advance token family", e))?;

        if result.rows_affected() == 1 {
            return Ok(expected_sequence + 1);
        }

        // Nothing matched: find out why. A failed UPDATE changes no row, so a
        // request dropped here leaves the lineage as it was.
        match self.find(family_id).await? {
            None => Err(SessionError::NotFound),
            Some(record) if !record.is_active() => Err(SessionError::FamilyRevoked),
            Some(_) => Err(SessionError::SequenceMismatch),
        }
    }

    async fn revoke(&self, family_id: Uuid) -> Result<bool, SessionError> {
        let query = r#"
            UPDATE token_families
            SET status = 'revoked', revoked_at = ?
            WHERE family_id = ? AND status = 'active'
        "#;

        let result = sqlx::query(query)
            .bind(self.clock.now())
            .bind(family_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to revoke token family", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_active(&self, family_id: Uuid) -> Result<bool, SessionError> {
        let row = sqlx::query("SELECT status FROM token_families WHERE family_id = ? LIMIT 1")
            .bind(family_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to check token family", e))?;

        match row {
            Some(row) => {
                let status: String = row.try_get("status").map_err(|e| SessionError::Storage {
                    message: format!("Failed to get status: {}", e),
                })?;
                Ok(status == SessionStatus::Active.as_str())
            }
            None => Ok(false),
        }
    }

    async fn find(&self, family_id: Uuid) -> Result<Option<SessionRecord>, SessionError> {
        let query = r#"
            SELECT family_id, principal_id, current_sequence, status,
                   created_at, last_rotated_at, revoked_at
            FROM token_families
            WHERE family_id = ?
            LIMIT 1
        "#;

        let result = sqlx::query(query)
            .bind(family_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to find token family", e))?;

        match result {
            Some(row) => Ok(Some(Self::row_to_record(&row)?)),
            None => Ok(None),
        }
    }

    async fn revoke_principal(&self, principal_id: &str) -> Result<usize, SessionError> {
        let query = r#"
            UPDATE token_families
            SET status = 'revoked', revoked_at = ?
            WHERE principal_id = ? AND status = 'active'
        "#;

        let result = sqlx::query(query)
            .bind(self.clock.now())
            .bind(principal_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to revoke principal token families", e))?;

        Ok(result.rows_affected() as usize)
    }

    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<usize, SessionError> {
        let result = sqlx::query("DELETE FROM token_families WHERE last_rotated_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to purge stale token families", e))?;

        Ok(result.rows_affected() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_conflicts_are_transient() {
        assert!(is_transient_error_number(1213));
        assert!(is_transient_error_number(1205));
        assert!(!is_transient_error_number(1062)); // duplicate entry
        assert!(!is_transient_error_number(1146)); // no such table
    }

    #[test]
    fn test_non_database_errors_are_storage_failures() {
        let err = map_sqlx_error("Failed to advance token family", sqlx::Error::PoolTimedOut);
        assert!(matches!(err, SessionError::Storage { .. }));
        assert!(!err.is_retryable());
    }
}
