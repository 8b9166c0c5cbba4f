//! MySQL implementation of the PrincipalDirectory trait.

use async_trait::async_trait;
use sqlx::{MySqlPool, Row};

use tl_core::domain::entities::principal::Principal;
use tl_core::errors::DomainError;
use tl_core::repositories::PrincipalDirectory;

/// Principal lookup over the `users` table (`id`, `email`, `role`)
pub struct MySqlPrincipalDirectory {
    /// Database connection pool
    pool: MySqlPool,
}

impl MySqlPrincipalDirectory {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PrincipalDirectory for MySqlPrincipalDirectory {
    async fn find_principal(&self, principal_id: &str) -> Result<Option<Principal>, DomainError> {
        let row = sqlx::query("SELECT id, email, role FROM users WHERE id = ? LIMIT 1")
            .bind(principal_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::Internal {
                message: format!("Failed to find principal: {}", e),
            })?;

        let Some(row) = row else {
            return Ok(None);
        };

        let get = |column: &str| -> Result<String, DomainError> {
            row.try_get::<String, _>(column)
                .map_err(|e| DomainError::Internal {
                    message: format!("Failed to get {}: {}", column, e),
                })
        };

        Ok(Some(Principal::new(get("id")?, get("email")?, get("role")?)))
    }
}
