//! Fixed in-memory principal directory.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::r#trait::PrincipalDirectory;
use crate::domain::entities::principal::Principal;
use crate::errors::DomainError;

/// Principal directory for development and tests
#[derive(Default)]
pub struct InMemoryPrincipalDirectory {
    principals: RwLock<HashMap<String, Principal>>,
}

impl InMemoryPrincipalDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a directory pre-populated with `principals`
    pub fn with_principals(principals: impl IntoIterator<Item = Principal>) -> Self {
        let map = principals
            .into_iter()
            .map(|principal| (principal.id.clone(), principal))
            .collect();
        Self {
            principals: RwLock::new(map),
        }
    }

    /// Adds or replaces a principal
    pub async fn insert(&self, principal: Principal) {
        self.principals
            .write()
            .await
            .insert(principal.id.clone(), principal);
    }
}

#[async_trait]
impl PrincipalDirectory for InMemoryPrincipalDirectory {
    async fn find_principal(&self, principal_id: &str) -> Result<Option<Principal>, DomainError> {
        Ok(self.principals.read().await.get(principal_id).cloned())
    }
}
