//! Principal directory used to resolve who a token pair is issued to.

use async_trait::async_trait;

use crate::domain::entities::principal::Principal;
use crate::errors::DomainError;

/// Lookup of principals by id
///
/// The lifecycle manager never looks principals up itself; the issuing edge
/// resolves the principal and hands it over.
#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    /// Find a principal by id
    ///
    /// # Returns
    /// * `Ok(Some(Principal))` - Principal found
    /// * `Ok(None)` - No such principal
    /// * `Err(DomainError)` - Lookup failure
    async fn find_principal(&self, principal_id: &str) -> Result<Option<Principal>, DomainError>;
}
