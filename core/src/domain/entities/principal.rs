//! Identity snapshot embedded in tokens.

use serde::{Deserialize, Serialize};

/// The authenticated identity a token pair is issued for
///
/// The snapshot is taken at issuance time and is not re-fetched on
/// verification; changes to the underlying user record become visible
/// once the lineage is re-issued.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    /// Stable principal identifier
    pub id: String,

    /// Contact email at issuance time
    pub email: String,

    /// Role at issuance time
    pub role: String,
}

impl Principal {
    /// Creates a new principal snapshot
    pub fn new(id: impl Into<String>, email: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            role: role.into(),
        }
    }
}
