//! Domain entities representing principals, signing keys, tokens and session lineages.

pub mod key;
pub mod principal;
pub mod session;
pub mod token;

// Re-export commonly used types
pub use key::KeyMaterial;
pub use principal::Principal;
pub use session::{SessionRecord, SessionStatus};
pub use token::{Claims, TokenPair, TokenType, BEARER_TOKEN_TYPE};
