pub mod principal;
pub mod session;

pub use principal::{InMemoryPrincipalDirectory, PrincipalDirectory};
pub use session::{InMemorySessionStore, SessionRepository};
