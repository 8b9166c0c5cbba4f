//! MySQL implementations of the core repository traits

mod principal_directory_impl;
mod session_store_impl;

pub use principal_directory_impl::MySqlPrincipalDirectory;
pub use session_store_impl::{is_transient_error_number, MySqlSessionStore};
