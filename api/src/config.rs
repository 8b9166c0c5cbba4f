//! Server configuration loading

use anyhow::{bail, Result};
use tl_shared::config::AppConfig;

/// Loads `.env` (if present) and the application configuration from the environment
///
/// Fails when the configuration would start an unusable or unsafe server,
/// for example a production deployment still signing with the built-in secret.
pub fn load() -> Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env();
    if let Err(problems) = config.validate() {
        bail!("Invalid configuration: {}", problems.join("; "));
    }

    Ok(config)
}
