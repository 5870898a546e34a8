// ⚙️ Runtime configuration
//
// Settings come from CLI flags (see main.rs) or the environment, with a
// .env file loaded first via dotenvy.

use crate::geocode::DEFAULT_GEOCODER_URL;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DATABASE: &str = "advisers.db";
pub const ENV_DATABASE: &str = "ADVISER_DATABASE";
pub const ENV_GEOCODER_URL: &str = "GEOCODER_URL";

#[derive(Debug, Clone, PartialEq)]
pub struct ImportConfig {
    /// SQLite database file
    pub database: PathBuf,
    pub geocoder_url: String,
    pub geocoder_timeout: Duration,
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            database: PathBuf::from(DEFAULT_DATABASE),
            geocoder_url: DEFAULT_GEOCODER_URL.to_string(),
            geocoder_timeout: Duration::from_secs(10),
        }
    }
}

impl ImportConfig {
    /// Defaults overridden by ADVISER_DATABASE / GEOCODER_URL when set
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        ImportConfig {
            database: env::var(ENV_DATABASE)
                .map(PathBuf::from)
                .unwrap_or(defaults.database),
            geocoder_url: env::var(ENV_GEOCODER_URL).unwrap_or(defaults.geocoder_url),
            ..defaults
        }
    }
}
