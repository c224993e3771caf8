use std::env;
use std::path::PathBuf;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    /// Path to the operator-authored interface definition TOML.
    pub interface_config: PathBuf,
    /// Telemetry endpoint; unset disables the upload entirely.
    pub telemetry_endpoint: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            interface_config: env::var("INTERFACE_CONFIG")
                .unwrap_or_else(|_| "interface.toml".to_string())
                .into(),
            telemetry_endpoint: env::var("TELEMETRY_ENDPOINT").ok(),
        })
    }
}
