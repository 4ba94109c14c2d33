//! Service configuration loader for Parley.
//!
//! Reads an optional TOML file into [`ServiceConfig`], applies `PARLEY_*`
//! environment overrides and validates the result. A missing file yields
//! the defaults; a file that exists but cannot be read or parsed is an
//! error, so a typo never silently reverts the service to defaults.
//!
//! The provider credential is resolved separately by [`resolve_api_key`]
//! and never stored in the config struct.

use std::path::Path;

use secrecy::SecretString;

use parley_types::config::ServiceConfig;
use parley_types::error::ConfigError;

/// Config file used when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "parley.toml";

/// Environment variable holding the Gemini API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

pub const HOST_ENV: &str = "PARLEY_HOST";
pub const PORT_ENV: &str = "PARLEY_PORT";
pub const ALLOWED_ORIGINS_ENV: &str = "PARLEY_ALLOWED_ORIGINS";
pub const MODEL_ENV: &str = "PARLEY_MODEL";
pub const MODEL_BASE_URL_ENV: &str = "PARLEY_MODEL_BASE_URL";

/// Load configuration from `path`, the process environment, and defaults.
pub async fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let mut config = read_config_file(path).await?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Read and parse `path` without applying overrides.
///
/// - If the file does not exist, returns [`ServiceConfig::default()`].
/// - If the file exists but cannot be read or parsed, returns an error.
pub async fn read_config_file(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config file found at {}, using defaults", path.display());
            return Ok(ServiceConfig::default());
        }
        Err(err) => {
            return Err(ConfigError::Read {
                path: path.display().to_string(),
                source: err,
            });
        }
    };

    let config = toml::from_str::<ServiceConfig>(&content).map_err(|err| ConfigError::Parse {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    tracing::debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Apply `PARLEY_*` overrides read through `lookup`.
///
/// Blank values are ignored. Taking the lookup as a function keeps tests
/// away from the real process environment.
pub fn apply_env_overrides<F>(config: &mut ServiceConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(host) = get(HOST_ENV) {
        config.server.host = host;
    }
    if let Some(port) = get(PORT_ENV) {
        config.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
            field: PORT_ENV.to_string(),
            message: format!("'{port}' is not a valid port"),
        })?;
    }
    if let Some(origins) = get(ALLOWED_ORIGINS_ENV) {
        config.server.allowed_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(model) = get(MODEL_ENV) {
        config.model.name = model;
    }
    if let Some(base_url) = get(MODEL_BASE_URL_ENV) {
        config.model.base_url = base_url;
    }
    Ok(())
}

/// Read the provider credential through `lookup`.
///
/// Returns `None` when the variable is absent or blank; the service then
/// runs in its misconfigured state instead of refusing to start.
pub fn resolve_api_key<F>(lookup: F) -> Option<SecretString>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(API_KEY_ENV)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(SecretString::from)
}
