//! `parley config`: print the effective configuration.

use anyhow::Result;
use serde_json::Value;

use parley_types::config::ServiceConfig;

/// Render the config as pretty JSON, reporting the credential only as
/// present or absent.
pub fn render_config(config: &ServiceConfig, has_api_key: bool) -> Result<String> {
    let mut value = serde_json::to_value(config)?;
    if let Value::Object(map) = &mut value {
        map.insert(
            "api_key".to_string(),
            Value::String(if has_api_key { "present" } else { "absent" }.to_string()),
        );
    }
    Ok(serde_json::to_string_pretty(&value)?)
}

pub fn show_config(config: &ServiceConfig, has_api_key: bool) -> Result<()> {
    println!("{}", render_config(config, has_api_key)?);
    Ok(())
}
