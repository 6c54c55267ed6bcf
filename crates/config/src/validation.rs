//! Configuration validation
//!
//! Checks cross-field constraints serde cannot express:
//! - Sender batch size is positive and fits in the offline retention
//! - Endpoint is an absolute http(s) URL
//! - Server key column and payload limit are usable

use crate::Config;
use crate::client::ClientConfig;
use crate::error::{ConfigError, Result};
use crate::server::ServerConfig;

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_client(&config.client)?;
    validate_server(&config.server)?;
    Ok(())
}

fn validate_client(client: &ClientConfig) -> Result<()> {
    if client.batch_size == 0 {
        return Err(ConfigError::invalid_value(
            "client",
            "batch_size",
            "must be at least 1",
        ));
    }
    if client.max_offline_saved_events < client.batch_size {
        return Err(ConfigError::invalid_value(
            "client",
            "max_offline_saved_events",
            format!(
                "{} is below batch_size {}",
                client.max_offline_saved_events, client.batch_size
            ),
        ));
    }

    let endpoint = client.endpoint.to_ascii_lowercase();
    let has_host = ["http://", "https://"]
        .iter()
        .find_map(|scheme| endpoint.strip_prefix(scheme))
        .is_some_and(|rest| !rest.is_empty() && !rest.starts_with('/'));
    if !has_host {
        return Err(ConfigError::invalid_value(
            "client",
            "endpoint",
            format!("'{}' is not an absolute http(s) URL", client.endpoint),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<()> {
    if server.primary_key_column.trim().is_empty() {
        return Err(ConfigError::invalid_value(
            "server",
            "primary_key_column",
            "must not be empty",
        ));
    }
    if server.max_payload_size == 0 {
        return Err(ConfigError::invalid_value(
            "server",
            "max_payload_size",
            "must be at least 1",
        ));
    }
    if server.table_name_properties.iter().any(|p| p.is_empty()) {
        return Err(ConfigError::invalid_value(
            "server",
            "table_name_properties",
            "entries must not be empty",
        ));
    }
    Ok(())
}
