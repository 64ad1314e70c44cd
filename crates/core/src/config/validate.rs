use super::{types::Config, AuthMethod, ConfigError};

/// Validate cross-field rules serde cannot express
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.auth.method == AuthMethod::ApiKey {
        let has_key = config
            .auth
            .api_key
            .as_deref()
            .is_some_and(|k| !k.is_empty());
        if !has_key && config.auth.managers.is_empty() {
            return Err(ConfigError::ValidationError(
                "auth.method = \"api_key\" requires auth.api_key or auth.managers".to_string(),
            ));
        }
        if config.auth.managers.iter().any(|m| m.api_key.is_empty()) {
            return Err(ConfigError::ValidationError(
                "auth.managers entries need a non-empty api_key".to_string(),
            ));
        }
    }

    if config.sync.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "sync.timeout_secs must be greater than 0".to_string(),
        ));
    }

    if config.client.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "client.timeout_secs must be greater than 0".to_string(),
        ));
    }

    Ok(())
}
