mod api_key;
mod none;
mod traits;
mod types;

pub use api_key::*;
pub use none::*;
pub use traits::*;
pub use types::*;

use crate::config::{AuthConfig, AuthMethod, ManagerKey};

/// Build the authenticator selected by `[auth]`
pub fn create_authenticator(config: &AuthConfig) -> Result<Box<dyn Authenticator>, AuthError> {
    match config.method {
        AuthMethod::None => Ok(Box::new(NoneAuthenticator::new())),
        AuthMethod::ApiKey => {
            let mut managers = Vec::new();
            if let Some(key) = config.api_key.as_ref().filter(|k| !k.is_empty()) {
                managers.push(ManagerKey {
                    name: config.manager_name.clone(),
                    api_key: key.clone(),
                });
            }
            managers.extend(config.managers.iter().cloned());

            if managers.is_empty() {
                return Err(AuthError::ConfigurationError(
                    "api_key auth needs auth.api_key or at least one auth.managers entry"
                        .to_string(),
                ));
            }
            Ok(Box::new(ApiKeyAuthenticator::with_managers(managers)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_authenticator_none() {
        let auth = create_authenticator(&AuthConfig::default()).unwrap();
        assert_eq!(auth.method_name(), "none");
    }

    #[tokio::test]
    async fn test_create_authenticator_merges_keys() {
        let config = AuthConfig {
            method: AuthMethod::ApiKey,
            api_key: Some("shared".to_string()),
            manager_name: "lead".to_string(),
            managers: vec![ManagerKey {
                name: "alice".to_string(),
                api_key: "k-alice".to_string(),
            }],
        };
        let auth = create_authenticator(&config).unwrap();
        assert_eq!(auth.method_name(), "api_key");

        let request = AuthRequest {
            headers: [("x-api-key".to_string(), "shared".to_string())].into(),
            source_ip: "127.0.0.1".parse().unwrap(),
        };
        assert_eq!(auth.authenticate(&request).await.unwrap().user_id, "lead");
    }

    #[test]
    fn test_create_authenticator_api_key_missing_key() {
        let config = AuthConfig {
            method: AuthMethod::ApiKey,
            ..AuthConfig::default()
        };
        let result = create_authenticator(&config);
        assert!(matches!(result, Err(AuthError::ConfigurationError(_))));
    }
}
