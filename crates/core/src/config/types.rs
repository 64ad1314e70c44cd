use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Browser origins allowed to call the API; empty disables CORS
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Shared key for `api_key` auth
    #[serde(default)]
    pub api_key: Option<String>,
    /// Identity recorded as `changed_by` for requests carrying `api_key`
    #[serde(default = "default_manager_name")]
    pub manager_name: String,
    /// Additional per-manager keys
    #[serde(default)]
    pub managers: Vec<ManagerKey>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            method: AuthMethod::None,
            api_key: None,
            manager_name: default_manager_name(),
            managers: Vec::new(),
        }
    }
}

fn default_manager_name() -> String {
    "manager".to_string()
}

/// A named manager and the key they authenticate with
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ManagerKey {
    pub name: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    ApiKey,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::None => "none",
            AuthMethod::ApiKey => "api_key",
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("ticketdesk.db")
}

/// External platform sync (Jira / Trello)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    /// When false every sync attempt fails with `NotConfigured`
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_trello_base_url")]
    pub trello_base_url: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: default_timeout_secs(),
            trello_base_url: default_trello_base_url(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_trello_base_url() -> String {
    "https://api.trello.com/1".to_string()
}

/// Settings for `HttpServiceClient`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra attempts for GET requests on transport errors or 5xx
    #[serde(default = "default_read_retries")]
    pub read_retries: u32,
    /// Backoff step; attempt n waits `n * retry_backoff_ms`
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            read_retries: default_read_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080/api/v1".to_string()
}

fn default_read_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    200
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
    pub api_key_configured: bool,
    /// Manager names only, never their keys
    pub managers: Vec<String>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let mut managers = Vec::new();
        if config.auth.api_key.is_some() {
            managers.push(config.auth.manager_name.clone());
        }
        managers.extend(config.auth.managers.iter().map(|m| m.name.clone()));

        Self {
            auth: SanitizedAuthConfig {
                method: config.auth.method.as_str().to_string(),
                api_key_configured: config.auth.api_key.is_some(),
                managers,
            },
            server: config.server.clone(),
            database: config.database.clone(),
            sync: config.sync.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let server = ServerConfig::default();
        assert_eq!(server.port, 8080);
        assert_eq!(DatabaseConfig::default().path, PathBuf::from("ticketdesk.db"));

        let client = ClientConfig::default();
        assert_eq!(client.read_retries, 2);
        assert!(client.api_key.is_none());

        let sync = SyncConfig::default();
        assert!(sync.enabled);
        assert_eq!(sync.timeout_secs, 30);
    }

    #[test]
    fn test_sanitized_config_hides_keys() {
        let config = Config {
            auth: AuthConfig {
                method: AuthMethod::ApiKey,
                api_key: Some("s3cret-key".to_string()),
                manager_name: "alice".to_string(),
                managers: vec![ManagerKey {
                    name: "bob".to_string(),
                    api_key: "other-key".to_string(),
                }],
            },
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            sync: SyncConfig::default(),
            client: ClientConfig::default(),
        };

        let sanitized = SanitizedConfig::from(&config);
        assert_eq!(sanitized.auth.method, "api_key");
        assert!(sanitized.auth.api_key_configured);
        assert_eq!(sanitized.auth.managers, vec!["alice", "bob"]);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("s3cret-key"));
        assert!(!json.contains("other-key"));
    }
}
