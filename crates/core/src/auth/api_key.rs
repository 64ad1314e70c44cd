//! Shared-key authentication for managers.

use async_trait::async_trait;

use super::{AuthError, AuthRequest, Authenticator, Identity};
use crate::config::ManagerKey;

/// Maps presented API keys to manager names
///
/// The key is read from `Authorization: Bearer <key>` or `X-API-Key`. Every
/// configured key is compared in constant time so the position of a match
/// does not leak.
pub struct ApiKeyAuthenticator {
    managers: Vec<ManagerKey>,
}

impl ApiKeyAuthenticator {
    /// Single shared key; requests carrying it act as `manager_name`
    pub fn new(api_key: impl Into<String>, manager_name: impl Into<String>) -> Self {
        Self::with_managers(vec![ManagerKey {
            name: manager_name.into(),
            api_key: api_key.into(),
        }])
    }

    pub fn with_managers(managers: Vec<ManagerKey>) -> Self {
        Self { managers }
    }

    pub fn manager_count(&self) -> usize {
        self.managers.len()
    }

    fn lookup(&self, presented: &str) -> Option<&ManagerKey> {
        let mut found = None;
        for manager in &self.managers {
            if constant_time_eq(presented.as_bytes(), manager.api_key.as_bytes()) && found.is_none()
            {
                found = Some(manager);
            }
        }
        found
    }
}

#[async_trait]
impl Authenticator for ApiKeyAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let presented = request.presented_key().ok_or(AuthError::NotAuthenticated)?;

        match self.lookup(presented) {
            Some(manager) => Ok(Identity::manager(&manager.name)),
            None => Err(AuthError::InvalidCredentials("Invalid API key".to_string())),
        }
    }

    fn method_name(&self) -> &'static str {
        "api_key"
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
