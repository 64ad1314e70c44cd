use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;

/// Request information for authentication
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// Header names are lowercase
    pub headers: HashMap<String, String>,
    pub source_ip: IpAddr,
}

impl AuthRequest {
    /// Credential presented as `Authorization: Bearer <key>` or `X-API-Key: <key>`
    pub fn presented_key(&self) -> Option<&str> {
        if let Some(header) = self.headers.get("authorization") {
            if let Some(key) = header
                .strip_prefix("Bearer ")
                .or_else(|| header.strip_prefix("bearer "))
            {
                return Some(key.trim());
            }
        }
        self.headers.get("x-api-key").map(|k| k.trim())
    }
}

/// Authenticated manager identity
///
/// `user_id` is what lands in `changed_by` and the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub method: String,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            user_id: "anonymous".to_string(),
            method: "none".to_string(),
        }
    }

    pub fn manager(name: impl Into<String>) -> Self {
        Self {
            user_id: name.into(),
            method: "api_key".to_string(),
        }
    }
}
