//! Common test utilities for driving the service in-process.
//!
//! The fixture builds the real router on a temporary SQLite file with a
//! scripted [`MockPlatformSync`] standing in for Jira/Trello.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tower::ServiceExt;

use ticketdesk_core::config::{ManagerKey, ServerConfig};
use ticketdesk_core::testing::MockPlatformSync;
use ticketdesk_core::{
    create_audit_system, create_authenticator, AuditFilter, AuditStore, AuthConfig, AuthMethod,
    Authenticator, ClientConfig, Config, DatabaseConfig, SyncConfig,
};
use ticketdesk_server::{create_router, AppState, Stores};

/// Test fixture with a router over a fresh database.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_form_submission() {
///     let fixture = TestFixture::new().await;
///     let board_id = fixture.create_board("support").await;
///
///     let response = fixture.post(&format!("/api/v1/boards/{}/tickets", board_id), json!({
///         "title": "Broken link", "description": "404 on /pricing", "email": "a@example.com"
///     })).await;
///
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    pub router: Router,
    /// Scripted external platform
    pub sync: MockPlatformSync,
    /// Direct store access for assertions
    pub stores: Stores,
    pub temp_dir: TempDir,
    /// Key the seeding helpers authenticate with
    manager_key: Option<String>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Fixture without authentication.
    pub async fn new() -> Self {
        Self::with_auth(AuthConfig::default(), None).await
    }

    /// Fixture requiring `key` for manager routes; requests made with it act as `manager`.
    pub async fn with_api_key(key: &str) -> Self {
        Self::with_auth(
            AuthConfig {
                method: AuthMethod::ApiKey,
                api_key: Some(key.to_string()),
                manager_name: "manager".to_string(),
                managers: vec![ManagerKey {
                    name: "second-manager".to_string(),
                    api_key: format!("{}-2", key),
                }],
            },
            Some(key.to_string()),
        )
        .await
    }

    async fn with_auth(auth: AuthConfig, manager_key: Option<String>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let config = Config {
            auth,
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 8080,
                cors_origins: Vec::new(),
            },
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            sync: SyncConfig::default(),
            client: ClientConfig::default(),
        };

        let stores = Stores::open(&db_path).expect("Failed to open stores");
        let authenticator: Arc<dyn Authenticator> = Arc::from(
            create_authenticator(&config.auth).expect("Failed to create authenticator"),
        );

        let (audit_handle, audit_writer) = create_audit_system(Arc::clone(&stores.audit), 100);
        tokio::spawn(audit_writer.run());

        let sync = MockPlatformSync::new();
        let state = Arc::new(AppState::new(
            config,
            authenticator,
            audit_handle,
            stores.clone(),
            Arc::new(sync.clone()),
        ));

        Self {
            router: create_router(state),
            sync,
            stores,
            temp_dir,
            manager_key,
        }
    }

    /// Serve the router on an ephemeral local port.
    ///
    /// Returns the `/api/v1` base URL; the server stops when the handle is aborted
    /// or the runtime shuts down.
    pub async fn spawn(&self) -> (String, JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Listener has no address");

        let router = self.router.clone();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });

        (format!("http://{}/api/v1", addr), handle)
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body), None).await
    }

    /// POST without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None, None).await
    }

    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body), None).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None, None).await
    }

    /// Send a request carrying `Authorization: Bearer <key>`.
    pub async fn request_as(
        &self,
        key: &str,
        method: &str,
        path: &str,
        body: Option<Value>,
    ) -> TestResponse {
        self.request(method, path, body, Some(key)).await
    }

    /// POST a raw string body as JSON (for malformed payloads).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        key: Option<&str>,
    ) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        if let Some(key) = key {
            request_builder = request_builder.header("Authorization", format!("Bearer {}", key));
        }

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }

    // -------------------------------------------------------------------------
    // Seeding
    // -------------------------------------------------------------------------

    async fn seed(&self, path: &str, body: Value) -> Value {
        let response = self
            .request("POST", path, Some(body), self.manager_key.as_deref())
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body
    }

    /// Create a board without an external platform, returning its id.
    pub async fn create_board(&self, unique_name: &str) -> i64 {
        self.seed(
            "/api/v1/boards",
            json!({ "name": format!("Board {}", unique_name), "unique_name": unique_name }),
        )
        .await["id"]
            .as_i64()
            .unwrap()
    }

    /// Create a board mirrored to Trello, returning its id.
    pub async fn create_trello_board(&self, unique_name: &str) -> i64 {
        self.seed(
            "/api/v1/boards",
            json!({
                "name": format!("Board {}", unique_name),
                "unique_name": unique_name,
                "external_platform": {
                    "platform": "trello",
                    "api_key": "trello-key",
                    "token": "trello-token",
                    "list_id": "list-1"
                }
            }),
        )
        .await["id"]
            .as_i64()
            .unwrap()
    }

    /// Submit a ticket through the public form, returning its id.
    pub async fn create_ticket(&self, board_id: i64, title: &str) -> i64 {
        self.seed(
            &format!("/api/v1/boards/{}/tickets", board_id),
            json!({
                "title": title,
                "description": "Reported through the form",
                "email": "reporter@example.com"
            }),
        )
        .await["id"]
            .as_i64()
            .unwrap()
    }

    /// Put an item on the standby queue, returning its id.
    ///
    /// With `failed_on` the item records a failed sync against that board.
    pub async fn enqueue(&self, subject: &str, failed_on: Option<i64>) -> i64 {
        let body = match failed_on {
            Some(board_id) => json!({
                "sender_email": "customer@example.com",
                "subject": subject,
                "body": "Sent from my phone",
                "reason": "external_creation_failed",
                "original_board_id": board_id,
                "external_sync_failed": true
            }),
            None => json!({
                "sender_email": "customer@example.com",
                "subject": subject,
                "body": "Sent from my phone",
                "reason": "no_keyword_match"
            }),
        };
        self.seed("/api/v1/standby-queue", body).await["id"]
            .as_i64()
            .unwrap()
    }

    /// Wait until the audit writer has stored at least `count` events matching `filter`.
    pub async fn wait_for_audit(&self, filter: &AuditFilter, count: i64) -> bool {
        for _ in 0..100 {
            if self.stores.audit.count(filter).unwrap_or(0) >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

/// Helper to assert an error response carries the expected code.
#[macro_export]
macro_rules! assert_error_code {
    ($response:expr, $status:expr, $code:expr) => {
        assert_status!($response, $status);
        assert_eq!(
            $response.body["code"], $code,
            "Expected error code {}, got {}",
            $code, $response.body
        );
        assert!($response.body["message"].is_string());
    };
}
