//! reqwest implementation of [`TicketService`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::{AssignRequest, ClientError, StateChangeRequest, TicketService};
use crate::config::ClientConfig;
use crate::error::ErrorBody;
use crate::standby::{QueuePage, StandbyQueueItem};
use crate::ticket::{StatusChange, Ticket};

/// HTTP client for the `/api/v1` contract
///
/// GET requests are retried up to `read_retries` extra times on transport
/// errors, timeouts and 5xx answers, waiting `n * retry_backoff` before
/// attempt `n`. Mutations are sent exactly once.
#[derive(Clone)]
pub struct HttpServiceClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    read_retries: u32,
    retry_backoff: Duration,
}

impl HttpServiceClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            read_retries: config.read_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn error_from(response: Response) -> ClientError {
        let status = response.status().as_u16();
        let body = response.json::<ErrorBody>().await.ok();
        ClientError::from_response(status, body)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let mut attempt: u32 = 0;
        loop {
            debug!(path, attempt, "GET");
            let result = match self.request(Method::GET, path).send().await {
                Ok(response) => Self::decode(response).await,
                Err(e) => Err(ClientError::from(e)),
            };

            match result {
                Err(e) if e.is_retryable() && attempt < self.read_retries => {
                    attempt += 1;
                    warn!(path, attempt, error = %e, "Read failed, retrying");
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                other => return other,
            }
        }
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ClientError> {
        debug!(path, method = %method, "Sending mutation");
        let mut builder = self.request(method, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        Self::decode(builder.send().await?).await
    }
}

#[async_trait]
impl TicketService for HttpServiceClient {
    async fn get_ticket(&self, id: i64) -> Result<Ticket, ClientError> {
        self.get_json(&format!("/tickets/{}", id)).await
    }

    async fn get_history(&self, id: i64) -> Result<Vec<StatusChange>, ClientError> {
        self.get_json(&format!("/tickets/{}/history", id)).await
    }

    async fn change_state(
        &self,
        id: i64,
        request: &StateChangeRequest,
    ) -> Result<Ticket, ClientError> {
        self.send_json(Method::POST, &format!("/tickets/{}/state", id), Some(request))
            .await
    }

    async fn list_queue(&self, limit: i64, offset: i64) -> Result<QueuePage, ClientError> {
        self.get_json(&format!("/standby-queue?limit={}&offset={}", limit, offset))
            .await
    }

    async fn get_queue_item(&self, id: i64) -> Result<StandbyQueueItem, ClientError> {
        self.get_json(&format!("/standby-queue/{}", id)).await
    }

    async fn assign(&self, item_id: i64, board_id: i64) -> Result<Ticket, ClientError> {
        self.send_json(
            Method::POST,
            &format!("/standby-queue/{}/assign", item_id),
            Some(&AssignRequest { board_id }),
        )
        .await
    }

    async fn retry(&self, item_id: i64) -> Result<StandbyQueueItem, ClientError> {
        self.send_json::<(), _>(
            Method::POST,
            &format!("/standby-queue/{}/retry", item_id),
            None,
        )
        .await
    }

    async fn discard(&self, item_id: i64) -> Result<(), ClientError> {
        let response = self
            .request(Method::DELETE, &format!("/standby-queue/{}", item_id))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from(response).await)
        }
    }
}
