//! HTTP implementation of [`PlatformSync`] for Jira and Trello.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{ExternalTicketRef, PlatformSync, SyncError};
use crate::board::{Board, ExternalPlatform};
use crate::config::SyncConfig;
use crate::standby::StandbyQueueItem;
use crate::ticket::validate::{truncate_chars, MAX_TITLE_LEN};

#[derive(Debug, Deserialize)]
struct JiraIssueResponse {
    key: String,
}

#[derive(Debug, Deserialize)]
struct TrelloCardResponse {
    id: String,
    #[serde(default, rename = "shortUrl")]
    short_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Talks to Jira's REST API v2 and Trello's REST API v1.
pub struct HttpPlatformSync {
    client: Client,
    enabled: bool,
    trello_base_url: String,
}

impl HttpPlatformSync {
    pub fn new(config: &SyncConfig) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            enabled: config.enabled,
            trello_base_url: config.trello_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn check(response: Response) -> Result<Response, SyncError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(SyncError::Rejected {
            status: status.as_u16(),
            message: truncate_chars(&message, 500),
        })
    }

    async fn create_jira_issue(
        &self,
        base_url: &str,
        project_key: &str,
        email: &str,
        api_token: &str,
        item: &StandbyQueueItem,
    ) -> Result<ExternalTicketRef, SyncError> {
        let base_url = base_url.trim_end_matches('/');
        let url = format!("{}/rest/api/2/issue", base_url);

        debug!(url = %url, project_key, item_id = item.id, "Creating Jira issue");

        let body = json!({
            "fields": {
                "project": { "key": project_key },
                "summary": truncate_chars(&item.subject, MAX_TITLE_LEN),
                "description": format!("{}\n\nReported by: {}", item.body, item.sender_email),
                "issuetype": { "name": "Task" },
            }
        });

        let response = self
            .client
            .post(&url)
            .basic_auth(email, Some(api_token))
            .json(&body)
            .send()
            .await?;
        let issue: JiraIssueResponse = Self::check(response).await?.json().await?;

        Ok(ExternalTicketRef {
            platform: "jira".to_string(),
            external_url: format!("{}/browse/{}", base_url, issue.key),
            external_id: issue.key,
        })
    }

    async fn create_trello_card(
        &self,
        api_key: &str,
        token: &str,
        list_id: &str,
        item: &StandbyQueueItem,
    ) -> Result<ExternalTicketRef, SyncError> {
        let url = format!("{}/cards", self.trello_base_url);

        debug!(url = %url, list_id, item_id = item.id, "Creating Trello card");

        let name = truncate_chars(&item.subject, MAX_TITLE_LEN);
        let desc = format!("{}\n\nReported by: {}", item.body, item.sender_email);

        let response = self
            .client
            .post(&url)
            .query(&[
                ("key", api_key),
                ("token", token),
                ("idList", list_id),
                ("name", name.as_str()),
                ("desc", desc.as_str()),
            ])
            .send()
            .await?;
        let card: TrelloCardResponse = Self::check(response).await?.json().await?;

        let external_url = card
            .short_url
            .or(card.url)
            .unwrap_or_else(|| format!("https://trello.com/c/{}", card.id));

        Ok(ExternalTicketRef {
            platform: "trello".to_string(),
            external_id: card.id,
            external_url,
        })
    }
}

#[async_trait]
impl PlatformSync for HttpPlatformSync {
    async fn create_external_ticket(
        &self,
        board: &Board,
        item: &StandbyQueueItem,
    ) -> Result<ExternalTicketRef, SyncError> {
        if !self.enabled {
            return Err(SyncError::NotConfigured(
                "external sync is disabled".to_string(),
            ));
        }

        let platform = board.external_platform.as_ref().ok_or_else(|| {
            SyncError::NotConfigured(format!("board {} has no external platform", board.id))
        })?;

        let result = match platform {
            ExternalPlatform::Jira {
                base_url,
                project_key,
                email,
                api_token,
            } => {
                self.create_jira_issue(base_url, project_key, email, api_token, item)
                    .await
            }
            ExternalPlatform::Trello {
                api_key,
                token,
                list_id,
            } => self.create_trello_card(api_key, token, list_id, item).await,
        };

        if let Err(e) = &result {
            warn!(
                board_id = board.id,
                item_id = item.id,
                platform = platform.name(),
                error = %e,
                "External sync failed"
            );
        }

        result
    }
}
