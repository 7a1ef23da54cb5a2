//! Deployment audit event fetcher.
//!
//! Audit events are re-fetched by time window and kept only in memory;
//! they are never persisted. Results are filtered to the displayable
//! whitelist before they reach the timeline.

use tokio_util::sync::CancellationToken;

use loupe_core::{displayable_events, DeploymentEvent};

use crate::error::{PollError, Result};

/// Fetches administrative audit events for one deployment.
#[derive(Debug, Clone)]
pub struct AuditClient {
    client: reqwest::Client,
    deployment_url: String,
    auth_token: String,
}

impl AuditClient {
    /// Creates a fetcher for one deployment.
    #[must_use]
    pub fn new(deployment_url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            deployment_url: deployment_url.into(),
            auth_token: auth_token.into(),
        }
    }

    /// Fetches displayable events created at or after `since_ms`.
    pub async fn events_since(
        &self,
        since_ms: i64,
        cancel: &CancellationToken,
    ) -> Result<Vec<DeploymentEvent>> {
        let url = format!(
            "{}/api/app_audit_log",
            self.deployment_url.trim_end_matches('/')
        );
        let request = self
            .client
            .get(url)
            .bearer_auth(&self.auth_token)
            .query(&[("since", since_ms.to_string())])
            .send();

        let response = tokio::select! {
            response = request => response?,
            () = cancel.cancelled() => return Err(PollError::Cancelled),
        };

        let response = response.error_for_status()?;
        let body = tokio::select! {
            body = response.text() => body?,
            () = cancel.cancelled() => return Err(PollError::Cancelled),
        };

        decode_events(&body)
    }
}

/// Decodes an audit log response body and drops non-displayable actions.
fn decode_events(body: &str) -> Result<Vec<DeploymentEvent>> {
    let events: Vec<DeploymentEvent> =
        serde_json::from_str(body).map_err(|e| PollError::Decode(e.to_string()))?;
    Ok(displayable_events(events))
}
