//! The long-poll seam.
//!
//! [`LogPoller`] is the single network boundary of the client: one call,
//! one batch, one new cursor. [`HttpLogPoller`] is the real implementation;
//! tests substitute scripted pollers.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use loupe_core::{PollBatch, PollCursor};

use crate::error::{PollError, Result};

/// One long-poll request against the log stream endpoint.
///
/// The server holds the request open until data exists or its own timeout
/// elapses; the client adds no timeout of its own beyond cooperative
/// cancellation.
#[async_trait]
pub trait LogPoller: Send + Sync {
    /// Polls for entries after `cursor`. `limit` bounds entries per call.
    /// Cancelling `cancel` resolves with [`PollError::Cancelled`].
    async fn poll(
        &self,
        cursor: &PollCursor,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<PollBatch>;
}

/// HTTP implementation against a deployment's log stream endpoint.
#[derive(Debug, Clone)]
pub struct HttpLogPoller {
    client: reqwest::Client,
    deployment_url: String,
    auth_token: String,
}

impl HttpLogPoller {
    /// Creates a poller for one deployment.
    #[must_use]
    pub fn new(deployment_url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            deployment_url: deployment_url.into(),
            auth_token: auth_token.into(),
        }
    }

    /// The cursor travels back verbatim; numbers stay bare, strings stay
    /// unquoted.
    fn cursor_param(cursor: &PollCursor) -> String {
        match cursor.as_value() {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[async_trait]
impl LogPoller for HttpLogPoller {
    async fn poll(
        &self,
        cursor: &PollCursor,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<PollBatch> {
        let url = format!(
            "{}/api/stream_function_logs",
            self.deployment_url.trim_end_matches('/')
        );
        let request = self
            .client
            .get(url)
            .bearer_auth(&self.auth_token)
            .query(&[
                ("cursor", Self::cursor_param(cursor)),
                ("limit", limit.to_string()),
            ])
            .send();

        let response = tokio::select! {
            response = request => response?,
            () = cancel.cancelled() => return Err(PollError::Cancelled),
        };

        let response = response.error_for_status()?;
        let batch = tokio::select! {
            batch = response.json::<PollBatch>() => batch?,
            () = cancel.cancelled() => return Err(PollError::Cancelled),
        };
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_param_keeps_numbers_and_strings_verbatim() {
        let initial = PollCursor::initial();
        assert_eq!(HttpLogPoller::cursor_param(&initial), "0");

        let string_cursor: PollCursor =
            serde_json::from_str("\"opaque-token-42\"").expect("cursor");
        assert_eq!(
            HttpLogPoller::cursor_param(&string_cursor),
            "opaque-token-42"
        );
    }

    #[tokio::test]
    async fn pre_cancelled_poll_returns_cancelled() {
        let poller = HttpLogPoller::new("http://127.0.0.1:9", "token");
        let cancel = CancellationToken::new();
        cancel.cancel();

        // The request future never gets a chance to connect
        let result = poller.poll(&PollCursor::initial(), 50, &cancel).await;
        assert!(matches!(result, Err(PollError::Cancelled)));
    }
}
