//! Slack notification middleware: posts a formatted message to an incoming
//! webhook on job completion.

use super::{should_notify, NotificationDedup};
use crate::execution::Execution;
use crate::job::Job;
use crate::middleware::Middleware;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

pub struct SlackNotifier {
    webhook_url: String,
    only_on_error: bool,
    client: reqwest::Client,
    dedup: Arc<NotificationDedup>,
}

impl SlackNotifier {
    pub fn new(webhook_url: impl Into<String>, only_on_error: bool, dedup: Arc<NotificationDedup>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            only_on_error,
            client: reqwest::Client::new(),
            dedup,
        }
    }
}

#[async_trait]
impl Middleware for SlackNotifier {
    async fn after(&self, _job: &Job, execution: &mut Execution) {
        let Some(text) = should_notify(execution, self.only_on_error, &self.dedup) else {
            return;
        };

        let payload = serde_json::json!({ "text": text });
        let result = self.client.post(&self.webhook_url).json(&payload).send().await;
        match result {
            Ok(response) if !response.status().is_success() => {
                warn!(
                    job = %execution.job_name,
                    status = %response.status(),
                    "slack webhook returned a non-success status"
                );
            }
            Err(error) => {
                warn!(job = %execution.job_name, %error, "failed to post slack notification");
            }
            Ok(_) => {}
        }
    }
}
