//! Webhook notification channel.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::info;

use omx_core::notify::{Notification, Notifier};

/// Wire form of one published notification.
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    subject: &'a str,
    message: &'a str,
}

pub struct WebhookNotifier {
    client: Client,
    topic_url: String,
    token: Option<String>,
}

impl WebhookNotifier {
    pub fn new(topic_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            topic_url: topic_url.into(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn publish(&self, notification: &Notification) -> anyhow::Result<()> {
        let payload = WebhookPayload {
            subject: &notification.subject,
            message: &notification.body,
        };

        let mut builder = self.client.post(&self.topic_url).json(&payload);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .context("failed to send notification request")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("notification delivery failed with status {status}: {text}");
        }

        info!("Published notification: {}", notification.subject);
        Ok(())
    }
}
