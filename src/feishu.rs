use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::error;

use crate::types::{FeishuContent, FeishuMessage};

/// Delivers one text message to an external channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str) -> Result<()>;
}

pub fn build_feishu_payload(text: &str) -> FeishuMessage {
    FeishuMessage {
        msg_type: "text".to_string(),
        content: FeishuContent {
            text: text.to_string(),
        },
    }
}

pub async fn send_to_feishu(
    client: &reqwest::Client,
    webhook_url: &str,
    payload: &FeishuMessage,
) -> Result<()> {
    let res = client
        .post(webhook_url)
        .json(payload)
        .send()
        .await
        .context("Failed to send Feishu request")?;
    if res.status() != StatusCode::OK {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        error!("Feishu webhook failed: {} - {}", status, body);
        return Err(anyhow!("Feishu webhook returned status {}", status));
    }
    Ok(())
}

pub struct WebhookNotifier {
    client: reqwest::Client,
    webhook_url: String,
}

impl WebhookNotifier {
    pub fn new(webhook_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            webhook_url: webhook_url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, text: &str) -> Result<()> {
        let payload = build_feishu_payload(text);
        send_to_feishu(&self.client, &self.webhook_url, &payload).await
    }
}
