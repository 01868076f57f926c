use std::time::Duration;

use tracing::warn;

use crate::error::{ChannelError, Result};
use crate::types::OutboundMessage;

/// HTTP client for the channel adapter process.
///
/// Reentrant and cheap to clone behind an `Arc`; every subsystem that talks
/// back to the user goes through this one client.
pub struct BridgeClient {
    client: reqwest::Client,
    base_url: String,
}

impl BridgeClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Deliver one outbound payload (text or media) to the bridge.
    pub async fn send(&self, msg: &OutboundMessage) -> Result<()> {
        let url = format!("{}/whatsapp/send", self.base_url);
        let resp = self.client.post(&url).json(msg).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ChannelError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    /// Convenience wrapper for plain text.
    pub async fn send_text(&self, to: &str, platform: &str, message: &str) -> Result<()> {
        self.send(&OutboundMessage::text(to, platform, message)).await
    }

    /// Fire-and-forget text send — egress failures here are logged, never fatal.
    pub async fn send_text_best_effort(&self, to: &str, platform: &str, message: &str) {
        if let Err(e) = self.send_text(to, platform, message).await {
            warn!(to, platform, error = %e, "bridge send failed");
        }
    }

    /// Refresh the typing indicator for a recipient.
    pub async fn typing(&self, to: &str, platform: &str) -> Result<()> {
        let url = format!("{}/whatsapp/typing", self.base_url);
        self.client
            .post(&url)
            .json(&serde_json::json!({ "to": to, "platform": platform }))
            .send()
            .await?;
        Ok(())
    }

    /// Explicitly clear the typing indicator (needed on whatsapp).
    pub async fn stop_typing(&self, to: &str, platform: &str) -> Result<()> {
        let url = format!("{}/whatsapp/stop-typing", self.base_url);
        self.client
            .post(&url)
            .json(&serde_json::json!({ "to": to, "platform": platform }))
            .send()
            .await?;
        Ok(())
    }
}
