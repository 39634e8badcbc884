use super::{Notifier, NotifierError};
use crate::engine::message::AlertMessage;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Embed side-bar colour (Discord blurple).
pub const MESSAGE_BOX_COLOR: u32 = 0x5865F2;

#[derive(Debug, Serialize)]
pub struct DiscordEmbed {
    pub color: u32,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct DiscordMessage {
    pub content: String,
    pub tts: bool,
    pub embeds: Vec<DiscordEmbed>,
}

impl DiscordMessage {
    /// One embed carrying the whole rendered alert.
    pub fn from_alert(message: &AlertMessage) -> Self {
        Self {
            content: String::new(),
            tts: false,
            embeds: vec![DiscordEmbed {
                color: MESSAGE_BOX_COLOR,
                description: message.text.clone(),
            }],
        }
    }
}

/// Posts alerts to Discord webhooks.
pub struct DiscordNotifier {
    client: reqwest::Client,
}

impl DiscordNotifier {
    pub fn new(timeout: Duration) -> Result<Self, NotifierError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, destination: &str, message: &AlertMessage) -> Result<(), NotifierError> {
        let payload = serde_json::to_string(&DiscordMessage::from_alert(message))?;

        let resp = self
            .client
            .post(destination)
            .header("Content-Type", "application/json")
            .body(payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "Discord rejected alert");
            return Err(NotifierError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(kind = %message.kind, chain = %message.chain, id = %message.proposal_id, "alert delivered");
        Ok(())
    }
}
