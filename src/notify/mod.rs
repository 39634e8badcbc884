//! Alert delivery.
//!
//! The engine only knows the [`Notifier`] trait; Discord webhooks are the
//! production transport. A delivery counts as successful only when the
//! destination acknowledges it with a 2xx.

pub mod discord;

use crate::engine::message::AlertMessage;
use async_trait::async_trait;
use thiserror::Error;

pub use discord::DiscordNotifier;

#[derive(Error, Debug)]
pub enum NotifierError {
    #[error("no valid Discord webhook URL available for chain {0}")]
    NoDestination(String),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("delivery rejected, response status: {status}, response body: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `message` to `destination` (a webhook URL).
    async fn send(&self, destination: &str, message: &AlertMessage) -> Result<(), NotifierError>;
}
