use std::sync::Arc;

use {
    async_trait::async_trait,
    secrecy::SecretString,
    vtod_config::{BridgeConfig, PresenceStatus},
};

use crate::error::Result;

/// A session posting to one fixed channel.
///
/// Sends are fire-and-forget: implementations log delivery failures and
/// never return them.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Notifier identifier (e.g. "discord").
    fn id(&self) -> &str;

    /// Post plain text.
    async fn send_text(&self, text: &str);

    /// Post a decorated message. `text` is used as the author label,
    /// `image_url` as the author icon and `color` (0xRRGGBB) as the accent.
    async fn send_embed(&self, text: &str, color: u32, image_url: &str);

    /// Report session health.
    async fn probe(&self) -> HealthSnapshot;

    /// Release the session. Calling it again is a no-op.
    async fn shutdown(&self);
}

/// Establishes notifier sessions.
#[async_trait]
pub trait NotifierFactory: Send + Sync {
    async fn connect(&self, settings: &NotifierSettings) -> Result<Arc<dyn Notifier>>;
}

/// Session health snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthSnapshot {
    pub connected: bool,
    pub details: Option<String>,
}

/// What a factory needs to open a session.
#[derive(Debug, Clone)]
pub struct NotifierSettings {
    pub token: SecretString,
    pub channel_id: Option<u64>,
    pub status: PresenceStatus,
}

impl NotifierSettings {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            token: SecretString::new(config.token().trim().to_string()),
            channel_id: config.channel_id,
            status: config.presence(),
        }
    }
}
