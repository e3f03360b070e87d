use {async_trait::async_trait, tracing::debug};

use crate::plugin::{HealthSnapshot, Notifier};

/// Notifier installed when no session could be established. Every send is
/// dropped.
#[derive(Debug, Clone)]
pub struct NoopNotifier {
    reason: String,
}

impl NoopNotifier {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[async_trait]
impl Notifier for NoopNotifier {
    fn id(&self) -> &str {
        "noop"
    }

    async fn send_text(&self, text: &str) {
        debug!(reason = %self.reason, len = text.len(), "no session, dropping message");
    }

    async fn send_embed(&self, text: &str, _color: u32, _image_url: &str) {
        debug!(reason = %self.reason, len = text.len(), "no session, dropping embed");
    }

    async fn probe(&self) -> HealthSnapshot {
        HealthSnapshot {
            connected: false,
            details: Some(self.reason.clone()),
        }
    }

    async fn shutdown(&self) {}
}
