use std::sync::Arc;

use {
    async_trait::async_trait,
    secrecy::ExposeSecret,
    serenity::{
        Client,
        all::{ActivityData, ChannelId, GatewayIntents, Http, OnlineStatus, ShardManager},
    },
    tokio::{sync::Mutex, task::JoinHandle},
    tracing::{debug, error, info, warn},
    vtod_channels::{
        ChannelError, HealthSnapshot, Notifier, NotifierFactory, NotifierSettings, Result,
    },
    vtod_config::PresenceStatus,
};

use crate::{
    handler::SessionHandler,
    outbound::{embed_message, text_message},
};

/// Activity shown under the bot's name.
const ACTIVITY_NAME: &str = "Minecraft";

// ── Factory ──────────────────────────────────────────────────────────────────

/// Opens [`DiscordNotifier`] sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscordFactory;

#[async_trait]
impl NotifierFactory for DiscordFactory {
    async fn connect(&self, settings: &NotifierSettings) -> Result<Arc<dyn Notifier>> {
        let notifier = DiscordNotifier::connect(settings).await?;
        Ok(Arc::new(notifier))
    }
}

// ── Notifier ─────────────────────────────────────────────────────────────────

/// A logged-in bot session posting to one channel.
pub struct DiscordNotifier {
    http: Arc<Http>,
    channel: Option<ChannelId>,
    shard_manager: Arc<ShardManager>,
    gateway: Mutex<Option<JoinHandle<()>>>,
    bot_name: String,
}

impl DiscordNotifier {
    /// Validate the token, log in over REST, then start the gateway session
    /// in the background.
    pub async fn connect(settings: &NotifierSettings) -> Result<Self> {
        let token = check_token(settings.token.expose_secret())?;

        let http = Http::new(token);
        let me = http
            .get_current_user()
            .await
            .map_err(login_error)?;
        info!(user = %me.name, "discord login succeeded");

        let mut client = Client::builder(token, GatewayIntents::GUILDS)
            .activity(ActivityData::playing(ACTIVITY_NAME))
            .status(online_status(settings.status))
            .event_handler(SessionHandler)
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;

        let http = Arc::clone(&client.http);
        let shard_manager = Arc::clone(&client.shard_manager);
        let gateway = tokio::spawn(async move {
            if let Err(e) = client.start().await {
                error!(error = %e, "discord gateway stopped");
            }
        });

        let channel = channel_id(settings.channel_id);
        if channel.is_none() {
            warn!("no channel_id configured, messages will be dropped");
        }

        Ok(Self {
            http,
            channel,
            shard_manager,
            gateway: Mutex::new(Some(gateway)),
            bot_name: me.name.clone(),
        })
    }

    pub fn channel(&self) -> Option<ChannelId> {
        self.channel
    }

    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    fn id(&self) -> &str {
        "discord"
    }

    async fn send_text(&self, text: &str) {
        let Some(channel) = self.channel else {
            debug!("no channel configured, dropping message");
            return;
        };
        if let Err(e) = channel.send_message(&self.http, text_message(text)).await {
            warn!(channel = %channel, error = %e, "failed to send discord message");
        }
    }

    async fn send_embed(&self, text: &str, color: u32, image_url: &str) {
        let Some(channel) = self.channel else {
            debug!("no channel configured, dropping embed");
            return;
        };
        let message = embed_message(text, color, image_url);
        if let Err(e) = channel.send_message(&self.http, message).await {
            warn!(channel = %channel, error = %e, "failed to send discord embed");
        }
    }

    async fn probe(&self) -> HealthSnapshot {
        let connected = self
            .gateway
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.is_finished());
        HealthSnapshot {
            connected,
            details: Some(format!("bot {}", self.bot_name)),
        }
    }

    async fn shutdown(&self) {
        let Some(gateway) = self.gateway.lock().await.take() else {
            return;
        };
        self.shard_manager.shutdown_all().await;
        if let Err(e) = gateway.await {
            warn!(error = %e, "discord gateway task ended abnormally");
        }
        info!(user = %self.bot_name, "discord session closed");
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn check_token(token: &str) -> Result<&str> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ChannelError::MissingToken);
    }
    serenity::utils::validate_token(token)
        .map_err(|e| ChannelError::InvalidToken(e.to_string()))?;
    Ok(token)
}

/// Only a 401 from Discord means the token was rejected; anything else is
/// a connectivity problem.
fn login_error(e: serenity::Error) -> ChannelError {
    let status = match &e {
        serenity::Error::Http(http) => http.status_code().map(|s| s.as_u16()),
        _ => None,
    };
    credential_error(status, e.to_string())
}

fn credential_error(status: Option<u16>, message: String) -> ChannelError {
    match status {
        Some(401) => ChannelError::Unauthorized(message),
        _ => ChannelError::Connect(message),
    }
}

fn channel_id(id: Option<u64>) -> Option<ChannelId> {
    id.filter(|id| *id != 0).map(ChannelId::new)
}

fn online_status(status: PresenceStatus) -> OnlineStatus {
    match status {
        PresenceStatus::Online => OnlineStatus::Online,
        PresenceStatus::Idle => OnlineStatus::Idle,
        PresenceStatus::DoNotDisturb => OnlineStatus::DoNotDisturb,
    }
}
