use {
    async_trait::async_trait,
    serenity::all::{Context, EventHandler, Ready, ResumedEvent},
    tracing::{debug, info},
};

/// Gateway event handler. The bridge only posts, so it just logs the
/// session state.
pub struct SessionHandler;

#[async_trait]
impl EventHandler for SessionHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            user = %ready.user.name,
            guilds = ready.guilds.len(),
            "discord gateway ready"
        );
    }

    async fn resume(&self, _ctx: Context, _event: ResumedEvent) {
        debug!("discord gateway session resumed");
    }
}
