//! Proxy-side half of the bridge.
//!
//! The host proxy fires [`ProxyEvent`]s through an [`EventManager`]; the
//! [`BridgePlugin`] listens for them and drives the notifier.

pub mod event;
pub mod plugin;

pub use {
    event::{EventBus, EventListener, EventManager, ProxyEvent},
    plugin::{
        BridgePlugin, BridgePluginBuilder, NotifierListener, START_ANNOUNCE_DELAY,
        start_announcement, stop_announcement,
    },
};

/// Identity the plugin registers its listeners under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginDescription {
    pub id: &'static str,
    pub name: &'static str,
    pub version: &'static str,
    pub authors: &'static [&'static str],
}

pub const PLUGIN: PluginDescription = PluginDescription {
    id: "mc-vtod",
    name: "Velocity-to-Discord",
    version: env!("CARGO_PKG_VERSION"),
    authors: &["Elysium"],
};
