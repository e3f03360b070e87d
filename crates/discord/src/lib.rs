//! Discord notifier for the Velocity-to-Discord bridge.
//!
//! Opens a bot session through serenity's gateway client and posts to one
//! text channel over the REST API.

pub mod handler;
pub mod notifier;
pub mod outbound;

pub use notifier::{DiscordFactory, DiscordNotifier};
