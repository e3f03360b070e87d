//! Notifier abstraction.
//!
//! A notifier posts lifecycle announcements to one fixed chat channel. The
//! Discord implementation lives in `vtod-discord`; [`NoopNotifier`] stands in
//! when no session could be established.

pub mod error;
pub mod noop;
pub mod plugin;

pub use {
    error::{ChannelError, Result},
    noop::NoopNotifier,
    plugin::{HealthSnapshot, Notifier, NotifierFactory, NotifierSettings},
};
