//! Configuration for the Velocity-to-Discord bridge.
//!
//! The config lives in `<data_dir>/config.yml`. A default copy is compiled
//! into the binary and written out when the file is missing or outdated.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{
        CONFIG_FILENAME, ConfigStore, DEFAULT_CONFIG, DEFAULT_DATA_DIR, EnsureOutcome, load_config,
        read_version,
    },
    schema::{
        BridgeConfig, CURRENT_CONFIG_VERSION, DEFAULT_START_MESSAGE, DEFAULT_STOP_MESSAGE,
        PresenceStatus,
    },
};
