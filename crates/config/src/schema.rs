/// Config schema for `config.yml`.
///
/// The file is a flat mapping of scalars. Unknown keys are ignored so that
/// older or hand-edited files still load.
use std::fmt;

use {
    secrecy::{ExposeSecret, SecretString},
    serde::{Deserialize, Deserializer, de},
    serde_yaml::Value,
};

/// Schema version carried by the bundled default file. Files below this
/// version are replaced on startup.
pub const CURRENT_CONFIG_VERSION: f64 = 1.2;

pub const DEFAULT_START_MESSAGE: &str = "Server has started.";
pub const DEFAULT_STOP_MESSAGE: &str = "Server has stopped";

/// Parsed bridge configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Schema version. `None` when absent or not a number; numeric strings
    /// such as `"1.2"` are accepted.
    #[serde(rename = "configuration-version", deserialize_with = "deserialize_version")]
    pub configuration_version: Option<f64>,

    /// Discord bot token. Redacted in `Debug` output.
    pub token: Option<SecretString>,

    /// Destination channel. `None` when absent, empty or zero.
    #[serde(deserialize_with = "deserialize_channel_id")]
    pub channel_id: Option<u64>,

    pub start_message_text: Option<String>,

    pub stop_message_text: Option<String>,

    /// Raw presence string; see [`PresenceStatus::from_config`].
    pub online_status: Option<String>,
}

impl BridgeConfig {
    /// The bot token, or an empty string when none is configured.
    pub fn token(&self) -> &str {
        self.token
            .as_ref()
            .map(|t| t.expose_secret().as_str())
            .unwrap_or_default()
    }

    pub fn has_token(&self) -> bool {
        !self.token().trim().is_empty()
    }

    pub fn start_message(&self) -> &str {
        self.start_message_text
            .as_deref()
            .unwrap_or(DEFAULT_START_MESSAGE)
    }

    pub fn stop_message(&self) -> &str {
        self.stop_message_text
            .as_deref()
            .unwrap_or(DEFAULT_STOP_MESSAGE)
    }

    pub fn presence(&self) -> PresenceStatus {
        self.online_status
            .as_deref()
            .map(PresenceStatus::from_config)
            .unwrap_or_default()
    }
}

/// Presence the bot account shows while connected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PresenceStatus {
    #[default]
    Online,
    Idle,
    DoNotDisturb,
}

impl PresenceStatus {
    /// Map a config value, case-insensitively. Unrecognised values fall back
    /// to [`PresenceStatus::Online`].
    pub fn from_config(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "IDLE" => Self::Idle,
            "DO_NOT_DISTURB" | "DND" => Self::DoNotDisturb,
            _ => Self::Online,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "ONLINE",
            Self::Idle => "IDLE",
            Self::DoNotDisturb => "DO_NOT_DISTURB",
        }
    }
}

impl fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn deserialize_version<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_version(&value))
}

/// Read a `configuration-version` value. Numbers and numeric strings count,
/// anything else reads as no version.
pub(crate) fn parse_version(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        other => other.as_f64(),
    }
}

fn deserialize_channel_id<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    parse_channel_id(&value).map_err(de::Error::custom)
}

/// Channel ids are snowflakes; YAML may hold them as integers or as strings.
fn parse_channel_id(value: &Value) -> Result<Option<u64>, String> {
    let id = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| format!("channel_id must be a positive integer, got {n}"))?,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            s.parse::<u64>()
                .map_err(|_| format!("channel_id must be numeric, got {s:?}"))?
        },
        other => return Err(format!("channel_id must be an integer, got {other:?}")),
    };
    Ok((id != 0).then_some(id))
}
