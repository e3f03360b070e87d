/// Errors raised while establishing a notifier session.
///
/// Sends never fail from the caller's point of view, so there is no variant
/// for delivery.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("bot token is empty")]
    MissingToken,

    #[error("bot token is malformed: {0}")]
    InvalidToken(String),

    #[error("bot token was rejected: {0}")]
    Unauthorized(String),

    #[error("failed to connect: {0}")]
    Connect(String),
}

pub type Result<T, E = ChannelError> = std::result::Result<T, E>;
