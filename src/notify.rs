use penguinshift_model::Platform;
use strum::Display;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Level {
    Info,
    Success,
    Error,
}

/// Something the rendering layer should show the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    Toast { level: Level, message: String },
    /// The session or a platform grant expired; the user has to reconnect.
    Reconnect { platform: Option<Platform> },
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Notice::Toast {
            level: Level::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Notice::Toast {
            level: Level::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Notice::Toast {
            level: Level::Error,
            message: message.into(),
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Notice::Toast { message, .. } => Some(message.as_str()),
            Notice::Reconnect { .. } => None,
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

impl<F> Notifier for F
where
    F: Fn(Notice) + Send + Sync,
{
    fn notify(&self, notice: Notice) {
        self(notice)
    }
}

/// Forwards notices to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice {
            Notice::Toast {
                level: Level::Error,
                message,
            } => tracing::error!("{}", message),
            Notice::Toast { level, message } => tracing::info!(%level, "{}", message),
            Notice::Reconnect { platform: Some(platform) } => {
                tracing::warn!(%platform, "reconnect required")
            }
            Notice::Reconnect { platform: None } => tracing::warn!("reconnect required"),
        }
    }
}
