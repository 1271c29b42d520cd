use penguinshift_model::{Platform, TransferStatus};

/// Markers the backend uses when a platform grant or session has expired.
const UNAUTHORIZED_MARKERS: [&str; 3] = ["401", "unauthorized", "spotify authorization"];

/// True when a backend message points at an expired link or session.
pub fn mentions_unauthorized(message: &str) -> bool {
    let message = message.to_lowercase();
    UNAUTHORIZED_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("{0}")]
    NotJson(String),
    #[error("invalid response: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    /// Authorization expired, by status code or by message content.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            ApiError::Status { status: 401, .. } => true,
            ApiError::Http(err) if err.status() == Some(reqwest::StatusCode::UNAUTHORIZED) => true,
            other => mentions_unauthorized(&other.to_string()),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LinkError {
    #[error("failed to create authorization URL")]
    MissingUrl,
    #[error("popup blocked")]
    PopupBlocked,
    #[error("api request error: {0}")]
    Api(#[from] ApiError),
}

#[derive(thiserror::Error, Debug)]
pub enum ShiftError {
    #[error("api request error: {0}")]
    Api(#[from] ApiError),
    #[error("link: {0}")]
    Link(#[from] LinkError),
    #[error("authorization for {0} expired, reconnect required")]
    ReconnectRequired(Platform),
    #[error("no source platform selected")]
    NoSourcePlatform,
    #[error("{} is not linked", .0.display_name())]
    DestinationNotLinked(Platform),
    #[error("no playlists selected")]
    NothingSelected,
    #[error("a name is required for the new playlist")]
    MissingPlaylistName,
    #[error("no active transfer")]
    NoActiveTransfer,
    #[error("transfer results are not available while the transfer is {0}")]
    NotReady(TransferStatus),
    #[error("io error: {0}")]
    IO(#[from] std::io::Error),
}
