pub mod platform;
pub mod playlist;
pub mod selection;
pub mod serialization;
pub mod transfer;

pub use platform::{opposite_platform, LinkStatus, LinkUrl, Platform, ReconnectUrl};
pub use playlist::{filter_playlists, PlaylistPage, PlaylistSummary};
pub use selection::{SelectionPatch, SelectionState, TrackInclusion};
pub use transfer::{
    DownloadFormat, TransferCreated, TransferJob, TransferProgress, TransferRequest,
    TransferStatus, TransferSummary,
};

#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown platform `{0}` (expected spotify or youtube)")]
    UnknownPlatform(String),
    #[error("unknown download format `{0}` (expected csv, pdf or json)")]
    UnknownFormat(String),
}
