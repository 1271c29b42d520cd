use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{AsRefStr, Display};

/// A music service playlists can be read from or written to.
#[derive(
    Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Platform {
    Spotify,
    Youtube,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::Spotify, Platform::Youtube];

    /// The platform on the other side of a transfer.
    pub fn opposite(self) -> Self {
        match self {
            Platform::Spotify => Platform::Youtube,
            Platform::Youtube => Platform::Spotify,
        }
    }

    /// Name shown to users.
    pub fn display_name(self) -> &'static str {
        match self {
            Platform::Spotify => "Spotify",
            Platform::Youtube => "YouTube Music",
        }
    }
}

pub fn opposite_platform(platform: Platform) -> Platform {
    platform.opposite()
}

impl FromStr for Platform {
    type Err = super::ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "spotify" => Ok(Platform::Spotify),
            "youtube" | "youtube-music" | "ytmusic" => Ok(Platform::Youtube),
            other => Err(super::ParseError::UnknownPlatform(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStatus {
    #[serde(default)]
    pub linked: bool,
}

#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkUrl {
    #[serde(default)]
    pub url: String,
}

#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectUrl {
    #[serde(default)]
    pub url: Option<String>,
}
