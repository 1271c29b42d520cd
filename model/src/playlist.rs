use super::Platform;
use serde::{Deserialize, Serialize};

/// Read-only snapshot of a playlist as listed by the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
    pub platform: Platform,
    #[serde(default)]
    pub song_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
}

#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistPage {
    #[serde(default)]
    pub items: Vec<PlaylistSummary>,
}

/// Case-insensitive substring match on playlist names.
///
/// A blank query keeps every playlist.
pub fn filter_playlists(playlists: &[PlaylistSummary], query: &str) -> Vec<PlaylistSummary> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return playlists.to_vec();
    }
    playlists
        .iter()
        .filter(|playlist| playlist.name.to_lowercase().contains(&query))
        .cloned()
        .collect()
}
