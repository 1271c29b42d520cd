use super::Platform;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Which tracks of a selected playlist take part in a transfer.
///
/// Serialized as the sentinel `"ALL"` or as an ordered list of track ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrackInclusion {
    All,
    Only(Vec<String>),
}

impl TrackInclusion {
    pub fn is_all(&self) -> bool {
        matches!(self, TrackInclusion::All)
    }
}

/// Selection that survives restarts.
///
/// Every key of `include_tracks` is also in `selected_playlist_ids`.
#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionState {
    #[serde(default)]
    pub source_platform: Option<Platform>,
    #[serde(default)]
    pub selected_playlist_ids: BTreeSet<String>,
    #[serde(default)]
    pub include_tracks: BTreeMap<String, TrackInclusion>,
    #[serde(default, rename = "transferId", alias = "activeTransferId")]
    pub active_transfer_id: Option<u64>,
}

/// Fields to shallow-merge into a [`SelectionState`]; `None` leaves a field untouched.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct SelectionPatch {
    pub source_platform: Option<Option<Platform>>,
    pub selected_playlist_ids: Option<BTreeSet<String>>,
    pub include_tracks: Option<BTreeMap<String, TrackInclusion>>,
    pub active_transfer_id: Option<Option<u64>>,
}

impl SelectionPatch {
    pub fn source(mut self, platform: Option<Platform>) -> Self {
        self.source_platform = Some(platform);
        self
    }

    pub fn playlists<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_playlist_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn transfer(mut self, id: Option<u64>) -> Self {
        self.active_transfer_id = Some(id);
        self
    }
}

impl SelectionState {
    pub fn is_selected(&self, playlist_id: &str) -> bool {
        self.selected_playlist_ids.contains(playlist_id)
    }

    /// Flips the selection of a playlist and returns whether it is now selected.
    ///
    /// Newly selected playlists include all tracks unless an inclusion exists.
    pub fn toggle(&mut self, playlist_id: &str) -> bool {
        if self.selected_playlist_ids.remove(playlist_id) {
            self.include_tracks.remove(playlist_id);
            false
        } else {
            self.selected_playlist_ids.insert(playlist_id.to_string());
            self.include_tracks
                .entry(playlist_id.to_string())
                .or_insert(TrackInclusion::All);
            true
        }
    }

    /// Sets or clears the `ALL` inclusion for every selected playlist.
    pub fn set_include_all(&mut self, checked: bool) {
        for id in &self.selected_playlist_ids {
            if checked {
                self.include_tracks.insert(id.clone(), TrackInclusion::All);
            } else {
                self.include_tracks.remove(id);
            }
        }
    }

    /// True when something is selected and every selection includes all tracks.
    pub fn all_tracks_included(&self) -> bool {
        !self.selected_playlist_ids.is_empty()
            && self
                .selected_playlist_ids
                .iter()
                .all(|id| self.include_tracks.get(id).map_or(false, TrackInclusion::is_all))
    }

    /// Moves to another source platform. Selections never carry across platforms.
    pub fn switch_source(&mut self, platform: Platform) {
        self.source_platform = Some(platform);
        self.selected_playlist_ids.clear();
        self.include_tracks.clear();
    }

    pub fn destination_platform(&self) -> Option<Platform> {
        self.source_platform.map(Platform::opposite)
    }

    pub fn apply(&mut self, patch: SelectionPatch) {
        let SelectionPatch {
            source_platform,
            selected_playlist_ids,
            include_tracks,
            active_transfer_id,
        } = patch;
        if let Some(source_platform) = source_platform {
            self.source_platform = source_platform;
        }
        if let Some(selected_playlist_ids) = selected_playlist_ids {
            self.selected_playlist_ids = selected_playlist_ids;
        }
        if let Some(include_tracks) = include_tracks {
            self.include_tracks = include_tracks;
        }
        if let Some(active_transfer_id) = active_transfer_id {
            self.active_transfer_id = active_transfer_id;
        }
        self.prune();
    }

    /// Drops inclusions of playlists that are no longer selected.
    pub fn prune(&mut self) {
        let selected = &self.selected_playlist_ids;
        self.include_tracks.retain(|id, _| selected.contains(id));
    }

    pub fn is_consistent(&self) -> bool {
        self.include_tracks
            .keys()
            .all(|id| self.selected_playlist_ids.contains(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggles_keep_inclusions_within_selection() {
        let ids = ["p1", "p2", "p3", "p4", "p5"];
        let mut state = SelectionState::default();
        let mut seed: u32 = 0x2545_f491;
        for step in 0..500 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let id = ids[(seed >> 16) as usize % ids.len()];
            if step % 37 == 0 {
                state.set_include_all(step % 2 == 0);
            } else {
                let selected = state.toggle(id);
                assert_eq!(selected, state.is_selected(id));
                if selected {
                    assert!(state.include_tracks.contains_key(id));
                } else {
                    assert!(!state.include_tracks.contains_key(id));
                }
            }
            assert!(state.is_consistent(), "inconsistent after step {}: {:?}", step, state);
        }
    }

    #[test]
    fn toggle_keeps_explicit_inclusion_on_reselect() {
        let mut state = SelectionState::default();
        state.selected_playlist_ids.insert("p1".into());
        state
            .include_tracks
            .insert("p1".into(), TrackInclusion::Only(vec!["t1".into()]));
        assert!(!state.toggle("p1"));
        assert!(state.include_tracks.is_empty());
        assert!(state.toggle("p1"));
        assert_eq!(state.include_tracks["p1"], TrackInclusion::All);
    }

    #[test]
    fn switching_source_clears_selection() {
        let mut state = SelectionState::default();
        state.switch_source(Platform::Spotify);
        state.toggle("p1");
        state.toggle("p2");
        state.active_transfer_id = Some(4);

        state.switch_source(Platform::Youtube);
        assert_eq!(state.source_platform, Some(Platform::Youtube));
        assert!(state.selected_playlist_ids.is_empty());
        assert!(state.include_tracks.is_empty());
        assert_eq!(state.destination_platform(), Some(Platform::Spotify));
    }

    #[test]
    fn include_all_checkbox_state() {
        let mut state = SelectionState::default();
        assert!(!state.all_tracks_included());
        state.toggle("p1");
        state.toggle("p2");
        assert!(state.all_tracks_included());
        state.set_include_all(false);
        assert!(!state.all_tracks_included());
        assert!(state.include_tracks.is_empty());
        state.set_include_all(true);
        assert!(state.all_tracks_included());
    }

    #[test]
    fn patch_merges_shallowly_and_prunes() {
        let mut state = SelectionState::default();
        state.toggle("p1");
        state.toggle("p2");
        state.apply(
            SelectionPatch::default()
                .source(Some(Platform::Youtube))
                .playlists(["p2"])
                .transfer(Some(9)),
        );
        assert_eq!(state.source_platform, Some(Platform::Youtube));
        assert_eq!(state.include_tracks.keys().collect::<Vec<_>>(), vec!["p2"]);
        assert_eq!(state.active_transfer_id, Some(9));

        state.apply(SelectionPatch::default().transfer(None));
        assert_eq!(state.active_transfer_id, None);
        assert_eq!(state.source_platform, Some(Platform::Youtube));
    }

    #[test]
    fn reads_the_browser_storage_shape() {
        let state: SelectionState = serde_json::from_str(
            r#"{"sourcePlatform":"spotify","selectedPlaylistIds":["p1"],"includeTracks":{"p1":"ALL"},"transferId":7}"#,
        )
        .unwrap();
        assert_eq!(state.source_platform, Some(Platform::Spotify));
        assert_eq!(state.include_tracks["p1"], TrackInclusion::All);
        assert_eq!(state.active_transfer_id, Some(7));

        let empty: SelectionState =
            serde_json::from_str(r#"{"sourcePlatform":null,"transferId":null}"#).unwrap();
        assert_eq!(empty, SelectionState::default());
    }
}
