use super::persist::{erase, Persist};
use penguinshift_model::{SelectionPatch, SelectionState};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

impl Persist for SelectionState {}

/// Process-wide selection, mirrored to a JSON file after every change.
#[derive(Clone, Debug)]
pub struct SelectionStore {
    file: Option<PathBuf>,
    state: Arc<Mutex<SelectionState>>,
}

impl SelectionStore {
    /// Restores the selection persisted at `file`.
    ///
    /// Missing or unreadable data silently yields the empty selection.
    pub fn open<P: AsRef<Path>>(file: P) -> Self {
        let file = file.as_ref().to_path_buf();
        let state = match SelectionState::load(&file) {
            Ok(mut state) => {
                state.prune();
                state
            }
            Err(err) => {
                tracing::debug!(file = %file.display(), "starting with empty selection: {}", err);
                SelectionState::default()
            }
        };
        Self {
            file: Some(file),
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// A store that never touches the disk.
    pub fn in_memory() -> Self {
        Self {
            file: None,
            state: Arc::new(Mutex::new(SelectionState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SelectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, state: &SelectionState) {
        if let Some(file) = &self.file {
            if let Err(err) = state.save(file) {
                tracing::warn!(file = %file.display(), "failed to persist selection: {}", err);
            }
        }
    }

    pub fn read(&self) -> SelectionState {
        self.lock().clone()
    }

    /// Shallow-merges `patch` and persists the result.
    pub fn update(&self, patch: SelectionPatch) -> SelectionState {
        self.modify(|state| {
            state.apply(patch);
            state.clone()
        })
    }

    /// Atomic read-modify-write; the closure runs under the store lock.
    pub fn modify<R>(&self, f: impl FnOnce(&mut SelectionState) -> R) -> R {
        let mut state = self.lock();
        let result = f(&mut state);
        state.prune();
        self.persist(&state);
        result
    }

    /// Restores the empty selection and erases the persisted copy.
    pub fn reset(&self) {
        let mut state = self.lock();
        *state = SelectionState::default();
        if let Some(file) = &self.file {
            if let Err(err) = erase(file) {
                tracing::warn!(file = %file.display(), "failed to erase selection: {}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use penguinshift_model::{Platform, TrackInclusion};

    #[test]
    fn update_survives_reload() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("selection.json");

        let store = SelectionStore::open(&file);
        let merged = store.update(
            SelectionPatch::default()
                .source(Some(Platform::Youtube))
                .transfer(Some(12)),
        );
        store.modify(|state| {
            state.toggle("p1");
        });

        let reloaded = SelectionStore::open(&file).read();
        assert_eq!(reloaded.source_platform, merged.source_platform);
        assert_eq!(reloaded.active_transfer_id, Some(12));
        assert_eq!(reloaded.include_tracks["p1"], TrackInclusion::All);
        assert_eq!(reloaded, store.read());
        Ok(())
    }

    #[test]
    fn corrupt_file_yields_empty_state() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("selection.json");
        std::fs::write(&file, "{not json")?;
        assert_eq!(SelectionStore::open(&file).read(), SelectionState::default());

        let missing = dir.path().join("missing.json");
        assert_eq!(SelectionStore::open(&missing).read(), SelectionState::default());
        Ok(())
    }

    #[test]
    fn reset_erases_persisted_copy() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("selection.json");
        let store = SelectionStore::open(&file);
        store.modify(|state| state.switch_source(Platform::Spotify));
        assert!(file.exists());

        store.reset();
        assert!(!file.exists());
        assert_eq!(store.read(), SelectionState::default());
        assert_eq!(SelectionStore::open(&file).read(), SelectionState::default());
        Ok(())
    }

    #[test]
    fn loaded_state_is_pruned() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("selection.json");
        std::fs::write(
            &file,
            r#"{"selectedPlaylistIds":["p1"],"includeTracks":{"p1":"ALL","p2":["t1"]}}"#,
        )?;
        let state = SelectionStore::open(&file).read();
        assert!(state.is_consistent());
        assert_eq!(state.include_tracks.len(), 1);
        Ok(())
    }

    #[test]
    fn in_memory_store_merges() {
        let store = SelectionStore::in_memory();
        let clone = store.clone();
        clone.modify(|state| {
            state.toggle("a");
        });
        assert!(store.read().is_selected("a"));
    }
}
