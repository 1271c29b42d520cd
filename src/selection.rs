use crate::api::DynBackend;
use crate::error::ShiftError;
use crate::link::{LinkHandle, LinkMonitor, OnLinked};
use crate::notify::{Notice, Notifier};
use async_trait::async_trait;
use penguinshift_model::{filter_playlists, Platform, PlaylistSummary, SelectionState};
use penguinshift_store::SelectionStore;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Source playlists and the user's selection among them.
pub struct PlaylistController {
    backend: DynBackend,
    store: SelectionStore,
    links: Arc<LinkMonitor>,
    notifier: Arc<dyn Notifier>,
    debounce: Duration,
    playlists: watch::Sender<Vec<PlaylistSummary>>,
    query: Arc<watch::Sender<String>>,
    pending_query: Mutex<Option<CancellationToken>>,
}

impl std::fmt::Debug for PlaylistController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaylistController")
            .field("playlists", &self.playlists.borrow().len())
            .field("query", &*self.query.borrow())
            .finish()
    }
}

impl PlaylistController {
    /// Creates the controller and registers it to load playlists once the
    /// source platform is linked.
    pub fn new(
        backend: DynBackend,
        store: SelectionStore,
        links: Arc<LinkMonitor>,
        notifier: Arc<dyn Notifier>,
        debounce: Duration,
    ) -> Arc<Self> {
        let (playlists, _) = watch::channel(Vec::new());
        let (query, _) = watch::channel(String::new());
        let controller = Arc::new(Self {
            backend,
            store,
            links,
            notifier,
            debounce,
            playlists,
            query: Arc::new(query),
            pending_query: Mutex::new(None),
        });
        let listener: Weak<dyn OnLinked> = Arc::downgrade(&controller) as Weak<dyn OnLinked>;
        controller.links.add_listener(listener);
        controller
    }

    pub fn source_platform(&self) -> Option<Platform> {
        self.store.read().source_platform
    }

    pub fn selection(&self) -> SelectionState {
        self.store.read()
    }

    pub fn playlists(&self) -> Vec<PlaylistSummary> {
        self.playlists.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<PlaylistSummary>> {
        self.playlists.subscribe()
    }

    /// Loads for a platform that is no longer the source are not published.
    fn is_source(&self, platform: Platform) -> bool {
        self.source_platform().map_or(true, |source| source == platform)
    }

    pub async fn load_playlists(
        &self,
        platform: Platform,
    ) -> Result<Vec<PlaylistSummary>, ShiftError> {
        tracing::debug!(%platform, "loading source playlists");
        match self.backend.source_playlists(platform).await {
            Ok(page) => {
                tracing::info!(%platform, count = page.items.len(), "loaded source playlists");
                if self.is_source(platform) {
                    self.playlists.send_replace(page.items.clone());
                }
                Ok(page.items)
            }
            Err(err) => {
                if self.is_source(platform) {
                    self.playlists.send_replace(Vec::new());
                }
                if err.is_unauthorized() {
                    tracing::warn!(%platform, "playlist authorization expired");
                    self.notifier.notify(Notice::error(format!(
                        "Failed to load playlists from {}: authorization expired. \
                         Please reconnect your {} account and try again.",
                        platform, platform
                    )));
                    Err(ShiftError::ReconnectRequired(platform))
                } else {
                    tracing::warn!(%platform, "failed to load playlists: {}", err);
                    self.notifier.notify(Notice::error(format!(
                        "Failed to load playlists from {}: {}",
                        platform, err
                    )));
                    Err(err.into())
                }
            }
        }
    }

    /// Reloads the playlists of the current source platform.
    pub async fn refresh(&self) -> Result<Vec<PlaylistSummary>, ShiftError> {
        let platform = self.source_platform().ok_or(ShiftError::NoSourcePlatform)?;
        self.load_playlists(platform).await
    }

    /// Checks the source link; a linked source loads its playlists.
    pub async fn check_source(&self) -> Result<bool, ShiftError> {
        let platform = self.source_platform().ok_or(ShiftError::NoSourcePlatform)?;
        let linked = self.links.check_link(platform).await;
        if !linked {
            self.playlists.send_replace(Vec::new());
        }
        Ok(linked)
    }

    pub async fn link_source(&self) -> Result<LinkHandle, ShiftError> {
        let platform = self.source_platform().ok_or(ShiftError::NoSourcePlatform)?;
        Ok(self.links.begin_link(platform).await?)
    }

    pub async fn reconnect_source(&self) -> Result<LinkHandle, ShiftError> {
        let platform = self.source_platform().ok_or(ShiftError::NoSourcePlatform)?;
        self.playlists.send_replace(Vec::new());
        Ok(self.links.force_reconnect(platform).await?)
    }

    /// Moves to another source platform, dropping everything tied to the old one.
    pub fn switch_platform(&self, platform: Platform) {
        tracing::info!(%platform, "switching source platform");
        self.links.cancel_all();
        self.playlists.send_replace(Vec::new());
        self.store.modify(|state| state.switch_source(platform));
    }

    pub fn toggle(&self, playlist_id: &str) -> bool {
        self.store.modify(|state| state.toggle(playlist_id))
    }

    pub fn set_include_all(&self, checked: bool) {
        self.store.modify(|state| state.set_include_all(checked));
    }

    /// State of the "include all tracks" checkbox.
    pub fn all_tracks_included(&self) -> bool {
        self.store.read().all_tracks_included()
    }

    pub fn can_continue(&self) -> bool {
        !self.store.read().selected_playlist_ids.is_empty()
    }

    pub fn filter(&self, query: &str) -> Vec<PlaylistSummary> {
        filter_playlists(&self.playlists.borrow(), query)
    }

    /// Debounces search input; only the last query within the window applies.
    pub fn set_query(&self, query: &str) {
        let token = CancellationToken::new();
        let previous = self
            .pending_query
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }
        let debounced = self.query.clone();
        let query = query.to_string();
        let delay = self.debounce;
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    debounced.send_replace(query);
                }
            }
        });
    }

    pub fn query(&self) -> String {
        self.query.borrow().clone()
    }

    /// Playlists matching the debounced query.
    pub fn visible(&self) -> Vec<PlaylistSummary> {
        let query = self.query();
        self.filter(&query)
    }
}

#[async_trait]
impl OnLinked for PlaylistController {
    async fn on_linked(&self, platform: Platform) {
        if self.source_platform() != Some(platform) {
            return;
        }
        if let Err(err) = self.load_playlists(platform).await {
            tracing::debug!(%platform, "playlists unavailable after linking: {}", err);
        }
    }
}

impl Drop for PlaylistController {
    fn drop(&mut self) {
        if let Some(pending) = self
            .pending_query
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            pending.cancel();
        }
    }
}
