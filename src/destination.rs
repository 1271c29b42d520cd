use crate::api::DynBackend;
use crate::error::ShiftError;
use crate::link::{LinkHandle, LinkMonitor, OnLinked};
use crate::notify::{Notice, Notifier};
use async_trait::async_trait;
use penguinshift_model::{Platform, PlaylistSummary};
use penguinshift_store::SelectionStore;
use std::sync::{Arc, Weak};
use tokio::sync::watch;

/// The platform playlists are written to, and what already lives there.
pub struct DestinationStep {
    backend: DynBackend,
    store: SelectionStore,
    links: Arc<LinkMonitor>,
    notifier: Arc<dyn Notifier>,
    playlists: watch::Sender<Vec<PlaylistSummary>>,
}

impl std::fmt::Debug for DestinationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestinationStep")
            .field("destination", &self.destination())
            .field("playlists", &self.playlists.borrow().len())
            .finish()
    }
}

impl DestinationStep {
    pub fn new(
        backend: DynBackend,
        store: SelectionStore,
        links: Arc<LinkMonitor>,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Self> {
        let (playlists, _) = watch::channel(Vec::new());
        let step = Arc::new(Self {
            backend,
            store,
            links,
            notifier,
            playlists,
        });
        let listener: Weak<dyn OnLinked> = Arc::downgrade(&step) as Weak<dyn OnLinked>;
        step.links.add_listener(listener);
        step
    }

    /// The stored source, or Spotify when none was chosen yet.
    pub fn source(&self) -> Platform {
        self.store.read().source_platform.unwrap_or(Platform::Spotify)
    }

    pub fn destination(&self) -> Platform {
        self.source().opposite()
    }

    pub fn playlists(&self) -> Vec<PlaylistSummary> {
        self.playlists.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<PlaylistSummary>> {
        self.playlists.subscribe()
    }

    /// Checks the destination link; a linked destination loads its playlists.
    pub async fn ensure_linked(&self) -> bool {
        let linked = self.links.check_link(self.destination()).await;
        if !linked {
            self.playlists.send_replace(Vec::new());
        }
        linked
    }

    pub async fn link(&self) -> Result<LinkHandle, ShiftError> {
        Ok(self.links.begin_link(self.destination()).await?)
    }

    pub async fn reconnect(&self) -> Result<LinkHandle, ShiftError> {
        Ok(self.links.force_reconnect(self.destination()).await?)
    }

    pub async fn refresh_playlists(&self) -> Result<Vec<PlaylistSummary>, ShiftError> {
        let platform = self.destination();
        let page = self.backend.destination_playlists(platform).await?;
        tracing::info!(%platform, count = page.items.len(), "loaded destination playlists");
        self.playlists.send_replace(page.items.clone());
        Ok(page.items)
    }
}

#[async_trait]
impl OnLinked for DestinationStep {
    async fn on_linked(&self, platform: Platform) {
        if platform != self.destination() {
            return;
        }
        if let Err(err) = self.refresh_playlists().await {
            tracing::warn!(%platform, "failed to load destination playlists: {}", err);
            self.notifier.notify(Notice::error(format!(
                "We couldn't verify your {} connection. Please try reconnecting.",
                platform.display_name()
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::LinkTiming;
    use crate::testing::{playlist, status, FakeBackend, FakePopup, RecordingNotifier};
    use anyhow::Result;
    use penguinshift_model::SelectionPatch;
    use std::time::Duration;

    fn step(
        backend: &Arc<FakeBackend>,
        notifier: &Arc<RecordingNotifier>,
        store: SelectionStore,
    ) -> (Arc<LinkMonitor>, Arc<DestinationStep>) {
        let links = Arc::new(LinkMonitor::new(
            backend.clone(),
            Arc::new(FakePopup::default()),
            notifier.clone(),
            LinkTiming::default(),
        ));
        let step = DestinationStep::new(backend.clone(), store, links.clone(), notifier.clone());
        (links, step)
    }

    #[tokio::test]
    async fn destination_is_opposite_of_source() -> Result<()> {
        let backend = Arc::new(FakeBackend::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let store = SelectionStore::in_memory();
        let (_links, step) = step(&backend, &notifier, store.clone());

        assert_eq!(step.source(), Platform::Spotify);
        assert_eq!(step.destination(), Platform::Youtube);

        store.update(SelectionPatch::default().source(Some(Platform::Youtube)));
        assert_eq!(step.destination(), Platform::Spotify);
        for platform in Platform::ALL {
            store.modify(|state| state.switch_source(platform));
            assert_ne!(step.source(), step.destination());
        }
        Ok(())
    }

    #[tokio::test]
    async fn linked_destination_loads_playlists() -> Result<()> {
        let backend = Arc::new(FakeBackend::default());
        backend.set_destination_playlists(
            Platform::Youtube,
            vec![playlist("y1", "Liked music", Platform::Youtube)],
        );
        backend.push_link_status(Ok(true));
        let notifier = Arc::new(RecordingNotifier::default());
        let (_links, step) = step(&backend, &notifier, SelectionStore::in_memory());

        assert!(step.ensure_linked().await);
        assert_eq!(step.playlists().len(), 1);
        assert_eq!(backend.calls("source_playlists"), 0);

        backend.push_link_status(Ok(true));
        backend.fail_playlists(status(500, "boom"));
        assert!(step.ensure_linked().await);
        assert_eq!(
            notifier.messages(),
            vec!["We couldn't verify your YouTube Music connection. Please try reconnecting."
                .to_string()]
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn popup_link_targets_destination() -> Result<()> {
        let backend = Arc::new(FakeBackend::default());
        backend.set_link_url("https://accounts.example/auth");
        backend.push_link_status(Ok(true));
        let notifier = Arc::new(RecordingNotifier::default());
        let (links, step) = step(&backend, &notifier, SelectionStore::in_memory());

        let handle = step.link().await?;
        assert_eq!(handle.platform(), Platform::Youtube);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(links.state(Platform::Youtube), crate::link::LinkState::Linked);
        assert_eq!(backend.calls("destination_playlists"), 1);
        Ok(())
    }
}
