use crate::api::DynBackend;
use crate::error::{ApiError, LinkError};
use crate::notify::{Notice, Notifier};
use crate::popup::{Popup, PopupWindow};
use async_trait::async_trait;
use penguinshift_model::{LinkStatus, Platform};
use penguinshift_store::Config;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use strum::Display;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum LinkState {
    Unknown,
    Checking,
    Linked,
    Unlinked,
    Linking,
    TimedOut,
    PopupBlocked,
}

impl Default for LinkState {
    fn default() -> Self {
        LinkState::Unknown
    }
}

/// Told whenever a platform is confirmed linked.
#[async_trait]
pub trait OnLinked: Send + Sync {
    async fn on_linked(&self, platform: Platform);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkTiming {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for LinkTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1200),
            timeout: Duration::from_secs(120),
        }
    }
}

impl From<&Config> for LinkTiming {
    fn from(config: &Config) -> Self {
        Self {
            poll_interval: config.link_poll_interval,
            timeout: config.link_timeout,
        }
    }
}

pub type LinkStates = HashMap<Platform, LinkState>;

struct Shared {
    backend: DynBackend,
    popup: Arc<dyn Popup>,
    notifier: Arc<dyn Notifier>,
    timing: LinkTiming,
    states: watch::Sender<LinkStates>,
    listeners: Mutex<Vec<Weak<dyn OnLinked>>>,
}

impl Shared {
    fn set_state(&self, platform: Platform, state: LinkState) {
        tracing::debug!(%platform, %state, "link state");
        self.states.send_modify(|states| {
            states.insert(platform, state);
        });
    }

    /// Applies a link-status response and reports failures.
    fn record(&self, platform: Platform, status: Result<LinkStatus, ApiError>) -> bool {
        match status {
            Ok(LinkStatus { linked }) => {
                let state = if linked {
                    LinkState::Linked
                } else {
                    LinkState::Unlinked
                };
                self.set_state(platform, state);
                linked
            }
            Err(err) => {
                tracing::warn!(%platform, "link check failed: {}", err);
                self.set_state(platform, LinkState::Unlinked);
                self.notifier.notify(Notice::error(format!(
                    "We couldn't verify your {} connection. Please reconnect your account.",
                    platform.display_name()
                )));
                false
            }
        }
    }

    async fn check(&self, platform: Platform) -> bool {
        self.set_state(platform, LinkState::Checking);
        let status = self.backend.link_status(platform).await;
        let linked = self.record(platform, status);
        if linked {
            self.linked(platform).await;
        }
        linked
    }

    async fn linked(&self, platform: Platform) {
        let listeners = {
            let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
            listeners.retain(|listener| listener.strong_count() > 0);
            listeners
                .iter()
                .filter_map(Weak::upgrade)
                .collect::<Vec<_>>()
        };
        for listener in listeners {
            listener.on_linked(platform).await;
        }
    }

    async fn poll(
        self: Arc<Self>,
        platform: Platform,
        window: Box<dyn PopupWindow>,
        token: CancellationToken,
    ) {
        let deadline = Instant::now() + self.timing.timeout;
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(self.timing.poll_interval) => {}
            }
            if Instant::now() >= deadline {
                tracing::info!(%platform, "link timed out");
                self.set_state(platform, LinkState::TimedOut);
                self.notifier.notify(Notice::error(
                    "OAuth connection timed out. Please try again.",
                ));
                return;
            }

            let closed = window.is_closed();
            let status = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                status = self.backend.link_status(platform) => status,
            };
            if token.is_cancelled() {
                return;
            }
            if closed {
                // one last look tells a slow success from an abandoned popup
                tracing::debug!(%platform, "popup closed");
                if self.record(platform, status) {
                    self.linked(platform).await;
                }
                return;
            }
            match status {
                Ok(LinkStatus { linked: true }) => {
                    tracing::info!(%platform, "platform linked");
                    window.close();
                    self.set_state(platform, LinkState::Linked);
                    self.linked(platform).await;
                    return;
                }
                Ok(_) => tracing::debug!(%platform, "not linked yet"),
                Err(err) => tracing::debug!(%platform, "ignoring link poll error: {}", err),
            }
        }
    }
}

/// Cancels its link poll when dropped.
#[derive(Debug)]
pub struct LinkHandle {
    platform: Platform,
    token: CancellationToken,
}

impl LinkHandle {
    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the poll has ended, listeners included.
    pub async fn finished(&self) {
        self.token.cancelled().await
    }
}

impl Drop for LinkHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Drives the popup OAuth handshake for each platform.
///
/// At most one poll runs per platform. Starting another, `cancel`, or
/// dropping the monitor stops it.
pub struct LinkMonitor {
    shared: Arc<Shared>,
    polls: Mutex<HashMap<Platform, CancellationToken>>,
}

impl std::fmt::Debug for LinkMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkMonitor")
            .field("timing", &self.shared.timing)
            .field("states", &*self.shared.states.borrow())
            .finish()
    }
}

impl LinkMonitor {
    pub fn new(
        backend: DynBackend,
        popup: Arc<dyn Popup>,
        notifier: Arc<dyn Notifier>,
        timing: LinkTiming,
    ) -> Self {
        let (states, _) = watch::channel(LinkStates::new());
        Self {
            shared: Arc::new(Shared {
                backend,
                popup,
                notifier,
                timing,
                states,
                listeners: Mutex::new(Vec::new()),
            }),
            polls: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a listener without keeping it alive.
    pub fn add_listener(&self, listener: Weak<dyn OnLinked>) {
        self.shared
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn state(&self, platform: Platform) -> LinkState {
        self.shared
            .states
            .borrow()
            .get(&platform)
            .copied()
            .unwrap_or_default()
    }

    pub fn subscribe(&self) -> watch::Receiver<LinkStates> {
        self.shared.states.subscribe()
    }

    /// Asks the backend whether `platform` is linked. Failures count as unlinked.
    pub async fn check_link(&self, platform: Platform) -> bool {
        self.shared.check(platform).await
    }

    pub async fn begin_link(&self, platform: Platform) -> Result<LinkHandle, LinkError> {
        let url = match self.shared.backend.link_url(platform).await {
            Ok(link) if !link.url.trim().is_empty() => link.url,
            Ok(_) => {
                self.shared
                    .notifier
                    .notify(Notice::error("Failed to create authorization URL."));
                return Err(LinkError::MissingUrl);
            }
            Err(err) => {
                tracing::warn!(%platform, "failed to request link url: {}", err);
                self.shared.notifier.notify(Notice::error(format!(
                    "Unable to connect to {}. Please try again.",
                    platform.display_name()
                )));
                return Err(err.into());
            }
        };
        self.open(platform, &url)
    }

    /// Starts a fresh consent flow, falling back to [`Self::begin_link`]
    /// when the backend has no reconnect URL.
    pub async fn force_reconnect(&self, platform: Platform) -> Result<LinkHandle, LinkError> {
        let url = match self.shared.backend.force_reconnect(platform).await {
            Ok(reconnect) => reconnect.url.filter(|url| !url.trim().is_empty()),
            Err(err) => {
                tracing::warn!(%platform, "force reconnect failed: {}", err);
                None
            }
        };
        match url {
            Some(url) => self.open(platform, &url),
            None => {
                tracing::info!(%platform, "no reconnect url, falling back to link flow");
                self.begin_link(platform).await
            }
        }
    }

    fn open(&self, platform: Platform, url: &str) -> Result<LinkHandle, LinkError> {
        self.cancel(platform);
        let window = match self.shared.popup.open(url) {
            Some(window) => window,
            None => {
                self.shared.set_state(platform, LinkState::PopupBlocked);
                self.shared.notifier.notify(Notice::error(
                    "Popup blocked. Please allow popups for this site.",
                ));
                return Err(LinkError::PopupBlocked);
            }
        };
        self.shared.set_state(platform, LinkState::Linking);

        let token = CancellationToken::new();
        let previous = self
            .polls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(platform, token.clone());
        if let Some(previous) = previous {
            tracing::debug!(%platform, "replacing link poll");
            previous.cancel();
        }

        let shared = self.shared.clone();
        let done = token.clone();
        let poll_token = token.clone();
        tokio::spawn(async move {
            shared.poll(platform, window, poll_token).await;
            done.cancel();
        });
        Ok(LinkHandle { platform, token })
    }

    pub fn cancel(&self, platform: Platform) {
        let previous = self
            .polls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&platform);
        if let Some(token) = previous {
            tracing::debug!(%platform, "cancelling link poll");
            token.cancel();
        }
    }

    pub fn cancel_all(&self) {
        let polls = std::mem::take(&mut *self.polls.lock().unwrap_or_else(PoisonError::into_inner));
        for (_, token) in polls {
            token.cancel();
        }
    }
}

impl Drop for LinkMonitor {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
