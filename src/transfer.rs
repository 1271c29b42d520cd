use crate::api::DynBackend;
use crate::destination::DestinationStep;
use crate::error::{mentions_unauthorized, ShiftError};
use crate::notify::{Notice, Notifier};
use penguinshift_model::{
    Platform, SelectionPatch, TransferCreated, TransferJob, TransferRequest, TransferStatus,
};
use penguinshift_store::{SelectionStore, TokenCache};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Results can be downloaded once a job completed, or failed after matching.
pub fn downloads_ready(job: &TransferJob) -> bool {
    match job.status {
        TransferStatus::Completed => true,
        TransferStatus::Failed => job.summary.is_some(),
        _ => false,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferOptions {
    pub create_new: bool,
    pub name: String,
    pub description: String,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            create_new: true,
            name: String::new(),
            description: String::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferPhase {
    Polling,
    Completed,
    Failed { reconnect: bool },
    /// Polling gave up after a request failed.
    Errored { message: String, reconnect: bool },
    Cancelled,
}

/// What a results screen shows for one transfer.
#[derive(Clone, Debug, PartialEq)]
pub struct TransferView {
    pub transfer_id: u64,
    pub job: Option<TransferJob>,
    pub phase: TransferPhase,
}

impl TransferView {
    fn new(transfer_id: u64) -> Self {
        Self {
            transfer_id,
            job: None,
            phase: TransferPhase::Polling,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.phase != TransferPhase::Polling
    }

    pub fn status(&self) -> Option<TransferStatus> {
        self.job.as_ref().map(|job| job.status)
    }

    pub fn percent(&self) -> f64 {
        self.job.as_ref().map_or(0.0, TransferJob::percent)
    }

    pub fn total_songs(&self) -> u32 {
        self.job
            .as_ref()
            .and_then(|job| job.summary.as_ref())
            .map_or(0, |summary| summary.total())
    }

    pub fn downloads_enabled(&self) -> bool {
        self.job.as_ref().map_or(false, downloads_ready)
    }
}

/// Observes one transfer's poll loop. Dropping it stops the loop.
#[derive(Debug)]
pub struct TransferWatch {
    transfer_id: u64,
    view: watch::Receiver<TransferView>,
    token: CancellationToken,
}

impl TransferWatch {
    pub fn transfer_id(&self) -> u64 {
        self.transfer_id
    }

    pub fn view(&self) -> TransferView {
        self.view.borrow().clone()
    }

    /// Waits for the next update; `None` once the loop has ended.
    pub async fn changed(&mut self) -> Option<TransferView> {
        match self.view.changed().await {
            Ok(()) => Some(self.view()),
            Err(_) => None,
        }
    }

    /// Waits until the loop reaches a terminal phase.
    pub async fn finished(&mut self) -> TransferView {
        loop {
            let view = self.view();
            if view.is_finished() {
                return view;
            }
            if self.view.changed().await.is_err() {
                return self.view();
            }
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl Drop for TransferWatch {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

struct PollContext {
    backend: DynBackend,
    token_cache: TokenCache,
    notifier: Arc<dyn Notifier>,
    destination: Arc<DestinationStep>,
    interval: Duration,
    source: Option<Platform>,
}

impl PollContext {
    async fn run(self, transfer_id: u64, view: watch::Sender<TransferView>, token: CancellationToken) {
        let mut job = TransferJob::new(transfer_id);
        loop {
            let status = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                status = self.backend.transfer_status(transfer_id) => status,
            };
            if token.is_cancelled() {
                break;
            }
            let (phase, update) = match status {
                Ok(next) => {
                    job.merge(next);
                    tracing::debug!(
                        transfer_id,
                        status = %job.status,
                        percent = job.percent(),
                        "transfer status"
                    );
                    (self.phase_of(&job), Some(job.clone()))
                }
                Err(err) => (self.poll_failed(transfer_id, &err), None),
            };
            let finished = phase != TransferPhase::Polling;
            view.send_modify(|view| {
                if let Some(update) = update {
                    view.job = Some(update);
                }
                view.phase = phase;
            });
            if finished {
                if job.status.is_terminal() {
                    self.refresh_destination().await;
                }
                return;
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        tracing::debug!(transfer_id, "transfer polling cancelled");
        view.send_modify(|view| {
            if !view.is_finished() {
                view.phase = TransferPhase::Cancelled;
            }
        });
    }

    fn phase_of(&self, job: &TransferJob) -> TransferPhase {
        match job.status {
            TransferStatus::Completed => {
                tracing::info!(transfer_id = job.id, "transfer completed");
                self.notifier
                    .notify(Notice::success("Your playlist transfer finished successfully!"));
                TransferPhase::Completed
            }
            TransferStatus::Failed => {
                let reconnect = job.error.as_deref().map_or(false, mentions_unauthorized);
                tracing::warn!(transfer_id = job.id, error = ?job.error, "transfer failed");
                if reconnect {
                    self.expire_session();
                }
                self.notifier
                    .notify(Notice::error("Your playlist shift failed. Please try again."));
                TransferPhase::Failed { reconnect }
            }
            TransferStatus::Pending | TransferStatus::Running => TransferPhase::Polling,
        }
    }

    fn poll_failed(&self, transfer_id: u64, err: &crate::error::ApiError) -> TransferPhase {
        tracing::warn!(transfer_id, "failed to poll transfer status: {}", err);
        let reconnect = err.is_unauthorized();
        let message = if reconnect {
            self.expire_session();
            "Your connection has expired. Please reconnect your account."
        } else {
            "We couldn't update your transfer status. Please check your connection or try again shortly."
        };
        self.notifier.notify(Notice::error(message));
        TransferPhase::Errored {
            message: message.to_string(),
            reconnect,
        }
    }

    fn expire_session(&self) {
        self.token_cache.purge();
        self.notifier.notify(Notice::Reconnect {
            platform: self.source,
        });
    }

    async fn refresh_destination(&self) {
        if let Err(err) = self.destination.refresh_playlists().await {
            tracing::debug!("destination playlists not refreshed: {}", err);
        }
    }
}

/// Submits transfers and follows them to a terminal state.
pub struct TransferOrchestrator {
    backend: DynBackend,
    store: SelectionStore,
    token_cache: TokenCache,
    notifier: Arc<dyn Notifier>,
    destination: Arc<DestinationStep>,
    interval: Duration,
    current: Mutex<Option<CancellationToken>>,
}

impl std::fmt::Debug for TransferOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferOrchestrator")
            .field("interval", &self.interval)
            .finish()
    }
}

impl TransferOrchestrator {
    pub fn new(
        backend: DynBackend,
        store: SelectionStore,
        token_cache: TokenCache,
        notifier: Arc<dyn Notifier>,
        destination: Arc<DestinationStep>,
        interval: Duration,
    ) -> Self {
        Self {
            backend,
            store,
            token_cache,
            notifier,
            destination,
            interval,
            current: Mutex::new(None),
        }
    }

    fn request(&self, options: &TransferOptions) -> Result<TransferRequest, ShiftError> {
        let state = self.store.read();
        let source = state.source_platform.ok_or(ShiftError::NoSourcePlatform)?;
        if state.selected_playlist_ids.is_empty() {
            return Err(ShiftError::NothingSelected);
        }
        if options.create_new && options.name.trim().is_empty() {
            return Err(ShiftError::MissingPlaylistName);
        }
        Ok(TransferRequest {
            source_platform: source,
            destination_platform: source.opposite(),
            playlist_ids: state.selected_playlist_ids.iter().cloned().collect(),
            create_new: options.create_new,
            new_playlist_name: options.name.clone(),
            new_playlist_description: options.description.clone(),
            include_tracks: state.include_tracks,
        })
    }

    pub fn can_start(&self, options: &TransferOptions) -> bool {
        self.request(options).is_ok()
    }

    /// Submits the current selection and records the new transfer as active.
    ///
    /// The destination platform must be linked.
    pub async fn start(&self, options: &TransferOptions) -> Result<TransferCreated, ShiftError> {
        let request = self.request(options)?;
        if !self.destination.ensure_linked().await {
            tracing::warn!(
                destination = %request.destination_platform,
                "refusing to start transfer: destination not linked"
            );
            return Err(ShiftError::DestinationNotLinked(
                request.destination_platform,
            ));
        }
        tracing::info!(
            source = %request.source_platform,
            destination = %request.destination_platform,
            playlists = request.playlist_ids.len(),
            "starting transfer"
        );
        match self.backend.start_transfer(&request).await {
            Ok(created) => {
                tracing::info!(transfer_id = created.id, "transfer started");
                self.store
                    .update(SelectionPatch::default().transfer(Some(created.id)));
                Ok(created)
            }
            Err(err) => {
                tracing::warn!("failed to start transfer: {}", err);
                self.notifier.notify(Notice::error(
                    "We couldn't start the transfer. Please check your connection and try again.",
                ));
                Err(err.into())
            }
        }
    }

    /// A single status request, without notices.
    pub async fn fetch(&self, transfer_id: u64) -> Result<TransferJob, ShiftError> {
        Ok(self.backend.transfer_status(transfer_id).await?)
    }

    /// Polls `transfer_id` until it is terminal, replacing any earlier poll.
    pub fn poll(&self, transfer_id: u64) -> TransferWatch {
        let token = CancellationToken::new();
        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        let (sender, view) = watch::channel(TransferView::new(transfer_id));
        let context = PollContext {
            backend: self.backend.clone(),
            token_cache: self.token_cache.clone(),
            notifier: self.notifier.clone(),
            destination: self.destination.clone(),
            interval: self.interval,
            source: self.store.read().source_platform,
        };
        tokio::spawn(context.run(transfer_id, sender, token.clone()));
        TransferWatch {
            transfer_id,
            view,
            token,
        }
    }

    /// Polls the transfer recorded in the selection store.
    pub fn poll_active(&self) -> Result<TransferWatch, ShiftError> {
        let transfer_id = self
            .store
            .read()
            .active_transfer_id
            .ok_or(ShiftError::NoActiveTransfer)?;
        Ok(self.poll(transfer_id))
    }

    pub fn cancel(&self) {
        if let Some(current) = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            current.cancel();
        }
    }

    /// Stops polling and forgets the selection and active transfer.
    pub fn start_new(&self) {
        self.cancel();
        self.store.reset();
    }
}

impl Drop for TransferOrchestrator {
    fn drop(&mut self) {
        self.cancel();
    }
}
