//! Scripted collaborators for driving the components in tests.

use crate::api::Backend;
use crate::error::ApiError;
use crate::notify::{Notice, Notifier};
use crate::popup::{Popup, PopupWindow};
use async_trait::async_trait;
use penguinshift_model::{
    DownloadFormat, LinkStatus, LinkUrl, Platform, PlaylistPage, PlaylistSummary, ReconnectUrl,
    TransferCreated, TransferJob, TransferProgress, TransferRequest, TransferStatus,
    TransferSummary,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn status(status: u16, body: &str) -> ApiError {
    ApiError::Status {
        status,
        body: body.to_string(),
    }
}

pub fn playlist(id: &str, name: &str, platform: Platform) -> PlaylistSummary {
    PlaylistSummary {
        id: id.to_string(),
        name: name.to_string(),
        platform,
        song_count: 10,
        cover_image: None,
    }
}

pub fn running(id: u64, percent: f64) -> TransferJob {
    TransferJob {
        status: TransferStatus::Running,
        progress: Some(TransferProgress {
            percent,
            processed: 0,
            total: 0,
            phase: "Matching".to_string(),
        }),
        ..TransferJob::new(id)
    }
}

pub fn completed(id: u64, matched: u32, unmatched: u32) -> TransferJob {
    TransferJob {
        status: TransferStatus::Completed,
        summary: Some(TransferSummary {
            matched,
            unmatched,
            destination_playlist_id: Some("PL-new".to_string()),
        }),
        ..TransferJob::new(id)
    }
}

pub fn failed(id: u64, error: &str) -> TransferJob {
    TransferJob {
        status: TransferStatus::Failed,
        error: Some(error.to_string()),
        ..TransferJob::new(id)
    }
}

#[derive(Default)]
struct Script {
    link_url: String,
    reconnect_url: Option<String>,
    link_statuses: VecDeque<Result<bool, ApiError>>,
    source: HashMap<Platform, Vec<PlaylistSummary>>,
    destination: HashMap<Platform, Vec<PlaylistSummary>>,
    playlist_errors: VecDeque<ApiError>,
    created: VecDeque<Result<TransferCreated, ApiError>>,
    jobs: VecDeque<Result<TransferJob, ApiError>>,
    last_job: Option<TransferJob>,
    job_delay: Option<Duration>,
    requests: Vec<TransferRequest>,
    download_errors: VecDeque<ApiError>,
    downloads: Vec<(u64, Option<DownloadFormat>)>,
    unmatched: serde_json::Value,
    calls: HashMap<&'static str, usize>,
}

/// A [`Backend`] answering from queued responses.
///
/// Empty queues fall back to: not linked, the configured playlists, and the
/// last transfer job returned.
#[derive(Default)]
pub struct FakeBackend {
    script: Mutex<Script>,
}

impl FakeBackend {
    fn with<R>(&self, f: impl FnOnce(&mut Script) -> R) -> R {
        let mut script = self.script.lock().unwrap();
        f(&mut script)
    }

    fn called(&self, endpoint: &'static str) {
        self.with(|script| *script.calls.entry(endpoint).or_default() += 1);
    }

    pub fn calls(&self, endpoint: &str) -> usize {
        self.with(|script| script.calls.get(endpoint).copied().unwrap_or_default())
    }

    pub fn set_link_url(&self, url: &str) {
        self.with(|script| script.link_url = url.to_string());
    }

    pub fn set_reconnect_url(&self, url: Option<&str>) {
        self.with(|script| script.reconnect_url = url.map(str::to_string));
    }

    pub fn push_link_status(&self, status: Result<bool, ApiError>) {
        self.with(|script| script.link_statuses.push_back(status));
    }

    pub fn set_source_playlists(&self, platform: Platform, playlists: Vec<PlaylistSummary>) {
        self.with(|script| {
            script.source.insert(platform, playlists);
        });
    }

    pub fn set_destination_playlists(&self, platform: Platform, playlists: Vec<PlaylistSummary>) {
        self.with(|script| {
            script.destination.insert(platform, playlists);
        });
    }

    /// Fails the next playlist request, source or destination.
    pub fn fail_playlists(&self, err: ApiError) {
        self.with(|script| script.playlist_errors.push_back(err));
    }

    pub fn push_created(&self, created: Result<TransferCreated, ApiError>) {
        self.with(|script| script.created.push_back(created));
    }

    pub fn push_job(&self, job: Result<TransferJob, ApiError>) {
        self.with(|script| script.jobs.push_back(job));
    }

    /// Makes every status request take `delay`.
    pub fn delay_jobs(&self, delay: Duration) {
        self.with(|script| script.job_delay = Some(delay));
    }

    pub fn requests(&self) -> Vec<TransferRequest> {
        self.with(|script| script.requests.clone())
    }

    pub fn fail_download(&self, err: ApiError) {
        self.with(|script| script.download_errors.push_back(err));
    }

    pub fn downloads(&self) -> Vec<(u64, Option<DownloadFormat>)> {
        self.with(|script| script.downloads.clone())
    }

    pub fn set_unmatched(&self, unmatched: serde_json::Value) {
        self.with(|script| script.unmatched = unmatched);
    }

    fn playlists(
        &self,
        endpoint: &'static str,
        platform: Platform,
        destination: bool,
    ) -> Result<PlaylistPage, ApiError> {
        self.called(endpoint);
        self.with(|script| {
            if let Some(err) = script.playlist_errors.pop_front() {
                return Err(err);
            }
            let playlists = if destination {
                &script.destination
            } else {
                &script.source
            };
            Ok(PlaylistPage {
                items: playlists.get(&platform).cloned().unwrap_or_default(),
            })
        })
    }

    fn blob(&self, transfer_id: u64, format: Option<DownloadFormat>) -> Result<Vec<u8>, ApiError> {
        self.with(|script| {
            if let Some(err) = script.download_errors.pop_front() {
                return Err(err);
            }
            script.downloads.push((transfer_id, format));
            let name = format.map_or("unmatched", DownloadFormat::extension);
            Ok(format!("{}:{}", transfer_id, name).into_bytes())
        })
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn link_status(&self, _platform: Platform) -> Result<LinkStatus, ApiError> {
        self.called("link_status");
        let status = self.with(|script| script.link_statuses.pop_front());
        status
            .unwrap_or(Ok(false))
            .map(|linked| LinkStatus { linked })
    }

    async fn link_url(&self, _platform: Platform) -> Result<LinkUrl, ApiError> {
        self.called("link_url");
        Ok(LinkUrl {
            url: self.with(|script| script.link_url.clone()),
        })
    }

    async fn force_reconnect(&self, _platform: Platform) -> Result<ReconnectUrl, ApiError> {
        self.called("force_reconnect");
        Ok(ReconnectUrl {
            url: self.with(|script| script.reconnect_url.clone()),
        })
    }

    async fn source_playlists(&self, platform: Platform) -> Result<PlaylistPage, ApiError> {
        self.playlists("source_playlists", platform, false)
    }

    async fn destination_playlists(&self, platform: Platform) -> Result<PlaylistPage, ApiError> {
        self.playlists("destination_playlists", platform, true)
    }

    async fn start_transfer(&self, request: &TransferRequest) -> Result<TransferCreated, ApiError> {
        self.called("start_transfer");
        self.with(|script| {
            script.requests.push(request.clone());
            script.created.pop_front().unwrap_or(Ok(TransferCreated {
                id: 1,
                created_playlist_id: None,
            }))
        })
    }

    async fn transfer_status(&self, transfer_id: u64) -> Result<TransferJob, ApiError> {
        self.called("transfer_status");
        if let Some(delay) = self.with(|script| script.job_delay) {
            tokio::time::sleep(delay).await;
        }
        self.with(|script| match script.jobs.pop_front() {
            Some(Ok(job)) => {
                script.last_job = Some(job.clone());
                Ok(job)
            }
            Some(Err(err)) => Err(err),
            None => Ok(script
                .last_job
                .clone()
                .unwrap_or_else(|| TransferJob::new(transfer_id))),
        })
    }

    async fn download(
        &self,
        transfer_id: u64,
        format: DownloadFormat,
    ) -> Result<Vec<u8>, ApiError> {
        self.called("download");
        self.blob(transfer_id, Some(format))
    }

    async fn download_unmatched(&self, transfer_id: u64) -> Result<Vec<u8>, ApiError> {
        self.called("download_unmatched");
        self.blob(transfer_id, None)
    }

    async fn unmatched_json(&self, _transfer_id: u64) -> Result<serde_json::Value, ApiError> {
        self.called("unmatched_json");
        self.with(|script| {
            if let Some(err) = script.download_errors.pop_front() {
                return Err(err);
            }
            Ok(script.unmatched.clone())
        })
    }
}

#[derive(Default)]
struct WindowFlags {
    closed_by_user: AtomicBool,
    closed_by_client: AtomicBool,
}

struct FakeWindow(Arc<WindowFlags>);

impl PopupWindow for FakeWindow {
    fn is_closed(&self) -> bool {
        self.0.closed_by_user.load(Ordering::SeqCst) || self.0.closed_by_client.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.0.closed_by_client.store(true, Ordering::SeqCst);
    }
}

/// Records opened URLs; the most recent window can be closed by the "user".
#[derive(Default)]
pub struct FakePopup {
    blocked: AtomicBool,
    opened: Mutex<Vec<String>>,
    window: Mutex<Arc<WindowFlags>>,
}

impl FakePopup {
    pub fn block(&self) {
        self.blocked.store(true, Ordering::SeqCst);
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    pub fn close_by_user(&self) {
        self.window
            .lock()
            .unwrap()
            .closed_by_user
            .store(true, Ordering::SeqCst);
    }

    pub fn closed_by_client(&self) -> bool {
        self.window
            .lock()
            .unwrap()
            .closed_by_client
            .load(Ordering::SeqCst)
    }
}

impl Popup for FakePopup {
    fn open(&self, url: &str) -> Option<Box<dyn PopupWindow>> {
        if self.blocked.load(Ordering::SeqCst) {
            return None;
        }
        self.opened.lock().unwrap().push(url.to_string());
        let flags = Arc::new(WindowFlags::default());
        *self.window.lock().unwrap() = flags.clone();
        Some(Box::new(FakeWindow(flags)))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.notices()
            .iter()
            .filter_map(Notice::message)
            .map(str::to_string)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}
