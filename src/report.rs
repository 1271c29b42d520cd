use crate::api::DynBackend;
use crate::error::ShiftError;
use crate::notify::{Notice, Notifier};
use crate::transfer::downloads_ready;
use penguinshift_model::{DownloadFormat, TransferJob};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Fetches the reports of a finished transfer.
///
/// Downloads never touch polling or the stored selection.
pub struct Reporter {
    backend: DynBackend,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter").finish()
    }
}

fn ensure_ready(job: &TransferJob) -> Result<(), ShiftError> {
    if downloads_ready(job) {
        Ok(())
    } else {
        Err(ShiftError::NotReady(job.status))
    }
}

async fn save(path: &Path, bytes: &[u8]) -> Result<(), ShiftError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;
    tracing::info!(path = %path.display(), size = bytes.len(), "saved report");
    Ok(())
}

impl Reporter {
    pub fn new(backend: DynBackend, notifier: Arc<dyn Notifier>) -> Self {
        Self { backend, notifier }
    }

    /// Saves the report as `transfer-<id>.<ext>` in `dir`.
    pub async fn download(
        &self,
        job: &TransferJob,
        format: DownloadFormat,
        dir: &Path,
    ) -> Result<PathBuf, ShiftError> {
        ensure_ready(job)?;
        let bytes = match self.backend.download(job.id, format).await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(transfer_id = job.id, %format, "download failed: {}", err);
                self.notifier.notify(Notice::error(format!(
                    "We couldn't download the {} file right now. Please try again later.",
                    format.as_ref().to_uppercase()
                )));
                return Err(err.into());
            }
        };
        let path = dir.join(format!("transfer-{}.{}", job.id, format.extension()));
        save(&path, &bytes).await?;
        Ok(path)
    }

    /// Saves the legacy unmatched-songs CSV as `unmatched-<id>.csv`.
    pub async fn download_unmatched(
        &self,
        job: &TransferJob,
        dir: &Path,
    ) -> Result<PathBuf, ShiftError> {
        ensure_ready(job)?;
        let bytes = match self.backend.download_unmatched(job.id).await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(transfer_id = job.id, "unmatched download failed: {}", err);
                self.notifier.notify(Notice::error(
                    "We couldn't download the unmatched songs list right now. Please try again later.",
                ));
                return Err(err.into());
            }
        };
        let path = dir.join(format!("unmatched-{}.csv", job.id));
        save(&path, &bytes).await?;
        Ok(path)
    }

    pub async fn unmatched_json(&self, job: &TransferJob) -> Result<serde_json::Value, ShiftError> {
        ensure_ready(job)?;
        self.backend.unmatched_json(job.id).await.map_err(|err| {
            tracing::warn!(transfer_id = job.id, "unmatched report failed: {}", err);
            self.notifier.notify(Notice::error(
                "We couldn't download the unmatched songs list right now. Please try again later.",
            ));
            err.into()
        })
    }
}
