use super::{Platform, TrackInclusion};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use strum::{AsRefStr, Display};

/// Server-side lifecycle of a transfer job.
///
/// `PENDING -> RUNNING -> {COMPLETED, FAILED}`; terminal states never change.
#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Debug, Display, AsRefStr)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TransferStatus {
    fn rank(self) -> u8 {
        match self {
            TransferStatus::Pending => 0,
            TransferStatus::Running => 1,
            TransferStatus::Completed | TransferStatus::Failed => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TransferStatus::Completed | TransferStatus::Failed)
    }

    /// The status after observing `next`; never moves backwards.
    pub fn advance(self, next: TransferStatus) -> TransferStatus {
        if self.is_terminal() || next.rank() < self.rank() {
            self
        } else {
            next
        }
    }
}

#[derive(Clone, Default, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransferProgress {
    #[serde(default)]
    pub percent: f64,
    #[serde(default)]
    pub processed: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub phase: String,
}

#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSummary {
    #[serde(default)]
    pub matched: u32,
    #[serde(default)]
    pub unmatched: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_playlist_id: Option<String>,
}

impl TransferSummary {
    pub fn total(&self) -> u32 {
        self.matched + self.unmatched
    }
}

/// Read-only mirror of a backend transfer job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawTransferJob")]
pub struct TransferJob {
    pub id: u64,
    pub status: TransferStatus,
    pub progress: Option<TransferProgress>,
    pub summary: Option<TransferSummary>,
    pub error: Option<String>,
}

// The status endpoint has shipped two shapes: nested progress/summary
// objects, and flat `percent`/`phase`/`unmatched` fields.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTransferJob {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    transfer_id: Option<u64>,
    status: TransferStatus,
    #[serde(default)]
    progress: Option<TransferProgress>,
    #[serde(default)]
    summary: Option<TransferSummary>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    percent: Option<f64>,
    #[serde(default)]
    phase: Option<String>,
    #[serde(default)]
    processed: Option<u32>,
    #[serde(default)]
    total: Option<u32>,
    #[serde(default)]
    matched: Option<u32>,
    #[serde(default)]
    unmatched: Option<u32>,
    #[serde(default)]
    created_playlist_id: Option<String>,
}

impl From<RawTransferJob> for TransferJob {
    fn from(raw: RawTransferJob) -> Self {
        let flat_progress = raw.percent.is_some() || raw.phase.is_some();
        let progress = raw.progress.or_else(|| {
            flat_progress.then(|| TransferProgress {
                percent: raw.percent.unwrap_or_default(),
                processed: raw.processed.unwrap_or_default(),
                total: raw.total.unwrap_or_default(),
                phase: raw.phase.clone().unwrap_or_default(),
            })
        });
        let flat_summary =
            raw.matched.is_some() || raw.unmatched.is_some() || raw.created_playlist_id.is_some();
        let summary = raw.summary.or_else(|| {
            flat_summary.then(|| TransferSummary {
                matched: raw.matched.unwrap_or_default(),
                unmatched: raw.unmatched.unwrap_or_default(),
                destination_playlist_id: raw.created_playlist_id.clone(),
            })
        });
        TransferJob {
            id: raw.id.or(raw.transfer_id).unwrap_or_default(),
            status: raw.status,
            progress,
            summary,
            error: raw.error.or(raw.message),
        }
    }
}

impl TransferJob {
    pub fn new(id: u64) -> Self {
        TransferJob {
            id,
            status: TransferStatus::Pending,
            progress: None,
            summary: None,
            error: None,
        }
    }

    /// Folds a fresher response into this mirror.
    ///
    /// Returns `false` when the job was already terminal and nothing changed.
    pub fn merge(&mut self, next: TransferJob) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = self.status.advance(next.status);
        if next.progress.is_some() {
            self.progress = next.progress;
        }
        if next.summary.is_some() {
            self.summary = next.summary;
        }
        if next.error.is_some() {
            self.error = next.error;
        }
        true
    }

    pub fn percent(&self) -> f64 {
        match (self.status, &self.progress) {
            (TransferStatus::Completed, _) => 100.0,
            (_, Some(progress)) => progress.percent,
            _ => 0.0,
        }
    }

    pub fn phase(&self) -> &str {
        self.progress
            .as_ref()
            .map(|progress| progress.phase.as_str())
            .filter(|phase| !phase.is_empty())
            .unwrap_or_else(|| self.status.as_ref())
    }
}

/// Body of `POST /api/transfer`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub source_platform: Platform,
    pub destination_platform: Platform,
    pub playlist_ids: Vec<String>,
    pub create_new: bool,
    pub new_playlist_name: String,
    pub new_playlist_description: String,
    pub include_tracks: BTreeMap<String, TrackInclusion>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferCreated {
    pub id: u64,
    #[serde(default)]
    pub created_playlist_id: Option<String>,
}

#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Debug, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DownloadFormat {
    Csv,
    Pdf,
    Json,
}

impl DownloadFormat {
    pub fn extension(self) -> &'static str {
        match self {
            DownloadFormat::Csv => "csv",
            DownloadFormat::Pdf => "pdf",
            DownloadFormat::Json => "json",
        }
    }
}

impl FromStr for DownloadFormat {
    type Err = super::ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(DownloadFormat::Csv),
            "pdf" => Ok(DownloadFormat::Pdf),
            "json" => Ok(DownloadFormat::Json),
            other => Err(super::ParseError::UnknownFormat(other.to_string())),
        }
    }
}
