use crate::error::ApiError;
use async_trait::async_trait;
use penguinshift_model::{
    DownloadFormat, LinkStatus, LinkUrl, Platform, PlaylistPage, ReconnectUrl, TransferCreated,
    TransferJob, TransferRequest,
};
use penguinshift_store::TokenCache;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use std::sync::Arc;

macro_rules! api {
    ($base:expr, $path:expr) => {
        $base.join(&$path)
    };
}

/// The backend REST API the client orchestrates.
///
/// The backend performs OAuth exchanges, playlist retrieval and matching;
/// the client only issues these calls.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn link_status(&self, platform: Platform) -> Result<LinkStatus, ApiError>;

    async fn link_url(&self, platform: Platform) -> Result<LinkUrl, ApiError>;

    /// A fresh consent URL that bypasses any cached grant.
    async fn force_reconnect(&self, platform: Platform) -> Result<ReconnectUrl, ApiError>;

    async fn source_playlists(&self, platform: Platform) -> Result<PlaylistPage, ApiError>;

    async fn destination_playlists(&self, platform: Platform) -> Result<PlaylistPage, ApiError>;

    async fn start_transfer(&self, request: &TransferRequest) -> Result<TransferCreated, ApiError>;

    async fn transfer_status(&self, transfer_id: u64) -> Result<TransferJob, ApiError>;

    async fn download(&self, transfer_id: u64, format: DownloadFormat)
        -> Result<Vec<u8>, ApiError>;

    /// Legacy CSV export of unmatched tracks.
    async fn download_unmatched(&self, transfer_id: u64) -> Result<Vec<u8>, ApiError>;

    async fn unmatched_json(&self, transfer_id: u64) -> Result<serde_json::Value, ApiError>;
}

pub type DynBackend = Arc<dyn Backend>;

/// [`Backend`] over HTTP.
///
/// Every request shares one cookie jar and carries the cached bearer token.
#[derive(Clone)]
pub struct HttpBackend {
    base: Url,
    client: Arc<reqwest::Client>,
    token: TokenCache,
}

impl std::fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackend")
            .field("base", &self.base.as_str())
            .finish()
    }
}

impl HttpBackend {
    pub fn new(api_base: &str, token: TokenCache) -> Result<Self, ApiError> {
        let mut base = Url::parse(api_base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = reqwest::Client::builder().cookie_store(true).build()?;
        Ok(Self {
            base,
            client: Arc::new(client),
            token,
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(bearer) = self
            .token
            .get()
            .map(|token| format!("Bearer {}", token))
            .and_then(|value| HeaderValue::from_str(value.as_str()).ok())
        {
            headers.insert(HeaderName::from_static("authorization"), bearer);
        }
        headers
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request
            .headers(self.auth_headers())
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;
        let response = error_for_status(response).await?;
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map_or(false, |value| value.contains("application/json"));
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|err| {
            if is_json {
                ApiError::Json(err)
            } else if text.trim().is_empty() {
                ApiError::NotJson("Non-JSON response from server".to_string())
            } else {
                ApiError::NotJson(text)
            }
        })
    }

    async fn blob(&self, request: RequestBuilder) -> Result<Vec<u8>, ApiError> {
        let response = request.headers(self.auth_headers()).send().await?;
        let response = error_for_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Turns a non-2xx response into [`ApiError::Status`], keeping the body text.
async fn error_for_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let body = if text.is_empty() {
        status.canonical_reason().unwrap_or_default().to_string()
    } else {
        text
    };
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl Backend for HttpBackend {
    async fn link_status(&self, platform: Platform) -> Result<LinkStatus, ApiError> {
        let url = api!(self.base, "api/platforms/link-status")?;
        self.json(self.client.get(url).query(&[("platform", platform.as_ref())]))
            .await
    }

    async fn link_url(&self, platform: Platform) -> Result<LinkUrl, ApiError> {
        let url = api!(self.base, "api/platforms/link-url")?;
        let body = serde_json::json!({ "platform": platform });
        self.json(self.client.post(url).body(body.to_string())).await
    }

    async fn force_reconnect(&self, platform: Platform) -> Result<ReconnectUrl, ApiError> {
        let url = api!(self.base, format!("api/platforms/force-reconnect/{}", platform))?;
        self.json(self.client.post(url)).await
    }

    async fn source_playlists(&self, platform: Platform) -> Result<PlaylistPage, ApiError> {
        let url = api!(self.base, "api/playlists/source")?;
        self.json(self.client.get(url).query(&[("platform", platform.as_ref())]))
            .await
    }

    async fn destination_playlists(&self, platform: Platform) -> Result<PlaylistPage, ApiError> {
        let url = api!(self.base, "api/playlists/destination")?;
        self.json(self.client.get(url).query(&[("platform", platform.as_ref())]))
            .await
    }

    async fn start_transfer(&self, request: &TransferRequest) -> Result<TransferCreated, ApiError> {
        let url = api!(self.base, "api/transfer")?;
        let body = serde_json::to_string(request)?;
        self.json(self.client.post(url).body(body)).await
    }

    async fn transfer_status(&self, transfer_id: u64) -> Result<TransferJob, ApiError> {
        let url = api!(self.base, format!("api/transfer/{}", transfer_id))?;
        self.json(self.client.get(url)).await
    }

    async fn download(
        &self,
        transfer_id: u64,
        format: DownloadFormat,
    ) -> Result<Vec<u8>, ApiError> {
        let url = api!(self.base, format!("api/transfer/{}/download", transfer_id))?;
        self.blob(self.client.get(url).query(&[("type", format.as_ref())]))
            .await
    }

    async fn download_unmatched(&self, transfer_id: u64) -> Result<Vec<u8>, ApiError> {
        let url = api!(self.base, format!("api/transfer/{}/unmatched", transfer_id))?;
        self.blob(self.client.get(url)).await
    }

    async fn unmatched_json(&self, transfer_id: u64) -> Result<serde_json::Value, ApiError> {
        let url = api!(self.base, format!("api/transfer/{}/unmatched.json", transfer_id))?;
        self.json(self.client.get(url)).await
    }
}
