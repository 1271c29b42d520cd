use super::{Persist, StoreError};
use penguinshift_model::serialization::duration_millis;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://penguinshift-production.up.railway.app/";

const CONFIG_FILE: &str = "config.json";
const SELECTION_FILE: &str = "selection.json";
const TOKEN_FILE: &str = "auth.json";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip)]
    pub data_dir: PathBuf,
    pub api_base: String,
    /// Delay between link-status polls while the authorization popup is open.
    #[serde(rename = "link_poll_interval_ms", with = "duration_millis")]
    pub link_poll_interval: Duration,
    /// How long a popup may stay unconfirmed before linking is abandoned.
    #[serde(rename = "link_timeout_ms", with = "duration_millis")]
    pub link_timeout: Duration,
    #[serde(rename = "transfer_poll_interval_ms", with = "duration_millis")]
    pub transfer_poll_interval: Duration,
    #[serde(rename = "search_debounce_ms", with = "duration_millis")]
    pub search_debounce: Duration,
    pub download_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            link_poll_interval: Duration::from_millis(1200),
            link_timeout: Duration::from_secs(120),
            transfer_poll_interval: Duration::from_millis(2000),
            search_debounce: Duration::from_millis(180),
            download_dir: None,
        }
    }
}

impl Persist for Config {}

impl Config {
    /// `~/.penguinshift`, if a home directory is known.
    pub fn default_data_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".penguinshift"))
    }

    /// Loads `config.json` from `data_dir`, writing the defaults on first use.
    pub async fn open<T: AsRef<Path> + Send + Sync>(data_dir: T) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(&data_dir).await?;
        let config_file = data_dir.as_ref().join(CONFIG_FILE);

        let config = match Config::load(&config_file) {
            Ok(config) => config,
            Err(err) => {
                tracing::debug!(file = %config_file.display(), "using default config: {}", err);
                let config = Config::default();
                config.save(&config_file)?;
                config
            }
        };
        tracing::debug!(api_base = %config.api_base, "loaded config");
        Ok(Self {
            data_dir: data_dir.as_ref().to_owned(),
            ..config
        })
    }

    pub fn config_file(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE)
    }

    pub fn selection_file(&self) -> PathBuf {
        self.data_dir.join(SELECTION_FILE)
    }

    pub fn token_file(&self) -> PathBuf {
        self.data_dir.join(TOKEN_FILE)
    }

    /// Where downloaded reports go when no directory is given.
    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| self.data_dir.join("downloads"))
    }
}
