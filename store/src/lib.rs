mod config;
mod persist;
mod selection;
mod token;

pub use config::{Config, DEFAULT_API_BASE};
pub use persist::{erase, Persist};
pub use selection::SelectionStore;
pub use token::{looks_like_jwt, TokenCache};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error reading or writing client state: {0}")]
    IO(#[from] std::io::Error),
    #[error("failed to parse client state: {0}")]
    Parse(#[from] serde_json::Error),
}
