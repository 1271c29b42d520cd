use super::StoreError;
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;

/// JSON file persistence.
///
/// Both directions are synchronous so callers can persist inside a lock
/// scope without a suspension point between mutation and write.
pub trait Persist: Serialize + DeserializeOwned {
    fn load<P: AsRef<Path>>(file: P) -> Result<Self, StoreError> {
        let buf = std::fs::read_to_string(file)?;
        let deser = serde_json::from_str::<Self>(&buf).map_err(StoreError::Parse)?;
        Ok(deser)
    }

    fn save<P: AsRef<Path>>(&self, file: P) -> Result<(), StoreError> {
        if let Some(parent) = file.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(file)?;
        serde_json::to_writer_pretty(&file, &self)?;
        Ok(())
    }
}

/// Removes a persisted file; a file that is already gone is not an error.
pub fn erase<P: AsRef<Path>>(file: P) -> Result<(), StoreError> {
    match std::fs::remove_file(file) {
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
        _ => Ok(()),
    }
}
