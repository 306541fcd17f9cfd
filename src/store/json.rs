use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use super::{LaunchStore, LAUNCHES_KEY};
use crate::error::PersistenceError;
use crate::launch::LaunchSet;

/// A JSON document whose `launches` key holds the set. Other keys are left alone.
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        JsonStore { path: path.as_ref().to_path_buf() }
    }

    fn io(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io { path: self.path.display().to_string(), source }
    }

    async fn read_document(&self) -> Result<Map<String, Value>, PersistenceError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(self.io(e)),
        };
        match serde_json::from_str::<Value>(&text)? {
            Value::Object(map) => Ok(map),
            _ => Err(PersistenceError::NotAnObject(self.path.display().to_string())),
        }
    }
}

#[async_trait]
impl LaunchStore for JsonStore {
    async fn save(&self, launches: &LaunchSet) -> Result<(), PersistenceError> {
        let mut doc = self.read_document().await?;
        doc.insert(LAUNCHES_KEY.to_string(), serde_json::to_value(launches)?);
        let body = serde_json::to_string_pretty(&Value::Object(doc))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, body).await.map_err(|e| self.io(e))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| self.io(e))?;

        debug!(path = %self.path.display(), count = launches.len(), "Saved launches");
        Ok(())
    }

    async fn load(&self) -> Result<LaunchSet, PersistenceError> {
        let mut doc = self.read_document().await?;
        match doc.remove(LAUNCHES_KEY) {
            Some(v) => Ok(serde_json::from_value(v)?),
            None => Ok(LaunchSet::default()),
        }
    }
}

// ── Tests ──
