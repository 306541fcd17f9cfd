pub mod json;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::PersistenceError;
use crate::launch::LaunchSet;
use crate::settings::{StoreKind, StoreSettings};

pub use json::JsonStore;
pub use sqlite::SqliteStore;

/// Logical name the launch set is stored under.
pub const LAUNCHES_KEY: &str = "launches";

/// Durable home of the most recent launch set. Each save replaces the previous one.
#[async_trait]
pub trait LaunchStore: Send + Sync {
    async fn save(&self, launches: &LaunchSet) -> Result<(), PersistenceError>;

    /// Empty set if nothing was stored yet.
    async fn load(&self) -> Result<LaunchSet, PersistenceError>;
}

pub fn open(settings: &StoreSettings) -> Box<dyn LaunchStore> {
    match settings.kind {
        StoreKind::Json => Box::new(JsonStore::new(&settings.path)),
        StoreKind::Sqlite => Box::new(SqliteStore::new(&settings.path)),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// In-memory store; `fail` makes every save error out.
    #[derive(Default)]
    pub struct MemoryStore {
        pub saved: Mutex<Option<LaunchSet>>,
        pub fail: bool,
    }

    #[async_trait]
    impl LaunchStore for MemoryStore {
        async fn save(&self, launches: &LaunchSet) -> Result<(), PersistenceError> {
            if self.fail {
                return Err(PersistenceError::NotAnObject("memory".into()));
            }
            *self.saved.lock().unwrap() = Some(launches.clone());
            Ok(())
        }

        async fn load(&self) -> Result<LaunchSet, PersistenceError> {
            Ok(self.saved.lock().unwrap().clone().unwrap_or_default())
        }
    }
}
