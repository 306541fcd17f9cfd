use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

pub const MANIFEST_URL: &str = "https://www.reddit.com/r/SpaceX/wiki/launches/manifest";
const DEFAULT_CONFIG_FILE: &str = "launch_sync";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub manifest_url: String,
    /// Element id the launch table follows.
    pub anchor_id: String,
    pub user_agent: String,
    pub columns: Columns,
    pub calendar: CalendarSettings,
    pub auth: AuthSettings,
    pub store: StoreSettings,
}

/// Cell positions in a manifest row.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct Columns {
    pub date: usize,
    pub vehicle: usize,
    pub payload: usize,
    pub customer: usize,
}

impl Columns {
    /// Minimum cell count a row needs.
    pub fn required(&self) -> usize {
        [self.date, self.vehicle, self.payload, self.customer]
            .into_iter()
            .max()
            .unwrap_or(0)
            + 1
    }
}

impl Default for Columns {
    fn default() -> Self {
        Columns { date: 0, vehicle: 1, payload: 5, customer: 6 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarSettings {
    pub id: String,
    pub api_base: String,
    pub source_title: String,
    pub source_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Json,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    pub kind: StoreKind,
    pub path: PathBuf,
}

impl Settings {
    /// Defaults, then `launch_sync.toml` (or `path`), then `LAUNCH_SYNC__*` env vars.
    pub fn load(path: Option<&Path>) -> Result<Settings> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        Self::builder()?
            .add_source(file)
            .add_source(Environment::with_prefix("LAUNCH_SYNC").separator("__"))
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let columns = Columns::default();
        Ok(Config::builder()
            .set_default("manifest_url", MANIFEST_URL)?
            .set_default("anchor_id", "wiki_upcoming_falcon_launches")?
            .set_default("user_agent", concat!("launch_sync/", env!("CARGO_PKG_VERSION")))?
            .set_default("columns.date", columns.date as i64)?
            .set_default("columns.vehicle", columns.vehicle as i64)?
            .set_default("columns.payload", columns.payload as i64)?
            .set_default("columns.customer", columns.customer as i64)?
            .set_default("calendar.id", "csrgj6c96oqealf0di0jl0km58@group.calendar.google.com")?
            .set_default("calendar.api_base", "https://www.googleapis.com/calendar/v3/")?
            .set_default("calendar.source_title", "r/SpaceX Launch Manifest")?
            .set_default("calendar.source_url", MANIFEST_URL)?
            .set_default("auth.credentials_path", "credentials.json")?
            .set_default("auth.token_path", "token.json")?
            .set_default("store.kind", "json")?
            .set_default("store.path", "db.json")?)
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let s: Settings = Settings::builder().unwrap().build().unwrap().try_deserialize().unwrap();
        assert_eq!(s.columns, Columns::default());
        assert_eq!(s.anchor_id, "wiki_upcoming_falcon_launches");
        assert_eq!(s.store.kind, StoreKind::Json);
        assert_eq!(s.store.path, PathBuf::from("db.json"));
        assert_eq!(s.calendar.source_url, MANIFEST_URL);
    }

    #[test]
    fn file_overrides_defaults() {
        let mut f = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(f, "[store]\nkind = \"sqlite\"\npath = \"launches.sqlite\"\n[columns]\npayload = 4").unwrap();
        let s = Settings::load(Some(f.path())).unwrap();
        assert_eq!(s.store.kind, StoreKind::Sqlite);
        assert_eq!(s.columns.payload, 4);
        assert_eq!(s.columns.customer, 6);
    }

    #[test]
    fn fixture_file_overrides_only_what_it_names() {
        let s = Settings::load(Some(Path::new("tests/fixtures/launch_sync.toml"))).unwrap();
        assert_eq!(s.calendar.id, "test-calendar@group.calendar.google.com");
        assert_eq!(s.calendar.source_title, "r/SpaceX Launch Manifest");
        assert_eq!(s.store.kind, StoreKind::Json);
        assert_eq!(s.store.path, PathBuf::from("db.json"));
    }

    #[test]
    fn required_columns() {
        assert_eq!(Columns::default().required(), 7);
        let c = Columns { date: 3, vehicle: 0, payload: 1, customer: 2 };
        assert_eq!(c.required(), 4);
    }
}
