use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::calendar::{CalendarAuthorizer, EventSource, ReconcileError, Reconciler, SyncReport};
use crate::error::{AuthError, ExtractError, FetchError, PersistenceError};
use crate::fetch::DocumentSource;
use crate::launch::LaunchSet;
use crate::parser::{extract_launches, Extraction};
use crate::settings::Settings;
use crate::store::LaunchStore;

/// A branch that failed after extraction succeeded.
#[derive(Error, Debug)]
pub enum StageFailure {
    #[error("persist: {0}")]
    Persist(#[from] PersistenceError),

    #[error("authorize: {0}")]
    Authorize(#[from] AuthError),

    #[error("reconcile: {0}")]
    Reconcile(#[from] ReconcileError),
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("fetch: {0}")]
    Fetch(#[from] FetchError),

    #[error("extract: {0}")]
    Extract(#[from] ExtractError),

    #[error("{}", describe(.0))]
    Stages(Vec<StageFailure>),
}

fn describe(failures: &[StageFailure]) -> String {
    failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Something odd about the extracted table that does not fail the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunWarning {
    /// No launches; the calendar was cleared.
    EmptyExtraction,
    /// Rows too short for the column layout.
    ShapeChanged { rows: usize },
}

impl std::fmt::Display for RunWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunWarning::EmptyExtraction => write!(f, "no launches extracted, the calendar was cleared"),
            RunWarning::ShapeChanged { rows } => {
                write!(f, "{} rows had fewer cells than the column layout expects", rows)
            }
        }
    }
}

#[derive(Debug)]
pub struct RunSummary {
    pub launches: LaunchSet,
    pub skipped: usize,
    pub sync: SyncReport,
    pub warnings: Vec<RunWarning>,
}

/// fetch → extract → (persist ‖ authorize + reconcile)
pub struct Pipeline<'a> {
    pub settings: &'a Settings,
    pub source: &'a dyn DocumentSource,
    pub store: &'a dyn LaunchStore,
    pub authorizer: &'a dyn CalendarAuthorizer,
}

impl Pipeline<'_> {
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunSummary, RunError> {
        info!("Looking for launches...");
        let html = self.source.fetch().await?;
        let extraction = extract_launches(&html, &self.settings.anchor_id, &self.settings.columns)?;
        let warnings = report_extraction(&extraction);

        let Extraction { launches, skipped } = extraction;
        let (persisted, synced) = tokio::join!(self.store.save(&launches), self.sync(&launches, now));

        let mut failures = Vec::new();
        if let Err(e) = persisted {
            error!("Failed to save launches: {}", e);
            failures.push(StageFailure::from(e));
        }
        let sync = match synced {
            Ok(report) => Some(report),
            Err(e) => {
                error!("Calendar sync failed: {}", e);
                failures.push(e);
                None
            }
        };

        match sync {
            Some(sync) if failures.is_empty() => Ok(RunSummary {
                launches,
                skipped: skipped.len(),
                sync,
                warnings,
            }),
            _ => Err(RunError::Stages(failures)),
        }
    }

    async fn sync(&self, launches: &LaunchSet, now: DateTime<Utc>) -> Result<SyncReport, StageFailure> {
        let api = self.authorizer.authorize().await?;
        let calendar = &self.settings.calendar;
        let source = EventSource {
            title: calendar.source_title.clone(),
            url: calendar.source_url.clone(),
        };
        let report = Reconciler::new(api.as_ref(), &calendar.id, &source)
            .reconcile(launches, now)
            .await?;
        Ok(report)
    }
}

fn report_extraction(extraction: &Extraction) -> Vec<RunWarning> {
    info!(
        found = extraction.launches.len(),
        bad_dates = extraction.bad_dates(),
        shape_mismatches = extraction.shape_mismatches(),
        "Found {} launches",
        extraction.launches.len()
    );
    let mut warnings = Vec::new();
    if extraction.shape_mismatches() > 0 {
        warn!(
            "{} rows had fewer cells than the column layout expects; the table layout may have changed",
            extraction.shape_mismatches()
        );
        warnings.push(RunWarning::ShapeChanged { rows: extraction.shape_mismatches() });
    }
    if extraction.launches.is_empty() {
        warn!("No launches extracted; the calendar will be cleared");
        warnings.push(RunWarning::EmptyExtraction);
    }
    warnings
}

// ── Tests ──
