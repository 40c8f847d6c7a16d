//! The run engine: drives one reconciliation pass per country.
//!
//! PASS ORDER (per country, fixed):
//!   1. Segment import        (optional, rebuilds the messaging export and
//!                             the invalid-users table when dumps exist)
//!   2. Identity loader
//!   3. Messaging loader
//!   4. Reconciler
//!   5. Aggregator
//!   6. Detail + orphan artifacts
//!
//! RULES:
//!   - Countries are independent. A failing country is skipped and logged;
//!     it never aborts the run. Only ledger or summary-write failures do.
//!   - A country's working sets live only for the duration of its pass.
//!   - Summaries are collected from pass return values and flushed once,
//!     sorted, after every country has been visited.

use crate::{
    aggregator::{summarize, CountrySummary},
    config::{ExportLayout, ReachConfig},
    error::{ReachError, ReachResult},
    event::RunEvent,
    identity_loader::load_identity_file,
    messaging_loader::load_messaging_file,
    reconciler::reconcile,
    report_writer::{CountryArtifacts, ReportWriter},
    segment_import::{import_invalid_users, import_segments},
    source::LoadStats,
    store::ReachStore,
    types::{CountryCode, RunId},
};
use serde::Serialize;
use std::path::PathBuf;

/// Date used by `build_test` runs.
pub const TEST_RUN_DATE: &str = "2024-01-01";

/// Result of one successful country pass.
#[derive(Debug, Clone, Serialize)]
pub struct CountryOutcome {
    pub country: CountryCode,
    pub summary: CountrySummary,
    pub identity_stats: LoadStats,
    pub messaging_stats: LoadStats,
    pub orphans: u64,
    pub detail_path: PathBuf,
    pub orphan_path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedCountry {
    pub country: CountryCode,
    pub reason: String,
    pub source_missing: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub run_date: String,
    /// Summary rows in the order they were written.
    pub summaries: Vec<CountrySummary>,
    pub processed: Vec<CountryOutcome>,
    pub skipped: Vec<SkippedCountry>,
    pub summary_path: PathBuf,
}

pub struct ReachEngine {
    pub run_id: RunId,
    pub config: ReachConfig,
    pub layout: ExportLayout,
    pub store: ReachStore,
    import_segments: bool,
}

impl ReachEngine {
    pub fn new(run_id: RunId, config: ReachConfig, layout: ExportLayout, store: ReachStore) -> Self {
        Self {
            run_id,
            config,
            layout,
            store,
            import_segments: false,
        }
    }

    /// Build an engine for `run_date` with a fresh run id registered in `store`.
    pub fn build(
        config: ReachConfig,
        exports_root: impl Into<PathBuf>,
        results_root: impl Into<PathBuf>,
        run_date: &str,
        store: ReachStore,
    ) -> ReachResult<Self> {
        store.migrate()?;
        let run_id = new_run_id(run_date);
        store.insert_run(&run_id, run_date, env!("CARGO_PKG_VERSION"))?;
        let layout = ExportLayout::new(exports_root, results_root, run_date, config.layout.clone());
        Ok(Self::new(run_id, config, layout, store))
    }

    /// Engine over the test config, an in-memory ledger, and `TEST_RUN_DATE`.
    pub fn build_test(
        run_id: RunId,
        exports_root: impl Into<PathBuf>,
        results_root: impl Into<PathBuf>,
    ) -> ReachResult<Self> {
        let store = ReachStore::in_memory()?;
        store.migrate()?;
        store.insert_run(&run_id, TEST_RUN_DATE, "0.1.0-test")?;
        let config = ReachConfig::default_test();
        let layout =
            ExportLayout::new(exports_root, results_root, TEST_RUN_DATE, config.layout.clone());
        Ok(Self::new(run_id, config, layout, store))
    }

    /// Rebuild each country's messaging export from segment dumps before loading it.
    pub fn with_segment_import(mut self, enabled: bool) -> Self {
        self.import_segments = enabled;
        self
    }

    /// Run one country's pass and write its detail artifacts.
    pub fn process_country(&self, country: &str) -> ReachResult<CountryOutcome> {
        if self.import_segments {
            if let Some(stats) = import_segments(country, &self.layout)? {
                self.record(&RunEvent::SegmentsImported {
                    country: country.to_string(),
                    stats,
                })?;
            }
            if let Some(ids) = import_invalid_users(country, &self.layout)? {
                self.record(&RunEvent::InvalidUsersImported {
                    country: country.to_string(),
                    ids,
                })?;
            }
        }

        let identity_path = self.layout.identity_file(country);
        let messaging_path = self.layout.messaging_file(country);
        for path in [&identity_path, &messaging_path] {
            if !path.is_file() {
                return Err(ReachError::SourceMissing {
                    country: country.to_string(),
                    path: path.clone(),
                });
            }
        }

        let identity = load_identity_file(country, &identity_path)?;
        self.record(&RunEvent::IdentityLoaded {
            country: country.to_string(),
            accounts: identity.len() as u64,
            stats: identity.stats,
        })?;

        let messaging = load_messaging_file(country, &messaging_path)?;
        self.record(&RunEvent::MessagingLoaded {
            country: country.to_string(),
            accounts: messaging.len() as u64,
            stats: messaging.stats,
        })?;

        if identity.is_empty() {
            log::info!("{country}: no identity accounts, summary will be all zeros");
        }

        let reconciliation = reconcile(&identity, &messaging);
        let summary = summarize(country, &reconciliation.accounts);
        let CountryArtifacts { detail, orphans } =
            ReportWriter::new(&self.layout).write_country(country, &reconciliation)?;

        Ok(CountryOutcome {
            country: country.to_string(),
            summary,
            identity_stats: identity.stats,
            messaging_stats: messaging.stats,
            orphans: reconciliation.orphans.len() as u64,
            detail_path: detail,
            orphan_path: orphans,
        })
    }

    /// Process every configured country, then flush the sorted summary once.
    pub fn run(&mut self) -> ReachResult<RunReport> {
        let countries: Vec<CountryCode> = self.config.country_codes().cloned().collect();
        self.record(&RunEvent::RunInitialized {
            run_id: self.run_id.clone(),
            run_date: self.layout.run_date.clone(),
            countries: countries.clone(),
        })?;

        let mut processed = Vec::new();
        let mut skipped = Vec::new();

        for country in &countries {
            log::info!("Processing {country}");
            self.record(&RunEvent::CountryStarted {
                country: country.clone(),
            })?;

            match self.process_country(country) {
                Ok(outcome) => {
                    self.record(&RunEvent::CountryReconciled {
                        country: country.clone(),
                        orphans: outcome.orphans,
                        summary: outcome.summary.clone(),
                    })?;
                    processed.push(outcome);
                }
                Err(e @ ReachError::Database(_)) => return Err(e),
                Err(e) => {
                    log::warn!("{country}: skipped: {e}");
                    let source_missing = matches!(e, ReachError::SourceMissing { .. });
                    let reason = e.to_string();
                    self.record(&RunEvent::CountrySkipped {
                        country: country.clone(),
                        reason: reason.clone(),
                    })?;
                    skipped.push(SkippedCountry {
                        country: country.clone(),
                        reason,
                        source_missing,
                    });
                }
            }
        }

        let summaries = processed.iter().map(|o| o.summary.clone()).collect();
        let (summary_path, summaries) = ReportWriter::new(&self.layout).flush_summary(summaries)?;
        for summary in &summaries {
            self.store.insert_country_summary(&self.run_id, summary)?;
        }
        self.record(&RunEvent::SummaryWritten {
            countries: summaries.len() as u64,
            path: summary_path.display().to_string(),
        })?;

        Ok(RunReport {
            run_id: self.run_id.clone(),
            run_date: self.layout.run_date.clone(),
            summaries,
            processed,
            skipped,
            summary_path,
        })
    }

    fn record(&self, event: &RunEvent) -> ReachResult<()> {
        self.store.append_event(&self.run_id, event)
    }
}

/// `run-<date>-<uuid>`, unique per invocation.
pub fn new_run_id(run_date: &str) -> RunId {
    format!("run-{run_date}-{}", uuid::Uuid::new_v4().simple())
}
