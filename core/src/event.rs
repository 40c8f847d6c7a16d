//! Run-log events.
//!
//! Every notable step of a run is recorded as a `RunEvent` and appended to
//! the run ledger. Variants are only ever added, never reordered.

use crate::{
    aggregator::CountrySummary,
    segment_import::ImportStats,
    source::LoadStats,
    types::{CountryCode, RunId},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    RunInitialized {
        run_id: RunId,
        run_date: String,
        countries: Vec<CountryCode>,
    },
    CountryStarted {
        country: CountryCode,
    },
    SegmentsImported {
        country: CountryCode,
        stats: ImportStats,
    },
    IdentityLoaded {
        country: CountryCode,
        accounts: u64,
        stats: LoadStats,
    },
    MessagingLoaded {
        country: CountryCode,
        accounts: u64,
        stats: LoadStats,
    },
    CountryReconciled {
        country: CountryCode,
        orphans: u64,
        summary: CountrySummary,
    },
    CountrySkipped {
        country: CountryCode,
        reason: String,
    },
    SummaryWritten {
        countries: u64,
        path: String,
    },
    InvalidUsersImported {
        country: CountryCode,
        ids: u64,
    },
}

impl RunEvent {
    /// Stable name for the `event_type` ledger column.
    pub fn type_name(&self) -> &'static str {
        match self {
            RunEvent::RunInitialized { .. }    => "run_initialized",
            RunEvent::CountryStarted { .. }    => "country_started",
            RunEvent::SegmentsImported { .. }  => "segments_imported",
            RunEvent::IdentityLoaded { .. }    => "identity_loaded",
            RunEvent::MessagingLoaded { .. }   => "messaging_loaded",
            RunEvent::CountryReconciled { .. } => "country_reconciled",
            RunEvent::CountrySkipped { .. }    => "country_skipped",
            RunEvent::SummaryWritten { .. }    => "summary_written",
            RunEvent::InvalidUsersImported { .. } => "invalid_users_imported",
        }
    }

    /// Country the event concerns, if any.
    pub fn country(&self) -> Option<&str> {
        match self {
            RunEvent::CountryStarted { country }
            | RunEvent::SegmentsImported { country, .. }
            | RunEvent::IdentityLoaded { country, .. }
            | RunEvent::MessagingLoaded { country, .. }
            | RunEvent::CountryReconciled { country, .. }
            | RunEvent::CountrySkipped { country, .. }
            | RunEvent::InvalidUsersImported { country, .. } => Some(country),
            RunEvent::RunInitialized { .. } | RunEvent::SummaryWritten { .. } => None,
        }
    }
}

/// A row of the `event_log` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub run_id: RunId,
    pub country: Option<CountryCode>,
    pub event_type: String,
    pub payload: String,
}
