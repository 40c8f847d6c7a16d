//! Report writer: per-country detail tables, orphan lists, and the
//! cross-country summary.
//!
//! The summary is written exactly once per run, after every country has
//! been processed: rows are collected by the caller, sorted here, written
//! to a sibling temp file, and renamed over `summary.csv`.

use crate::{
    aggregator::CountrySummary,
    config::ExportLayout,
    error::{ReachError, ReachResult},
    messaging_loader::render_flag,
    reconciler::{OrphanMessagingAccount, ReconciledAccount, Reconciliation},
};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const DETAIL_HEADER: [&str; 8] = [
    "accountId",
    "identityOccurrences",
    "messagingOccurrences",
    "emailAvailable",
    "phoneAvailable",
    "inAppAvailable",
    "pushAvailable",
    "reachable",
];

pub const SUMMARY_HEADER: [&str; 9] = [
    "country",
    "totalAccounts",
    "reachableAccounts",
    "unreachableAccounts",
    "reachabilityRate",
    "emailAvailable",
    "phoneAvailable",
    "inAppAvailable",
    "pushAvailable",
];

/// Render a detail table. The header is written even for an empty slice.
pub fn write_detail<W: Write>(out: W, accounts: &[ReconciledAccount]) -> ReachResult<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(DETAIL_HEADER)?;
    for account in accounts {
        let identity = account.identity_occurrences.to_string();
        let messaging = account.messaging_occurrences.to_string();
        writer.write_record([
            account.account_id.as_str(),
            identity.as_str(),
            messaging.as_str(),
            render_flag(account.availability.email),
            render_flag(account.availability.phone),
            render_flag(account.availability.in_app),
            render_flag(account.availability.push),
            render_flag(account.reachable),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Render summary rows in the order given. The header is always written.
pub fn write_summary<W: Write>(out: W, summaries: &[CountrySummary]) -> ReachResult<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(SUMMARY_HEADER)?;
    for s in summaries {
        writer.write_record([
            s.country_code.clone(),
            s.total_identity_accounts.to_string(),
            s.reachable_accounts.to_string(),
            s.unreachable_accounts.to_string(),
            format!("{:.4}", s.reachability_rate),
            s.email_available_accounts.to_string(),
            s.phone_available_accounts.to_string(),
            s.in_app_available_accounts.to_string(),
            s.push_available_accounts.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// One `accountId` per line.
pub fn write_orphans<W: Write>(mut out: W, orphans: &[OrphanMessagingAccount]) -> ReachResult<()> {
    for orphan in orphans {
        writeln!(out, "{}", orphan.account_id)?;
    }
    out.flush()?;
    Ok(())
}

/// Sort summaries into report order.
pub fn sort_summaries(mut summaries: Vec<CountrySummary>) -> Vec<CountrySummary> {
    summaries.sort_by(CountrySummary::report_order);
    summaries
}

/// Files written for one country.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryArtifacts {
    pub detail: PathBuf,
    pub orphans: PathBuf,
}

pub struct ReportWriter<'a> {
    layout: &'a ExportLayout,
}

impl<'a> ReportWriter<'a> {
    pub fn new(layout: &'a ExportLayout) -> Self {
        Self { layout }
    }

    pub fn write_country(
        &self,
        country: &str,
        reconciliation: &Reconciliation,
    ) -> ReachResult<CountryArtifacts> {
        fs::create_dir_all(self.layout.results_dir())?;

        let detail = self.layout.detail_file(country);
        write_detail(BufWriter::new(File::create(&detail)?), &reconciliation.accounts)?;

        let orphans = self.layout.orphan_file(country);
        write_orphans(BufWriter::new(File::create(&orphans)?), &reconciliation.orphans)?;

        log::info!(
            "{country}: wrote {} ({} accounts) and {} ({} orphans)",
            detail.display(),
            reconciliation.accounts.len(),
            orphans.display(),
            reconciliation.orphans.len(),
        );
        Ok(CountryArtifacts { detail, orphans })
    }

    /// Sort and write the run summary in one step. Returns the written path
    /// and the rows in the order they were written.
    pub fn flush_summary(
        &self,
        summaries: Vec<CountrySummary>,
    ) -> ReachResult<(PathBuf, Vec<CountrySummary>)> {
        fs::create_dir_all(self.layout.results_dir())?;
        let sorted = sort_summaries(summaries);
        let path = self.layout.summary_file();
        let staging = staging_path(&path);
        let written = File::create(&staging)
            .map_err(ReachError::from)
            .and_then(|file| write_summary(BufWriter::new(file), &sorted))
            .and_then(|()| fs::rename(&staging, &path).map_err(ReachError::from));
        if let Err(e) = written {
            // No partial summary may survive a failed flush.
            if staging.exists() {
                if let Err(cleanup) = fs::remove_file(&staging) {
                    log::warn!("Could not remove {}: {cleanup}", staging.display());
                }
            }
            return Err(e);
        }
        log::info!("Summary for {} countries written to {}", sorted.len(), path.display());
        Ok((path, sorted))
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}
