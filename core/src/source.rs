//! Shared plumbing for reading per-country export tables.
//!
//! Both loaders read their input once, sequentially, to completion.
//! Rows that cannot be parsed are counted in `LoadStats` and skipped;
//! only I/O failures and a missing file surface as errors.

use crate::error::{ReachError, ReachResult};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Row accounting for one pass over an export file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadStats {
    /// Data rows seen (header excluded).
    pub rows_read: u64,
    /// Rows that produced an `AccountId`.
    pub rows_accepted: u64,
    /// Rows whose key field was missing or empty.
    pub rows_skipped_empty: u64,
    /// Rows with the wrong shape.
    pub rows_malformed: u64,
}

impl LoadStats {
    pub fn rows_skipped(&self) -> u64 {
        self.rows_skipped_empty + self.rows_malformed
    }
}

/// Open `path` as a headed CSV table, or report it missing for `country`.
pub(crate) fn open_export(country: &str, path: &Path) -> ReachResult<csv::Reader<File>> {
    if !path.is_file() {
        return Err(ReachError::SourceMissing {
            country: country.to_string(),
            path: path.to_path_buf(),
        });
    }
    let file = File::open(path)?;
    Ok(table_reader(file))
}

/// Rows may carry a different number of fields than the header; the
/// loaders decide what a wrong column count means.
pub(crate) fn table_reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input)
}

/// Index of the first header equal to `name`.
pub(crate) fn find_column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim() == name)
}

pub(crate) fn require_column(
    headers: &csv::StringRecord,
    name: &str,
    path: &Path,
) -> ReachResult<usize> {
    find_column(headers, name).ok_or_else(|| ReachError::MissingColumn {
        path: path.to_path_buf(),
        column: name.to_string(),
    })
}

/// Next record of the table. Undecodable records come back as
/// `MalformedRow` so the caller can count and skip them; I/O errors abort.
pub(crate) fn next_record<R: Read>(
    reader: &mut csv::Reader<R>,
    record: &mut csv::StringRecord,
) -> ReachResult<bool> {
    match reader.read_record(record) {
        Ok(more) => Ok(more),
        Err(e) if e.is_io_error() => Err(e.into()),
        Err(e) => Err(ReachError::MalformedRow {
            line: e.position().map(|p| p.line()).unwrap_or(0),
            reason: e.to_string(),
        }),
    }
}

pub(crate) fn record_line(record: &csv::StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

/// Fail with `MalformedRow` unless the record has exactly `expected` fields.
pub(crate) fn check_width(record: &csv::StringRecord, expected: usize) -> ReachResult<()> {
    if record.len() == expected {
        Ok(())
    } else {
        Err(ReachError::MalformedRow {
            line: record_line(record),
            reason: format!("expected {expected} fields, found {}", record.len()),
        })
    }
}
