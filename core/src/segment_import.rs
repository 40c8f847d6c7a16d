//! Segment import: builds a country's messaging export from the raw
//! segment dumps left behind by the export job.
//!
//! Layout under `<exports>/<date>/<country>/<messaging_raw_dir>/`:
//!   validUsers/*.txt            one JSON object per line: {"external_id": "..."}
//!   emailAvailableUsers/*.txt   ids whose email channel is available
//!   phoneAvailableUsers/*.txt
//!   inAppAvailableUsers/*.txt
//!   pushAvailableUsers/*.txt
//!
//!   invalidUsers/*.txt          {"braze_id": "..."}, accounts queued for deletion
//!
//! `validUsers` decides which rows exist; the channel segments only flip
//! flags on ids already present. A missing segment directory reads as empty.
//! An export is only written when its driving segment produced at least one
//! file, so a country without dumps keeps whatever export it already has.

use crate::{
    config::ExportLayout,
    error::ReachResult,
    messaging_loader::{
        render_flag, Channel, ChannelAvailability, EMAIL_COLUMN, EXTERNAL_ID_COLUMN,
        IN_APP_COLUMN, PHONE_COLUMN, PUSH_COLUMN,
    },
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const VALID_SEGMENT: &str = "validUsers";
pub const INVALID_SEGMENT: &str = "invalidUsers";
pub const BRAZE_ID_COLUMN: &str = "braze_id";
pub const REACHABLE_COLUMN: &str = "Reachable";

pub fn channel_segment(channel: Channel) -> &'static str {
    match channel {
        Channel::Email => "emailAvailableUsers",
        Channel::Phone => "phoneAvailableUsers",
        Channel::InApp => "inAppAvailableUsers",
        Channel::Push => "pushAvailableUsers",
    }
}

/// Which id field a segment's lines carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKey {
    ExternalId,
    BrazeId,
}

#[derive(Debug, Deserialize)]
struct SegmentLine {
    #[serde(default)]
    external_id: Option<String>,
    #[serde(default)]
    braze_id: Option<String>,
}

impl SegmentLine {
    fn into_id(self, key: SegmentKey) -> Option<String> {
        let id = match key {
            SegmentKey::ExternalId => self.external_id,
            SegmentKey::BrazeId => self.braze_id,
        };
        id.filter(|id| !id.trim().is_empty())
    }
}

/// Ids of one segment in first-seen order, duplicates collapsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentDump {
    pub ids: Vec<String>,
    pub files_read: u64,
    pub malformed_lines: u64,
}

/// One row of the generated messaging export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagingExportRow {
    pub external_id: String,
    pub availability: ChannelAvailability,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStats {
    pub valid_ids: u64,
    pub email_ids: u64,
    pub phone_ids: u64,
    pub in_app_ids: u64,
    pub push_ids: u64,
    pub malformed_lines: u64,
}

impl ImportStats {
    fn channel_ids(&mut self, channel: Channel) -> &mut u64 {
        match channel {
            Channel::Email => &mut self.email_ids,
            Channel::Phone => &mut self.phone_ids,
            Channel::InApp => &mut self.in_app_ids,
            Channel::Push => &mut self.push_ids,
        }
    }
}

/// Read every `*.txt` file of a segment directory, in file-name order,
/// taking ids from the `key` field of each line.
pub fn read_segment_dir(dir: &Path, key: SegmentKey) -> ReachResult<SegmentDump> {
    let mut dump = SegmentDump::default();
    if !dir.is_dir() {
        log::debug!("Segment directory {} absent, treating as empty", dir.display());
        return Ok(dump);
    }

    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    files.sort();

    let mut seen = HashSet::new();
    for file in &files {
        dump.files_read += 1;
        let reader = BufReader::new(File::open(file)?);
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<SegmentLine>(line).map(|l| l.into_id(key)) {
                Ok(Some(id)) => {
                    if seen.insert(id.clone()) {
                        dump.ids.push(id);
                    }
                }
                Ok(None) => {
                    dump.malformed_lines += 1;
                    log::debug!("{}:{}: no {key:?} id", file.display(), idx + 1);
                }
                Err(e) => {
                    dump.malformed_lines += 1;
                    log::debug!("{}:{}: {e}", file.display(), idx + 1);
                }
            }
        }
    }
    Ok(dump)
}

/// Assemble export rows from the segment dumps under `dump_root`.
/// Returns `None` when `validUsers` holds no dump files.
pub fn build_messaging_rows(
    dump_root: &Path,
) -> ReachResult<Option<(Vec<MessagingExportRow>, ImportStats)>> {
    let valid = read_segment_dir(&dump_root.join(VALID_SEGMENT), SegmentKey::ExternalId)?;
    if valid.files_read == 0 {
        return Ok(None);
    }
    let mut stats = ImportStats {
        valid_ids: valid.ids.len() as u64,
        malformed_lines: valid.malformed_lines,
        ..Default::default()
    };

    let mut rows: Vec<MessagingExportRow> = valid
        .ids
        .into_iter()
        .map(|external_id| MessagingExportRow {
            external_id,
            availability: ChannelAvailability::default(),
        })
        .collect();
    let index: HashMap<String, usize> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| (row.external_id.clone(), i))
        .collect();

    for channel in Channel::ALL {
        let dump = read_segment_dir(&dump_root.join(channel_segment(channel)), SegmentKey::ExternalId)?;
        stats.malformed_lines += dump.malformed_lines;
        *stats.channel_ids(channel) = dump.ids.len() as u64;
        for id in &dump.ids {
            if let Some(&i) = index.get(id) {
                rows[i].availability.mark(channel);
            }
        }
    }

    Ok(Some((rows, stats)))
}

/// Render the messaging export table, including the derived `Reachable` column.
pub fn write_messaging_export<W: Write>(out: W, rows: &[MessagingExportRow]) -> ReachResult<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record([
        EXTERNAL_ID_COLUMN,
        EMAIL_COLUMN,
        PHONE_COLUMN,
        IN_APP_COLUMN,
        PUSH_COLUMN,
        REACHABLE_COLUMN,
    ])?;
    for row in rows {
        let a = &row.availability;
        writer.write_record([
            row.external_id.as_str(),
            render_flag(a.email),
            render_flag(a.phone),
            render_flag(a.in_app),
            render_flag(a.push),
            render_flag(a.any()),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Render the invalid-users table: a single `braze_id` column.
pub fn write_invalid_users<W: Write>(out: W, ids: &[String]) -> ReachResult<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record([BRAZE_ID_COLUMN])?;
    for id in ids {
        writer.write_record([id.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

fn create_export(target: &Path) -> ReachResult<BufWriter<File>> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(File::create(target)?))
}

/// Build and write `country`'s messaging export at its configured location.
/// Returns `None`, leaving any existing export alone, when there are no
/// `validUsers` dumps to build from.
pub fn import_segments(country: &str, layout: &ExportLayout) -> ReachResult<Option<ImportStats>> {
    let dump_root = layout.segment_dump_dir(country);
    let Some((rows, stats)) = build_messaging_rows(&dump_root)? else {
        log::info!(
            "{country}: no {VALID_SEGMENT} dumps under {}, messaging export not rebuilt",
            dump_root.display()
        );
        return Ok(None);
    };
    let target = layout.messaging_file(country);
    write_messaging_export(create_export(&target)?, &rows)?;
    log::info!(
        "{country}: imported {} messaging ids into {} ({} malformed lines)",
        stats.valid_ids,
        target.display(),
        stats.malformed_lines,
    );
    Ok(Some(stats))
}

/// Write `country`'s invalid-users table from its `invalidUsers` dumps.
/// Returns the number of ids written, or `None` when there are no dumps.
pub fn import_invalid_users(country: &str, layout: &ExportLayout) -> ReachResult<Option<u64>> {
    let dump = read_segment_dir(
        &layout.segment_dump_dir(country).join(INVALID_SEGMENT),
        SegmentKey::BrazeId,
    )?;
    if dump.files_read == 0 {
        log::debug!("{country}: no {INVALID_SEGMENT} dumps");
        return Ok(None);
    }
    let target = layout.invalid_users_file(country);
    write_invalid_users(create_export(&target)?, &dump.ids)?;
    log::info!(
        "{country}: {} invalid users written to {} ({} malformed lines)",
        dump.ids.len(),
        target.display(),
        dump.malformed_lines,
    );
    Ok(Some(dump.ids.len() as u64))
}
