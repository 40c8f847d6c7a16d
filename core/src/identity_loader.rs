//! Identity loader: reads one country's identity export and collapses
//! it into the set of known accounts.
//!
//! Two table layouts are accepted, detected from the header:
//!   - composite: a single `value_userId` column, already joined upstream
//!   - raw:       `_id,userId,value`, joined here as `value_userId`
//!
//! Every accepted row increments its account's `occurrence_count`, so the
//! sum of counts always equals `LoadStats::rows_accepted`.

use crate::{
    error::{ReachError, ReachResult},
    source::{self, LoadStats},
    types::{canonical_account_id, AccountId, ACCOUNT_SEPARATOR},
};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

pub const COMPOSITE_COLUMN: &str = "value_userId";
pub const SOURCE_ID_COLUMN: &str = "_id";
pub const USER_ID_COLUMN: &str = "userId";
pub const VALUE_COLUMN: &str = "value";

/// One line of the raw identity export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawIdentityRow {
    pub source_id: String,
    pub user_id: String,
    pub value: String,
}

impl RawIdentityRow {
    /// The `value_userId` token this row canonicalizes from.
    pub fn composite_token(&self) -> String {
        format!("{}{ACCOUNT_SEPARATOR}{}", self.value, self.user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityAccount {
    pub account_id: AccountId,
    pub occurrence_count: u64,
}

/// The identity side of a country's join, keyed and ordered by `AccountId`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityAccounts {
    accounts: BTreeMap<AccountId, IdentityAccount>,
    pub stats: LoadStats,
}

impl IdentityAccounts {
    pub fn get(&self, account_id: &str) -> Option<&IdentityAccount> {
        self.accounts.get(account_id)
    }

    pub fn contains(&self, account_id: &str) -> bool {
        self.accounts.contains_key(account_id)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IdentityAccount> {
        self.accounts.values()
    }

    /// Sum of `occurrence_count` across all accounts.
    pub fn total_occurrences(&self) -> u64 {
        self.accounts.values().map(|a| a.occurrence_count).sum()
    }

    /// Count one occurrence of the account behind `token`.
    /// Returns false when the token has no account segment.
    pub fn record(&mut self, token: &str) -> bool {
        let Some(account_id) = canonical_account_id(token) else {
            return false;
        };
        self.accounts
            .entry(account_id.clone())
            .or_insert(IdentityAccount {
                account_id,
                occurrence_count: 0,
            })
            .occurrence_count += 1;
        true
    }
}

#[derive(Debug, Clone, Copy)]
enum IdentityLayout {
    Composite { token: usize },
    Raw { source_id: Option<usize>, user_id: usize, value: usize },
}

impl IdentityLayout {
    fn detect(headers: &csv::StringRecord, path: &Path) -> ReachResult<Self> {
        if let Some(token) = source::find_column(headers, COMPOSITE_COLUMN) {
            return Ok(Self::Composite { token });
        }
        match (
            source::find_column(headers, USER_ID_COLUMN),
            source::find_column(headers, VALUE_COLUMN),
        ) {
            (Some(user_id), Some(value)) => Ok(Self::Raw {
                source_id: source::find_column(headers, SOURCE_ID_COLUMN),
                user_id,
                value,
            }),
            _ => Err(ReachError::MissingColumn {
                path: path.to_path_buf(),
                column: COMPOSITE_COLUMN.into(),
            }),
        }
    }

    /// The composite token of one record, or `None` when its key is empty.
    fn token(&self, record: &csv::StringRecord) -> Option<String> {
        let field = |idx: usize| record.get(idx).map(str::trim).unwrap_or_default();
        match *self {
            Self::Composite { token } => {
                Some(field(token).to_string()).filter(|t| !t.is_empty())
            }
            Self::Raw { source_id, user_id, value } => {
                let row = RawIdentityRow {
                    source_id: source_id.map(field).unwrap_or_default().to_string(),
                    user_id: field(user_id).to_string(),
                    value: field(value).to_string(),
                };
                if row.value.is_empty() {
                    None
                } else {
                    Some(row.composite_token())
                }
            }
        }
    }
}

/// Load the identity export for `country` from `path`.
pub fn load_identity_file(country: &str, path: &Path) -> ReachResult<IdentityAccounts> {
    let reader = source::open_export(country, path)?;
    let accounts = read_identity_table(reader, path)?;
    log::info!(
        "{country}: {} identity accounts from {} rows ({} empty, {} malformed)",
        accounts.len(),
        accounts.stats.rows_read,
        accounts.stats.rows_skipped_empty,
        accounts.stats.rows_malformed,
    );
    Ok(accounts)
}

/// Load an identity table from any reader. `origin` names the source in errors.
pub fn read_identity<R: Read>(input: R, origin: &Path) -> ReachResult<IdentityAccounts> {
    read_identity_table(source::table_reader(input), origin)
}

fn read_identity_table<R: Read>(
    mut reader: csv::Reader<R>,
    origin: &Path,
) -> ReachResult<IdentityAccounts> {
    let headers = reader.headers()?.clone();
    let layout = IdentityLayout::detect(&headers, origin)?;
    let mut accounts = IdentityAccounts::default();
    let mut record = csv::StringRecord::new();

    loop {
        let outcome = source::next_record(&mut reader, &mut record).and_then(|more| {
            if more {
                source::check_width(&record, headers.len())?;
            }
            Ok(more)
        });
        match outcome {
            Ok(false) => break,
            Ok(true) => {
                accounts.stats.rows_read += 1;
                let accepted = layout
                    .token(&record)
                    .map(|token| accounts.record(&token))
                    .unwrap_or(false);
                if accepted {
                    accounts.stats.rows_accepted += 1;
                } else {
                    accounts.stats.rows_skipped_empty += 1;
                }
            }
            Err(ReachError::MalformedRow { line, reason }) => {
                accounts.stats.rows_read += 1;
                accounts.stats.rows_malformed += 1;
                log::debug!("{}: skipping line {line}: {reason}", origin.display());
            }
            Err(e) => return Err(e),
        }
    }

    Ok(accounts)
}
