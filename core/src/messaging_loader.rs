//! Messaging loader: reads one country's messaging-platform export and
//! folds it into per-account channel availability.
//!
//! Columns: `external_id,emailAvailable,phoneAvailable,inAppAvailable,pushAvailable`
//! (an extra trailing `Reachable` column is tolerated and ignored; it is
//! always recomputed from the four flags).

use crate::{
    error::{ReachError, ReachResult},
    source::{self, LoadStats},
    types::{canonical_account_id, AccountId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

pub const EXTERNAL_ID_COLUMN: &str = "external_id";
pub const EMAIL_COLUMN: &str = "emailAvailable";
pub const PHONE_COLUMN: &str = "phoneAvailable";
pub const IN_APP_COLUMN: &str = "inAppAvailable";
pub const PUSH_COLUMN: &str = "pushAvailable";

/// Literal encoding of an available channel. Anything else reads as false.
pub const FLAG_TRUE: &str = "TRUE";
pub const FLAG_FALSE: &str = "FALSE";

pub fn parse_flag(raw: &str) -> bool {
    raw.trim() == FLAG_TRUE
}

pub fn render_flag(flag: bool) -> &'static str {
    if flag {
        FLAG_TRUE
    } else {
        FLAG_FALSE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Phone,
    InApp,
    Push,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::Email, Channel::Phone, Channel::InApp, Channel::Push];
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelAvailability {
    pub email: bool,
    pub phone: bool,
    pub in_app: bool,
    pub push: bool,
}

impl ChannelAvailability {
    /// True when at least one channel is available.
    pub fn any(&self) -> bool {
        self.email || self.phone || self.in_app || self.push
    }

    pub fn is_available(&self, channel: Channel) -> bool {
        match channel {
            Channel::Email => self.email,
            Channel::Phone => self.phone,
            Channel::InApp => self.in_app,
            Channel::Push => self.push,
        }
    }

    pub fn mark(&mut self, channel: Channel) {
        match channel {
            Channel::Email => self.email = true,
            Channel::Phone => self.phone = true,
            Channel::InApp => self.in_app = true,
            Channel::Push => self.push = true,
        }
    }

    /// Channel-wise OR. A channel once seen available stays available.
    pub fn merge(&mut self, other: ChannelAvailability) {
        self.email |= other.email;
        self.phone |= other.phone;
        self.in_app |= other.in_app;
        self.push |= other.push;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagingAccount {
    pub account_id: AccountId,
    pub occurrence_count: u64,
    pub availability: ChannelAvailability,
}

impl MessagingAccount {
    pub fn reachable(&self) -> bool {
        self.availability.any()
    }
}

/// The messaging side of a country's join, keyed and ordered by `AccountId`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagingAccounts {
    accounts: BTreeMap<AccountId, MessagingAccount>,
    pub stats: LoadStats,
}

impl MessagingAccounts {
    pub fn get(&self, account_id: &str) -> Option<&MessagingAccount> {
        self.accounts.get(account_id)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MessagingAccount> {
        self.accounts.values()
    }

    /// Fold one messaging row into its account.
    /// Returns false when `external_id` has no account segment.
    pub fn record(&mut self, external_id: &str, availability: ChannelAvailability) -> bool {
        let Some(account_id) = canonical_account_id(external_id) else {
            return false;
        };
        let account = self
            .accounts
            .entry(account_id.clone())
            .or_insert(MessagingAccount {
                account_id,
                occurrence_count: 0,
                availability: ChannelAvailability::default(),
            });
        account.occurrence_count += 1;
        account.availability.merge(availability);
        true
    }
}

struct MessagingColumns {
    external_id: usize,
    email: usize,
    phone: usize,
    in_app: usize,
    push: usize,
}

impl MessagingColumns {
    fn resolve(headers: &csv::StringRecord, path: &Path) -> ReachResult<Self> {
        Ok(Self {
            external_id: source::require_column(headers, EXTERNAL_ID_COLUMN, path)?,
            email: source::require_column(headers, EMAIL_COLUMN, path)?,
            phone: source::require_column(headers, PHONE_COLUMN, path)?,
            in_app: source::require_column(headers, IN_APP_COLUMN, path)?,
            push: source::require_column(headers, PUSH_COLUMN, path)?,
        })
    }

    fn availability(&self, record: &csv::StringRecord) -> ChannelAvailability {
        let flag = |idx: usize| record.get(idx).map(parse_flag).unwrap_or(false);
        ChannelAvailability {
            email: flag(self.email),
            phone: flag(self.phone),
            in_app: flag(self.in_app),
            push: flag(self.push),
        }
    }
}

/// Load the messaging export for `country` from `path`.
pub fn load_messaging_file(country: &str, path: &Path) -> ReachResult<MessagingAccounts> {
    let reader = source::open_export(country, path)?;
    let accounts = read_messaging_table(reader, path)?;
    log::info!(
        "{country}: {} messaging accounts from {} rows ({} empty, {} malformed)",
        accounts.len(),
        accounts.stats.rows_read,
        accounts.stats.rows_skipped_empty,
        accounts.stats.rows_malformed,
    );
    Ok(accounts)
}

/// Load a messaging table from any reader. `origin` names the source in errors.
pub fn read_messaging<R: Read>(input: R, origin: &Path) -> ReachResult<MessagingAccounts> {
    read_messaging_table(source::table_reader(input), origin)
}

fn read_messaging_table<R: Read>(
    mut reader: csv::Reader<R>,
    origin: &Path,
) -> ReachResult<MessagingAccounts> {
    let headers = reader.headers()?.clone();
    let columns = MessagingColumns::resolve(&headers, origin)?;
    let mut accounts = MessagingAccounts::default();
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
                let external_id = record.get(columns.external_id).unwrap_or_default();
                if accounts.record(external_id, columns.availability(&record)) {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_literal_true_is_available() {
        assert!(parse_flag("TRUE"));
        assert!(parse_flag(" TRUE "));
        assert!(!parse_flag("true"));
        assert!(!parse_flag("FALSE"));
        assert!(!parse_flag("1"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn merge_never_loses_a_true_flag() {
        let mut acc = ChannelAvailability {
            email: true,
            ..Default::default()
        };
        acc.merge(ChannelAvailability {
            push: true,
            ..Default::default()
        });
        acc.merge(ChannelAvailability::default());
        assert!(acc.email && acc.push);
        assert!(!acc.phone && !acc.in_app);
    }
}
