//! Reconciler: full outer join of the identity and messaging sides of one
//! country on exact `AccountId` equality.
//!
//! Design:
//!   - Every identity account yields exactly one `ReconciledAccount`.
//!   - Absence from the messaging side means unreachable: zero messaging
//!     occurrences, no channel available.
//!   - Messaging accounts with no identity counterpart become orphans and
//!     never enter the reconciled set.
//!   - Output is ordered by `AccountId`, so the join is a pure function of
//!     its two input sets.

use crate::{
    identity_loader::IdentityAccounts,
    messaging_loader::{ChannelAvailability, MessagingAccounts},
    types::AccountId,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciledAccount {
    pub account_id: AccountId,
    pub identity_occurrences: u64,
    pub messaging_occurrences: u64,
    pub availability: ChannelAvailability,
    pub reachable: bool,
}

/// A messaging-platform account with no identity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanMessagingAccount {
    pub account_id: AccountId,
    pub messaging_occurrences: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// One entry per identity account, ascending by `account_id`.
    pub accounts: Vec<ReconciledAccount>,
    /// Messaging-only accounts, ascending by `account_id`.
    pub orphans: Vec<OrphanMessagingAccount>,
}

impl Reconciliation {
    pub fn reachable_count(&self) -> usize {
        self.accounts.iter().filter(|a| a.reachable).count()
    }
}

/// Join `identity` (left) against `messaging` (right).
pub fn reconcile(identity: &IdentityAccounts, messaging: &MessagingAccounts) -> Reconciliation {
    let accounts = identity
        .iter()
        .map(|left| match messaging.get(&left.account_id) {
            Some(right) => ReconciledAccount {
                account_id: left.account_id.clone(),
                identity_occurrences: left.occurrence_count,
                messaging_occurrences: right.occurrence_count,
                availability: right.availability,
                reachable: right.reachable(),
            },
            None => ReconciledAccount {
                account_id: left.account_id.clone(),
                identity_occurrences: left.occurrence_count,
                messaging_occurrences: 0,
                availability: ChannelAvailability::default(),
                reachable: false,
            },
        })
        .collect();

    let orphans = messaging
        .iter()
        .filter(|right| !identity.contains(&right.account_id))
        .map(|right| OrphanMessagingAccount {
            account_id: right.account_id.clone(),
            messaging_occurrences: right.occurrence_count,
        })
        .collect();

    Reconciliation { accounts, orphans }
}
