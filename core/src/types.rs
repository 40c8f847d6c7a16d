//! Shared primitive types used across the reconciliation core.

/// Canonical account key: the segment of a composite identifier
/// before its first `_`.
pub type AccountId = String;

/// Country code as it appears in the configuration, e.g. "DE".
pub type CountryCode = String;

/// The canonical run identifier.
pub type RunId = String;

/// Separator between the account segment and the rest of a composite token.
pub const ACCOUNT_SEPARATOR: char = '_';

/// Reduce a composite token (`value_userId`, `external_id`, ...) to its
/// `AccountId`. Returns `None` when the token or its account segment is empty.
pub fn canonical_account_id(token: &str) -> Option<AccountId> {
    let token = token.trim();
    let account = match token.split_once(ACCOUNT_SEPARATOR) {
        Some((head, _)) => head,
        None => token,
    };
    if account.is_empty() {
        None
    } else {
        Some(account.to_string())
    }
}
