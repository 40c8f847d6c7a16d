//! Aggregator: reduces one country's reconciled accounts to a summary row.

use crate::{reconciler::ReconciledAccount, types::CountryCode};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Decimal places kept in `reachability_rate`.
pub const RATE_DECIMALS: i32 = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountrySummary {
    pub country_code: CountryCode,
    pub total_identity_accounts: u64,
    pub reachable_accounts: u64,
    pub unreachable_accounts: u64,
    pub reachability_rate: f64,
    pub email_available_accounts: u64,
    pub phone_available_accounts: u64,
    pub in_app_available_accounts: u64,
    pub push_available_accounts: u64,
}

impl CountrySummary {
    /// All-zero summary, used when a country produced no identity accounts.
    pub fn empty(country_code: impl Into<CountryCode>) -> Self {
        Self {
            country_code: country_code.into(),
            total_identity_accounts: 0,
            reachable_accounts: 0,
            unreachable_accounts: 0,
            reachability_rate: 0.0,
            email_available_accounts: 0,
            phone_available_accounts: 0,
            in_app_available_accounts: 0,
            push_available_accounts: 0,
        }
    }

    /// Report order: highest rate first, ties by ascending country code.
    pub fn report_order(a: &Self, b: &Self) -> Ordering {
        b.reachability_rate
            .total_cmp(&a.reachability_rate)
            .then_with(|| a.country_code.cmp(&b.country_code))
    }
}

/// `reachable / total` rounded to `RATE_DECIMALS`; 0 when `total` is 0.
pub fn reachability_rate(reachable: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let scale = 10f64.powi(RATE_DECIMALS);
    (reachable as f64 / total as f64 * scale).round() / scale
}

pub fn summarize(country_code: &str, accounts: &[ReconciledAccount]) -> CountrySummary {
    let mut summary = CountrySummary::empty(country_code);
    for account in accounts {
        summary.total_identity_accounts += 1;
        if account.reachable {
            summary.reachable_accounts += 1;
        }
        let channels = &account.availability;
        summary.email_available_accounts += u64::from(channels.email);
        summary.phone_available_accounts += u64::from(channels.phone);
        summary.in_app_available_accounts += u64::from(channels.in_app);
        summary.push_available_accounts += u64::from(channels.push);
    }
    summary.unreachable_accounts = summary.total_identity_accounts - summary.reachable_accounts;
    summary.reachability_rate =
        reachability_rate(summary.reachable_accounts, summary.total_identity_accounts);
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_is_rounded_to_four_places() {
        assert_eq!(reachability_rate(1, 3), 0.3333);
        assert_eq!(reachability_rate(2, 3), 0.6667);
        assert_eq!(reachability_rate(1, 2), 0.5);
    }

    #[test]
    fn rate_of_empty_country_is_zero() {
        assert_eq!(reachability_rate(0, 0), 0.0);
    }

    #[test]
    fn equal_rates_order_by_country_code() {
        let mut a = CountrySummary::empty("FR");
        a.reachability_rate = 0.5;
        let mut b = CountrySummary::empty("DE");
        b.reachability_rate = 0.5;
        assert_eq!(CountrySummary::report_order(&b, &a), Ordering::Less);
    }
}
