//! Aggregator: per-country totals, channel counts, and the reachability rate.

use reach_core::{
    aggregator::{summarize, CountrySummary},
    messaging_loader::ChannelAvailability,
    reconciler::ReconciledAccount,
};

fn account(id: &str, availability: ChannelAvailability) -> ReconciledAccount {
    ReconciledAccount {
        account_id: id.into(),
        identity_occurrences: 1,
        messaging_occurrences: u64::from(availability.any()),
        availability,
        reachable: availability.any(),
    }
}

fn email() -> ChannelAvailability {
    ChannelAvailability { email: true, ..Default::default() }
}

#[test]
fn worked_example_summary() {
    let accounts = vec![account("A", email()), account("B", ChannelAvailability::default())];
    let summary = summarize("DE", &accounts);

    assert_eq!(summary.country_code, "DE");
    assert_eq!(summary.total_identity_accounts, 2);
    assert_eq!(summary.reachable_accounts, 1);
    assert_eq!(summary.unreachable_accounts, 1);
    assert_eq!(summary.reachability_rate, 0.5);
    assert_eq!(summary.email_available_accounts, 1);
    assert_eq!(summary.phone_available_accounts, 0);
}

#[test]
fn channel_counts_are_independent() {
    let all = ChannelAvailability { email: true, phone: true, in_app: true, push: true };
    let push_only = ChannelAvailability { push: true, ..Default::default() };
    let accounts = vec![
        account("A", all),
        account("B", push_only),
        account("C", ChannelAvailability::default()),
    ];
    let s = summarize("FR", &accounts);

    assert_eq!(s.email_available_accounts, 1);
    assert_eq!(s.phone_available_accounts, 1);
    assert_eq!(s.in_app_available_accounts, 1);
    assert_eq!(s.push_available_accounts, 2);
    assert_eq!(s.reachable_accounts, 2);
    assert_eq!(s.reachability_rate, 0.6667);
}

#[test]
fn empty_country_is_all_zeros() {
    let s = summarize("US", &[]);
    assert_eq!(s, CountrySummary::empty("US"));
    assert_eq!(s.reachability_rate, 0.0);
}

#[test]
fn reachable_never_exceeds_total() {
    for n in 0..20usize {
        let accounts: Vec<_> = (0..n)
            .map(|i| {
                let flags = if i % 3 == 0 { email() } else { ChannelAvailability::default() };
                account(&format!("acct{i}"), flags)
            })
            .collect();
        let s = summarize("DE", &accounts);
        assert!(s.reachable_accounts <= s.total_identity_accounts);
        assert_eq!(s.unreachable_accounts, s.total_identity_accounts - s.reachable_accounts);
        assert!((0.0..=1.0).contains(&s.reachability_rate));
    }
}
