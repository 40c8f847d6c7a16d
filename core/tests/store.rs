//! Run ledger on disk: opening, migrating, and reading a run back.

use reach_core::{aggregator::CountrySummary, event::RunEvent, store::ReachStore};

#[test]
fn file_ledger_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    let path = path.to_str().unwrap();

    {
        let store = ReachStore::open(path).unwrap();
        store.migrate().unwrap();
        store.insert_run("run-1", "2024-01-01", "0.1.0").unwrap();
        store
            .append_event(
                "run-1",
                &RunEvent::CountrySkipped {
                    country: "FR".into(),
                    reason: "no export".into(),
                },
            )
            .unwrap();
        let summary = CountrySummary {
            reachability_rate: 0.25,
            ..CountrySummary::empty("DE")
        };
        store.insert_country_summary("run-1", &summary).unwrap();
    }

    let store = ReachStore::open(path).unwrap();
    store.migrate().unwrap();
    assert_eq!(
        store.skipped_countries("run-1").unwrap(),
        vec![("FR".to_string(), "no export".to_string())]
    );
    let summaries = store.summaries_for_run("run-1").unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].reachability_rate, 0.25);
}

#[test]
fn memory_path_opens_too() {
    let store = ReachStore::open(":memory:").unwrap();
    store.migrate().unwrap();
    assert!(store.events_for_run("none").unwrap().is_empty());
}
