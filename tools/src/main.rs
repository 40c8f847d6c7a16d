//! reach-runner: once-a-day reachability reconciliation over per-country exports.
//!
//! Usage:
//!   reach-runner --config countries.json --exports ./exports --results ./results
//!   reach-runner --config countries.json --date 2024-05-01 --db ledger.db --import-segments
//!   reach-runner --config countries.json --json

use anyhow::Result;
use reach_core::{
    config::ReachConfig,
    engine::{ReachEngine, RunReport},
    store::ReachStore,
};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let config_path = flag_value(&args, "--config").unwrap_or("./countries.json");
    let exports = flag_value(&args, "--exports").unwrap_or("./exports");
    let results = flag_value(&args, "--results").unwrap_or("./results");
    let db = flag_value(&args, "--db").unwrap_or(":memory:");
    let run_date = flag_value(&args, "--date")
        .map(str::to_string)
        .unwrap_or_else(today);
    let import_segments = args.iter().any(|a| a == "--import-segments");
    let json = args.iter().any(|a| a == "--json");

    if !json {
        println!("reach-runner");
        println!("  config:    {config_path}");
        println!("  exports:   {exports}");
        println!("  results:   {results}");
        println!("  date:      {run_date}");
        println!("  db:        {db}");
        println!();
    }

    let config = ReachConfig::load(config_path)?;
    let store = ReachStore::open(db)?;
    let mut engine = ReachEngine::build(config, exports, results, &run_date, store)?
        .with_segment_import(import_segments);

    let report = engine.run()?;
    log::info!(
        "Run {} finished: {} processed, {} skipped",
        report.run_id,
        report.processed.len(),
        report.skipped.len()
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn print_summary(report: &RunReport) {
    println!("=== RUN SUMMARY ===");
    println!("  run_id:     {}", report.run_id);
    println!("  date:       {}", report.run_date);
    println!("  processed:  {}", report.processed.len());
    println!("  skipped:    {}", report.skipped.len());
    println!("  summary:    {}", report.summary_path.display());

    println!();
    println!("=== REACHABILITY ===");
    if report.summaries.is_empty() {
        println!("  (No countries processed)");
    }
    for s in &report.summaries {
        println!(
            "  {:<4} | rate {:.4} | reachable {}/{} | email {} | phone {} | in-app {} | push {}",
            s.country_code,
            s.reachability_rate,
            s.reachable_accounts,
            s.total_identity_accounts,
            s.email_available_accounts,
            s.phone_available_accounts,
            s.in_app_available_accounts,
            s.push_available_accounts,
        );
    }

    println!();
    println!("=== ROW SKIPS ===");
    for o in &report.processed {
        println!(
            "  {:<4} | identity {} skipped of {} | messaging {} skipped of {} | orphans {}",
            o.country,
            o.identity_stats.rows_skipped(),
            o.identity_stats.rows_read,
            o.messaging_stats.rows_skipped(),
            o.messaging_stats.rows_read,
            o.orphans,
        );
    }

    if !report.skipped.is_empty() {
        println!();
        println!("=== SKIPPED COUNTRIES ===");
        for s in &report.skipped {
            println!("  {:<4} | {}", s.country, s.reason);
        }
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}
