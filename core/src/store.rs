//! SQLite run ledger.
//!
//! RULE: Only store.rs talks to the database.
//! The engine calls store methods; nothing else executes SQL.

use crate::{
    aggregator::CountrySummary,
    error::ReachResult,
    event::{EventLogEntry, RunEvent},
    types::CountryCode,
};
use rusqlite::{params, Connection};

pub struct ReachStore {
    conn: Connection,
}

impl ReachStore {
    /// Open (or create) the ledger database at `path`.
    pub fn open(path: &str) -> ReachResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> ReachResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> ReachResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(&self, run_id: &str, run_date: &str, version: &str) -> ReachResult<()> {
        self.conn.execute(
            "INSERT INTO run (run_id, run_date, version, started_at) VALUES (?1, ?2, ?3, ?4)",
            params![run_id, run_date, version, now()],
        )?;
        Ok(())
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, run_id: &str, event: &RunEvent) -> ReachResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (run_id, country, event_type, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                run_id,
                event.country(),
                event.type_name(),
                serde_json::to_string(event)?,
                now(),
            ],
        )?;
        Ok(())
    }

    pub fn events_for_run(&self, run_id: &str) -> ReachResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, country, event_type, payload
             FROM event_log WHERE run_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![run_id], |row| {
                Ok(EventLogEntry {
                    id:         Some(row.get(0)?),
                    run_id:     row.get(1)?,
                    country:    row.get(2)?,
                    event_type: row.get(3)?,
                    payload:    row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Countries skipped during `run_id`, with the recorded reason.
    pub fn skipped_countries(&self, run_id: &str) -> ReachResult<Vec<(CountryCode, String)>> {
        let mut skipped = Vec::new();
        for entry in self.events_for_run(run_id)? {
            if entry.event_type != "country_skipped" {
                continue;
            }
            if let RunEvent::CountrySkipped { country, reason } =
                serde_json::from_str::<RunEvent>(&entry.payload)?
            {
                skipped.push((country, reason));
            }
        }
        Ok(skipped)
    }

    // ── Country summaries ──────────────────────────────────────

    pub fn insert_country_summary(&self, run_id: &str, s: &CountrySummary) -> ReachResult<()> {
        self.conn.execute(
            "INSERT INTO country_summary (
                 run_id, country, total_accounts, reachable_accounts, unreachable_accounts,
                 reachability_rate, email_available, phone_available, in_app_available,
                 push_available
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                run_id,
                s.country_code,
                s.total_identity_accounts as i64,
                s.reachable_accounts as i64,
                s.unreachable_accounts as i64,
                s.reachability_rate,
                s.email_available_accounts as i64,
                s.phone_available_accounts as i64,
                s.in_app_available_accounts as i64,
                s.push_available_accounts as i64,
            ],
        )?;
        Ok(())
    }

    /// Summaries for `run_id` in report order.
    pub fn summaries_for_run(&self, run_id: &str) -> ReachResult<Vec<CountrySummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT country, total_accounts, reachable_accounts, unreachable_accounts,
                    reachability_rate, email_available, phone_available, in_app_available,
                    push_available
             FROM country_summary WHERE run_id = ?1
             ORDER BY reachability_rate DESC, country ASC",
        )?;
        let rows = stmt
            .query_map(params![run_id], |r| {
                Ok(CountrySummary {
                    country_code:              r.get(0)?,
                    total_identity_accounts:   r.get::<_, i64>(1)? as u64,
                    reachable_accounts:        r.get::<_, i64>(2)? as u64,
                    unreachable_accounts:      r.get::<_, i64>(3)? as u64,
                    reachability_rate:         r.get(4)?,
                    email_available_accounts:  r.get::<_, i64>(5)? as u64,
                    phone_available_accounts:  r.get::<_, i64>(6)? as u64,
                    in_app_available_accounts: r.get::<_, i64>(7)? as u64,
                    push_available_accounts:   r.get::<_, i64>(8)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}
