//! Persistent run log using redb.
//!
//! # Table design
//!
//! A single `RUNS` table uses a 24-byte composite key:
//! ```text
//! [ started_at_ms: u64 big-endian (8 bytes) | run_id: 16 bytes ]
//! ```
//!
//! Byte ordering equals start-time ordering, so the newest runs are a reverse
//! scan and retention trims from the front. Values are JSON `RunReport`s.

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, TagflowError};
use crate::workflow::RunReport;

// ---------------------------------------------------------------------------
// Table definition
// ---------------------------------------------------------------------------

/// Key: 24-byte composite (started_at_ms big-endian ++ uuid bytes)
/// Value: JSON-encoded RunReport
const RUNS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("runs");

fn run_key(ts: DateTime<Utc>, id: Uuid) -> [u8; 24] {
    let mut key = [0u8; 24];
    let ms = ts.timestamp_millis().max(0) as u64;
    key[..8].copy_from_slice(&ms.to_be_bytes());
    key[8..].copy_from_slice(id.as_bytes());
    key
}

fn db_err(e: impl std::fmt::Display) -> TagflowError {
    TagflowError::RunLog(e.to_string())
}

// ---------------------------------------------------------------------------
// RunLog
// ---------------------------------------------------------------------------

pub struct RunLog {
    db: Database,
}

impl RunLog {
    /// Open or create the run log at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            crate::io::ensure_dir(parent)?;
        }
        let db = Database::create(path).map_err(db_err)?;
        let wt = db.begin_write().map_err(db_err)?;
        wt.open_table(RUNS).map_err(db_err)?;
        wt.commit().map_err(db_err)?;
        Ok(Self { db })
    }

    pub fn record(&self, report: &RunReport) -> Result<()> {
        let key = run_key(report.started_at, report.run_id);
        let value = serde_json::to_vec(report)?;
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut table = wt.open_table(RUNS).map_err(db_err)?;
            table
                .insert(key.as_slice(), value.as_slice())
                .map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        debug!(run_id = %report.run_id, "run recorded");
        Ok(())
    }

    /// Up to `limit` runs, newest first.
    pub fn list_recent(&self, limit: usize) -> Result<Vec<RunReport>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(RUNS).map_err(db_err)?;

        let mut result = Vec::new();
        for entry in table.iter().map_err(db_err)?.rev().take(limit) {
            let (_, v) = entry.map_err(db_err)?;
            let report: RunReport = serde_json::from_slice(v.value())?;
            result.push(report);
        }
        Ok(result)
    }

    pub fn get(&self, run_id: Uuid) -> Result<RunReport> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(RUNS).map_err(db_err)?;

        for entry in table.iter().map_err(db_err)? {
            let (k, v) = entry.map_err(db_err)?;
            if k.value()[8..] == run_id.as_bytes()[..] {
                return Ok(serde_json::from_slice(v.value())?);
            }
        }
        Err(TagflowError::RunNotFound(run_id.to_string()))
    }

    /// Drop everything but the newest `keep` runs. Returns how many were removed.
    pub fn enforce_retention(&self, keep: usize) -> Result<usize> {
        let wt = self.db.begin_write().map_err(db_err)?;
        let removed = {
            let mut table = wt.open_table(RUNS).map_err(db_err)?;
            let total = table.len().map_err(db_err)? as usize;
            let excess = total.saturating_sub(keep);
            let mut stale = Vec::with_capacity(excess);
            for entry in table.iter().map_err(db_err)?.take(excess) {
                let (k, _) = entry.map_err(db_err)?;
                stale.push(k.value().to_vec());
            }
            for key in &stale {
                table.remove(key.as_slice()).map_err(db_err)?;
            }
            stale.len()
        };
        wt.commit().map_err(db_err)?;
        if removed > 0 {
            debug!(removed, keep, "run log trimmed");
        }
        Ok(removed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::parse_request;
    use crate::workflow::{RunStatus, Step};
    use chrono::Duration as CDur;
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, RunLog) {
        let dir = TempDir::new().unwrap();
        let log = RunLog::open(&dir.path().join("runs.redb")).unwrap();
        (dir, log)
    }

    fn report_at(ts: DateTime<Utc>, status: RunStatus) -> RunReport {
        RunReport {
            run_id: Uuid::new_v4(),
            request: parse_request(
                r#"{"Tags":{"or":[{"Key":"Instance","Values":["Instance A"]}]},"Action":"Stop"}"#,
            )
            .unwrap(),
            status,
            matched: None,
            dispatch: None,
            trace: vec![Step::Start, Step::EvaluateOr],
            started_at: ts,
            finished_at: ts,
            elapsed_ms: 0,
        }
    }

    #[test]
    fn list_recent_is_newest_first() {
        let (_dir, log) = open_tmp();
        let now = Utc::now();
        let old = report_at(now - CDur::seconds(60), RunStatus::NoOp);
        let new = report_at(now, RunStatus::Succeeded);
        log.record(&new).unwrap();
        log.record(&old).unwrap();

        let runs = log.list_recent(10).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].run_id, new.run_id);
        assert_eq!(runs[1].run_id, old.run_id);

        assert_eq!(log.list_recent(1).unwrap().len(), 1);
    }

    #[test]
    fn get_by_id() {
        let (_dir, log) = open_tmp();
        let report = report_at(
            Utc::now(),
            RunStatus::Failed {
                reason: "1 of 1 failed".into(),
            },
        );
        log.record(&report).unwrap();
        let loaded = log.get(report.run_id).unwrap();
        assert_eq!(loaded.status, report.status);
        assert_eq!(loaded.request, report.request);
    }

    #[test]
    fn get_unknown_is_not_found() {
        let (_dir, log) = open_tmp();
        let err = log.get(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, TagflowError::RunNotFound(_)));
    }

    #[test]
    fn retention_keeps_newest() {
        let (_dir, log) = open_tmp();
        let now = Utc::now();
        let reports: Vec<_> = (0..5)
            .map(|i| report_at(now - CDur::seconds(10 - i), RunStatus::NoOp))
            .collect();
        for r in &reports {
            log.record(r).unwrap();
        }
        assert_eq!(log.enforce_retention(2).unwrap(), 3);
        let kept: Vec<_> = log.list_recent(10).unwrap().into_iter().map(|r| r.run_id).collect();
        assert_eq!(kept, vec![reports[4].run_id, reports[3].run_id]);
        assert_eq!(log.enforce_retention(2).unwrap(), 0);
    }

    #[test]
    fn reopen_keeps_runs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("runs.redb");
        let report = report_at(Utc::now(), RunStatus::TimedOut);
        {
            let log = RunLog::open(&path).unwrap();
            log.record(&report).unwrap();
        }
        let log = RunLog::open(&path).unwrap();
        assert_eq!(log.get(report.run_id).unwrap().status, RunStatus::TimedOut);
    }
}
