//! Persistence for team volatility profiles and simulation runs
//!
//! `ForecastStore` is the seam the service talks to. `SqliteStore` is the
//! shipped implementation: a single SQLite file (or in-memory database) with a
//! `teams` table and a `simulation_runs` table.
//!
//! Calibration writes go through `commit_calibration`, which performs the run
//! state flip and the team factor update in one IMMEDIATE transaction and uses
//! the factor the caller read as a compare-and-swap guard.

mod serialize;

use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::Serialize;
use thiserror::Error;

use crate::core::identity::RunId;
use crate::core::run::{RunState, SimulationRun};
use crate::core::task::VolatilityProfile;

use serialize::Timestamp;

/// Schema version written to `PRAGMA user_version`
const SCHEMA_VERSION: i32 = 1;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS teams (
    id TEXT PRIMARY KEY,
    median_touch_time REAL NOT NULL,
    median_queue_time REAL NOT NULL,
    volatility_index REAL NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS simulation_runs (
    id TEXT PRIMARY KEY,
    team_id TEXT NOT NULL,
    link_id TEXT,
    p50 REAL NOT NULL,
    p90 REAL NOT NULL,
    volatility_factor_used REAL NOT NULL,
    state TEXT NOT NULL,
    actual_duration REAL,
    calibrated_at TEXT,
    volatility_before REAL,
    volatility_after REAL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_runs_team ON simulation_runs(team_id);
"#;

const RUN_COLUMNS: &str = "id, team_id, link_id, p50, p90, volatility_factor_used, state, \
     actual_duration, calibrated_at, volatility_before, volatility_after, created_at";

/// Errors from the persistence layer
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Simulation run {0} not found")]
    RunNotFound(RunId),

    #[error("Simulation run {0} has already been calibrated")]
    AlreadyCalibrated(RunId),

    #[error("Volatility for team '{team_id}' changed concurrently (expected {expected}, found {found})")]
    Conflict {
        team_id: String,
        expected: f64,
        found: f64,
    },
}

/// A team's stored profile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamRecord {
    pub team_id: String,
    #[serde(flatten)]
    pub profile: VolatilityProfile,
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to apply one calibration atomically
#[derive(Debug, Clone)]
pub struct CalibrationCommit<'a> {
    pub run_id: RunId,
    pub team_id: &'a str,
    /// Profile the new factor was computed from; its factor is the CAS guard
    pub baseline: VolatilityProfile,
    pub new_factor: f64,
    pub actual: f64,
    pub at: DateTime<Utc>,
}

/// Persistence collaborator for the forecasting service
pub trait ForecastStore: Send + Sync {
    fn load_profile(&self, team_id: &str) -> Result<Option<VolatilityProfile>, StoreError>;

    fn save_profile(&self, team_id: &str, profile: &VolatilityProfile) -> Result<(), StoreError>;

    fn list_teams(&self) -> Result<Vec<TeamRecord>, StoreError>;

    fn insert_run(&self, run: &SimulationRun) -> Result<(), StoreError>;

    fn get_run(&self, id: &RunId) -> Result<Option<SimulationRun>, StoreError>;

    /// Runs in insertion order, newest first
    fn list_runs(&self, team_id: Option<&str>) -> Result<Vec<SimulationRun>, StoreError>;

    /// Mark the run calibrated and write the team's new factor, or do neither
    fn commit_calibration(&self, commit: &CalibrationCommit<'_>) -> Result<(), StoreError>;
}

/// SQLite-backed store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if needed) a database file
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        tracing::debug!(path = %path.display(), "opened forecast store");
        Self::init(conn)
    }

    /// Fresh private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn run_from_row(row: &Row<'_>) -> rusqlite::Result<SimulationRun> {
        let calibrated_at: Option<Timestamp> = row.get(8)?;
        let created_at: Timestamp = row.get(11)?;
        Ok(SimulationRun {
            id: row.get(0)?,
            team_id: row.get(1)?,
            link_id: row.get(2)?,
            p50: row.get(3)?,
            p90: row.get(4)?,
            volatility_factor_used: row.get(5)?,
            state: row.get(6)?,
            actual_duration: row.get(7)?,
            calibrated_at: calibrated_at.map(|t| t.0),
            volatility_before: row.get(9)?,
            volatility_after: row.get(10)?,
            created_at: created_at.0,
        })
    }
}

impl ForecastStore for SqliteStore {
    fn load_profile(&self, team_id: &str) -> Result<Option<VolatilityProfile>, StoreError> {
        let conn = self.conn.lock();
        let profile = conn
            .query_row(
                "SELECT median_touch_time, median_queue_time, volatility_index
                 FROM teams WHERE id = ?1",
                [team_id],
                |row| {
                    Ok(VolatilityProfile::new(
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                    ))
                },
            )
            .optional()?;
        Ok(profile)
    }

    fn save_profile(&self, team_id: &str, profile: &VolatilityProfile) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO teams (id, median_touch_time, median_queue_time, volatility_index, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                median_touch_time = excluded.median_touch_time,
                median_queue_time = excluded.median_queue_time,
                volatility_index = excluded.volatility_index,
                updated_at = excluded.updated_at",
            params![
                team_id,
                profile.median_touch_time,
                profile.median_queue_time,
                profile.volatility_index,
                Timestamp(Utc::now()),
            ],
        )?;
        Ok(())
    }

    fn list_teams(&self) -> Result<Vec<TeamRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, median_touch_time, median_queue_time, volatility_index, updated_at
             FROM teams ORDER BY id",
        )?;
        let teams = stmt
            .query_map([], |row| {
                let updated_at: Timestamp = row.get(4)?;
                Ok(TeamRecord {
                    team_id: row.get(0)?,
                    profile: VolatilityProfile::new(row.get(1)?, row.get(2)?, row.get(3)?),
                    updated_at: updated_at.0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(teams)
    }

    fn insert_run(&self, run: &SimulationRun) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT INTO simulation_runs ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                RUN_COLUMNS
            ),
            params![
                run.id,
                run.team_id,
                run.link_id,
                run.p50,
                run.p90,
                run.volatility_factor_used,
                run.state,
                run.actual_duration,
                run.calibrated_at.map(Timestamp),
                run.volatility_before,
                run.volatility_after,
                Timestamp(run.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_run(&self, id: &RunId) -> Result<Option<SimulationRun>, StoreError> {
        let conn = self.conn.lock();
        let run = conn
            .query_row(
                &format!("SELECT {} FROM simulation_runs WHERE id = ?1", RUN_COLUMNS),
                [id],
                Self::run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn list_runs(&self, team_id: Option<&str>) -> Result<Vec<SimulationRun>, StoreError> {
        let conn = self.conn.lock();
        let runs = match team_id {
            Some(team) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM simulation_runs WHERE team_id = ?1 ORDER BY rowid DESC",
                    RUN_COLUMNS
                ))?;
                let rows = stmt.query_map([team], Self::run_from_row)?;
                let runs = rows.collect::<Result<Vec<_>, _>>()?;
                runs
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM simulation_runs ORDER BY rowid DESC",
                    RUN_COLUMNS
                ))?;
                let rows = stmt.query_map([], Self::run_from_row)?;
                let runs = rows.collect::<Result<Vec<_>, _>>()?;
                runs
            }
        };
        Ok(runs)
    }

    fn commit_calibration(&self, commit: &CalibrationCommit<'_>) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        // IMMEDIATE takes the write lock up front so the read below cannot go stale
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let state: Option<RunState> = tx
            .query_row(
                "SELECT state FROM simulation_runs WHERE id = ?1",
                [&commit.run_id],
                |row| row.get(0),
            )
            .optional()?;
        match state {
            None => return Err(StoreError::RunNotFound(commit.run_id)),
            Some(RunState::Calibrated) => return Err(StoreError::AlreadyCalibrated(commit.run_id)),
            Some(RunState::Created) => {}
        }

        let stored: Option<f64> = tx
            .query_row(
                "SELECT volatility_index FROM teams WHERE id = ?1",
                [commit.team_id],
                |row| row.get(0),
            )
            .optional()?;
        let expected = commit.baseline.volatility_index;
        let now = Timestamp(commit.at);

        match stored {
            Some(found) if found != expected => {
                return Err(StoreError::Conflict {
                    team_id: commit.team_id.to_string(),
                    expected,
                    found,
                });
            }
            Some(_) => {
                tx.execute(
                    "UPDATE teams SET volatility_index = ?2, updated_at = ?3 WHERE id = ?1",
                    params![commit.team_id, commit.new_factor, now],
                )?;
            }
            None => {
                tx.execute(
                    "INSERT INTO teams (id, median_touch_time, median_queue_time, volatility_index, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        commit.team_id,
                        commit.baseline.median_touch_time,
                        commit.baseline.median_queue_time,
                        commit.new_factor,
                        now,
                    ],
                )?;
            }
        }

        tx.execute(
            "UPDATE simulation_runs
             SET state = ?2, actual_duration = ?3, calibrated_at = ?4,
                 volatility_before = ?5, volatility_after = ?6
             WHERE id = ?1 AND state = ?7",
            params![
                commit.run_id,
                RunState::Calibrated,
                commit.actual,
                now,
                expected,
                commit.new_factor,
                RunState::Created,
            ],
        )?;

        tx.commit()?;
        Ok(())
    }
}
