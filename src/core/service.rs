//! Forecasting service
//!
//! Wires the Monte Carlo engine to its collaborators: a `ForecastStore` for
//! team profiles and runs, and a `SeedSource` for randomness. Construct one per
//! store; it is `Send + Sync` and can be shared across threads.

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use crate::core::calibration::{calibrate_factor, CalibrationUpdate};
use crate::core::identity::RunId;
use crate::core::montecarlo::{
    simulate_scope, EntropySeeds, FixedSeed, SeedSource, SimulationError, SimulationOptions,
    SimulationResult,
};
use crate::core::revenue::{simulate_pipeline, Deal};
use crate::core::run::SimulationRun;
use crate::core::store::{CalibrationCommit, ForecastStore, StoreError};
use crate::core::task::{ProjectScope, VolatilityProfile};

/// Compare-and-swap attempts before calibration gives up
const MAX_CALIBRATION_ATTEMPTS: usize = 8;

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error("Simulation run {0} not found")]
    RunNotFound(RunId),

    #[error("Simulation run {0} has already been calibrated")]
    AlreadyCalibrated(RunId),

    #[error("Invalid actual outcome {0}: must be a finite value >= 0")]
    InvalidActual(f64),

    #[error("Invalid volatility profile: {0}")]
    InvalidProfile(String),

    #[error("Volatility for team '{0}' kept changing during calibration; try again")]
    Contended(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ForecastError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::RunNotFound(id) => ForecastError::RunNotFound(id),
            StoreError::AlreadyCalibrated(id) => ForecastError::AlreadyCalibrated(id),
            other => ForecastError::Store(other),
        }
    }
}

/// A cost/duration forecast and the run it was recorded as, if any
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub result: SimulationResult,
    pub run: Option<SimulationRun>,
}

/// Result of a successful calibration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationReport {
    pub run_id: RunId,
    pub team_id: String,
    pub actual: f64,
    pub update: CalibrationUpdate,
}

pub struct ForecastService<S: ForecastStore> {
    store: S,
    seeds: Box<dyn SeedSource>,
    options: SimulationOptions,
    default_profile: VolatilityProfile,
}

impl<S: ForecastStore> ForecastService<S> {
    /// Service drawing fresh entropy for every simulation
    pub fn new(store: S) -> Self {
        Self::with_seeds(store, Box::new(EntropySeeds))
    }

    pub fn with_seeds(store: S, seeds: Box<dyn SeedSource>) -> Self {
        Self {
            store,
            seeds,
            options: SimulationOptions::default(),
            default_profile: VolatilityProfile::default(),
        }
    }

    /// Service that always uses `seed`, for reproducible forecasts
    pub fn seeded(store: S, seed: u64) -> Self {
        Self::with_seeds(store, Box::new(FixedSeed(seed)))
    }

    pub fn with_options(mut self, options: SimulationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_default_profile(mut self, profile: VolatilityProfile) -> Self {
        self.default_profile = profile;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &SimulationOptions {
        &self.options
    }

    /// Stored profile for a team, or the default profile
    pub fn profile_for(&self, team_id: &str) -> Result<VolatilityProfile, ForecastError> {
        let profile = self.store.load_profile(team_id)?;
        if profile.is_none() {
            tracing::debug!(team = team_id, "no stored profile, using defaults");
        }
        Ok(profile.unwrap_or(self.default_profile))
    }

    pub fn set_profile(
        &self,
        team_id: &str,
        profile: &VolatilityProfile,
    ) -> Result<(), ForecastError> {
        profile.validate().map_err(ForecastError::InvalidProfile)?;
        self.store.save_profile(team_id, profile)?;
        Ok(())
    }

    /// Cost/duration forecast for a scope, recorded as a run when `link_id` is given
    pub fn run_simulation(
        &self,
        scope: &ProjectScope,
        team_id: &str,
        link_id: Option<&str>,
    ) -> Result<Forecast, ForecastError> {
        self.run_simulation_with(scope, team_id, link_id, &self.options)
    }

    /// Like `run_simulation` with per-call options (cancel token, timeout, ...)
    pub fn run_simulation_with(
        &self,
        scope: &ProjectScope,
        team_id: &str,
        link_id: Option<&str>,
        options: &SimulationOptions,
    ) -> Result<Forecast, ForecastError> {
        let profile = self.profile_for(team_id)?;
        let result = simulate_scope(scope, &profile, self.seeds.next_seed(), options)?;

        let run = match link_id {
            Some(link) => {
                let run = SimulationRun::from_result(team_id, Some(link), &result);
                self.store.insert_run(&run)?;
                tracing::info!(run = %run.id, team = team_id, link, "recorded simulation run");
                Some(run)
            }
            None => None,
        };

        Ok(Forecast { result, run })
    }

    /// Revenue forecast; touches no persistent state
    pub fn run_revenue_simulation(
        &self,
        deals: &[Deal],
        volatility_factor: f64,
    ) -> Result<SimulationResult, ForecastError> {
        self.run_revenue_simulation_with(deals, volatility_factor, 0.0, &self.options)
    }

    pub fn run_revenue_simulation_with(
        &self,
        deals: &[Deal],
        volatility_factor: f64,
        target: f64,
        options: &SimulationOptions,
    ) -> Result<SimulationResult, ForecastError> {
        let result = simulate_pipeline(
            deals,
            volatility_factor,
            target,
            self.seeds.next_seed(),
            options,
        )?;
        Ok(result)
    }

    /// Feed an observed outcome back into the owning team's volatility index
    ///
    /// Fails with `RunNotFound` for unknown runs and `AlreadyCalibrated` for
    /// runs that already took an observation.
    pub fn calibrate(&self, run_id: &RunId, actual: f64) -> Result<CalibrationReport, ForecastError> {
        if !(actual.is_finite() && actual >= 0.0) {
            return Err(ForecastError::InvalidActual(actual));
        }

        for attempt in 1..=MAX_CALIBRATION_ATTEMPTS {
            let run = self
                .store
                .get_run(run_id)?
                .ok_or(ForecastError::RunNotFound(*run_id))?;
            if run.is_calibrated() {
                return Err(ForecastError::AlreadyCalibrated(*run_id));
            }

            let baseline = self.profile_for(&run.team_id)?;
            let update = calibrate_factor(baseline.volatility_index, run.p50, run.p90, actual);
            let commit = CalibrationCommit {
                run_id: *run_id,
                team_id: &run.team_id,
                baseline,
                new_factor: update.new_factor,
                actual,
                at: Utc::now(),
            };

            match self.store.commit_calibration(&commit) {
                Ok(()) => {
                    tracing::info!(
                        run = %run_id,
                        team = %run.team_id,
                        signal = %update.signal,
                        previous = update.previous_factor,
                        new = update.new_factor,
                        "calibration applied"
                    );
                    return Ok(CalibrationReport {
                        run_id: *run_id,
                        team_id: run.team_id.clone(),
                        actual,
                        update,
                    });
                }
                Err(StoreError::Conflict { found, .. }) => {
                    tracing::warn!(
                        run = %run_id,
                        team = %run.team_id,
                        attempt,
                        found,
                        "team volatility moved during calibration, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        let team = self
            .store
            .get_run(run_id)?
            .map(|r| r.team_id)
            .unwrap_or_default();
        Err(ForecastError::Contended(team))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::run::RunState;
    use crate::core::store::SqliteStore;
    use crate::core::task::{Complexity, TaskSpec};
    use std::sync::Arc;

    fn service() -> ForecastService<SqliteStore> {
        ForecastService::seeded(SqliteStore::open_in_memory().unwrap(), 42)
            .with_options(SimulationOptions::default().with_iterations(2_000))
    }

    fn scope() -> ProjectScope {
        ProjectScope::new(
            vec![
                TaskSpec::new(3.0, Complexity::Medium),
                TaskSpec::new(5.0, Complexity::High),
            ],
            25.0,
        )
    }

    /// Store a run with a known band so calibration outcomes are exact
    fn stored_run(svc: &ForecastService<SqliteStore>, team: &str, p50: f64, p90: f64) -> RunId {
        let mut run = SimulationRun::from_result(
            team,
            Some("BR-1"),
            &crate::core::montecarlo::summarize(
                &[1.0],
                crate::core::montecarlo::SuccessCriterion::AtMost(1.0),
                1,
                0.2,
            ),
        );
        run.p50 = p50;
        run.p90 = p90;
        svc.store().insert_run(&run).unwrap();
        run.id
    }

    #[test]
    fn test_missing_team_uses_default_profile() {
        let svc = service();
        let forecast = svc.run_simulation(&scope(), "ghosts", None).unwrap();
        assert_eq!(forecast.result.volatility_factor_used, 0.2);
        assert!(forecast.run.is_none());
        assert!(svc.store().list_runs(None).unwrap().is_empty());
    }

    #[test]
    fn test_stored_profile_is_used() {
        let svc = service();
        svc.set_profile("core", &VolatilityProfile::new(1.0, 0.5, 0.45))
            .unwrap();
        let forecast = svc.run_simulation(&scope(), "core", None).unwrap();
        assert_eq!(forecast.result.volatility_factor_used, 0.45);
    }

    #[test]
    fn test_linked_simulation_records_run() {
        let svc = service();
        let forecast = svc.run_simulation(&scope(), "core", Some("BR-9")).unwrap();
        let run = forecast.run.unwrap();

        let stored = svc.store().get_run(&run.id).unwrap().unwrap();
        assert_eq!(stored.p50, forecast.result.p50);
        assert_eq!(stored.p90, forecast.result.p90);
        assert_eq!(stored.volatility_factor_used, 0.2);
        assert_eq!(stored.link_id.as_deref(), Some("BR-9"));
        assert_eq!(stored.state, RunState::Created);
    }

    #[test]
    fn test_seeded_service_is_reproducible() {
        let a = service().run_simulation(&scope(), "core", None).unwrap();
        let b = service().run_simulation(&scope(), "core", None).unwrap();
        assert_eq!(a.result, b.result);
    }

    #[test]
    fn test_calibrate_overrun_increases_factor() {
        let svc = service();
        let id = stored_run(&svc, "core", 10.0, 20.0);
        let report = svc.calibrate(&id, 35.0).unwrap();
        assert!(report.update.new_factor > 0.2);

        let profile = svc.profile_for("core").unwrap();
        assert_eq!(profile.volatility_index, report.update.new_factor);
        let run = svc.store().get_run(&id).unwrap().unwrap();
        assert_eq!(run.state, RunState::Calibrated);
        assert_eq!(run.actual_duration, Some(35.0));
        assert!(run.calibrated_at.is_some());
    }

    #[test]
    fn test_calibrate_underrun_decreases_factor() {
        let svc = service();
        let id = stored_run(&svc, "core", 10.0, 20.0);
        let report = svc.calibrate(&id, 3.0).unwrap();
        assert!(report.update.new_factor < 0.2);
        assert_eq!(svc.profile_for("core").unwrap().volatility_index, report.update.new_factor);
    }

    #[test]
    fn test_calibrate_within_band_keeps_factor() {
        let svc = service();
        svc.set_profile("core", &VolatilityProfile::new(1.0, 0.5, 0.3))
            .unwrap();
        let id = stored_run(&svc, "core", 10.0, 20.0);
        svc.calibrate(&id, 15.0).unwrap();
        assert_eq!(svc.profile_for("core").unwrap().volatility_index, 0.3);
        assert!(svc.store().get_run(&id).unwrap().unwrap().is_calibrated());
    }

    #[test]
    fn test_calibrate_unknown_run_is_not_found() {
        let svc = service();
        let err = svc.calibrate(&RunId::new(), 10.0).unwrap_err();
        assert!(matches!(err, ForecastError::RunNotFound(_)));
    }

    #[test]
    fn test_calibrate_twice_is_rejected() {
        let svc = service();
        let id = stored_run(&svc, "core", 10.0, 20.0);
        svc.calibrate(&id, 50.0).unwrap();
        let after_first = svc.profile_for("core").unwrap().volatility_index;

        let err = svc.calibrate(&id, 50.0).unwrap_err();
        assert!(matches!(err, ForecastError::AlreadyCalibrated(_)));
        assert_eq!(svc.profile_for("core").unwrap().volatility_index, after_first);
    }

    #[test]
    fn test_calibrate_rejects_bad_actual() {
        let svc = service();
        let id = stored_run(&svc, "core", 10.0, 20.0);
        assert!(matches!(
            svc.calibrate(&id, f64::NAN),
            Err(ForecastError::InvalidActual(_))
        ));
        assert!(matches!(
            svc.calibrate(&id, -1.0),
            Err(ForecastError::InvalidActual(_))
        ));
        assert!(!svc.store().get_run(&id).unwrap().unwrap().is_calibrated());
    }

    #[test]
    fn test_concurrent_calibrations_all_apply() {
        let svc = Arc::new(service());
        svc.set_profile("core", &VolatilityProfile::default()).unwrap();
        let ids: Vec<RunId> = (0..8).map(|_| stored_run(&svc, "core", 10.0, 20.0)).collect();

        let handles: Vec<_> = ids
            .into_iter()
            .map(|id| {
                let svc = Arc::clone(&svc);
                std::thread::spawn(move || svc.calibrate(&id, 100.0).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        // Each overrun multiplies the factor by 1 + 0.1 * 0.2
        let expected = 0.2 * 1.02_f64.powi(8);
        let actual = svc.profile_for("core").unwrap().volatility_index;
        assert!((actual - expected).abs() < 1e-12, "got {}", actual);
    }

    #[test]
    fn test_revenue_simulation_is_pure() {
        let svc = service();
        let result = svc
            .run_revenue_simulation(&[Deal::new(50_000.0, 1.0)], 0.0)
            .unwrap();
        assert_eq!(result.p50, 50_000.0);
        assert_eq!(result.p90, 50_000.0);
        assert_eq!(result.p99, 50_000.0);
        assert!(svc.store().list_runs(None).unwrap().is_empty());
        assert!(svc.store().list_teams().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_profile_rejected() {
        let svc = service();
        let err = svc
            .set_profile("core", &VolatilityProfile::new(-1.0, 0.0, 0.2))
            .unwrap_err();
        assert!(matches!(err, ForecastError::InvalidProfile(_)));
    }
}
