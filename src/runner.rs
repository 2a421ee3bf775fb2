//! Scenario orchestration and Monte Carlo aggregation
//!
//! A scenario draws one spot path and one IV path from a single seeded
//! generator, holds HV constant, and turns every index into a frame.
//! Monte Carlo run `i` uses ChaCha stream `i + 1` of the runner seed; stream 0
//! belongs to single scenarios. Runs that fail are recorded and excluded from
//! the batch statistics instead of aborting the batch.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{EnvelopeConfig, RunnerConfig};
use crate::dynamics::{Direction, PathGenerator};
use crate::envelope::{FlightEnvelope, Regime};
use crate::io::TelemetryLogger;
use crate::telemetry::{TelemetryEngine, TelemetryFrame};
use crate::{FlightError, FlightResult};

pub const MEAN_REVERT_INTENSITY: f64 = 0.1;
pub const MEAN_REVERT_NOISE: f64 = 0.2;
pub const BREAKOUT_SPEED: f64 = 0.5;
pub const BREAKOUT_NOISE: f64 = 0.1;
pub const FALSE_BREAKOUT_DEPTH: f64 = 1.5;
pub const FALSE_BREAKOUT_RECOVERY: f64 = 0.8;

const SCENARIO_STREAM: u64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathType {
    MeanRevert,
    Breakout,
    FalseBreakout,
}

impl PathType {
    pub const ALL: [PathType; 3] = [
        PathType::MeanRevert,
        PathType::Breakout,
        PathType::FalseBreakout,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PathType::MeanRevert => "mean_revert",
            PathType::Breakout => "breakout",
            PathType::FalseBreakout => "false_breakout",
        }
    }

    fn spot_path(
        self,
        generator: &mut PathGenerator,
        envelope: &EnvelopeConfig,
    ) -> FlightResult<Vec<f64>> {
        match self {
            PathType::MeanRevert => {
                generator.mean_revert_pin(envelope.flip, MEAN_REVERT_INTENSITY, MEAN_REVERT_NOISE)
            }
            PathType::Breakout => {
                generator.breakout(Direction::Up, BREAKOUT_SPEED, BREAKOUT_NOISE)
            }
            PathType::FalseBreakout => generator.false_breakout(
                envelope.call_wall,
                FALSE_BREAKOUT_DEPTH,
                FALSE_BREAKOUT_RECOVERY,
            ),
        }
    }
}

impl FromStr for PathType {
    type Err = FlightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PathType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| FlightError::UnsupportedPathType(s.to_string()))
    }
}

impl fmt::Display for PathType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered frames of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioResult {
    pub name: String,
    pub path_type: PathType,
    pub stream: u64,
    pub frames: Vec<TelemetryFrame>,
}

impl ScenarioResult {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn breached(&self) -> bool {
        self.frames.iter().any(TelemetryFrame::is_breached)
    }

    pub fn breach_frames(&self) -> usize {
        self.frames.iter().filter(|f| f.is_breached()).count()
    }

    pub fn max_load(&self) -> f64 {
        self.frames.iter().map(|f| f.y).fold(0.0, f64::max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunFailure {
    pub run_id: usize,
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(ScenarioResult),
    Failed(RunFailure),
}

#[derive(Debug, Clone)]
pub struct MonteCarloBatch {
    pub name: String,
    pub path_type: PathType,
    pub seed: u64,
    pub steps: usize,
    /// One entry per run, in run order.
    pub outcomes: Vec<RunOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonteCarloRunRecord {
    pub run_id: usize,
    pub name: String,
    pub completed: bool,
    pub breached: bool,
    pub breach_frames: usize,
    pub max_load: Option<f64>,
    pub final_spot: Option<f64>,
    pub final_regime: Option<Regime>,
    pub error: Option<String>,
}

impl MonteCarloBatch {
    pub fn records(&self) -> Vec<MonteCarloRunRecord> {
        self.outcomes
            .iter()
            .enumerate()
            .map(|(run_id, outcome)| match outcome {
                RunOutcome::Completed(result) => {
                    let last = result.frames.last();
                    MonteCarloRunRecord {
                        run_id,
                        name: result.name.clone(),
                        completed: true,
                        breached: result.breached(),
                        breach_frames: result.breach_frames(),
                        max_load: Some(result.max_load()),
                        final_spot: last.map(|f| f.spot),
                        final_regime: last.map(|f| f.regime),
                        error: None,
                    }
                }
                RunOutcome::Failed(failure) => MonteCarloRunRecord {
                    run_id: failure.run_id,
                    name: failure.name.clone(),
                    completed: false,
                    breached: false,
                    breach_frames: 0,
                    max_load: None,
                    final_spot: None,
                    final_regime: None,
                    error: Some(failure.error.clone()),
                },
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MonteCarloSummary {
    pub name: String,
    pub path_type: PathType,
    pub seed: u64,
    pub steps: usize,
    pub n_runs: usize,
    pub completed_runs: usize,
    pub failed_runs: usize,
    pub breach_count: usize,
    /// Breached runs over completed runs.
    pub breach_rate: f64,
    pub max_load: f64,
    pub mean_max_load: f64,
    pub regime_counts: BTreeMap<Regime, usize>,
    pub failures: Vec<RunFailure>,
}

pub fn summarize_batch(batch: &MonteCarloBatch) -> MonteCarloSummary {
    let mut regime_counts: BTreeMap<Regime, usize> =
        Regime::ALL.into_iter().map(|regime| (regime, 0)).collect();
    let mut failures = Vec::new();
    let mut completed_runs = 0_usize;
    let mut breach_count = 0_usize;
    let mut max_load = 0.0_f64;
    let mut sum_max_load = 0.0;

    for outcome in &batch.outcomes {
        match outcome {
            RunOutcome::Completed(result) => {
                completed_runs += 1;
                if result.breached() {
                    breach_count += 1;
                }
                let run_max = result.max_load();
                max_load = max_load.max(run_max);
                sum_max_load += run_max;
                for frame in &result.frames {
                    *regime_counts.entry(frame.regime).or_insert(0) += 1;
                }
            }
            RunOutcome::Failed(failure) => failures.push(failure.clone()),
        }
    }

    let (breach_rate, mean_max_load) = if completed_runs == 0 {
        (0.0, 0.0)
    } else {
        (
            breach_count as f64 / completed_runs as f64,
            sum_max_load / completed_runs as f64,
        )
    };

    MonteCarloSummary {
        name: batch.name.clone(),
        path_type: batch.path_type,
        seed: batch.seed,
        steps: batch.steps,
        n_runs: batch.outcomes.len(),
        completed_runs,
        failed_runs: failures.len(),
        breach_count,
        breach_rate,
        max_load,
        mean_max_load,
        regime_counts,
        failures,
    }
}

/// Orchestrates scenario generation and telemetry logging.
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    engine: TelemetryEngine,
    config: RunnerConfig,
}

impl ScenarioRunner {
    pub fn new(envelope: EnvelopeConfig, config: RunnerConfig) -> FlightResult<Self> {
        config.validate()?;
        let envelope = FlightEnvelope::new(envelope)?;
        config.validate_within(envelope.config())?;
        Ok(Self {
            engine: TelemetryEngine::new(envelope),
            config,
        })
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = Some(output_dir.into());
        self
    }

    pub fn envelope_config(&self) -> &EnvelopeConfig {
        self.engine.envelope().config()
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Runs one scenario and, when an output directory is set, writes
    /// `<name>.jsonl` there.
    pub fn run_scenario(
        &self,
        name: &str,
        path_type: &str,
        steps: usize,
    ) -> FlightResult<ScenarioResult> {
        let kind: PathType = path_type.parse()?;
        info!(scenario = name, path_type = %kind, steps, "running scenario");

        let result = self.simulate(name, kind, steps, SCENARIO_STREAM)?;
        if self.config.output_dir.is_some() {
            self.persist(&result)?;
        }
        Ok(result)
    }

    /// Runs `n_runs` independent scenarios and summarizes them.
    pub fn run_monte_carlo(
        &self,
        name: &str,
        path_type: &str,
        n_runs: usize,
        steps: usize,
    ) -> FlightResult<MonteCarloSummary> {
        let batch = self.run_monte_carlo_batch(name, path_type, n_runs, steps)?;
        let summary = summarize_batch(&batch);
        info!(
            batch = name,
            runs = summary.n_runs,
            failed = summary.failed_runs,
            breach_rate = summary.breach_rate,
            max_load = summary.max_load,
            "monte carlo complete"
        );
        Ok(summary)
    }

    pub fn run_monte_carlo_batch(
        &self,
        name: &str,
        path_type: &str,
        n_runs: usize,
        steps: usize,
    ) -> FlightResult<MonteCarloBatch> {
        let kind: PathType = path_type.parse()?;
        if n_runs == 0 {
            return Err(FlightError::configuration("n_runs must be > 0"));
        }
        info!(batch = name, path_type = %kind, n_runs, steps, "running monte carlo");

        let outcomes = (0..n_runs)
            .into_par_iter()
            .map(|run_id| {
                let run_name = format!("{name}_{run_id}");
                match self.monte_carlo_run(&run_name, kind, steps, run_id) {
                    Ok(result) => RunOutcome::Completed(result),
                    Err(err) => {
                        warn!(run = %run_name, error = %err, "run excluded from batch");
                        RunOutcome::Failed(RunFailure {
                            run_id,
                            name: run_name,
                            error: err.to_string(),
                        })
                    }
                }
            })
            .collect();

        Ok(MonteCarloBatch {
            name: name.to_string(),
            path_type: kind,
            seed: self.config.seed,
            steps,
            outcomes,
        })
    }

    fn monte_carlo_run(
        &self,
        name: &str,
        kind: PathType,
        steps: usize,
        run_id: usize,
    ) -> FlightResult<ScenarioResult> {
        let result = self.simulate(name, kind, steps, run_id as u64 + 1)?;
        if self.config.persist_monte_carlo_runs && self.config.output_dir.is_some() {
            self.persist(&result)?;
        }
        Ok(result)
    }

    fn simulate(
        &self,
        name: &str,
        kind: PathType,
        steps: usize,
        stream: u64,
    ) -> FlightResult<ScenarioResult> {
        let envelope = self.envelope_config();
        let mut generator = PathGenerator::seeded_stream(
            self.config.start_spot,
            envelope.atr,
            steps,
            self.config.seed,
            stream,
        )?;

        let spots = kind.spot_path(&mut generator, envelope)?;
        let ivs = generator.generate_vol_path(
            self.config.start_iv,
            self.config.target_iv,
            self.config.shock_at,
        )?;
        let hvs = vec![self.config.hv; steps];

        let frames = self.engine.compute_path(&spots, &ivs, &hvs)?;
        Ok(ScenarioResult {
            name: name.to_string(),
            path_type: kind,
            stream,
            frames,
        })
    }

    fn persist(&self, result: &ScenarioResult) -> FlightResult<()> {
        let Some(dir) = &self.config.output_dir else {
            return Ok(());
        };
        let path = dir.join(format!("{}.jsonl", result.name));
        TelemetryLogger::save_log(&path, &result.frames)?;
        debug!(path = %path.display(), frames = result.len(), "log saved");
        Ok(())
    }
}
