//! DSFB Flight - option flight-envelope telemetry
//!
//! Maps spot price and volatility onto a three-axis "flight envelope"
//! (structural airspeed, load factor, wall proximity), classifies each point
//! into a risk regime, and drives seeded synthetic scenarios and Monte Carlo
//! batches that produce time-ordered telemetry frames.

pub mod config;
pub mod dynamics;
pub mod envelope;
pub mod io;
pub mod output;
pub mod render;
pub mod runner;
pub mod telemetry;

use std::path::PathBuf;

use thiserror::Error;

// Re-export main types
pub use config::{EnvelopeConfig, FlightConfig, RunnerConfig};
pub use dynamics::{Direction, PathGenerator};
pub use envelope::{EnvelopeState, Flag, FlightEnvelope, Regime};
pub use io::TelemetryLogger;
pub use output::create_timestamped_output_dir;
pub use render::FlightRenderer;
pub use runner::{
    summarize_batch, MonteCarloSummary, PathType, RunFailure, RunOutcome, ScenarioResult,
    ScenarioRunner,
};
pub use telemetry::{TelemetryEngine, TelemetryFrame};

#[derive(Debug, Error)]
pub enum FlightError {
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("undefined coordinate: {0}")]
    Domain(String),
    #[error("unsupported path type: {0:?} (expected mean_revert, breakout or false_breakout)")]
    UnsupportedPathType(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("{}:{line}: malformed telemetry record: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

impl FlightError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn domain(msg: impl Into<String>) -> Self {
        Self::Domain(msg.into())
    }
}

pub type FlightResult<T> = Result<T, FlightError>;
