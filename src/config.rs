use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};

use crate::{FlightError, FlightResult};

/// Structural levels of the option flight envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeConfig {
    /// Average true range, the unit of the airspeed axis
    pub atr: f64,
    /// Reference "at the money" level
    pub flip: f64,
    /// Support level below flip
    pub put_wall: f64,
    /// Resistance level above flip
    pub call_wall: f64,
    /// Neutral IV/HV ratio
    #[serde(default = "default_risk_proxy_base")]
    pub risk_proxy_base: f64,
}

fn default_risk_proxy_base() -> f64 {
    1.0
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            atr: 2.8,
            flip: 692.5,
            put_wall: 680.0,
            call_wall: 700.0,
            risk_proxy_base: default_risk_proxy_base(),
        }
    }
}

impl EnvelopeConfig {
    pub fn new(atr: f64, flip: f64, put_wall: f64, call_wall: f64) -> FlightResult<Self> {
        let config = Self {
            atr,
            flip,
            put_wall,
            call_wall,
            risk_proxy_base: default_risk_proxy_base(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_risk_proxy_base(mut self, risk_proxy_base: f64) -> FlightResult<Self> {
        self.risk_proxy_base = risk_proxy_base;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> FlightResult<()> {
        let levels = [self.atr, self.flip, self.put_wall, self.call_wall];
        if levels.iter().any(|v| !v.is_finite()) {
            return Err(FlightError::configuration(
                "atr, flip and walls must be finite",
            ));
        }
        if self.atr <= 0.0 {
            return Err(FlightError::configuration(format!(
                "atr must be > 0, got {}",
                self.atr
            )));
        }
        if !(self.put_wall < self.flip && self.flip < self.call_wall) {
            return Err(FlightError::configuration(format!(
                "walls must bracket flip: put_wall={} flip={} call_wall={}",
                self.put_wall, self.flip, self.call_wall
            )));
        }
        if !(self.risk_proxy_base.is_finite() && self.risk_proxy_base > 0.0) {
            return Err(FlightError::configuration(format!(
                "risk_proxy_base must be finite and > 0, got {}",
                self.risk_proxy_base
            )));
        }
        Ok(())
    }
}

/// Scenario and Monte Carlo settings for the runner.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    #[serde_as(as = "DefaultOnNull")]
    pub start_spot: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub start_iv: f64,
    /// IV level the volatility path drifts toward; `None` holds `start_iv`
    pub target_iv: Option<f64>,
    /// Step index of a one-off volatility shock
    pub shock_at: Option<usize>,
    /// Historical vol, held constant across a run
    #[serde_as(as = "DefaultOnNull")]
    pub hv: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub steps: usize,
    #[serde_as(as = "DefaultOnNull")]
    pub seed: u64,
    #[serde_as(as = "DefaultOnNull")]
    pub monte_carlo_runs: usize,
    /// Write one log per Monte Carlo run next to the scenario logs
    #[serde_as(as = "DefaultOnNull")]
    pub persist_monte_carlo_runs: bool,
    /// Where scenario logs go; nothing is written when unset. The binary
    /// treats it as the base of its timestamped run directory.
    pub output_dir: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            start_spot: 694.0,
            start_iv: 0.15,
            target_iv: None,
            shock_at: None,
            hv: 0.12,
            steps: 200,
            seed: 2026,
            monte_carlo_runs: 5,
            persist_monte_carlo_runs: false,
            output_dir: None,
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> FlightResult<()> {
        if !self.start_spot.is_finite() {
            return Err(FlightError::configuration("start_spot must be finite"));
        }
        if !(self.start_iv.is_finite() && self.start_iv > 0.0) {
            return Err(FlightError::configuration(format!(
                "start_iv must be finite and > 0, got {}",
                self.start_iv
            )));
        }
        if let Some(target) = self.target_iv {
            if !(target.is_finite() && target > 0.0) {
                return Err(FlightError::configuration(format!(
                    "target_iv must be finite and > 0, got {target}"
                )));
            }
        }
        if !(self.hv.is_finite() && self.hv > 0.0) {
            return Err(FlightError::configuration(format!(
                "hv must be finite and > 0, got {}",
                self.hv
            )));
        }
        if self.steps == 0 {
            return Err(FlightError::configuration("steps must be > 0"));
        }
        if let Some(shock_at) = self.shock_at {
            if shock_at >= self.steps {
                return Err(FlightError::configuration(format!(
                    "shock_at={shock_at} lies outside a {}-step path",
                    self.steps
                )));
            }
        }
        Ok(())
    }

    /// Scenarios must start strictly between the walls.
    pub fn validate_within(&self, envelope: &EnvelopeConfig) -> FlightResult<()> {
        if !(envelope.put_wall < self.start_spot && self.start_spot < envelope.call_wall) {
            return Err(FlightError::configuration(format!(
                "start_spot={} must lie strictly between put_wall={} and call_wall={}",
                self.start_spot, envelope.put_wall, envelope.call_wall
            )));
        }
        Ok(())
    }
}

/// On-disk configuration: envelope levels plus runner settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightConfig {
    pub envelope: EnvelopeConfig,
    pub runner: RunnerConfig,
}

impl FlightConfig {
    pub fn from_json_file(path: &Path) -> FlightResult<Self> {
        let raw = fs::read_to_string(path)?;
        let config: FlightConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> FlightResult<()> {
        self.envelope.validate()?;
        self.runner.validate()?;
        self.runner.validate_within(&self.envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        FlightConfig::default().validate().unwrap();
    }

    #[test]
    fn walls_must_bracket_flip() {
        assert!(matches!(
            EnvelopeConfig::new(2.8, 692.5, 695.0, 700.0),
            Err(FlightError::Configuration(_))
        ));
        assert!(matches!(
            EnvelopeConfig::new(2.8, 700.0, 680.0, 700.0),
            Err(FlightError::Configuration(_))
        ));
    }

    #[test]
    fn non_positive_atr_is_rejected_eagerly() {
        assert!(EnvelopeConfig::new(0.0, 692.5, 680.0, 700.0).is_err());
        assert!(EnvelopeConfig::new(-1.0, 692.5, 680.0, 700.0).is_err());
    }

    #[test]
    fn risk_proxy_base_must_be_positive() {
        let config = EnvelopeConfig::default();
        assert!(config.clone().with_risk_proxy_base(0.0).is_err());
        assert_eq!(
            config.with_risk_proxy_base(1.2).unwrap().risk_proxy_base,
            1.2
        );
    }

    #[test]
    fn null_runner_fields_fall_back_to_defaults() {
        let raw = r#"{
            "envelope": {"atr": 3.0, "flip": 500.0, "put_wall": 480.0, "call_wall": 520.0},
            "runner": {"start_spot": 505.0, "steps": null, "seed": 7, "hv": null}
        }"#;
        let config: FlightConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.runner.steps, RunnerConfig::default().steps);
        assert_eq!(config.runner.hv, RunnerConfig::default().hv);
        assert_eq!(config.runner.seed, 7);
        assert_eq!(config.envelope.risk_proxy_base, 1.0);
        config.validate().unwrap();
    }

    #[test]
    fn start_spot_must_sit_between_the_walls() {
        let envelope = EnvelopeConfig::default();
        for start_spot in [705.0, 700.0, 680.0, 650.0] {
            let config = FlightConfig {
                envelope: envelope.clone(),
                runner: RunnerConfig {
                    start_spot,
                    ..RunnerConfig::default()
                },
            };
            assert!(
                matches!(config.validate(), Err(FlightError::Configuration(_))),
                "start_spot {start_spot}"
            );
        }
        RunnerConfig::default().validate_within(&envelope).unwrap();
    }

    #[test]
    fn shock_must_fall_inside_the_path() {
        let config = RunnerConfig {
            steps: 10,
            shock_at: Some(10),
            ..RunnerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
