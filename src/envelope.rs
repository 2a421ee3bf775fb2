//! Flight envelope geometry
//!
//! Coordinates:
//! X = structural airspeed = |spot - flip| / ATR
//! Y = load factor = IV / HV
//! Z = wall proximity, 0 at the nearer wall and 1 at flip

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::EnvelopeConfig;
use crate::{FlightError, FlightResult};

/// Regime and flag boundaries. Recalibration happens here only.
pub mod thresholds {
    /// X above which the state is RUPTURE and flagged OVERSPEED.
    pub const RUPTURE_X: f64 = 4.5;
    /// Y above which the state is RUPTURE.
    pub const RUPTURE_Y: f64 = 2.5;
    /// X at or above which the state is at least MANEUVER.
    pub const MANEUVER_X: f64 = 2.5;
    /// Y at or above which the state is at least MANEUVER.
    pub const MANEUVER_Y: f64 = 1.5;
    /// X at or above which a non-maneuvering state is CRUISE instead of TAXI.
    pub const CRUISE_X: f64 = 0.3;
    /// X below which the state may STALL.
    pub const STALL_X: f64 = 0.05;
    /// Y below which the state may STALL.
    pub const STALL_Y: f64 = 0.5;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regime {
    Taxi,
    Cruise,
    Maneuver,
    Rupture,
}

impl Regime {
    pub const ALL: [Regime; 4] = [
        Regime::Taxi,
        Regime::Cruise,
        Regime::Maneuver,
        Regime::Rupture,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Regime::Taxi => "TAXI",
            Regime::Cruise => "CRUISE",
            Regime::Maneuver => "MANEUVER",
            Regime::Rupture => "RUPTURE",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition flags, independent of the regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Flag {
    Breach,
    Overspeed,
    Stall,
}

impl Flag {
    pub fn as_str(self) -> &'static str {
        match self {
            Flag::Breach => "BREACH",
            Flag::Overspeed => "OVERSPEED",
            Flag::Stall => "STALL",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coordinates and flags for one market state.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeState {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Always ordered BREACH, OVERSPEED, STALL.
    pub flags: Vec<Flag>,
}

impl EnvelopeState {
    pub fn has_flag(&self, flag: Flag) -> bool {
        self.flags.contains(&flag)
    }
}

/// Geometry and boundary evaluation for the option flight envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightEnvelope {
    config: EnvelopeConfig,
}

impl FlightEnvelope {
    pub fn new(config: EnvelopeConfig) -> FlightResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EnvelopeConfig {
        &self.config
    }

    pub fn evaluate_state(&self, spot: f64, iv: f64, hv: f64) -> FlightResult<EnvelopeState> {
        if !(spot.is_finite() && iv.is_finite() && hv.is_finite()) {
            return Err(FlightError::domain(format!(
                "non-finite market state (spot={spot}, iv={iv}, hv={hv})"
            )));
        }
        let cfg = &self.config;
        if cfg.atr <= 0.0 {
            return Err(FlightError::domain(format!(
                "airspeed undefined for atr={}",
                cfg.atr
            )));
        }
        if hv <= 0.0 {
            return Err(FlightError::domain(format!(
                "load factor undefined for hv={hv}"
            )));
        }
        if iv <= 0.0 {
            return Err(FlightError::domain(format!(
                "implied vol must be > 0, got {iv}"
            )));
        }

        let x = (spot - cfg.flip).abs() / cfg.atr;
        let y = iv / hv;

        let (wall, breached) = if spot < cfg.flip {
            (cfg.put_wall, spot < cfg.put_wall)
        } else {
            (cfg.call_wall, spot > cfg.call_wall)
        };
        let span = (cfg.flip - wall).abs();
        if span == 0.0 {
            return Err(FlightError::domain(format!(
                "wall at {wall} coincides with flip"
            )));
        }
        // Not clamped: past the wall z grows again and BREACH carries the sign.
        let z = (spot - wall).abs() / span;

        let mut flags = Vec::new();
        if breached {
            flags.push(Flag::Breach);
        }
        if x > thresholds::RUPTURE_X {
            flags.push(Flag::Overspeed);
        }
        if x < thresholds::STALL_X && y < thresholds::STALL_Y {
            flags.push(Flag::Stall);
        }

        Ok(EnvelopeState { x, y, z, flags })
    }

    /// Classifies the flight regime. Checked most severe first, so boundaries
    /// belong to the stricter regime.
    pub fn get_regime(x: f64, y: f64) -> Regime {
        use thresholds::*;

        if x > RUPTURE_X || y > RUPTURE_Y {
            Regime::Rupture
        } else if x >= MANEUVER_X || y >= MANEUVER_Y {
            Regime::Maneuver
        } else if x >= CRUISE_X {
            Regime::Cruise
        } else {
            Regime::Taxi
        }
    }

    /// Load factor relative to the neutral IV/HV ratio of the configuration.
    pub fn relative_load(&self, y: f64) -> f64 {
        y / self.config.risk_proxy_base
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn envelope() -> FlightEnvelope {
        FlightEnvelope::new(EnvelopeConfig::new(2.8, 692.5, 680.0, 700.0).unwrap()).unwrap()
    }

    #[test]
    fn documented_example_cruises() {
        let state = envelope().evaluate_state(694.0, 0.15, 0.12).unwrap();
        assert_abs_diff_eq!(state.x, 1.5 / 2.8, epsilon = 1e-12);
        assert_abs_diff_eq!(state.y, 1.25, epsilon = 1e-12);
        assert_abs_diff_eq!(state.z, 6.0 / 7.5, epsilon = 1e-12);
        assert!(state.flags.is_empty());
        assert_eq!(FlightEnvelope::get_regime(state.x, state.y), Regime::Cruise);
    }

    #[test]
    fn boundaries_belong_to_the_stricter_regime() {
        assert_eq!(FlightEnvelope::get_regime(2.5, 0.0), Regime::Maneuver);
        assert_eq!(FlightEnvelope::get_regime(0.3, 0.0), Regime::Cruise);
        assert_eq!(FlightEnvelope::get_regime(0.29, 0.0), Regime::Taxi);
        assert_eq!(FlightEnvelope::get_regime(0.0, 1.5), Regime::Maneuver);
        assert_eq!(FlightEnvelope::get_regime(4.5, 0.0), Regime::Maneuver);
        assert_eq!(FlightEnvelope::get_regime(4.51, 0.0), Regime::Rupture);
        assert_eq!(FlightEnvelope::get_regime(0.0, 2.5), Regime::Maneuver);
        assert_eq!(FlightEnvelope::get_regime(0.0, 2.51), Regime::Rupture);
    }

    #[test]
    fn put_side_breach_is_flagged_without_clamping() {
        let state = envelope().evaluate_state(677.5, 0.15, 0.12).unwrap();
        assert_eq!(state.flags, vec![Flag::Breach]);
        assert_abs_diff_eq!(state.z, 2.5 / 12.5, epsilon = 1e-12);
    }

    #[test]
    fn wall_itself_is_not_a_breach() {
        let state = envelope().evaluate_state(700.0, 0.15, 0.12).unwrap();
        assert!(!state.has_flag(Flag::Breach));
        assert_abs_diff_eq!(state.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn flip_sits_at_full_proximity_and_can_stall() {
        let state = envelope().evaluate_state(692.5, 0.05, 0.12).unwrap();
        assert_abs_diff_eq!(state.z, 1.0, epsilon = 1e-12);
        assert_eq!(state.flags, vec![Flag::Stall]);
    }

    #[test]
    fn overspeed_tracks_rupture_airspeed() {
        let state = envelope().evaluate_state(692.5 + 2.8 * 5.0, 0.12, 0.12).unwrap();
        assert_eq!(state.flags, vec![Flag::Breach, Flag::Overspeed]);
        assert_eq!(FlightEnvelope::get_regime(state.x, state.y), Regime::Rupture);
    }

    #[test]
    fn zero_hv_is_a_domain_error() {
        let err = envelope().evaluate_state(694.0, 0.15, 0.0).unwrap_err();
        assert!(matches!(err, FlightError::Domain(_)));
    }

    #[test]
    fn non_positive_iv_is_a_domain_error() {
        for iv in [0.0, -0.1] {
            let err = envelope().evaluate_state(694.0, iv, 0.12).unwrap_err();
            assert!(matches!(err, FlightError::Domain(_)), "iv {iv}");
        }
    }

    #[test]
    fn zero_atr_never_yields_infinity() {
        let config = EnvelopeConfig {
            atr: 0.0,
            ..EnvelopeConfig::default()
        };
        assert!(matches!(
            FlightEnvelope::new(config.clone()),
            Err(FlightError::Configuration(_))
        ));

        let unchecked = FlightEnvelope { config };
        assert!(matches!(
            unchecked.evaluate_state(694.0, 0.15, 0.12),
            Err(FlightError::Domain(_))
        ));
    }

    #[test]
    fn relative_load_scales_by_risk_proxy() {
        let config = EnvelopeConfig {
            risk_proxy_base: 1.25,
            ..EnvelopeConfig::default()
        };
        let envelope = FlightEnvelope::new(config).unwrap();
        assert_abs_diff_eq!(envelope.relative_load(1.25), 1.0, epsilon = 1e-12);
    }
}
