use serde::{Deserialize, Serialize};

use crate::envelope::{Flag, FlightEnvelope, Regime};
use crate::{FlightError, FlightResult};

/// One timestamped telemetry record. Field order is the wire order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    pub timestamp: u64,
    pub spot: f64,
    pub iv: f64,
    pub hv: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub regime: Regime,
    pub flags: Vec<Flag>,
}

impl TelemetryFrame {
    pub fn has_flag(&self, flag: Flag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn is_breached(&self) -> bool {
        self.has_flag(Flag::Breach)
    }
}

/// Computes per-step telemetry and derived flags.
#[derive(Debug, Clone)]
pub struct TelemetryEngine {
    envelope: FlightEnvelope,
}

impl TelemetryEngine {
    pub fn new(envelope: FlightEnvelope) -> Self {
        Self { envelope }
    }

    pub fn envelope(&self) -> &FlightEnvelope {
        &self.envelope
    }

    pub fn compute_step(
        &self,
        spot: f64,
        iv: f64,
        hv: f64,
        timestamp: u64,
    ) -> FlightResult<TelemetryFrame> {
        let state = self.envelope.evaluate_state(spot, iv, hv)?;
        let regime = FlightEnvelope::get_regime(state.x, state.y);

        Ok(TelemetryFrame {
            timestamp,
            spot,
            iv,
            hv,
            x: state.x,
            y: state.y,
            z: state.z,
            regime,
            flags: state.flags,
        })
    }

    /// Frames for aligned spot/iv/hv arrays, timestamped by index.
    pub fn compute_path(
        &self,
        spots: &[f64],
        ivs: &[f64],
        hvs: &[f64],
    ) -> FlightResult<Vec<TelemetryFrame>> {
        if ivs.len() != spots.len() || hvs.len() != spots.len() {
            return Err(FlightError::domain(format!(
                "path length mismatch: spot={} iv={} hv={}",
                spots.len(),
                ivs.len(),
                hvs.len()
            )));
        }

        spots
            .iter()
            .zip(ivs)
            .zip(hvs)
            .enumerate()
            .map(|(n, ((&spot, &iv), &hv))| self.compute_step(spot, iv, hv, n as u64))
            .collect()
    }
}
