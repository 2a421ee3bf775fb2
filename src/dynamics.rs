//! Synthetic spot and volatility paths
//!
//! Every generator draws from an injected random source, so a seed fully
//! determines the path. Gaussian perturbations are clamped to
//! `±NOISE_CLAMP_SIGMAS` standard deviations, which keeps every path bounded
//! for in-range parameters.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::{FlightError, FlightResult};

pub const NOISE_CLAMP_SIGMAS: f64 = 3.0;
/// Noise (in ATR) while a false breakout runs at the wall.
pub const BREACH_NOISE_ATR: f64 = 0.1;
/// Noise (in ATR) while a false breakout snaps back.
pub const RECOVERY_NOISE_ATR: f64 = 0.2;
pub const VOL_REVERSION: f64 = 0.05;
/// Vol noise as a fraction of the starting IV.
pub const VOL_NOISE_FRACTION: f64 = 0.05;
pub const VOL_SHOCK_MULTIPLIER: f64 = 1.5;
pub const VOL_FLOOR: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Up => 1.0,
            Direction::Down => -1.0,
        }
    }
}

/// Generates synthetic price and volatility paths for scenarios.
#[derive(Debug, Clone)]
pub struct PathGenerator<R = ChaCha8Rng> {
    start_spot: f64,
    atr: f64,
    steps: usize,
    rng: R,
}

impl PathGenerator<ChaCha8Rng> {
    pub fn seeded(start_spot: f64, atr: f64, steps: usize, seed: u64) -> FlightResult<Self> {
        Self::with_rng(start_spot, atr, steps, ChaCha8Rng::seed_from_u64(seed))
    }

    /// Seeded generator on an independent ChaCha stream; distinct streams of
    /// one seed never overlap.
    pub fn seeded_stream(
        start_spot: f64,
        atr: f64,
        steps: usize,
        seed: u64,
        stream: u64,
    ) -> FlightResult<Self> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(stream);
        Self::with_rng(start_spot, atr, steps, rng)
    }
}

impl<R: Rng> PathGenerator<R> {
    pub fn with_rng(start_spot: f64, atr: f64, steps: usize, rng: R) -> FlightResult<Self> {
        if !start_spot.is_finite() {
            return Err(FlightError::configuration("start_spot must be finite"));
        }
        if !(atr.is_finite() && atr > 0.0) {
            return Err(FlightError::configuration(format!(
                "path scale atr must be finite and > 0, got {atr}"
            )));
        }
        if steps == 0 {
            return Err(FlightError::configuration("steps must be > 0"));
        }
        Ok(Self {
            start_spot,
            atr,
            steps,
            rng,
        })
    }

    pub fn start_spot(&self) -> f64 {
        self.start_spot
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Pin around a target (like flip). `intensity` outside `(0, 1]` is
    /// rejected rather than clamped.
    pub fn mean_revert_pin(
        &mut self,
        target: f64,
        intensity: f64,
        noise: f64,
    ) -> FlightResult<Vec<f64>> {
        require_finite("target", target)?;
        require_unit_rate("intensity", intensity)?;
        require_non_negative("noise", noise)?;

        let mut path = Vec::with_capacity(self.steps);
        let mut spot = self.start_spot;
        path.push(spot);
        for _ in 1..self.steps {
            spot += (target - spot) * intensity + self.perturb(self.atr * noise);
            path.push(spot);
        }
        Ok(path)
    }

    /// Breakout with follow-through: `speed` ATR per step in `direction`.
    pub fn breakout(
        &mut self,
        direction: Direction,
        speed: f64,
        noise: f64,
    ) -> FlightResult<Vec<f64>> {
        require_non_negative("speed", speed)?;
        require_non_negative("noise", noise)?;

        let drift = direction.sign() * self.atr * speed;
        let mut path = Vec::with_capacity(self.steps);
        let mut spot = self.start_spot;
        path.push(spot);
        for _ in 1..self.steps {
            spot += drift + self.perturb(self.atr * noise);
            path.push(spot);
        }
        Ok(path)
    }

    /// Breach a wall and then snap back.
    ///
    /// Indices `0..=b`, `b = ceil(steps / 3)`, trend linearly from the start to
    /// `breach_depth` ATR beyond `target_wall`, landing on that level exactly at
    /// `b`; the remaining indices revert to the start at rate `recovery`.
    pub fn false_breakout(
        &mut self,
        target_wall: f64,
        breach_depth: f64,
        recovery: f64,
    ) -> FlightResult<Vec<f64>> {
        require_finite("target_wall", target_wall)?;
        require_unit_rate("recovery", recovery)?;
        if !(breach_depth.is_finite() && breach_depth > 0.0) {
            return Err(FlightError::configuration(format!(
                "breach_depth must be finite and > 0, got {breach_depth}"
            )));
        }
        if target_wall == self.start_spot {
            return Err(FlightError::configuration(
                "target_wall coincides with the starting spot",
            ));
        }
        if self.steps < 3 {
            return Err(FlightError::configuration(format!(
                "false_breakout needs at least 3 steps, got {}",
                self.steps
            )));
        }

        let start = self.start_spot;
        let peak = breach_peak_index(self.steps);
        let overshoot =
            target_wall + (target_wall - start).signum() * breach_depth * self.atr;

        let mut path = Vec::with_capacity(self.steps);
        path.push(start);
        for i in 1..peak {
            let trend = start + (overshoot - start) * i as f64 / peak as f64;
            path.push(trend + self.perturb(self.atr * BREACH_NOISE_ATR));
        }
        // The peak carries no noise, so the wall is crossed for any depth > 0.
        path.push(overshoot);

        let mut spot = path[peak];
        for _ in (peak + 1)..self.steps {
            spot += (start - spot) * recovery + self.perturb(self.atr * RECOVERY_NOISE_ATR);
            path.push(spot);
        }
        Ok(path)
    }

    /// Generates an IV path, potentially with a shock at index `shock_at`.
    pub fn generate_vol_path(
        &mut self,
        start_iv: f64,
        target_iv: Option<f64>,
        shock_at: Option<usize>,
    ) -> FlightResult<Vec<f64>> {
        if !(start_iv.is_finite() && start_iv > 0.0) {
            return Err(FlightError::configuration(format!(
                "start_iv must be finite and > 0, got {start_iv}"
            )));
        }
        let target = target_iv.unwrap_or(start_iv);
        if !(target.is_finite() && target > 0.0) {
            return Err(FlightError::configuration(format!(
                "target_iv must be finite and > 0, got {target}"
            )));
        }
        if let Some(k) = shock_at {
            if k >= self.steps {
                return Err(FlightError::configuration(format!(
                    "shock_at={k} lies outside a {}-step path",
                    self.steps
                )));
            }
        }

        let mut path = Vec::with_capacity(self.steps);
        let mut iv = start_iv;
        if shock_at == Some(0) {
            iv *= VOL_SHOCK_MULTIPLIER;
        }
        path.push(iv);
        for i in 1..self.steps {
            iv += (target - iv) * VOL_REVERSION + self.perturb(start_iv * VOL_NOISE_FRACTION);
            iv = iv.max(VOL_FLOOR);
            if shock_at == Some(i) {
                iv *= VOL_SHOCK_MULTIPLIER;
            }
            path.push(iv);
        }
        Ok(path)
    }

    fn perturb(&mut self, sigma: f64) -> f64 {
        let z: f64 = self.rng.sample(StandardNormal);
        sigma * z.clamp(-NOISE_CLAMP_SIGMAS, NOISE_CLAMP_SIGMAS)
    }
}

/// Last index of the breach phase of a false breakout.
pub fn breach_peak_index(steps: usize) -> usize {
    steps.div_ceil(3)
}

fn require_finite(name: &str, value: f64) -> FlightResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(FlightError::configuration(format!(
            "{name} must be finite, got {value}"
        )))
    }
}

fn require_non_negative(name: &str, value: f64) -> FlightResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(FlightError::configuration(format!(
            "{name} must be finite and >= 0, got {value}"
        )))
    }
}

fn require_unit_rate(name: &str, value: f64) -> FlightResult<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(FlightError::configuration(format!(
            "{name} must lie in (0, 1], got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;

    use super::*;

    const ATR: f64 = 2.8;

    fn generator(seed: u64) -> PathGenerator {
        PathGenerator::seeded(694.0, ATR, 200, seed).unwrap()
    }

    #[test]
    fn same_seed_reproduces_bit_for_bit() {
        let a = generator(11).mean_revert_pin(692.5, 0.1, 0.2).unwrap();
        let b = generator(11).mean_revert_pin(692.5, 0.1, 0.2).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_diverge() {
        let a = generator(11).breakout(Direction::Up, 0.5, 0.1).unwrap();
        let b = generator(12).breakout(Direction::Up, 0.5, 0.1).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn streams_of_one_seed_diverge() {
        let mut a = PathGenerator::seeded_stream(694.0, ATR, 50, 3, 1).unwrap();
        let mut b = PathGenerator::seeded_stream(694.0, ATR, 50, 3, 2).unwrap();
        assert_ne!(
            a.breakout(Direction::Up, 0.5, 0.1).unwrap(),
            b.breakout(Direction::Up, 0.5, 0.1).unwrap()
        );
    }

    #[test]
    fn paths_have_requested_length_and_start() {
        let mut gen = generator(5);
        for path in [
            gen.mean_revert_pin(692.5, 0.1, 0.2).unwrap(),
            gen.breakout(Direction::Down, 0.5, 0.1).unwrap(),
            gen.false_breakout(700.0, 1.5, 0.8).unwrap(),
        ] {
            assert_eq!(path.len(), 200);
            assert_eq!(path[0], 694.0);
        }
        assert_eq!(gen.generate_vol_path(0.15, None, None).unwrap().len(), 200);
    }

    #[test]
    fn mean_revert_stays_bounded_around_target() {
        let path = generator(9).mean_revert_pin(692.5, 0.1, 0.2).unwrap();
        // |dev| <= max(|dev0|, 3 * sigma / intensity) by the noise clamp.
        let bound = (694.0_f64 - 692.5).abs().max(3.0 * ATR * 0.2 / 0.1);
        assert!(path.iter().all(|s| (s - 692.5).abs() <= bound + 1e-9));
    }

    #[test]
    fn intensity_outside_unit_interval_is_rejected() {
        let mut gen = generator(1);
        assert!(gen.mean_revert_pin(692.5, 0.0, 0.2).is_err());
        assert!(gen.mean_revert_pin(692.5, 1.5, 0.2).is_err());
        assert!(gen.mean_revert_pin(692.5, 1.0, 0.2).is_ok());
    }

    #[test]
    fn noiseless_breakout_is_a_straight_line() {
        let path = generator(2).breakout(Direction::Down, 0.5, 0.0).unwrap();
        for (i, spot) in path.iter().enumerate() {
            assert_abs_diff_eq!(*spot, 694.0 - i as f64 * ATR * 0.5, epsilon = 1e-9);
        }
    }

    #[test]
    fn false_breakout_crosses_wall_then_returns() {
        let wall = 700.0;
        let recovery = 0.8;
        let path = generator(21).false_breakout(wall, 1.5, recovery).unwrap();
        let peak = breach_peak_index(path.len());

        assert!(path[..=peak].iter().any(|&s| s > wall));
        let noise_bound = NOISE_CLAMP_SIGMAS * RECOVERY_NOISE_ATR * ATR / recovery;
        let last = *path.last().unwrap();
        assert!((last - 694.0).abs() <= noise_bound + 1e-6);
    }

    #[test]
    fn shallow_false_breakout_still_crosses_for_every_seed() {
        let wall = 700.0;
        let depth = 0.1;
        for seed in 0..200 {
            let path = generator(seed).false_breakout(wall, depth, 0.8).unwrap();
            let peak = breach_peak_index(path.len());
            assert_abs_diff_eq!(path[peak], wall + depth * ATR, epsilon = 1e-9);
            assert!(path[peak] > wall, "seed {seed}");
        }
    }

    #[test]
    fn false_breakout_works_toward_the_put_wall() {
        let path = generator(4).false_breakout(680.0, 1.0, 0.5).unwrap();
        let peak = breach_peak_index(path.len());
        assert!(path[peak] < 680.0);
    }

    #[test]
    fn false_breakout_split_is_one_third() {
        assert_eq!(breach_peak_index(3), 1);
        assert_eq!(breach_peak_index(200), 67);
        assert!(generator(1).false_breakout(694.0, 1.5, 0.8).is_err());
        assert!(PathGenerator::seeded(694.0, ATR, 2, 1)
            .unwrap()
            .false_breakout(700.0, 1.5, 0.8)
            .is_err());
    }

    #[test]
    fn vol_shock_scales_only_from_the_shock_index() {
        let calm = generator(8).generate_vol_path(0.15, Some(0.2), None).unwrap();
        let shocked = generator(8)
            .generate_vol_path(0.15, Some(0.2), Some(40))
            .unwrap();
        assert_eq!(calm[..40], shocked[..40]);
        assert_eq!(shocked[40], calm[40] * VOL_SHOCK_MULTIPLIER);
        assert!(shocked.iter().all(|&iv| iv >= VOL_FLOOR));
    }

    #[test]
    fn vol_shock_outside_path_is_rejected() {
        assert!(generator(8).generate_vol_path(0.15, None, Some(200)).is_err());
    }

    #[test]
    fn any_rng_can_drive_the_generator() {
        let rng = <StdRng as SeedableRng>::seed_from_u64(77);
        let mut gen = PathGenerator::with_rng(694.0, ATR, 16, rng).unwrap();
        assert_eq!(gen.breakout(Direction::Up, 0.5, 0.1).unwrap().len(), 16);
    }
}
