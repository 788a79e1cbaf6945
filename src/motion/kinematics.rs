// Differential-drive kinematics for a two-wheel base
//
// Converts (linear velocity, curvature) commands into left/right wheel targets
// and integrates the actual wheel velocities toward them under an
// acceleration limit.
//
// Convention: v_side = v_linear * (1 -/+ curvature * B / 2), so positive
// curvature turns left (right wheel faster).

use crate::config::require_positive;
use crate::error::ConfigError;

/// Convergence phase of the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Current wheel velocities still differ from their targets
    Converging,
    /// Current wheel velocities equal their targets
    Settled,
}

/// Left/right wheel linear velocities in m/s
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelSpeeds {
    pub left: f64,
    pub right: f64,
}

impl WheelSpeeds {
    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone)]
pub struct DiffDriveModel {
    wheel_base: f64,  // meters between wheel contact points
    wheel_accel: f64, // m/s^2 per wheel
    target: WheelSpeeds,
    current: WheelSpeeds,
}

impl DiffDriveModel {
    /// Create a model at rest. Rejects a non-positive wheel base or acceleration.
    pub fn new(wheel_base: f64, wheel_accel: f64) -> Result<Self, ConfigError> {
        Ok(Self {
            wheel_base: require_positive("wheel_base", wheel_base)?,
            wheel_accel: require_positive("wheel_accel", wheel_accel)?,
            target: WheelSpeeds::zero(),
            current: WheelSpeeds::zero(),
        })
    }

    /// Set wheel targets from a linear velocity (m/s) and curvature (1/m)
    pub fn cmd_curvature(&mut self, v_linear: f64, curvature: f64) {
        let half_span = curvature * self.wheel_base / 2.0;
        self.target = WheelSpeeds {
            left: v_linear * (1.0 - half_span),
            right: v_linear * (1.0 + half_span),
        };
    }

    /// Set wheel targets directly
    pub fn cmd_lr(&mut self, v_left: f64, v_right: f64) {
        self.target = WheelSpeeds::new(v_left, v_right);
    }

    /// Advance current wheel velocities toward the targets by at most
    /// `wheel_accel * dt` each. Non-positive (or NaN) `dt` is a no-op.
    pub fn step(&mut self, dt: f64) {
        if dt.is_nan() || dt <= 0.0 {
            return;
        }
        let max_delta = self.wheel_accel * dt;
        self.current.left = approach(self.current.left, self.target.left, max_delta);
        self.current.right = approach(self.current.right, self.target.right, max_delta);
    }

    /// Current left wheel velocity (m/s)
    pub fn vl(&self) -> f64 {
        self.current.left
    }

    /// Current right wheel velocity (m/s)
    pub fn vr(&self) -> f64 {
        self.current.right
    }

    pub fn current(&self) -> WheelSpeeds {
        self.current
    }

    pub fn target(&self) -> WheelSpeeds {
        self.target
    }

    /// Current body linear velocity (m/s)
    pub fn v_linear(&self) -> f64 {
        (self.current.left + self.current.right) / 2.0
    }

    /// Current body angular velocity (rad/s, positive = counter-clockwise)
    pub fn angular_velocity(&self) -> f64 {
        (self.current.right - self.current.left) / self.wheel_base
    }

    pub fn phase(&self) -> Phase {
        if self.current == self.target {
            Phase::Settled
        } else {
            Phase::Converging
        }
    }

    pub fn wheel_base(&self) -> f64 {
        self.wheel_base
    }

    pub fn wheel_accel(&self) -> f64 {
        self.wheel_accel
    }
}

/// Move `current` toward `target` by at most `max_delta`, landing exactly on
/// the target once it is within reach.
fn approach(current: f64, target: f64, max_delta: f64) -> f64 {
    let diff = target - current;
    if diff.abs() <= max_delta {
        target
    } else {
        current + max_delta.copysign(diff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn model() -> DiffDriveModel {
        DiffDriveModel::new(1.0, 1.0).unwrap()
    }

    fn settle(model: &mut DiffDriveModel) {
        for _ in 0..10_000 {
            if model.phase() == Phase::Settled {
                return;
            }
            model.step(0.01);
        }
        panic!("model did not settle");
    }

    #[test]
    fn test_rejects_invalid_geometry() {
        assert!(DiffDriveModel::new(0.0, 1.0).is_err());
        assert!(DiffDriveModel::new(-1.0, 1.0).is_err());
        assert!(DiffDriveModel::new(1.0, 0.0).is_err());
        assert!(DiffDriveModel::new(1.0, f64::NAN).is_err());
    }

    #[test]
    fn test_starts_settled_at_rest() {
        let model = model();
        assert_eq!(model.phase(), Phase::Settled);
        assert_eq!(model.vl(), 0.0);
        assert_eq!(model.vr(), 0.0);
    }

    #[test]
    fn test_zero_curvature_is_symmetric() {
        for v in [-1.5, -0.2, 0.0, 0.3, 2.0] {
            let mut model = model();
            model.cmd_curvature(v, 0.0);
            assert_eq!(model.target().left, model.target().right);
            settle(&mut model);
            assert_eq!(model.vl(), v);
            assert_eq!(model.vr(), v);
        }
    }

    #[test]
    fn test_curvature_targets() {
        let mut model = model();
        model.cmd_curvature(0.5, 1.0);
        assert!((model.target().left - 0.25).abs() < EPS);
        assert!((model.target().right - 0.75).abs() < EPS);

        // Negative curvature mirrors the split
        model.cmd_curvature(0.5, -1.0);
        assert!((model.target().left - 0.75).abs() < EPS);
        assert!((model.target().right - 0.25).abs() < EPS);
    }

    #[test]
    fn test_commands_overwrite() {
        let mut model = model();
        model.cmd_curvature(1.0, 0.5);
        model.cmd_curvature(0.2, 0.0);
        assert_eq!(model.target(), WheelSpeeds::new(0.2, 0.2));
    }

    #[test]
    fn test_step_respects_accel_bound() {
        let mut model = DiffDriveModel::new(0.5, 2.0).unwrap();
        model.cmd_lr(3.0, -3.0);
        for dt in [0.001, 0.01, 0.05, 0.1, 0.3] {
            let before = model.current();
            model.step(dt);
            let after = model.current();
            assert!((after.left - before.left).abs() <= 2.0 * dt + EPS);
            assert!((after.right - before.right).abs() <= 2.0 * dt + EPS);
        }
    }

    #[test]
    fn test_converges_exactly_without_overshoot() {
        let mut model = model();
        model.cmd_lr(0.55, -0.35);

        // 0.55 m/s at 1 m/s^2 needs 0.55 s; give it 0.6 s in 10 ms steps
        let mut prev = model.current();
        for _ in 0..60 {
            model.step(0.01);
            let now = model.current();
            assert!(now.left >= prev.left && now.left <= 0.55);
            assert!(now.right <= prev.right && now.right >= -0.35);
            prev = now;
        }
        assert_eq!(model.vl(), 0.55);
        assert_eq!(model.vr(), -0.35);
        assert_eq!(model.phase(), Phase::Settled);
    }

    #[test]
    fn test_phase_transitions() {
        let mut model = model();
        model.cmd_lr(0.1, 0.1);
        assert_eq!(model.phase(), Phase::Converging);
        model.step(0.05);
        assert_eq!(model.phase(), Phase::Converging);
        model.step(0.05);
        assert_eq!(model.phase(), Phase::Settled);

        model.cmd_lr(0.0, 0.0);
        assert_eq!(model.phase(), Phase::Converging);
    }

    #[test]
    fn test_non_positive_dt_is_noop() {
        let mut model = model();
        model.cmd_lr(1.0, 1.0);
        model.step(0.0);
        model.step(-0.5);
        model.step(f64::NAN);
        assert_eq!(model.current(), WheelSpeeds::zero());
    }

    #[test]
    fn test_body_velocities() {
        let mut model = model();
        model.cmd_curvature(0.5, 1.0);
        settle(&mut model);
        assert!((model.v_linear() - 0.5).abs() < EPS);
        // omega = v * curvature
        assert!((model.angular_velocity() - 0.5).abs() < EPS);
    }
}
