// Motion controller: the kinematic model plus the command watchdog
//
// This is the only mutable state shared by the control tasks. Commands and
// model ticks both go through it, so a command's target update and watchdog
// reset are always seen together by the next step.

use std::time::Duration;

use tracing::{info, warn};

use super::kinematics::{DiffDriveModel, WheelSpeeds};
use super::watchdog::Watchdog;
use crate::error::ConfigError;
use crate::messages::{MotionCommand, RuntimeHealth};

#[derive(Debug, Clone)]
pub struct MotionController {
    model: DiffDriveModel,
    watchdog: Watchdog,
    health: RuntimeHealth,
}

impl MotionController {
    pub fn new(wheel_base: f64, wheel_accel: f64, timeout: Duration) -> Result<Self, ConfigError> {
        Ok(Self {
            model: DiffDriveModel::new(wheel_base, wheel_accel)?,
            watchdog: Watchdog::new(timeout),
            health: RuntimeHealth::CmdStale, // Start stale until first cmd
        })
    }

    /// Apply a validated command: set the target and feed the watchdog
    pub fn apply_command(&mut self, cmd: MotionCommand) {
        self.model.cmd_curvature(cmd.v_linear, cmd.curvature);
        self.watchdog.reset();
        if self.health != RuntimeHealth::Ok {
            info!("Command stream live, resuming motion");
        }
        self.health = RuntimeHealth::Ok;
    }

    /// One model-update tick: watchdog check first, then integrate
    pub fn update(&mut self, dt: f64) {
        if self.watchdog.is_timed_out() {
            if self.health != RuntimeHealth::CmdStale {
                warn!(
                    "Command stale ({:?} old), stopping robot",
                    self.watchdog.elapsed()
                );
            }
            self.health = RuntimeHealth::CmdStale;
            self.model.cmd_lr(0.0, 0.0);
        }
        self.model.step(dt);
    }

    /// Target zero immediately, e.g. before shutting down
    pub fn halt(&mut self) {
        self.model.cmd_lr(0.0, 0.0);
    }

    /// Current wheel velocities to dispatch
    pub fn wheel_speeds(&self) -> WheelSpeeds {
        self.model.current()
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    pub fn model(&self) -> &DiffDriveModel {
        &self.model
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::Phase;
    use tokio::time::advance;

    const TIMEOUT: Duration = Duration::from_millis(200);

    fn controller() -> MotionController {
        MotionController::new(1.0, 1.0, TIMEOUT).unwrap()
    }

    fn cmd(v_linear: f64, curvature: f64) -> MotionCommand {
        MotionCommand {
            v_linear,
            curvature,
        }
    }

    /// Tick at 100 Hz for `ms` milliseconds of (paused) time
    async fn run_for(controller: &mut MotionController, ms: u64) {
        for _ in 0..ms / 10 {
            advance(Duration::from_millis(10)).await;
            controller.update(0.01);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_command_drives_wheels() {
        let mut controller = controller();
        controller.apply_command(cmd(0.5, 1.0));
        assert_eq!(controller.health(), RuntimeHealth::Ok);

        // Keep feeding so the watchdog stays quiet while settling
        for _ in 0..10 {
            run_for(&mut controller, 100).await;
            controller.apply_command(cmd(0.5, 1.0));
        }
        assert_eq!(controller.model().phase(), Phase::Settled);
        assert_eq!(controller.wheel_speeds(), WheelSpeeds::new(0.25, 0.75));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_forces_stop() {
        let mut controller = controller();
        controller.apply_command(cmd(0.2, 0.0));
        run_for(&mut controller, 150).await;
        assert!(controller.wheel_speeds().left > 0.0);

        // No more commands: after the timeout the target is forced to zero
        // and 0.2 m/s bleeds off at 1 m/s^2 within another 200 ms
        run_for(&mut controller, 500).await;
        assert_eq!(controller.health(), RuntimeHealth::CmdStale);
        assert_eq!(controller.model().target(), WheelSpeeds::zero());
        assert_eq!(controller.wheel_speeds(), WheelSpeeds::zero());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_recoverable() {
        let mut controller = controller();
        run_for(&mut controller, 300).await;
        assert_eq!(controller.health(), RuntimeHealth::CmdStale);

        controller.apply_command(cmd(0.1, 0.0));
        run_for(&mut controller, 150).await;
        assert_eq!(controller.health(), RuntimeHealth::Ok);
        assert_eq!(controller.wheel_speeds(), WheelSpeeds::new(0.1, 0.1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_halt_targets_zero() {
        let mut controller = controller();
        controller.apply_command(cmd(1.0, 0.0));
        controller.halt();
        assert_eq!(controller.model().target(), WheelSpeeds::zero());
    }
}
