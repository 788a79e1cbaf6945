// Motion control for a two-wheel differential-drive base
//
// Provides:
// - Command watchdog
// - Differential-drive kinematics with acceleration-limited integration
// - Wheel setpoint translation (m/s -> rev/s)
// - The motion controller combining model and watchdog

mod controller;
pub mod kinematics;
pub mod setpoint;
pub mod watchdog;

pub use controller::MotionController;
pub use kinematics::{DiffDriveModel, Phase, WheelSpeeds};
pub use setpoint::{Direction, WheelSetpoint};
pub use watchdog::Watchdog;
