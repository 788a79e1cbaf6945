// Motion control for a two-wheel differential-drive robot
//
// (v_linear, curvature) commands in over zenoh, per-wheel velocity setpoints
// out to the wheel drives, with a command watchdog that stops the robot when
// the command stream stalls.

pub mod config;
pub mod drive;
pub mod error;
pub mod ingress;
pub mod machine;
pub mod messages;
pub mod motion;
pub mod runtime;
