// Machine geometry, timing, topics and drive configuration
//
// Every value can be overridden by a CLI flag or a MACHINE_* environment
// variable. Values are immutable once the machine is built.

use std::time::Duration;

use clap::Args;

use crate::error::ConfigError;
use crate::motion::Direction;

// Geometry
pub const WHEEL_BASE: f64 = 1.0; // meters
pub const WHEEL_DIAMETER: f64 = 0.32; // meters
pub const WHEEL_ACCEL: f64 = 1.0; // m/s^2
pub const WHEEL_DIRS: (i8, i8) = (1, -1); // left, right

// Command timeout for watchdog
pub const CMD_TIMEOUT_MS: u64 = 500;

// Loop frequencies
pub const MODEL_HZ: u32 = 100;
pub const SETPOINT_HZ: u32 = 10;
pub const HEARTBEAT_HZ: u32 = 1;
pub const HEALTH_HZ: u32 = 1;
pub const MAX_LOOP_HZ: u32 = 10_000; // upper bound for every loop frequency

// Zenoh topics
pub const TOPIC_CMD_VC: &str = "machine/cmd/vc"; // velocity + curvature commands
pub const TOPIC_HEARTBEAT: &str = "machine/state/heartbeat"; // liveness

// Drive configuration
pub const DRIVE_PORT: &str = "/dev/ttyACM0";
pub const WHEEL_AXES: (u8, u8) = (0, 1); // left, right

#[derive(Debug, Clone, Args)]
pub struct MachineConfig {
    /// Wheel base in meters
    #[arg(long, env = "MACHINE_WHEEL_BASE", default_value_t = WHEEL_BASE)]
    pub wheel_base: f64,

    /// Wheel diameter in meters
    #[arg(long, env = "MACHINE_WHEEL_DIAMETER", default_value_t = WHEEL_DIAMETER)]
    pub wheel_diameter: f64,

    /// Per-wheel acceleration limit in m/s^2
    #[arg(long, env = "MACHINE_WHEEL_ACCEL", default_value_t = WHEEL_ACCEL)]
    pub wheel_accel: f64,

    /// Left wheel direction (1 or -1)
    #[arg(long, env = "MACHINE_LEFT_DIR", default_value_t = WHEEL_DIRS.0, allow_negative_numbers = true)]
    pub left_dir: i8,

    /// Right wheel direction (1 or -1)
    #[arg(long, env = "MACHINE_RIGHT_DIR", default_value_t = WHEEL_DIRS.1, allow_negative_numbers = true)]
    pub right_dir: i8,

    /// Stop the robot when no command arrives within this many milliseconds
    #[arg(long, env = "MACHINE_CMD_TIMEOUT_MS", default_value_t = CMD_TIMEOUT_MS)]
    pub cmd_timeout_ms: u64,

    #[arg(long, env = "MACHINE_MODEL_HZ", default_value_t = MODEL_HZ)]
    pub model_hz: u32,

    #[arg(long, env = "MACHINE_SETPOINT_HZ", default_value_t = SETPOINT_HZ)]
    pub setpoint_hz: u32,

    #[arg(long, env = "MACHINE_HEARTBEAT_HZ", default_value_t = HEARTBEAT_HZ)]
    pub heartbeat_hz: u32,

    #[arg(long, env = "MACHINE_HEALTH_HZ", default_value_t = HEALTH_HZ)]
    pub health_hz: u32,

    /// Serial port of the ODrive board driving both wheels
    #[arg(long, env = "MACHINE_DRIVE_PORT", default_value = DRIVE_PORT)]
    pub drive_port: String,

    #[arg(long, env = "MACHINE_LEFT_AXIS", default_value_t = WHEEL_AXES.0)]
    pub left_axis: u8,

    #[arg(long, env = "MACHINE_RIGHT_AXIS", default_value_t = WHEEL_AXES.1)]
    pub right_axis: u8,

    /// Use in-process mock drives instead of hardware (always on in CI)
    #[arg(long, env = "MACHINE_MOCK_DRIVES")]
    pub mock_drives: bool,

    #[arg(long, env = "MACHINE_TOPIC_CMD", default_value = TOPIC_CMD_VC)]
    pub topic_cmd: String,

    #[arg(long, env = "MACHINE_TOPIC_HEARTBEAT", default_value = TOPIC_HEARTBEAT)]
    pub topic_heartbeat: String,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            wheel_base: WHEEL_BASE,
            wheel_diameter: WHEEL_DIAMETER,
            wheel_accel: WHEEL_ACCEL,
            left_dir: WHEEL_DIRS.0,
            right_dir: WHEEL_DIRS.1,
            cmd_timeout_ms: CMD_TIMEOUT_MS,
            model_hz: MODEL_HZ,
            setpoint_hz: SETPOINT_HZ,
            heartbeat_hz: HEARTBEAT_HZ,
            health_hz: HEALTH_HZ,
            drive_port: DRIVE_PORT.to_string(),
            left_axis: WHEEL_AXES.0,
            right_axis: WHEEL_AXES.1,
            mock_drives: false,
            topic_cmd: TOPIC_CMD_VC.to_string(),
            topic_heartbeat: TOPIC_HEARTBEAT.to_string(),
        }
    }
}

impl MachineConfig {
    /// Check every invariant the kinematics and scheduler rely on
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("wheel_base", self.wheel_base)?;
        require_positive("wheel_diameter", self.wheel_diameter)?;
        require_positive("wheel_accel", self.wheel_accel)?;
        self.directions()?;
        if self.cmd_timeout_ms == 0 {
            return Err(ConfigError::NonPositive {
                name: "cmd_timeout_ms",
                value: 0.0,
            });
        }
        for (name, hz) in [
            ("model", self.model_hz),
            ("setpoint", self.setpoint_hz),
            ("heartbeat", self.heartbeat_hz),
            ("health", self.health_hz),
        ] {
            if hz == 0 {
                return Err(ConfigError::ZeroFrequency { name });
            }
            if hz > MAX_LOOP_HZ {
                return Err(ConfigError::FrequencyTooHigh {
                    name,
                    hz,
                    max: MAX_LOOP_HZ,
                });
            }
        }
        Ok(())
    }

    /// Left and right wheel directions
    pub fn directions(&self) -> Result<(Direction, Direction), ConfigError> {
        Ok((
            Direction::try_from(self.left_dir)?,
            Direction::try_from(self.right_dir)?,
        ))
    }

    pub fn cmd_timeout(&self) -> Duration {
        Duration::from_millis(self.cmd_timeout_ms)
    }

    pub fn use_mock_drives(&self) -> bool {
        self.mock_drives || running_in_ci()
    }
}

/// Tick period for a frequency in Hz (callers validate `0 < hz <= MAX_LOOP_HZ`)
pub fn period(hz: u32) -> Duration {
    Duration::from_nanos(1_000_000_000 / u64::from(hz.max(1)))
}

pub(crate) fn require_positive(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::NonPositive { name, value })
    }
}

fn running_in_ci() -> bool {
    std::env::var("CI").is_ok_and(|v| v.eq_ignore_ascii_case("true"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MachineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.directions().unwrap(),
            (Direction::Forward, Direction::Reverse)
        );
        assert_eq!(config.cmd_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_rejects_bad_geometry() {
        let config = MachineConfig {
            wheel_diameter: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositive {
                name: "wheel_diameter",
                ..
            })
        ));

        let config = MachineConfig {
            wheel_accel: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_direction_and_timing() {
        let config = MachineConfig {
            right_dir: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDirection(0))
        ));

        let config = MachineConfig {
            setpoint_hz: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroFrequency { name: "setpoint" })
        ));

        let config = MachineConfig {
            cmd_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_frequency_with_zero_period() {
        let config = MachineConfig {
            model_hz: 2_000_000_000,
            ..Default::default()
        };
        assert_eq!(period(config.model_hz), Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::FrequencyTooHigh {
                name: "model",
                hz: 2_000_000_000,
                ..
            })
        ));

        let config = MachineConfig {
            health_hz: MAX_LOOP_HZ + 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = MachineConfig {
            heartbeat_hz: MAX_LOOP_HZ,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(period(MAX_LOOP_HZ), Duration::from_micros(100));
    }

    #[test]
    fn test_period() {
        assert_eq!(period(100), Duration::from_millis(10));
        assert_eq!(period(1), Duration::from_secs(1));
    }
}
