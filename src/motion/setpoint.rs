// Wheel setpoint translation: linear wheel speed (m/s) -> motor rate (rev/s)

use std::f64::consts::PI;

use crate::config::require_positive;
use crate::error::ConfigError;

/// Mounting direction of a wheel motor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Forward => 1.0,
            Direction::Reverse => -1.0,
        }
    }
}

impl TryFrom<i8> for Direction {
    type Error = ConfigError;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Direction::Forward),
            -1 => Ok(Direction::Reverse),
            other => Err(ConfigError::InvalidDirection(other)),
        }
    }
}

/// Per-wheel translator, fixed at configuration time
#[derive(Debug, Clone, Copy)]
pub struct WheelSetpoint {
    circumference: f64,
    direction: Direction,
}

impl WheelSetpoint {
    pub fn new(wheel_diameter: f64, direction: Direction) -> Result<Self, ConfigError> {
        let diameter = require_positive("wheel_diameter", wheel_diameter)?;
        Ok(Self {
            circumference: PI * diameter,
            direction,
        })
    }

    /// Angular rate in revolutions per second for a wheel linear velocity
    pub fn rps(&self, linear_velocity: f64) -> f64 {
        linear_velocity / self.circumference * self.direction.sign()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_from_sign() {
        assert_eq!(Direction::try_from(1).unwrap(), Direction::Forward);
        assert_eq!(Direction::try_from(-1).unwrap(), Direction::Reverse);
        assert!(Direction::try_from(0).is_err());
        assert!(Direction::try_from(2).is_err());
    }

    #[test]
    fn test_reverse_wheel_rate() {
        let wheel = WheelSetpoint::new(0.32, Direction::Reverse).unwrap();
        let rps = wheel.rps(1.0);
        assert!((rps + 0.994_718).abs() < 1e-5, "got {}", rps);
    }

    #[test]
    fn test_zero_velocity_is_zero_rate() {
        for direction in [Direction::Forward, Direction::Reverse] {
            let wheel = WheelSetpoint::new(0.32, direction).unwrap();
            assert_eq!(wheel.rps(0.0), 0.0);
        }
    }

    #[test]
    fn test_one_revolution_per_circumference() {
        let wheel = WheelSetpoint::new(0.5, Direction::Forward).unwrap();
        assert!((wheel.rps(PI * 0.5) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_bad_diameter() {
        assert!(WheelSetpoint::new(0.0, Direction::Forward).is_err());
        assert!(WheelSetpoint::new(-0.1, Direction::Forward).is_err());
    }
}
