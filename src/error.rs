// Error types for the machine

use crate::drive::DriveError;

/// Configuration invariant violations, fatal at construction
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be positive and finite, got {value}")]
    NonPositive { name: &'static str, value: f64 },

    #[error("Wheel direction must be 1 or -1, got {0}")]
    InvalidDirection(i8),

    #[error("{name} frequency must be non-zero")]
    ZeroFrequency { name: &'static str },

    #[error("{name} frequency {hz} Hz exceeds the {max} Hz limit")]
    FrequencyTooHigh {
        name: &'static str,
        hz: u32,
        max: u32,
    },
}

/// Errors that stop the control loop
#[derive(Debug, thiserror::Error)]
pub enum MachineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Drive error: {0}")]
    Drive(#[from] DriveError),

    #[error("{wheel} drive reported a fault")]
    DriveFault { wheel: &'static str },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Control task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
