// Wheel drive interface for the differential-drive base
//
// Provides:
// - The per-wheel drive trait the control loop talks to
// - ODrive ASCII serial protocol implementation
// - In-process mock drives for testing and CI
// - A left/right wheel pair with best-effort stop on drop

mod mock;
pub mod odrive;
mod pair;

pub use mock::MockDrive;
pub use odrive::{OdriveAxis, OdriveBus};
pub use pair::WheelPair;

/// Error types for drive communication
#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response from axis {axis}: {reason}")]
    InvalidResponse { axis: u8, reason: String },

    #[error("Checksum mismatch in response from axis {axis}")]
    ChecksumMismatch { axis: u8 },

    #[error("Axis {axis} reported error 0x{code:08X}")]
    AxisError { axis: u8, code: u32 },

    #[error("Timeout waiting for axis {axis}")]
    Timeout { axis: u8 },

    #[error("Drive bus lock poisoned")]
    BusPoisoned,

    #[error("{name} drive fault")]
    Fault { name: String },
}

/// A single wheel motor controller
///
/// Velocities are in revolutions per second at the wheel, already signed for
/// the wheel's mounting direction.
pub trait WheelDrive: Send {
    fn name(&self) -> &str;

    /// Bring up communication and clear stale errors
    fn start(&mut self) -> Result<(), DriveError>;

    /// Arm the motor for velocity control
    fn init(&mut self) -> Result<(), DriveError>;

    fn set_velocity(&mut self, rps: f64) -> Result<(), DriveError>;

    /// Zero the setpoint and disarm
    fn stop(&mut self) -> Result<(), DriveError>;

    /// False if the controller reports an error or stopped responding
    fn is_healthy(&mut self) -> bool;
}
