// Left/right wheel drives of the differential-drive base

use tracing::{debug, info, warn};

use super::{DriveError, WheelDrive};

pub struct WheelPair {
    left: Box<dyn WheelDrive>,
    right: Box<dyn WheelDrive>,
    armed: bool,
}

impl WheelPair {
    pub fn new(left: Box<dyn WheelDrive>, right: Box<dyn WheelDrive>) -> Self {
        Self {
            left,
            right,
            armed: false,
        }
    }

    /// Start and arm both drives
    ///
    /// This must be called before sending velocity setpoints.
    pub fn start(&mut self) -> Result<(), DriveError> {
        info!(
            "Initializing drives {} / {} for velocity control",
            self.left.name(),
            self.right.name()
        );
        self.left.start()?;
        self.right.start()?;
        self.armed = true;
        self.left.init()?;
        self.right.init()?;
        info!("Drives armed");
        Ok(())
    }

    /// Send left/right setpoints in rev/s
    pub fn set_velocities(&mut self, left_rps: f64, right_rps: f64) -> Result<(), DriveError> {
        debug!(
            "Setting wheel rates: left={:.3}, right={:.3}",
            left_rps, right_rps
        );
        self.left.set_velocity(left_rps)?;
        self.right.set_velocity(right_rps)
    }

    /// Name of the first drive reporting a fault, if any
    pub fn unhealthy_wheel(&mut self) -> Option<&'static str> {
        if !self.left.is_healthy() {
            Some("left")
        } else if !self.right.is_healthy() {
            Some("right")
        } else {
            None
        }
    }

    /// Zero both setpoints and disarm, best effort
    pub fn stop(&mut self) {
        if !self.armed {
            return;
        }
        info!("Stopping all drives");
        for drive in [&mut self.left, &mut self.right] {
            if let Err(e) = drive.set_velocity(0.0) {
                warn!("Failed to zero {} drive: {}", drive.name(), e);
            }
            if let Err(e) = drive.stop() {
                warn!("Failed to stop {} drive: {}", drive.name(), e);
            }
        }
        self.armed = false;
    }
}

impl Drop for WheelPair {
    fn drop(&mut self) {
        // Never leave armed motors behind
        self.stop();
    }
}
