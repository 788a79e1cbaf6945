// In-process mock drive for tests and CI runs without hardware

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::{debug, info};

use super::{DriveError, WheelDrive};

/// Mock wheel drive. Clones share state, so a test can keep a handle while
/// the control loop owns the drive.
#[derive(Clone)]
pub struct MockDrive {
    name: String,
    inner: Arc<MockDriveInner>,
}

#[derive(Default)]
struct MockDriveInner {
    velocity_bits: AtomicU64, // f64 bits of the last setpoint
    setpoints: AtomicU64,
    started: AtomicBool,
    armed: AtomicBool,
    fault: AtomicBool,
}

impl MockDrive {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(MockDriveInner::default()),
        }
    }

    /// Last velocity setpoint in rev/s
    pub fn velocity(&self) -> f64 {
        f64::from_bits(self.inner.velocity_bits.load(Ordering::SeqCst))
    }

    /// Number of setpoints received
    pub fn setpoint_count(&self) -> u64 {
        self.inner.setpoints.load(Ordering::SeqCst)
    }

    pub fn is_armed(&self) -> bool {
        self.inner.armed.load(Ordering::SeqCst)
    }

    /// Make the drive report a fault and reject setpoints
    pub fn inject_fault(&self) {
        self.inner.fault.store(true, Ordering::SeqCst);
    }

    pub fn clear_fault(&self) {
        self.inner.fault.store(false, Ordering::SeqCst);
    }

    fn check_fault(&self) -> Result<(), DriveError> {
        if self.inner.fault.load(Ordering::SeqCst) {
            Err(DriveError::Fault {
                name: self.name.clone(),
            })
        } else {
            Ok(())
        }
    }
}

impl WheelDrive for MockDrive {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self) -> Result<(), DriveError> {
        info!("Starting mock {} drive", self.name);
        self.inner.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn init(&mut self) -> Result<(), DriveError> {
        self.check_fault()?;
        self.inner.armed.store(true, Ordering::SeqCst);
        self.set_velocity(0.0)
    }

    fn set_velocity(&mut self, rps: f64) -> Result<(), DriveError> {
        self.check_fault()?;
        debug!("Mock {} drive setpoint {:.3} rps", self.name, rps);
        self.inner
            .velocity_bits
            .store(rps.to_bits(), Ordering::SeqCst);
        self.inner.setpoints.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DriveError> {
        self.inner.velocity_bits.store(0f64.to_bits(), Ordering::SeqCst);
        self.inner.armed.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_healthy(&mut self) -> bool {
        self.inner.started.load(Ordering::SeqCst) && !self.inner.fault.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_state() {
        let handle = MockDrive::new("left");
        let mut drive = handle.clone();
        drive.start().unwrap();
        drive.init().unwrap();
        drive.set_velocity(1.25).unwrap();

        assert!(handle.is_armed());
        assert_eq!(handle.velocity(), 1.25);
        assert_eq!(handle.setpoint_count(), 2); // zero on arm + one
    }

    #[test]
    fn test_fault_injection() {
        let mut drive = MockDrive::new("right");
        drive.start().unwrap();
        assert!(drive.is_healthy());

        drive.inject_fault();
        assert!(!drive.is_healthy());
        assert!(drive.set_velocity(0.5).is_err());

        drive.clear_fault();
        assert!(drive.is_healthy());
    }

    #[test]
    fn test_stop_zeroes_and_disarms() {
        let mut drive = MockDrive::new("left");
        drive.start().unwrap();
        drive.init().unwrap();
        drive.set_velocity(-2.0).unwrap();
        drive.stop().unwrap();
        assert_eq!(drive.velocity(), 0.0);
        assert!(!drive.is_armed());
    }
}
