// ODrive ASCII protocol over a serial port
//
// Line format: "<command>*<checksum>\n", checksum = XOR of all bytes before '*'.
// Replies to checksummed commands carry a checksum too.
//   v <axis> <vel> <torque_ff>    velocity setpoint (turns/s), no reply
//   w <property> <value>          write property, no reply
//   r <property>                  read property, one-line reply
//   sc                            clear errors, no reply

use serialport::{self, SerialPort};
use std::fmt::Display;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use std::thread::sleep;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{DriveError, WheelDrive};

/// Default serial configuration for ODrive USB/UART
pub const DEFAULT_BAUDRATE: u32 = 115_200;
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Longest reply accepted before giving up on a line
const MAX_LINE_LEN: usize = 256;

/// Arming: poll the axis state this often, this many times
const ARM_POLL_INTERVAL: Duration = Duration::from_millis(50);
const ARM_POLL_ATTEMPTS: u32 = 40;

/// Calibration: wait for the sequence to start, then for it to finish
const CAL_START_ATTEMPTS: u32 = 20;
const CAL_POLL_INTERVAL: Duration = Duration::from_millis(500);
const CAL_POLL_ATTEMPTS: u32 = 120;

/// Axis states (subset used here)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisState {
    Undefined = 0,
    Idle = 1,
    StartupSequence = 2,
    FullCalibrationSequence = 3,
    MotorCalibration = 4,
    EncoderIndexSearch = 6,
    EncoderOffsetCalibration = 7,
    ClosedLoopControl = 8,
}

impl AxisState {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => AxisState::Undefined,
            1 => AxisState::Idle,
            2 => AxisState::StartupSequence,
            3 => AxisState::FullCalibrationSequence,
            4 => AxisState::MotorCalibration,
            6 => AxisState::EncoderIndexSearch,
            7 => AxisState::EncoderOffsetCalibration,
            8 => AxisState::ClosedLoopControl,
            _ => return None,
        })
    }
}

/// Poll `read` until the reported state satisfies `reached`
///
/// `read` returns the current state and error code. A non-zero error fails
/// immediately; running out of attempts fails with a timeout.
fn wait_for_state(
    axis: u8,
    attempts: u32,
    every: Duration,
    reached: impl Fn(AxisState) -> bool,
    mut read: impl FnMut() -> Result<(AxisState, u32)>,
) -> Result<AxisState> {
    for attempt in 0..attempts {
        let (state, error) = read()?;
        if error != 0 {
            return Err(DriveError::AxisError { axis, code: error });
        }
        if reached(state) {
            return Ok(state);
        }
        if attempt + 1 < attempts {
            sleep(every);
        }
    }
    Err(DriveError::Timeout { axis })
}

/// Controller settings for velocity control with a velocity ramp
const CONTROL_MODE_VELOCITY: u8 = 2;
const INPUT_MODE_VEL_RAMP: u8 = 2;

pub type Result<T> = std::result::Result<T, DriveError>;

/// ODrive board connection - one port serves both axes
pub struct OdriveBus {
    port: Box<dyn SerialPort>,
}

impl OdriveBus {
    /// Open a new connection to the board
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_baudrate(port_name, DEFAULT_BAUDRATE)
    }

    /// Open with custom baudrate
    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        Ok(Self { port })
    }

    /// XOR checksum over the command text
    fn checksum(data: &[u8]) -> u8 {
        data.iter().fold(0, |acc, &b| acc ^ b)
    }

    /// Append checksum and line terminator
    fn build_line(command: &str) -> String {
        format!("{}*{}\n", command, Self::checksum(command.as_bytes()))
    }

    /// Strip and verify the checksum of a reply, if it has one
    fn parse_reply(axis: u8, line: &str) -> Result<String> {
        let line = line.trim_end_matches(['\r', '\n']);
        let Some((body, checksum)) = line.rsplit_once('*') else {
            return Ok(line.to_string());
        };

        let received: u8 = checksum
            .trim()
            .parse()
            .map_err(|_| DriveError::InvalidResponse {
                axis,
                reason: format!("Bad checksum field: {:?}", checksum),
            })?;
        if Self::checksum(body.as_bytes()) != received {
            return Err(DriveError::ChecksumMismatch { axis });
        }
        Ok(body.to_string())
    }

    fn send_line(&mut self, command: &str) -> Result<()> {
        debug!("ODrive <- {}", command);
        self.port.write_all(Self::build_line(command).as_bytes())?;
        self.port.flush()?;
        Ok(())
    }

    /// Read one '\n'-terminated reply
    fn read_line(&mut self, axis: u8) -> Result<String> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            self.port.read_exact(&mut byte).map_err(|e| {
                if e.kind() == std::io::ErrorKind::TimedOut {
                    DriveError::Timeout { axis }
                } else {
                    DriveError::Io(e)
                }
            })?;
            if byte[0] == b'\n' {
                break;
            }
            line.push(byte[0]);
            if line.len() > MAX_LINE_LEN {
                return Err(DriveError::InvalidResponse {
                    axis,
                    reason: "Reply too long".to_string(),
                });
            }
        }

        String::from_utf8(line).map_err(|_| DriveError::InvalidResponse {
            axis,
            reason: "Reply is not UTF-8".to_string(),
        })
    }

    /// Read a property, e.g. "axis0.error"
    pub fn read_property(&mut self, axis: u8, path: &str) -> Result<String> {
        self.send_line(&format!("r {}", path))?;
        let reply = Self::parse_reply(axis, &self.read_line(axis)?)?;
        debug!("ODrive -> {} = {}", path, reply);

        if reply.starts_with("invalid") || reply.starts_with("unknown") {
            return Err(DriveError::InvalidResponse {
                axis,
                reason: format!("{}: {}", path, reply),
            });
        }
        Ok(reply)
    }

    /// Write a property (no reply expected)
    pub fn write_property(&mut self, path: &str, value: impl Display) -> Result<()> {
        self.send_line(&format!("w {} {}", path, value))
    }

    fn read_number<T: std::str::FromStr>(&mut self, axis: u8, path: &str) -> Result<T> {
        let reply = self.read_property(axis, path)?;
        reply
            .trim()
            .parse()
            .map_err(|_| DriveError::InvalidResponse {
                axis,
                reason: format!("{}: not a number: {:?}", path, reply),
            })
    }

    // === High-level convenience methods ===

    /// Velocity setpoint in turns per second
    pub fn set_input_vel(&mut self, axis: u8, vel: f64) -> Result<()> {
        self.send_line(&format!("v {} {:.4} 0", axis, vel))
    }

    /// Clear errors on all axes
    pub fn clear_errors(&mut self) -> Result<()> {
        self.send_line("sc")
    }

    pub fn set_axis_state(&mut self, axis: u8, state: AxisState) -> Result<()> {
        self.write_property(&format!("axis{}.requested_state", axis), state as u8)
    }

    pub fn axis_state(&mut self, axis: u8) -> Result<AxisState> {
        let code: u8 = self.read_number(axis, &format!("axis{}.current_state", axis))?;
        AxisState::from_code(code).ok_or_else(|| DriveError::InvalidResponse {
            axis,
            reason: format!("Unknown axis state {}", code),
        })
    }

    pub fn axis_error(&mut self, axis: u8) -> Result<u32> {
        self.read_number(axis, &format!("axis{}.error", axis))
    }

    fn state_and_error(&mut self, axis: u8) -> Result<(AxisState, u32)> {
        Ok((self.axis_state(axis)?, self.axis_error(axis)?))
    }

    /// Run the full calibration sequence (motor, then encoder) and wait for
    /// the axis to return to idle. The wheel turns during calibration.
    pub fn calibrate(&mut self, axis: u8) -> Result<()> {
        self.clear_errors()?;
        self.set_axis_state(axis, AxisState::FullCalibrationSequence)?;
        info!("Axis {} calibration started", axis);

        wait_for_state(
            axis,
            CAL_START_ATTEMPTS,
            ARM_POLL_INTERVAL,
            |state| state != AxisState::Idle,
            || self.state_and_error(axis),
        )?;
        wait_for_state(
            axis,
            CAL_POLL_ATTEMPTS,
            CAL_POLL_INTERVAL,
            |state| state == AxisState::Idle,
            || self.state_and_error(axis),
        )?;

        info!("Axis {} calibration finished", axis);
        Ok(())
    }

    /// Configure velocity control with ramped input
    pub fn set_velocity_control(&mut self, axis: u8) -> Result<()> {
        self.write_property(
            &format!("axis{}.controller.config.control_mode", axis),
            CONTROL_MODE_VELOCITY,
        )?;
        self.write_property(
            &format!("axis{}.controller.config.input_mode", axis),
            INPUT_MODE_VEL_RAMP,
        )
    }
}

/// One ODrive axis driving one wheel
pub struct OdriveAxis {
    bus: Arc<Mutex<OdriveBus>>,
    axis: u8,
    name: String,
}

impl OdriveAxis {
    pub fn new(bus: Arc<Mutex<OdriveBus>>, axis: u8, name: impl Into<String>) -> Self {
        Self {
            bus,
            axis,
            name: name.into(),
        }
    }

    fn with_bus<T>(&self, f: impl FnOnce(&mut OdriveBus) -> Result<T>) -> Result<T> {
        let mut bus = self.bus.lock().map_err(|_| DriveError::BusPoisoned)?;
        f(&mut bus)
    }
}

impl WheelDrive for OdriveAxis {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self) -> Result<()> {
        info!("Starting {} drive (axis {})", self.name, self.axis);
        let axis = self.axis;
        self.with_bus(|bus| {
            bus.clear_errors()?;
            bus.set_velocity_control(axis)
        })
    }

    fn init(&mut self) -> Result<()> {
        let axis = self.axis;
        let state = self.with_bus(|bus| bus.axis_state(axis))?;
        debug!("{} drive responding, state {:?}", self.name, state);

        self.with_bus(|bus| {
            bus.clear_errors()?;
            bus.set_axis_state(axis, AxisState::ClosedLoopControl)
        })?;

        wait_for_state(
            axis,
            ARM_POLL_ATTEMPTS,
            ARM_POLL_INTERVAL,
            |state| state == AxisState::ClosedLoopControl,
            || self.with_bus(|bus| bus.state_and_error(axis)),
        )
        .inspect_err(|e| warn!("{} drive did not enter closed loop control: {}", self.name, e))?;

        self.set_velocity(0.0)?;
        info!("{} drive armed", self.name);
        Ok(())
    }

    fn set_velocity(&mut self, rps: f64) -> Result<()> {
        let axis = self.axis;
        self.with_bus(|bus| bus.set_input_vel(axis, rps))
    }

    fn stop(&mut self) -> Result<()> {
        info!("Stopping {} drive", self.name);
        let axis = self.axis;
        self.with_bus(|bus| {
            bus.set_input_vel(axis, 0.0)?;
            bus.set_axis_state(axis, AxisState::Idle)
        })
    }

    fn is_healthy(&mut self) -> bool {
        let axis = self.axis;
        match self.with_bus(|bus| bus.state_and_error(axis)) {
            Ok((AxisState::ClosedLoopControl, 0)) => true,
            Ok((state, error)) => {
                warn!(
                    "{} drive unhealthy: error 0x{:08X}, state {:?}",
                    self.name, error, state
                );
                false
            }
            Err(e) => {
                warn!("{} drive health check failed: {}", self.name, e);
                false
            }
        }
    }
}
