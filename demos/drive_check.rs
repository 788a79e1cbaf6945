// Drive check: diagnostic for the ODrive wheel axes
//
// Read-only by default: plain property reads, no movement. With --calibrate
// it first runs the full calibration sequence on both axes, which TURNS THE
// WHEELS. Run this before `alpha-motion run machine` on new hardware.
//
// Usage: cargo run --example drive_check -- [--calibrate] [port]
// Example: cargo run --example drive_check -- --calibrate /dev/ttyACM0

use alpha_motion::config::{DRIVE_PORT, WHEEL_AXES};
use alpha_motion::drive::OdriveBus;
use alpha_motion::drive::odrive::AxisState;

const AXIS_NAMES: [&str; 2] = ["Left", "Right"];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::DEBUG.into())
                .from_env_lossy(),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let calibrate = args.iter().any(|a| a == "--calibrate");
    let port = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .cloned()
        .unwrap_or_else(|| DRIVE_PORT.to_string());
    let axes = [WHEEL_AXES.0, WHEEL_AXES.1];

    if calibrate {
        println!("Drive check (calibrating, wheels will turn)");
    } else {
        println!("Drive check (read-only)");
    }
    println!("Serial port: {}", port);
    println!("Expected axes: {:?}", axes);
    println!();

    println!("Step 1: Opening serial port...");
    let mut bus = match OdriveBus::open(&port) {
        Ok(bus) => {
            println!("  ok");
            bus
        }
        Err(e) => {
            println!("  failed: {}", e);
            println!();
            println!("Troubleshooting:");
            println!("  - Check the port path is correct");
            println!("  - Verify the USB cable is connected and the board powered");
            println!("  - Check you are allowed to open the port (dialout group)");
            return Err(e.into());
        }
    };
    println!();

    if calibrate {
        println!("Step 1b: Running full calibration sequence...");
        for (name, &axis) in AXIS_NAMES.iter().zip(axes.iter()) {
            println!("  {} wheel (axis {})...", name, axis);
            match bus.calibrate(axis) {
                Ok(()) => println!("    ok"),
                Err(e) => println!("    failed: {}", e),
            }
        }
        println!();
    }

    println!("Step 2: Reading axis state and errors...");
    let mut all_ready = true;
    for (name, &axis) in AXIS_NAMES.iter().zip(axes.iter()) {
        println!("  === {} wheel (axis {}) ===", name, axis);

        match bus.axis_state(axis) {
            Ok(state) => {
                println!("    State: {:?}", state);
                if state != AxisState::Idle && state != AxisState::ClosedLoopControl {
                    all_ready = false;
                }
            }
            Err(e) => {
                println!("    State: ERROR - {}", e);
                all_ready = false;
            }
        }

        match bus.axis_error(axis) {
            Ok(0) => println!("    Error: none"),
            Ok(code) => {
                println!("    Error: 0x{:08X}", code);
                all_ready = false;
            }
            Err(e) => {
                println!("    Error: ERROR - {}", e);
                all_ready = false;
            }
        }

        let vel_path = format!("axis{}.encoder.vel_estimate", axis);
        match bus.read_property(axis, &vel_path) {
            Ok(vel) => println!("    Velocity estimate: {} turns/s", vel),
            Err(e) => println!("    Velocity estimate: ERROR - {}", e),
        }
        println!();
    }

    if all_ready {
        println!("Both axes respond without errors.");
        println!("Next step: run the machine with wheels OFF THE GROUND first.");
    } else {
        println!("Some axes are not ready:");
        println!("  - Rerun with --calibrate (wheels OFF THE GROUND)");
        println!("  - Check motor and encoder wiring");
    }

    Ok(())
}
