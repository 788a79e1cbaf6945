// Zenoh bridge around the control loop
//
// Commands arrive on the command topic and are forwarded raw to the machine's
// ingress; heartbeats from the machine are published as JSON. Ctrl-C (or a
// lost transport) shuts the machine down, which stops the drives.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::MachineConfig;
use crate::drive::{MockDrive, OdriveAxis, OdriveBus, WheelPair};
use crate::error::MachineError;
use crate::machine::Machine;

/// Pending raw commands; the machine drains these far faster than they arrive
const COMMAND_QUEUE: usize = 16;
const STATUS_QUEUE: usize = 8;

fn transport(e: impl std::fmt::Display) -> MachineError {
    MachineError::Transport(e.to_string())
}

/// Build the left/right drives from the configuration
pub fn build_drives(config: &MachineConfig) -> Result<WheelPair, MachineError> {
    if config.use_mock_drives() {
        warn!("Using mock drives, no hardware will move");
        return Ok(WheelPair::new(
            Box::new(MockDrive::new("left")),
            Box::new(MockDrive::new("right")),
        ));
    }

    info!("Opening drive bus on {}", config.drive_port);
    let bus = Arc::new(std::sync::Mutex::new(OdriveBus::open(&config.drive_port)?));
    Ok(WheelPair::new(
        Box::new(OdriveAxis::new(bus.clone(), config.left_axis, "left")),
        Box::new(OdriveAxis::new(bus, config.right_axis, "right")),
    ))
}

/// Hand a raw payload to the machine without waiting; drops it when the
/// queue is full or the machine has already exited
fn forward_command(
    commands: &mpsc::Sender<Vec<u8>>,
    payload: Vec<u8>,
) -> Result<(), TrySendError<Vec<u8>>> {
    commands.try_send(payload).inspect_err(|e| match e {
        TrySendError::Full(_) => warn!("Command queue full, dropping command"),
        TrySendError::Closed(_) => debug!("Machine no longer accepts commands, dropping command"),
    })
}

pub async fn run(config: MachineConfig) -> Result<(), MachineError> {
    config.validate()?;
    let drives = build_drives(&config)?;
    let machine = Machine::new(&config, drives)?;

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default())
        .await
        .map_err(transport)?;

    info!("Setting up publishers and subscribers...");
    let subscriber = session
        .declare_subscriber(config.topic_cmd.as_str())
        .await
        .map_err(transport)?;
    let pub_heartbeat = session
        .declare_publisher(config.topic_heartbeat.as_str())
        .await
        .map_err(transport)?;

    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE);
    let (status_tx, mut status_rx) = mpsc::channel(STATUS_QUEUE);
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    info!("Subscribed to: {}", config.topic_cmd);
    info!("Publishing to: {}", config.topic_heartbeat);

    let mut machine_task = tokio::spawn(machine.run(cmd_rx, status_tx, async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Process interrupted by user"),
            _ = stop_rx => {}
        }
    }));

    let mut stop_tx = Some(stop_tx);
    let mut transport_error = None;
    loop {
        tokio::select! {
            joined = &mut machine_task => {
                joined??;
                break;
            }
            sample = subscriber.recv_async(), if transport_error.is_none() => match sample {
                Ok(sample) => {
                    let payload = sample.payload().to_bytes().to_vec();
                    let _ = forward_command(&cmd_tx, payload);
                }
                Err(e) => {
                    warn!("Command subscription lost: {}", e);
                    transport_error = Some(transport(e));
                    if let Some(stop) = stop_tx.take() {
                        let _ = stop.send(());
                    }
                }
            },
            Some(heartbeat) = status_rx.recv() => {
                let result = match serde_json::to_string(&heartbeat) {
                    Ok(json) => pub_heartbeat.put(json).await.map_err(transport),
                    Err(e) => Err(e.into()),
                };
                if let Err(e) = result {
                    warn!("Failed to publish heartbeat {}: {}", heartbeat.counter, e);
                }
            }
        }
    }

    match transport_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_command_full_queue() {
        let (tx, mut rx) = mpsc::channel(1);
        assert!(forward_command(&tx, b"first".to_vec()).is_ok());
        assert!(matches!(
            forward_command(&tx, b"second".to_vec()),
            Err(TrySendError::Full(_))
        ));
        assert_eq!(rx.try_recv().unwrap(), b"first".to_vec());
    }

    #[test]
    fn test_forward_command_after_machine_exit() {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
        drop(rx);
        assert!(matches!(
            forward_command(&tx, b"late".to_vec()),
            Err(TrySendError::Closed(_))
        ));
    }

    #[test]
    fn test_build_mock_drives() {
        let config = MachineConfig {
            mock_drives: true,
            ..Default::default()
        };
        assert!(build_drives(&config).is_ok());
    }
}
