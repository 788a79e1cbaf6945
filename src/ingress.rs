// Command ingress: validate raw payloads before they reach the motion state
//
// A malformed payload is reported and dropped; it never touches the model or
// the watchdog and never stops the loop.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::error::MachineError;
use crate::messages::MotionCommand;
use crate::motion::MotionController;

#[derive(Debug, thiserror::Error)]
pub enum IngressError {
    #[error("Payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Payload is not a mapping")]
    NotAMapping,

    #[error("Missing field `{0}`")]
    MissingField(&'static str),

    #[error("Field `{0}` is not a number")]
    NotNumeric(&'static str),

    #[error("Field `{0}` is not finite")]
    NonFinite(&'static str),
}

/// Parse a JSON payload into a command
pub fn parse_command(payload: &[u8]) -> Result<MotionCommand, IngressError> {
    let value: Value = serde_json::from_slice(payload)?;
    command_from_value(&value)
}

/// Validate an already-decoded message
pub fn command_from_value(value: &Value) -> Result<MotionCommand, IngressError> {
    let Value::Object(map) = value else {
        return Err(IngressError::NotAMapping);
    };
    Ok(MotionCommand {
        v_linear: number_field(map, "v_linear")?,
        curvature: number_field(map, "curvature")?,
    })
}

fn number_field(map: &Map<String, Value>, name: &'static str) -> Result<f64, IngressError> {
    let number = map
        .get(name)
        .ok_or(IngressError::MissingField(name))?
        .as_f64()
        .ok_or(IngressError::NotNumeric(name))?;
    if number.is_finite() {
        Ok(number)
    } else {
        Err(IngressError::NonFinite(name))
    }
}

/// Consume raw payloads until the channel closes
///
/// Payloads are validated before the controller lock is taken; a valid
/// command sets the target and resets the watchdog under one lock. A
/// malformed payload is logged and dropped without touching the controller.
pub async fn run_ingress(
    controller: Arc<Mutex<MotionController>>,
    mut commands: mpsc::Receiver<Vec<u8>>,
) -> Result<(), MachineError> {
    while let Some(payload) = commands.recv().await {
        match parse_command(&payload) {
            Ok(cmd) => {
                debug!("Received command: {:?}", cmd);
                controller.lock().await.apply_command(cmd);
            }
            Err(e) => warn!("Dropping malformed command: {}", e),
        }
    }
    info!("Command channel closed");
    Ok(())
}
