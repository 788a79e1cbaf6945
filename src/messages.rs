// Define message types for the machine

use serde::{Deserialize, Serialize};

// Command from teleop/scripts -> machine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionCommand {
    pub v_linear: f64,  // m/s
    pub curvature: f64, // 1/m, positive turns left
}

/// Health status published with every heartbeat
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
}

/// Liveness message, counter increases by one per heartbeat tick
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Heartbeat {
    pub counter: u64,
    pub health: RuntimeHealth,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_wire_format() {
        let hb = Heartbeat {
            counter: 7,
            health: RuntimeHealth::CmdStale,
        };
        let json = serde_json::to_string(&hb).unwrap();
        assert_eq!(json, r#"{"counter":7,"health":"cmd_stale"}"#);
    }
}
