// Motion tester: sweep curvature -1, 0, 1 at 0.5 m/s, 10 s each, forever
//
// Usage: cargo run --example motion_tester

use alpha_motion::config::TOPIC_CMD_VC;
use alpha_motion::messages::MotionCommand;
use std::time::Duration;
use tracing::info;

const V_LINEAR: f64 = 0.5; // m/s
const CURVATURES: [f64; 3] = [-1.0, 0.0, 1.0];
const COMMANDS_PER_STEP: usize = 100;
const PERIOD: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_VC).await?;

    loop {
        for curvature in CURVATURES {
            let cmd = MotionCommand {
                v_linear: V_LINEAR,
                curvature,
            };
            info!("Sending {:?}", cmd);
            let json = serde_json::to_string(&cmd)?;
            for _ in 0..COMMANDS_PER_STEP {
                publisher.put(json.clone()).await?;
                tokio::time::sleep(PERIOD).await;
            }
        }
    }
}
