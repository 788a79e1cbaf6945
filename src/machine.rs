// Control loop scheduler
//
// Runs the periodic tasks (model update, setpoint dispatch, heartbeat, drive
// health) plus command ingress as one JoinSet sharing the motion controller.
// The controller lock is only held for a read or an update, never across
// drive I/O. Drive calls are synchronous serial I/O and run on the blocking
// pool. Any task error ends the whole loop; every exit path zeroes the
// setpoints and stops the drives.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{error, info, warn};

use crate::config::{MachineConfig, period};
use crate::drive::WheelPair;
use crate::error::{ConfigError, MachineError};
use crate::ingress::run_ingress;
use crate::messages::Heartbeat;
use crate::motion::{MotionController, WheelSetpoint};

/// Periodic activities of the control loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopTask {
    /// Watchdog check, then acceleration-limited integration
    ModelUpdate,
    /// Translate current wheel speeds and send them to the drives
    Dispatch,
    /// Emit a liveness counter
    Heartbeat,
    /// Poll drive health, escalate faults
    HealthCheck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSpec {
    pub task: LoopTask,
    pub period: Duration,
}

pub struct Machine {
    schedule: Vec<TaskSpec>,
    ctx: LoopContext,
}

/// State shared by the loop tasks
#[derive(Clone)]
struct LoopContext {
    controller: Arc<Mutex<MotionController>>,
    drives: Arc<Mutex<WheelPair>>,
    left: WheelSetpoint,
    right: WheelSetpoint,
}

impl Machine {
    /// Build the machine; refuses to start on an invalid configuration
    pub fn new(config: &MachineConfig, drives: WheelPair) -> Result<Self, ConfigError> {
        config.validate()?;
        let (left_dir, right_dir) = config.directions()?;
        let controller =
            MotionController::new(config.wheel_base, config.wheel_accel, config.cmd_timeout())?;

        let schedule = vec![
            TaskSpec {
                task: LoopTask::ModelUpdate,
                period: period(config.model_hz),
            },
            TaskSpec {
                task: LoopTask::Dispatch,
                period: period(config.setpoint_hz),
            },
            TaskSpec {
                task: LoopTask::Heartbeat,
                period: period(config.heartbeat_hz),
            },
            TaskSpec {
                task: LoopTask::HealthCheck,
                period: period(config.health_hz),
            },
        ];

        Ok(Self {
            schedule,
            ctx: LoopContext {
                controller: Arc::new(Mutex::new(controller)),
                drives: Arc::new(Mutex::new(drives)),
                left: WheelSetpoint::new(config.wheel_diameter, left_dir)?,
                right: WheelSetpoint::new(config.wheel_diameter, right_dir)?,
            },
        })
    }

    pub fn schedule(&self) -> &[TaskSpec] {
        &self.schedule
    }

    /// Handle on the motion controller, for inspection
    pub fn controller(&self) -> Arc<Mutex<MotionController>> {
        self.ctx.controller.clone()
    }

    /// Arm the drives and run until `shutdown` resolves or a task fails
    ///
    /// `commands` carries raw command payloads, `status` receives heartbeats.
    pub async fn run(
        self,
        commands: mpsc::Receiver<Vec<u8>>,
        status: mpsc::Sender<Heartbeat>,
        shutdown: impl Future<Output = ()> + Send,
    ) -> Result<(), MachineError> {
        // Arming polls the hardware, keep it off the async workers
        let drives = self.ctx.drives.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || drives.blocking_lock().start()).await? {
            error!("Failed to arm drives: {}", e);
            self.ctx.halt().await;
            return Err(e.into());
        }

        let mut tasks = JoinSet::new();
        for spec in &self.schedule {
            info!("Scheduling {:?} every {:?}", spec.task, spec.period);
            tasks.spawn(self.ctx.clone().run_periodic(*spec, status.clone()));
        }
        tasks.spawn(run_ingress(self.ctx.controller.clone(), commands));
        drop(status);

        {
            let controller = self.ctx.controller.lock().await;
            let model = controller.model();
            info!(
                "Machine running: B={}m, {}m/s^2, watchdog {:?}, wheels {:?}/{:?}",
                model.wheel_base(),
                model.wheel_accel(),
                controller.watchdog().timeout(),
                self.ctx.left.direction(),
                self.ctx.right.direction(),
            );
        }
        let result = tokio::select! {
            result = supervise(&mut tasks) => result,
            _ = shutdown => {
                info!("Shutdown requested");
                Ok(())
            }
        };

        tasks.shutdown().await;
        self.ctx.halt().await;
        if let Err(e) = &result {
            error!("Machine halted: {}", e);
        }
        result
    }
}

/// Wait for tasks; the first error (or panic) ends supervision
async fn supervise(tasks: &mut JoinSet<Result<(), MachineError>>) -> Result<(), MachineError> {
    while let Some(joined) = tasks.join_next().await {
        joined??;
    }
    Ok(())
}

impl LoopContext {
    async fn run_periodic(
        self,
        spec: TaskSpec,
        status: mpsc::Sender<Heartbeat>,
    ) -> Result<(), MachineError> {
        let mut tick = interval(spec.period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        match spec.task {
            LoopTask::ModelUpdate => {
                let mut last = Instant::now();
                loop {
                    tick.tick().await;
                    let now = Instant::now();
                    let dt = now.duration_since(last).as_secs_f64();
                    last = now;
                    self.controller.lock().await.update(dt);
                }
            }
            LoopTask::Dispatch => loop {
                tick.tick().await;
                self.dispatch().await?;
            },
            LoopTask::Heartbeat => {
                let mut counter: u64 = 0;
                loop {
                    tick.tick().await;
                    let health = self.controller.lock().await.health();
                    if let Err(e) = status.try_send(Heartbeat { counter, health }) {
                        warn!("Failed to emit heartbeat {}: {}", counter, e);
                    }
                    counter += 1;
                }
            }
            LoopTask::HealthCheck => loop {
                tick.tick().await;
                let drives = self.drives.clone();
                let unhealthy =
                    tokio::task::spawn_blocking(move || drives.blocking_lock().unhealthy_wheel())
                        .await?;
                if let Some(wheel) = unhealthy {
                    error!("{} drive unhealthy, halting", wheel);
                    return Err(MachineError::DriveFault { wheel });
                }
            },
        }
    }

    /// Send the current wheel speeds to the drives
    async fn dispatch(&self) -> Result<(), MachineError> {
        let speeds = self.controller.lock().await.wheel_speeds();
        let left = self.left.rps(speeds.left);
        let right = self.right.rps(speeds.right);

        let drives = self.drives.clone();
        tokio::task::spawn_blocking(move || drives.blocking_lock().set_velocities(left, right))
            .await?
            .map_err(|e| {
                error!("Setpoint dispatch failed: {}", e);
                MachineError::Drive(e)
            })
    }

    /// Zero the target and stop the drives, best effort
    async fn halt(&self) {
        self.controller.lock().await.halt();
        let drives = self.drives.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || drives.blocking_lock().stop()).await {
            error!("Failed to stop drives: {}", e);
        }
    }
}
