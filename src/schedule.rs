//! Delayed self-relaunch for `service` commands.
//!
//! A request with `--time N` does not run its action. It respawns the tool
//! with the same parsed request and `--delayed N`, then returns. The
//! respawned instance sleeps `N` seconds and runs the action once. There is
//! no cancellation: the operator kills the respawned process to abort.
use std::{fmt, time::Duration};

use chrono::{DateTime, Local, TimeDelta};
use tracing::info;

use crate::{
    error::ServiceError,
    launcher::{ChildOutput, Invocation, Sleeper, Spawner},
    service::ServiceRequest,
};

/// Internal marker telling a relaunched instance how long to wait.
pub const DELAYED_FLAG: &str = "--delayed";

/// Timing state of a single invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayState {
    /// Respawn with the delay marker and do nothing else.
    Requesting(u64),
    /// Relaunched instance: sleep, then run the action.
    Delayed(u64),
    /// Run the action now.
    Immediate,
}

impl DelayState {
    /// Derives the state from the two timing flags. The delay marker wins
    /// over `--time` so a relaunched instance never respawns again.
    pub fn from_flags(time: u64, delayed: u64) -> Self {
        if delayed > 0 {
            DelayState::Delayed(delayed)
        } else if time > 0 {
            DelayState::Requesting(time)
        } else {
            DelayState::Immediate
        }
    }
}

/// A parsed request plus the delay it should wait, rendered back into the
/// argument list of the respawned process.
#[derive(Debug, Clone)]
pub struct Relaunch<'a> {
    /// The request whose action runs after the delay.
    pub request: &'a ServiceRequest,
    /// Seconds the respawned instance waits.
    pub delay: u64,
    /// Global options (`--log-level`, `--config`) to forward.
    pub globals: &'a [String],
}

impl Relaunch<'_> {
    /// Builds the child's argument list. `--time` is never forwarded.
    ///
    /// Option values are attached with `=` so a value starting with `-` is
    /// not read back as a flag.
    pub fn to_args(&self) -> Vec<String> {
        let request = self.request;
        let mut args = vec!["service".to_string(), request.service.clone()];
        if let Some(action) = &request.action {
            args.push(action.clone());
        }
        args.push(format!("{DELAYED_FLAG}={}", self.delay));
        if request.remove_files {
            args.push("--remove-files".to_string());
        }
        if let Some(local_file) = &request.local_file {
            args.push(format!("--local-file={local_file}"));
        }
        if let Some(checksum) = &request.checksum {
            args.push(format!("--checksum={checksum}"));
        }
        args.extend(self.globals.iter().cloned());
        args
    }
}

/// What the caller should do after scheduling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    /// Run the lifecycle action in this process.
    Proceed,
    /// A delayed instance was spawned; this process must not run the action.
    Respawned {
        /// Label of the scheduled request.
        label: String,
        /// PID of the respawned instance.
        pid: u32,
        /// Requested delay in seconds.
        delay: u64,
        /// Local wall-clock time the action is due.
        due: Option<DateTime<Local>>,
    },
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Proceed => write!(f, "running now"),
            Schedule::Respawned {
                label,
                pid,
                delay,
                due,
            } => {
                write!(f, "{label} scheduled in {delay}s")?;
                if let Some(due) = due {
                    write!(f, " (at {})", due.format("%H:%M:%S"))?;
                }
                write!(f, ", pid {pid}")
            }
        }
    }
}

/// Implements the relaunch-later protocol.
pub struct DelayScheduler<'a> {
    invocation: &'a Invocation,
    spawner: &'a dyn Spawner,
    sleeper: &'a dyn Sleeper,
}

impl<'a> DelayScheduler<'a> {
    /// Creates a scheduler that respawns `invocation.program`.
    pub fn new(
        invocation: &'a Invocation,
        spawner: &'a dyn Spawner,
        sleeper: &'a dyn Sleeper,
    ) -> Self {
        Self {
            invocation,
            spawner,
            sleeper,
        }
    }

    /// Respawns, sleeps or returns immediately depending on the request's
    /// timing flags.
    pub fn schedule(
        &self,
        request: &ServiceRequest,
        globals: &[String],
    ) -> Result<Schedule, ServiceError> {
        match DelayState::from_flags(request.time, request.delayed) {
            DelayState::Requesting(delay) => {
                let relaunch = Relaunch {
                    request,
                    delay,
                    globals,
                };
                let args = relaunch.to_args();
                let pid =
                    self.spawner
                        .spawn(&self.invocation.program, &args, ChildOutput::Null)?;
                info!("Scheduled '{}' in {delay}s (pid {pid})", request.label());

                let due = i64::try_from(delay)
                    .ok()
                    .and_then(TimeDelta::try_seconds)
                    .and_then(|offset| Local::now().checked_add_signed(offset));

                Ok(Schedule::Respawned {
                    label: request.label(),
                    pid,
                    delay,
                    due,
                })
            }
            DelayState::Delayed(delay) => {
                info!("Waiting {delay}s before '{}'", request.label());
                self.sleeper.sleep(Duration::from_secs(delay));
                Ok(Schedule::Proceed)
            }
            DelayState::Immediate => Ok(Schedule::Proceed),
        }
    }
}
