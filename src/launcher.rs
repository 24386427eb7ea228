//! Relaunching the current executable as a new OS process.
use std::{
    env,
    io::{self, Write},
    os::unix::process::CommandExt,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    thread,
    time::Duration,
};

use tracing::{debug, info};

use crate::{
    error::ServiceError,
    process::{ProcessScanner, ProcessTable},
};

/// Long form of the flag that requests a detached launch.
pub const DETACHED_FLAG: &str = "--detached";

/// Short form of the flag that requests a detached launch.
pub const DETACHED_SHORT_FLAG: &str = "-d";

const GREEN: &str = "\x1b[32m";
const BLUE: &str = "\x1b[34m";
const RESET: &str = "\x1b[0m";

/// The command line this process was started with, captured once at the
/// entry point and passed explicitly to anything that relaunches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Executable that relaunches start.
    pub program: PathBuf,
    /// Arguments after `argv[0]`.
    pub args: Vec<String>,
}

impl Invocation {
    /// Creates an invocation from explicit parts.
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Captures the process arguments. The program is the resolved path of
    /// the running executable, not `argv[0]`.
    pub fn from_env() -> io::Result<Self> {
        let program = env::current_exe()?;
        Ok(Self::new(program, env::args().skip(1).collect()))
    }
}

/// Removes every `--detached`/`-d` token, keeping the remaining order.
pub fn strip_detached_args(args: &[String]) -> Vec<String> {
    args.iter()
        .filter(|arg| *arg != DETACHED_FLAG && *arg != DETACHED_SHORT_FLAG)
        .cloned()
        .collect()
}

/// Where a spawned child's stdout/stderr go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildOutput {
    /// Share the parent's streams.
    Inherit,
    /// Discard output and move the child into its own process group.
    Null,
}

/// Starts a process without waiting for it.
pub trait Spawner {
    /// Spawns `program` with `args` and returns the child PID.
    fn spawn(&self, program: &Path, args: &[String], output: ChildOutput) -> io::Result<u32>;
}

/// Spawner backed by `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsSpawner;

impl Spawner for OsSpawner {
    fn spawn(&self, program: &Path, args: &[String], output: ChildOutput) -> io::Result<u32> {
        let mut command = Command::new(program);
        command.args(args).stdin(Stdio::null());

        match output {
            ChildOutput::Inherit => {
                command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
            ChildOutput::Null => {
                command
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .process_group(0);
            }
        }

        let child = command.spawn()?;
        debug!("Spawned {:?} {:?} as pid {}", program, args, child.id());
        Ok(child.id())
    }
}

/// Blocks the current thread.
pub trait Sleeper {
    /// Sleeps for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Sleeper backed by `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Outcome of a successful detached launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launched {
    /// PID of the new process.
    pub pid: u32,
    /// Executable that was started.
    pub executable: PathBuf,
}

/// Starts the current executable again in the background after checking
/// that no process with the target name is already running.
pub struct DetachedLauncher<'a, T: ProcessTable> {
    scanner: ProcessScanner<T>,
    spawner: &'a dyn Spawner,
    sleeper: &'a dyn Sleeper,
    settle: Duration,
}

impl<'a, T: ProcessTable> DetachedLauncher<'a, T> {
    /// Creates a launcher. `settle` is the pause after spawning before the
    /// launch is reported.
    pub fn new(
        scanner: ProcessScanner<T>,
        spawner: &'a dyn Spawner,
        sleeper: &'a dyn Sleeper,
        settle: Duration,
    ) -> Self {
        Self {
            scanner,
            spawner,
            sleeper,
            settle,
        }
    }

    /// Relaunches this executable with the detached flags removed.
    pub fn launch_detached(
        &self,
        invocation: &Invocation,
        process_name: &str,
        out: &mut dyn Write,
    ) -> Result<Launched, ServiceError> {
        let executable = &invocation.program;

        if let Some(existing) = self.scanner.find_by_name(process_name)? {
            return Err(ServiceError::AlreadyRunning {
                name: process_name.to_string(),
                pid: existing.pid,
            });
        }

        let args = strip_detached_args(&invocation.args);
        let pid = self.spawner.spawn(executable, &args, ChildOutput::Inherit)?;
        self.sleeper.sleep(self.settle);

        let name = executable
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| executable.display().to_string());
        info!("Detached {name} as pid {pid}");
        writeln!(
            out,
            "{GREEN}{name} has been started with {BLUE}PID {pid}{RESET}"
        )?;

        Ok(Launched {
            pid,
            executable: executable.clone(),
        })
    }
}
