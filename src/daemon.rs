//! OS daemon registry: register, control and query background services.
use std::{
    fs,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use tracing::{debug, info};

use crate::error::DaemonError;

/// Registry entry for one background service.
///
/// Every call returns the message the underlying service manager reports so
/// callers can print it verbatim.
pub trait Daemon {
    /// Registers the service so it runs `<exec> <config_flag> <config_path>`.
    fn install(&self, config_flag: &str, config_path: &Path) -> Result<String, DaemonError>;
    /// Starts the registered service.
    fn start(&self) -> Result<String, DaemonError>;
    /// Stops the registered service.
    fn stop(&self) -> Result<String, DaemonError>;
    /// Reports whether the service is running.
    fn status(&self) -> Result<String, DaemonError>;
    /// Deregisters the service.
    fn remove(&self) -> Result<String, DaemonError>;
}

const OK: &str = "\t\t\t\t\t[  OK  ]";

/// A systemd unit under `unit_dir`, controlled through `systemctl`.
#[derive(Debug, Clone)]
pub struct SystemdDaemon {
    name: String,
    description: String,
    exec_path: PathBuf,
    user: String,
    unit_dir: PathBuf,
    systemctl: String,
}

impl SystemdDaemon {
    /// Creates a handle; nothing touches the system until a method is called.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        exec_path: PathBuf,
        user: impl Into<String>,
        unit_dir: PathBuf,
        systemctl: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            exec_path,
            user: user.into(),
            unit_dir,
            systemctl: systemctl.into(),
        }
    }

    /// Path of the unit file this daemon owns.
    pub fn unit_path(&self) -> PathBuf {
        self.unit_dir.join(format!("{}.service", self.name))
    }

    fn is_installed(&self) -> bool {
        self.unit_path().exists()
    }

    fn generate_unit_file(&self, config_flag: &str, config_path: &Path) -> String {
        format!(
            r#"[Unit]
Description={description}
After=network-online.target
Wants=network-online.target

[Service]
Type=simple
User={user}
ExecStart={exec} {flag} {config}
Restart=always
RestartSec=10

[Install]
WantedBy=multi-user.target
"#,
            description = self.description,
            user = self.user,
            exec = self.exec_path.display(),
            flag = config_flag,
            config = config_path.display(),
        )
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(&self.systemctl);
        command.args(args).stdin(Stdio::null());
        command
    }

    fn systemctl(&self, args: &[&str]) -> Result<(), DaemonError> {
        debug!("Running {} {}", self.systemctl, args.join(" "));
        let status = self.command(args).stdout(Stdio::null()).status()?;
        if !status.success() {
            return Err(DaemonError::CommandFailed {
                command: format!("{} {}", self.systemctl, args.join(" ")),
                code: status.code(),
            });
        }
        Ok(())
    }

    fn is_active(&self) -> Result<bool, DaemonError> {
        let status = self
            .command(&["is-active", "--quiet", &self.name])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        Ok(status.success())
    }

    fn main_pid(&self) -> Option<u32> {
        let output = self
            .command(&["show", "-p", "MainPID", "--value", &self.name])
            .stderr(Stdio::null())
            .output()
            .ok()?;
        String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|pid| *pid > 0)
    }
}

impl Daemon for SystemdDaemon {
    fn install(&self, config_flag: &str, config_path: &Path) -> Result<String, DaemonError> {
        if self.is_installed() {
            return Err(DaemonError::AlreadyInstalled);
        }

        fs::create_dir_all(&self.unit_dir)?;
        fs::write(
            self.unit_path(),
            self.generate_unit_file(config_flag, config_path),
        )?;
        info!("Wrote unit file {:?}", self.unit_path());

        self.systemctl(&["daemon-reload"])?;
        self.systemctl(&["enable", &self.name])?;
        Ok(format!("Install {}:{OK}", self.description))
    }

    fn start(&self) -> Result<String, DaemonError> {
        if !self.is_installed() {
            return Err(DaemonError::NotInstalled);
        }
        if self.is_active()? {
            return Err(DaemonError::AlreadyRunning);
        }

        self.systemctl(&["start", &self.name])?;
        Ok(format!("Starting {}:{OK}", self.description))
    }

    fn stop(&self) -> Result<String, DaemonError> {
        if !self.is_installed() {
            return Err(DaemonError::NotInstalled);
        }
        if !self.is_active()? {
            return Err(DaemonError::AlreadyStopped);
        }

        self.systemctl(&["stop", &self.name])?;
        Ok(format!("Stopping {}:{OK}", self.description))
    }

    fn status(&self) -> Result<String, DaemonError> {
        if !self.is_installed() {
            return Err(DaemonError::NotInstalled);
        }

        if self.is_active()? {
            match self.main_pid() {
                Some(pid) => Ok(format!("Service (pid  {pid}) is running...")),
                None => Ok("Service is running...".to_string()),
            }
        } else {
            Ok("Service is stopped".to_string())
        }
    }

    fn remove(&self) -> Result<String, DaemonError> {
        if !self.is_installed() {
            return Err(DaemonError::NotInstalled);
        }

        self.systemctl(&["disable", &self.name])?;
        fs::remove_file(self.unit_path())?;
        self.systemctl(&["daemon-reload"])?;
        Ok(format!("Removing {}:{OK}", self.description))
    }
}
