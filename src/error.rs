//! Error handling for immuctl.
use std::path::PathBuf;

use thiserror::Error;

/// Defines all possible errors that can surface from a service command.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The caller lacks the privileges required to manage services.
    #[error("immuctl service commands require root privileges (try running with sudo)")]
    InsufficientPrivileges,

    /// A lifecycle action was not given and `--remove-files` was not requested.
    #[error("required a command name")]
    MissingAction,

    /// The service name is not one of the installable services.
    #[error("invalid service argument specified: {name}. Available list is {allowed:?}")]
    UnknownService {
        /// The rejected service name.
        name: String,
        /// Names the controller accepts.
        allowed: Vec<String>,
    },

    /// The lifecycle action is not one of the known actions.
    #[error("invalid command argument specified: {name}. Available list is {allowed:?}")]
    UnknownAction {
        /// The rejected action name.
        name: String,
        /// Actions the controller accepts.
        allowed: Vec<String>,
    },

    /// Another live process already matches the target executable name.
    #[error("{name} is already running. Pid {pid}")]
    AlreadyRunning {
        /// The process name that was searched for.
        name: String,
        /// PID of the matching process.
        pid: u32,
    },

    /// The process table could not be queried on this platform.
    #[error("Unable to read the process table: {0}")]
    ProcessTable(String),

    /// No executable could be found to install.
    #[error("executable not found: {}", .0.display())]
    ExecutableNotFound(PathBuf),

    /// The staged executable does not match the requested checksum.
    #[error("checksum mismatch for {}: expected {expected}, got {actual}", path.display())]
    ChecksumMismatch {
        /// The file that was hashed.
        path: PathBuf,
        /// Digest requested by the operator.
        expected: String,
        /// Digest computed from the file.
        actual: String,
    },

    /// Downloading a remote executable failed.
    #[error("Failed to fetch executable: {0}")]
    Fetch(#[from] reqwest::Error),

    /// Error returned by the daemon registry.
    #[error(transparent)]
    Daemon(#[from] DaemonError),

    /// Error loading the tool configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Filesystem or process spawning failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Error type for daemon registry operations.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// The service has no registry entry.
    #[error("Service is not installed")]
    NotInstalled,

    /// The service already has a registry entry.
    #[error("Service has already been installed")]
    AlreadyInstalled,

    /// Start requested while the service is active.
    #[error("Service is already running")]
    AlreadyRunning,

    /// Stop requested while the service is inactive.
    #[error("Service has already been stopped")]
    AlreadyStopped,

    /// An external service manager command exited unsuccessfully.
    #[error("`{command}` exited with status {code:?}")]
    CommandFailed {
        /// The command line that was run.
        command: String,
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
    },

    /// Failure reading or writing registry files.
    #[error("Daemon registry I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Error type for configuration file handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error reading the configuration file.
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        /// Path that failed to load.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// Error parsing YAML configuration.
    #[error("Invalid YAML format: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A `${VAR}` reference names an unset environment variable.
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
}
