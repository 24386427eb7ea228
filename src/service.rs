//! Managed service names, lifecycle actions and the per-invocation request.
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::error::ServiceError;

/// Services that can be installed on a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum ServiceName {
    /// The database server.
    Immudb,
    /// The gateway, meant to run on a separate host.
    Immugw,
}

impl ServiceName {
    /// Whether this is the database server that owns a data directory.
    pub fn is_primary(&self) -> bool {
        matches!(self, ServiceName::Immudb)
    }

    /// Human-readable description used in daemon units.
    pub fn description(&self) -> &'static str {
        match self {
            ServiceName::Immudb => "immudb immutable database",
            ServiceName::Immugw => "immugw gateway for immudb",
        }
    }

    /// Port written into a freshly generated server config.
    pub fn default_port(&self) -> u16 {
        match self {
            ServiceName::Immudb => 3322,
            ServiceName::Immugw => 3323,
        }
    }

    /// Every accepted service name, in declaration order.
    pub fn allowed() -> Vec<String> {
        Self::iter().map(|name| name.to_string()).collect()
    }

    /// Parses a command-line service name.
    pub fn from_arg(name: &str) -> Result<Self, ServiceError> {
        name.parse().map_err(|_| ServiceError::UnknownService {
            name: name.to_string(),
            allowed: Self::allowed(),
        })
    }
}

/// Operator-invoked verbs applied to a managed service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum LifecycleAction {
    /// Register and start the service.
    Install,
    /// Stop and deregister the service.
    Uninstall,
    /// Start the service.
    Start,
    /// Stop the service.
    Stop,
    /// Stop, then start the service.
    Restart,
    /// Report the service state.
    Status,
}

impl LifecycleAction {
    /// Every accepted action name, in declaration order.
    pub fn allowed() -> Vec<String> {
        Self::iter().map(|action| action.to_string()).collect()
    }
}

/// A `service` command as typed by the operator, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceRequest {
    /// Raw service name.
    pub service: String,
    /// Raw action name; optional only together with `remove_files`.
    pub action: Option<String>,
    /// Seconds to wait before running the action.
    pub time: u64,
    /// Seconds this instance was asked to wait by its parent.
    pub delayed: u64,
    /// Skip lifecycle validation and remove the installed executable.
    pub remove_files: bool,
    /// Source of the executable to install (path or http(s) URL).
    pub local_file: Option<String>,
    /// Expected SHA-256 of the executable to install.
    pub checksum: Option<String>,
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatedRequest {
    /// Maintenance escape hatch: only removes installed program files.
    RemoveFiles {
        /// Unvalidated service name.
        service: String,
        /// Optional executable name override.
        local_file: Option<String>,
    },
    /// One of the six lifecycle actions against a known service.
    Lifecycle {
        /// The managed service.
        service: ServiceName,
        /// The requested action.
        action: LifecycleAction,
        /// Source of the executable to install.
        local_file: Option<String>,
        /// Expected SHA-256 of the executable to install.
        checksum: Option<String>,
    },
}

impl ServiceRequest {
    /// Checks the service and action names. `--remove-files` bypasses both.
    pub fn validate(&self) -> Result<ValidatedRequest, ServiceError> {
        if self.remove_files {
            return Ok(ValidatedRequest::RemoveFiles {
                service: self.service.clone(),
                local_file: self.local_file.clone(),
            });
        }

        let service = ServiceName::from_arg(&self.service)?;

        let raw_action = self.action.as_deref().ok_or(ServiceError::MissingAction)?;
        let action = raw_action.parse::<LifecycleAction>().map_err(|_| {
            ServiceError::UnknownAction {
                name: raw_action.to_string(),
                allowed: LifecycleAction::allowed(),
            }
        })?;

        Ok(ValidatedRequest::Lifecycle {
            service,
            action,
            local_file: self.local_file.clone(),
            checksum: self.checksum.clone(),
        })
    }

    /// Short label used in log lines and schedule notices.
    pub fn label(&self) -> String {
        match &self.action {
            Some(action) => format!("{} {}", self.service, action),
            None => self.service.clone(),
        }
    }
}
