//! Lifecycle orchestration for managed services.
use std::{io::Write, path::Path};

use tracing::{info, warn};

use crate::{
    daemon::Daemon,
    error::{DaemonError, ServiceError},
    host::OsService,
    prompt::{Answer, ConfirmReader},
    service::{LifecycleAction, ServiceName, ServiceRequest, ValidatedRequest},
};

/// Flag the installed daemon receives in front of its config path.
pub const CONFIG_FLAG: &str = "--config";

const GATEWAY_WARNING: &str = "To provide the maximum level of security, we recommend running immugw on a different machine than immudb server. Continue ?";

/// Confirmation gates of an uninstall after the daemon has been stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UninstallStep {
    ConfirmRemoval,
    ConfirmDataErase,
    RemoveProgramFiles,
    Done,
}

/// Validates `service` commands and drives them against the host's daemon
/// registry. Each step's error aborts the remaining steps; nothing already
/// done is rolled back.
pub struct ServiceLifecycleController<'a> {
    host: &'a dyn OsService,
    prompt: &'a mut dyn ConfirmReader,
    out: &'a mut dyn Write,
}

impl<'a> ServiceLifecycleController<'a> {
    /// Creates a controller that prints daemon messages to `out`.
    pub fn new(
        host: &'a dyn OsService,
        prompt: &'a mut dyn ConfirmReader,
        out: &'a mut dyn Write,
    ) -> Self {
        Self { host, prompt, out }
    }

    /// Checks privileges first, then the service and action names.
    pub fn validate(&self, request: &ServiceRequest) -> Result<ValidatedRequest, ServiceError> {
        if !self.host.is_admin() {
            return Err(ServiceError::InsufficientPrivileges);
        }
        request.validate()
    }

    /// Validates and executes `request`.
    pub fn run(&mut self, request: &ServiceRequest) -> Result<(), ServiceError> {
        let validated = self.validate(request)?;
        self.execute(validated)
    }

    /// Executes an already validated request.
    pub fn execute(&mut self, request: ValidatedRequest) -> Result<(), ServiceError> {
        match request {
            ValidatedRequest::RemoveFiles {
                service,
                local_file,
            } => self.remove_files(&service, local_file.as_deref()),
            ValidatedRequest::Lifecycle {
                service,
                action,
                local_file,
                checksum,
            } => {
                info!("Running '{action}' for {service}");
                match action {
                    LifecycleAction::Install => {
                        self.install(service, local_file.as_deref(), checksum.as_deref())
                    }
                    LifecycleAction::Uninstall => self.uninstall(service),
                    LifecycleAction::Start => {
                        let daemon = self.installed_daemon(service);
                        self.report(&daemon.start()?)
                    }
                    LifecycleAction::Stop => {
                        let daemon = self.installed_daemon(service);
                        self.report(&daemon.stop()?)
                    }
                    LifecycleAction::Restart => {
                        let daemon = self.installed_daemon(service);
                        self.report(&daemon.stop()?)?;
                        self.report(&daemon.start()?)
                    }
                    LifecycleAction::Status => {
                        let daemon = self.installed_daemon(service);
                        self.report(&daemon.status()?)
                    }
                }
            }
        }
    }

    fn report(&mut self, message: &str) -> Result<(), ServiceError> {
        writeln!(self.out, "{message}")?;
        Ok(())
    }

    fn installed_daemon(&self, service: ServiceName) -> Box<dyn Daemon> {
        let exec_path = self.host.default_exec_path(service.as_ref());
        self.host.new_daemon(service, &exec_path)
    }

    fn remove_files(&mut self, service: &str, local_file: Option<&str>) -> Result<(), ServiceError> {
        let name = local_file.unwrap_or(service);
        let Some(file_name) = Path::new(name).file_name().and_then(|n| n.to_str()) else {
            return Err(ServiceError::ExecutableNotFound(name.into()));
        };

        let exec_path = self.host.default_exec_path(file_name);
        self.host.remove_file(&exec_path)?;
        self.report(&format!("Removed {}", exec_path.display()))
    }

    fn install(
        &mut self,
        service: ServiceName,
        local_file: Option<&str>,
        checksum: Option<&str>,
    ) -> Result<(), ServiceError> {
        let staged = self.host.stage_executable(local_file, service, checksum)?;
        let exec_path = self.host.copy_exec_in_os_default(&staged, service)?;

        if service == ServiceName::Immugw
            && self.prompt.confirm(GATEWAY_WARNING, Answer::Yes)? == Answer::No
        {
            return self.report("No action");
        }

        self.report(&format!("installing {}...", exec_path.display()))?;
        self.host.install_setup(service)?;
        let config_path = self.host.default_config_path(service);

        let daemon = self.host.new_daemon(service, &exec_path);
        self.report(&daemon.install(CONFIG_FLAG, &config_path)?)?;
        self.report(&daemon.start()?)
    }

    fn uninstall(&mut self, service: ServiceName) -> Result<(), ServiceError> {
        let daemon = self.installed_daemon(service);

        let status = match daemon.status() {
            Ok(status) => status,
            Err(DaemonError::NotInstalled) => return Err(DaemonError::NotInstalled.into()),
            Err(err) => {
                warn!("Could not read status of {service}: {err}");
                String::new()
            }
        };
        if self.host.is_running(&status) {
            self.report(&daemon.stop()?)?;
        }

        let mut step = UninstallStep::ConfirmRemoval;
        while step != UninstallStep::Done {
            step = self.uninstall_step(step, service, daemon.as_ref())?;
        }
        Ok(())
    }

    fn uninstall_step(
        &mut self,
        step: UninstallStep,
        service: ServiceName,
        daemon: &dyn Daemon,
    ) -> Result<UninstallStep, ServiceError> {
        match step {
            UninstallStep::ConfirmRemoval => {
                let question = format!("Are you sure you want to uninstall {service}?");
                if self.prompt.confirm(&question, Answer::No)? == Answer::No {
                    self.report("No action")?;
                    return Ok(UninstallStep::Done);
                }
                self.report(&daemon.remove()?)?;
                if service.is_primary() {
                    Ok(UninstallStep::ConfirmDataErase)
                } else {
                    Ok(UninstallStep::RemoveProgramFiles)
                }
            }
            UninstallStep::ConfirmDataErase => {
                if self.prompt.confirm("Erase data?", Answer::No)? == Answer::Yes {
                    self.host.erase_data(service)?;
                    self.report("Data folder removed")?;
                } else {
                    self.report("No data removed")?;
                }
                Ok(UninstallStep::RemoveProgramFiles)
            }
            UninstallStep::RemoveProgramFiles => {
                self.host.remove_program_files(service)?;
                self.report("Program files removed")?;
                self.host.uninstall_setup(service)?;
                Ok(UninstallStep::Done)
            }
            UninstallStep::Done => Ok(UninstallStep::Done),
        }
    }
}
