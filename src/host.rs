//! Host-level collaborator: privileges, paths and program files of the
//! managed services.
use std::{
    env, fs,
    io::{self, Read},
    os::unix::{fs::PermissionsExt, process::CommandExt},
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use nix::unistd::{User, chown, geteuid};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::{
    config::ToolConfig,
    daemon::{Daemon, SystemdDaemon},
    error::ServiceError,
    service::ServiceName,
};

/// Operations the lifecycle controller needs from the host.
pub trait OsService {
    /// Whether the caller may manage services.
    fn is_admin(&self) -> bool;

    /// Resolves or fetches the executable to install and returns its local path.
    fn stage_executable(
        &self,
        local_file: Option<&str>,
        service: ServiceName,
        checksum: Option<&str>,
    ) -> Result<PathBuf, ServiceError>;

    /// Where `name` is installed.
    fn default_exec_path(&self, name: &str) -> PathBuf;

    /// Copies a staged executable to its install location.
    fn copy_exec_in_os_default(
        &self,
        staged: &Path,
        service: ServiceName,
    ) -> Result<PathBuf, ServiceError>;

    /// Config file handed to the service on start.
    fn default_config_path(&self, service: ServiceName) -> PathBuf;

    /// Creates the service account, directories and a default config.
    fn install_setup(&self, service: ServiceName) -> Result<(), ServiceError>;

    /// Removes the records created by [`OsService::install_setup`].
    fn uninstall_setup(&self, service: ServiceName) -> Result<(), ServiceError>;

    /// Deletes the service's persisted data.
    fn erase_data(&self, service: ServiceName) -> Result<(), ServiceError>;

    /// Deletes the installed executable and logs.
    fn remove_program_files(&self, service: ServiceName) -> Result<(), ServiceError>;

    /// Deletes a single installed file; used by `--remove-files`.
    fn remove_file(&self, path: &Path) -> Result<(), ServiceError>;

    /// Whether a status message reports a running service.
    fn is_running(&self, status: &str) -> bool;

    /// Registry entry for `service` pointing at `exec_path`.
    fn new_daemon(&self, service: ServiceName, exec_path: &Path) -> Box<dyn Daemon>;
}

/// Default server settings written on install.
#[derive(Debug, Serialize)]
struct ServerDefaults {
    dir: PathBuf,
    logfile: PathBuf,
    address: String,
    port: u16,
}

/// Linux host with systemd, laid out by [`ToolConfig`].
#[derive(Debug, Clone)]
pub struct LinuxHost {
    config: ToolConfig,
}

impl LinuxHost {
    /// Creates a host over the given layout.
    pub fn new(config: ToolConfig) -> Self {
        Self { config }
    }

    fn config_dir(&self, service: ServiceName) -> PathBuf {
        self.config.config_root.join(service.as_ref())
    }

    fn data_dir(&self, service: ServiceName) -> PathBuf {
        self.config.data_root.join(service.as_ref())
    }

    fn log_dir(&self, service: ServiceName) -> PathBuf {
        self.config.log_root.join(service.as_ref())
    }

    fn fetch(&self, url: &str, service: ServiceName) -> Result<PathBuf, ServiceError> {
        fs::create_dir_all(&self.config.staging_dir)?;
        let target = self.config.staging_dir.join(service.as_ref());

        info!("Fetching {service} from {url}");
        let response = reqwest::blocking::get(url)?.error_for_status()?;
        let bytes = response.bytes()?;
        fs::write(&target, &bytes)?;
        fs::set_permissions(&target, fs::Permissions::from_mode(0o755))?;
        debug!("Staged {} bytes at {:?}", bytes.len(), target);
        Ok(target)
    }

    fn ensure_user(&self) -> Result<(), ServiceError> {
        let user = &self.config.service_user;
        let exists = Command::new("id")
            .arg(user)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false);
        if exists {
            return Ok(());
        }

        info!("Creating system user: {user}");
        let status = Command::new("useradd")
            .args(["--system", "--no-create-home", "--shell", "/usr/sbin/nologin"])
            .arg(user)
            .status()?;
        if !status.success() {
            return Err(io::Error::other(format!(
                "useradd {user} failed with exit code {:?}",
                status.code()
            ))
            .into());
        }
        Ok(())
    }

    /// Hands `path` to the service account so the unit can write to it.
    fn chown_to_service_user(&self, path: &Path) -> Result<(), ServiceError> {
        let name = &self.config.service_user;
        let user = User::from_name(name)
            .map_err(io::Error::from)?
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no such user: {name}"))
            })?;
        chown(path, Some(user.uid), Some(user.gid)).map_err(io::Error::from)?;
        debug!("Changed owner of {:?} to {name}", path);
        Ok(())
    }

    /// Replaces this process with the installed service executable.
    /// Returns only if the exec fails.
    pub fn exec_foreground(&self, service: ServiceName, args: &[String]) -> ServiceError {
        let exec_path = self.default_exec_path(service.as_ref());
        if !exec_path.exists() {
            return ServiceError::ExecutableNotFound(exec_path);
        }

        info!("Running {:?} in the foreground", exec_path);
        let err = Command::new(&exec_path)
            .arg("--config")
            .arg(self.default_config_path(service))
            .args(args)
            .exec();
        ServiceError::Io(err)
    }
}

impl OsService for LinuxHost {
    fn is_admin(&self) -> bool {
        geteuid().is_root()
    }

    fn stage_executable(
        &self,
        local_file: Option<&str>,
        service: ServiceName,
        checksum: Option<&str>,
    ) -> Result<PathBuf, ServiceError> {
        let staged = match local_file {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
                self.fetch(url, service)?
            }
            Some(path) => PathBuf::from(path),
            None => {
                let current = env::current_exe()?;
                let dir = current.parent().unwrap_or_else(|| Path::new("."));
                dir.join(service.as_ref())
            }
        };

        if !staged.is_file() {
            return Err(ServiceError::ExecutableNotFound(staged));
        }
        if let Some(expected) = checksum {
            verify_checksum(&staged, expected)?;
        }
        Ok(staged)
    }

    fn default_exec_path(&self, name: &str) -> PathBuf {
        self.config.install_dir.join(name)
    }

    fn copy_exec_in_os_default(
        &self,
        staged: &Path,
        service: ServiceName,
    ) -> Result<PathBuf, ServiceError> {
        let target = self.default_exec_path(service.as_ref());
        if staged == target {
            return Ok(target);
        }

        fs::create_dir_all(&self.config.install_dir)?;
        fs::copy(staged, &target)?;
        fs::set_permissions(&target, fs::Permissions::from_mode(0o755))?;
        info!("Copied {:?} to {:?}", staged, target);
        Ok(target)
    }

    fn default_config_path(&self, service: ServiceName) -> PathBuf {
        self.config_dir(service)
            .join(format!("{}.yaml", service.as_ref()))
    }

    fn install_setup(&self, service: ServiceName) -> Result<(), ServiceError> {
        self.ensure_user()?;

        for dir in [
            self.config_dir(service),
            self.data_dir(service),
            self.log_dir(service),
        ] {
            fs::create_dir_all(&dir)?;
        }
        self.chown_to_service_user(&self.data_dir(service))?;
        self.chown_to_service_user(&self.log_dir(service))?;

        let config_path = self.default_config_path(service);
        if config_path.exists() {
            debug!("Keeping existing config {:?}", config_path);
            return Ok(());
        }

        let defaults = ServerDefaults {
            dir: self.data_dir(service),
            logfile: self.log_dir(service).join(format!("{}.log", service.as_ref())),
            address: "0.0.0.0".to_string(),
            port: service.default_port(),
        };
        let yaml = serde_yaml::to_string(&defaults)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        fs::write(&config_path, yaml)?;
        self.chown_to_service_user(&config_path)?;
        info!("Wrote default config {:?}", config_path);
        Ok(())
    }

    fn uninstall_setup(&self, service: ServiceName) -> Result<(), ServiceError> {
        remove_dir_if_present(&self.config_dir(service))
    }

    fn erase_data(&self, service: ServiceName) -> Result<(), ServiceError> {
        remove_dir_if_present(&self.data_dir(service))
    }

    fn remove_program_files(&self, service: ServiceName) -> Result<(), ServiceError> {
        self.remove_file(&self.default_exec_path(service.as_ref()))?;
        remove_dir_if_present(&self.log_dir(service))
    }

    fn remove_file(&self, path: &Path) -> Result<(), ServiceError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!("{:?} already removed", path);
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn is_running(&self, status: &str) -> bool {
        status.contains("is running")
    }

    fn new_daemon(&self, service: ServiceName, exec_path: &Path) -> Box<dyn Daemon> {
        Box::new(SystemdDaemon::new(
            service.as_ref(),
            service.description(),
            exec_path.to_path_buf(),
            self.config.service_user.clone(),
            self.config.unit_dir.clone(),
            self.config.systemctl.clone(),
        ))
    }
}

fn remove_dir_if_present(dir: &Path) -> Result<(), ServiceError> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn verify_checksum(path: &Path, expected: &str) -> Result<(), ServiceError> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    let actual: String = hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect();
    if !actual.eq_ignore_ascii_case(expected.trim()) {
        return Err(ServiceError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}
