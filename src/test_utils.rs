use std::{
    collections::HashSet,
    io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, OnceLock},
    time::Duration,
};

use crate::{
    daemon::Daemon,
    error::{DaemonError, ServiceError},
    host::OsService,
    launcher::{ChildOutput, Sleeper, Spawner},
    process::{ProcessRecord, ProcessTable},
    service::ServiceName,
};

/// Global lock for environment variable modifications in tests.
pub static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Fixed process table.
pub struct StaticTable {
    records: Option<Vec<ProcessRecord>>,
}

impl StaticTable {
    pub fn new(records: Vec<ProcessRecord>) -> Self {
        Self {
            records: Some(records),
        }
    }

    pub fn failing() -> Self {
        Self { records: None }
    }
}

impl ProcessTable for StaticTable {
    fn processes(&self) -> Result<Vec<ProcessRecord>, ServiceError> {
        self.records
            .clone()
            .ok_or_else(|| ServiceError::ProcessTable("permission denied".into()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnCall {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub output: ChildOutput,
}

/// Records spawns instead of starting processes.
#[derive(Default)]
pub struct RecordingSpawner {
    pid: u32,
    fail: bool,
    calls: Mutex<Vec<SpawnCall>>,
}

impl RecordingSpawner {
    pub fn with_pid(pid: u32) -> Self {
        Self {
            pid,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<SpawnCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Spawner for RecordingSpawner {
    fn spawn(&self, program: &Path, args: &[String], output: ChildOutput) -> io::Result<u32> {
        self.calls.lock().unwrap().push(SpawnCall {
            program: program.to_path_buf(),
            args: args.to_vec(),
            output,
        });
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such program"));
        }
        Ok(self.pid)
    }
}

/// Records sleeps instead of blocking.
#[derive(Default)]
pub struct RecordingSleeper {
    calls: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn calls(&self) -> Vec<Duration> {
        self.calls.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.calls.lock().unwrap().push(duration);
    }
}

/// Everything the fake host and its daemons were asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Stage(Option<String>),
    Copy(PathBuf),
    InstallSetup(ServiceName),
    UninstallSetup(ServiceName),
    EraseData(ServiceName),
    RemoveProgramFiles(ServiceName),
    RemoveFile(PathBuf),
    NewDaemon(ServiceName, PathBuf),
    Install(String, PathBuf),
    Start,
    Stop,
    Status,
    Remove,
}

/// In-memory host whose daemons share its call log.
#[derive(Clone)]
pub struct FakeHost {
    pub admin: bool,
    /// Status message reported by daemons; `None` means not installed.
    pub status: Option<String>,
    /// Daemon operations that fail (`"install"`, `"start"`, ...).
    pub failing: HashSet<&'static str>,
    pub calls: Arc<Mutex<Vec<Call>>>,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self {
            admin: true,
            status: Some("Service (pid  99) is running...".into()),
            failing: HashSet::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl FakeHost {
    pub fn failing(mut self, op: &'static str) -> Self {
        self.failing.insert(op);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Daemon calls only, without host bookkeeping.
    pub fn daemon_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| {
                matches!(
                    call,
                    Call::Install(..) | Call::Start | Call::Stop | Call::Status | Call::Remove
                )
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl OsService for FakeHost {
    fn is_admin(&self) -> bool {
        self.admin
    }

    fn stage_executable(
        &self,
        local_file: Option<&str>,
        service: ServiceName,
        _checksum: Option<&str>,
    ) -> Result<PathBuf, ServiceError> {
        self.record(Call::Stage(local_file.map(Into::into)));
        Ok(PathBuf::from("/tmp/staging").join(service.as_ref()))
    }

    fn default_exec_path(&self, name: &str) -> PathBuf {
        PathBuf::from("/usr/sbin").join(name)
    }

    fn copy_exec_in_os_default(
        &self,
        staged: &Path,
        service: ServiceName,
    ) -> Result<PathBuf, ServiceError> {
        self.record(Call::Copy(staged.to_path_buf()));
        Ok(self.default_exec_path(service.as_ref()))
    }

    fn default_config_path(&self, service: ServiceName) -> PathBuf {
        PathBuf::from(format!("/etc/{service}/{service}.yaml"))
    }

    fn install_setup(&self, service: ServiceName) -> Result<(), ServiceError> {
        self.record(Call::InstallSetup(service));
        Ok(())
    }

    fn uninstall_setup(&self, service: ServiceName) -> Result<(), ServiceError> {
        self.record(Call::UninstallSetup(service));
        Ok(())
    }

    fn erase_data(&self, service: ServiceName) -> Result<(), ServiceError> {
        self.record(Call::EraseData(service));
        Ok(())
    }

    fn remove_program_files(&self, service: ServiceName) -> Result<(), ServiceError> {
        self.record(Call::RemoveProgramFiles(service));
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<(), ServiceError> {
        self.record(Call::RemoveFile(path.to_path_buf()));
        Ok(())
    }

    fn is_running(&self, status: &str) -> bool {
        status.contains("is running")
    }

    fn new_daemon(&self, service: ServiceName, exec_path: &Path) -> Box<dyn Daemon> {
        self.record(Call::NewDaemon(service, exec_path.to_path_buf()));
        Box::new(FakeDaemon { host: self.clone() })
    }
}

struct FakeDaemon {
    host: FakeHost,
}

impl FakeDaemon {
    fn op(&self, call: Call, name: &'static str) -> Result<String, DaemonError> {
        self.host.record(call);
        if self.host.failing.contains(name) {
            return Err(DaemonError::CommandFailed {
                command: format!("systemctl {name}"),
                code: Some(1),
            });
        }
        Ok(format!("{name} ok"))
    }
}

impl Daemon for FakeDaemon {
    fn install(&self, config_flag: &str, config_path: &Path) -> Result<String, DaemonError> {
        self.op(
            Call::Install(config_flag.to_string(), config_path.to_path_buf()),
            "install",
        )
    }

    fn start(&self) -> Result<String, DaemonError> {
        self.op(Call::Start, "start")
    }

    fn stop(&self) -> Result<String, DaemonError> {
        self.op(Call::Stop, "stop")
    }

    fn status(&self) -> Result<String, DaemonError> {
        self.host.record(Call::Status);
        if self.host.failing.contains("status") {
            return Err(DaemonError::CommandFailed {
                command: "systemctl status".into(),
                code: Some(3),
            });
        }
        self.host.status.clone().ok_or(DaemonError::NotInstalled)
    }

    fn remove(&self) -> Result<String, DaemonError> {
        self.op(Call::Remove, "remove")
    }
}
