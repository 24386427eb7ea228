//! Process table scanning used to detect duplicate instances.
use std::path::PathBuf;

use sysinfo::{ProcessesToUpdate, System};
use tracing::debug;

use crate::error::ServiceError;

/// A single entry of the live process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    /// Process ID.
    pub pid: u32,
    /// Executable name as reported by the OS.
    pub name: String,
    /// Absolute executable path, when readable.
    pub exe: Option<PathBuf>,
}

impl ProcessRecord {
    /// Name used for matching: the executable's file name when known, the
    /// reported process name otherwise (which Linux truncates to 15 bytes).
    pub fn executable(&self) -> String {
        self.exe
            .as_ref()
            .and_then(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.clone())
    }
}

/// Source of process records.
pub trait ProcessTable {
    /// Lists every process visible to the current user.
    fn processes(&self) -> Result<Vec<ProcessRecord>, ServiceError>;
}

/// Process table backed by `sysinfo`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessTable;

impl ProcessTable for SystemProcessTable {
    fn processes(&self) -> Result<Vec<ProcessRecord>, ServiceError> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(ServiceError::ProcessTable(
                "process listing is not supported on this platform".into(),
            ));
        }

        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);

        let mut records: Vec<ProcessRecord> = system
            .processes()
            .iter()
            .map(|(pid, process)| ProcessRecord {
                pid: pid.as_u32(),
                name: process.name().to_string_lossy().into_owned(),
                exe: process.exe().map(|path| path.to_path_buf()),
            })
            .collect();
        records.sort_by_key(|record| record.pid);
        Ok(records)
    }
}

/// Answers "is an instance of executable X already running?".
///
/// Matching is a substring test on the executable name so platform suffixes
/// such as `.exe` still match. Unrelated processes that share the substring
/// are reported as matches too.
pub struct ProcessScanner<T: ProcessTable = SystemProcessTable> {
    table: T,
}

impl ProcessScanner<SystemProcessTable> {
    /// Scanner over the live OS process table.
    pub fn system() -> Self {
        Self::new(SystemProcessTable)
    }
}

impl<T: ProcessTable> ProcessScanner<T> {
    /// Creates a scanner over the given table.
    pub fn new(table: T) -> Self {
        Self { table }
    }

    /// Returns the first process whose executable name contains `needle`.
    pub fn find_by_name(&self, needle: &str) -> Result<Option<ProcessRecord>, ServiceError> {
        let found = self
            .table
            .processes()?
            .into_iter()
            .find(|record| record.executable().contains(needle));

        if let Some(record) = &found {
            debug!("Process '{}' matches '{needle}' (pid {})", record.name, record.pid);
        }

        Ok(found)
    }
}
