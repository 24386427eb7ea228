#![allow(dead_code)]

use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

/// Writes an immuctl config that keeps every managed path under `root`.
pub fn write_layout_config(root: &Path) -> PathBuf {
    let config = root.join("immuctl.yaml");
    fs::write(
        &config,
        format!(
            r#"install_dir: {root}/bin
config_root: {root}/etc
data_root: {root}/lib
log_root: {root}/log
unit_dir: {root}/units
staging_dir: {root}/staging
systemctl: "false"
settle_secs: 0
"#,
            root = root.display()
        ),
    )
    .expect("failed to write config");
    config
}

/// Installs an executable shell script as `<root>/bin/<name>`.
pub fn install_script(root: &Path, name: &str, body: &str) -> PathBuf {
    let bin = root.join("bin");
    fs::create_dir_all(&bin).expect("failed to create bin dir");
    let path = bin.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("failed to write script");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
        .expect("failed to chmod script");
    path
}

pub fn is_root() -> bool {
    nix::unistd::geteuid().is_root()
}

pub fn wait_for_path(path: &Path) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if path.exists() {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }
    false
}
