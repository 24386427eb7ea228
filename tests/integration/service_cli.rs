#[path = "common/mod.rs"]
mod common;

use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use tempfile::tempdir;

fn immuctl() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("immuctl"))
}

#[test]
fn help_lists_time_but_hides_delay_marker() {
    immuctl()
        .args(["service", "--help"])
        .assert()
        .success()
        .stdout(contains("--time").and(contains("--delayed").not()))
        .stdout(contains("immuctl service immudb restart --time 20"));
}

#[test]
fn unknown_service_fails_before_any_action() {
    let temp = tempdir().expect("failed to create tempdir");
    let config = common::write_layout_config(temp.path());

    let expected = if common::is_root() {
        "invalid service argument specified: bogus"
    } else {
        "require root privileges"
    };

    immuctl()
        .arg("--config")
        .arg(&config)
        .args(["service", "bogus", "status"])
        .assert()
        .failure()
        .stderr(contains(expected));

    assert!(!temp.path().join("units").exists());
}

#[test]
fn unprivileged_delay_request_is_rejected_without_respawn() {
    if common::is_root() {
        return;
    }
    let temp = tempdir().expect("failed to create tempdir");
    let config = common::write_layout_config(temp.path());

    immuctl()
        .arg("--config")
        .arg(&config)
        .args(["service", "immudb", "restart", "--time", "10"])
        .assert()
        .failure()
        .stderr(contains("require root privileges"))
        .stdout(contains("scheduled").not());
}

#[test]
fn missing_config_file_is_reported() {
    let temp = tempdir().expect("failed to create tempdir");
    let missing = temp.path().join("absent.yaml");

    immuctl()
        .arg("--config")
        .arg(&missing)
        .args(["service", "immudb", "status"])
        .assert()
        .failure()
        .stderr(contains("Failed to read config file"));
}

#[test]
fn status_of_uninstalled_service_as_root() {
    if !common::is_root() {
        return;
    }
    let temp = tempdir().expect("failed to create tempdir");
    let config = common::write_layout_config(temp.path());

    immuctl()
        .arg("--config")
        .arg(&config)
        .args(["service", "immugw", "status"])
        .assert()
        .failure()
        .stderr(contains("Service is not installed"));
}

#[test]
fn remove_files_as_root_deletes_installed_binary() {
    if !common::is_root() {
        return;
    }
    let temp = tempdir().expect("failed to create tempdir");
    let config = common::write_layout_config(temp.path());
    let script = common::install_script(temp.path(), "leftover", "exit 0");

    immuctl()
        .arg("--config")
        .arg(&config)
        .args(["service", "leftover", "--remove-files"])
        .assert()
        .success()
        .stdout(contains("Removed"));

    assert!(!script.exists());
}
