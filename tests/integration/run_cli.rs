#[path = "common/mod.rs"]
mod common;

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::tempdir;

fn immuctl() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("immuctl"))
}

#[test]
fn run_rejects_unknown_service() {
    immuctl()
        .args(["run", "bogus"])
        .assert()
        .failure()
        .stderr(contains("Available list is [\"immudb\", \"immugw\"]"));
}

#[test]
fn run_requires_installed_executable() {
    let temp = tempdir().expect("failed to create tempdir");
    let config = common::write_layout_config(temp.path());

    immuctl()
        .arg("--config")
        .arg(&config)
        .args(["run", "immudb"])
        .assert()
        .failure()
        .stderr(contains("executable not found"));
}

#[test]
fn run_execs_service_with_config_and_extra_args() {
    let temp = tempdir().expect("failed to create tempdir");
    let config = common::write_layout_config(temp.path());
    common::install_script(temp.path(), "immudb", r#"echo "args: $@""#);

    let expected = format!(
        "args: --config {}/etc/immudb/immudb.yaml --port 3999",
        temp.path().display()
    );

    immuctl()
        .arg("--config")
        .arg(&config)
        .args(["run", "immudb", "--", "--port", "3999"])
        .assert()
        .success()
        .stdout(contains(expected));
}

#[test]
fn detached_run_relaunches_in_background() {
    let temp = tempdir().expect("failed to create tempdir");
    let config = common::write_layout_config(temp.path());
    let marker = temp.path().join("started");
    common::install_script(
        temp.path(),
        "immugw",
        &format!("touch {}", marker.display()),
    );

    immuctl()
        .arg("--config")
        .arg(&config)
        .args(["run", "immugw", "--detached"])
        .assert()
        .success()
        .stdout(contains("has been started with"));

    assert!(common::wait_for_path(&marker), "detached child never ran");
}
