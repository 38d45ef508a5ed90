use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn schema_cmd(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("terrareg-schema").unwrap();
    cmd.env_remove("DATABASE_URL")
        .env("RUST_LOG", "warn")
        .arg("--database")
        .arg(format!("sqlite:///{}", temp_dir.path().join("modules.db").display()));
    cmd
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("terrareg-schema").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Schema migrations for the terrareg module registry"));
}

#[test]
fn test_cli_heads_needs_no_database() {
    let mut cmd = Command::cargo_bin("terrareg-schema").unwrap();
    cmd.arg("heads").assert().success().stdout(predicate::str::contains("47e45e505e22 (head)"));
}

#[test]
fn test_cli_upgrade_then_current() {
    let temp_dir = TempDir::new().unwrap();

    schema_cmd(&temp_dir)
        .arg("upgrade")
        .assert()
        .success()
        .stdout(predicate::str::contains("upgrade base -> 47e45e505e22 (2 steps)"));

    schema_cmd(&temp_dir)
        .arg("current")
        .assert()
        .success()
        .stdout(predicate::str::contains("47e45e505e22 (head)"));
}

#[test]
fn test_cli_logs_to_stderr_only() {
    let temp_dir = TempDir::new().unwrap();

    schema_cmd(&temp_dir)
        .env("RUST_LOG", "info")
        .arg("upgrade")
        .assert()
        .success()
        .stderr(predicate::str::contains("Upgrading database schema"))
        .stderr(predicate::str::contains("Upgrade finished"))
        .stdout(predicate::str::contains("Upgrading").not());
}

#[test]
fn test_cli_downgrade_relative_and_json() {
    let temp_dir = TempDir::new().unwrap();
    schema_cmd(&temp_dir).arg("upgrade").assert().success();

    schema_cmd(&temp_dir)
        .args(["--json", "downgrade", "-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"to\": \"a36ffbb6580e\""))
        .stdout(predicate::str::contains("\"direction\": \"downgrade\""));

    schema_cmd(&temp_dir)
        .args(["current", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"current\":\"a36ffbb6580e\""));
}

#[test]
fn test_cli_history_marks_current() {
    let temp_dir = TempDir::new().unwrap();
    schema_cmd(&temp_dir).args(["upgrade", "a36f"]).assert().success();

    schema_cmd(&temp_dir)
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("a36ffbb6580e -> 47e45e505e22 (head),"))
        .stdout(predicate::str::contains("<base> -> a36ffbb6580e (current),"));
}

#[test]
fn test_cli_stamp_and_noop_upgrade() {
    let temp_dir = TempDir::new().unwrap();

    schema_cmd(&temp_dir)
        .args(["stamp", "head"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Stamped 47e45e505e22"));

    schema_cmd(&temp_dir)
        .arg("upgrade")
        .assert()
        .success()
        .stdout(predicate::str::contains("Already at 47e45e505e22"));
}

#[test]
fn test_cli_rejects_bad_targets() {
    let temp_dir = TempDir::new().unwrap();

    schema_cmd(&temp_dir).args(["upgrade", "not-a-revision"]).assert().failure();

    schema_cmd(&temp_dir)
        .args(["downgrade", "head"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot downgrade"));
}

#[test]
fn test_cli_rejects_unsupported_database() {
    let mut cmd = Command::cargo_bin("terrareg-schema").unwrap();
    cmd.args(["--database", "mysql://root@localhost/terrareg", "current"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported database url"));
}
