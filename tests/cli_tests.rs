//! CLI surface tests

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn test_help_lists_subcommands() {
    Command::cargo_bin("daydigest")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run").and(predicate::str::contains("status")));
}

#[test]
fn test_run_fails_with_missing_config() {
    Command::cargo_bin("daydigest")
        .unwrap()
        .args(["run", "--config", "/nonexistent/daydigest.yml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read config"));
}

#[test]
fn test_status_reports_missing_run() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("daydigest.yml");
    std::fs::write(
        &config_path,
        format!(
            "records_path: {}\nstate_dir: {}\n",
            temp_dir.path().join("records.json").display(),
            temp_dir.path().join("state").display()
        ),
    )
    .unwrap();

    Command::cargo_bin("daydigest")
        .unwrap()
        .args(["status", "--date", "2024-03-14"])
        .args(["--config", config_path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("No run recorded for 2024-03-14"));
}

#[test]
fn test_run_executes_pipeline_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let records_path = temp_dir.path().join("records.json");
    std::fs::write(
        &records_path,
        r#"[
            {"id": "r1", "owner_id": "A", "owner_name": "Agent A",
             "occurred_on": "2024-03-14", "amount": "100", "approver_id": "S1"}
        ]"#,
    )
    .unwrap();

    let config_path = temp_dir.path().join("daydigest.yml");
    std::fs::write(
        &config_path,
        format!(
            "records_path: {}\nstate_dir: {}\n",
            records_path.display(),
            temp_dir.path().join("state").display()
        ),
    )
    .unwrap();

    // No webhook configured: notifications go to the console dispatcher.
    Command::cargo_bin("daydigest")
        .unwrap()
        .args(["run", "--date", "2024-03-14"])
        .args(["--config", config_path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("records fetched:      1")
                .and(predicate::str::contains("dispatched:           1")),
        );

    // A second invocation resumes from the checkpoint and dispatches nothing.
    Command::cargo_bin("daydigest")
        .unwrap()
        .args(["run", "--date", "2024-03-14"])
        .args(["--config", config_path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("dispatched:           0 (1 already dispatched)"));
}
