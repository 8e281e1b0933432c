//! CLI integration tests using the pre-built binary.

use assert_cmd::Command;
use emblem_core::Pos;
use emblem_core::testing::SnapshotBuilder;
use predicates::str::contains;
use std::fs;
use tempfile::tempdir;

fn duel_json() -> String {
    let snapshot = SnapshotBuilder::new(8, 8)
        .ally(1, Pos::new(1, 1), |_| {})
        .enemy(10, Pos::new(1, 4), |_| {})
        .build();
    serde_json::to_string(&snapshot).unwrap()
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_emblem-bridge"));
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(contains("run"))
        .stdout(contains("actions"));
}

#[test]
fn test_cli_missing_scenario_fails() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope.json");
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_emblem-bridge"));
    cmd.args(["run", "--scenario", missing.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("Failed to read scenario"));
}

#[test]
fn test_cli_run_duel_to_victory() {
    let dir = tempdir().unwrap();
    let scenario = dir.path().join("duel.json");
    fs::write(&scenario, duel_json()).unwrap();
    let records = dir.path().join("records.jsonl");

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_emblem-bridge"));
    cmd.args([
        "run",
        "--scenario",
        scenario.to_str().unwrap(),
        "--records",
        records.to_str().unwrap(),
        "--metrics",
    ])
    .assert()
    .success()
    .stdout(contains("victory"))
    .stdout(contains("1 of 1 episodes won"))
    .stdout(contains("\"commits\": 1"));

    let written = fs::read_to_string(&records).unwrap();
    assert_eq!(written.lines().count(), 1);
}

#[test]
fn test_cli_lists_ranked_actions() {
    let dir = tempdir().unwrap();
    let scenario = dir.path().join("duel.json");
    fs::write(&scenario, duel_json()).unwrap();

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_emblem-bridge"));
    cmd.args(["actions", "--scenario", scenario.to_str().unwrap(), "--unit", "1"])
        .assert()
        .success()
        .stdout(contains("Unit 1 (Ally 1)"))
        .stdout(contains("heuristic scorer"));
}

#[test]
fn test_cli_records_append_across_runs() {
    let dir = tempdir().unwrap();
    let scenario = dir.path().join("duel.json");
    fs::write(&scenario, duel_json()).unwrap();
    let records = dir.path().join("records.jsonl");

    for _ in 0..2 {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_emblem-bridge"));
        cmd.args([
            "run",
            "--scenario",
            scenario.to_str().unwrap(),
            "--records",
            records.to_str().unwrap(),
        ])
        .assert()
        .success();
    }

    let written = fs::read_to_string(&records).unwrap();
    assert_eq!(written.lines().count(), 2);
}

#[test]
fn test_cli_records_to_stdout() {
    let dir = tempdir().unwrap();
    let scenario = dir.path().join("duel.json");
    fs::write(&scenario, duel_json()).unwrap();

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_emblem-bridge"));
    cmd.args(["run", "--scenario", scenario.to_str().unwrap(), "--records", "-"])
        .assert()
        .success()
        .stdout(contains("{\"episode\":0,\"turn\":1,"))
        .stdout(contains("1 of 1 episodes won"));
}
