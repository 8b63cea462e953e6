use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn help_shows_usage() {
    let mut cmd = Command::cargo_bin("netsim").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Discrete-event simulator"));
}

#[test]
fn small_run_writes_peer_logs_and_prints_summary() {
    let temp = tempdir().unwrap();
    let out_dir = temp.path().join("out");

    let mut cmd = Command::cargo_bin("netsim").unwrap();
    cmd.arg("--n")
        .arg("6")
        .arg("--z0")
        .arg("0")
        .arg("--z1")
        .arg("0")
        .arg("--ttx")
        .arg("5")
        .arg("--i")
        .arg("20")
        .arg("--max-time")
        .arg("2000")
        .arg("--seed")
        .arg("1")
        .arg("--out-dir")
        .arg(&out_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Network diameter"))
        .stdout(predicate::str::contains("Average degree"))
        .stdout(predicate::str::contains("peer"))
        .stdout(predicate::str::contains("retained"));

    for id in 0..6 {
        assert!(out_dir.join(format!("peer_{id}.txt")).exists());
    }
    assert!(out_dir.join("peer0_transactions.txt").exists());
}

#[test]
fn no_logs_flag_skips_peer_log_files() {
    let temp = tempdir().unwrap();
    let out_dir = temp.path().join("out");

    Command::cargo_bin("netsim")
        .unwrap()
        .arg("--n")
        .arg("6")
        .arg("--max-time")
        .arg("100")
        .arg("--seed")
        .arg("2")
        .arg("--out-dir")
        .arg(&out_dir)
        .arg("--no-logs")
        .assert()
        .success();

    assert!(!out_dir.join("peer_0.txt").exists());
}

#[test]
fn rejects_out_of_range_config() {
    Command::cargo_bin("netsim")
        .unwrap()
        .arg("--n")
        .arg("6")
        .arg("--z0")
        .arg("150")
        .assert()
        .failure();
}

#[test]
fn loads_config_from_json_file() {
    let temp = tempdir().unwrap();
    let config_path = temp.path().join("config.json");
    std::fs::write(
        &config_path,
        r#"{"n":8,"z0":25.0,"z1":20.0,"ttx":5.0,"i":30.0,"max_time":1500.0,"seed":9}"#,
    )
    .unwrap();
    let out_dir = temp.path().join("out");

    Command::cargo_bin("netsim")
        .unwrap()
        .arg("--config")
        .arg(&config_path)
        .arg("--out-dir")
        .arg(&out_dir)
        .assert()
        .success();

    assert!(out_dir.join("peer_0.txt").exists());
}
