//! `strongman` binary: argument handling and exit codes.

mod common;

use common::{spawn_command, write_config};
use strongman::error::ExitCode;

#[test]
fn validate_accepts_good_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "game.yaml",
        "timing:\n  sampling_window: 4s\ncalibration:\n  player2:\n    amplitude: 100\n    offset: 0\n    rate: 1\n    divisor: 80\n    base: 0\n",
    );
    let output = spawn_command(&["validate", config.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn validate_rejects_bad_calibration() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "bad.yaml",
        "calibration:\n  player1:\n    amplitude: 100\n    offset: 0\n    rate: 1\n    divisor: 0\n    base: 0\n",
    );
    let output = spawn_command(&["validate", config.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(ExitCode::CONFIG_ERROR));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("calibration.player1.divisor"),
        "stderr: {stderr}"
    );
}

#[test]
fn validate_rejects_unknown_fields() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "typo.yaml", "timng:\n  idle_timeout: 3s\n");
    let output = spawn_command(&["validate", config.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(ExitCode::CONFIG_ERROR));
}

#[test]
fn validate_strict_fails_on_warnings() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "dup.yaml", "streams:\n  winner_p2: 3\n");

    let lenient = spawn_command(&["validate", config.to_str().unwrap()]);
    assert!(lenient.status.success());

    let strict = spawn_command(&["validate", "--strict", config.to_str().unwrap()]);
    assert_eq!(strict.status.code(), Some(ExitCode::CONFIG_ERROR));
}

#[test]
fn run_with_missing_bus_device_fails() {
    let output = spawn_command(&["run", "--bus", "/nonexistent/strongman-bus", "-q"]);
    assert_eq!(output.status.code(), Some(ExitCode::BUS_ERROR));
}

#[test]
fn unknown_subcommand_is_usage_error() {
    let output = spawn_command(&["dance"]);
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(2));
}
