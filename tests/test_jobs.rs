//! Scenario tests for background jobs, scripts, and the registration /
//! SIGCHLD race, driving the built binary.

#[path = "common/mod.rs"]
mod common;
use common::{jobsh, run};

use predicates::prelude::*;
use std::fs;

#[test]
fn background_launch_reports_job_and_group() {
    run("sleep 0 &").success().stdout(
        predicate::str::is_match(r"^\[1\] Process group: \d+ running in the background\n")
            .unwrap(),
    );
}

#[test]
fn background_job_is_announced_after_it_completes() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("bg.jobsh");
    fs::write(&script, "sleep 0.1 &\nsleep 0.4\n").unwrap();

    let output = jobsh().arg(&script).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("running in the background"), "stdout: {stdout}");
    assert!(stdout.contains("Process group:"), "stdout: {stdout}");
    assert!(stdout.contains("completed"), "stdout: {stdout}");
}

#[test]
fn background_stress_never_corrupts_the_table() {
    // Many short-lived background launches race SIGCHLD delivery against
    // job registration. The handshake makes a "reaped pid with no owning
    // job" failure impossible; that failure would exit non-zero here.
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("stress.jobsh");
    let mut body = String::new();
    for _ in 0..10 {
        body.push_str("true &\n");
    }
    body.push_str("sleep 0.5\n");
    fs::write(&script, body).unwrap();

    let output = jobsh().arg(&script).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.matches("running in the background").count(), 10);
    // Job ids keep growing across launches, never reused.
    assert!(stdout.contains("[10] Process group:"), "stdout: {stdout}");
    assert_eq!(stdout.matches("completed").count(), 10);
}

#[test]
fn script_runs_lines_and_skips_comments() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("script.jobsh");
    fs::write(&script, "# a comment\necho one\n\necho two\n").unwrap();

    jobsh()
        .arg(&script)
        .assert()
        .success()
        .stdout("one\ntwo\n");
}

#[test]
fn cd_at_top_level_moves_the_shell() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("cd.jobsh");
    fs::write(&script, "cd /\npwd\n").unwrap();

    jobsh().arg(&script).assert().success().stdout("/\n");
}

#[test]
fn cd_inside_a_pipeline_cannot_move_the_shell() {
    // The stage runs in its own child; the parent's cwd must not change.
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("cd_pipe.jobsh");
    fs::write(&script, "cd / | cat\npwd\n").unwrap();

    let here = dir.path().canonicalize().unwrap();
    let output = jobsh().arg(&script).current_dir(&here).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim_end(), here.display().to_string());
}

#[test]
fn exit_inside_a_pipeline_cannot_end_the_shell() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("exit_pipe.jobsh");
    fs::write(&script, "exit | cat\necho survived\n").unwrap();

    jobsh()
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("survived"));
}

#[test]
fn help_and_version_print_and_exit() {
    jobsh()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("USAGE"));
    jobsh()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("jobsh"));
}
