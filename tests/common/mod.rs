//! Common test utilities for jobsh integration tests

use assert_cmd::Command;

/// The jobsh binary, ready to be handed arguments.
pub fn jobsh() -> Command {
    Command::cargo_bin("jobsh").unwrap()
}

/// Run one command line through `jobsh -c`.
#[allow(dead_code)]
pub fn run(line: &str) -> assert_cmd::assert::Assert {
    jobsh().args(["-c", line]).assert()
}
