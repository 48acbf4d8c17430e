//! Flag-parsing and validation tests that don't require a container runtime.
//!
//! Everything here exercises `clap`'s own validation, which runs before any
//! subcommand touches Docker/Podman, so these are safe to run without a
//! runtime installed.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn no_subcommand_prints_usage_and_fails() {
    let mut cmd = Command::cargo_bin("packnplay").unwrap();
    cmd.assert().failure().stderr(predicates::str::contains("Usage"));
}

#[test]
fn top_level_help_lists_all_subcommands() {
    let mut cmd = Command::cargo_bin("packnplay").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("run"))
        .stdout(predicates::str::contains("attach"))
        .stdout(predicates::str::contains("list"))
        .stdout(predicates::str::contains("refresh-container"))
        .stdout(predicates::str::contains("configure"));
}

#[test]
fn run_without_a_command_fails() {
    let mut cmd = Command::cargo_bin("packnplay").unwrap();
    cmd.arg("run");
    cmd.assert().failure().stderr(predicates::str::contains("COMMAND").or(predicates::str::contains("required")));
}

#[test]
fn run_rejects_worktree_and_no_worktree_together() {
    let mut cmd = Command::cargo_bin("packnplay").unwrap();
    cmd.args(["run", "--worktree", "feature-x", "--no-worktree", "--", "echo", "hi"]);
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("cannot be used with").or(predicates::str::contains("conflicts")));
}

#[test]
fn attach_help_documents_workspace_flags() {
    let mut cmd = Command::cargo_bin("packnplay").unwrap();
    cmd.args(["attach", "--help"]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("--path"))
        .stdout(predicates::str::contains("--worktree"));
}

#[test]
fn list_help_documents_verbose_flag() {
    let mut cmd = Command::cargo_bin("packnplay").unwrap();
    cmd.args(["list", "--help"]);
    cmd.assert().success().stdout(predicates::str::contains("--verbose"));
}

#[test]
fn version_flag_reports_package_version() {
    let mut cmd = Command::cargo_bin("packnplay").unwrap();
    cmd.arg("--version");
    cmd.assert().success().stdout(predicates::str::contains(env!("CARGO_PKG_VERSION")));
}
