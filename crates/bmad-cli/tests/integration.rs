#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

const STATUS_FILE: &str = "_bmad-output/implementation-artifacts/sprint-status.yaml";

fn bmad(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("bmad-automate").unwrap();
    cmd.current_dir(dir.path())
        .env("BMAD_ROOT", dir.path())
        .env_remove("BMAD_CONFIG_PATH")
        .env_remove("BMAD_CLAUDE_PATH");
    cmd
}

fn write_status(dir: &TempDir, entries: &[(&str, &str)]) {
    let path = dir.path().join(STATUS_FILE);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut yaml = String::from("project: demo\ndevelopment_status:\n");
    for (key, status) in entries {
        yaml.push_str(&format!("  {key}: {status}\n"));
    }
    std::fs::write(path, yaml).unwrap();
}

fn read_status(dir: &TempDir) -> String {
    std::fs::read_to_string(dir.path().join(STATUS_FILE)).unwrap()
}

/// A stand-in `claude` that emits a short stream-json session, logs each
/// prompt, and exits 3 for any prompt containing `fail_on`.
#[cfg(unix)]
fn fake_claude(dir: &TempDir, fail_on: Option<&str>) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.path().join("fake-claude");
    let log = dir.path().join("calls.log");
    let fail = fail_on
        .map(|needle| format!("case \"$4\" in *\"{needle}\"*) exit 3;; esac\n"))
        .unwrap_or_default();
    let script = format!(
        r#"#!/bin/sh
printf '%s\n' "$4" >> "{log}"
echo '{{"type":"system","subtype":"init"}}'
echo 'not json'
echo '{{"type":"assistant","message":{{"content":[{{"type":"text","text":"working"}}]}}}}'
echo '{{"type":"result","subtype":"success"}}'
{fail}exit 0
"#,
        log = log.display(),
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn calls(dir: &TempDir) -> Vec<String> {
    std::fs::read_to_string(dir.path().join("calls.log"))
        .unwrap_or_default()
        .lines()
        .map(String::from)
        .collect()
}

fn state_file(dir: &TempDir) -> PathBuf {
    dir.path().join(".bmad-state.json")
}

// ---------------------------------------------------------------------------
// status / set-status
// ---------------------------------------------------------------------------

#[test]
fn status_shows_story() {
    let dir = TempDir::new().unwrap();
    write_status(&dir, &[("1-1-login", "review")]);
    bmad(&dir)
        .args(["status", "1-1-login"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1-1-login: review"));
}

#[test]
fn status_lists_all_as_json() {
    let dir = TempDir::new().unwrap();
    write_status(&dir, &[("1-1-a", "done"), ("1-2-b", "backlog")]);
    let out = bmad(&dir).args(["status", "--json"]).output().unwrap();
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["1-1-a"], "done");
    assert_eq!(json["1-2-b"], "backlog");
}

#[test]
fn status_of_unknown_story_fails() {
    let dir = TempDir::new().unwrap();
    write_status(&dir, &[("1-1-a", "done")]);
    bmad(&dir)
        .args(["status", "9-9-z"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("story not found: 9-9-z"));
}

#[test]
fn missing_status_file_fails() {
    let dir = TempDir::new().unwrap();
    bmad(&dir)
        .args(["status", "1-1-a"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read sprint status"));
}

#[test]
fn set_status_updates_only_that_story() {
    let dir = TempDir::new().unwrap();
    write_status(&dir, &[("1-1-a", "backlog"), ("1-2-b", "review")]);
    bmad(&dir)
        .args(["set-status", "1-1-a", "in-progress"])
        .assert()
        .success();
    let yaml = read_status(&dir);
    assert!(yaml.contains("1-1-a: in-progress"));
    assert!(yaml.contains("1-2-b: review"));
    assert!(yaml.contains("project: demo"));
}

#[test]
fn set_status_rejects_invalid_value() {
    let dir = TempDir::new().unwrap();
    write_status(&dir, &[("1-1-a", "backlog")]);
    bmad(&dir)
        .args(["set-status", "1-1-a", "finished"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid status"));
    assert!(read_status(&dir).contains("1-1-a: backlog"));
}

// ---------------------------------------------------------------------------
// dry runs
// ---------------------------------------------------------------------------

#[test]
fn lifecycle_dry_run_lists_plan() {
    let dir = TempDir::new().unwrap();
    write_status(&dir, &[("2-1-a", "backlog")]);
    bmad(&dir)
        .args(["lifecycle", "2-1-a", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1. create-story → ready-for-dev"))
        .stdout(predicate::str::contains("4. git-commit → done"));
    assert!(!state_file(&dir).exists());
}

#[test]
fn lifecycle_on_done_story_is_success() {
    let dir = TempDir::new().unwrap();
    write_status(&dir, &[("2-1-a", "done")]);
    bmad(&dir)
        .args(["lifecycle", "2-1-a"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already complete"));
}

#[test]
fn epic_dry_run_totals() {
    let dir = TempDir::new().unwrap();
    write_status(
        &dir,
        &[
            ("3-10-last", "review"),
            ("3-1-first", "done"),
            ("3-2-second", "ready-for-dev"),
            ("4-1-other", "backlog"),
        ],
    );
    let out = bmad(&dir)
        .args(["epic", "3", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Total: 5 workflows across 2 stories (1 already complete)",
        ))
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(out).unwrap();
    let first = text.find("Story 3-1-first").unwrap();
    let second = text.find("Story 3-2-second").unwrap();
    let last = text.find("Story 3-10-last").unwrap();
    assert!(first < second && second < last);
    assert!(!text.contains("4-1-other"));
}

#[test]
fn epic_without_stories_fails() {
    let dir = TempDir::new().unwrap();
    write_status(&dir, &[("1-1-a", "backlog")]);
    bmad(&dir)
        .args(["epic", "8", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no stories found for epic: 8"));
}

#[test]
fn resume_without_state() {
    let dir = TempDir::new().unwrap();
    bmad(&dir)
        .arg("resume")
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to resume"));
}

#[test]
fn explicit_missing_config_fails() {
    let dir = TempDir::new().unwrap();
    write_status(&dir, &[("1-1-a", "backlog")]);
    bmad(&dir)
        .env("BMAD_CONFIG_PATH", dir.path().join("nope.yaml"))
        .args(["lifecycle", "1-1-a", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config file not found"));
}

#[test]
fn malformed_env_override_fails() {
    let dir = TempDir::new().unwrap();
    write_status(&dir, &[("1-1-a", "backlog")]);
    bmad(&dir)
        .env("BMAD_OUTPUT_TRUNCATE_LINES", "lots")
        .args(["lifecycle", "1-1-a", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "invalid value for BMAD_OUTPUT_TRUNCATE_LINES",
        ));
}

// ---------------------------------------------------------------------------
// runs against a stand-in claude
// ---------------------------------------------------------------------------

#[cfg(unix)]
#[test]
fn lifecycle_runs_every_stage_and_reaches_done() {
    let dir = TempDir::new().unwrap();
    write_status(&dir, &[("5-1-cart", "backlog")]);
    let claude = fake_claude(&dir, None);

    bmad(&dir)
        .env("BMAD_CLAUDE_PATH", &claude)
        .args(["lifecycle", "5-1-cart"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Claude: working"))
        .stdout(predicate::str::contains("Story 5-1-cart completed successfully"));

    assert!(read_status(&dir).contains("5-1-cart: done"));
    assert_eq!(calls(&dir).len(), 4);
    assert!(!state_file(&dir).exists());
}

#[cfg(unix)]
#[test]
fn failing_stage_stops_lifecycle_and_keeps_checkpoint() {
    let dir = TempDir::new().unwrap();
    write_status(&dir, &[("5-1-cart", "backlog")]);
    let claude = fake_claude(&dir, Some("dev-story"));

    bmad(&dir)
        .env("BMAD_CLAUDE_PATH", &claude)
        .args(["lifecycle", "5-1-cart"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("dev-story returned exit code 3"));

    assert!(read_status(&dir).contains("5-1-cart: ready-for-dev"));
    assert_eq!(calls(&dir).len(), 2);
    let state: serde_json::Value =
        serde_json::from_slice(&std::fs::read(state_file(&dir)).unwrap()).unwrap();
    assert_eq!(state["story_key"], "5-1-cart");
    assert_eq!(state["step_index"], 1);
    assert_eq!(state["start_status"], "backlog");
}

#[cfg(unix)]
#[test]
fn queue_skips_done_and_runs_one_stage_each() {
    let dir = TempDir::new().unwrap();
    write_status(
        &dir,
        &[("6-1-a", "backlog"), ("6-2-b", "done"), ("6-3-c", "review")],
    );
    let claude = fake_claude(&dir, None);

    bmad(&dir)
        .env("BMAD_CLAUDE_PATH", &claude)
        .args(["queue", "6-1-a", "6-2-b", "6-3-c"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Skipped (already done)"))
        .stdout(predicate::str::contains("QUEUE COMPLETE"));

    let prompts = calls(&dir);
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("create-story - Create story: 6-1-a"));
    assert!(prompts[1].contains("code-review - Review story: 6-3-c"));
}

#[cfg(unix)]
#[test]
fn single_stage_failure_propagates_exit_code() {
    let dir = TempDir::new().unwrap();
    write_status(&dir, &[("7-1-a", "ready-for-dev")]);
    let claude = fake_claude(&dir, Some("Work on story"));

    bmad(&dir)
        .env("BMAD_CLAUDE_PATH", &claude)
        .args(["dev-story", "7-1-a"])
        .assert()
        .failure()
        .code(3)
        .stdout(predicate::str::contains("Exit code: 3"));
}

#[test]
fn missing_claude_binary_fails_stage() {
    let dir = TempDir::new().unwrap();
    bmad(&dir)
        .env("BMAD_CLAUDE_PATH", "definitely-not-a-claude-binary")
        .args(["raw", "hello", "there"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("error executing claude"));
}
