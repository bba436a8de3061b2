//! End-to-end scenarios: scripts that actually drive a real `/bin/sh`
//! PTY child (or a pipe-backed `[process]` child) through the built
//! `plux` binary.

use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use predicates::prelude::*;
use pretty_assertions::assert_eq;

fn plux() -> Command {
    Command::cargo_bin("plux").expect("plux binary should build")
}

#[test]
fn echoes_and_matches_exactly() {
    let dir = TempDir::new().expect("tempdir");
    dir.child("echo.plux")
        .write_str("[doc]\n[enddoc]\n[shell sh]\n!echo hello-plux\n???hello-plux\n")
        .expect("write script");

    plux()
        .current_dir(&dir)
        .arg("echo.plux")
        .assert()
        .success()
        .stdout(predicate::str::contains("OK"));
}

#[test]
fn regex_capture_is_available_as_a_numbered_variable() {
    let dir = TempDir::new().expect("tempdir");
    dir.child("capture.plux")
        .write_str(
            "[doc]\n[enddoc]\n[shell sh]\n!echo sum-is-42\n?sum-is-([0-9]+)\n!echo got-$1\n???got-42\n",
        )
        .expect("write script");

    plux()
        .current_dir(&dir)
        .arg("capture.plux")
        .assert()
        .success()
        .stdout(predicate::str::contains("OK"));
}

#[test]
fn unmatched_output_times_out_and_fails() {
    let dir = TempDir::new().expect("tempdir");
    dir.child("timeout.plux")
        .write_str("[doc]\n[enddoc]\n[shell sh]\n[timeout 1]\n!echo hello\n???this-will-never-appear\n")
        .expect("write script");

    plux()
        .current_dir(&dir)
        .arg("timeout.plux")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("FAIL"));
}

#[test]
fn function_call_binds_arguments_in_an_isolated_scope() {
    let dir = TempDir::new().expect("tempdir");
    dir.child("function.plux")
        .write_str(
            "[doc]\n[enddoc]\n\
             [function greet who]\n\
             [shell $FUNCTION_SHELL]\n\
             !echo hi-$who\n\
             ???hi-world\n\
             [endfunction]\n\
             [shell sh]\n\
             [call greet world]\n",
        )
        .expect("write script");

    plux()
        .current_dir(&dir)
        .arg("function.plux")
        .assert()
        .success()
        .stdout(predicate::str::contains("OK"));
}

#[test]
fn cleanup_section_runs_even_after_the_body_fails() {
    let dir = TempDir::new().expect("tempdir");
    dir.child("cleanup.plux")
        .write_str(
            "[doc]\n[enddoc]\n\
             [shell sh]\n\
             [timeout 1]\n\
             ???this-will-never-appear\n\
             [cleanup]\n\
             [progress cleanup-section-ran]\n",
        )
        .expect("write script");

    plux()
        .current_dir(&dir)
        .arg("cleanup.plux")
        .assert()
        .failure()
        .code(1);

    let progress_log = std::fs::read_to_string(dir.child("plux.progress.log").path())
        .expect("progress log should have been written");
    assert!(progress_log.contains("cleanup-section-ran"));
}

#[test]
fn include_shares_functions_with_the_including_script() {
    let dir = TempDir::new().expect("tempdir");
    dir.child("lib.plux")
        .write_str(
            "[doc]\n[enddoc]\n\
             [function say_hi]\n\
             [shell $FUNCTION_SHELL]\n\
             !echo included-hi\n\
             ???included-hi\n\
             [endfunction]\n\
             [shell sh]\n",
        )
        .expect("write lib script");
    dir.child("main.plux")
        .write_str(
            "[doc]\n[enddoc]\n\
             [include lib.plux]\n\
             [shell sh]\n\
             [call say_hi]\n",
        )
        .expect("write main script");

    plux()
        .current_dir(&dir)
        .arg("main.plux")
        .assert()
        .success()
        .stdout(predicate::str::contains("OK"));
}

#[test]
fn per_script_shell_logs_are_persisted_under_the_script_basename() {
    let dir = TempDir::new().expect("tempdir");
    dir.child("logged.plux")
        .write_str("[doc]\n[enddoc]\n[shell sh]\n!echo logged-output\n???logged-output\n")
        .expect("write script");

    plux().current_dir(&dir).arg("logged.plux").assert().success();

    let output_log = dir.child("plux/logged/sh_output.log");
    output_log.assert(predicate::path::exists());
    let contents = std::fs::read_to_string(output_log.path()).expect("read output log");
    assert!(contents.contains("logged-output"));
}

#[test]
fn process_child_exit_is_observable_as_a_synthetic_line() {
    let dir = TempDir::new().expect("tempdir");
    dir.child("process.plux")
        .write_str("[doc]\n[enddoc]\n[process worker /bin/echo worker-done]\n?PROCESS-EXIT: 0\n")
        .expect("write script");

    let assert = plux().current_dir(&dir).arg("process.plux").assert();
    assert.success().stdout(predicate::str::contains("OK"));
}

#[test]
fn exit_code_is_zero_only_when_every_matched_script_succeeds() {
    let dir = TempDir::new().expect("tempdir");
    dir.child("a_ok.plux")
        .write_str("[doc]\n[enddoc]\n[shell sh]\n!echo a\n???a\n")
        .expect("write script a");
    dir.child("b_fail.plux")
        .write_str("[doc]\n[enddoc]\n[shell sh]\n[timeout 1]\n???never\n")
        .expect("write script b");

    let output = plux()
        .current_dir(&dir)
        .arg("*.plux")
        .assert()
        .failure()
        .code(1)
        .get_output()
        .clone();

    let stdout = String::from_utf8(output.stdout).expect("utf8 stdout");
    assert_eq!(stdout.matches("OK").count(), 1);
    assert_eq!(stdout.matches("FAIL").count(), 1);
}
