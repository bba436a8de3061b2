//! CLI-level tests: argument parsing, usage errors, `--dump`, and exit
//! codes, driven entirely through the built binary via `assert_cmd`.

use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use predicates::prelude::*;

fn plux() -> Command {
    Command::cargo_bin("plux").expect("plux binary should build")
}

#[test]
fn help_flag_prints_usage_and_succeeds() {
    plux()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("SCRIPT_GLOB"));
}

#[test]
fn missing_script_argument_is_a_usage_error() {
    plux().assert().failure().code(2);
}

#[test]
fn glob_matching_nothing_is_a_usage_error() {
    let dir = TempDir::new().expect("tempdir");
    plux()
        .current_dir(&dir)
        .arg("no-such-script-*.plux")
        .assert()
        .failure()
        .stderr(predicate::str::contains("matched no files"));
}

#[test]
fn dump_prints_parsed_model_without_running_anything() {
    let dir = TempDir::new().expect("tempdir");
    let script = dir.child("dump_me.plux");
    script
        .write_str("[doc]\nexample\n[enddoc]\n[shell sh]\n!echo hi\n???hi\n")
        .expect("write script");

    plux()
        .current_dir(&dir)
        .args(["--dump", "dump_me.plux"])
        .assert()
        .success()
        .stdout(predicate::str::contains("example"))
        .stdout(predicate::str::contains("send echo hi"));

    dir.child("plux").assert(predicate::path::missing());
}

#[test]
fn successful_script_exits_zero_and_reports_ok() {
    let dir = TempDir::new().expect("tempdir");
    let script = dir.child("ok.plux");
    script
        .write_str("[doc]\n[enddoc]\n[shell sh]\n!echo hello\n???hello\n")
        .expect("write script");

    plux()
        .current_dir(&dir)
        .arg("ok.plux")
        .assert()
        .success()
        .stdout(predicate::str::contains("OK"));
}

#[test]
fn script_with_unsatisfied_require_fails_and_is_listed() {
    let dir = TempDir::new().expect("tempdir");
    let script = dir.child("bad.plux");
    script
        .write_str("[doc]\n[enddoc]\n[config require PLUX_DEFINITELY_UNSET_VAR]\n[shell sh]\n!echo hi\n")
        .expect("write script");

    plux()
        .current_dir(&dir)
        .arg("bad.plux")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("FAIL"))
        .stderr(predicate::str::contains("script(s) failed"));
}

#[test]
fn malformed_script_is_a_parse_failure_not_a_panic() {
    let dir = TempDir::new().expect("tempdir");
    let script = dir.child("broken.plux");
    script.write_str("[shell sh]\n").expect("write script");

    plux()
        .current_dir(&dir)
        .arg("broken.plux")
        .assert()
        .failure()
        .code(1);
}
