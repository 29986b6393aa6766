//! Binary-level tests that need no course service or repository server.

#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const SETTINGS: &str = "\
[AUTH]
url = http://127.0.0.1:9
username = teacher
password = s3cret

[COURSE]
name = Algo101
svn = http://127.0.0.1:9/svn
ids = 12
";

fn submirror() -> Command {
    Command::cargo_bin("submirror").expect("submirror binary")
}

fn settings_in(contents: &str) -> (TempDir, PathBuf) {
    let td = tempfile::tempdir().expect("tempdir");
    let path = td.path().join("submirror.ini");
    fs::write(&path, contents).expect("write settings");
    (td, path)
}

#[test]
fn help_lists_the_interactive_flags() {
    submirror()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--ask-link"))
        .stdout(predicate::str::contains("--auto-ignore"));
}

#[test]
fn missing_settings_file_is_a_settings_error() {
    let td = tempfile::tempdir().expect("tempdir");
    submirror()
        .current_dir(td.path())
        .arg("--pending")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn ask_link_without_force_is_rejected() {
    let (td, _) = settings_in(SETTINGS);
    submirror()
        .current_dir(td.path())
        .arg("--ask-link")
        .assert()
        .code(1);
}

#[test]
fn add_link_is_persisted_and_exits() {
    let (_td, path) = settings_in(SETTINGS);
    submirror()
        .arg("-C")
        .arg(&path)
        .args(["-a", "2", "/hw1/part1/"])
        .assert()
        .success()
        .stdout(predicate::str::contains("linked 2 -> hw1/part1"));

    let written = fs::read_to_string(&path).expect("read settings");
    assert!(written.contains("[RB_LINKS]"));
    assert!(written.contains("hw1/part1"));
    assert!(written.contains("Algo101"));
}

#[test]
fn ignore_and_relocate_directives_are_persisted() {
    let (_td, path) = settings_in(SETTINGS);
    submirror()
        .arg("-C")
        .arg(&path)
        .args(["--ignore", "501", "--relocate", "ivanov", "ivanov-2024"])
        .assert()
        .success();

    let written = fs::read_to_string(&path).expect("read settings");
    assert!(written.contains("501"));
    assert!(written.contains("[RELOCS]"));
    assert!(written.contains("ivanov-2024"));
}

#[test]
fn missing_password_is_an_authentication_failure() {
    let (_td, path) = settings_in(&SETTINGS.replace("password = s3cret\n", ""));
    submirror()
        .arg("-C")
        .arg(&path)
        .arg("--tasks-list")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("AUTH.password"));
}

#[test]
fn missing_repository_url_is_a_settings_error() {
    let (_td, path) = settings_in(&SETTINGS.replace("svn = http://127.0.0.1:9/svn\n", ""));
    submirror()
        .arg("-C")
        .arg(&path)
        .arg("--pending")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("COURSE.svn"));
}
