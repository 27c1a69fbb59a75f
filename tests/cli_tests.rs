//! End-to-end tests for the pslpkg binary.
//!
//! Only offline commands are exercised here; anything touching git or the
//! conda tools belongs in a release rehearsal, not the test suite.

use assert_cmd::Command;
use predicates::prelude::*;

fn pslpkg() -> Command {
    Command::cargo_bin("pslpkg").expect("binary builds")
}

#[test]
fn help_lists_every_phase() {
    pslpkg()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("release"))
        .stdout(predicate::str::contains("upload"))
        .stdout(predicate::str::contains("info"));
}

#[test]
fn info_orders_dependencies_before_dependents() {
    let workdir = tempfile::tempdir().unwrap();
    let assert = pslpkg()
        .args(["info", "btax", "--workdir"])
        .arg(workdir.path())
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let taxcalc = stdout.find("taxcalc").expect("taxcalc listed");
    let btax = stdout.find("btax").expect("btax listed");
    assert!(taxcalc < btax, "dependency must be listed first:\n{stdout}");
}

#[test]
fn info_shows_explicit_pins() {
    let workdir = tempfile::tempdir().unwrap();
    pslpkg()
        .args(["info", "taxcalc=0.24.0", "--workdir"])
        .arg(workdir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("0.24.0"));
}

#[test]
fn unknown_package_is_rejected_with_known_names() {
    let workdir = tempfile::tempdir().unwrap();
    pslpkg()
        .args(["info", "nosuchpkg", "--workdir"])
        .arg(workdir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("nosuchpkg"))
        .stderr(predicate::str::contains("taxcalc"));
}

#[test]
fn malformed_specifier_is_rejected() {
    let workdir = tempfile::tempdir().unwrap();
    pslpkg()
        .args(["info", "btax=", "--workdir"])
        .arg(workdir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("btax="));
}
