use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_the_surface() {
    let mut cmd = Command::cargo_bin("scour").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--max-turns"))
        .stdout(predicate::str::contains("--provider"))
        .stdout(predicate::str::contains("web-research agent"));
}

#[test]
fn rejects_unknown_provider() {
    let mut cmd = Command::cargo_bin("scour").unwrap();
    cmd.args(["--provider", "bing", "some query"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown provider"));
}

#[test]
fn requires_a_model() {
    let mut cmd = Command::cargo_bin("scour").unwrap();
    cmd.env_remove("SCOUR_OPENAI_MODEL")
        .arg("some query")
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing model"));
}
