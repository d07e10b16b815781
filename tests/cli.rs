//! CLI smoke tests
//!
//! Each test runs the hyalus binary against a fixture tree with settings
//! isolated through XDG_CONFIG_HOME and XDG_DATA_HOME.

mod common;

use common::{TestContext, COFFEE_STEPS};
use predicates::prelude::*;

#[test]
fn test_help_lists_commands() {
    let ctx = TestContext::new();
    ctx.hyalus()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run").and(predicate::str::contains("clean")));
}

#[test]
fn test_run_help_explains_file_references() {
    let ctx = TestContext::new();
    ctx.hyalus()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[FILE, []]").and(predicate::str::contains("literal")));
}

#[test]
fn test_run_function_is_hidden() {
    let ctx = TestContext::new();
    ctx.hyalus()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run-function").not());
}

#[test]
fn test_binary_hosts_builtin_functions() {
    let ctx = TestContext::new();
    let request = format!(
        r#"{{"function": "write_text", "args": ["output/hello.txt", "hi"], "run_dir": {}, "step_number": 1}}"#,
        serde_json::to_string(&ctx.root()).unwrap()
    );
    ctx.hyalus()
        .arg("run-function")
        .write_stdin(request)
        .assert()
        .code(0)
        .stdout(predicate::str::starts_with("Wrote"));
    assert_eq!(
        std::fs::read_to_string(ctx.root().join("output/hello.txt")).unwrap(),
        "hi"
    );

    ctx.hyalus()
        .arg("run-function")
        .write_stdin(r#"{"function": "assert_truthy", "args": [false], "run_dir": "/", "step_number": 1}"#)
        .assert()
        .code(1)
        .stderr("false is not truthy");
}

#[test]
fn test_list_prints_sorted_names() {
    let ctx = TestContext::new();
    ctx.write_test("zulu", &["Short"], "  - action: assert_eq\n    args: [1, 1]\n");
    ctx.write_test("alpha", &["Long"], "  - action: assert_eq\n    args: [1, 1]\n");

    ctx.hyalus()
        .args(["list", "-s"])
        .arg(&ctx.tests_dir)
        .assert()
        .success()
        .stdout(predicate::str::is_match("(?s)alpha\n.*zulu\n").unwrap());

    ctx.hyalus()
        .args(["list", "-t", "long", "-s"])
        .arg(&ctx.tests_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("alpha").and(predicate::str::contains("zulu").not()));
}

#[test]
fn test_run_exit_codes() {
    let ctx = TestContext::new();
    ctx.write_test("coffee", &["Short"], COFFEE_STEPS);
    ctx.write_input("coffee", "menu.json", r#"{"espresso": 2.5}"#);
    ctx.write_test("broken", &["Short"], "  - action: assert_eq\n    args: [1, 2]\n");

    ctx.hyalus()
        .args(["run", "coffee", "--runs-dir"])
        .arg(&ctx.runs_dir)
        .arg("-s")
        .arg(&ctx.tests_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("PASSED"));

    ctx.hyalus()
        .args(["run", "broken", "--runs-dir"])
        .arg(&ctx.runs_dir)
        .arg("-s")
        .arg(&ctx.tests_dir)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("FAILED"));

    assert_eq!(ctx.run_dirs().len(), 2);
}

#[test]
fn test_run_without_selection_fails() {
    let ctx = TestContext::new();
    ctx.hyalus()
        .args(["run", "--runs-dir"])
        .arg(&ctx.runs_dir)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_clean_with_nothing_to_remove() {
    let ctx = TestContext::new();
    ctx.hyalus()
        .args(["clean", "--force", "--runs-dir"])
        .arg(&ctx.runs_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Couldn't find any test runs to remove"));
}

#[test]
fn test_clean_prompt_can_be_declined() {
    let ctx = TestContext::new();
    ctx.write_test("once", &["Short"], "  - action: assert_eq\n    args: [1, 1]\n");
    ctx.hyalus()
        .args(["run", "once", "--runs-dir"])
        .arg(&ctx.runs_dir)
        .arg("-s")
        .arg(&ctx.tests_dir)
        .assert()
        .success();

    ctx.hyalus()
        .args(["clean", "--runs-dir"])
        .arg(&ctx.runs_dir)
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Test run removal canceled"));
    assert_eq!(ctx.run_dirs().len(), 1);

    ctx.hyalus()
        .args(["clean", "once", "--runs-dir"])
        .arg(&ctx.runs_dir)
        .write_stdin("y\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 old test runs have been removed"));
    assert!(ctx.run_dirs().is_empty());
}

#[test]
fn test_new_scaffolds_runnable_test() {
    let ctx = TestContext::new();
    ctx.hyalus()
        .args(["new", "fresh", "-d"])
        .arg(&ctx.tests_dir)
        .assert()
        .success();
    assert!(ctx.tests_dir.join("fresh/config.yaml").is_file());
    assert!(ctx.tests_dir.join("fresh/input").is_dir());

    ctx.hyalus()
        .args(["list", "-s"])
        .arg(&ctx.tests_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("fresh"));
}

#[test]
fn test_config_set_reset_and_conflict() {
    let ctx = TestContext::new();
    ctx.hyalus()
        .args(["config", "--set", "tag_operator=all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tag_operator = all"));
    assert!(ctx.config_dir.join("hyalus/settings.toml").is_file());

    ctx.hyalus()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("tag_operator = all"));

    ctx.hyalus()
        .args(["config", "--reset", "tag_operator"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tag_operator = any"));

    ctx.hyalus()
        .args(["config", "--set", "debug=true", "--reset", "debug"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("debug"));
}
