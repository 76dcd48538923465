use predicates::prelude::*;

const PROVIDER_KEYS: &[&str] = &[
    "FACTPIPE_COHERE_API_KEY",
    "COHERE_API_KEY",
    "FACTPIPE_COHERE_ENDPOINT",
    "FACTPIPE_OPENAI_COMPAT_BASE_URL",
    "FACTPIPE_OPENAI_COMPAT_API_KEY",
    "FACTPIPE_OPENAI_COMPAT_MODEL",
    "FACTPIPE_SERPAPI_API_KEY",
    "SERP_API_KEY",
    "FACTPIPE_SERPAPI_ENDPOINT",
    "FACTPIPE_BRAVE_API_KEY",
    "BRAVE_SEARCH_API_KEY",
    "FACTPIPE_EVALUATOR",
    "FACTPIPE_SEARCH",
];

/// `factpipe` with no provider configuration inherited from the environment.
fn factpipe() -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("factpipe"));
    for k in PROVIDER_KEYS {
        cmd.env_remove(k);
    }
    cmd.env("RUST_LOG", "warn");
    cmd
}

fn stdout_json(out: &std::process::Output) -> serde_json::Value {
    let s = String::from_utf8_lossy(&out.stdout);
    serde_json::from_str(s.trim()).expect("stdout is json")
}

#[test]
fn version_prints_name_and_version() {
    let assert = factpipe().arg("version").assert().success();
    let v = stdout_json(assert.get_output());
    assert_eq!(v["name"].as_str(), Some("factpipe"));
    assert!(!v["version"].as_str().unwrap_or("").is_empty());

    factpipe()
        .args(["version", "--output", "text"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("factpipe "));
}

#[test]
fn doctor_reports_booleans_and_never_secret_values() {
    let secret = "sk-test-do-not-print-42";
    let assert = factpipe()
        .arg("doctor")
        .env("COHERE_API_KEY", secret)
        .assert()
        .success()
        .stdout(predicate::str::contains(secret).not());
    let v = stdout_json(assert.get_output());
    let providers = &v["configured"]["providers"];
    assert_eq!(providers["cohere"].as_bool(), Some(true));
    assert_eq!(providers["serpapi"].as_bool(), Some(false));
    assert!(providers["brave"].is_boolean());
    assert!(providers["openai_compat"].is_boolean());
    assert_eq!(v["ok"].as_bool(), Some(true));
}

#[test]
fn doctor_without_keys_is_not_ok_but_succeeds() {
    let assert = factpipe().arg("doctor").assert().success();
    let v = stdout_json(assert.get_output());
    assert_eq!(v["ok"].as_bool(), Some(false));
    assert!(!v["warnings"].as_array().unwrap().is_empty());
}

#[test]
fn short_input_exits_2_with_json_error() {
    let assert = factpipe()
        .arg("check")
        .write_stdin("Too short to check.")
        .assert()
        .code(2);
    let v = stdout_json(assert.get_output());
    assert!(v["error"].as_str().unwrap().contains("at least 50"));
    assert_eq!(v["code"].as_str(), Some("invalid_input"));
}

#[test]
fn missing_file_is_an_input_error() {
    let tmp = tempfile::tempdir().unwrap();
    factpipe()
        .args(["check", "--file"])
        .arg(tmp.path().join("nope.txt"))
        .assert()
        .code(2)
        .stdout(predicate::str::contains("\"error\""));
}

#[test]
fn unconfigured_evaluator_exits_1() {
    let tmp = tempfile::tempdir().unwrap();
    let article = tmp.path().join("article.txt");
    std::fs::write(
        &article,
        "The moon is made of cheese, according to several local farmers. \
         Water boils at 100 degrees Celsius at sea level.",
    )
    .unwrap();

    let assert = factpipe()
        .args(["check", "--file"])
        .arg(&article)
        .assert()
        .code(1);
    let v = stdout_json(assert.get_output());
    assert_eq!(v["code"].as_str(), Some("not_configured"));
}

#[test]
fn unknown_provider_name_is_rejected_by_the_parser() {
    factpipe()
        .args(["check", "--search", "bing"])
        .write_stdin("x")
        .assert()
        .failure()
        .stderr(predicate::str::contains("bing"));
}
