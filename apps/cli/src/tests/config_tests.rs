use super::{load_settings_with, normalize_base_url, Settings};

use std::{
    collections::HashMap,
    env, fs,
    path::PathBuf,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

fn temp_config(contents: &str) -> PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let dir = env::temp_dir().join(format!("contract_review_cli_test_{suffix}"));
    fs::create_dir_all(&dir).expect("temp dir");
    let path = dir.join("client.toml");
    fs::write(&path, contents).expect("write config");
    path
}

#[test]
fn normalizes_base_urls() {
    assert_eq!(
        normalize_base_url("  http://review.local:8000/  "),
        "http://review.local:8000"
    );
    assert_eq!(normalize_base_url("review.local:8000"), "http://review.local:8000");
    assert_eq!(
        normalize_base_url("https://review.example.com/gateway//"),
        "https://review.example.com/gateway"
    );
    assert_eq!(normalize_base_url("   "), Settings::default().base_url);
}

#[test]
fn defaults_apply_without_file_or_environment() {
    let missing = env::temp_dir().join("contract_review_cli_missing_dir/client.toml");
    let settings = load_settings_with(None, env_from(&[])).expect("settings");
    assert_eq!(settings, Settings::default());

    let err = load_settings_with(Some(&missing), env_from(&[])).expect_err("explicit file");
    assert!(err.to_string().contains("failed to read config file"));
}

#[test]
fn environment_overrides_config_file() {
    let path = temp_config(
        r#"
base_url = "files.local:9000/"
status_poll_interval_ms = 500
result_poll_max_attempts = 10
"#,
    );

    let from_file = load_settings_with(Some(&path), env_from(&[])).expect("settings");
    assert_eq!(from_file.base_url, "http://files.local:9000");
    assert_eq!(from_file.status_poll_interval_ms, 500);
    assert_eq!(from_file.result_poll_interval_ms, 1500);
    assert_eq!(from_file.result_poll_max_attempts, 10);

    let layered = load_settings_with(
        Some(&path),
        env_from(&[
            ("CONTRACT_REVIEW_BASE_URL", "http://legacy.local"),
            ("APP__BASE_URL", "https://env.local/"),
            ("APP__RESULT_POLL_INTERVAL_MS", "250"),
            ("APP__RESULT_POLL_MAX_ATTEMPTS", "not-a-number"),
        ]),
    )
    .expect("settings");
    assert_eq!(layered.base_url, "https://env.local");
    assert_eq!(layered.result_poll_interval_ms, 250);
    assert_eq!(layered.result_poll_max_attempts, 10);

    fs::remove_dir_all(path.parent().expect("parent")).expect("cleanup");
}

#[test]
fn zero_values_are_replaced_with_usable_ones() {
    let settings = load_settings_with(
        None,
        env_from(&[
            ("APP__STATUS_POLL_INTERVAL_MS", "0"),
            ("APP__RESULT_POLL_MAX_ATTEMPTS", "0"),
        ]),
    )
    .expect("settings");

    assert_eq!(settings.status_poll_interval_ms, 2000);
    assert_eq!(settings.result_poll_max_attempts, 1);

    let poll = settings.poll_config();
    assert_eq!(poll.status_interval, Duration::from_millis(2000));
    assert_eq!(poll.result_interval, Duration::from_millis(1500));
    assert_eq!(poll.result_max_attempts, 1);
}

#[test]
fn malformed_config_file_is_reported() {
    let path = temp_config("status_poll_interval_ms = \"fast\"");

    let err = load_settings_with(Some(&path), env_from(&[])).expect_err("invalid file");
    assert!(err.to_string().contains("invalid config file"));

    fs::remove_dir_all(path.parent().expect("parent")).expect("cleanup");
}
