use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::tempdir;

fn run_threadline(app_state: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_threadline"))
        .env("THREADLINE_APP_STATE_PATH", app_state)
        .env("THREADLINE_API_BASE_URL", "http://127.0.0.1:9/v1")
        .env("THREADLINE_REALTIME_URL", "ws://127.0.0.1:9/listen")
        .env("RUST_LOG", "off")
        .env("NO_COLOR", "1")
        .stdin(Stdio::null())
        .output()
        .expect("failed to execute threadline binary")
}

#[test]
fn missing_app_state_stops_before_prompt() {
    let dir = tempdir().unwrap();
    let output = run_threadline(&dir.path().join("does-not-exist.json"));

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("Choose a group chat"), "unexpected prompt: {stdout}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error reading app state"), "stderr was: {stderr}");
}

#[test]
fn malformed_app_state_is_fatal() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("appState.json");
    std::fs::write(&path, "not json at all").unwrap();

    let output = run_threadline(&path);

    assert_eq!(output.status.code(), Some(1));
    assert!(!String::from_utf8_lossy(&output.stdout).contains("Choose a group chat"));
}

#[test]
fn unreachable_gateway_fails_login() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("appState.json");
    std::fs::write(&path, r#"[{"key":"c_user","value":"1000"}]"#).unwrap();

    let output = run_threadline(&path);

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("Logged in."), "stdout was: {stdout}");
    assert!(!stdout.contains("Choose a group chat"));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error logging in"), "stderr was: {stderr}");
}
