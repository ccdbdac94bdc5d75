#![cfg(unix)]

use release_pipeline::PipelineError;
use release_pipeline::runner::{CommandSpec, ProcessRunner, Runner, locate_tool};
use std::time::Duration;
use tempfile::TempDir;

fn sh(script: &str) -> CommandSpec {
    CommandSpec::new("sh").args(["-c", script])
}

#[tokio::test]
async fn captures_output_and_exit_code() {
    let runner = ProcessRunner::new(Duration::from_secs(30));
    let result = runner
        .run(&sh("echo built; echo 'warning: deprecated' >&2; exit 3"))
        .await
        .unwrap();

    assert!(!result.success());
    assert_eq!(result.code, Some(3));
    assert_eq!(result.stdout, "built\n");
    assert_eq!(result.stderr, "warning: deprecated\n");
    assert_eq!(result.combined_output(), "built\nwarning: deprecated");
}

#[tokio::test]
async fn passes_working_directory_and_environment() {
    let dir = TempDir::new().unwrap();
    let runner = ProcessRunner::new(Duration::from_secs(30));
    let command = sh("pwd; echo \"$APP_FLAVOR\"")
        .current_dir(dir.path())
        .env("APP_FLAVOR", "release");

    let result = runner.run(&command).await.unwrap();

    assert!(result.success());
    let mut lines = result.stdout.lines();
    let pwd = std::fs::canonicalize(lines.next().unwrap()).unwrap();
    assert_eq!(pwd, std::fs::canonicalize(dir.path()).unwrap());
    assert_eq!(lines.next(), Some("release"));
}

#[tokio::test]
async fn kills_commands_that_exceed_the_timeout() {
    let runner = ProcessRunner::new(Duration::from_millis(200));
    let err = runner.run(&sh("sleep 10")).await.unwrap_err();

    match err {
        PipelineError::Process { reason, .. } => assert!(reason.contains("timed out")),
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_program_is_a_process_error() {
    let runner = ProcessRunner::default();
    let err = runner
        .run(&CommandSpec::new("definitely-not-an-installed-tool"))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Process { .. }));
}

#[test]
fn relative_programs_resolve_against_working_directory() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("build.sh"), "").unwrap();

    assert_eq!(
        locate_tool("./build.sh", Some(dir.path()), None),
        Some(dir.path().join("./build.sh"))
    );
    assert_eq!(locate_tool("./missing.sh", Some(dir.path()), None), None);
}
