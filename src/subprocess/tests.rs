use super::*;

const NO_ARGS: [&str; 0] = [];

#[cfg(unix)]
#[tokio::test]
async fn test_production_runner_success() {
    let runner = runner::TokioProcessRunner;
    let command = ProcessCommand::new("echo", ["hello world"]);

    let output = runner.run(command).await.unwrap();
    assert!(output.status.success());
    assert_eq!(output.stdout.trim(), "hello world");
    assert!(output.stderr.is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_production_runner_failure() {
    let runner = runner::TokioProcessRunner;
    let command = ProcessCommand::new("false", NO_ARGS);

    let output = runner.run(command).await.unwrap();
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(1));
}

#[cfg(unix)]
#[tokio::test]
async fn test_production_runner_passes_env() {
    let runner = runner::TokioProcessRunner;
    let mut command = ProcessCommand::new("sh", ["-c", "printf %s \"$CIDFLOW_TEST_VAR\""]);
    command
        .env
        .insert("CIDFLOW_TEST_VAR".to_string(), "visible".to_string());

    let output = runner.run(command).await.unwrap();
    assert_eq!(output.stdout, "visible");
}

#[tokio::test]
async fn test_production_runner_command_not_found() {
    let runner = runner::TokioProcessRunner;
    let command = ProcessCommand::new("nonexistent-command-12345", NO_ARGS);

    let result = runner.run(command).await;
    assert!(matches!(
        result.unwrap_err(),
        ProcessError::CommandNotFound(_)
    ));
}

#[tokio::test]
async fn test_mock_runner_basic() {
    let mut mock = MockProcessRunner::new();

    mock.expect_command("bacalhau")
        .with_args(|args| args == ["version"])
        .returns_stdout("v1.0.0\n")
        .returns_success()
        .finish();

    let output = mock
        .run(ProcessCommand::new("bacalhau", ["version"]))
        .await
        .unwrap();

    assert!(output.status.success());
    assert_eq!(output.stdout, "v1.0.0\n");
    assert!(mock.verify_called("bacalhau", 1));
}

#[tokio::test]
async fn test_mock_runner_exhausted_expectation_falls_through() {
    let mut mock = MockProcessRunner::new();

    mock.expect_command("bacalhau")
        .returns_stdout("first")
        .times(2)
        .finish();
    mock.expect_command("bacalhau")
        .returns_stdout("second")
        .finish();

    let mut seen = Vec::new();
    for _ in 0..3 {
        let output = mock
            .run(ProcessCommand::new("bacalhau", NO_ARGS))
            .await
            .unwrap();
        seen.push(output.stdout);
    }

    assert_eq!(seen, vec!["first", "first", "second"]);
}

#[tokio::test]
async fn test_mock_runner_unexpected_command() {
    let mock = MockProcessRunner::new();

    let result = mock
        .run(ProcessCommand::new("unknown", NO_ARGS))
        .await;

    assert!(matches!(
        result.unwrap_err(),
        ProcessError::MockExpectationNotMet(_)
    ));
}

#[tokio::test]
async fn test_mock_runner_not_found() {
    let mut mock = MockProcessRunner::new();
    mock.expect_command("bacalhau").returns_not_found().finish();

    let err = mock
        .run(ProcessCommand::new("bacalhau", NO_ARGS))
        .await
        .unwrap_err();

    assert!(err.is_fatal());
}
