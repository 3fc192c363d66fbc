use super::error::PipelineError;
use std::process::{Command, Output, Stdio};
use tracing::debug;

/// Runs `command` to completion with captured output.
///
/// A tool that cannot be started or exits unsuccessfully is reported as an
/// [`PipelineError::EngineFailure`] carrying the tail of its stderr (or stdout if stderr is empty).
pub(crate) fn run_captured(tool: &str, command: &mut Command) -> Result<Output, PipelineError> {
    debug!(tool, command = ?command, "Invoking external tool.");
    let output = command
        .stdin(Stdio::null())
        .output()
        .map_err(|e| PipelineError::engine_failure(tool, "failed to start", &e.to_string()))?;

    if !output.status.success() {
        return Err(PipelineError::engine_failure(
            tool,
            output.status,
            &diagnostic_text(&output),
        ));
    }
    Ok(output)
}

pub(crate) fn diagnostic_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.trim().is_empty() {
        String::from_utf8_lossy(&output.stdout).into_owned()
    } else {
        stderr.into_owned()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn failing_tool_reports_status_and_stderr() {
        let mut command = Command::new("sh");
        command.args(["-c", "echo doomed >&2; exit 3"]);
        let err = run_captured("echo-tool", &mut command).unwrap_err();
        match err {
            PipelineError::EngineFailure {
                tool,
                status,
                log_tail,
            } => {
                assert_eq!(tool, "echo-tool");
                assert!(status.contains('3'));
                assert_eq!(log_tail, "doomed");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_executable_is_an_engine_failure() {
        let mut command = Command::new("/nonexistent/aptafold-tool");
        let err = run_captured("ghost", &mut command).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::EngineFailure { status, .. } if status == "failed to start"
        ));
    }

    #[test]
    fn successful_tool_returns_stdout() {
        let mut command = Command::new("sh");
        command.args(["-c", "echo ok"]);
        let output = run_captured("echo-tool", &mut command).unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "ok");
    }
}
