//! External CAD tool invocation: `<tool> -o <input>.temp.obj <input>`.
//!
//! The tool runs as a child process with stdin closed and both output
//! streams captured. The wait is bounded by `tokio::time::timeout`; the child
//! is spawned with `kill_on_drop(true)`, so abandoning the wait on timeout
//! also kills the process. Every failure here is a [`ToolError`], which the
//! converter treats as a signal to fall back, never as fatal.

use crate::error::ToolError;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, error, info};

/// Characters of tool stderr kept in [`ToolError::Failed`].
const STDERR_LIMIT: usize = 2000;

/// A successful tool run.
#[derive(Debug, Clone)]
pub struct ToolRun {
    pub duration_ms: u64,
    /// Diagnostics the tool printed even though it succeeded.
    pub stderr: String,
}

/// Argument vector for converting `input` into `obj_out`.
pub fn tool_args(input: &Path, obj_out: &Path) -> Vec<OsString> {
    vec![
        OsString::from("-o"),
        obj_out.as_os_str().to_owned(),
        input.as_os_str().to_owned(),
    ]
}

/// Run `tool` to convert `input` into the OBJ at `obj_out`.
///
/// Succeeds only when the process exits 0 within `timeout_secs` and the OBJ
/// file exists afterwards.
pub async fn run_tool(
    tool: &Path,
    input: &Path,
    obj_out: &Path,
    timeout_secs: u64,
) -> Result<ToolRun, ToolError> {
    let start = Instant::now();
    let args = tool_args(input, obj_out);

    info!(
        "Executing CAD tool: command='{}', args={:?}",
        tool.display(),
        args
    );

    let mut cmd = Command::new(tool);
    cmd.args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let result = tokio::time::timeout(Duration::from_secs(timeout_secs), cmd.output()).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    let output = match result {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            error!("Failed to spawn CAD tool '{}': {e}", tool.display());
            return Err(ToolError::Spawn {
                command: tool.display().to_string(),
                source: e,
            });
        }
        Err(_) => {
            error!(
                "CAD tool timed out after {timeout_secs}s: command='{}'",
                tool.display()
            );
            return Err(ToolError::Timeout { secs: timeout_secs });
        }
    };

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if !output.status.success() {
        error!(
            "CAD tool crashed: {}, stderr='{}'",
            output.status,
            stderr.chars().take(500).collect::<String>()
        );
        return Err(ToolError::Failed {
            status: output.status.to_string(),
            stderr: stderr.chars().take(STDERR_LIMIT).collect(),
        });
    }

    if !obj_out.is_file() {
        return Err(ToolError::OutputMissing {
            path: obj_out.to_path_buf(),
        });
    }

    debug!("CAD tool stdout: {}", String::from_utf8_lossy(&output.stdout).trim());
    info!("CAD tool finished in {duration_ms}ms");

    Ok(ToolRun {
        duration_ms,
        stderr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_follow_output_then_input_order() {
        let args = tool_args(Path::new("in.3mf"), Path::new("in.3mf.temp.obj"));
        assert_eq!(
            args,
            vec![
                OsString::from("-o"),
                OsString::from("in.3mf.temp.obj"),
                OsString::from("in.3mf"),
            ]
        );
    }

    #[tokio::test]
    async fn missing_executable_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("no-such-tool");
        let err = run_tool(
            &tool,
            &dir.path().join("in.3mf"),
            &dir.path().join("in.3mf.temp.obj"),
            5,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }), "got {err:?}");
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn script(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
            let path = dir.join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn nonzero_exit_is_failed_with_stderr() {
            let dir = tempfile::tempdir().unwrap();
            let tool = script(dir.path(), "fail.sh", "echo 'cannot import 3mf' >&2\nexit 3");
            let err = run_tool(
                &tool,
                &dir.path().join("in.3mf"),
                &dir.path().join("in.3mf.temp.obj"),
                5,
            )
            .await
            .unwrap_err();
            match err {
                ToolError::Failed { status, stderr } => {
                    assert!(status.contains('3'), "status: {status}");
                    assert_eq!(stderr, "cannot import 3mf");
                }
                other => panic!("expected Failed, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn success_without_output_is_output_missing() {
            let dir = tempfile::tempdir().unwrap();
            let tool = script(dir.path(), "noop.sh", "exit 0");
            let err = run_tool(
                &tool,
                &dir.path().join("in.3mf"),
                &dir.path().join("in.3mf.temp.obj"),
                5,
            )
            .await
            .unwrap_err();
            assert!(matches!(err, ToolError::OutputMissing { .. }), "got {err:?}");
        }

        #[tokio::test]
        async fn slow_tool_times_out() {
            let dir = tempfile::tempdir().unwrap();
            let tool = script(dir.path(), "slow.sh", "exec sleep 10");
            let start = Instant::now();
            let err = run_tool(
                &tool,
                &dir.path().join("in.3mf"),
                &dir.path().join("in.3mf.temp.obj"),
                1,
            )
            .await
            .unwrap_err();
            assert!(matches!(err, ToolError::Timeout { secs: 1 }), "got {err:?}");
            assert!(start.elapsed() < Duration::from_secs(8));
        }

        #[tokio::test]
        async fn writing_tool_succeeds() {
            let dir = tempfile::tempdir().unwrap();
            // $2 is the path after -o.
            let tool = script(dir.path(), "ok.sh", "echo 'v 0 0 0' > \"$2\"");
            let obj = dir.path().join("in.3mf.temp.obj");
            let run = run_tool(&tool, &dir.path().join("in.3mf"), &obj, 5)
                .await
                .expect("tool should succeed");
            assert!(obj.is_file());
            assert!(run.stderr.is_empty());
        }
    }
}
