//! Bounded execution of short-lived external commands.
//!
//! Nothing here knows what the command means. Callers get trimmed output on a
//! zero exit and a [`MirrorError`] for everything else.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Cause, MirrorError, Result};

/// Captured, whitespace-trimmed output of a successful invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Human-readable label for a command: the program and its subcommand.
///
/// Later arguments are left out so pairing codes and the like never end up in
/// error messages.
pub fn command_label(program: &Path, args: &[String]) -> String {
    match args.first() {
        Some(sub) => format!("{} {}", program.display(), sub),
        None => program.display().to_string(),
    }
}

/// Run `program` with `args`, giving up after `timeout`.
pub async fn run_command(program: &Path, args: &[String], timeout: Duration) -> Result<CommandOutput> {
    run_command_until(program, args, timeout, &CancellationToken::new()).await
}

/// Like [`run_command`], but also gives up as soon as `cancel` fires.
///
/// Either way the child is killed when its future is dropped, so it can no
/// longer write into our pipes once this returns.
pub async fn run_command_until(
    program: &Path,
    args: &[String],
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<CommandOutput> {
    let label = command_label(program, args);
    debug!(command = %label, args = ?args, ?timeout, "Running command");

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            warn!(command = %label, error = %e, "Failed to spawn command");
            MirrorError::command_failed(&label, "", "", None, Cause::Spawn(e))
        })?;

    let output = tokio::select! {
        waited = tokio::time::timeout(timeout, child.wait_with_output()) => match waited {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(MirrorError::command_failed(&label, "", "", None, Cause::Spawn(e)));
            }
            Err(elapsed) => {
                warn!(command = %label, ?timeout, "Command timed out");
                return Err(MirrorError::timeout(&label, Cause::Deadline(elapsed)));
            }
        },
        _ = cancel.cancelled() => {
            warn!(command = %label, "Command cancelled");
            return Err(MirrorError::timeout(&label, Cause::Cancelled));
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if !output.status.success() {
        let exit_code = output.status.code();
        debug!(command = %label, ?exit_code, %stderr, "Command exited unsuccessfully");
        return Err(MirrorError::command_failed(
            &label,
            stdout,
            stderr,
            exit_code,
            Cause::Exit(output.status),
        ));
    }

    Ok(CommandOutput { stdout, stderr })
}


#[cfg(all(test, unix))]
mod tests {
    use super::testing::script;
    use super::*;
    use crate::error::ErrorKind;
    use std::time::Instant;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn captures_and_trims_both_streams() {
        let dir = tempfile::tempdir().unwrap();
        let tool = script(dir.path(), "tool", "echo '  out line  '\necho ' err line ' >&2");

        let output = run_command(&tool, &args(&["x"]), Duration::from_secs(5)).await.unwrap();
        assert_eq!(output.stdout, "out line");
        assert_eq!(output.stderr, "err line");
    }

    #[tokio::test]
    async fn nonzero_exit_is_command_failed_with_streams() {
        let dir = tempfile::tempdir().unwrap();
        let tool = script(dir.path(), "tool", "echo partial\necho boom >&2\nexit 3");

        let err = run_command(&tool, &args(&["sub", "secret"]), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::CommandFailed);
        assert_eq!(err.exit_code, Some(3));
        assert_eq!(err.stdout, "partial");
        assert_eq!(err.stderr, "boom");
        assert!(err.command.ends_with("tool sub"));
        assert!(!err.command.contains("secret"));
        assert!(matches!(err.cause, Some(Cause::Exit(_))));
    }

    #[tokio::test]
    async fn deadline_is_timeout_not_command_failed() {
        let dir = tempfile::tempdir().unwrap();
        let tool = script(dir.path(), "slow", "sleep 10");

        let started = Instant::now();
        let err = run_command(&tool, &[], Duration::from_millis(200)).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Timeout);
        assert!(matches!(err.cause, Some(Cause::Deadline(_))));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn cancellation_is_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let tool = script(dir.path(), "slow", "sleep 10");
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let err = run_command_until(&tool, &[], Duration::from_secs(30), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Timeout);
        assert!(matches!(err.cause, Some(Cause::Cancelled)));
    }

    #[tokio::test]
    async fn missing_binary_has_no_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");

        let err = run_command(&missing, &args(&["devices"]), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::CommandFailed);
        assert_eq!(err.exit_code, None);
        assert!(matches!(err.cause, Some(Cause::Spawn(_))));
    }
}
