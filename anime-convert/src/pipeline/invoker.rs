//! Subprocess invocation of external stage executables.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use process_utils::{ExitCause, tokio_command};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::StageFailure;

/// Runs one stage executable and waits for it to exit.
///
/// Output is forwarded to tracing and otherwise ignored; the stage's real
/// result is what it writes to disk. There is no retry and no timeout.
#[derive(Debug, Clone, Default)]
pub struct StageInvoker {
    /// Program used to launch scripts (e.g. `python3`). `None` executes the
    /// script directly.
    interpreter: Option<OsString>,
}

impl StageInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Launch every executable through `interpreter`.
    pub fn with_interpreter(interpreter: impl Into<OsString>) -> Self {
        Self {
            interpreter: Some(interpreter.into()),
        }
    }

    pub fn interpreter(&self) -> Option<&OsStr> {
        self.interpreter.as_deref()
    }

    /// Program and leading arguments for `executable`.
    fn command_line(&self, executable: &Path) -> (PathBuf, Vec<OsString>) {
        match &self.interpreter {
            Some(interpreter) => (
                PathBuf::from(interpreter),
                vec![executable.as_os_str().to_os_string()],
            ),
            None => (executable.to_path_buf(), Vec::new()),
        }
    }

    /// Run `executable` with `args`, returning once the process has exited.
    pub async fn invoke(
        &self,
        stage: &'static str,
        executable: &Path,
        args: &[OsString],
    ) -> Result<(), StageFailure> {
        let start = std::time::Instant::now();
        let (program, leading) = self.command_line(executable);

        debug!(stage, program = %program.display(), ?leading, ?args, "Launching stage");

        let mut command = tokio_command(&program);
        command
            .args(&leading)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|source| StageFailure::Launch { stage, source })?;

        let stdout = child
            .stdout
            .take()
            .map(|out| forward_lines(stage, out, StreamKind::Stdout));
        let stderr = child
            .stderr
            .take()
            .map(|err| forward_lines(stage, err, StreamKind::Stderr));

        let status = child.wait().await;

        // Readers finish once the child closes its pipes.
        for handle in [stdout, stderr].into_iter().flatten() {
            let _ = handle.await;
        }

        let status = status.map_err(|source| StageFailure::Wait { stage, source })?;
        let elapsed = start.elapsed().as_secs_f64();

        match ExitCause::from(status) {
            ExitCause::Success => {
                info!(stage, "Stage completed in {:.2}s", elapsed);
                Ok(())
            }
            ExitCause::Code(code) => {
                warn!(stage, code, "Stage exited with non-zero status");
                Err(StageFailure::ExitCode { stage, code })
            }
            ExitCause::Signal(signal) => {
                warn!(stage, signal, "Stage terminated by signal");
                Err(StageFailure::Signal { stage, signal })
            }
            ExitCause::Unknown => {
                warn!(stage, "Stage terminated abnormally");
                Err(StageFailure::Abnormal { stage })
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum StreamKind {
    Stdout,
    Stderr,
}

fn forward_lines<R>(stage: &'static str, stream: R, kind: StreamKind) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match kind {
                StreamKind::Stdout => debug!(stage, "stdout: {}", line),
                // Most tools print progress to stderr; only escalate error lines.
                StreamKind::Stderr if line.to_lowercase().contains("error") => {
                    warn!(stage, "stderr: {}", line)
                }
                StreamKind::Stderr => debug!(stage, "stderr: {}", line),
            }
        }
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[tokio::test]
    async fn test_invoke_success() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("marker");
        let exe = script(&dir, "ok.sh", "echo working; touch \"$2\"\n");

        let invoker = StageInvoker::with_interpreter("sh");
        invoker
            .invoke(
                "extract",
                &exe,
                &[OsString::from("--out"), marker.clone().into_os_string()],
            )
            .await
            .unwrap();

        assert!(marker.exists());
    }

    #[tokio::test]
    async fn test_invoke_non_zero_exit() {
        let dir = TempDir::new().unwrap();
        let exe = script(&dir, "fail.sh", "echo 'fatal error' >&2; exit 3\n");

        let err = StageInvoker::with_interpreter("sh")
            .invoke("stylize", &exe, &[])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StageFailure::ExitCode {
                stage: "stylize",
                code: 3
            }
        ));
    }

    #[tokio::test]
    async fn test_invoke_killed_by_signal() {
        let dir = TempDir::new().unwrap();
        let exe = script(&dir, "kill.sh", "kill -9 $$\n");

        let err = StageInvoker::with_interpreter("sh")
            .invoke("smooth", &exe, &[])
            .await
            .unwrap_err();

        assert!(matches!(err, StageFailure::Signal { signal: 9, .. }));
    }

    #[tokio::test]
    async fn test_invoke_launch_failure() {
        let err = StageInvoker::new()
            .invoke("resize", Path::new("/definitely/not/here"), &[])
            .await
            .unwrap_err();

        assert!(matches!(err, StageFailure::Launch { stage: "resize", .. }));
        assert!(err.to_string().contains("resize"));
    }

    #[test]
    fn test_command_line_with_interpreter() {
        let invoker = StageInvoker::with_interpreter("python3");
        let (program, leading) = invoker.command_line(Path::new("scripts/a.py"));
        assert_eq!(program, PathBuf::from("python3"));
        assert_eq!(leading, vec![OsString::from("scripts/a.py")]);

        let (program, leading) = StageInvoker::new().command_line(Path::new("bin/a"));
        assert_eq!(program, PathBuf::from("bin/a"));
        assert!(leading.is_empty());
    }
}
